//! Text Chunking Module
//!
//! 문서 블록을 겹침(overlap)이 있는 고정 크기 청크로 나눕니다.
//!
//! 재귀 분할 전략:
//! 1. 문단 경계(빈 줄)로 나눠보고
//! 2. 여전히 크면 줄 → 문장 → 단어 경계 순으로 내려가며
//! 3. 마지막에는 문자 단위로 자릅니다.
//!
//! 잘린 조각은 원문 위치(바이트 오프셋)를 그대로 유지한 채 `chunk_size` 이하로
//! 다시 합쳐지며, 다음 청크는 직전 청크 끝부분을 최대 `chunk_overlap` 문자만큼
//! 포함합니다. 청크는 항상 원문의 연속 구간이므로 겹침을 제거하고 이어 붙이면
//! 원문 순서가 복원됩니다.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RagError, RagResult};
use crate::extractor::Document;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 인접 청크 간 겹침 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 겹침은 최대 크기보다 작아야 함
    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::validation("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 검색 단위 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트 (원문 구간 그대로)
    pub text: String,
    /// 출처 파일 이름
    pub source: String,
    /// PDF 페이지 번호
    pub page: Option<usize>,
    /// 문서 내 청크 순번 (0-based)
    pub chunk_index: usize,
    /// 문서 내 블록 순번
    pub block_index: usize,
    /// 블록 내 시작 바이트 오프셋
    pub start: usize,
    /// 블록 내 끝 바이트 오프셋 (exclusive)
    pub end: usize,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 문서 목록을 청크로 분할 (문서 순서 → 위치 순서)
    fn split(&self, documents: &[Document]) -> Vec<Chunk>;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 분할 경계 단계 (거친 것 → 세밀한 것)
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    fn pattern(&self) -> &'static Regex {
        static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
        static LINE: OnceLock<Regex> = OnceLock::new();
        static SENTENCE: OnceLock<Regex> = OnceLock::new();
        static WORD: OnceLock<Regex> = OnceLock::new();

        match self {
            Boundary::Paragraph => PARAGRAPH
                .get_or_init(|| Regex::new(r"\n[ \t]*\n\s*").expect("paragraph regex")),
            Boundary::Line => LINE.get_or_init(|| Regex::new(r"\n\s*").expect("line regex")),
            Boundary::Sentence => SENTENCE
                .get_or_init(|| Regex::new(r#"[.!?。]+["')\]]*\s+"#).expect("sentence regex")),
            Boundary::Word => WORD.get_or_init(|| Regex::new(r"\s+").expect("word regex")),
        }
    }

    /// 구분자 바로 뒤 위치들 (구분자는 앞 조각에 붙음)
    fn cut_points(&self, text: &str) -> Vec<usize> {
        self.pattern()
            .find_iter(text)
            .map(|m| m.end())
            .filter(|&end| end < text.len())
            .collect()
    }
}

/// 원문 구간 조각
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// 재귀 문자 청커
///
/// 문단 → 줄 → 문장 → 단어 → 문자 순으로 경계를 낮춰가며
/// 모든 청크가 `chunk_size` 문자 이하가 되도록 분할합니다.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성 (겹침 ≥ 크기이면 ValidationError)
    pub fn new(config: ChunkConfig) -> RagResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 텍스트를 청크 구간(바이트 오프셋)으로 분할
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut pieces = Vec::new();
        self.split_range(text, 0, text.len(), 0, &mut pieces);
        self.merge_pieces(text, &pieces)
    }

    /// 구간이 크면 다음 경계 단계로 재귀 분할
    fn split_range(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Piece>) {
        let slice = &text[start..end];
        let chars = slice.chars().count();

        if chars <= self.config.chunk_size {
            out.push(Piece { start, end, chars });
            return;
        }

        let Some(boundary) = BOUNDARIES.get(level) else {
            // 문자 단위 분할
            for (offset, ch) in slice.char_indices() {
                let piece_start = start + offset;
                out.push(Piece {
                    start: piece_start,
                    end: piece_start + ch.len_utf8(),
                    chars: 1,
                });
            }
            return;
        };

        let cuts = boundary.cut_points(slice);
        if cuts.is_empty() {
            self.split_range(text, start, end, level + 1, out);
            return;
        }

        let mut seg_start = start;
        for cut in cuts {
            let seg_end = start + cut;
            self.split_range(text, seg_start, seg_end, level + 1, out);
            seg_start = seg_end;
        }
        self.split_range(text, seg_start, end, level + 1, out);
    }

    /// 조각을 `chunk_size` 이하 청크로 합치며 겹침 적용
    fn merge_pieces(&self, text: &str, pieces: &[Piece]) -> Vec<(usize, usize)> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut spans = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > size && !window.is_empty() {
                push_span(text, &window, &mut spans);

                // 겹침 한도 이하가 되고 다음 조각이 들어갈 때까지 앞에서 제거
                while total > overlap || (total + piece.chars > size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }

            window.push_back(*piece);
            total += piece.chars;
        }

        if !window.is_empty() {
            push_span(text, &window, &mut spans);
        }

        spans
    }
}

fn push_span(text: &str, window: &VecDeque<Piece>, spans: &mut Vec<(usize, usize)>) {
    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        // 공백만 있는 구간은 청크로 만들지 않음
        if !text[first.start..last.end].trim().is_empty() {
            spans.push((first.start, last.end));
        }
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for doc in documents {
            let mut chunk_index = 0;

            for (block_index, block) in doc.blocks.iter().enumerate() {
                for (start, end) in self.spans(&block.text) {
                    chunks.push(Chunk {
                        text: block.text[start..end].to_string(),
                        source: doc.source.clone(),
                        page: block.page,
                        chunk_index,
                        block_index,
                        start,
                        end,
                    });
                    chunk_index += 1;
                }
            }

            tracing::debug!("Chunked {} into {} chunks", doc.source, chunk_index);
        }

        chunks
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 문서 목록을 청크로 분할
///
/// `chunk_overlap >= chunk_size`이면 ValidationError.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> RagResult<Vec<Chunk>> {
    let chunker = RecursiveChunker::new(ChunkConfig::new(chunk_size, chunk_overlap))?;
    Ok(chunker.split(documents))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extractor::TextBlock;

    /// 겹침을 제거하고 이어 붙여 원문 복원
    fn reconstruct(text: &str, spans: &[(usize, usize)]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for &(start, end) in spans {
            assert!(start <= covered || covered == 0, "gap before span {}..{}", start, end);
            let from = covered.max(start);
            out.push_str(&text[from..end]);
            covered = end;
        }
        out
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..12 {
            text.push_str(&format!(
                "Section {} covers obligations of the parties. Each party shall comply with \
                 the schedule. Payments are due within thirty days of invoice.\n\n",
                i
            ));
        }
        text.trim_end().to_string()
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.spans("").is_empty());
        assert!(chunker.spans("  \n\n  ").is_empty());
    }

    #[test]
    fn test_short_document_single_chunk() {
        let docs = vec![Document::from_text("short.txt", "Termination Clause: 30 days.")];
        let chunks = split_documents(&docs, 100, 10).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Termination Clause: 30 days.");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].source, "short.txt");
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let docs = vec![Document::from_text("a.txt", "text")];

        let err = split_documents(&docs, 100, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = split_documents(&docs, 100, 250).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(split_documents(&docs, 0, 0).is_err());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let text = sample_text();
        let chunker = RecursiveChunker::new(ChunkConfig::new(120, 30)).unwrap();

        let spans = chunker.spans(&text);
        assert!(spans.len() > 1);
        for &(start, end) in &spans {
            assert!(text[start..end].chars().count() <= 120);
        }
    }

    #[test]
    fn test_reconstructs_original_order() {
        let text = sample_text();
        for (size, overlap) in [(120, 30), (200, 0), (57, 56), (1000, 200)] {
            let chunker = RecursiveChunker::new(ChunkConfig::new(size, overlap)).unwrap();
            let spans = chunker.spans(&text);
            assert_eq!(reconstruct(&text, &spans), text, "size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let text = sample_text();
        let chunker = RecursiveChunker::new(ChunkConfig::new(150, 60)).unwrap();
        let spans = chunker.spans(&text);

        assert!(spans.windows(2).any(|w| w[1].0 < w[0].1), "expected some overlap");
        for w in spans.windows(2) {
            // 시작/끝 모두 단조 증가
            assert!(w[1].0 > w[0].0);
            assert!(w[1].1 > w[0].1);
            let overlap_chars = if w[1].0 < w[0].1 {
                text[w[1].0..w[0].1].chars().count()
            } else {
                0
            };
            assert!(overlap_chars <= 60);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let chunker = RecursiveChunker::new(ChunkConfig::new(30, 0)).unwrap();
        let spans = chunker.spans(text);

        let pieces: Vec<&str> = spans.iter().map(|&(s, e)| text[s..e].trim()).collect();
        assert_eq!(pieces, vec!["First paragraph is here.", "Second paragraph is here."]);
    }

    #[test]
    fn test_hard_split_without_boundaries() {
        let text = "x".repeat(25);
        let chunker = RecursiveChunker::new(ChunkConfig::new(10, 2)).unwrap();
        let spans = chunker.spans(&text);

        assert!(spans.iter().all(|&(s, e)| e - s <= 10));
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "안녕하세요 세계. 문서 검색을 위한 청크 분할 테스트입니다. 한국어 문장도 잘려야 합니다.";
        let chunker = RecursiveChunker::new(ChunkConfig::new(12, 4)).unwrap();
        let spans = chunker.spans(text);

        for &(s, e) in &spans {
            assert!(text[s..e].chars().count() <= 12);
        }
        assert_eq!(reconstruct(text, &spans), text);
    }

    #[test]
    fn test_deterministic_and_ordered_by_source() {
        let docs = vec![
            Document::from_text("b.txt", sample_text()),
            Document {
                blocks: vec![
                    TextBlock::with_page("Page one text.", 1),
                    TextBlock::with_page("Page two text.", 2),
                ],
                ..Document::from_text("a.pdf", "")
            },
        ];

        let first = split_documents(&docs, 100, 20).unwrap();
        let second = split_documents(&docs, 100, 20).unwrap();
        assert_eq!(first, second);

        // 입력 문서 순서 유지
        let boundary = first.iter().position(|c| c.source == "a.pdf").unwrap();
        assert!(first[..boundary].iter().all(|c| c.source == "b.txt"));
        assert!(first[boundary..].iter().all(|c| c.source == "a.pdf"));

        // 문서 내 순번은 연속
        let pdf_chunks: Vec<&Chunk> = first.iter().filter(|c| c.source == "a.pdf").collect();
        assert_eq!(pdf_chunks.len(), 2);
        assert_eq!(pdf_chunks[0].chunk_index, 0);
        assert_eq!(pdf_chunks[1].chunk_index, 1);
        assert_eq!(pdf_chunks[1].page, Some(2));
    }

    #[test]
    fn test_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert!(config.validate().is_ok());
    }
}
