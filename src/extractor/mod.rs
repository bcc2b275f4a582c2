//! 콘텐츠 추출 모듈
//!
//! 지원 파일 형식에서 텍스트 블록을 추출합니다.
//! - 텍스트/마크다운 파일: 직접 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출
//! - DOCX 파일: zip + quick-xml로 문단 추출

pub mod docx;
pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::collector::FileType;

// ============================================================================
// Document
// ============================================================================

/// 추출된 텍스트 블록 (출처 정보 포함)
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// 블록 텍스트
    pub text: String,
    /// PDF 페이지 번호 (1부터 시작)
    pub page: Option<usize>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
        }
    }

    pub fn with_page(text: impl Into<String>, page: usize) -> Self {
        Self {
            text: text.into(),
            page: Some(page),
        }
    }
}

/// 파싱된 문서
#[derive(Debug, Clone)]
pub struct Document {
    /// 출처 이름 (파일 이름)
    pub source: String,
    /// 원본 경로
    pub path: PathBuf,
    /// 파일 타입
    pub file_type: FileType,
    /// 추출된 블록 (페이지/문서 순서)
    pub blocks: Vec<TextBlock>,
}

impl Document {
    /// 메모리 상의 텍스트로 문서 생성
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let file_type = FileType::from_path(Path::new(&source)).unwrap_or(FileType::Text);
        Self {
            path: PathBuf::from(&source),
            source,
            file_type,
            blocks: vec![TextBlock::new(text)],
        }
    }

    /// 블록에 실제 텍스트가 없으면 true
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|b| b.text.trim().is_empty())
    }

    /// 전체 문자 수
    pub fn char_count(&self) -> usize {
        self.blocks.iter().map(|b| b.text.chars().count()).sum()
    }
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 문서 추출
    pub async fn extract(&self, path: &Path, file_type: FileType) -> Result<Document> {
        let blocks = match file_type {
            FileType::Text | FileType::Markdown => self.extract_text(path).await?,
            FileType::Pdf => self.extract_pdf(path).await?,
            FileType::Docx => self.extract_docx(path).await?,
        };

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!("Extracted {} blocks from {:?}", blocks.len(), path);

        Ok(Document {
            source,
            path: path.to_path_buf(),
            file_type,
            blocks,
        })
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<Vec<TextBlock>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![TextBlock::new(text)])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<TextBlock>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page_num, text)| TextBlock::with_page(text, page_num))
            .collect())
    }

    /// DOCX 파일에서 추출
    async fn extract_docx(&self, path: &Path) -> Result<Vec<TextBlock>> {
        let path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || docx::extract_text_from_docx(&path))
            .await
            .context("DOCX extraction task failed")??;

        Ok(vec![TextBlock::new(text)])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_from_text() {
        let doc = Document::from_text("notes.md", "# Title\n\nBody");
        assert_eq!(doc.file_type, FileType::Markdown);
        assert_eq!(doc.blocks.len(), 1);
        assert!(!doc.is_blank());
        assert_eq!(doc.char_count(), 13);
    }

    #[test]
    fn test_blank_document() {
        let doc = Document::from_text("empty.txt", "   \n\n ");
        assert!(doc.is_blank());
    }

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contract.txt");
        std::fs::write(&path, "Termination Clause: 30 days notice.").unwrap();

        let doc = ContentExtractor::new()
            .extract(&path, FileType::Text)
            .await
            .unwrap();

        assert_eq!(doc.source, "contract.txt");
        assert_eq!(doc.blocks[0].text, "Termination Clause: 30 days notice.");
        assert!(doc.blocks[0].page.is_none());
    }

    #[tokio::test]
    async fn test_extract_missing_file_fails() {
        let result = ContentExtractor::new()
            .extract(Path::new("/no/such/file.md"), FileType::Markdown)
            .await;
        assert!(result.is_err());
    }
}
