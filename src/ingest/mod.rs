//! Ingest 모듈 - 파일 → 세션 인덱스
//!
//! 수집(확장자 검증) → 세션 생성 → 업로드 복사 → 추출 → 인덱스 빌드 → 레지스트리 기록.
//! 지원하지 않는 파일은 세션을 만들거나 파일을 복사하기 전에 거부됩니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collector::{CollectedFile, CollectionStats, FileCollector, FileType};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::extractor::{ContentExtractor, Document};
use crate::knowledge::{ChunkConfig, IndexBuilder, IndexHandle, IndexManifest};
use crate::session::{Session, SessionStore};

// ============================================================================
// Report
// ============================================================================

/// 파일별 처리 결과
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// 원본 경로
    pub source: PathBuf,
    /// 세션 업로드 디렉토리 내 사본
    pub stored_at: PathBuf,
    pub file_type: FileType,
    /// 추출된 블록 수 (PDF는 페이지 수)
    pub blocks: usize,
    pub chars: usize,
    /// 공백뿐인 문서는 인덱스에서 빠짐
    pub indexed: bool,
}

/// 인제스트 결과
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub session: Session,
    pub handle: IndexHandle,
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn document_count(&self) -> usize {
        self.handle.manifest.document_count
    }

    pub fn chunk_count(&self) -> usize {
        self.handle.chunk_count()
    }

    /// 텍스트가 없어 건너뛴 파일
    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.indexed)
    }
}

// ============================================================================
// DocumentIngestor
// ============================================================================

/// 문서 인제스터
pub struct DocumentIngestor {
    sessions: Arc<SessionStore>,
    collector: FileCollector,
    extractor: ContentExtractor,
    builder: IndexBuilder,
}

impl DocumentIngestor {
    pub fn new(
        sessions: Arc<SessionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunk_config: ChunkConfig,
    ) -> RagResult<Self> {
        Ok(Self {
            sessions,
            collector: FileCollector::with_defaults(),
            extractor: ContentExtractor::new(),
            builder: IndexBuilder::new(embedder, chunk_config)?,
        })
    }

    /// 수집기 교체
    pub fn with_collector(mut self, collector: FileCollector) -> Self {
        self.collector = collector;
        self
    }

    /// 파일/폴더를 새 세션(또는 지정한 세션)으로 인제스트
    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        session_id: Option<&str>,
    ) -> RagResult<IngestReport> {
        if paths.is_empty() {
            return Err(RagError::validation("No input files given"));
        }

        let files = self.collector.collect(paths)?;
        if files.is_empty() {
            return Err(RagError::NoContent(format!(
                "no supported files (.pdf, .docx, .txt, .md) under {:?}",
                paths
            )));
        }
        check_unique_names(&files)?;

        let stats = CollectionStats::from_files(&files);
        tracing::info!(
            "Collected {} files ({} pdf, {} docx, {} text, {} bytes)",
            stats.total_files,
            stats.pdf_files,
            stats.docx_files,
            stats.text_files,
            stats.total_size
        );

        let session = self.sessions.create_session(session_id)?;

        // 이미 인덱스가 있는 세션에는 업로드도 복사하지 않음
        if IndexManifest::exists(&session.index_dir) {
            return Err(RagError::validation(format!(
                "Session {} is already indexed",
                session.id
            )));
        }

        let mut documents = Vec::with_capacity(files.len());
        let mut outcomes = Vec::with_capacity(files.len());

        for file in &files {
            let stored_at = self.sessions.save_upload(&session, &file.path)?;
            let document = self.extract(&stored_at, file.file_type).await?;

            if document.is_blank() {
                tracing::warn!("No text extracted from {}", file.file_name());
            }

            outcomes.push(FileOutcome {
                source: file.path.clone(),
                stored_at,
                file_type: file.file_type,
                blocks: document.blocks.len(),
                chars: document.char_count(),
                indexed: !document.is_blank(),
            });
            documents.push(document);
        }

        let handle = self.builder.build(&session, &documents).await?;

        self.sessions.record_index(
            &session.id,
            handle.manifest.document_count,
            handle.chunk_count(),
        )?;

        tracing::info!(
            session_id = %session.id,
            chunk_count = handle.chunk_count(),
            "Ingestion complete: {} documents",
            handle.manifest.document_count
        );

        Ok(IngestReport {
            session,
            handle,
            files: outcomes,
        })
    }

    async fn extract(&self, path: &Path, file_type: FileType) -> RagResult<Document> {
        self.extractor
            .extract(path, file_type)
            .await
            .map_err(|e| RagError::ingestion(format!("Failed to parse {:?}", path), e))
    }
}

/// 업로드 디렉토리는 평평하므로 같은 파일 이름이 두 번 오면 거부
fn check_unique_names(files: &[CollectedFile]) -> RagResult<()> {
    let mut seen = HashSet::new();
    for file in files {
        let name = file.file_name();
        if !seen.insert(name.clone()) {
            return Err(RagError::validation(format!(
                "Duplicate file name in one session: {}",
                name
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::embedding::HashEmbedding;
    use crate::error::ErrorKind;
    use crate::knowledge::{ChunkRetriever, Retriever, MANIFEST_FILE};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        docs: PathBuf,
        sessions: Arc<SessionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::Builder::new().prefix("ingest").tempdir().unwrap();
        let storage = StorageConfig::under(&dir.path().join("data"));
        let sessions = Arc::new(SessionStore::open(&storage).unwrap());
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();

        Fixture {
            docs,
            sessions,
            embedder: Arc::new(HashEmbedding::new(256).unwrap()),
            _dir: dir,
        }
    }

    fn ingestor(f: &Fixture) -> DocumentIngestor {
        DocumentIngestor::new(f.sessions.clone(), f.embedder.clone(), ChunkConfig::new(200, 40))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_directory_end_to_end() {
        let f = fixture();
        std::fs::write(
            f.docs.join("contract.md"),
            "# Acme Contract\n\nThe termination clause allows either party to end the \
             agreement with ninety days written notice.\n\nPayment is due within thirty days.",
        )
        .unwrap();
        std::fs::write(
            f.docs.join("notes.txt"),
            "Meeting notes: the warehouse moves to Busan next spring.",
        )
        .unwrap();
        std::fs::write(f.docs.join("data.csv"), "a,b").unwrap();

        let report = ingestor(&f).ingest(&[f.docs.clone()], None).await.unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.document_count(), 2);
        assert!(report.chunk_count() >= 2);
        assert!(report.session.index_dir.join(MANIFEST_FILE).is_file());
        assert!(report.session.upload_dir.join("contract.md").is_file());
        assert!(!report.session.upload_dir.join("data.csv").exists());

        let record = f.sessions.get_session(report.session_id()).unwrap().unwrap();
        assert!(record.is_indexed());
        assert_eq!(record.chunk_count, report.chunk_count());

        let retriever = Retriever::load(&report.session.index_dir, f.embedder.clone())
            .await
            .unwrap();
        let hits = retriever.search("termination clause notice", 1).await.unwrap();
        assert_eq!(hits[0].chunk.source, "contract.md");
    }

    #[tokio::test]
    async fn test_unsupported_file_rejected_before_session() {
        let f = fixture();
        let good = f.docs.join("a.txt");
        let bad = f.docs.join("slides.pptx");
        std::fs::write(&good, "text").unwrap();
        std::fs::write(&bad, "binary").unwrap();

        let err = ingestor(&f).ingest(&[good, bad], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains(".pptx"));
        assert!(f.sessions.list_sessions(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_documents_produce_no_index() {
        let f = fixture();
        let empty = f.docs.join("empty.txt");
        std::fs::write(&empty, "   \n\n").unwrap();

        let err = ingestor(&f)
            .ingest(&[empty], Some("blank_session"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContent);

        let (_, index_dir) = f.sessions.paths("blank_session").unwrap();
        assert!(!index_dir.join(MANIFEST_FILE).exists());
        let record = f.sessions.get_session("blank_session").unwrap().unwrap();
        assert!(!record.is_indexed());
    }

    #[tokio::test]
    async fn test_blank_file_is_reported_but_others_indexed() {
        let f = fixture();
        let empty = f.docs.join("empty.md");
        let full = f.docs.join("full.md");
        std::fs::write(&empty, "").unwrap();
        std::fs::write(&full, "Shipping terms are FOB Incheon.").unwrap();

        let report = ingestor(&f).ingest(&[empty, full], None).await.unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.document_count(), 1);

        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].source.ends_with("empty.md"));
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let f = fixture();
        let sub = f.docs.join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(f.docs.join("same.txt"), "one").unwrap();
        std::fs::write(sub.join("same.txt"), "two").unwrap();

        let err = ingestor(&f)
            .ingest(&[f.docs.join("same.txt"), sub.join("same.txt")], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("same.txt"));
    }

    #[tokio::test]
    async fn test_reingest_into_indexed_session_rejected() {
        let f = fixture();
        let file = f.docs.join("a.txt");
        std::fs::write(&file, "Delivery happens every Tuesday.").unwrap();

        let ingestor = ingestor(&f);
        ingestor
            .ingest(&[file.clone()], Some("fixed_id"))
            .await
            .unwrap();

        let second = f.docs.join("b.txt");
        std::fs::write(&second, "Another file.").unwrap();
        let err = ingestor
            .ingest(&[second], Some("fixed_id"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let (upload_dir, _) = f.sessions.paths("fixed_id").unwrap();
        assert!(!upload_dir.join("b.txt").exists());
    }

    #[tokio::test]
    async fn test_no_inputs() {
        let f = fixture();
        let err = ingestor(&f).ingest(&[], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ingestor(&f).ingest(&[f.docs.clone()], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContent);
    }
}
