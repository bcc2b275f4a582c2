//! Index Builder - 세션 벡터 인덱스 빌드
//!
//! 청킹 → 임베딩 → LanceDB 테이블 → `manifest.json` 순서로 임시 디렉토리
//! (`<index_base>/.<session_id>.tmp-<rand>`)에 쓰고, 매니페스트까지 쓴 뒤에만
//! `<index_base>/<session_id>`로 rename 합니다. 실패하면 임시 디렉토리를 지우므로
//! 매니페스트가 있는 인덱스 디렉토리는 항상 완성된 인덱스입니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunker::{Chunk, ChunkConfig, Chunker, RecursiveChunker};
use super::lance::LanceVectorStore;
use super::vector::{is_zero_vector, VectorEntry, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::extractor::Document;
use crate::session::Session;

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "manifest.json";

/// 매니페스트 포맷 버전
pub const MANIFEST_VERSION: u32 = 1;

// ============================================================================
// Manifest
// ============================================================================

/// 인덱스 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub session_id: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    /// 인덱스 디렉토리에서 매니페스트 읽기
    ///
    /// 없거나 읽을 수 없으면 IndexNotFound.
    pub fn read(index_dir: &Path) -> RagResult<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(RagError::index_not_found(index_dir, "manifest.json is missing"));
        }

        let bytes = std::fs::read(&path)
            .map_err(|e| RagError::index_not_found(index_dir, format!("unreadable manifest: {}", e)))?;
        let manifest: IndexManifest = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::index_not_found(index_dir, format!("invalid manifest: {}", e)))?;

        if manifest.format_version != MANIFEST_VERSION {
            return Err(RagError::index_not_found(
                index_dir,
                format!("unsupported manifest version {}", manifest.format_version),
            ));
        }

        Ok(manifest)
    }

    /// 매니페스트가 있는지
    pub fn exists(index_dir: &Path) -> bool {
        index_dir.join(MANIFEST_FILE).is_file()
    }

    fn write(&self, dir: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

/// 빌드된 인덱스 핸들
#[derive(Debug, Clone)]
pub struct IndexHandle {
    pub index_dir: PathBuf,
    pub manifest: IndexManifest,
}

impl IndexHandle {
    pub fn session_id(&self) -> &str {
        &self.manifest.session_id
    }

    pub fn chunk_count(&self) -> usize {
        self.manifest.chunk_count
    }
}

// ============================================================================
// IndexBuilder
// ============================================================================

/// 세션 인덱스 빌더
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: RecursiveChunker,
}

impl IndexBuilder {
    /// `chunk_overlap >= chunk_size`이면 ValidationError.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chunk_config: ChunkConfig) -> RagResult<Self> {
        Ok(Self {
            embedder,
            chunker: RecursiveChunker::new(chunk_config)?,
        })
    }

    /// 세션 문서로 인덱스 빌드
    pub async fn build(&self, session: &Session, documents: &[Document]) -> RagResult<IndexHandle> {
        let usable: Vec<Document> = documents
            .iter()
            .filter(|d| !d.is_blank())
            .cloned()
            .collect();

        if usable.is_empty() {
            return Err(RagError::NoContent(format!(
                "session {} has no ingestible documents ({} supplied)",
                session.id,
                documents.len()
            )));
        }

        if IndexManifest::exists(&session.index_dir) {
            return Err(RagError::validation(format!(
                "Index for session {} already exists at {:?}",
                session.id, session.index_dir
            )));
        }

        let chunks = self.chunker.split(&usable);
        if chunks.is_empty() {
            return Err(RagError::NoContent(format!(
                "session {} produced no chunks",
                session.id
            )));
        }

        tracing::info!(
            "Building index for {}: {} documents, {} chunks",
            session.id,
            usable.len(),
            chunks.len()
        );

        let entries = self.embed_chunks(chunks).await?;
        if entries.is_empty() {
            return Err(RagError::NoContent(format!(
                "session {} has no chunks with searchable terms",
                session.id
            )));
        }

        // 영벡터만 남긴 문서는 인덱스에 없으므로 청크 기준으로 집계
        let mut sources: Vec<String> = Vec::new();
        for entry in &entries {
            if !sources.contains(&entry.chunk.source) {
                sources.push(entry.chunk.source.clone());
            }
        }

        let manifest = IndexManifest {
            format_version: MANIFEST_VERSION,
            session_id: session.id.clone(),
            embedding_model: self.embedder.name().to_string(),
            dimension: self.embedder.dimension(),
            chunk_count: entries.len(),
            document_count: sources.len(),
            sources,
            created_at: Utc::now(),
        };

        let staging = staging_dir(&session.index_dir, &session.id)?;
        std::fs::create_dir_all(&staging)
            .map_err(|e| RagError::storage("Failed to create staging directory", e))?;

        let result = self.persist(&staging, &entries, &manifest).await;
        let result = result.and_then(|_| promote(&staging, &session.index_dir));

        if let Err(e) = result {
            if staging.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    tracing::warn!("Failed to remove staging dir {:?}: {}", staging, cleanup);
                }
            }
            return Err(e);
        }

        tracing::info!(
            "Index persisted for {} at {:?} ({} chunks)",
            session.id,
            session.index_dir,
            manifest.chunk_count
        );

        Ok(IndexHandle {
            index_dir: session.index_dir.clone(),
            manifest,
        })
    }

    /// 청크 임베딩 (실패 시 IngestionError)
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> RagResult<Vec<VectorEntry>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            RagError::ingestion(
                format!("Embedding {} chunks with {} failed", texts.len(), self.embedder.name()),
                e,
            )
        })?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::ingestion(
                "Embedding count mismatch",
                anyhow::anyhow!("expected {}, got {}", chunks.len(), embeddings.len()),
            ));
        }

        // 영벡터는 코사인 거리가 정의되지 않으므로 저장하지 않음
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            if is_zero_vector(&embedding) {
                tracing::warn!(
                    "Skipping chunk {}#{} with no embeddable terms",
                    chunk.source,
                    chunk.chunk_index
                );
                continue;
            }
            entries.push(VectorEntry { chunk, embedding });
        }

        Ok(entries)
    }

    /// 임시 디렉토리에 벡터 + 매니페스트 기록
    async fn persist(
        &self,
        staging: &Path,
        entries: &[VectorEntry],
        manifest: &IndexManifest,
    ) -> RagResult<()> {
        let store = LanceVectorStore::open(staging, manifest.dimension)
            .await
            .map_err(|e| RagError::ingestion("Failed to open vector store", e))?;

        store
            .insert_batch(entries)
            .await
            .map_err(|e| RagError::ingestion("Failed to write vectors", e))?;

        manifest
            .write(staging)
            .map_err(|e| RagError::storage("Failed to write index manifest", e))?;

        Ok(())
    }
}

/// `<index_base>/.<session_id>.tmp-<rand>`
fn staging_dir(index_dir: &Path, session_id: &str) -> RagResult<PathBuf> {
    let parent = index_dir.parent().ok_or_else(|| {
        RagError::storage(
            "Index directory has no parent",
            anyhow::anyhow!("{:?}", index_dir),
        )
    })?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(parent.join(format!(".{}.tmp-{}", session_id, &suffix[..8])))
}

/// 임시 디렉토리를 최종 위치로 이동
///
/// 세션 저장소가 만든 빈 디렉토리는 먼저 제거합니다.
fn promote(staging: &Path, index_dir: &Path) -> RagResult<()> {
    if index_dir.is_dir() {
        std::fs::remove_dir(index_dir).map_err(|e| {
            RagError::storage(format!("Index directory {:?} is not empty", index_dir), e)
        })?;
    }

    if let Err(e) = std::fs::rename(staging, index_dir) {
        // 세션 인덱스 디렉토리는 항상 존재해야 함
        if let Err(restore) = std::fs::create_dir_all(index_dir) {
            tracing::warn!("Failed to restore index dir {:?}: {}", index_dir, restore);
        }
        return Err(RagError::storage("Failed to move index into place", e));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
