//! Retriever - 저장된 세션 인덱스 위의 읽기 전용 유사도 검색

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::index::IndexManifest;
use super::lance::LanceVectorStore;
use super::vector::{is_zero_vector, SearchResult, VectorStore};
use crate::config::DEFAULT_TOP_K;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};

// ============================================================================
// ChunkRetriever Trait
// ============================================================================

/// 유사도 검색 기능
///
/// 구현체는 읽기 전용이어야 하며 여러 호출자가 동시에 써도 안전해야 합니다.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    /// 질의와 가장 비슷한 청크 최대 `k`개 (유사도 내림차순)
    async fn search(&self, query: &str, k: usize) -> RagResult<Vec<SearchResult>>;
}

// ============================================================================
// Retriever
// ============================================================================

/// LanceDB 세션 인덱스 리트리버
pub struct Retriever {
    index_dir: PathBuf,
    manifest: IndexManifest,
    store: LanceVectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    default_k: usize,
}

impl Retriever {
    /// 인덱스 디렉토리에서 로드
    ///
    /// 매니페스트나 청크 테이블이 없으면 IndexNotFound,
    /// 인덱스를 만든 임베더와 다른 임베더를 주면 ConfigurationError.
    pub async fn load(index_dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> RagResult<Self> {
        let manifest = IndexManifest::read(index_dir)?;

        if manifest.embedding_model != embedder.name() || manifest.dimension != embedder.dimension() {
            return Err(RagError::configuration(format!(
                "Index was built with {} ({} dims) but the embedder is {} ({} dims)",
                manifest.embedding_model,
                manifest.dimension,
                embedder.name(),
                embedder.dimension()
            )));
        }

        let store = LanceVectorStore::open_existing(index_dir)
            .await
            .map_err(|e| RagError::index_not_found(index_dir, format!("unreadable vector table: {:#}", e)))?
            .ok_or_else(|| RagError::index_not_found(index_dir, "chunk table is missing"))?;

        if store.dimension() != manifest.dimension {
            return Err(RagError::index_not_found(
                index_dir,
                format!(
                    "vector table has {} dims but manifest says {}",
                    store.dimension(),
                    manifest.dimension
                ),
            ));
        }

        tracing::info!(
            "Retriever loaded from {:?} ({} chunks, session {})",
            index_dir,
            manifest.chunk_count,
            manifest.session_id
        );

        Ok(Self {
            index_dir: index_dir.to_path_buf(),
            manifest,
            store,
            embedder,
            default_k: DEFAULT_TOP_K,
        })
    }

    /// 기본 k 교체
    pub fn with_default_k(mut self, k: usize) -> RagResult<Self> {
        validate_k(k)?;
        self.default_k = k;
        Ok(self)
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// 기본 k로 검색
    pub async fn search_default(&self, query: &str) -> RagResult<Vec<SearchResult>> {
        self.search(query, self.default_k).await
    }
}

fn validate_k(k: usize) -> RagResult<()> {
    if k == 0 {
        return Err(RagError::validation("k must be greater than 0"));
    }
    Ok(())
}

#[async_trait]
impl ChunkRetriever for Retriever {
    async fn search(&self, query: &str, k: usize) -> RagResult<Vec<SearchResult>> {
        validate_k(k)?;
        if query.trim().is_empty() {
            return Err(RagError::validation("Search query must not be empty"));
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RagError::ingestion("Failed to embed search query", e))?;

        if is_zero_vector(&query_embedding) {
            return Err(RagError::validation(format!(
                "Search query has no searchable terms: '{}'",
                query.trim()
            )));
        }

        let results = self
            .store
            .search(&query_embedding, k)
            .await
            .map_err(|e| RagError::storage("Vector search failed", e))?;

        tracing::debug!("Retrieved {} chunks (k={})", results.len(), k);
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
