//! Knowledge 모듈 - 세션 단위 벡터 인덱스
//!
//! - Chunker: 재귀 분할 + 겹침 청킹
//! - LanceDB: 세션별 벡터 테이블
//! - Index: 임시 디렉토리 빌드 후 rename, `manifest.json`
//! - Retriever: 저장된 인덱스 위의 유사도 검색

mod chunker;
mod index;
mod lance;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{split_documents, Chunk, ChunkConfig, Chunker, RecursiveChunker};
pub use index::{IndexBuilder, IndexHandle, IndexManifest, MANIFEST_FILE, MANIFEST_VERSION};
pub use lance::{LanceVectorStore, TABLE_NAME};
pub use retriever::{ChunkRetriever, Retriever};
pub use vector::{
    cosine_similarity, is_zero_vector, sort_by_similarity, SearchResult, VectorEntry, VectorStore,
};
