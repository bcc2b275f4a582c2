//! docchat - 세션 단위 멀티 문서 대화형 RAG
//!
//! 업로드한 문서를 세션별 LanceDB 벡터 인덱스로 만들고,
//! 대화 히스토리로 후속 질문을 독립 질의로 재작성한 뒤
//! 검색된 청크에 근거해 답변합니다.

pub mod chat;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod knowledge;
pub mod provider;
pub mod session;

// Re-exports
pub use chat::{
    ChatTurn, ConversationalRag, PipelineState, PromptKind, PromptRegistry, QueryRewriter, Role,
    TurnOutcome, NO_ANSWER_SENTINEL,
};
pub use collector::{FileCollector, FileType};
pub use config::{get_data_dir, RagConfig, StorageConfig};
pub use embedding::{create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding, HashEmbedding};
pub use error::{ErrorKind, RagError, RagResult};
pub use extractor::{ContentExtractor, Document};
pub use generation::{ChatProvider, GeminiChat};
pub use ingest::{DocumentIngestor, FileOutcome, IngestReport};
pub use knowledge::{
    Chunk, ChunkConfig, ChunkRetriever, IndexBuilder, IndexHandle, IndexManifest,
    LanceVectorStore, Retriever, SearchResult,
};
pub use provider::ModelProvider;
pub use session::{Session, SessionRecord, SessionStore};
