//! 모델 프로바이더
//!
//! 임베딩 + 생성 기능을 한 번 만들어 인덱스 빌더, 리트리버, 파이프라인에
//! 주입합니다. 전역 싱글톤은 없으며 수명은 호출자가 관리합니다.

use std::sync::Arc;

use crate::config::ModelConfig;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::RagResult;
use crate::generation::{ChatProvider, GeminiChat};

/// 임베딩/생성 기능 묶음
#[derive(Clone)]
pub struct ModelProvider {
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
}

impl ModelProvider {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
        Self { embedder, chat }
    }

    /// 설정에서 생성
    ///
    /// 생성 모델은 항상 Gemini이므로 API 키가 없으면 ConfigurationError.
    pub fn from_config(config: &ModelConfig) -> RagResult<Self> {
        let embedder = create_embedder(config)?;
        let chat = GeminiChat::from_config(config)?;
        tracing::info!(
            "Model provider ready (embedding: {}, chat: {})",
            embedder.name(),
            chat.name()
        );
        Ok(Self::new(embedder, Arc::new(chat)))
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    pub fn chat(&self) -> Arc<dyn ChatProvider> {
        Arc::clone(&self.chat)
    }
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.embedder.dimension())
            .field("chat", &self.chat.name())
            .finish()
    }
}
