//! 설정 모듈
//!
//! 기본값 → 환경변수 → CLI 플래그 순서로 덮어씁니다.
//! CLI 플래그 적용은 `cli` 모듈에서 처리합니다.
//!
//! 환경변수:
//! - `DOCCHAT_DATA_DIR`: 데이터 디렉토리 (기본: ~/.docchat)
//! - `DOCCHAT_EMBEDDER`: `gemini` | `hash`
//! - `DOCCHAT_CHAT_MODEL`: 생성 모델 이름
//! - `DOCCHAT_TOP_K`, `DOCCHAT_CHUNK_SIZE`, `DOCCHAT_CHUNK_OVERLAP`

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RagError, RagResult};
use crate::knowledge::ChunkConfig;

/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 5;

/// 데이터 디렉토리 경로 (~/.docchat/)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCCHAT_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docchat")
}

// ============================================================================
// Storage
// ============================================================================

/// 세션 저장소 경로 설정
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// 업로드 원본 파일 베이스 (`<upload_base>/<session_id>/`)
    pub upload_base: PathBuf,
    /// 벡터 인덱스 베이스 (`<index_base>/<session_id>/`)
    pub index_base: PathBuf,
    /// 세션 레지스트리 DB 경로
    pub registry_path: PathBuf,
}

impl StorageConfig {
    /// 데이터 디렉토리 하위에 기본 레이아웃 구성
    pub fn under(data_dir: &Path) -> Self {
        Self {
            upload_base: data_dir.join("uploads"),
            index_base: data_dir.join("faiss_index"),
            registry_path: data_dir.join("sessions.db"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under(&get_data_dir())
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// 검색 설정
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// 검색 결과 수 (k)
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

// ============================================================================
// Models
// ============================================================================

/// 임베딩 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Gemini 임베딩 API
    Gemini,
    /// 로컬 feature hashing (네트워크 불필요)
    Hash,
}

impl EmbeddingBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" => Some(EmbeddingBackend::Gemini),
            "hash" | "local" | "offline" => Some(EmbeddingBackend::Hash),
            _ => None,
        }
    }
}

/// 모델 설정
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub embedding_backend: EmbeddingBackend,
    /// 임베딩 차원
    pub embedding_dimension: usize,
    /// 생성 모델 이름
    pub chat_model: String,
    /// 생성 온도
    pub temperature: f32,
    /// 최대 출력 토큰
    pub max_output_tokens: u32,
    /// 외부 호출 타임아웃
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_backend: EmbeddingBackend::Gemini,
            embedding_dimension: crate::embedding::DEFAULT_DIMENSION,
            chat_model: crate::generation::DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// RagConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default)]
pub struct RagConfig {
    pub storage: StorageConfig,
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
    pub models: ModelConfig,
}

impl RagConfig {
    /// 데이터 디렉토리를 지정하여 생성
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            storage: StorageConfig::under(data_dir),
            ..Default::default()
        }
    }

    /// 환경변수를 반영하여 생성
    pub fn from_env() -> RagResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("DOCCHAT_EMBEDDER") {
            config.models.embedding_backend = EmbeddingBackend::parse(&value).ok_or_else(|| {
                RagError::configuration(format!(
                    "DOCCHAT_EMBEDDER must be 'gemini' or 'hash', got '{}'",
                    value
                ))
            })?;
        }

        if let Ok(model) = std::env::var("DOCCHAT_CHAT_MODEL") {
            if !model.trim().is_empty() {
                config.models.chat_model = model.trim().to_string();
            }
        }

        if let Some(k) = read_usize_env("DOCCHAT_TOP_K")? {
            config.retrieval.top_k = k;
        }
        if let Some(size) = read_usize_env("DOCCHAT_CHUNK_SIZE")? {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = read_usize_env("DOCCHAT_CHUNK_OVERLAP")? {
            config.chunking.chunk_overlap = overlap;
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> RagResult<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(RagError::validation("top_k must be greater than 0"));
        }
        Ok(())
    }
}

fn read_usize_env(name: &str) -> RagResult<Option<usize>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| {
                RagError::configuration(format!("{} must be a non-negative integer, got '{}'", name, value))
            }),
        _ => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
