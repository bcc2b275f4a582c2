//! 에러 분류 체계
//!
//! 코어 컴포넌트는 외부 기능(임베딩, 생성, 파싱, 벡터 저장소)의 `anyhow::Error`를
//! 아래 분류 중 하나로 감싸서 올려보냅니다. 원인은 항상 `source()`로 남습니다.
//!
//! `invoke` 시점의 실패는 [`RagError::Pipeline`] 하나로 모입니다.

use thiserror::Error;

/// 코어 결과 타입
pub type RagResult<T> = std::result::Result<T, RagError>;

// ============================================================================
// Error Kind
// ============================================================================

/// 에러 종류 (닫힌 집합)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Storage,
    IndexNotFound,
    NoContent,
    Ingestion,
    Generation,
    Configuration,
    Pipeline,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::IndexNotFound => "index_not_found",
            ErrorKind::NoContent => "no_content",
            ErrorKind::Ingestion => "ingestion",
            ErrorKind::Generation => "generation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Pipeline => "pipeline",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RagError
// ============================================================================

/// 코어 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 잘못된 호출자 입력 (지원하지 않는 확장자, 잘못된 k, 누락된 retriever 등)
    #[error("Validation error: {0}")]
    Validation(String),

    /// 세션 디렉토리/레지스트리 파일시스템 실패
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 지정된 디렉토리에 유효한 인덱스가 없음
    #[error("Index not found at {path}: {reason}")]
    IndexNotFound { path: String, reason: String },

    /// 인덱싱할 콘텐츠가 없음
    #[error("No content to index: {0}")]
    NoContent(String),

    /// 임베딩 또는 인덱스 빌드 실패
    #[error("Ingestion error: {message}")]
    Ingestion {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 언어 생성 실패 (타임아웃 포함)
    #[error("Generation error: {message}")]
    Generation {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 프롬프트 템플릿/모델 설정 누락
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `invoke` 실패를 감싸는 단일 에러
    #[error("Pipeline error in session {session_id} at stage '{stage}': {source}")]
    Pipeline {
        session_id: String,
        stage: &'static str,
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    pub fn validation(message: impl Into<String>) -> Self {
        RagError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        RagError::Configuration(message.into())
    }

    pub fn storage(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        RagError::Storage {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn ingestion(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        RagError::Ingestion {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn generation(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        RagError::Generation {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn index_not_found(path: &std::path::Path, reason: impl Into<String>) -> Self {
        RagError::IndexNotFound {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// 이 에러의 종류
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Validation(_) => ErrorKind::Validation,
            RagError::Storage { .. } => ErrorKind::Storage,
            RagError::IndexNotFound { .. } => ErrorKind::IndexNotFound,
            RagError::NoContent(_) => ErrorKind::NoContent,
            RagError::Ingestion { .. } => ErrorKind::Ingestion,
            RagError::Generation { .. } => ErrorKind::Generation,
            RagError::Configuration(_) => ErrorKind::Configuration,
            RagError::Pipeline { .. } => ErrorKind::Pipeline,
        }
    }

    /// `Pipeline` 래퍼를 벗겨낸 원래 에러
    pub fn root(&self) -> &RagError {
        let mut current = self;
        while let RagError::Pipeline { source, .. } = current {
            current = source;
        }
        current
    }

    /// 원래 에러의 종류
    pub fn root_kind(&self) -> ErrorKind {
        self.root().kind()
    }
}

// ============================================================================
// Tests
// ============================================================================
