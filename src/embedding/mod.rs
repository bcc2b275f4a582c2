//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 두 가지 구현을 제공합니다.
//! - `GeminiEmbedding`: Gemini 임베딩 API (rate limit + 429 재시도)
//! - `HashEmbedding`: 네트워크 없이 동작하는 feature hashing 임베더
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config.models)?;
//! let query = embedder.embed("What is the termination clause?").await?;
//! let docs = embedder.embed_batch(&chunks).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::config::{EmbeddingBackend, ModelConfig};
use crate::error::{RagError, RagResult};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// `embed`는 검색 질의용, `embed_batch`는 문서 청크용입니다.
/// 같은 인덱스의 빌드와 검색은 반드시 같은 프로바이더(이름 + 차원)를 써야 합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩 (질의)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 API 엔드포인트 (gemini-embedding-001 - MRL 지원)
/// ref: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// Gemini 임베딩 모델 이름
pub const GEMINI_EMBED_MODEL: &str = "gemini-embedding-001";

/// 해시 임베더 이름 (매니페스트에 기록)
pub const HASH_EMBED_MODEL: &str = "feature-hash-sha256";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window - now.duration_since(oldest);
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                // 대기 후 다시 정리
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 요청 타임아웃 교체
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(self)
    }

    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        // 유효한 차원 확인
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter,
        })
    }

    /// 단일 요청 (rate limit + 429 재시도)
    async fn request(&self, text: &str, task_type: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        // 요청 본문 구성
        let request = EmbedRequest {
            model: format!("models/{}", GEMINI_EMBED_MODEL),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task_type.to_string(),
            output_dimensionality: Some(self.dimension),
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (429 에러 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            // Rate limiting (매 시도마다)
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let embed_response: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                let values = embed_response.embedding.values;
                if values.len() != self.dimension {
                    anyhow::bail!(
                        "Gemini returned {} dimensions, expected {}",
                        values.len(),
                        self.dimension
                    );
                }
                return Ok(values);
            }

            if status.as_u16() == 429 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    anyhow::bail!(
                        "Gemini API error ({}): {}",
                        error.error.status,
                        error.error.message
                    );
                }
                anyhow::bail!("Gemini API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(text, "RETRIEVAL_QUERY").await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini는 배치 API가 없으므로 순차 처리 (rate limiter가 조절)
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.request(text, "RETRIEVAL_DOCUMENT").await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        GEMINI_EMBED_MODEL
    }
}

// ============================================================================
// Hash Embedding (offline)
// ============================================================================

/// 로컬 feature hashing 임베더
///
/// 토큰(영숫자, 소문자화)을 SHA-256으로 버킷에 배정한 TF 벡터를 L2 정규화합니다.
/// 어휘 사전이 없으므로 같은 텍스트는 프로세스와 무관하게 같은 벡터가 됩니다.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than 0");
        }
        Ok(Self { dimension })
    }

    /// 토큰 → 버킷 인덱스
    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimension as u64) as usize
    }

    /// 동기 임베딩
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut tf = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            tf[self.bucket(&token.to_lowercase())] += 1.0;
        }

        // L2 정규화
        let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut tf {
                *x /= norm;
            }
        }

        tf
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        HASH_EMBED_MODEL
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    // 1. GEMINI_API_KEY 확인
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            tracing::debug!("Using API key from GEMINI_API_KEY");
            return Ok(key);
        }
    }

    // 2. GOOGLE_AI_API_KEY 확인 (대체)
    if let Ok(key) = std::env::var("GOOGLE_AI_API_KEY") {
        if !key.is_empty() {
            tracing::debug!("Using API key from GOOGLE_AI_API_KEY");
            return Ok(key);
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            return true;
        }
    }

    if let Ok(key) = std::env::var("GOOGLE_AI_API_KEY") {
        if !key.is_empty() {
            return true;
        }
    }

    false
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
///
/// Gemini 백엔드는 API 키가 필요하며, 없으면 ConfigurationError.
pub fn create_embedder(config: &ModelConfig) -> RagResult<Arc<dyn EmbeddingProvider>> {
    match config.embedding_backend {
        EmbeddingBackend::Hash => {
            let embedder = HashEmbedding::new(config.embedding_dimension)
                .map_err(|e| RagError::configuration(e.to_string()))?;
            tracing::info!(
                "Using local hash embedding (dimension: {})",
                embedder.dimension()
            );
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Gemini => {
            let api_key = get_api_key().map_err(|e| RagError::configuration(e.to_string()))?;
            let embedder = GeminiEmbedding::with_dimension(api_key, config.embedding_dimension)
                .and_then(|e| e.with_timeout(config.request_timeout))
                .map_err(|e| RagError::configuration(e.to_string()))?;
            tracing::info!(
                "Using Gemini API embedding (dimension: {})",
                embedder.dimension
            );
            Ok(Arc::new(embedder))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimension() {
        let result = GeminiEmbedding::with_dimension("fake_key".to_string(), 999);
        let err = result.err();
        assert!(err
            .as_ref()
            .map(|e| e.to_string().contains("Invalid dimension"))
            .unwrap_or(false));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in [768, 1536, 3072] {
            let result = GeminiEmbedding::with_dimension("fake_key".to_string(), dim);
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_gemini_empty_text_is_zero_vector() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        let v = embedder.embed("   ").await.unwrap();
        assert_eq!(v.len(), DEFAULT_DIMENSION);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hash_embedding_normalized_and_stable() {
        let embedder = HashEmbedding::new(64).unwrap();
        let a = embedder.embed_text("Termination Clause: thirty days notice");
        let b = embedder.embed_text("Termination Clause: thirty days notice");

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_case_and_punctuation_insensitive() {
        let embedder = HashEmbedding::new(128).unwrap();
        assert_eq!(
            embedder.embed_text("Acme contract!"),
            embedder.embed_text("acme CONTRACT")
        );
    }

    #[test]
    fn test_hash_embedding_similarity_ranks_overlap() {
        use crate::knowledge::cosine_similarity;

        let embedder = HashEmbedding::new(DEFAULT_DIMENSION).unwrap();
        let query = embedder.embed_text("What is the termination clause?");
        let relevant = embedder.embed_text("Termination Clause: either party may end the agreement.");
        let other = embedder.embed_text("Payment is due within forty five days of invoice.");

        assert!(cosine_similarity(&query, &relevant) > cosine_similarity(&query, &other));
    }

    #[test]
    fn test_hash_embedding_zero_dimension_rejected() {
        assert!(HashEmbedding::new(0).is_err());
    }

    #[test]
    fn test_create_hash_embedder_from_config() {
        let config = ModelConfig {
            embedding_backend: EmbeddingBackend::Hash,
            embedding_dimension: 32,
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.name(), HASH_EMBED_MODEL);
    }
}
