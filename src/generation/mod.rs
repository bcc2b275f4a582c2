//! 생성 모듈 - 언어 모델 호출
//!
//! 프롬프트 문자열을 받아 응답 텍스트를 돌려주는 `ChatProvider`와
//! Gemini `generateContent` 구현체를 제공합니다.
//! 코어는 재시도하지 않으므로 이 모듈도 요청당 한 번만 호출합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::embedding::get_api_key;
use crate::error::{RagError, RagResult};

/// 기본 생성 모델
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ============================================================================
// ChatProvider Trait
// ============================================================================

/// 언어 생성 프로바이더 트레이트
///
/// 구현체는 호출마다 상태가 없거나 내부적으로 동기화되어야 합니다.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 프롬프트 → 응답 텍스트 (비어 있을 수 있음)
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Chat
// ============================================================================

/// Gemini `generateContent` 구현체
#[derive(Debug)]
pub struct GeminiChat {
    api_key: String,
    model: String,
    client: reqwest::Client,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiChat {
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `model` - 모델 이름 (예: gemini-2.0-flash)
    /// * `timeout` - 요청 타임아웃
    pub fn new(api_key: String, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            client,
            temperature: 0.2,
            max_output_tokens: 2048,
        })
    }

    /// 설정에서 생성 (API 키 필요)
    pub fn from_config(config: &ModelConfig) -> RagResult<Self> {
        let api_key = get_api_key().map_err(|e| RagError::configuration(e.to_string()))?;
        let mut chat = Self::new(api_key, config.chat_model.clone(), config.request_timeout)
            .map_err(|e| RagError::configuration(e.to_string()))?;
        chat.temperature = config.temperature;
        chat.max_output_tokens = config.max_output_tokens;
        Ok(chat)
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }
}

#[async_trait]
impl ChatProvider for GeminiChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generateContent response")?;

        Ok(parsed.first_text())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// 첫 후보의 텍스트 파트를 이어 붙임 (없으면 빈 문자열)
    fn first_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
