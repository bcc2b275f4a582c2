//! 프롬프트 레지스트리
//!
//! 닫힌 집합 `PromptKind` → 템플릿 매핑입니다. 생성 시점에 모든 종류가 있고
//! 필요한 자리표시자(`{input}` 등)를 포함하는지 검사하며, 아니면 ConfigurationError.

use std::collections::HashMap;

use crate::error::{RagError, RagResult};

/// 프롬프트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// 히스토리를 반영해 질문을 독립 질의로 재작성
    ContextualizeQuestion,
    /// 검색 컨텍스트로 답변
    ContextQa,
}

impl PromptKind {
    pub const ALL: [PromptKind; 2] = [PromptKind::ContextualizeQuestion, PromptKind::ContextQa];

    pub fn key(&self) -> &'static str {
        match self {
            PromptKind::ContextualizeQuestion => "contextualize_question",
            PromptKind::ContextQa => "context_qa",
        }
    }

    /// 템플릿에 반드시 있어야 하는 자리표시자
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            PromptKind::ContextualizeQuestion => &["chat_history", "input"],
            PromptKind::ContextQa => &["context", "chat_history", "input"],
        }
    }
}

const CONTEXTUALIZE_QUESTION_TEMPLATE: &str = "\
Given a conversation history and the most recent user query, rewrite the query as a \
standalone question that makes sense without relying on the previous context. \
Resolve pronouns and references using the conversation. \
Do not provide an answer. Only reformulate the question if necessary; otherwise, \
return it unchanged.

Conversation history:
{chat_history}

Most recent user query:
{input}

Standalone question:";

const CONTEXT_QA_TEMPLATE: &str = "\
You are an assistant designed to answer questions using the provided context. \
Rely only on the retrieved information to form your response. \
If the answer is not found in the context, respond with \"I don't know.\" \
Keep your answer concise and no longer than three sentences.

Context:
{context}

Conversation history:
{chat_history}

Question:
{input}

Answer:";

// ============================================================================
// PromptTemplate
// ============================================================================

/// `{name}` 자리표시자를 가진 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    kind: PromptKind,
    text: String,
}

impl PromptTemplate {
    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 자리표시자 치환 (한 번의 스캔)
    ///
    /// 치환된 값 안의 `{...}`는 다시 해석하지 않으며, 모르는 자리표시자는 그대로 둡니다.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let replaced = after.find('}').and_then(|close| {
                let name = &after[..close];
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value, close))
            });

            match replaced {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

// ============================================================================
// PromptRegistry
// ============================================================================

/// 검증된 프롬프트 매핑
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: HashMap<PromptKind, PromptTemplate>,
}

impl PromptRegistry {
    /// 매핑에서 생성 (누락/자리표시자 누락 시 ConfigurationError)
    pub fn from_map(map: HashMap<PromptKind, String>) -> RagResult<Self> {
        let mut templates = HashMap::new();

        for kind in PromptKind::ALL {
            let text = map.get(&kind).ok_or_else(|| {
                RagError::configuration(format!("Missing prompt template '{}'", kind.key()))
            })?;

            if let Some(missing) = kind
                .required_placeholders()
                .iter()
                .find(|p| !text.contains(&format!("{{{}}}", p)))
            {
                return Err(RagError::configuration(format!(
                    "Prompt template '{}' lacks placeholder {{{}}}",
                    kind.key(),
                    missing
                )));
            }

            templates.insert(
                kind,
                PromptTemplate {
                    kind,
                    text: text.clone(),
                },
            );
        }

        Ok(Self { templates })
    }

    /// 종류별 템플릿
    pub fn get(&self, kind: PromptKind) -> RagResult<&PromptTemplate> {
        self.templates.get(&kind).ok_or_else(|| {
            RagError::configuration(format!("Missing prompt template '{}'", kind.key()))
        })
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        let templates = PromptKind::ALL
            .into_iter()
            .map(|kind| {
                let text = match kind {
                    PromptKind::ContextualizeQuestion => CONTEXTUALIZE_QUESTION_TEMPLATE,
                    PromptKind::ContextQa => CONTEXT_QA_TEMPLATE,
                };
                (
                    kind,
                    PromptTemplate {
                        kind,
                        text: text.to_string(),
                    },
                )
            })
            .collect();

        Self { templates }
    }
}

// ============================================================================
// Tests
// ============================================================================
