//! Chat 모듈 - 대화형 질의응답
//!
//! - History: 호출자가 소유하는 대화 턴
//! - Prompt: 검증된 프롬프트 레지스트리
//! - Rewriter: 후속 질문 → 독립 질의
//! - Pipeline: rewrite → retrieve → format_context → answer

mod history;
mod pipeline;
mod prompt;
mod rewriter;

// Re-exports
pub use history::{format_history, ChatTurn, Role};
pub use pipeline::{ConversationalRag, PipelineState, TurnOutcome, NO_ANSWER_SENTINEL};
pub use prompt::{PromptKind, PromptRegistry, PromptTemplate};
pub use rewriter::QueryRewriter;
