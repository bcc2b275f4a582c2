//! Query Rewriter - 후속 질문을 독립 질의로 재작성

use std::sync::Arc;

use super::history::{format_history, ChatTurn};
use super::prompt::{PromptKind, PromptRegistry, PromptTemplate};
use crate::error::{RagError, RagResult};
use crate::generation::ChatProvider;

/// 질의 재작성기
pub struct QueryRewriter {
    chat: Arc<dyn ChatProvider>,
    template: PromptTemplate,
}

impl QueryRewriter {
    pub fn new(chat: Arc<dyn ChatProvider>, prompts: &PromptRegistry) -> RagResult<Self> {
        Ok(Self {
            chat,
            template: prompts.get(PromptKind::ContextualizeQuestion)?.clone(),
        })
    }

    /// 히스토리를 반영한 독립 질의
    ///
    /// 히스토리가 비어 있으면 모델을 호출하지 않고 입력을 그대로 돌려줍니다.
    /// 모델이 빈 문자열을 주면 입력을 씁니다.
    pub async fn rewrite(&self, history: &[ChatTurn], input: &str) -> RagResult<String> {
        if history.is_empty() {
            return Ok(input.to_string());
        }

        let history_text = format_history(history);
        let prompt = self
            .template
            .render(&[("chat_history", history_text.as_str()), ("input", input)]);

        let rewritten = self.chat.generate(&prompt).await.map_err(|e| {
            RagError::generation(format!("Query rewrite with {} failed", self.chat.name()), e)
        })?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            tracing::warn!("Rewriter returned empty text, using original input");
            return Ok(input.to_string());
        }

        tracing::debug!("Rewrote query ({} turns of history)", history.len());
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedChat {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedChat {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for FixedChat {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_empty_history_returns_input_unchanged() {
        let chat = Arc::new(FixedChat::replying("something else"));
        let rewriter = QueryRewriter::new(chat.clone(), &PromptRegistry::default()).unwrap();

        let out = rewriter.rewrite(&[], "What is the termination clause?").await.unwrap();
        assert_eq!(out, "What is the termination clause?");
        assert!(chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_goes_into_prompt() {
        let chat = Arc::new(FixedChat::replying(
            "  What is the expiration date of the Acme contract?\n",
        ));
        let rewriter = QueryRewriter::new(chat.clone(), &PromptRegistry::default()).unwrap();

        let history = vec![
            ChatTurn::user("Summarize the Acme contract."),
            ChatTurn::assistant("The Acme contract covers widget supply."),
        ];
        let out = rewriter
            .rewrite(&history, "What is its expiration date?")
            .await
            .unwrap();

        assert_eq!(out, "What is the expiration date of the Acme contract?");
        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User: Summarize the Acme contract."));
        assert!(prompts[0].contains("What is its expiration date?"));
    }

    #[tokio::test]
    async fn test_blank_rewrite_falls_back_to_input() {
        let chat = Arc::new(FixedChat::replying("   "));
        let rewriter = QueryRewriter::new(chat, &PromptRegistry::default()).unwrap();

        let out = rewriter
            .rewrite(&[ChatTurn::user("hi")], "and then?")
            .await
            .unwrap();
        assert_eq!(out, "and then?");
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let chat = Arc::new(FixedChat {
            reply: Err(anyhow::anyhow!("503 unavailable")),
            prompts: Mutex::new(Vec::new()),
        });
        let rewriter = QueryRewriter::new(chat, &PromptRegistry::default()).unwrap();

        let err = rewriter
            .rewrite(&[ChatTurn::user("hi")], "and then?")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
    }
}
