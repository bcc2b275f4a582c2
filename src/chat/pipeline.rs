//! Answer Pipeline - 세션 대화형 RAG
//!
//! 한 턴은 이름 있는 단계 목록을 순서대로 실행합니다.
//!
//! ```text
//! rewrite → retrieve → format_context → answer
//! ```
//!
//! - `rewrite`: 히스토리로 독립 질의 생성
//! - `retrieve`: 독립 질의로 유사도 검색
//! - `format_context`: 청크 텍스트를 빈 줄로 연결
//! - `answer`: 컨텍스트 + 원래 입력 + 히스토리로 답변 생성
//!
//! 어느 단계에서 실패하든 호출자는 `RagError::Pipeline` 하나만 받습니다.
//! 실패한 턴은 파이프라인 상태에 영향을 주지 않습니다.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::history::{format_history, ChatTurn};
use super::prompt::{PromptKind, PromptRegistry, PromptTemplate};
use super::rewriter::QueryRewriter;
use crate::config::DEFAULT_TOP_K;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::generation::ChatProvider;
use crate::knowledge::{ChunkRetriever, Retriever, SearchResult};
use crate::provider::ModelProvider;

/// 답변이 비었을 때 돌려주는 문자열
pub const NO_ANSWER_SENTINEL: &str = "No answer generated";

/// 로그 미리보기 길이 (문자 수)
const INPUT_PREVIEW_CHARS: usize = 80;
const ANSWER_PREVIEW_CHARS: usize = 150;

// ============================================================================
// State
// ============================================================================

/// 파이프라인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// 리트리버가 아직 없음
    Uninitialized,
    /// 호출 가능
    Ready,
    /// 진행 중인 호출이 있음
    Answering,
    /// 리트리버 로드 실패 (재로드 전까지 호출 불가)
    Failed,
}

/// 한 턴의 결과
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// 답변 (비었으면 [`NO_ANSWER_SENTINEL`])
    pub answer: String,
    /// 검색에 쓴 독립 질의
    pub standalone_query: String,
    /// 검색된 청크 (유사도 내림차순)
    pub retrieved: Vec<SearchResult>,
    /// sentinel을 돌려줬는지
    pub used_sentinel: bool,
}

// ============================================================================
// Steps
// ============================================================================

/// 턴 진행 중 단계 사이에 넘기는 값
#[derive(Debug, Default)]
struct TurnState {
    input: String,
    history: Vec<ChatTurn>,
    standalone_query: String,
    retrieved: Vec<SearchResult>,
    context: String,
    answer: String,
}

/// 파이프라인 단계
enum Step {
    Rewrite(Arc<QueryRewriter>),
    Retrieve {
        retriever: Arc<dyn ChunkRetriever>,
        k: usize,
    },
    FormatContext,
    Answer {
        chat: Arc<dyn ChatProvider>,
        template: PromptTemplate,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Rewrite(_) => "rewrite",
            Step::Retrieve { .. } => "retrieve",
            Step::FormatContext => "format_context",
            Step::Answer { .. } => "answer",
        }
    }

    async fn run(&self, turn: &mut TurnState) -> RagResult<()> {
        match self {
            Step::Rewrite(rewriter) => {
                turn.standalone_query = rewriter.rewrite(&turn.history, &turn.input).await?;
            }
            Step::Retrieve { retriever, k } => {
                turn.retrieved = retriever.search(&turn.standalone_query, *k).await?;
            }
            Step::FormatContext => {
                turn.context = turn
                    .retrieved
                    .iter()
                    .map(|r| r.chunk.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
            }
            Step::Answer { chat, template } => {
                let history_text = format_history(&turn.history);
                let prompt = template.render(&[
                    ("context", turn.context.as_str()),
                    ("chat_history", history_text.as_str()),
                    ("input", turn.input.as_str()),
                ]);

                turn.answer = chat.generate(&prompt).await.map_err(|e| {
                    RagError::generation(format!("Answer generation with {} failed", chat.name()), e)
                })?;
            }
        }
        Ok(())
    }
}

/// 진행 중 호출 수를 세는 가드
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// ConversationalRag
// ============================================================================

/// 세션 대화형 RAG 파이프라인
pub struct ConversationalRag {
    session_id: String,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    rewriter: Arc<QueryRewriter>,
    answer_template: PromptTemplate,
    retriever: Option<Arc<dyn ChunkRetriever>>,
    top_k: usize,
    steps: Vec<Step>,
    failure: Option<String>,
    in_flight: AtomicUsize,
}

impl ConversationalRag {
    /// 리트리버와 함께 생성 (Ready)
    ///
    /// 리트리버가 없으면 ValidationError, 템플릿이 없으면 ConfigurationError.
    pub fn build(
        session_id: impl Into<String>,
        retriever: Option<Arc<dyn ChunkRetriever>>,
        models: &ModelProvider,
        prompts: &PromptRegistry,
    ) -> RagResult<Self> {
        let session_id = session_id.into();
        let retriever = retriever.ok_or_else(|| {
            RagError::validation(format!("Retriever is required for session {}", session_id))
        })?;

        let mut pipeline = Self::uninitialized(session_id, models, prompts)?;
        pipeline.install(retriever);

        tracing::info!("Conversational pipeline ready for session {}", pipeline.session_id);
        Ok(pipeline)
    }

    /// 리트리버 없이 생성 (Uninitialized, `load_retriever`로 준비)
    pub fn uninitialized(
        session_id: impl Into<String>,
        models: &ModelProvider,
        prompts: &PromptRegistry,
    ) -> RagResult<Self> {
        let chat = models.chat();
        let rewriter = QueryRewriter::new(Arc::clone(&chat), prompts)?;
        let answer_template = prompts.get(PromptKind::ContextQa)?.clone();

        Ok(Self {
            session_id: session_id.into(),
            embedder: models.embedder(),
            chat,
            rewriter: Arc::new(rewriter),
            answer_template,
            retriever: None,
            top_k: DEFAULT_TOP_K,
            steps: Vec::new(),
            failure: None,
            in_flight: AtomicUsize::new(0),
        })
    }

    /// 검색 결과 수 지정 (0이면 ValidationError)
    pub fn with_top_k(mut self, k: usize) -> RagResult<Self> {
        if k == 0 {
            return Err(RagError::validation("k must be greater than 0"));
        }
        self.top_k = k;
        if let Some(retriever) = self.retriever.clone() {
            self.install(retriever);
        }
        Ok(self)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        if self.failure.is_some() {
            PipelineState::Failed
        } else if self.retriever.is_none() {
            PipelineState::Uninitialized
        } else if self.in_flight.load(Ordering::SeqCst) > 0 {
            PipelineState::Answering
        } else {
            PipelineState::Ready
        }
    }

    /// 단계 이름 (실행 순서)
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::name).collect()
    }

    /// 디스크에서 리트리버를 다시 로드하고 단계 목록 재구성
    ///
    /// 실패하면 Failed 상태가 되고 에러를 그대로 돌려줍니다.
    pub async fn load_retriever(&mut self, index_dir: &Path) -> RagResult<()> {
        match Retriever::load(index_dir, Arc::clone(&self.embedder)).await {
            Ok(retriever) => {
                self.install(Arc::new(retriever));
                tracing::info!(
                    "Retriever loaded for session {} from {:?}",
                    self.session_id,
                    index_dir
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Failed to load retriever for session {}: {}",
                    self.session_id,
                    e
                );
                self.retriever = None;
                self.steps.clear();
                self.failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn install(&mut self, retriever: Arc<dyn ChunkRetriever>) {
        self.steps = vec![
            Step::Rewrite(Arc::clone(&self.rewriter)),
            Step::Retrieve {
                retriever: Arc::clone(&retriever),
                k: self.top_k,
            },
            Step::FormatContext,
            Step::Answer {
                chat: Arc::clone(&self.chat),
                template: self.answer_template.clone(),
            },
        ];
        self.retriever = Some(retriever);
        self.failure = None;
    }

    /// 답변만 반환
    pub async fn invoke(&self, user_input: &str, history: Option<&[ChatTurn]>) -> RagResult<String> {
        self.invoke_detailed(user_input, history)
            .await
            .map(|outcome| outcome.answer)
    }

    /// 한 턴 실행
    ///
    /// `history`가 없으면 빈 히스토리로 취급합니다. 답변이 비었으면 에러 대신
    /// [`NO_ANSWER_SENTINEL`]을 돌려줍니다.
    pub async fn invoke_detailed(
        &self,
        user_input: &str,
        history: Option<&[ChatTurn]>,
    ) -> RagResult<TurnOutcome> {
        let history = history.unwrap_or(&[]);
        let input_preview = preview(user_input, INPUT_PREVIEW_CHARS);

        if let Some(reason) = &self.failure {
            return Err(self.wrap("init", RagError::configuration(format!(
                "pipeline is in failed state: {}",
                reason
            ))));
        }
        if self.retriever.is_none() {
            return Err(self.wrap("init", RagError::configuration("no retriever loaded")));
        }

        let _guard = InFlight::enter(&self.in_flight);

        tracing::info!(
            session_id = %self.session_id,
            history_len = history.len(),
            "Invoking pipeline: {}",
            input_preview
        );

        let mut turn = TurnState {
            input: user_input.to_string(),
            history: history.to_vec(),
            ..Default::default()
        };

        for step in &self.steps {
            if let Err(e) = step.run(&mut turn).await {
                tracing::error!(
                    session_id = %self.session_id,
                    stage = step.name(),
                    history_len = history.len(),
                    "Pipeline failed for input '{}': {}",
                    input_preview,
                    e
                );
                return Err(self.wrap(step.name(), e));
            }
        }

        let used_sentinel = turn.answer.trim().is_empty();
        let answer = if used_sentinel {
            tracing::warn!(
                session_id = %self.session_id,
                history_len = history.len(),
                "No answer generated for '{}'",
                input_preview
            );
            NO_ANSWER_SENTINEL.to_string()
        } else {
            tracing::info!(
                session_id = %self.session_id,
                retrieved = turn.retrieved.len(),
                "Answered: {}",
                preview(&turn.answer, ANSWER_PREVIEW_CHARS)
            );
            turn.answer
        };

        Ok(TurnOutcome {
            answer,
            standalone_query: turn.standalone_query,
            retrieved: turn.retrieved,
            used_sentinel,
        })
    }

    fn wrap(&self, stage: &'static str, source: RagError) -> RagError {
        RagError::Pipeline {
            session_id: self.session_id.clone(),
            stage,
            source: Box::new(source),
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::embedding::HashEmbedding;
    use crate::error::ErrorKind;
    use crate::extractor::Document;
    use crate::knowledge::{ChunkConfig, IndexBuilder};
    use crate::session::SessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DIM: usize = 256;

    /// 재작성 프롬프트와 답변 프롬프트에 각각 정해진 응답을 주는 모델
    struct ScriptedChat {
        rewrite_reply: Result<String, String>,
        answer_reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(rewrite_reply: &str, answer_reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                rewrite_reply: Ok(rewrite_reply.to_string()),
                answer_reply: answer_reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }

        /// 재작성 호출만 실패
        fn failing_rewrite(error: &str) -> Arc<Self> {
            Arc::new(Self {
                rewrite_reply: Err(error.to_string()),
                answer_reply: Ok("unused".to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains("Standalone question:") {
                return self.rewrite_reply.clone().map_err(|e| anyhow::anyhow!(e));
            }
            match &self.answer_reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => anyhow::bail!("{}", e),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("embedding service down")
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            crate::embedding::HASH_EMBED_MODEL
        }
    }

    fn contract_text() -> String {
        [
            "Acme Supply Agreement between Acme Corp and Widget LLC.",
            "Termination Clause: either party may terminate this agreement with thirty days written notice.",
            "Payment Terms: invoices are payable within forty five days of receipt.",
            "Expiration: the Acme contract expires on December 31, 2027 unless renewed.",
            "Confidentiality: both parties keep shared information secret for five years.",
            "Governing Law: this agreement is governed by the laws of Delaware.",
            "Warranty: the supplier warrants the goods against defects for one year.",
            "Liability: damages are capped at the total contract value.",
        ]
        .join("\n\n")
    }

    /// 세션 + 인덱스를 만들고 (임시 디렉토리, 인덱스 경로) 반환
    async fn indexed_session() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(&StorageConfig::under(dir.path())).unwrap();
        let session = store.create_session(None).unwrap();

        IndexBuilder::new(Arc::new(HashEmbedding::new(DIM).unwrap()), ChunkConfig::new(120, 20))
            .unwrap()
            .build(&session, &[Document::from_text("acme.txt", contract_text())])
            .await
            .unwrap();

        (dir, session.index_dir)
    }

    fn models(chat: Arc<ScriptedChat>) -> ModelProvider {
        ModelProvider::new(Arc::new(HashEmbedding::new(DIM).unwrap()), chat)
    }

    async fn ready_pipeline(chat: Arc<ScriptedChat>) -> (TempDir, ConversationalRag) {
        let (dir, index_dir) = indexed_session().await;
        let models = models(chat);
        let retriever = Retriever::load(&index_dir, models.embedder()).await.unwrap();
        let pipeline = ConversationalRag::build(
            "session_test",
            Some(Arc::new(retriever)),
            &models,
            &PromptRegistry::default(),
        )
        .unwrap();
        (dir, pipeline)
    }

    #[tokio::test]
    async fn test_steps_in_order() {
        let (_dir, pipeline) = ready_pipeline(ScriptedChat::new("", Ok("ok"))).await;
        assert_eq!(
            pipeline.step_names(),
            vec!["rewrite", "retrieve", "format_context", "answer"]
        );
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[tokio::test]
    async fn test_termination_clause_is_retrieved() {
        let chat = ScriptedChat::new("unused", Ok("Either party may terminate with thirty days notice."));
        let (_dir, pipeline) = ready_pipeline(chat.clone()).await;

        let outcome = pipeline
            .invoke_detailed("What is the termination clause?", None)
            .await
            .unwrap();

        assert!(!outcome.used_sentinel);
        assert_ne!(outcome.answer, NO_ANSWER_SENTINEL);
        assert_eq!(outcome.standalone_query, "What is the termination clause?");
        assert!(outcome.retrieved.len() <= DEFAULT_TOP_K);
        assert!(outcome
            .retrieved
            .iter()
            .any(|r| r.chunk.text.contains("Termination Clause:")));

        // 히스토리가 없으면 재작성 호출 없이 답변 한 번만
        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Termination Clause:"));
        assert!(prompts[0].contains("What is the termination clause?"));
    }

    #[tokio::test]
    async fn test_follow_up_is_rewritten_before_retrieval() {
        let chat = ScriptedChat::new(
            "What is the expiration date of the Acme contract?",
            Ok("It expires on December 31, 2027."),
        );
        let (_dir, pipeline) = ready_pipeline(chat.clone()).await;

        let history = vec![
            ChatTurn::user("Tell me about the Acme contract."),
            ChatTurn::assistant("The Acme contract is a supply agreement with Widget LLC."),
        ];
        let outcome = pipeline
            .invoke_detailed("What is its expiration date?", Some(history.as_slice()))
            .await
            .unwrap();

        assert!(outcome.standalone_query.contains("Acme contract"));
        assert!(outcome
            .retrieved
            .iter()
            .any(|r| r.chunk.text.contains("expires on December 31, 2027")));

        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 2);
        // 재작성 프롬프트에는 히스토리가 들어감
        assert!(prompts[0].contains("Tell me about the Acme contract."));
        // 답변 프롬프트에는 원래 입력이 들어감
        assert!(prompts[1].contains("What is its expiration date?"));
        assert!(prompts[1].contains("Assistant: The Acme contract is a supply agreement"));
    }

    #[tokio::test]
    async fn test_empty_answer_returns_sentinel() {
        let (_dir, pipeline) = ready_pipeline(ScriptedChat::new("", Ok("   "))).await;

        let answer = pipeline
            .invoke("What is the termination clause?", Some(&[][..]))
            .await
            .unwrap();
        assert_eq!(answer, "No answer generated");
    }

    #[tokio::test]
    async fn test_generation_failure_is_single_pipeline_error() {
        let (_dir, pipeline) =
            ready_pipeline(ScriptedChat::new("", Err("model overloaded"))).await;

        let err = pipeline
            .invoke("What is the termination clause?", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Pipeline);
        assert_eq!(err.root_kind(), ErrorKind::Generation);
        match &err {
            RagError::Pipeline { stage, session_id, source } => {
                assert_eq!(*stage, "answer");
                assert_eq!(session_id, "session_test");
                assert_eq!(source.kind(), ErrorKind::Generation);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // 실패한 턴 이후에도 Ready
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[tokio::test]
    async fn test_rewrite_failure_is_single_pipeline_error() {
        let chat = ScriptedChat::failing_rewrite("rewrite model timed out");
        let (_dir, pipeline) = ready_pipeline(chat.clone()).await;

        let history = vec![
            ChatTurn::user("Tell me about the Acme contract."),
            ChatTurn::assistant("It is a supply agreement."),
        ];
        let err = pipeline
            .invoke("What is its expiration date?", Some(history.as_slice()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Pipeline);
        assert_eq!(err.root_kind(), ErrorKind::Generation);
        match &err {
            RagError::Pipeline { stage, .. } => assert_eq!(*stage, "rewrite"),
            other => panic!("unexpected error: {:?}", other),
        }

        // 답변 단계까지 가지 않음
        assert_eq!(chat.prompts().len(), 1);
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_single_pipeline_error() {
        let (_dir, index_dir) = indexed_session().await;
        let chat = ScriptedChat::new("", Ok("unused"));
        let models = ModelProvider::new(Arc::new(FailingEmbedder), chat);

        let retriever = Retriever::load(&index_dir, models.embedder()).await.unwrap();
        let pipeline = ConversationalRag::build(
            "session_test",
            Some(Arc::new(retriever)),
            &models,
            &PromptRegistry::default(),
        )
        .unwrap();

        let err = pipeline.invoke("anything", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pipeline);
        assert_eq!(err.root_kind(), ErrorKind::Ingestion);
        assert!(matches!(err, RagError::Pipeline { stage: "retrieve", .. }));
    }

    #[tokio::test]
    async fn test_failed_turn_does_not_poison_pipeline() {
        let (_dir, pipeline) = ready_pipeline(ScriptedChat::new("", Ok("Thirty days."))).await;

        // 빈 질의는 retrieve 단계에서 Validation
        let err = pipeline.invoke("   ", None).await.unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::Validation);
        assert_eq!(pipeline.state(), PipelineState::Ready);

        let answer = pipeline
            .invoke("What is the termination clause?", None)
            .await
            .unwrap();
        assert_eq!(answer, "Thirty days.");
    }

    #[test]
    fn test_build_without_retriever_is_validation_error() {
        let models = models(ScriptedChat::new("", Ok("")));
        let err = ConversationalRag::build("s", None, &models, &PromptRegistry::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_load_retriever_transitions() {
        let (_dir, index_dir) = indexed_session().await;
        let models = models(ScriptedChat::new("", Ok("Thirty days.")));

        let mut pipeline =
            ConversationalRag::uninitialized("session_test", &models, &PromptRegistry::default())
                .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
        let err = pipeline.invoke("hi", None).await.unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::Configuration);

        pipeline.load_retriever(&index_dir).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(pipeline.step_names().len(), 4);

        let missing = index_dir.with_file_name("missing");
        let err = pipeline.load_retriever(&missing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotFound);
        assert_eq!(pipeline.state(), PipelineState::Failed);

        let err = pipeline
            .invoke("What is the termination clause?", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pipeline);
        assert_eq!(err.root_kind(), ErrorKind::Configuration);

        // 재로드하면 복구
        pipeline.load_retriever(&index_dir).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[tokio::test]
    async fn test_top_k_bounds_retrieval() {
        let (_dir, pipeline) = ready_pipeline(ScriptedChat::new("", Ok("ok"))).await;
        let pipeline = pipeline.with_top_k(2).unwrap();

        let outcome = pipeline.invoke_detailed("agreement terms", None).await.unwrap();
        assert!(outcome.retrieved.len() <= 2);
        assert!(!outcome.retrieved.is_empty());
        for pair in outcome.retrieved.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }

        assert!(pipeline.with_top_k(0).is_err());
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short", 10), "short");
        let long = "가".repeat(100);
        assert_eq!(preview(&long, INPUT_PREVIEW_CHARS).chars().count(), INPUT_PREVIEW_CHARS + 3);
    }
}
