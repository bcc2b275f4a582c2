//! CLI 모듈
//!
//! docchat CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatTurn, ConversationalRag, PromptRegistry, TurnOutcome};
use crate::config::{get_data_dir, EmbeddingBackend, RagConfig, StorageConfig};
use crate::embedding::{create_embedder, has_api_key};
use crate::ingest::DocumentIngestor;
use crate::knowledge::{ChunkRetriever, Retriever};
use crate::provider::ModelProvider;
use crate::session::SessionStore;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, about = "세션 단위 멀티 문서 대화형 RAG", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: DOCCHAT_DATA_DIR 또는 ~/.docchat)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 오프라인 임베딩 사용 (feature hashing, API 호출 없음)
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 새 세션으로 인덱싱
    Ingest {
        /// 수집할 파일/폴더 (.pdf, .docx, .txt, .md)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 세션 ID 직접 지정
        #[arg(long)]
        session_id: Option<String>,
    },

    /// 세션 문서와 대화
    Chat {
        /// 세션 ID
        #[arg(short, long)]
        session: String,

        /// 한 번만 질문하고 종료
        #[arg(short, long)]
        question: Option<String>,

        /// 대화 히스토리 JSON 파일 ([{"role": "user", "content": "..."}])
        #[arg(long)]
        history: Option<PathBuf>,

        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 답변 근거 청크 출력
        #[arg(long)]
        sources: bool,
    },

    /// 세션 인덱스 유사도 검색
    Search {
        /// 세션 ID
        #[arg(short, long)]
        session: String,

        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 세션 목록
    Sessions {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.data_dir.as_deref(), cli.offline)?;

    match cli.command {
        Commands::Ingest { paths, session_id } => {
            cmd_ingest(&config, &paths, session_id.as_deref()).await
        }
        Commands::Chat {
            session,
            question,
            history,
            top_k,
            sources,
        } => {
            cmd_chat(
                &config,
                &session,
                question.as_deref(),
                history.as_deref(),
                top_k,
                sources,
            )
            .await
        }
        Commands::Search {
            session,
            query,
            top_k,
        } => cmd_search(&config, &session, &query, top_k).await,
        Commands::Sessions { limit } => cmd_sessions(&config, limit),
        Commands::Status => cmd_status(&config, cli.data_dir.as_deref()),
    }
}

/// 환경변수 설정 위에 CLI 플래그 적용
fn resolve_config(data_dir: Option<&Path>, offline: bool) -> Result<RagConfig> {
    let mut config = RagConfig::from_env().context("환경변수 설정 오류")?;

    if let Some(dir) = data_dir {
        config.storage = StorageConfig::under(dir);
    }
    if offline {
        config.models.embedding_backend = EmbeddingBackend::Hash;
    }

    Ok(config)
}

fn open_store(config: &RagConfig) -> Result<Arc<SessionStore>> {
    let store = SessionStore::open(&config.storage).context("세션 레지스트리 열기 실패")?;
    Ok(Arc::new(store))
}

fn require_api_key(config: &RagConfig) -> Result<()> {
    if config.models.embedding_backend == EmbeddingBackend::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             오프라인 임베딩: --offline\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
///
/// 새 세션을 만들고 파일을 복사한 뒤 벡터 인덱스를 빌드합니다.
async fn cmd_ingest(config: &RagConfig, paths: &[PathBuf], session_id: Option<&str>) -> Result<()> {
    require_api_key(config)?;

    let store = open_store(config)?;
    let embedder = create_embedder(&config.models).context("임베딩 초기화 실패")?;

    println!("[*] 인덱싱 중 ({} 임베딩)...", embedder.name());

    let ingestor = DocumentIngestor::new(store, embedder, config.chunking)
        .context("인제스터 생성 실패")?;
    let report = ingestor
        .ingest(paths, session_id)
        .await
        .context("문서 인덱싱 실패")?;

    for (i, file) in report.files.iter().enumerate() {
        let name = file
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let status = if file.indexed { "완료" } else { "텍스트 없음" };
        println!(
            "[{}/{}] [{}] {}: {} 블록, {} 자 ({})",
            i + 1,
            report.files.len(),
            file.file_type.label(),
            name,
            file.blocks,
            file.chars,
            status
        );
    }

    println!();
    println!("[OK] 세션: {}", report.session_id());
    println!(
        "     문서 {} 건, 청크 {} 개",
        report.document_count(),
        report.chunk_count()
    );
    println!("     인덱스: {}", report.session.index_dir.display());
    println!();
    println!("     대화: docchat chat --session {}", report.session_id());

    Ok(())
}

/// 대화 명령어 (chat)
///
/// `question`이 있으면 한 번 답하고, 없으면 stdin에서 질문을 반복해 읽습니다.
/// 히스토리는 이 프로세스 메모리에만 유지됩니다.
async fn cmd_chat(
    config: &RagConfig,
    session_id: &str,
    question: Option<&str>,
    history_file: Option<&Path>,
    top_k: Option<usize>,
    show_sources: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let session = store
        .open_session(session_id)
        .with_context(|| format!("세션을 열 수 없습니다: {}", session_id))?;

    let models = ModelProvider::from_config(&config.models).context("모델 초기화 실패")?;
    let k = top_k.unwrap_or(config.retrieval.top_k);

    let mut pipeline = ConversationalRag::uninitialized(
        session.id.clone(),
        &models,
        &PromptRegistry::default(),
    )
    .context("파이프라인 생성 실패")?
    .with_top_k(k)
    .context("잘못된 검색 개수")?;

    pipeline
        .load_retriever(&session.index_dir)
        .await
        .with_context(|| format!("세션 {}의 인덱스를 불러올 수 없습니다", session.id))?;

    let mut history = match history_file {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };

    if let Some(question) = question {
        let outcome = pipeline
            .invoke_detailed(question, Some(history.as_slice()))
            .await
            .context("답변 생성 실패")?;
        print_outcome(&outcome, show_sources);
        return Ok(());
    }

    println!("[*] 세션 {} (k={}). 종료: exit", session.id, pipeline.top_k());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match pipeline.invoke_detailed(input, Some(history.as_slice())).await {
            Ok(outcome) => {
                print_outcome(&outcome, show_sources);
                history.push(ChatTurn::user(input));
                history.push(ChatTurn::assistant(outcome.answer));
            }
            Err(e) => {
                println!("[!] 오류: {:#}", anyhow::Error::from(e));
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome, show_sources: bool) {
    println!("{}", outcome.answer);

    if show_sources {
        println!();
        println!("    질의: {}", outcome.standalone_query);
        for (i, hit) in outcome.retrieved.iter().enumerate() {
            println!(
                "    {}. [{:.4}] {}: {}",
                i + 1,
                hit.similarity,
                source_label(&hit.chunk.source, hit.chunk.page),
                truncate_text(&hit.chunk.text, 80)
            );
        }
    }
}

/// 검색 명령어 (search)
async fn cmd_search(
    config: &RagConfig,
    session_id: &str,
    query: &str,
    top_k: Option<usize>,
) -> Result<()> {
    require_api_key(config)?;

    let store = open_store(config)?;
    let session = store
        .open_session(session_id)
        .with_context(|| format!("세션을 열 수 없습니다: {}", session_id))?;

    let embedder = create_embedder(&config.models).context("임베딩 초기화 실패")?;
    let retriever = Retriever::load(&session.index_dir, embedder)
        .await
        .context("인덱스 로드 실패")?;

    let k = top_k.unwrap_or(config.retrieval.top_k);
    println!("[*] 검색 중: \"{}\"", query);

    let results = retriever.search(query, k).await.context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [유사도: {:.4}] {} (청크 #{})",
            i + 1,
            result.similarity,
            source_label(&result.chunk.source, result.chunk.page),
            result.chunk.chunk_index
        );
        println!("   내용: {}", truncate_text(&result.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 세션 목록 명령어 (sessions)
fn cmd_sessions(config: &RagConfig, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let records = store.list_sessions(limit).context("세션 목록 조회 실패")?;

    if records.is_empty() {
        println!("[!] 등록된 세션이 없습니다.");
        return Ok(());
    }

    println!("[OK] 세션 ({} 건):\n", records.len());

    for record in records {
        let indexed = if record.is_indexed() {
            format!("문서 {} / 청크 {}", record.document_count, record.chunk_count)
        } else {
            "인덱스 없음".to_string()
        };

        println!("  {}", record.session.id);
        println!(
            "        {} | {}",
            record.session.created_at.format("%Y-%m-%d %H:%M"),
            indexed
        );
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &RagConfig, data_dir: Option<&Path>) -> Result<()> {
    println!("docchat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = data_dir.map(Path::to_path_buf).unwrap_or_else(get_data_dir);
    println!("[*] 데이터 디렉토리: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let backend = match config.models.embedding_backend {
        EmbeddingBackend::Gemini => "gemini",
        EmbeddingBackend::Hash => "hash (offline)",
    };
    println!("[*] 임베딩: {} ({} 차원)", backend, config.models.embedding_dimension);
    println!("[*] 생성 모델: {}", config.models.chat_model);
    println!(
        "[*] 청크: {} 자 / 겹침 {} 자, k={}",
        config.chunking.chunk_size, config.chunking.chunk_overlap, config.retrieval.top_k
    );

    match open_store(config).and_then(|store| store.stats().map_err(anyhow::Error::from)) {
        Ok(stats) => {
            println!(
                "[OK] 세션: {} 개 (인덱스 완료 {} 개)",
                stats.session_count, stats.indexed_count
            );
            println!(
                "     문서 {} 건, 청크 {} 개",
                stats.total_documents, stats.total_chunks
            );
            if let Ok(meta) = std::fs::metadata(&stats.db_path) {
                println!("     레지스트리: {}", format_bytes(meta.len() as usize));
            }
        }
        Err(e) => {
            println!("[!] 레지스트리 조회 실패: {:#}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 히스토리 JSON 파일 로드
fn load_history(path: &Path) -> Result<Vec<ChatTurn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("히스토리 파일 읽기 실패: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("히스토리 형식 오류 (role/content 배열): {}", path.display()))
}

fn source_label(source: &str, page: Option<usize>) -> String {
    match page {
        Some(page) => format!("{} (p.{})", source, page),
        None => source.to_string(),
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
