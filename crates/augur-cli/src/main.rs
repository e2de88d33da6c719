use augur_core::config::AppConfig;
use augur_core::engine::generator::{GeneratePolicy, QueryGenerator};
use augur_core::engine::pipeline::Pipeline;
use augur_core::model::{AnswerResult, CurrentUser};
use augur_core::providers::embedder::http::HttpEmbedder;
use augur_core::providers::embedder::Embedder;
use augur_core::providers::fallback::LlmFallback;
use augur_core::providers::llm::azure::AzureChatClient;
use augur_core::providers::llm::ChatClient;
use augur_core::providers::query::sql_llm::SqlLlmEngine;
use augur_core::recommend::NextQuestionRecommender;
use augur_core::session::{ContextAssembler, PersonaResolver};
use augur_core::storage::Store;
use augur_core::summary::Summarizer;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "augur",
    version,
    about = "Answer questions about your data, with cached answers and follow-up suggestions"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    Ask(AskArgs),
    LoadQuestions(LoadArgs),
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone)]
struct AskArgs {
    /// natural-language question
    question: String,

    #[arg(long, default_value = "augur.yaml")]
    config: PathBuf,

    /// persona whose question list scopes the follow-up suggestion
    #[arg(long, default_value = "analyst")]
    persona: String,

    /// opaque session id passed through to the session layer
    #[arg(long, default_value = "local")]
    session: String,

    /// opaque user id
    #[arg(long, default_value = "local")]
    user: String,

    /// call the configured Azure deployment and embedding server instead
    /// of the offline stand-ins
    #[arg(long)]
    live: bool,

    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser, Clone)]
struct LoadArgs {
    /// JSON file holding an array of question strings
    file: PathBuf,

    #[arg(long)]
    persona: String,

    #[arg(long, default_value = "augur.yaml")]
    config: PathBuf,

    /// embed with the configured embedding server instead of the offline
    /// stand-in
    #[arg(long)]
    live: bool,
}

#[derive(Parser, Clone)]
struct InitArgs {
    #[arg(long, default_value = "augur.yaml")]
    config: PathBuf,
}

mod exit_codes {
    pub const OK: i32 = 0;
    pub const REQUEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("AUGUR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Ask(args) => cmd_ask(args).await,
        Command::LoadQuestions(args) => cmd_load_questions(args).await,
        Command::Init(args) => cmd_init(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if !args.config.exists() {
        if let Some(parent) = args.config.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        augur_core::config::write_sample_config(&args.config)?;
        eprintln!("created {}", args.config.display());
    } else {
        eprintln!("note: {} already exists", args.config.display());
    }
    Ok(exit_codes::OK)
}

async fn cmd_ask(args: AskArgs) -> anyhow::Result<i32> {
    let cfg = augur_core::config::load_config(&args.config).map_err(|e| anyhow::anyhow!(e))?;
    let pipeline = build_pipeline(&cfg, &args.persona, args.live, args.no_cache)?;

    let user = CurrentUser { id: args.user };
    match pipeline.answer(&args.question, &args.session, &user).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            match &result {
                AnswerResult::SqlResponse { summary, .. } => eprintln!("{}", summary),
                AnswerResult::Text { content, .. } => eprintln!("{}", content),
            }
            if let Some(next) = result.next_question() {
                eprintln!("you could ask next: {}", next);
            }
            Ok(exit_codes::OK)
        }
        Err(e) => {
            eprintln!("request failed ({}): {}", e.status_code(), e);
            Ok(exit_codes::REQUEST_FAILED)
        }
    }
}

async fn cmd_load_questions(args: LoadArgs) -> anyhow::Result<i32> {
    let cfg = augur_core::config::load_config(&args.config).map_err(|e| anyhow::anyhow!(e))?;

    let raw = std::fs::read_to_string(&args.file)?;
    let questions: Vec<String> = serde_json::from_str(&raw)?;
    if questions.is_empty() {
        eprintln!("note: {} holds no questions", args.file.display());
        return Ok(exit_codes::OK);
    }

    let db_path = cfg.service.db_path();
    ensure_parent_dir(&db_path)?;
    let store = Store::open(&db_path)?;
    store.init_schema()?;

    let embedder = build_embedder(&cfg, args.live);
    let vectors = embedder.embed(&questions).await?;
    for (question, vec) in questions.iter().zip(vectors.iter()) {
        store.insert_question(&args.persona, question, vec)?;
    }
    eprintln!(
        "loaded {} questions for persona {} (model: {})",
        questions.len(),
        args.persona,
        embedder.model_id()
    );
    Ok(exit_codes::OK)
}

fn build_pipeline(
    cfg: &AppConfig,
    persona: &str,
    live: bool,
    no_cache: bool,
) -> anyhow::Result<Pipeline> {
    let db_path = cfg.service.db_path();
    ensure_parent_dir(&db_path)?;
    let store = Store::open(&db_path)?;
    store.init_schema()?;

    let chat: Arc<dyn ChatClient> = if live {
        Arc::new(AzureChatClient::from_env(&cfg.engine).map_err(|e| anyhow::anyhow!(e))?)
    } else {
        Arc::new(OfflineChat::new(&cfg.engine.deployment))
    };
    let embedder = build_embedder(cfg, live);

    let data_db = cfg.engine.data_db_path();
    if !data_db.exists() {
        anyhow::bail!(
            "config error: analytics database {} not found (set engine.data_db)",
            data_db.display()
        );
    }
    let engine = Arc::new(SqlLlmEngine::open(chat.clone(), &data_db)?);

    let policy = GeneratePolicy {
        max_attempts: cfg
            .service
            .max_attempts
            .unwrap_or(augur_core::engine::generator::DEFAULT_MAX_ATTEMPTS),
        timeout_seconds: cfg.service.timeout_seconds,
    };
    let generator = QueryGenerator::new(engine, Arc::new(LlmFallback::new(chat.clone())), policy);
    let recommender = NextQuestionRecommender::new(store.clone(), embedder);
    let summarizer = Summarizer::new(chat);

    let mut service = cfg.service.clone();
    if no_cache {
        service.cache = Some(false);
    }

    let session = Arc::new(FixedSession {
        persona: persona.to_string(),
    });
    Ok(Pipeline::new(
        store,
        generator,
        recommender,
        summarizer,
        session.clone(),
        session,
        &service,
    ))
}

fn build_embedder(cfg: &AppConfig, live: bool) -> Arc<dyn Embedder> {
    if live {
        Arc::new(HttpEmbedder::from_settings(&cfg.embedding))
    } else {
        Arc::new(HashEmbedder {
            dims: cfg
                .embedding
                .dims
                .unwrap_or(augur_core::providers::embedder::http::DEFAULT_DIMS),
        })
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// One-shot CLI session: a fixed persona and no prior conversation.
struct FixedSession {
    persona: String,
}

#[async_trait::async_trait]
impl PersonaResolver for FixedSession {
    async fn persona(
        &self,
        _session_id: &str,
        _user: &CurrentUser,
    ) -> anyhow::Result<Option<String>> {
        Ok(Some(self.persona.clone()))
    }
}

#[async_trait::async_trait]
impl ContextAssembler for FixedSession {
    async fn session_context(&self, _user_id: &str, _session_id: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// Stand-in chat model for runs without credentials.
struct OfflineChat {
    deployment: String,
}

impl OfflineChat {
    fn new(deployment: &str) -> Self {
        Self {
            deployment: deployment.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ChatClient for OfflineChat {
    async fn complete(&self, _system: &str, user: &str) -> anyhow::Result<String> {
        Ok(format!("offline {} reply :: {}", self.deployment, user))
    }

    fn provider_name(&self) -> &'static str {
        "offline"
    }
}

/// Deterministic stand-in embedder for runs without an embedding server.
struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut state: u64 = 0xcbf29ce484222325;
        for b in text.bytes() {
            state ^= b as u64;
            state = state.wrapping_mul(0x100000001b3);
        }
        let mut out = Vec::with_capacity(self.dims);
        for _ in 0..self.dims {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            out.push(((state >> 32) as u32 as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        out
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_id(&self) -> String {
        "offline-hash".into()
    }

    fn dims(&self) -> usize {
        self.dims
    }
}
