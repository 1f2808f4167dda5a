use clap::{Parser, Subcommand};
use echo_memory::agent::{AgentConfig, MemoryAgent};
use echo_memory::config::{AppConfig, BackendKind};
use echo_memory::embedding::OpenAiEmbedder;
use echo_memory::error::{ConfigError, EchoError, Result};
use echo_memory::llm::config::ModelTable;
use echo_memory::llm::types::Message;
use echo_memory::llm::{LlmClient, OpenAiClient};
use echo_memory::memory::{Deduplicator, LongTermMemoryStore, ProfileMemoryService};
use echo_memory::storage::{
    BlobBackend, BucketUserResolver, FileBlobBackend, HashedUserResolver, HttpBlobBackend,
    InMemoryBlobBackend, UserResolver,
};
use echo_memory::tools::memory::{DeleteMemoryTool, SearchMemoryTool, StoreMemoryTool};
use echo_memory::tools::{ToolContext, ToolExecutionConfig, ToolManager};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const STORAGE_API_KEY_ENV: &str = "ECHO_STORAGE_API_KEY";

/// 带长期记忆的对话助手
#[derive(Parser, Debug)]
#[command(name = "echo-memory", version, about, long_about = None)]
struct Cli {
    /// YAML 配置文件，缺省使用内置默认值
    #[arg(short, long)]
    config: Option<String>,

    /// 用户凭证，决定记忆所属的用户目录
    #[arg(long, env = "ECHO_CREDENTIAL")]
    credential: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 保存一条长期记忆
    Store {
        content: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
        /// 可重复：--topic rust --topic cli
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// 语义检索长期记忆
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// 删除全部长期记忆
    Delete,
    /// 交互式对话
    Chat,
}

struct Backends {
    blobs: Arc<dyn BlobBackend>,
    resolver: Arc<dyn UserResolver>,
}

fn build_backends(config: &AppConfig) -> Result<Backends> {
    let storage = &config.storage;
    let timeout = Duration::from_secs(storage.timeout_secs);
    let backends = match storage.backend {
        BackendKind::File => Backends {
            blobs: Arc::new(FileBlobBackend::new(storage.root_path())?),
            resolver: Arc::new(HashedUserResolver),
        },
        BackendKind::Memory => Backends {
            blobs: Arc::new(InMemoryBlobBackend::new()),
            resolver: Arc::new(HashedUserResolver),
        },
        BackendKind::Http => {
            let endpoint = storage
                .endpoint
                .clone()
                .ok_or_else(|| ConfigError::MissingField("storage.endpoint".to_string()))?;
            Backends {
                blobs: Arc::new(HttpBlobBackend::new(
                    endpoint.clone(),
                    std::env::var(STORAGE_API_KEY_ENV).ok(),
                    timeout,
                )?),
                resolver: Arc::new(BucketUserResolver::new(endpoint, timeout)?),
            }
        }
    };
    Ok(backends)
}

fn build_store(config: &AppConfig, backends: &Backends) -> Result<Arc<LongTermMemoryStore>> {
    let embedder = OpenAiEmbedder::from_settings(&config.embedding)?;
    let store = LongTermMemoryStore::new(
        backends.blobs.clone(),
        backends.resolver.clone(),
        Arc::new(embedder),
    )
    .with_deduplicator(Deduplicator::from_settings(&config.memory))
    .with_memory_file(config.memory.memory_file.clone());
    Ok(Arc::new(store))
}

fn build_agent(
    config: &AppConfig,
    backends: &Backends,
    store: Arc<LongTermMemoryStore>,
) -> Result<MemoryAgent> {
    let models = ModelTable::from_env()?;
    let http = reqwest::Client::new();
    let chat_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        http.clone(),
        models.get(&config.agent.model)?,
    ));
    let memory_model = config
        .agent
        .memory_model
        .as_deref()
        .unwrap_or(&config.agent.model);
    let memory_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(http, models.get(memory_model)?));

    let profile = Arc::new(
        ProfileMemoryService::new(backends.blobs.clone(), backends.resolver.clone(), memory_llm)
            .with_profile_file(config.memory.profile_file.clone()),
    );

    let mut tools = ToolManager::new_with_config(ToolExecutionConfig::from(&config.tools));
    tools.register(Arc::new(StoreMemoryTool::new(store.clone())));
    tools.register(Arc::new(SearchMemoryTool::new(store.clone())));
    tools.register(Arc::new(
        DeleteMemoryTool::new(store).with_profile(profile.clone()),
    ));

    Ok(MemoryAgent::new(
        AgentConfig::from_settings(&config.agent),
        chat_llm,
        tools,
        profile,
    ))
}

async fn run_chat(agent: MemoryAgent, credential: String) -> Result<()> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| EchoError::Other(format!("failed to initialize readline: {e}")))?;
    let ctx = ToolContext::new(credential);
    let mut history: Vec<Message> = Vec::new();

    println!("echo-memory chat，输入 /quit 退出\n");
    loop {
        match rl.readline("👤 > ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match agent.handle(&ctx, &history, trimmed).await {
                    Ok(turn) => {
                        println!("🤖 {}\n", turn.answer);
                        history.extend(turn.messages);
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("error: {e}");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "echo_memory=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    info!(backend = ?config.storage.backend, "配置已加载");

    let backends = build_backends(&config)?;
    let store = build_store(&config, &backends)?;

    match cli.command {
        Commands::Store {
            content,
            category,
            importance,
            topics,
        } => {
            let confirmation = store
                .add(&cli.credential, &content, importance, &category, topics)
                .await?;
            println!("{confirmation}");
        }
        Commands::Search { query, top_k } => {
            let top_k = top_k
                .unwrap_or(config.memory.default_top_k)
                .clamp(1, config.memory.max_top_k);
            let memories = store.search(&cli.credential, &query, top_k).await?;
            if memories.is_empty() {
                println!("No memories found.");
            }
            for (i, memory) in memories.iter().enumerate() {
                println!(
                    "{}. [{} | {:.2}] {}",
                    i + 1,
                    memory.category,
                    memory.importance,
                    memory.content
                );
                if !memory.topics.is_empty() {
                    println!("   topics: {}", memory.topics.join(", "));
                }
            }
        }
        Commands::Delete => {
            println!("{}", store.delete_all(&cli.credential).await?);
        }
        Commands::Chat => {
            let agent = build_agent(&config, &backends, store)?;
            run_chat(agent, cli.credential).await?;
        }
    }

    Ok(())
}
