//! Recall: flashcard study server with spaced repetition.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use recall_core::{RecallConfig, SystemClock};
use recall_infer::{create_embedder, CachedEmbedder, EmbedderConfig, QueryCache};
use recall_llm::{create_generator, LLMConfig};
use recall_retrieve::IndexRegistry;
use recall_server::{build_router, state::start_session_sweeper, AppState};
use recall_store::{SqliteStore, Store};

fn resolve_data_dir() -> PathBuf {
    std::env::var("RECALL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                println!("Recall: flashcard study server");
                println!();
                println!("Usage: recall");
                println!();
                println!("Environment:");
                println!("  RECALL_DATA_DIR          Data directory (default: data)");
                println!("  PORT                     HTTP port (default: 8000)");
                println!("  RUST_LOG                 Log filter (default: info)");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}. Use 'recall help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = RecallConfig::from_env(&data_dir)?;
    let port = config.port;

    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&config.data_paths.db)
            .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?,
    );

    let registry = Arc::new(IndexRegistry::new());
    let indexed = registry
        .warm_up(store.as_ref())
        .map_err(|e| anyhow::anyhow!("Failed to load vector indexes: {}", e))?;
    info!("Loaded vector indexes for {} collections", indexed);

    let embedder_config = EmbedderConfig::from_env(config.embedding_dim)?;
    let embedder = Arc::new(CachedEmbedder::new(
        create_embedder(&embedder_config),
        QueryCache::default_cache(),
    ));

    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    let generator = create_generator(&llm_config);

    let state = Arc::new(AppState::new(
        config,
        store,
        Arc::new(SystemClock),
        embedder,
        generator,
        llm_config,
        registry,
    ));

    start_session_sweeper(state.clone());

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Recall server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
