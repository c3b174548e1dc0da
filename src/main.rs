//! CropSense - Agricultural Assistant Backend
//!
//! REST backend for crop photo analysis and advisory chat.

use anyhow::Result;
use clap::{Parser, Subcommand};
use cropsense::{
    analysis::{AnalysisManager, AnalysisState},
    api::build_app,
    chat::{ChatManager, ChatState, HttpChatProvider},
    classifier::ClassifierHandle,
    config::CropSenseConfig,
    profile::ProfileState,
    storage::BinaryStore,
    store::RecordStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cropsense")]
#[command(version)]
#[command(about = "Agricultural assistant backend")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CROPSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cropsense={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        CropSenseConfig::default()
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_server(config, host, port).await?;
        }
        Commands::Config { default } => {
            let shown = if default {
                CropSenseConfig::default()
            } else {
                config
            };
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

async fn run_server(
    config: CropSenseConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    tracing::info!("Starting CropSense");

    // Stores
    let base_dir = &config.storage.base_dir;
    let analyses = Arc::new(RecordStore::open(base_dir.join("analyses")).await?);
    let profiles = Arc::new(RecordStore::open(base_dir.join("profiles")).await?);
    let sessions = Arc::new(RecordStore::open(base_dir.join("sessions")).await?);
    let binaries = Arc::new(BinaryStore::new(base_dir).await?);

    // Capabilities
    let classifier = Arc::new(ClassifierHandle::with_stub(Duration::from_secs(
        config.classifier.timeout_secs,
    )));
    let provider = HttpChatProvider::from_config(&config.chat)
        .map(|p| Arc::new(p) as Arc<dyn cropsense::chat::ChatProvider>);
    if provider.is_none() {
        tracing::info!("No chat API key configured; using local advisory responses only");
    }

    // Managers
    let analysis_manager = Arc::new(AnalysisManager::new(
        analyses,
        profiles.clone(),
        binaries,
        classifier,
        &config.storage,
    ));
    let chat_manager = Arc::new(ChatManager::new(sessions, provider, config.chat.clone()));

    let app = build_app(
        AnalysisState {
            manager: analysis_manager,
        },
        ChatState {
            manager: chat_manager,
        },
        ProfileState { profiles },
        &config.server.cors_origins,
    );

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("CropSense listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
