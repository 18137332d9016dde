use clap::Parser;
use tempo_core::TempoConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use tempo_server::backend::BackendClient;
use tempo_server::http;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tempo.toml")]
    config: String,

    /// Check the scheduling backend once and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match TempoConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    if args.health {
        let backend = BackendClient::new(&config.backend)?;
        match backend.health().await {
            Ok(v) => println!("✅ Backend reachable at {}: {}", backend.base_url(), v),
            Err(e) => {
                println!("❌ Backend health check failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let (tx, rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(config, rx).await?;

    tracing::info!("Tempo forwarder stopped");
    Ok(())
}
