use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use daily_upstream::DailyUpstream;
use photoframe_orchestrator::assets::AssetSink;
use photoframe_orchestrator::config::ServerConfig;
use photoframe_orchestrator::http::{AppState, router};
use photoframe_orchestrator::store::Store;

#[derive(Parser)]
#[command(version, about = "PhotoFrame Orchestrator")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: String,

    /// Directory holding the database and asset files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = ServerConfig::from_env()?;

    let store = Store::open(cli.data_dir.join("orchestrator.db"))?;
    let assets = AssetSink::new(cli.data_dir.join("assets"));
    let upstream = DailyUpstream::new(cfg.daily_template.clone(), cfg.daily_fetch_timeout)
        .map_err(|e| anyhow::anyhow!("daily upstream client: {e}"))?;

    tracing::info!(
        bind = %cli.bind,
        data_dir = %cli.data_dir.display(),
        timezone = %cfg.tz_name,
        "starting orchestrator"
    );

    let app = router(AppState::new(store, cfg, assets, upstream));
    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("bind {}", cli.bind))?;
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
