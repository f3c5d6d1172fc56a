use clap::Parser;
use code_exec::ExecutorConfig;
use code_exec_server::{create_app_with_config, run_server};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to listen on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    addr: SocketAddr,

    /// TOML file with executor settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host directory for staged source files
    #[arg(long)]
    workspace_dir: Option<PathBuf>,

    /// Per-run wall-clock limit in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExecutorConfig::from_file(path).await?,
        None => ExecutorConfig::default(),
    };
    if let Some(dir) = args.workspace_dir {
        config = config.with_workspace_dir(dir);
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    let app = create_app_with_config(config).await?;
    run_server(app, args.addr).await?;

    Ok(())
}
