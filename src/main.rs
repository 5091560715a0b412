use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = sample_app::config::Config::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "sample_app",
        "sample_app starting: RUST_LOG='{}', addr={}, db_root='{}'",
        rust_log, config.socket_addr(), config.db_folder
    );

    sample_app::server::run(config).await
}
