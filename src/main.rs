use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use switchgate::config::Config;
use switchgate::identity::InMemoryDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = Config::from_env()?;
    info!(
        target: "switchgate",
        "switchgate starting: RUST_LOG='{}', http_port={}, dashboard_url='{}', token_window_secs={}",
        rust_log, config.http_port, config.dashboard_url, config.token_window_secs
    );

    let directory = Arc::new(InMemoryDirectory::new());
    switchgate::server::run_with_port(config, directory).await
}
