//! qspec validation server
//!
//! Reads `config.yaml` (or the file named by `QSPEC_CONFIG`), applies
//! environment overrides and serves the validation API.

use qspec_server::{logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config_path = std::env::var("QSPEC_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    config.apply_logging_env();
    logging::init();

    qspec_server::serve(config).await
}
