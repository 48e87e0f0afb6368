use dotenvy::dotenv;
use envelope_ledger::{
    config::{database, settings},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env file (as early as possible, it may carry RUST_LOG)
    dotenv().ok(); // Make it non-fatal, env vars can be set externally

    // 2. Load settings; the log filter lives there
    let settings = settings::load_default_settings()?;

    // 3. Initialize tracing, RUST_LOG wins over config.toml
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();
    info!("Loaded settings");

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to ledger store: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create ledger tables: {}", e))?;

    info!(database_url = %settings.database_url, "Ledger store ready");
    Ok(())
}
