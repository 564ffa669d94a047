use hebi_api::AppResources;
use hebi_api::api::start_webserver;
use hebi_api::config::load_config;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "hebi_api=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = Arc::new(load_config()?);
    tracing::info!(
        listen_addr = %config.listen_addr,
        issuer = %config.oauth2.issuer_url,
        "Configuration loaded"
    );

    let db = Arc::new(Database::connect(&config.database_url).await?);

    start_webserver(AppResources { db, config }).await?;
    Ok(())
}
