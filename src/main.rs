use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tourbook::config::AppConfig;
use tourbook::db;
use tourbook::handlers;
use tourbook::services::notification::postmark::PostmarkEmailProvider;
use tourbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let email = PostmarkEmailProvider::new(
        config.email.postmark_api_key.clone(),
        config.email.from_email.clone(),
    );

    let providers: Vec<&str> = config.emi_providers.iter().map(|p| p.name.as_str()).collect();
    tracing::info!(
        gateway = %config.gateway.base_url,
        emi_providers = ?providers,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(conn, config.clone(), Box::new(email)));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
