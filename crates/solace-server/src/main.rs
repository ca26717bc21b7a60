use std::sync::Arc;

use tracing::info;

use solace_api::AppStateInner;
use solace_gateway::dispatcher::Dispatcher;
use solace_server::app::build_router;
use solace_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solace=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = solace_db::Database::open(&config.db_path)?;

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: Dispatcher::new(),
    });

    let app = build_router(state);

    let addr = config.addr()?;
    info!("Solace server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
