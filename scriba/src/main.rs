use std::sync::Arc;

use scriba::api::server::{ApiServer, ApiServerConfig, AppState};
use scriba::config::EnvConfigStore;
use scriba::history::{self, SqlxHistoryRepository};
use scriba::logging;
use scriba::pipeline::{SessionManager, SessionManagerConfig};
use scriba::providers::DefaultProviderFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let _guard = logging::init_logging(&log_dir)?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:scriba-history.db?mode=rwc".to_string());
    let pool = history::init_pool(&database_url).await?;
    history::run_migrations(&pool).await?;

    let config_store = Arc::new(EnvConfigStore::default());
    let history = Arc::new(SqlxHistoryRepository::new(pool));
    let providers = Arc::new(DefaultProviderFactory::new());

    let sessions = Arc::new(SessionManager::new(
        config_store.clone(),
        history,
        providers,
        SessionManagerConfig::default(),
    ));
    sessions.start_sweeper();

    let state = AppState::new(sessions.clone(), config_store);
    let server = ApiServer::with_state(ApiServerConfig::from_env_or_default(), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            cancel_token.cancel();
        }
    });

    server.run().await?;
    sessions.shutdown();

    Ok(())
}
