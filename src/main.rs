use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tenant_isolation::app::{router, AppState};
use tenant_isolation::config::config;
use tenant_isolation::database::manager::DatabaseManager;
use tenant_isolation::database::{models, Database, MemoryStorage, PgStorage};
use tenant_isolation::is_production;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting tenant isolation service in {:?} mode", config.environment);

    if is_production!() && config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in production");
    }

    let registry = models::registry()?;

    let state = match config.database.url.as_deref() {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database).await?;
            let db = Database::new(Arc::new(PgStorage::new(pool.clone())), registry);
            AppState::new(db).with_pool(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            AppState::new(Database::new(Arc::new(MemoryStorage::new()), registry))
        }
    };

    let cors = if config.security.enable_cors {
        let origins: Vec<HeaderValue> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let app = router(state.clone()).layer(cors).layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    if let Some(pool) = state.pool {
        DatabaseManager::close(pool).await;
    }
    Ok(())
}
