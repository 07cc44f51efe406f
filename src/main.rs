use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use school_backend::api::router;
use school_backend::clock::SystemClock;
use school_backend::config::{AppConfig, StoreBackend};
use school_backend::db::{self, SqliteStore};
use school_backend::rest::{RestConfig, RestStore};
use school_backend::state::AppState;
use school_backend::store::RecordStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "school_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Sqlite { database_url } => {
            info!("using sqlite record store at {}", database_url);
            Arc::new(SqliteStore::new(db::connect(database_url).await?))
        }
        StoreBackend::Rest { base_url, api_key } => {
            info!("using table API record store at {}", base_url);
            Arc::new(RestStore::new(RestConfig {
                base_url: base_url.clone(),
                api_key: api_key.clone(),
            })?)
        }
    };

    let state = AppState {
        store,
        clock: Arc::new(SystemClock::new(config.school_offset)),
        horizon_days: config.horizon_days,
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
