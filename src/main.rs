use std::sync::Arc;

use redis::Client as RedisClient;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnable_api::{
    clock::Clock,
    config::{Config, StoreKind},
    db::{self, MemoryStore, PgStore, Store},
    routes,
    services::{email::EmailService, expiry, notifications::NotificationService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing required env var: DATABASE_URL"))?;
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected and migrations applied");
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            warn!("STORE=memory: data is kept in process and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = match config.redis_url.as_deref() {
        Some(url) => {
            let client = RedisClient::open(url)?;
            let conn = client.get_multiplexed_async_connection().await?;
            info!("Redis connected");
            Some(conn)
        }
        None => {
            info!("REDIS_URL not set, request throttling disabled");
            None
        }
    };

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, invitation links will be logged");
    }

    let clock = Clock::system();
    expiry::start(store.clone(), clock.clone(), config.expiry_sweep_interval_secs);

    let state = AppState {
        store,
        clock,
        config: config.clone(),
        redis,
        notifications: NotificationService::new(email, config.app_base_url.clone()),
    };

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("LearnAble API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
