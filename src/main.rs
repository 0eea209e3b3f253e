use std::sync::Arc;

use redis::Client as RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schoolhub_api::{
    config::Config,
    db::{self, PgStorage},
    routes,
    services::realtime::Hub,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_url = config.redis_url.clone();
    let addr = format!("{}:{}", config.host, config.port);
    let mut state = AppState::new(Arc::new(PgStorage::new(pool)), config);

    match redis_url {
        Some(url) => {
            let client = RedisClient::open(url.as_str())?;
            let conn = client.get_multiplexed_async_connection().await?;
            let hub = Arc::new(Hub::with_relay(conn.clone()));
            hub.clone().spawn_relay_listener(client);
            state = state.with_redis(conn, hub);
            info!("Redis connected: login rate limiting and event relay enabled");
        }
        None => info!("REDIS_URL not set, real-time events stay in this process"),
    }

    let app = routes::router(state);

    info!("schoolhub API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
