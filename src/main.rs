//! Question selection service binary.
//!
//! Persistent adapters are chosen by configuration: PostgreSQL backs the
//! ledger and pool index when `database` is set, Redis backs reservations
//! when `redis` is set. Otherwise everything runs in-process.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use question_selection::adapters::http::{
    api_router, PoolHealthAppState, RouterOptions, SelectionAppState,
};
use question_selection::adapters::memory::{InMemoryExposureLedger, InMemoryPoolIndex};
use question_selection::adapters::postgres::{PostgresExposureLedger, PostgresPoolIndex};
use question_selection::adapters::reservation::{
    InMemoryReservationStore, RedisReservationStore,
};
use question_selection::application::{
    PoolHealthMonitor, RecordAnswerHandler, ReservationCoordinator, SelectQuestionsHandler,
};
use question_selection::config::{AppConfig, ConfigError, DatabaseConfig, RedisConfig};
use question_selection::ports::{
    ExposureLedger, PoolIndex, PoolIndexError, ReservationStore,
};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] question_selection::config::ValidationError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis connection timed out")]
    RedisTimeout,

    #[error("seed file: {0}")]
    Seed(#[from] PoolIndexError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    let (ledger, pool) = match &config.database {
        Some(database) => postgres_backends(database).await?,
        None => memory_backends(&config).await?,
    };
    let store: Arc<dyn ReservationStore> = match &config.redis {
        Some(redis) => Arc::new(redis_store(redis).await?),
        None => {
            info!("using in-process reservation store");
            Arc::new(InMemoryReservationStore::new())
        }
    };

    let coordinator = Arc::new(ReservationCoordinator::new(
        store,
        config.selection.coordinator(),
    ));
    let select_questions = Arc::new(SelectQuestionsHandler::new(
        Arc::clone(&pool),
        Arc::clone(&ledger),
        coordinator,
        config.selection.settings(),
    ));
    let record_answer = Arc::new(RecordAnswerHandler::new(ledger));
    let monitor = Arc::new(PoolHealthMonitor::new(pool, config.pool_health.monitor()));
    for filter in config.pool_health.watched_filters_list()? {
        info!(bucket = %filter.bucket_key(), "watching pool bucket");
        monitor.watch(filter, None).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(shutdown_rx).await }
    });

    let app = api_router(
        SelectionAppState {
            select_questions,
            record_answer,
            verbose_errors: config.features.verbose_errors,
        },
        PoolHealthAppState { monitor },
        RouterOptions {
            request_timeout: config.server.request_timeout(),
            enable_tracing: config.features.enable_tracing,
        },
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = ?config.server.environment, "question selection service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_task.await {
        warn!(error = %e, "pool health monitor task failed");
    }
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

type Backends = (Arc<dyn ExposureLedger>, Arc<dyn PoolIndex>);

async fn postgres_backends(config: &DatabaseConfig) -> Result<Backends, StartupError> {
    let pool: PgPool = config.pool_options().connect(&config.url).await?;
    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations applied");
    }
    info!(max_connections = config.max_connections, "using PostgreSQL ledger and pool index");
    Ok((
        Arc::new(PostgresExposureLedger::new(pool.clone())),
        Arc::new(PostgresPoolIndex::new(pool)),
    ))
}

async fn memory_backends(config: &AppConfig) -> Result<Backends, StartupError> {
    let pool = match &config.pool_health.seed_file {
        Some(path) => {
            let pool = InMemoryPoolIndex::from_seed_file(path).await?;
            info!(path = %path.display(), items = pool.len().await, "loaded item seed file");
            pool
        }
        None => {
            warn!("no database or seed file configured; item pool is empty");
            InMemoryPoolIndex::new()
        }
    };
    Ok((Arc::new(InMemoryExposureLedger::new()), Arc::new(pool)))
}

async fn redis_store(config: &RedisConfig) -> Result<RedisReservationStore, StartupError> {
    let client = redis::Client::open(config.url.as_str())?;
    let conn = tokio::time::timeout(
        config.connect_timeout(),
        client.get_multiplexed_async_connection(),
    )
    .await
    .map_err(|_| StartupError::RedisTimeout)??;
    info!("using Redis reservation store");
    Ok(RedisReservationStore::new(conn))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
