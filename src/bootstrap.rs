use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::engine::ReceivablesEngine;
use crate::error::AppResult;
use crate::ledger::repository::BankLedgerRepository;
use crate::receivables::repository::ReceivableRepository;
use crate::reconciliation::repository::ReconciliationRepository;
use crate::settlement::retry::LedgerRetryJob;
use crate::store::ReceivableStore;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,receivables=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Postgres-backed engine plus the handle of its ledger retry job
pub struct Runtime {
    pub engine: ReceivablesEngine,
    pub pool: PgPool,
    pub retry_job: tokio::task::JoinHandle<()>,
}

pub async fn initialize_runtime(config: &Config) -> AppResult<Runtime> {
    info!("Initializing receivables engine ...");

    let pool = initialize_database(config).await?;

    let receivables: Arc<dyn ReceivableStore> = Arc::new(ReceivableRepository::new(pool.clone()));
    let reconciliations = Arc::new(ReconciliationRepository::new(pool.clone()));
    let ledger = Arc::new(BankLedgerRepository::new(pool.clone()));

    let engine = ReceivablesEngine::new(
        receivables.clone(),
        reconciliations,
        ledger,
        config.settlement_category.clone(),
    );
    info!(category = %config.settlement_category, "✅ Settlement orchestrator ready");

    let retry_job = Arc::new(LedgerRetryJob::new(
        receivables,
        engine.orchestrator(),
        config.ledger_retry_interval(),
        config.ledger_retry_grace(),
    ))
    .start();
    info!(
        every_secs = config.ledger_retry_interval_secs,
        grace_secs = config.ledger_retry_grace_secs,
        "✅ Ledger retry job started"
    );

    Ok(Runtime {
        engine,
        pool,
        retry_job,
    })
}

pub async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "✓ Database pool configured"
    );

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
