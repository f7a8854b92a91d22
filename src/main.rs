use receivables::bootstrap;
use receivables::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    info!("🚀 Starting card receivables worker");

    let config = Config::from_env()?;
    let runtime = bootstrap::initialize_runtime(&config).await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("❌ Failed to listen for shutdown signal: {:?}", e);
            }
            info!("🛑 Shutdown requested");
        }
        result = runtime.retry_job => {
            if let Err(e) = result {
                error!("❌ Ledger retry job stopped: {:?}", e);
            }
        }
    }

    runtime.pool.close().await;
    info!("👋 Receivables worker stopped");
    Ok(())
}
