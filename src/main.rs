use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info};

use code_exec::config::ExecutorConfig;
use code_exec::executer::Executor;
use code_exec::jobs::RunJobResult;
use code_exec::redis_manager::RedisManager;

/// Jobs pulled off the queue per execution slot; the surplus waits as `queued`
const QUEUE_DEPTH_FACTOR: usize = 2;

/// Longest a single BLPOP blocks before the shutdown flag is checked again
const POP_TIMEOUT_SECS: f64 = 1.0;

/// Flag set once ctrl-c is received
fn install_shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing popped jobs");
                setter.store(true, Ordering::SeqCst);
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });
    flag
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("code_exec=info".parse()?),
        )
        .init();

    let config = ExecutorConfig::from_env()?;
    info!(
        "Executor config: workspace_root={:?}, max_concurrent={}, compile_timeout_ms={:?}",
        config.workspace_root, config.max_concurrent, config.compile_timeout_ms
    );

    let executor = Executor::new(config)?;
    info!(
        "Loaded languages: {:?}",
        executor.registry().supported_languages()
    );

    info!("Starting Execution Worker...");
    let mut queue = RedisManager::from_env().await?;
    // BLPOP holds its connection, results go over a second one
    let results = RedisManager::from_env().await?;

    let depth = executor.config().max_concurrent * QUEUE_DEPTH_FACTOR;
    let in_flight = Arc::new(Semaphore::new(depth));

    let shutdown = install_shutdown_flag();
    info!("Waiting for jobs...");

    // A pop is never cancelled midway, so every job taken off the queue runs
    while !shutdown.load(Ordering::SeqCst) {
        let permit = Arc::clone(&in_flight).acquire_owned().await?;

        let Some(job) = queue.pop_job(POP_TIMEOUT_SECS).await? else {
            continue;
        };

        info!(
            request_id = %job.request_id,
            language_id = job.language_id,
            "Received run job"
        );

        let executor = executor.clone();
        let mut publisher = results.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = executor.execute(job.to_request()).await;
            let result = RunJobResult::new(job.request_id, outcome);

            if let Err(e) = publisher.store_run_result(&result).await {
                error!(
                    "Failed to store run result {}: {:#}",
                    result.request_id, e
                );
            }
            info!(
                request_id = %result.request_id,
                status = %result.status,
                "Run job completed"
            );
        });
    }

    // Every permit back means every spawned job has published its result
    let _ = in_flight.acquire_many(depth as u32).await?;
    info!("Execution Worker stopped");

    Ok(())
}
