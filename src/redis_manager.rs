//! Redis Manager - Centralized Redis connection and operations
//!
//! This module handles all Redis-related operations of the worker:
//! - Job queue operations (BLPOP)
//! - Result storage and publishing

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{info, warn};

use crate::jobs::{RunJob, RunJobResult};

/// Redis key constants
pub mod keys {
    /// Execution job queue key
    pub const EXEC_QUEUE: &str = "exec:queue";

    /// Execution result key prefix (for polling)
    pub const EXEC_RESULT_PREFIX: &str = "exec:result:";

    /// Execution result channel (for pub/sub)
    pub const EXEC_RESULT_CHANNEL: &str = "exec:results";
}

const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour

/// Key a result is stored under
pub fn result_key(request_id: &str) -> String {
    format!("{}{}", keys::EXEC_RESULT_PREFIX, request_id)
}

/// Redis access for the worker. Clones share the client and multiplex over
/// the same connection.
#[derive(Clone)]
pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisManager {
    /// Connect to the given Redis URL, retrying until it is reachable
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    /// Create a new RedisManager using the REDIS_URL environment variable.
    /// Defaults to "redis://localhost:6379" if not set.
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        Self::with_url(&url).await
    }

    /// Wait up to `timeout_secs` for the next job from the queue.
    ///
    /// Returns `None` when the wait ran out or the entry was malformed (it is
    /// logged and dropped), so the caller gets a chance to stop between pops.
    /// Automatically reconnects on connection failure.
    pub async fn pop_job(&mut self, timeout_secs: f64) -> Result<Option<RunJob>> {
        let reply: Option<(String, String)> =
            match self.conn.blpop(keys::EXEC_QUEUE, timeout_secs).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.reconnect().await?;
                    return Ok(None);
                }
            };

        Ok(decode_job(reply))
    }

    /// Store an execution result in Redis.
    ///
    /// The result is stored with a 1-hour expiration and also published
    /// to a channel for real-time subscribers.
    pub async fn store_run_result(&mut self, result: &RunJobResult) -> Result<()> {
        self.store_result(
            &result_key(&result.request_id),
            Some(keys::EXEC_RESULT_CHANNEL),
            result,
        )
        .await
    }

    /// Internal helper to store and publish a result
    async fn store_result<T: Serialize>(
        &mut self,
        key: &str,
        channel: Option<&str>,
        result: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(result)?;

        // Try to store, reconnect on failure
        if let Err(e) = self
            .conn
            .set_ex::<_, _, ()>(key, &json, RESULT_EXPIRY_SECS)
            .await
        {
            warn!("Failed to store result: {}. Reconnecting...", e);
            self.reconnect().await?;
            self.conn
                .set_ex::<_, _, ()>(key, &json, RESULT_EXPIRY_SECS)
                .await?;
        }

        // Publish to channel (ignore errors as there may be no subscribers)
        if let Some(chan) = channel {
            let _ = self.conn.publish::<_, _, ()>(chan, &json).await;
        }

        Ok(())
    }

    /// Reconnect to Redis
    async fn reconnect(&mut self) -> Result<()> {
        self.conn = get_connection_with_retry(&self.client).await?;
        Ok(())
    }
}

/// Turn a BLPOP reply into a job; `None` for a timeout or bad payload
fn decode_job(reply: Option<(String, String)>) -> Option<RunJob> {
    let (_, job_data) = reply?;
    match serde_json::from_str::<RunJob>(&job_data) {
        Ok(job) => Some(job),
        Err(e) => {
            warn!("Failed to parse job data: {}. Data: {}", e, job_data);
            None
        }
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
