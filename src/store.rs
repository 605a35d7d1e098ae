//! MySQL persistence engine.
//!
//! Owns the connection pool, verifies connectivity at startup with the
//! system's only retry policy (bounded attempts, fixed delay), and commits
//! each batch of complete entities in a single transaction. Any statement
//! error rolls back the whole batch; there are no partial commits and no
//! per-entity retries.

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::DbConfig;
use crate::entity::Entity;
use crate::error::AdapterError;
use crate::sql::{self, SqlParam};

/// Pooled MySQL store for the monitor schema.
pub struct MysqlStore {
    pool: MySqlPool,
}

impl MysqlStore {
    /// Builds the pool and probes connectivity, retrying up to
    /// `connect_retries` times with a fixed delay. Exhaustion is fatal to
    /// the caller; no other path in the adapter retries.
    pub async fn connect(cfg: &DbConfig) -> Result<Self, AdapterError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .connect_lazy(&cfg.dsn())?;
        let store = Self { pool };

        let mut attempt: u32 = 1;
        loop {
            match store.probe().await {
                Ok(()) => {
                    info!(attempt, host = %cfg.host, database = %cfg.database, "connected to MySQL");
                    return Ok(store);
                }
                Err(err) => {
                    if attempt >= cfg.connect_retries {
                        error!(attempt, %err, "giving up connecting to MySQL");
                        return Err(AdapterError::ConnectRetriesExhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    warn!(attempt, %err, "MySQL not reachable yet, retrying");
                    tokio::time::sleep(Duration::from_secs(cfg.connect_retry_delay_secs)).await;
                }
            }
            attempt += 1;
        }
    }

    /// Wraps an existing pool (tests, embedded setups).
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn probe(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Persists one batch of complete entities transactionally.
    ///
    /// The statement plan (creates for never-seen dynamic tables, then
    /// `insert ignore` rows) comes from [`sql::build_ops`]; every statement
    /// runs inside one transaction and the first error aborts it all.
    /// Duplicate delivery of the same entity is idempotent at the storage
    /// layer via the `insert ignore` collision policy.
    pub async fn persist(&self, entities: &[Entity]) -> Result<(), AdapterError> {
        if entities.is_empty() {
            return Ok(());
        }

        let ops = sql::build_ops(entities)?;
        for entity in entities {
            debug!(
                module = entity.key.module.as_str(),
                device = %entity.key.device,
                time = entity.key.time_bucket,
                "persisting entity"
            );
        }
        let mut tx = self.pool.begin().await?;
        for op in &ops {
            let mut query = sqlx::query(op.statement.as_str());
            for param in &op.params {
                query = match param {
                    SqlParam::Int(v) => query.bind(*v),
                    SqlParam::Text(s) => query.bind(s.as_str()),
                    SqlParam::Float(v) => query.bind(*v),
                };
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(
            entities = entities.len(),
            statements = ops.len(),
            "persisted batch"
        );
        Ok(())
    }

    /// Liveness probe: a trivial query, surfaced directly with no retry.
    pub async fn health_check(&self) -> Result<(), AdapterError> {
        self.probe().await?;
        Ok(())
    }
}
