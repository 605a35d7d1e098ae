//! prom-mysql-adapter
//!
//! Backend library for a Prometheus remote-write receiver that persists
//! decoded metric samples into a MySQL monitor schema partitioned by metric
//! module (host, network card, disk, pool, block device, gateway service,
//! gateway user).
//!
//! # Pipeline
//!
//! - **Classification**: a flat label set maps to a typed entity key via an
//!   ordered rule table ([`classify`]).
//! - **Filtering**: housekeeping metrics and sentinel devices are dropped
//!   silently ([`filter`]).
//! - **Correlation**: partial field observations for the same entity merge
//!   across write batches until the module's required field count is reached
//!   ([`buffer::CorrelationBuffer`]).
//! - **Persistence**: complete entities commit transactionally with an
//!   idempotent `insert ignore` discipline; per-device tables are created on
//!   first use ([`store::MysqlStore`]).
//!
//! The wire-level remote-write endpoint (protobuf/snappy decoding) is the
//! caller's concern; this crate starts at decoded [`Sample`] batches and
//! ends at the [`Client`] facade.
//!
//! # Usage
//!
//! ```rust,no_run
//! use prom_mysql_adapter::{load_config, Client};
//!
//! # async fn run() -> Result<(), prom_mysql_adapter::AdapterError> {
//! let config = load_config(None)?;
//! let client = Client::connect(&config).await?;
//!
//! let samples = vec![/* decoded remote-write samples */];
//! client.write(&samples).await?;
//! client.health_check().await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod classify;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod sample;
pub mod sql;
pub mod store;

// Re-export main types for convenience
pub use buffer::{CorrelationBuffer, MergeOutcome};
pub use classify::{classify, ClassifiedSample};
pub use client::{group_samples, Client, ReadRequest, ReadResponse};
pub use config::{load_config, AdapterConfig, DbConfig};
pub use entity::{Entity, EntityKey, ModuleKind};
pub use error::AdapterError;
pub use sample::Sample;
pub use store::MysqlStore;
