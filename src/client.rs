//! Backend client facade for the remote-write transport.
//!
//! Composes the classifier, filter, correlation buffer, and persistence
//! engine behind the four operations a transport needs: `write`, `read`
//! (stub), `health_check`, and `name`. One client owns one correlation
//! buffer; concurrent `write` calls share it and serialize on its lock for
//! the merge step only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::buffer::CorrelationBuffer;
use crate::classify::classify;
use crate::config::AdapterConfig;
use crate::entity::{Entity, EntityKey};
use crate::error::AdapterError;
use crate::filter::is_rejected;
use crate::sample::Sample;
use crate::store::MysqlStore;

/// Read request shell. The read path is a stub; matchers are accepted and
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub queries: Vec<ReadQuery>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadQuery {
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    #[serde(default)]
    pub matchers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: HashMap<String, String>,
    pub samples: Vec<Sample>,
}

/// Remote-write backend over MySQL.
pub struct Client {
    store: MysqlStore,
    buffer: CorrelationBuffer,
    log_samples: bool,
}

impl Client {
    /// Connects the persistence engine (with its bounded startup retry) and
    /// builds a client with a fresh correlation buffer.
    pub async fn connect(config: &AdapterConfig) -> Result<Self, AdapterError> {
        let store = MysqlStore::connect(&config.db).await?;
        Ok(Self::with_store(store, config.log_samples))
    }

    /// Builds a client around an already-connected store.
    pub fn with_store(store: MysqlStore, log_samples: bool) -> Self {
        Self {
            store,
            buffer: CorrelationBuffer::new(),
            log_samples,
        }
    }

    /// Primary ingestion entry point: classify, filter, group within the
    /// batch, merge across batches, persist whatever completed. Returns the
    /// first persistence error, if any; classification and filter drops are
    /// silent.
    pub async fn write(&self, samples: &[Sample]) -> Result<(), AdapterError> {
        let batch = group_samples(samples);
        let outcome = self.buffer.merge(batch);

        if self.log_samples {
            info!(
                received = samples.len(),
                complete = outcome.complete.len(),
                buffered = outcome.still_incomplete.len(),
                "write batch"
            );
        }

        self.store.persist(&outcome.complete).await
    }

    /// Read stub: always an empty time-series result.
    pub async fn read(&self, _req: &ReadRequest) -> Result<ReadResponse, AdapterError> {
        debug!(timeseries = 0, "returned response");
        Ok(ReadResponse {
            results: vec![QueryResult::default()],
        })
    }

    /// Liveness probe against the store.
    pub async fn health_check(&self) -> Result<(), AdapterError> {
        self.store.health_check().await
    }

    /// Static backend identifier.
    pub fn name(&self) -> &'static str {
        "MySQL"
    }

    /// Number of incomplete entities currently buffered.
    pub fn buffered_entities(&self) -> usize {
        self.buffer.len()
    }
}

/// Classifies and filters a batch of samples and groups the surviving field
/// observations by entity key. Duplicate observations of the same field
/// within a batch resolve last-write-wins.
pub fn group_samples(samples: &[Sample]) -> HashMap<EntityKey, Entity> {
    let mut batch: HashMap<EntityKey, Entity> = HashMap::new();
    for sample in samples {
        let Some(classified) = classify(sample) else {
            continue;
        };
        if is_rejected(&sample.metric, &classified.key.device) {
            continue;
        }
        batch
            .entry(classified.key.clone())
            .or_insert_with(|| Entity::new(classified.key))
            .fields
            .insert(classified.field, classified.value);
    }
    batch
}
