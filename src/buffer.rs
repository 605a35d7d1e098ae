//! Cross-batch correlation of partial entities.
//!
//! Remote-write batches rarely deliver all of an entity's fields at once;
//! network-card counters for one interface may be split across several
//! requests. The [`CorrelationBuffer`] holds incomplete entities between
//! batches and releases each one exactly once, the moment its field set
//! reaches the module's required count.
//!
//! The buffer is owned by the client instance (not process globals) so tests
//! and multiple adapters stay isolated.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::entity::{Entity, EntityKey};

/// Result of one [`CorrelationBuffer::merge`] call.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Entities whose field sets completed during this call. Each appears
    /// here exactly once and is no longer buffered.
    pub complete: Vec<Entity>,
    /// Keys that remain buffered awaiting more fields.
    pub still_incomplete: Vec<EntityKey>,
}

/// Keyed store of incomplete entities, merged across write batches.
///
/// Invariant: the buffer never holds a complete entity. Entries are created
/// on first partial observation and removed only by completion — there is no
/// TTL or eviction, so a key that never completes stays buffered for the
/// process lifetime (bounded in practice by real device cardinality;
/// [`CorrelationBuffer::len`] exposes the count for operators).
#[derive(Debug, Default)]
pub struct CorrelationBuffer {
    partial: Mutex<HashMap<EntityKey, Entity>>,
}

impl CorrelationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one batch of per-key field observations with the buffered
    /// partials and splits the result into completed entities and
    /// still-buffered keys.
    ///
    /// The lock is held for the whole call: the completeness decision must
    /// observe a consistent field set, so concurrent writers serialize here.
    /// Field collisions resolve last-write-wins in favor of the incoming
    /// batch. An entity already complete within the batch passes straight
    /// through without touching the buffer. After a key completes, its next
    /// observation starts a fresh accumulation from empty.
    pub fn merge(&self, batch: HashMap<EntityKey, Entity>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut partial = self
            .partial
            .lock()
            .expect("correlation buffer lock poisoned");

        for (key, entity) in batch {
            if entity.is_complete() {
                outcome.complete.push(entity);
                continue;
            }

            match partial.remove(&key) {
                Some(mut buffered) => {
                    for (field, value) in entity.fields {
                        buffered.fields.insert(field, value);
                    }
                    if buffered.is_complete() {
                        outcome.complete.push(buffered);
                    } else {
                        partial.insert(key.clone(), buffered);
                        outcome.still_incomplete.push(key);
                    }
                }
                None => {
                    partial.insert(key.clone(), entity);
                    outcome.still_incomplete.push(key);
                }
            }
        }

        outcome
    }

    /// Number of buffered incomplete entities.
    pub fn len(&self) -> usize {
        self.partial
            .lock()
            .expect("correlation buffer lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the given key is currently buffered (test/diagnostic hook).
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.partial
            .lock()
            .expect("correlation buffer lock poisoned")
            .contains_key(key)
    }
}
