//! Entity model: modules, keys, and field accumulators.
//!
//! Every persisted row belongs to a *module* (the category of monitored
//! subject). An [`Entity`] accumulates field observations for one
//! `(time, module, host, device)` key across write batches until it holds
//! the module's required number of distinct fields.

use std::collections::HashMap;

/// Category of monitored subject. Closed set; each variant has a fixed
/// required field count that decides entity completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Host,
    HostNetCard,
    Disk,
    Pool,
    BlockDevice,
    GatewayService,
    GatewayUser,
}

impl ModuleKind {
    /// Number of distinct metric fields an entity of this module must
    /// collect before it is persisted. Completeness is cardinality-only:
    /// any N distinct field names count, no field schema is enforced.
    pub const fn required_fields(self) -> usize {
        match self {
            Self::Host => 2,
            Self::HostNetCard => 6,
            Self::Disk => 6,
            Self::Pool => 4,
            Self::BlockDevice => 4,
            Self::GatewayService => 9,
            Self::GatewayUser => 9,
        }
    }

    /// Stable identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::HostNetCard => "hostNetCard",
            Self::Disk => "disk",
            Self::Pool => "pools",
            Self::BlockDevice => "rbd",
            Self::GatewayService => "rgw_service",
            Self::GatewayUser => "rgw_user",
        }
    }
}

/// Identity of one logical entity observation window.
///
/// Two samples with equal keys and equal metric names are duplicate
/// observations of the same field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    /// Observation time bucket in seconds.
    pub time_bucket: i64,
    pub module: ModuleKind,
    /// Host the sample came from (from the `instance` label, port stripped).
    /// Empty when the label is absent.
    pub host: String,
    /// Device identity within the module (interface name, pool name,
    /// `pool/image`, gateway user, ...).
    pub device: String,
}

/// Field accumulator for one [`EntityKey`].
///
/// `fields` grows monotonically per field name as batches arrive; once the
/// distinct-field count reaches the module's requirement the entity is
/// complete and leaves the correlation buffer.
#[derive(Debug, Clone)]
pub struct Entity {
    pub key: EntityKey,
    pub fields: HashMap<String, f64>,
}

impl Entity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            fields: HashMap::new(),
        }
    }

    /// True once the required field count for the module is reached.
    ///
    /// Exact equality is deliberate: a key that somehow collects more
    /// distinct fields than required never reads as complete, matching the
    /// observed persistence behavior.
    pub fn is_complete(&self) -> bool {
        self.fields.len() == self.key.module.required_fields()
    }
}
