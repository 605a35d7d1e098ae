//! Sample classification: label set to typed entity key.
//!
//! Classification is a pure function of the label set. The module and device
//! are decided by an ordered rule table; the first label rule that matches
//! wins and labels are never combined. A single metric-name fallback handles
//! the one host metric that carries no distinguishing label.

use std::collections::HashMap;

use crate::entity::{EntityKey, ModuleKind};
use crate::sample::{normalize_value, Sample};

/// Metric that maps to the Host module despite carrying no `mode` label.
const HOST_MEM_USED_METRIC: &str = "node_memory_MemUsed";

/// Device value for host-scoped modules.
const HOST_DEVICE: &str = "host";

/// How a matched rule derives the device identifier.
#[derive(Debug, Clone, Copy)]
enum DeviceSource {
    /// The matched label's own value.
    LabelValue,
    /// A fixed device string.
    Fixed(&'static str),
    /// `"<pool>/<image>"`, or `"/<image>"` when the `pool` label is absent.
    PoolImage,
}

/// One classification rule: if `label` is present, the sample belongs to
/// `module` with a device derived per `device`.
#[derive(Debug, Clone, Copy)]
struct LabelRule {
    label: &'static str,
    module: ModuleKind,
    device: DeviceSource,
}

/// Ordered rule table. Precedence is the array order; the first matching
/// rule wins.
const RULES: [LabelRule; 7] = [
    LabelRule {
        label: "device",
        module: ModuleKind::HostNetCard,
        device: DeviceSource::LabelValue,
    },
    LabelRule {
        label: "mode",
        module: ModuleKind::Host,
        device: DeviceSource::Fixed(HOST_DEVICE),
    },
    LabelRule {
        label: "pool_name",
        module: ModuleKind::Pool,
        device: DeviceSource::LabelValue,
    },
    LabelRule {
        label: "rgw_service",
        module: ModuleKind::GatewayService,
        device: DeviceSource::LabelValue,
    },
    LabelRule {
        label: "rgw_user",
        module: ModuleKind::GatewayUser,
        device: DeviceSource::LabelValue,
    },
    LabelRule {
        label: "disks",
        module: ModuleKind::Disk,
        device: DeviceSource::LabelValue,
    },
    LabelRule {
        label: "image",
        module: ModuleKind::BlockDevice,
        device: DeviceSource::PoolImage,
    },
];

/// A sample mapped to its entity key plus its own field observation.
#[derive(Debug, Clone)]
pub struct ClassifiedSample {
    pub key: EntityKey,
    /// Field name within the entity (the metric name).
    pub field: String,
    /// Normalized field value.
    pub value: f64,
}

/// Maps one sample to its entity key and field observation.
///
/// Returns `None` for unmapped label sets; such samples are dropped
/// silently upstream, never reported as errors.
pub fn classify(sample: &Sample) -> Option<ClassifiedSample> {
    let (module, device) = match_rules(&sample.labels).or_else(|| {
        (sample.metric == HOST_MEM_USED_METRIC)
            .then(|| (ModuleKind::Host, HOST_DEVICE.to_string()))
    })?;

    Some(ClassifiedSample {
        key: EntityKey {
            time_bucket: sample.time_bucket(),
            module,
            host: host_from_instance(&sample.labels),
            device,
        },
        field: sample.metric.clone(),
        value: normalize_value(sample.value),
    })
}

/// Evaluates the rule table in priority order.
fn match_rules(labels: &HashMap<String, String>) -> Option<(ModuleKind, String)> {
    for rule in &RULES {
        let Some(value) = labels.get(rule.label) else {
            continue;
        };
        let device = match rule.device {
            DeviceSource::LabelValue => value.clone(),
            DeviceSource::Fixed(fixed) => fixed.to_string(),
            DeviceSource::PoolImage => match labels.get("pool") {
                Some(pool) => format!("{}/{}", pool, value),
                None => format!("/{}", value),
            },
        };
        return Some((rule.module, device));
    }
    None
}

/// Host name from the `instance` label, `host:port` convention:
/// everything before the first `:`. Empty when the label is missing.
fn host_from_instance(labels: &HashMap<String, String>) -> String {
    labels
        .get("instance")
        .and_then(|s| s.split(':').next())
        .unwrap_or_default()
        .to_string()
}
