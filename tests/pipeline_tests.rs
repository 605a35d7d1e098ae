//! Integration tests for the ingestion pipeline.
//!
//! These tests exercise the public API end to end, short of a live MySQL:
//! samples flow through classification, filtering, in-batch grouping, and
//! cross-batch correlation, and the resulting persistence plan is inspected
//! as the store would execute it.

use std::collections::HashMap;

use prom_mysql_adapter::sql::{build_ops, SqlParam};
use prom_mysql_adapter::{group_samples, CorrelationBuffer, ModuleKind, Sample};

fn sample(metric: &str, labels: &[(&str, &str)], value: f64, timestamp_ms: i64) -> Sample {
    Sample {
        metric: metric.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        value,
        timestamp_ms,
    }
}

/// Host CPU in batch 1, host memory in batch 2, same
/// (time, host) key. After batch 2 exactly one complete host entity exists
/// and its plan carries both field values.
#[test]
fn test_host_fields_split_across_batches_produce_one_row() {
    let buffer = CorrelationBuffer::new();
    let ts = 1_700_000_000_000;

    let batch1 = group_samples(&[sample(
        "node_cpu_seconds_total",
        &[("mode", "idle"), ("instance", "node1:9100")],
        12.34,
        ts,
    )]);
    let outcome1 = buffer.merge(batch1);
    assert!(outcome1.complete.is_empty());
    assert_eq!(outcome1.still_incomplete.len(), 1);

    let batch2 = group_samples(&[sample(
        "node_memory_MemUsed",
        &[("instance", "node1:9100")],
        56.78,
        ts,
    )]);
    let outcome2 = buffer.merge(batch2);
    assert_eq!(outcome2.complete.len(), 1);
    assert!(buffer.is_empty());

    let ops = build_ops(&outcome2.complete).expect("plan");
    assert_eq!(ops.len(), 1);
    assert!(ops[0].statement.starts_with("insert ignore host_mon("));
    assert_eq!(
        ops[0].params,
        vec![
            SqlParam::Int(1_700_000_000),
            SqlParam::Text("node1".to_string()),
            SqlParam::Float(12.34),
            SqlParam::Float(56.78),
        ]
    );
}

/// A pool sample and a block-device sample sharing a pool name
/// must produce two distinct entity keys.
#[test]
fn test_pool_and_block_device_share_pool_name_but_not_key() {
    let ts = 1_700_000_000_000;
    let batch = group_samples(&[
        sample("ceph_pool_rd", &[("pool_name", "rbd")], 1.0, ts),
        sample("ceph_rbd_read_ops", &[("image", "vol1"), ("pool", "rbd")], 2.0, ts),
    ]);
    assert_eq!(batch.len(), 2);

    let modules: Vec<ModuleKind> = batch.keys().map(|k| k.module).collect();
    assert!(modules.contains(&ModuleKind::Pool));
    assert!(modules.contains(&ModuleKind::BlockDevice));

    let rbd_key = batch
        .keys()
        .find(|k| k.module == ModuleKind::BlockDevice)
        .expect("block device key");
    assert_eq!(rbd_key.device, "rbd/vol1");
}

/// `up` is dropped regardless of labels.
#[test]
fn test_up_metric_dropped_regardless_of_labels() {
    let ts = 1_700_000_000_000;
    for labels in [
        vec![],
        vec![("device", "eth0")],
        vec![("pool_name", "rbd"), ("instance", "n1:9100")],
    ] {
        let batch = group_samples(&[sample("up", &labels, 1.0, ts)]);
        assert!(batch.is_empty(), "up survived with labels {labels:?}");
    }
}

/// Two block-device samples for the same never-seen device emit
/// exactly one live/dump create pair in the persistence plan.
#[test]
fn test_same_new_device_creates_tables_once() {
    let buffer = CorrelationBuffer::new();
    let ts = 1_700_000_000_000;

    // Two complete block-device entities for the same device at different
    // time buckets (completing twice in one batch).
    let fields = [
        "ceph_rbd_read_ops",
        "ceph_rbd_write_ops",
        "ceph_rbd_read_bytes",
        "ceph_rbd_write_bytes",
    ];
    let mut samples = Vec::new();
    for ts in [ts, ts + 1000] {
        for field in fields {
            samples.push(sample(field, &[("image", "vol1"), ("pool", "rbd")], 1.0, ts));
        }
    }

    let outcome = buffer.merge(group_samples(&samples));
    assert_eq!(outcome.complete.len(), 2);

    let ops = build_ops(&outcome.complete).expect("plan");
    let creates = ops
        .iter()
        .filter(|op| op.statement.starts_with("create table if not exists"))
        .count();
    assert_eq!(creates, 2, "one live table and one dump table");

    let inserts = ops
        .iter()
        .filter(|op| op.statement.starts_with("insert ignore rbd_mon_"))
        .count();
    assert_eq!(inserts, 2);
}

/// NaN samples are persisted with value -1, never dropped.
#[test]
fn test_nan_sample_persisted_as_sentinel() {
    let ts = 1_700_000_000_000;
    let batch = group_samples(&[
        sample("node_cpu_seconds_total", &[("mode", "idle"), ("instance", "n1:9100")], f64::NAN, ts),
        sample("node_memory_MemUsed", &[("instance", "n1:9100")], 3.0, ts),
    ]);

    let buffer = CorrelationBuffer::new();
    let outcome = buffer.merge(batch);
    assert_eq!(outcome.complete.len(), 1);

    let ops = build_ops(&outcome.complete).expect("plan");
    assert_eq!(ops[0].params[2], SqlParam::Float(-1.0));
    assert_eq!(ops[0].params[3], SqlParam::Float(3.0));
}

/// Same key completing through any batch split yields the same stored
/// field values as delivering everything at once.
#[test]
fn test_batch_split_order_does_not_change_stored_values() {
    let ts = 1_700_000_000_000;
    let all = [
        ("ceph_pool_rd", 1.0),
        ("ceph_pool_wr", 2.0),
        ("ceph_pool_rd_bytes", 3.0),
        ("ceph_pool_wr_bytes", 4.0),
    ];

    let make = |names: &[(&str, f64)]| {
        let samples: Vec<Sample> = names
            .iter()
            .map(|(m, v)| sample(m, &[("pool_name", "rbd")], *v, ts))
            .collect();
        group_samples(&samples)
    };

    // All at once.
    let single = CorrelationBuffer::new().merge(make(&all));
    assert_eq!(single.complete.len(), 1);

    // Split 1+3, reversed order.
    let buffer = CorrelationBuffer::new();
    buffer.merge(make(&all[3..]));
    let split = buffer.merge(make(&all[..3]));
    assert_eq!(split.complete.len(), 1);

    let plan_a = build_ops(&single.complete).expect("plan");
    let plan_b = build_ops(&split.complete).expect("plan");
    assert_eq!(plan_a[0].params, plan_b[0].params);
}

/// Different time buckets for the same device are different entities; the
/// buffer holds both independently.
#[test]
fn test_time_buckets_separate_accumulations() {
    let buffer = CorrelationBuffer::new();

    buffer.merge(group_samples(&[sample(
        "ceph_pool_rd",
        &[("pool_name", "rbd")],
        1.0,
        1_700_000_000_000,
    )]));
    buffer.merge(group_samples(&[sample(
        "ceph_pool_rd",
        &[("pool_name", "rbd")],
        2.0,
        1_700_000_015_000,
    )]));

    assert_eq!(buffer.len(), 2);
}

/// Documents the timestamp-repeat ambiguity: after a key completes, a later
/// observation at the same time bucket starts a new accumulation that can
/// complete again and produce a second (deduplicated-by-insert-ignore) row.
#[test]
fn test_same_bucket_recompletion_starts_from_empty() {
    let buffer = CorrelationBuffer::new();
    let ts = 1_700_000_000_000;
    let complete_batch = || {
        group_samples(&[
            sample("node_cpu_seconds_total", &[("mode", "idle"), ("instance", "n1:9100")], 1.0, ts),
            sample("node_memory_MemUsed", &[("instance", "n1:9100")], 2.0, ts),
        ])
    };

    let first = buffer.merge(complete_batch());
    assert_eq!(first.complete.len(), 1);

    let second = buffer.merge(complete_batch());
    assert_eq!(second.complete.len(), 1, "fresh cycle, no memory of the first");
    assert!(buffer.is_empty());
}

/// Housekeeping metrics never reach the buffer even when they would
/// otherwise classify.
#[test]
fn test_housekeeping_metrics_never_buffered() {
    let ts = 1_700_000_000_000;
    let batch = group_samples(&[
        sample("scrape_duration_seconds", &[("device", "eth0")], 1.0, ts),
        sample("promhttp_metric_handler_requests_total", &[("mode", "idle")], 1.0, ts),
        sample("ceph_scrape_duration_secs", &[("pool_name", "rbd")], 1.0, ts),
    ]);
    assert!(batch.is_empty());
}

/// Sentinel gateway buckets are rejected by device, not by metric name.
#[test]
fn test_sentinel_gateway_buckets_rejected() {
    let ts = 1_700_000_000_000;
    let batch = group_samples(&[
        sample("ceph_rgw_user_get", &[("rgw_user", ".rgw.root")], 1.0, ts),
        sample("ceph_rgw_user_get", &[("rgw_user", ".rgw.extra")], 1.0, ts),
        sample("ceph_rgw_user_get", &[("rgw_user", "alice")], 1.0, ts),
    ]);
    assert_eq!(batch.len(), 1);
    let key = batch.keys().next().expect("key");
    assert_eq!(key.device, "alice");
}

/// A full gateway-user cycle: nine fields across three batches, then a plan
/// with the device-hashed table pair and a ten-parameter insert.
#[test]
fn test_gateway_user_nine_field_completion() {
    let fields = [
        "ceph_rgw_user_get",
        "ceph_rgw_user_put",
        "ceph_rgw_user_delete",
        "ceph_rgw_user_suc_ops",
        "ceph_rgw_user_failed_ops",
        "ceph_rgw_user_r_bytes",
        "ceph_rgw_user_w_bytes",
        "ceph_rgw_user_r_wait",
        "ceph_rgw_user_w_wait",
    ];
    let ts = 1_700_000_000_000;
    let buffer = CorrelationBuffer::new();

    let mut complete = Vec::new();
    for chunk in fields.chunks(3) {
        let samples: Vec<Sample> = chunk
            .iter()
            .map(|m| sample(m, &[("rgw_user", "alice")], 1.0, ts))
            .collect();
        let mut outcome = buffer.merge(group_samples(&samples));
        complete.append(&mut outcome.complete);
    }

    assert_eq!(complete.len(), 1, "completion fires exactly once");
    assert!(buffer.is_empty());

    let ops = build_ops(&complete).expect("plan");
    assert_eq!(ops.len(), 3, "create pair plus insert");
    let insert = ops.last().expect("insert");
    assert!(insert.statement.starts_with("insert ignore rgw_user_mon_"));
    assert_eq!(insert.params.len(), 10);
}

/// An entity one field short of its requirement never completes on its own.
#[test]
fn test_incomplete_netcard_stays_buffered() {
    let buffer = CorrelationBuffer::new();
    let ts = 1_700_000_000_000;
    let fields = [
        "node_network_receive_bytes_total",
        "node_network_receive_packets_total",
        "node_network_transmit_bytes_total",
        "node_network_transmit_packets_total",
        "node_network_drop_total",
    ];

    let samples: Vec<Sample> = fields
        .iter()
        .map(|m| sample(m, &[("device", "eth0"), ("instance", "n1:9100")], 1.0, ts))
        .collect();
    let outcome = buffer.merge(group_samples(&samples));
    assert!(outcome.complete.is_empty(), "five of six fields is incomplete");
    assert_eq!(buffer.len(), 1);

    // The sixth field completes exactly one entity.
    let outcome = buffer.merge(group_samples(&[sample(
        "node_network_errs_total",
        &[("device", "eth0"), ("instance", "n1:9100")],
        1.0,
        ts,
    )]));
    assert_eq!(outcome.complete.len(), 1);
    assert!(buffer.is_empty());
}

/// Concurrent writers share one buffer and each completion is observed by
/// exactly one of them.
#[test]
fn test_concurrent_merges_complete_each_key_once() {
    use std::sync::Arc;
    use std::thread;

    let buffer = Arc::new(CorrelationBuffer::new());
    let ts = 1_700_000_000_000;
    let mut handles = Vec::new();

    // 8 writers, each delivering one of the two host fields for 4 hosts.
    for writer in 0..8u32 {
        let buffer = Arc::clone(&buffer);
        handles.push(thread::spawn(move || {
            let host = format!("node{}:9100", writer % 4);
            let metric = if writer < 4 {
                "node_cpu_seconds_total"
            } else {
                "node_memory_MemUsed"
            };
            let labels: Vec<(&str, &str)> = if writer < 4 {
                vec![("mode", "idle"), ("instance", host.as_str())]
            } else {
                vec![("instance", host.as_str())]
            };
            let batch = group_samples(&[sample(metric, &labels, 1.0, ts)]);
            buffer.merge(batch).complete.len()
        }));
    }

    let total: usize = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread"))
        .sum();
    assert_eq!(total, 4, "each host completes exactly once");
    assert!(buffer.is_empty());
}

/// Keys that never receive their full field set stay buffered indefinitely
/// (no TTL or eviction exists; growth is observable via `len`).
#[test]
fn test_stuck_partials_are_retained() {
    let buffer = CorrelationBuffer::new();
    for i in 0..10 {
        let device = format!("eth{i}");
        let labels: Vec<(&str, &str)> = vec![("device", device.as_str())];
        buffer.merge(group_samples(&[sample(
            "node_network_receive_bytes_total",
            &labels,
            1.0,
            1_700_000_000_000 + i * 15_000,
        )]));
    }
    assert_eq!(buffer.len(), 10);
}

/// Grouping within a batch is keyed by the full composite key: module, host,
/// device, and time bucket all participate.
#[test]
fn test_composite_key_grouping() {
    let ts = 1_700_000_000_000;
    let batch = group_samples(&[
        sample("ceph_r_ops", &[("disks", "sda"), ("instance", "n1:9100")], 1.0, ts),
        sample("ceph_r_ops", &[("disks", "sda"), ("instance", "n2:9100")], 2.0, ts),
        sample("ceph_r_ops", &[("disks", "sdb"), ("instance", "n1:9100")], 3.0, ts),
    ]);
    assert_eq!(batch.len(), 3);

    let mut hosts: Vec<String> = batch.keys().map(|k| k.host.clone()).collect();
    hosts.sort();
    assert_eq!(hosts, ["n1", "n1", "n2"]);

    let devices: HashMap<String, f64> = batch
        .values()
        .map(|e| (e.key.device.clone(), e.fields["ceph_r_ops"]))
        .collect();
    assert!(devices.contains_key("sda"));
    assert!(devices.contains_key("sdb"));
}
