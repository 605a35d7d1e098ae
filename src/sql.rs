//! SQL statement construction for the monitor schema.
//!
//! Everything here is pure: `build_ops` turns complete entities into an
//! ordered plan of parameterized statements that the store executes in one
//! transaction. Keeping the plan builder free of database handles makes the
//! per-module dispatch, the dynamic table naming, and the create-table
//! deduplication testable without a live MySQL.
//!
//! Values always travel through positional placeholders. The only
//! interpolated identifier is the dynamic table name, whose device-derived
//! suffix is validated against a strict hex allow-list first.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::entity::{Entity, ModuleKind};
use crate::error::AdapterError;

// Fixed per-module tables. Canonical column order is the order of the
// field arrays below; missing fields bind as 0.
const SQL_INSERT_HOST: &str = "insert ignore host_mon(time, host, node_cpu_seconds_total, \
     node_memory_MemUsed) values(?,?,?,?);";
const SQL_INSERT_NETCARD: &str = "insert ignore host_mon_netcard(time, host, dev, \
     node_network_receive_bytes_total, node_network_receive_packets_total, \
     node_network_transmit_bytes_total, node_network_transmit_packets_total, \
     node_network_drop_total, node_network_errs_total) values(?,?,?,?,?,?,?,?,?);";
const SQL_INSERT_DISK: &str = "insert ignore disks_mon(time, name, ceph_r_ops, ceph_w_ops, \
     ceph_r_bytes, ceph_w_bytes, ceph_r_await, ceph_w_await) values(?,?,?,?,?,?,?,?);";
const SQL_INSERT_POOL: &str = "insert ignore pool_mon(time, name, ceph_pool_rd, ceph_pool_wr, \
     ceph_pool_rd_bytes, ceph_pool_wr_bytes) values(?,?,?,?,?,?);";
const SQL_INSERT_RGW_SERVICE: &str = "insert ignore rgw_service_mon(time, name, \
     ceph_rgw_service_get, ceph_rgw_service_put, ceph_rgw_service_delete, \
     ceph_rgw_service_suc_ops, ceph_rgw_service_failed_ops, ceph_rgw_service_r_bytes, \
     ceph_rgw_service_w_bytes, ceph_rgw_service_r_wait, ceph_rgw_service_w_wait) \
     values(?,?,?,?,?,?,?,?,?,?,?);";

/// Canonical field order per module, matching the table column order.
pub const HOST_FIELDS: [&str; 2] = ["node_cpu_seconds_total", "node_memory_MemUsed"];
pub const NETCARD_FIELDS: [&str; 6] = [
    "node_network_receive_bytes_total",
    "node_network_receive_packets_total",
    "node_network_transmit_bytes_total",
    "node_network_transmit_packets_total",
    "node_network_drop_total",
    "node_network_errs_total",
];
pub const DISK_FIELDS: [&str; 6] = [
    "ceph_r_ops",
    "ceph_w_ops",
    "ceph_r_bytes",
    "ceph_w_bytes",
    "ceph_r_await",
    "ceph_w_await",
];
pub const POOL_FIELDS: [&str; 4] = [
    "ceph_pool_rd",
    "ceph_pool_wr",
    "ceph_pool_rd_bytes",
    "ceph_pool_wr_bytes",
];
pub const RBD_FIELDS: [&str; 4] = [
    "ceph_rbd_read_ops",
    "ceph_rbd_write_ops",
    "ceph_rbd_read_bytes",
    "ceph_rbd_write_bytes",
];
pub const RGW_SERVICE_FIELDS: [&str; 9] = [
    "ceph_rgw_service_get",
    "ceph_rgw_service_put",
    "ceph_rgw_service_delete",
    "ceph_rgw_service_suc_ops",
    "ceph_rgw_service_failed_ops",
    "ceph_rgw_service_r_bytes",
    "ceph_rgw_service_w_bytes",
    "ceph_rgw_service_r_wait",
    "ceph_rgw_service_w_wait",
];
pub const RGW_USER_FIELDS: [&str; 9] = [
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

/// Table-name prefixes for the per-device dynamic tables.
pub const RBD_TABLE_PREFIX: &str = "rbd_mon_";
pub const RBD_DUMP_TABLE_PREFIX: &str = "rbd_mon_dump_";
pub const RGW_USER_TABLE_PREFIX: &str = "rgw_user_mon_";
pub const RGW_USER_DUMP_TABLE_PREFIX: &str = "rgw_user_mon_dump_";

/// Trailing clause shared by every dynamic table: InnoDB, utf8mb4, and one
/// catch-all range partition over `time`. Tables are created once and never
/// dropped.
const DYNAMIC_TABLE_SUFFIX: &str = "INDEX time (time ASC))ENGINE=InnoDB DEFAULT \
     CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci partition by range(time) \
     (partition pm values less than(maxvalue));";

static HEX_DIGEST: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[0-9a-f]{32}$").expect("static digest pattern"));

/// Lowercase hex MD5 digest of a device identifier.
pub fn device_digest(device: &str) -> String {
    format!("{:x}", md5::compute(device.as_bytes()))
}

/// Builds `<prefix><hex(md5(device))>`, refusing any suffix that is not a
/// 32-character lowercase hex digest. The result is the only identifier
/// ever interpolated into statement text.
pub fn dynamic_table_name(prefix: &str, device: &str) -> Result<String, AdapterError> {
    let digest = device_digest(device);
    if !HEX_DIGEST.is_match(&digest) {
        return Err(AdapterError::InvalidTableName(digest));
    }
    Ok(format!("{prefix}{digest}"))
}

fn create_rbd_table_sql(table: &str) -> String {
    format!(
        "create table if not exists {table}(time bigint(11),ceph_rbd_read_ops bigint(20),\
         ceph_rbd_write_ops bigint(20),ceph_rbd_read_bytes bigint(20),\
         ceph_rbd_write_bytes bigint(20),{DYNAMIC_TABLE_SUFFIX}"
    )
}

fn create_rbd_dump_table_sql(table: &str) -> String {
    format!(
        "create table if not exists {table}(time bigint(11),ceph_rbd_read_ops float(32,2),\
         ceph_rbd_write_ops float(32,2),ceph_rbd_read_bytes float(32,2),\
         ceph_rbd_write_bytes float(32,2),type_int tinyint(2),{DYNAMIC_TABLE_SUFFIX}"
    )
}

fn create_rgw_user_table_sql(table: &str) -> String {
    format!(
        "create table if not exists {table}(time bigint(11),ceph_rgw_user_get bigint(20),\
         ceph_rgw_user_put bigint(20),ceph_rgw_user_delete bigint(20),\
         ceph_rgw_user_suc_ops bigint(20),ceph_rgw_user_failed_ops bigint(20),\
         ceph_rgw_user_r_wait bigint(20),ceph_rgw_user_w_wait bigint(20),\
         ceph_rgw_user_r_bytes bigint(20),ceph_rgw_user_w_bytes bigint(20),\
         {DYNAMIC_TABLE_SUFFIX}"
    )
}

fn create_rgw_user_dump_table_sql(table: &str) -> String {
    format!(
        "create table if not exists {table}(time bigint(11),ceph_rgw_user_get float(32,2),\
         ceph_rgw_user_put float(32,2),ceph_rgw_user_delete float(32,2),\
         ceph_rgw_user_suc_ops float(32,2),ceph_rgw_user_failed_ops float(32,2),\
         ceph_rgw_user_r_wait bigint(20),ceph_rgw_user_w_wait bigint(20),\
         ceph_rgw_user_r_bytes float(32,2),ceph_rgw_user_w_bytes float(32,2),\
         type_int tinyint(2),{DYNAMIC_TABLE_SUFFIX}"
    )
}

fn insert_rbd_sql(table: &str) -> String {
    format!(
        "insert ignore {table}(time, ceph_rbd_read_ops, ceph_rbd_write_ops, \
         ceph_rbd_read_bytes, ceph_rbd_write_bytes) values(?,?,?,?,?);"
    )
}

fn insert_rgw_user_sql(table: &str) -> String {
    format!(
        "insert ignore {table}(time, ceph_rgw_user_get, ceph_rgw_user_put, \
         ceph_rgw_user_delete, ceph_rgw_user_suc_ops, ceph_rgw_user_failed_ops, \
         ceph_rgw_user_r_bytes, ceph_rgw_user_w_bytes, ceph_rgw_user_r_wait, \
         ceph_rgw_user_w_wait) values(?,?,?,?,?,?,?,?,?,?);"
    )
}

/// One bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    Float(f64),
}

/// One parameterized statement in a persistence plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlOp {
    pub statement: String,
    pub params: Vec<SqlParam>,
}

impl SqlOp {
    fn new(statement: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            statement: statement.into(),
            params,
        }
    }

    /// Create-table statements carry no parameters.
    fn ddl(statement: String) -> Self {
        Self {
            statement,
            params: Vec::new(),
        }
    }
}

/// Field values in canonical column order; absent fields bind as 0.
fn field_params(entity: &Entity, order: &[&str]) -> Vec<SqlParam> {
    order
        .iter()
        .map(|name| SqlParam::Float(entity.fields.get(*name).copied().unwrap_or(0.0)))
        .collect()
}

/// Builds the statement plan for one batch of complete entities.
///
/// Statement order follows entity order. For the dynamically-tabled modules
/// the live/dump create pair is emitted once per device per plan; the
/// statements use `if not exists`, so concurrent plans racing on the same
/// device remain safe at the database level.
pub fn build_ops(entities: &[Entity]) -> Result<Vec<SqlOp>, AdapterError> {
    let mut ops = Vec::with_capacity(entities.len());
    let mut created: HashSet<(ModuleKind, &str)> = HashSet::new();

    for entity in entities {
        let key = &entity.key;
        match key.module {
            ModuleKind::Host => {
                let mut params = vec![
                    SqlParam::Int(key.time_bucket),
                    SqlParam::Text(key.host.clone()),
                ];
                params.extend(field_params(entity, &HOST_FIELDS));
                ops.push(SqlOp::new(SQL_INSERT_HOST, params));
            }
            ModuleKind::HostNetCard => {
                let mut params = vec![
                    SqlParam::Int(key.time_bucket),
                    SqlParam::Text(key.host.clone()),
                    SqlParam::Text(key.device.clone()),
                ];
                params.extend(field_params(entity, &NETCARD_FIELDS));
                ops.push(SqlOp::new(SQL_INSERT_NETCARD, params));
            }
            ModuleKind::Disk => {
                let mut params = vec![
                    SqlParam::Int(key.time_bucket),
                    SqlParam::Text(key.device.clone()),
                ];
                params.extend(field_params(entity, &DISK_FIELDS));
                ops.push(SqlOp::new(SQL_INSERT_DISK, params));
            }
            ModuleKind::Pool => {
                let mut params = vec![
                    SqlParam::Int(key.time_bucket),
                    SqlParam::Text(key.device.clone()),
                ];
                params.extend(field_params(entity, &POOL_FIELDS));
                ops.push(SqlOp::new(SQL_INSERT_POOL, params));
            }
            ModuleKind::GatewayService => {
                let mut params = vec![
                    SqlParam::Int(key.time_bucket),
                    SqlParam::Text(key.device.clone()),
                ];
                params.extend(field_params(entity, &RGW_SERVICE_FIELDS));
                ops.push(SqlOp::new(SQL_INSERT_RGW_SERVICE, params));
            }
            ModuleKind::BlockDevice => {
                let live = dynamic_table_name(RBD_TABLE_PREFIX, &key.device)?;
                if created.insert((key.module, key.device.as_str())) {
                    let dump = dynamic_table_name(RBD_DUMP_TABLE_PREFIX, &key.device)?;
                    ops.push(SqlOp::ddl(create_rbd_table_sql(&live)));
                    ops.push(SqlOp::ddl(create_rbd_dump_table_sql(&dump)));
                }
                let mut params = vec![SqlParam::Int(key.time_bucket)];
                params.extend(field_params(entity, &RBD_FIELDS));
                ops.push(SqlOp::new(insert_rbd_sql(&live), params));
            }
            ModuleKind::GatewayUser => {
                let live = dynamic_table_name(RGW_USER_TABLE_PREFIX, &key.device)?;
                if created.insert((key.module, key.device.as_str())) {
                    let dump = dynamic_table_name(RGW_USER_DUMP_TABLE_PREFIX, &key.device)?;
                    ops.push(SqlOp::ddl(create_rgw_user_table_sql(&live)));
                    ops.push(SqlOp::ddl(create_rgw_user_dump_table_sql(&dump)));
                }
                let mut params = vec![SqlParam::Int(key.time_bucket)];
                params.extend(field_params(entity, &RGW_USER_FIELDS));
                ops.push(SqlOp::new(insert_rgw_user_sql(&live), params));
            }
        }
    }

    Ok(ops)
}
