//! Typed view over a snapshot.
//!
//! Snapshots are not validated upstream, so every field is optional here: a
//! missing or mistyped value becomes its default instead of failing the whole
//! view.

use monitorcore::Snapshot;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize a field, falling back to the default on a type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Like [`lenient`] for lists: bad elements are skipped, not the whole list.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CpuMetrics {
    #[serde(deserialize_with = "lenient")]
    pub usage: f64,
    #[serde(deserialize_with = "lenient")]
    pub cores: u32,
    /// MHz.
    #[serde(deserialize_with = "lenient")]
    pub frequency: f64,
    #[serde(deserialize_with = "lenient_vec")]
    pub core_usage: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GpuMetrics {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub usage: f64,
    /// MB.
    #[serde(deserialize_with = "lenient")]
    pub memory_used: f64,
    /// MB.
    #[serde(deserialize_with = "lenient")]
    pub memory_total: f64,
    /// Degrees Celsius.
    #[serde(deserialize_with = "lenient")]
    pub temperature: f64,
}

/// Physical memory, in MB.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryMetrics {
    #[serde(deserialize_with = "lenient")]
    pub total: f64,
    #[serde(deserialize_with = "lenient")]
    pub used: f64,
    #[serde(deserialize_with = "lenient")]
    pub free: f64,
    #[serde(deserialize_with = "lenient")]
    pub usage_percent: f64,
}

/// One volume. Sizes in GB, speeds in MB/s.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskMetrics {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub mount_point: String,
    #[serde(deserialize_with = "lenient")]
    pub total: f64,
    #[serde(deserialize_with = "lenient")]
    pub used: f64,
    #[serde(deserialize_with = "lenient")]
    pub free: f64,
    #[serde(deserialize_with = "lenient")]
    pub read_speed: f64,
    #[serde(deserialize_with = "lenient")]
    pub write_speed: f64,
}

impl DiskMetrics {
    pub fn usage_percent(&self) -> f64 {
        if self.total > 0.0 {
            self.used / self.total * 100.0
        } else {
            0.0
        }
    }
}

/// Speeds in MB/s.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkMetrics {
    #[serde(deserialize_with = "lenient")]
    pub download_speed: f64,
    #[serde(deserialize_with = "lenient")]
    pub upload_speed: f64,
    #[serde(deserialize_with = "lenient")]
    pub active_connections: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessMetrics {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub pid: u64,
    #[serde(deserialize_with = "lenient")]
    pub cpu_usage: f64,
    /// MB.
    #[serde(deserialize_with = "lenient")]
    pub memory_usage: f64,
}

/// Everything the renderer shows for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemMetrics {
    #[serde(deserialize_with = "lenient")]
    pub cpu: CpuMetrics,
    #[serde(deserialize_with = "lenient")]
    pub gpu: GpuMetrics,
    #[serde(deserialize_with = "lenient")]
    pub memory: MemoryMetrics,
    #[serde(deserialize_with = "lenient_vec")]
    pub disks: Vec<DiskMetrics>,
    #[serde(deserialize_with = "lenient")]
    pub network: NetworkMetrics,
    #[serde(deserialize_with = "lenient_vec")]
    pub processes: Vec<ProcessMetrics>,
}

impl SystemMetrics {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        serde_json::from_value(snapshot.to_value()).unwrap_or_default()
    }
}
