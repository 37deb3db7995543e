use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// String-keyed parameter / data map carried by tasks and results.
pub type Params = serde_json::Map<String, serde_json::Value>;

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// A unit of remotely requested work.
///
/// `kind` stays a raw string on the wire: the agent decides which kinds it
/// understands, and an unknown kind must still yield a result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
    /// Execution bound in seconds; 0 means no bound.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub priority: i32,
}

impl Task {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: Params::new(),
            timeout: 0,
            priority: 0,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// The execution bound, or `None` when the task is unbounded.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Returns the string parameter `key`, if present and a string.
    #[must_use]
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failed,
    Timeout,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of exactly one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    #[serde(default)]
    pub data: Params,
    /// Wall-clock execution time in milliseconds.
    #[serde(default)]
    pub duration: u64,
}

impl TaskResult {
    fn with_status(task_id: &str, status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.to_string(),
            status,
            message: message.into(),
            data: Params::new(),
            duration: 0,
        }
    }

    pub fn success(task_id: &str, message: impl Into<String>) -> Self {
        Self::with_status(task_id, TaskStatus::Success, message)
    }

    pub fn failed(task_id: &str, message: impl Into<String>) -> Self {
        Self::with_status(task_id, TaskStatus::Failed, message)
    }

    pub fn timed_out(task_id: &str, message: impl Into<String>) -> Self {
        Self::with_status(task_id, TaskStatus::Timeout, message)
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

// ── Heartbeat ─────────────────────────────────────────────────────────────────

/// Agent run state reported with each heartbeat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Stopping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: String,
    pub status: AgentStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

// ── Health checks ─────────────────────────────────────────────────────────────

/// Probe type of a health check. Unrecognised types deserialize to `Unknown`
/// and are always reported unhealthy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckKind {
    Http,
    Tcp,
    Script,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: HealthCheckKind,
    pub target: String,
    /// Seconds between runs.
    #[serde(default = "default_check_interval")]
    pub interval: u64,
    /// Probe timeout in seconds.
    #[serde(default = "default_check_timeout")]
    pub timeout: u64,
}

fn default_check_interval() -> u64 {
    30
}

fn default_check_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Probe time in milliseconds.
    pub duration: u64,
}

// ── Metrics ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuMetrics {
    pub cores: usize,
    pub load_avg_1m: f64,
    pub load_avg_5m: f64,
    pub load_avg_15m: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    /// Used percentage, 0–100.
    pub usage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiskMetrics {
    pub device: String,
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disks: Vec<DiskMetrics>,
    pub network: NetworkMetrics,
    pub uptime_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerMetrics {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
}

/// Everything the monitor worker reports in one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub system: Option<SystemMetrics>,
    pub containers: Vec<ContainerMetrics>,
    pub health: Vec<HealthResult>,
}
