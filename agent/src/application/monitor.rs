//! System, container and health monitoring.
//!
//! Metrics come from allowlisted commands run through the same
//! [`CommandRunner`] the task handlers use, so the monitor has no spawn
//! path of its own. Parsing is done by pure functions over the captured
//! stdout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, warn};
use websoft9_common::{
    ContainerMetrics, CpuMetrics, DiskMetrics, HealthCheck, HealthCheckKind, HealthResult,
    HealthStatus, MemoryMetrics, MetricsReport, NetworkMetrics, SystemMetrics,
};

use crate::application::ports::{CommandRunner, NetworkProbe};
use crate::domain::SecurityPolicy;
use crate::domain::security::sanitize_input;

/// Upper bound for each metric-collection command.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Constant `--format` template for `docker ps`. Appended after validation
/// because the braces would be rejected in operator input.
const DOCKER_PS_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.Image}}\t{{.State}}\t{{.Status}}";

pub struct Monitor {
    agent_id: String,
    policy: Arc<SecurityPolicy>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn NetworkProbe>,
    checks: Vec<HealthCheck>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        policy: Arc<SecurityPolicy>,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn NetworkProbe>,
        checks: Vec<HealthCheck>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            policy,
            runner,
            probe,
            checks,
        }
    }

    /// Build one report. Collection failures degrade to missing fields,
    /// never to an error.
    pub async fn report(&self, health: Vec<HealthResult>) -> MetricsReport {
        let system = match self.collect_system().await {
            Ok(system) => Some(system),
            Err(e) => {
                warn!(error = %e, "system metrics unavailable");
                None
            }
        };
        MetricsReport {
            agent_id: self.agent_id.clone(),
            timestamp: Utc::now(),
            system,
            containers: self.collect_containers().await,
            health,
        }
    }

    /// Collect CPU, memory, disk, network and uptime figures.
    ///
    /// # Errors
    ///
    /// Returns an error only if memory figures cannot be read; the other
    /// sections fall back to defaults.
    pub async fn collect_system(&self) -> Result<SystemMetrics> {
        let memory = parse_free(&self.capture("free -b").await?)?;

        let (load_1, load_5, load_15) = match self.capture("cat /proc/loadavg").await {
            Ok(out) => parse_loadavg(&out).unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "load average unavailable");
                (0.0, 0.0, 0.0)
            }
        };
        let cpu = CpuMetrics {
            cores: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            load_avg_1m: load_1,
            load_avg_5m: load_5,
            load_avg_15m: load_15,
        };

        let disks = self
            .capture("df -kP")
            .await
            .map(|out| parse_df(&out))
            .unwrap_or_default();
        let network = self
            .capture("cat /proc/net/dev")
            .await
            .map(|out| parse_net_dev(&out))
            .unwrap_or_default();
        let uptime_secs = self
            .capture("cat /proc/uptime")
            .await
            .ok()
            .and_then(|out| parse_uptime(&out));

        Ok(SystemMetrics {
            cpu,
            memory,
            disks,
            network,
            uptime_secs,
        })
    }

    /// List containers via `docker ps -a`. An absent or failing docker
    /// yields an empty list.
    pub async fn collect_containers(&self) -> Vec<ContainerMetrics> {
        let invocation = match self.policy.command_invocation("docker ps -a --no-trunc") {
            Ok(inv) => inv.with_fixed_args(&["--format", DOCKER_PS_FORMAT]),
            Err(e) => {
                debug!(rule = %e, "container inventory disabled by policy");
                return Vec::new();
            }
        };
        match self.runner.run(&invocation, Some(COLLECT_TIMEOUT)).await {
            Ok(out) if out.status.success() => parse_docker_ps(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                debug!(status = ?out.status.code(), "docker ps failed");
                Vec::new()
            }
            Err(e) => {
                debug!(error = %e, "docker unavailable");
                Vec::new()
            }
        }
    }

    /// Run every configured health check once.
    pub async fn run_health_checks(&self) -> Vec<HealthResult> {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            results.push(self.check(check).await);
        }
        results
    }

    /// Run a single health check.
    pub async fn check(&self, check: &HealthCheck) -> HealthResult {
        let started = Instant::now();
        let timeout = Duration::from_secs(check.timeout.max(1));
        let (status, message) = match check.kind {
            HealthCheckKind::Http => match self.probe.http_status(&check.target, timeout).await {
                Ok(code) if (200..300).contains(&code) => {
                    (HealthStatus::Healthy, format!("HTTP {code}"))
                }
                Ok(code) => (HealthStatus::Unhealthy, format!("unexpected HTTP status {code}")),
                Err(e) => (HealthStatus::Unhealthy, format!("HTTP check failed: {e}")),
            },
            HealthCheckKind::Tcp => match self.probe.tcp_connect(&check.target, timeout).await {
                Ok(true) => (HealthStatus::Healthy, "TCP connection established".to_string()),
                Ok(false) => (HealthStatus::Unhealthy, "TCP connection refused".to_string()),
                Err(e) => (HealthStatus::Unhealthy, format!("TCP check failed: {e}")),
            },
            HealthCheckKind::Script => self.check_script(&check.target, timeout).await,
            HealthCheckKind::Unknown => {
                (HealthStatus::Unhealthy, "unknown check type".to_string())
            }
        };

        if status == HealthStatus::Unhealthy {
            debug!(check = %check.name, %message, "health check unhealthy");
        }
        HealthResult {
            name: check.name.clone(),
            status,
            message,
            timestamp: Utc::now(),
            duration: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn check_script(&self, target: &str, timeout: Duration) -> (HealthStatus, String) {
        let invocation = match self.policy.command_invocation(&sanitize_input(target)) {
            Ok(inv) => inv,
            Err(e) => return (HealthStatus::Unhealthy, format!("script rejected: {e}")),
        };
        match self.runner.run(&invocation, Some(timeout)).await {
            Ok(out) if out.status.success() => (HealthStatus::Healthy, "script exited 0".to_string()),
            Ok(out) => (
                HealthStatus::Unhealthy,
                format!("script exited with status {:?}", out.status.code()),
            ),
            Err(e) => (HealthStatus::Unhealthy, e.to_string()),
        }
    }

    /// Run a fixed collection command and return its stdout.
    async fn capture(&self, command: &str) -> Result<String> {
        let invocation = self
            .policy
            .command_invocation(command)
            .with_context(|| format!("'{command}' not permitted"))?;
        let out = self.runner.run(&invocation, Some(COLLECT_TIMEOUT)).await?;
        if !out.status.success() {
            bail!("'{command}' exited with status {:?}", out.status.code());
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse `free -b`.
///
/// # Errors
///
/// Returns an error if the `Mem:` row is missing or malformed.
pub fn parse_free(stdout: &str) -> Result<MemoryMetrics> {
    let row = stdout
        .lines()
        .find(|l| l.starts_with("Mem:"))
        .context("no Mem: row in free output")?;
    let fields: Vec<u64> = row
        .split_whitespace()
        .skip(1)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .context("non-numeric field in free output")?;
    let &[total, used, free, ..] = fields.as_slice() else {
        bail!("free output has too few columns");
    };
    // Column 6 ("available") is absent on very old procps.
    let available = fields.get(5).copied().unwrap_or(free);
    Ok(MemoryMetrics {
        total,
        used,
        available,
        usage: percent(used, total),
    })
}

/// Parse `/proc/loadavg` into the 1, 5 and 15 minute averages.
#[must_use]
pub fn parse_loadavg(stdout: &str) -> Option<(f64, f64, f64)> {
    let mut it = stdout.split_whitespace().map(str::parse::<f64>);
    Some((it.next()?.ok()?, it.next()?.ok()?, it.next()?.ok()?))
}

/// Parse `/proc/uptime` into whole seconds.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_uptime(stdout: &str) -> Option<u64> {
    let secs: f64 = stdout.split_whitespace().next()?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(secs as u64)
    } else {
        None
    }
}

/// Parse POSIX `df -kP` output. Sizes are converted from KiB to bytes.
/// Pseudo filesystems reporting zero blocks are skipped.
#[must_use]
pub fn parse_df(stdout: &str) -> Vec<DiskMetrics> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            let total: u64 = fields[1].parse().ok()?;
            let used: u64 = fields[2].parse().ok()?;
            let free: u64 = fields[3].parse().ok()?;
            if total == 0 {
                return None;
            }
            Some(DiskMetrics {
                device: fields[0].to_string(),
                mountpoint: fields[5..].join(" "),
                total: total * 1024,
                used: used * 1024,
                free: free * 1024,
                usage: percent(used, used + free),
            })
        })
        .collect()
}

/// Sum the counters of `/proc/net/dev`, excluding loopback.
#[must_use]
pub fn parse_net_dev(stdout: &str) -> NetworkMetrics {
    let mut net = NetworkMetrics::default();
    for line in stdout.lines().skip(2) {
        let Some((iface, counters)) = line.split_once(':') else {
            continue;
        };
        if iface.trim() == "lo" {
            continue;
        }
        let fields: Vec<u64> = counters
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 10 {
            continue;
        }
        net.bytes_recv += fields[0];
        net.packets_recv += fields[1];
        net.bytes_sent += fields[8];
        net.packets_sent += fields[9];
    }
    net
}

/// Parse the tab-separated rows produced by [`DOCKER_PS_FORMAT`].
#[must_use]
pub fn parse_docker_ps(stdout: &str) -> Vec<ContainerMetrics> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            Some(ContainerMetrics {
                id: cols.next()?.chars().take(12).collect(),
                name: cols.next()?.to_string(),
                image: cols.next()?.to_string(),
                state: cols.next()?.to_string(),
                status: cols.next()?.to_string(),
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
