//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared wire types,
//! never from `crate::infra`.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use websoft9_common::{Heartbeat, MetricsReport, Task, TaskResult};

use crate::domain::{ExecError, Invocation};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Only an [`Invocation`] can be run, and only the security policy can
/// build one, so every spawn has passed validation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `limit`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run(&self, invocation: &Invocation, limit: Option<Duration>)
    -> Result<Output, ExecError>;
}

// ── Transport Port ────────────────────────────────────────────────────────────

/// The boundary to the control plane. Delivery is at-most-once; the agent
/// does not deduplicate tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next inbound task. `Ok(None)` means the transport is
    /// closed for good.
    ///
    /// Must be cancel-safe: the task listener drops this future on shutdown.
    async fn next_task(&self) -> Result<Option<Task>>;

    async fn send_result(&self, result: &TaskResult) -> Result<()>;

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()>;

    async fn send_metrics(&self, report: &MetricsReport) -> Result<()>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Abstracts network health probes so the monitor can be tested without
/// real network access.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// GET `url` and return the HTTP status code.
    async fn http_status(&self, url: &str, timeout: Duration) -> Result<u16>;

    /// Open a TCP connection to `target` (`host:port`).
    async fn tcp_connect(&self, target: &str, timeout: Duration) -> Result<bool>;
}
