//! Shared mock infrastructure for unit tests.
//!
//! Provides a recording [`CommandRunner`] that counts spawns, canned
//! network probes and handlers that hang or panic.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use websoft9_agent::application::handlers::{TaskContext, TaskHandler};
use websoft9_agent::application::ports::{CommandRunner, NetworkProbe};
use websoft9_agent::domain::{ExecError, Invocation, TaskError};
use websoft9_common::{Task, TaskResult};

// ── Output helpers ────────────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: ExitStatus::from_raw(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: ExitStatus::from_raw(code << 8),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

// ── Mock: recording command runner ────────────────────────────────────────────

/// Records every invocation it is asked to run. Responses are canned per
/// full command line (`program arg1 arg2`); anything else gets `fallback`.
pub struct RecordingRunner {
    spawns: AtomicUsize,
    calls: Mutex<Vec<(String, Vec<String>, Option<Duration>)>>,
    responses: HashMap<String, Output>,
    fallback: Output,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            spawns: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            responses: HashMap::new(),
            fallback: ok_output(b""),
        }
    }

    pub fn respond(mut self, command_line: &str, output: Output) -> Self {
        self.responses.insert(command_line.to_string(), output);
        self
    }

    pub fn fallback(mut self, output: Output) -> Self {
        self.fallback = output;
        self
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>, Option<Duration>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        limit: Option<Duration>,
    ) -> Result<Output, ExecError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((
            invocation.program().to_string(),
            invocation.args().to_vec(),
            limit,
        ));
        let key = std::iter::once(invocation.program().to_string())
            .chain(invocation.args().iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(self.responses.get(&key).unwrap_or(&self.fallback).clone())
    }
}

/// Behaves like a process that never exits: honours the limit by returning
/// `TimedOut`, or hangs forever without one.
pub struct HangingRunner {
    pub spawns: AtomicUsize,
}

impl HangingRunner {
    pub fn new() -> Self {
        Self {
            spawns: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CommandRunner for HangingRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        limit: Option<Duration>,
    ) -> Result<Output, ExecError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        match limit {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                Err(ExecError::TimedOut {
                    program: invocation.program().to_string(),
                    limit,
                    pid: Some(4242),
                })
            }
            None => std::future::pending().await,
        }
    }
}

// ── Mock: network probe ───────────────────────────────────────────────────────

pub struct CannedProbe {
    pub http_status: u16,
    pub tcp_open: bool,
}

#[async_trait]
impl NetworkProbe for CannedProbe {
    async fn http_status(&self, _url: &str, _timeout: Duration) -> Result<u16> {
        Ok(self.http_status)
    }

    async fn tcp_connect(&self, _target: &str, _timeout: Duration) -> Result<bool> {
        Ok(self.tcp_open)
    }
}

pub fn healthy_probe() -> Arc<CannedProbe> {
    Arc::new(CannedProbe {
        http_status: 200,
        tcp_open: true,
    })
}

// ── Mock: handlers ────────────────────────────────────────────────────────────

/// Never completes; only the dispatcher's own deadline can end it.
pub struct StuckHandler;

#[async_trait]
impl TaskHandler for StuckHandler {
    async fn execute(&self, _task: &Task, _ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        std::future::pending().await
    }
}

pub struct PanickingHandler;

#[async_trait]
impl TaskHandler for PanickingHandler {
    async fn execute(&self, _task: &Task, _ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        panic!("handler blew up");
    }
}
