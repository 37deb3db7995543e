//! In-process transport over tokio channels, for embedding and tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use websoft9_common::{Heartbeat, MetricsReport, Task, TaskResult};

use crate::application::ports::Transport;

/// A message the agent sent outward.
#[derive(Debug, Clone)]
pub enum Outbound {
    Result(TaskResult),
    Heartbeat(Heartbeat),
    Metrics(MetricsReport),
}

pub struct ChannelTransport {
    tasks: Mutex<mpsc::Receiver<Task>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// The control-plane side of a [`ChannelTransport`].
pub struct TransportHandle {
    pub tasks: mpsc::Sender<Task>,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl TransportHandle {
    /// Wait for the next task result, skipping heartbeats and metrics.
    pub async fn next_result(&mut self) -> Option<TaskResult> {
        while let Some(msg) = self.outbound.recv().await {
            if let Outbound::Result(result) = msg {
                return Some(result);
            }
        }
        None
    }
}

/// Create a transport and its handle. `buffer` bounds the inbound task queue.
#[must_use]
pub fn channel_transport(buffer: usize) -> (ChannelTransport, TransportHandle) {
    let (task_tx, task_rx) = mpsc::channel(buffer.max(1));
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            tasks: Mutex::new(task_rx),
            outbound: out_tx,
        },
        TransportHandle {
            tasks: task_tx,
            outbound: out_rx,
        },
    )
}

impl ChannelTransport {
    fn push(&self, msg: Outbound) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| anyhow!("outbound channel closed"))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_task(&self) -> Result<Option<Task>> {
        Ok(self.tasks.lock().await.recv().await)
    }

    async fn send_result(&self, result: &TaskResult) -> Result<()> {
        self.push(Outbound::Result(result.clone()))
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.push(Outbound::Heartbeat(heartbeat.clone()))
    }

    async fn send_metrics(&self, report: &MetricsReport) -> Result<()> {
        self.push(Outbound::Metrics(report.clone()))
    }
}
