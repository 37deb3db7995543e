//! Lifecycle coordinator: starts and stops the agent's three workers.
//!
//! All workers share one [`CancellationToken`] derived from the caller's
//! token. Each worker loop chooses between "cancelled → exit" and "tick →
//! one unit of work", so cancellation is observed between units, never in
//! the middle of one. [`Agent::stop`] cancels and then awaits every worker
//! handle before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use websoft9_common::{AgentStatus, Heartbeat, Task, TaskResult};

use crate::application::dispatcher::Dispatcher;
use crate::application::monitor::Monitor;
use crate::application::ports::Transport;
use crate::domain::LifecycleError;
use crate::domain::config::AgentConfig;

/// Pause before polling the transport again after a receive error.
pub const TRANSPORT_RETRY: Duration = Duration::from_secs(10);

/// Upper bound for the best-effort `stopping` heartbeat sent on shutdown.
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(2);

/// Periods of the worker loops.
#[derive(Debug, Clone, Copy)]
pub struct WorkerIntervals {
    pub heartbeat: Duration,
    pub monitor: Duration,
    pub health: Duration,
}

impl WorkerIntervals {
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            heartbeat: config.heartbeat_interval(),
            monitor: config.monitor_interval(),
            health: config.health_check_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    Monitor,
    TaskListener,
    Communication,
}

impl Worker {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::TaskListener => "task-listener",
            Self::Communication => "communication",
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handles: Vec<(Worker, JoinHandle<()>)>,
}

/// Decrements the live-worker count when the worker future ends, including
/// by panic or abort.
struct WorkerGuard(Arc<AtomicUsize>);

impl WorkerGuard {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Agent {
    agent_id: String,
    intervals: WorkerIntervals,
    dispatcher: Arc<Dispatcher>,
    monitor: Arc<Monitor>,
    transport: Arc<dyn Transport>,
    active_workers: Arc<AtomicUsize>,
    running: Mutex<Option<Running>>,
}

impl Agent {
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        intervals: WorkerIntervals,
        dispatcher: Arc<Dispatcher>,
        monitor: Arc<Monitor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            intervals,
            dispatcher,
            monitor,
            transport,
            active_workers: Arc::new(AtomicUsize::new(0)),
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Number of worker tasks that have not yet finished.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start all three workers under a child of `parent`. Returns once every
    /// worker has been spawned.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyRunning`] if the agent was started
    /// and not stopped since.
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), LifecycleError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }

        let cancel = parent.child_token();
        let handles = vec![
            (
                Worker::Monitor,
                self.spawn_worker(run_monitor(
                    Arc::clone(&self.monitor),
                    Arc::clone(&self.transport),
                    self.intervals,
                    cancel.clone(),
                )),
            ),
            (
                Worker::TaskListener,
                self.spawn_worker(run_task_listener(
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.transport),
                    cancel.clone(),
                )),
            ),
            (
                Worker::Communication,
                self.spawn_worker(run_communication(
                    self.agent_id.clone(),
                    Arc::clone(&self.transport),
                    self.intervals.heartbeat,
                    cancel.clone(),
                )),
            ),
        ];

        *running = Some(Running { cancel, handles });
        info!(agent_id = %self.agent_id, "agent started");
        Ok(())
    }

    /// Cancel all workers and wait for every one of them to exit. A no-op
    /// when the agent is not running.
    pub async fn stop(&self) {
        let Some(Running { cancel, handles }) = self.running.lock().await.take() else {
            return;
        };
        info!(agent_id = %self.agent_id, "stopping agent");
        cancel.cancel();

        let (workers, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (worker, joined) in workers.into_iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                error!(worker = worker.as_str(), error = %e, "worker ended abnormally");
            }
        }
        info!(agent_id = %self.agent_id, "all workers stopped");
    }

    fn spawn_worker<F>(&self, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = WorkerGuard::enter(&self.active_workers);
        tokio::spawn(async move {
            let _guard = guard;
            work.await;
        })
    }
}

// ── Workers ───────────────────────────────────────────────────────────────────

async fn run_monitor(
    monitor: Arc<Monitor>,
    transport: Arc<dyn Transport>,
    intervals: WorkerIntervals,
    cancel: CancellationToken,
) {
    let worker = Worker::Monitor.as_str();
    info!(worker, "worker started");

    let mut health_tick = interval(intervals.health);
    health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut metrics_tick = interval(intervals.monitor);
    metrics_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut latest_health = Vec::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = health_tick.tick() => {
                latest_health = monitor.run_health_checks().await;
            }
            _ = metrics_tick.tick() => {
                let report = monitor.report(latest_health.clone()).await;
                if let Err(e) = transport.send_metrics(&report).await {
                    warn!(worker, error = %e, "failed to send metrics");
                }
            }
        }
    }
    info!(worker, "worker stopped");
}

async fn run_task_listener(
    dispatcher: Arc<Dispatcher>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) {
    let worker = Worker::TaskListener.as_str();
    info!(worker, "worker started");

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = transport.next_task() => next,
        };
        match next {
            Ok(Some(task)) => {
                let result = dispatch_isolated(&dispatcher, task).await;
                if let Err(e) = transport.send_result(&result).await {
                    error!(worker, task_id = %result.task_id, error = %e, "failed to send task result");
                }
            }
            Ok(None) => {
                info!(worker, "transport closed");
                break;
            }
            Err(e) => {
                warn!(worker, error = %e, "failed to receive task");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(TRANSPORT_RETRY) => {}
                }
            }
        }
    }
    info!(worker, "worker stopped");
}

/// Dispatch on its own tokio task so a panicking handler still yields a
/// result and leaves the listener running.
async fn dispatch_isolated(dispatcher: &Arc<Dispatcher>, task: Task) -> TaskResult {
    let task_id = task.id.clone();
    let dispatcher = Arc::clone(dispatcher);
    match tokio::spawn(async move { dispatcher.dispatch(&task).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(%task_id, error = %e, "task handler panicked");
            TaskResult::failed(&task_id, "task handler panicked")
        }
    }
}

async fn run_communication(
    agent_id: String,
    transport: Arc<dyn Transport>,
    period: Duration,
    cancel: CancellationToken,
) {
    let worker = Worker::Communication.as_str();
    info!(worker, "worker started");

    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = tick.tick() => {
                if let Err(e) = transport.send_heartbeat(&heartbeat(&agent_id, AgentStatus::Running)).await {
                    warn!(worker, error = %e, "failed to send heartbeat");
                }
            }
        }
    }

    let farewell = heartbeat(&agent_id, AgentStatus::Stopping);
    match tokio::time::timeout(FAREWELL_TIMEOUT, transport.send_heartbeat(&farewell)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(worker, error = %e, "failed to send stopping heartbeat"),
        Err(_) => warn!(worker, "stopping heartbeat timed out"),
    }
    info!(worker, "worker stopped");
}

fn heartbeat(agent_id: &str, status: AgentStatus) -> Heartbeat {
    Heartbeat {
        agent_id: agent_id.to_string(),
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    }
}
