//! Routes a task to its handler and always produces exactly one result.
//!
//! Unknown kinds and parameter violations are answered without touching a
//! handler. Handler errors become `failed` results; a process killed at its
//! time limit becomes a `timeout` result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use websoft9_common::{Task, TaskResult};

use crate::application::handlers::{
    AppDeployHandler, AppManageHandler, FileTransferHandler, ServiceManageHandler,
    SystemCommandHandler, TaskContext, TaskHandler,
};
use crate::application::ports::CommandRunner;
use crate::domain::security::validate_task_params;
use crate::domain::{ExecError, SecurityPolicy, TaskError, TaskKind, ValidationError};

/// Extra time a handler gets past the task timeout before the dispatcher
/// gives up on it. The command runner enforces the exact limit itself.
pub const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

pub struct Dispatcher {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl Dispatcher {
    /// Register the standard handler for every [`TaskKind`].
    #[must_use]
    pub fn new(
        policy: Arc<SecurityPolicy>,
        runner: Arc<dyn CommandRunner>,
        max_output_bytes: usize,
    ) -> Self {
        Self::empty()
            .with_handler(
                TaskKind::SystemCommand,
                Arc::new(SystemCommandHandler::new(
                    Arc::clone(&policy),
                    Arc::clone(&runner),
                    max_output_bytes,
                )),
            )
            .with_handler(
                TaskKind::ServiceManage,
                Arc::new(ServiceManageHandler::new(
                    Arc::clone(&policy),
                    runner,
                    max_output_bytes,
                )),
            )
            .with_handler(
                TaskKind::DeployApp,
                Arc::new(AppDeployHandler::new(Arc::clone(&policy))),
            )
            .with_handler(TaskKind::ManageApp, Arc::new(AppManageHandler))
            .with_handler(
                TaskKind::FileTransfer,
                Arc::new(FileTransferHandler::new(policy)),
            )
    }

    /// A dispatcher with no handlers; every task is answered `failed`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for `kind`.
    #[must_use]
    pub fn with_handler(mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    #[must_use]
    pub fn handles(&self, kind: TaskKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Execute `task` and return its result, stamped with the wall-clock
    /// duration. Never fails.
    pub async fn dispatch(&self, task: &Task) -> TaskResult {
        let started = Instant::now();
        let result = self.route(task).await.with_duration(started.elapsed());
        info!(
            task_id = %task.id,
            kind = %task.kind,
            status = %result.status,
            duration_ms = result.duration,
            "task finished"
        );
        result
    }

    async fn route(&self, task: &Task) -> TaskResult {
        let Some(kind) = TaskKind::parse(&task.kind) else {
            warn!(task_id = %task.id, "rejecting task of unknown type");
            return TaskResult::failed(&task.id, "unknown task type");
        };
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(task_id = %task.id, %kind, "no handler registered");
            return TaskResult::failed(&task.id, format!("no handler registered for {kind}"));
        };

        if let Err(e) = validate_task_params(&task.params) {
            return rejected(task, kind, &e);
        }

        let ctx = TaskContext {
            time_limit: task.time_limit(),
        };
        debug!(task_id = %task.id, %kind, time_limit = ?ctx.time_limit, "dispatching task");

        let outcome = match ctx.time_limit {
            Some(limit) => {
                match tokio::time::timeout(limit + TIMEOUT_GRACE, handler.execute(task, &ctx)).await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(task_id = %task.id, %kind, "handler exceeded task timeout");
                        return TaskResult::timed_out(
                            &task.id,
                            format!("task exceeded its {}s timeout", limit.as_secs()),
                        );
                    }
                }
            }
            None => handler.execute(task, &ctx).await,
        };

        match outcome {
            Ok(result) => result,
            Err(TaskError::Validation(e)) => rejected(task, kind, &e),
            Err(TaskError::Exec(ExecError::TimedOut { program, limit, pid })) => {
                warn!(task_id = %task.id, %program, ?pid, "process killed at task timeout");
                let result = TaskResult::timed_out(
                    &task.id,
                    format!("{program} timed out after {}s and was killed", limit.as_secs()),
                );
                match pid {
                    Some(pid) => result.with_data("pid", pid),
                    None => result,
                }
            }
            Err(e) => {
                warn!(task_id = %task.id, %kind, error = %e, "task failed");
                TaskResult::failed(&task.id, e.to_string())
            }
        }
    }
}

/// Audit a validation rejection and turn it into a failed result.
fn rejected(task: &Task, kind: TaskKind, error: &ValidationError) -> TaskResult {
    info!(
        audit = true,
        task_id = %task.id,
        %kind,
        rule = %error,
        "task rejected by validation"
    );
    TaskResult::failed(&task.id, TaskError::from(error.clone()).to_string())
}
