//! Task handlers, one per [`TaskKind`](crate::domain::TaskKind).
//!
//! Every handler validates the parameters it uses before acting on them.
//! Handlers that spawn processes do so only through an
//! [`Invocation`](crate::domain::Invocation) built by the security policy.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use websoft9_common::{Task, TaskResult};

use crate::domain::TaskError;
use crate::domain::error::ValidationError;
use crate::domain::security::sanitize_input;

mod app;
mod command;
mod service;
mod transfer;

pub use app::{APP_ACTIONS, AppDeployHandler, AppManageHandler};
pub use command::SystemCommandHandler;
pub use service::ServiceManageHandler;
pub use transfer::{FileTransferHandler, TRANSFER_OPERATIONS};

/// Per-task execution settings derived by the dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskContext {
    /// Bound on the task's execution; `None` when the task is unbounded.
    pub time_limit: Option<Duration>,
}

/// Executes one kind of task.
///
/// An `Err` is not a system fault: the dispatcher turns it into a failed
/// (or timed-out) result.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, task: &Task, ctx: &TaskContext) -> Result<TaskResult, TaskError>;
}

/// Fetch a required string parameter and sanitize it.
fn required_param(task: &Task, key: &'static str) -> Result<String, ValidationError> {
    task.str_param(key)
        .map(sanitize_input)
        .ok_or(ValidationError::MissingParam(key))
}

/// Fetch an optional string parameter and sanitize it. Empty after
/// sanitizing counts as absent.
fn optional_param(task: &Task, key: &str) -> Option<String> {
    task.str_param(key)
        .map(sanitize_input)
        .filter(|v| !v.is_empty())
}

/// Build the result for a finished process: combined stdout + stderr under
/// `output` (cut to `max_output_bytes`), exit code under `exit_code`.
fn process_result(
    task: &Task,
    output: &Output,
    success_message: &str,
    max_output_bytes: usize,
) -> TaskResult {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let truncated = truncate_output(&mut combined, max_output_bytes);

    let code = output.status.code();
    let result = if output.status.success() {
        TaskResult::success(&task.id, success_message)
    } else {
        let message = match code {
            Some(code) => format!("process exited with status {code}"),
            None => "process terminated by signal".to_string(),
        };
        TaskResult::failed(&task.id, message)
    };

    let result = result.with_data("output", combined);
    let result = match code {
        Some(code) => result.with_data("exit_code", code),
        None => result,
    };
    if truncated {
        result.with_data("output_truncated", true)
    } else {
        result
    }
}

/// Cut `text` to at most `max` bytes on a char boundary. Returns whether
/// anything was removed.
fn truncate_output(text: &mut String, max: usize) -> bool {
    if text.len() <= max {
        return false;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    true
}
