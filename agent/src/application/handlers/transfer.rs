//! `file_transfer`: validates the operation and confines both ends of the
//! transfer to the allowed roots.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use websoft9_common::{Task, TaskResult};

use super::{TaskContext, TaskHandler, optional_param, required_param};
use crate::domain::error::ValidationError;
use crate::domain::security::require_one_of;
use crate::domain::{SecurityPolicy, TaskError};

pub const TRANSFER_OPERATIONS: &[&str] = &["upload", "download", "copy", "move", "delete"];

pub struct FileTransferHandler {
    policy: Arc<SecurityPolicy>,
}

impl FileTransferHandler {
    #[must_use]
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl TaskHandler for FileTransferHandler {
    async fn execute(&self, task: &Task, _ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        let operation = required_param(task, "operation")?;
        require_one_of("operation", &operation, TRANSFER_OPERATIONS)?;

        let source = optional_param(task, "source");
        let destination = optional_param(task, "destination");
        if source.is_none() && destination.is_none() {
            return Err(ValidationError::MissingParam("source").into());
        }

        let mut result = TaskResult::success(&task.id, format!("{operation} accepted"))
            .with_data("operation", operation.clone());
        for (key, raw) in [("source", source), ("destination", destination)] {
            if let Some(raw) = raw {
                let canonical = self.policy.validate_path(&raw)?;
                result = result.with_data(key, canonical.display().to_string());
            }
        }

        info!(audit = true, task_id = %task.id, %operation, "file transfer accepted");
        Ok(result)
    }
}
