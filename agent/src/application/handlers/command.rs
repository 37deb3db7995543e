//! `system_command`: run one allowlisted command as a discrete argv.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use websoft9_common::{Task, TaskResult};

use super::{TaskContext, TaskHandler, process_result, required_param};
use crate::application::ports::CommandRunner;
use crate::domain::{SecurityPolicy, TaskError};

pub struct SystemCommandHandler {
    policy: Arc<SecurityPolicy>,
    runner: Arc<dyn CommandRunner>,
    max_output_bytes: usize,
}

impl SystemCommandHandler {
    #[must_use]
    pub fn new(
        policy: Arc<SecurityPolicy>,
        runner: Arc<dyn CommandRunner>,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            policy,
            runner,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl TaskHandler for SystemCommandHandler {
    async fn execute(&self, task: &Task, ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        let command = required_param(task, "command")?;
        let invocation = self.policy.command_invocation(&command)?;

        info!(
            audit = true,
            task_id = %task.id,
            command = %invocation,
            "executing validated command"
        );

        let output = self.runner.run(&invocation, ctx.time_limit).await?;
        Ok(process_result(
            task,
            &output,
            "command completed",
            self.max_output_bytes,
        ))
    }
}
