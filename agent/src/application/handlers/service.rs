//! `service_manage`: `systemctl <action> <service>` with both values checked.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use websoft9_common::{Task, TaskResult};

use super::{TaskContext, TaskHandler, process_result, required_param};
use crate::application::ports::CommandRunner;
use crate::domain::{SecurityPolicy, TaskError};

pub struct ServiceManageHandler {
    policy: Arc<SecurityPolicy>,
    runner: Arc<dyn CommandRunner>,
    max_output_bytes: usize,
}

impl ServiceManageHandler {
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
impl TaskHandler for ServiceManageHandler {
    async fn execute(&self, task: &Task, ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        let service = required_param(task, "service")?;
        let action = required_param(task, "action")?;
        let invocation = self.policy.systemctl_invocation(&action, &service)?;

        info!(
            audit = true,
            task_id = %task.id,
            %service,
            %action,
            "managing service"
        );

        let output = self.runner.run(&invocation, ctx.time_limit).await?;
        let result = process_result(task, &output, "service action completed", self.max_output_bytes);
        Ok(result.with_data("service", service).with_data("action", action))
    }
}
