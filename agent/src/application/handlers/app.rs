//! `deploy_app` and `manage_app`.
//!
//! Both validate their parameters and acknowledge the request. Neither
//! spawns anything: application orchestration is driven by the control
//! plane, the agent only guarantees the inputs are safe.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use websoft9_common::{Task, TaskResult};

use super::{TaskContext, TaskHandler, optional_param, required_param};
use crate::domain::{SecurityPolicy, TaskError};
use crate::domain::security::{require_one_of, validate_service_name};

/// Actions accepted by `manage_app`.
pub const APP_ACTIONS: &[&str] = &["start", "stop", "restart", "remove", "update"];

pub struct AppDeployHandler {
    policy: Arc<SecurityPolicy>,
}

impl AppDeployHandler {
    #[must_use]
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl TaskHandler for AppDeployHandler {
    async fn execute(&self, task: &Task, _ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        let app_name = required_param(task, "app_name")?;
        validate_service_name(&app_name)?;

        let mut result = TaskResult::success(&task.id, "deployment accepted");
        if let Some(config_path) = optional_param(task, "config_path") {
            let canonical = self.policy.validate_config_path(&config_path)?;
            result = result.with_data("config_path", canonical.display().to_string());
        }

        info!(audit = true, task_id = %task.id, %app_name, "deployment accepted");
        Ok(result.with_data("app_name", app_name))
    }
}

pub struct AppManageHandler;

#[async_trait]
impl TaskHandler for AppManageHandler {
    async fn execute(&self, task: &Task, _ctx: &TaskContext) -> Result<TaskResult, TaskError> {
        let app_name = required_param(task, "app_name")?;
        validate_service_name(&app_name)?;
        let action = required_param(task, "action")?;
        require_one_of("action", &action, APP_ACTIONS)?;

        info!(audit = true, task_id = %task.id, %app_name, %action, "app action accepted");
        Ok(TaskResult::success(&task.id, format!("{action} accepted"))
            .with_data("app_name", app_name)
            .with_data("action", action))
    }
}
