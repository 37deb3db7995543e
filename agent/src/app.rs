//! Builds the agent from a validated configuration.
//!
//! Every long-lived collaborator is constructed here, once, so that a
//! missing dependency fails startup instead of surfacing mid-run.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::application::dispatcher::Dispatcher;
use crate::application::lifecycle::{Agent, WorkerIntervals};
use crate::application::monitor::Monitor;
use crate::application::ports::{CommandRunner, NetworkProbe, Transport};
use crate::domain::config::AgentConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::network::HttpNetworkProbe;

/// Assemble an [`Agent`] wired to production infrastructure and `transport`.
///
/// # Errors
///
/// Returns an error if the HTTP client for health probes cannot be built.
pub fn build_agent(config: &AgentConfig, transport: Arc<dyn Transport>) -> Result<Agent> {
    let policy = Arc::new(config.security_policy());

    let mut runner = TokioCommandRunner::new();
    if config.agent.work_dir.is_dir() {
        runner = runner.with_working_dir(&config.agent.work_dir);
    } else {
        warn!(
            work_dir = %config.agent.work_dir.display(),
            "work_dir does not exist, processes inherit the agent's directory"
        );
    }
    let runner: Arc<dyn CommandRunner> = Arc::new(runner);
    let probe: Arc<dyn NetworkProbe> = Arc::new(HttpNetworkProbe::new()?);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&policy),
        Arc::clone(&runner),
        config.agent.max_output_bytes,
    ));
    let monitor = Arc::new(Monitor::new(
        config.agent.id.clone(),
        policy,
        runner,
        probe,
        config.health_checks.clone(),
    ));

    Ok(Agent::new(
        config.agent.id.clone(),
        WorkerIntervals::from_config(config),
        dispatcher,
        monitor,
        transport,
    ))
}
