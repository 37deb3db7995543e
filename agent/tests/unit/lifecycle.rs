//! Start/stop behaviour of the agent's worker set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use websoft9_agent::application::lifecycle::{Agent, WorkerIntervals};
use websoft9_agent::application::monitor::Monitor;
use websoft9_agent::application::Dispatcher;
use websoft9_agent::domain::{LifecycleError, SecurityPolicy, TaskKind};
use websoft9_agent::infra::transport::{Outbound, TransportHandle, channel_transport};
use websoft9_common::{AgentStatus, Task, TaskResult, TaskStatus};

use crate::mocks::{PanickingHandler, RecordingRunner, healthy_probe, ok_output};

const FREE_OUTPUT: &[u8] = b"              total        used        free      shared  buff/cache   available\n\
Mem:      1000000000   400000000   100000000           0   500000000   600000000\n";

fn fast() -> WorkerIntervals {
    WorkerIntervals {
        heartbeat: Duration::from_millis(50),
        monitor: Duration::from_millis(50),
        health: Duration::from_millis(50),
    }
}

fn runner() -> Arc<RecordingRunner> {
    Arc::new(RecordingRunner::new().respond("free -b", ok_output(FREE_OUTPUT)))
}

fn agent_with(dispatcher: Dispatcher) -> (Agent, TransportHandle) {
    let (transport, handle) = channel_transport(16);
    let runner = runner();
    let monitor = Monitor::new(
        "node-1",
        Arc::new(SecurityPolicy::default()),
        runner,
        healthy_probe(),
        Vec::new(),
    );
    let agent = Agent::new(
        "node-1",
        fast(),
        Arc::new(dispatcher),
        Arc::new(monitor),
        Arc::new(transport),
    );
    (agent, handle)
}

fn agent() -> (Agent, TransportHandle) {
    agent_with(Dispatcher::new(
        Arc::new(SecurityPolicy::default()),
        runner(),
        1024,
    ))
}

async fn next_result(handle: &mut TransportHandle) -> TaskResult {
    tokio::time::timeout(Duration::from_secs(5), handle.next_result())
        .await
        .expect("result within 5s")
        .expect("outbound channel open")
}

async fn wait_for_workers(agent: &Agent, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while agent.active_workers() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker count settles");
}

// --- start / stop ---

#[tokio::test]
async fn start_runs_three_workers_and_stop_joins_them() {
    let (agent, _handle) = agent();
    let root = CancellationToken::new();

    agent.start(&root).await.unwrap();
    assert_eq!(agent.active_workers(), 3);
    assert!(agent.is_running().await);

    agent.stop().await;
    assert_eq!(agent.active_workers(), 0);
    assert!(!agent.is_running().await);
}

#[tokio::test]
async fn repeated_start_stop_cycles_leak_no_workers() {
    let (agent, _handle) = agent();
    let root = CancellationToken::new();

    for _ in 0..5 {
        agent.start(&root).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        agent.stop().await;
        assert_eq!(agent.active_workers(), 0);
    }
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (agent, _handle) = agent();
    let root = CancellationToken::new();

    agent.start(&root).await.unwrap();
    assert!(matches!(
        agent.start(&root).await,
        Err(LifecycleError::AlreadyRunning)
    ));
    assert_eq!(agent.active_workers(), 3);
    agent.stop().await;
}

#[tokio::test]
async fn stop_without_start_is_noop() {
    let (agent, _handle) = agent();
    agent.stop().await;
    assert_eq!(agent.active_workers(), 0);
}

#[tokio::test]
async fn parent_cancellation_stops_workers() {
    let (agent, _handle) = agent();
    let root = CancellationToken::new();

    agent.start(&root).await.unwrap();
    root.cancel();
    wait_for_workers(&agent, 0).await;
    agent.stop().await;
}

// --- task listener ---

#[tokio::test]
async fn each_task_yields_exactly_one_result() {
    let (agent, mut handle) = agent();
    let root = CancellationToken::new();
    agent.start(&root).await.unwrap();

    let tasks = [
        Task::new("a", "no_such_kind"),
        Task::new("b", "manage_app")
            .with_param("app_name", "wordpress")
            .with_param("action", "start"),
        Task::new("c", "system_command").with_param("command", "rm -rf /"),
    ];
    for task in tasks {
        handle.tasks.send(task).await.unwrap();
    }

    let mut results = Vec::new();
    for _ in 0..3 {
        results.push(next_result(&mut handle).await);
    }
    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(results[0].status, TaskStatus::Failed);
    assert_eq!(results[1].status, TaskStatus::Success);
    assert_eq!(results[2].status, TaskStatus::Failed);

    agent.stop().await;
    while let Ok(msg) = handle.outbound.try_recv() {
        assert!(!matches!(msg, Outbound::Result(_)), "unexpected extra result");
    }
}

#[tokio::test]
async fn panicking_handler_yields_failed_result_and_listener_survives() {
    let dispatcher = Dispatcher::empty()
        .with_handler(TaskKind::DeployApp, Arc::new(PanickingHandler))
        .with_handler(
            TaskKind::ManageApp,
            Arc::new(websoft9_agent::application::handlers::AppManageHandler),
        );
    let (agent, mut handle) = agent_with(dispatcher);
    let root = CancellationToken::new();
    agent.start(&root).await.unwrap();

    handle.tasks.send(Task::new("boom", "deploy_app")).await.unwrap();
    handle
        .tasks
        .send(
            Task::new("after", "manage_app")
                .with_param("app_name", "wordpress")
                .with_param("action", "stop"),
        )
        .await
        .unwrap();

    let first = next_result(&mut handle).await;
    assert_eq!(first.task_id, "boom");
    assert_eq!(first.status, TaskStatus::Failed);
    assert_eq!(first.message, "task handler panicked");

    let second = next_result(&mut handle).await;
    assert_eq!(second.task_id, "after");
    assert_eq!(second.status, TaskStatus::Success);

    assert_eq!(agent.active_workers(), 3);
    agent.stop().await;
}

#[tokio::test]
async fn closed_transport_ends_only_the_listener() {
    let (agent, handle) = agent();
    let root = CancellationToken::new();
    agent.start(&root).await.unwrap();

    drop(handle.tasks);
    wait_for_workers(&agent, 2).await;

    agent.stop().await;
    assert_eq!(agent.active_workers(), 0);
}

// --- communication and monitor ---

#[tokio::test]
async fn heartbeats_and_metrics_are_sent() {
    let (agent, mut handle) = agent();
    let root = CancellationToken::new();
    agent.start(&root).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    agent.stop().await;

    let mut running = 0;
    let mut stopping = 0;
    let mut reports = Vec::new();
    while let Ok(msg) = handle.outbound.try_recv() {
        match msg {
            Outbound::Heartbeat(hb) => {
                assert_eq!(hb.agent_id, "node-1");
                assert_eq!(hb.version, env!("CARGO_PKG_VERSION"));
                match hb.status {
                    AgentStatus::Running => running += 1,
                    AgentStatus::Stopping => stopping += 1,
                }
            }
            Outbound::Metrics(report) => reports.push(report),
            Outbound::Result(r) => panic!("unexpected result {}", r.task_id),
        }
    }

    assert!(running >= 2, "only {running} heartbeats");
    assert_eq!(stopping, 1);
    assert!(!reports.is_empty());
    let system = reports[0].system.as_ref().expect("system metrics present");
    assert_eq!(system.memory.total, 1_000_000_000);
    assert_eq!(system.memory.available, 600_000_000);
    assert_eq!(reports[0].agent_id, "node-1");
}
