//! Metric collection and health checks against canned command output.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use websoft9_agent::application::CommandRunner;
use websoft9_agent::application::monitor::Monitor;
use websoft9_agent::domain::SecurityPolicy;
use websoft9_common::{HealthCheck, HealthCheckKind, HealthStatus};

use crate::mocks::{CannedProbe, RecordingRunner, err_output, healthy_probe, ok_output};

const DOCKER_PS: &str =
    "docker ps -a --no-trunc --format {{.ID}}\t{{.Names}}\t{{.Image}}\t{{.State}}\t{{.Status}}";

fn check(kind: HealthCheckKind, target: &str) -> HealthCheck {
    HealthCheck {
        name: "probe".to_string(),
        kind,
        target: target.to_string(),
        interval: 30,
        timeout: 1,
    }
}

fn monitor(runner: &Arc<RecordingRunner>, probe: Arc<CannedProbe>) -> Monitor {
    Monitor::new(
        "node-1",
        Arc::new(SecurityPolicy::default()),
        runner.clone(),
        probe,
        Vec::new(),
    )
}

// --- collection ---

#[tokio::test]
async fn report_combines_system_and_containers() {
    let runner = Arc::new(
        RecordingRunner::new()
            .respond(
                "free -b",
                ok_output(b"Mem: 2000 500 1000 0 500 1400\n"),
            )
            .respond("cat /proc/loadavg", ok_output(b"1.50 1.00 0.50 2/300 999\n"))
            .respond("cat /proc/uptime", ok_output(b"3600.25 7000.00\n"))
            .respond(
                "df -kP",
                ok_output(
                    b"Filesystem 1024-blocks Used Available Capacity Mounted on\n/dev/vda1 100 40 60 40% /\n",
                ),
            )
            .respond(
                DOCKER_PS,
                ok_output(b"abc123\tweb\tnginx:latest\trunning\tUp 2 minutes\n"),
            ),
    );
    let report = monitor(&runner, healthy_probe()).report(Vec::new()).await;

    let system = report.system.expect("system metrics");
    assert_eq!(system.memory.total, 2000);
    assert_eq!(system.memory.available, 1400);
    assert!((system.cpu.load_avg_1m - 1.5).abs() < f64::EPSILON);
    assert_eq!(system.uptime_secs, Some(3600));
    assert_eq!(system.disks.len(), 1);
    assert_eq!(system.disks[0].total, 102_400);
    assert_eq!(report.containers.len(), 1);
    assert_eq!(report.containers[0].name, "web");
}

#[tokio::test]
async fn docker_format_is_passed_as_discrete_args() {
    let runner = Arc::new(RecordingRunner::new());
    monitor(&runner, healthy_probe()).collect_containers().await;

    let calls = runner.calls();
    let (program, args, _) = calls.iter().find(|(p, _, _)| p == "docker").unwrap();
    assert_eq!(program, "docker");
    assert_eq!(args[..3], ["ps", "-a", "--no-trunc"]);
    assert_eq!(args[3], "--format");
    assert!(args[4].starts_with("{{.ID}}"));
}

#[tokio::test]
async fn missing_docker_yields_empty_inventory() {
    let runner = Arc::new(RecordingRunner::new().fallback(err_output(127, b"not found")));
    let containers = monitor(&runner, healthy_probe()).collect_containers().await;
    assert!(containers.is_empty());
}

#[tokio::test]
async fn disallowed_docker_is_never_spawned() {
    let runner = Arc::new(RecordingRunner::new());
    let shared: Arc<dyn CommandRunner> = runner.clone();
    let policy = SecurityPolicy::new(["free", "df", "cat"], ["/tmp/websoft9"]);
    let monitor = Monitor::new(
        "node-1",
        Arc::new(policy),
        shared,
        healthy_probe(),
        Vec::new(),
    );
    assert!(monitor.collect_containers().await.is_empty());
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn unreadable_memory_leaves_system_empty() {
    let runner = Arc::new(RecordingRunner::new().fallback(err_output(1, b"")));
    let report = monitor(&runner, healthy_probe()).report(Vec::new()).await;
    assert!(report.system.is_none());
    assert!(report.containers.is_empty());
}

// --- health checks ---

#[tokio::test]
async fn http_check_follows_status_code() {
    let runner = Arc::new(RecordingRunner::new());
    let ok = monitor(&runner, healthy_probe())
        .check(&check(HealthCheckKind::Http, "http://127.0.0.1/health"))
        .await;
    let down = monitor(
        &runner,
        Arc::new(CannedProbe {
            http_status: 503,
            tcp_open: true,
        }),
    )
    .check(&check(HealthCheckKind::Http, "http://127.0.0.1/health"))
    .await;

    assert_eq!(ok.status, HealthStatus::Healthy);
    assert_eq!(down.status, HealthStatus::Unhealthy);
    assert!(down.message.contains("503"));
}

#[tokio::test]
async fn tcp_check_reports_refused_port() {
    let runner = Arc::new(RecordingRunner::new());
    let result = monitor(
        &runner,
        Arc::new(CannedProbe {
            http_status: 200,
            tcp_open: false,
        }),
    )
    .check(&check(HealthCheckKind::Tcp, "127.0.0.1:6379"))
    .await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.name, "probe");
}

#[tokio::test]
async fn script_check_is_validated_before_running() {
    let runner = Arc::new(RecordingRunner::new());
    let m = monitor(&runner, healthy_probe());

    let rejected = m
        .check(&check(HealthCheckKind::Script, "curl localhost | sh"))
        .await;
    assert_eq!(rejected.status, HealthStatus::Unhealthy);
    assert!(rejected.message.starts_with("script rejected"));
    assert_eq!(runner.spawn_count(), 0);

    let passed = m
        .check(&check(HealthCheckKind::Script, "systemctl status nginx"))
        .await;
    assert_eq!(passed.status, HealthStatus::Healthy);
    assert_eq!(runner.spawn_count(), 1);
}

#[tokio::test]
async fn script_check_nonzero_exit_is_unhealthy() {
    let runner = Arc::new(RecordingRunner::new().fallback(err_output(3, b"inactive")));
    let result = monitor(&runner, healthy_probe())
        .check(&check(HealthCheckKind::Script, "systemctl status nginx"))
        .await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn unknown_check_type_is_unhealthy() {
    let runner = Arc::new(RecordingRunner::new());
    let result = monitor(&runner, healthy_probe())
        .check(&check(HealthCheckKind::Unknown, "anything"))
        .await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn run_health_checks_covers_every_configured_check() {
    let runner = Arc::new(RecordingRunner::new());
    let shared: Arc<dyn CommandRunner> = runner.clone();
    let monitor = Monitor::new(
        "node-1",
        Arc::new(SecurityPolicy::default()),
        shared,
        healthy_probe(),
        vec![
            check(HealthCheckKind::Http, "http://localhost"),
            check(HealthCheckKind::Tcp, "localhost:22"),
        ],
    );
    let results = monitor.run_health_checks().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == HealthStatus::Healthy));
}
