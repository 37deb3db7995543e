//! Loading `agent.yaml` through the config-path policy.

#![allow(clippy::unwrap_used)]

use std::fs;

use websoft9_agent::domain::SecurityPolicy;
use websoft9_agent::infra::config::{EnvOverrides, load_config_with};

fn policy_for(root: &std::path::Path) -> SecurityPolicy {
    SecurityPolicy::new(["ls"], [root])
}

const YAML: &str = "\
agent:
  id: edge-01
  heartbeat_interval: 10
log:
  level: warn
security:
  allowed_commands: [df, free, docker]
  allowed_roots: [/opt/websoft9]
health_checks:
  - name: web
    type: http
    target: http://127.0.0.1:8080/health
  - name: legacy
    type: snmp
    target: 127.0.0.1
";

#[test]
fn loads_yaml_inside_allowed_root() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.yaml");
    fs::write(&path, YAML).unwrap();

    let config = load_config_with(
        &policy_for(dir.path()),
        path.to_str().unwrap(),
        EnvOverrides::default(),
    )
    .unwrap();

    assert_eq!(config.agent.id, "edge-01");
    assert_eq!(config.agent.heartbeat_interval, 10);
    assert_eq!(config.agent.monitor_interval, 60);
    assert_eq!(config.log.level, "warn");
    assert_eq!(config.security.allowed_commands, ["df", "free", "docker"]);
    assert_eq!(config.health_checks.len(), 2);
    assert_eq!(
        config.health_checks[1].kind,
        websoft9_common::HealthCheckKind::Unknown
    );
}

#[test]
fn env_overrides_win_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.yml");
    fs::write(&path, YAML).unwrap();

    let overrides = EnvOverrides::from_pairs([
        ("WEBSOFT9_AGENT_ID".to_string(), "edge-02".to_string()),
        ("WEBSOFT9_AGENT_LOG_LEVEL".to_string(), "debug".to_string()),
    ])
    .unwrap();
    let config =
        load_config_with(&policy_for(dir.path()), path.to_str().unwrap(), overrides).unwrap();
    assert_eq!(config.agent.id, "edge-02");
    assert_eq!(config.log.level, "debug");
}

#[test]
fn rejects_path_outside_allowed_roots() {
    let allowed = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let path = other.path().join("agent.yaml");
    fs::write(&path, YAML).unwrap();

    let err = load_config_with(
        &policy_for(allowed.path()),
        path.to_str().unwrap(),
        EnvOverrides::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("outside the allowed directories"));
}

#[test]
fn rejects_traversal_out_of_root() {
    let dir = tempfile::tempdir().unwrap();
    let sneaky = format!("{}/../../etc/passwd", dir.path().display());
    let err = load_config_with(&policy_for(dir.path()), &sneaky, EnvOverrides::default())
        .unwrap_err();
    assert!(format!("{err:#}").contains("config path rejected"));
}

#[test]
fn rejects_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.exe");
    fs::write(&path, YAML).unwrap();

    let err = load_config_with(
        &policy_for(dir.path()),
        path.to_str().unwrap(),
        EnvOverrides::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("extension"));
}

#[cfg(unix)]
#[test]
fn rejects_symlink_escaping_root() {
    let root = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("real.yaml");
    fs::write(&target, YAML).unwrap();
    let link = root.path().join("agent.yaml");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let err = load_config_with(
        &policy_for(root.path()),
        link.to_str().unwrap(),
        EnvOverrides::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("outside the allowed directories"));
}

#[test]
fn invalid_config_is_rejected_after_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.yaml");
    fs::write(&path, "agent:\n  id: \"bad:id\"\n").unwrap();

    let err = load_config_with(
        &policy_for(dir.path()),
        path.to_str().unwrap(),
        EnvOverrides::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("invalid agent id"));
}
