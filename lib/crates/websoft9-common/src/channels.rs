/// Valkey key and channel prefixes shared by the agent and the control plane
pub mod keys {
    /// Per-agent namespace
    /// Format: websoft9:agent:{agent_id}
    pub const AGENT: &str = "websoft9:agent";

    /// Inbound task channel (pub/sub)
    /// Format: websoft9:agent:{agent_id}:tasks
    /// Value: JSON-serialized Task
    pub const TASKS: &str = "tasks";

    /// Outbound task results (pub/sub)
    /// Format: websoft9:agent:{agent_id}:results
    /// Value: JSON-serialized TaskResult
    pub const RESULTS: &str = "results";

    /// Outbound metrics reports (pub/sub)
    /// Format: websoft9:agent:{agent_id}:metrics
    /// Value: JSON-serialized MetricsReport
    pub const METRICS: &str = "metrics";

    /// Last heartbeat (plain key with TTL)
    /// Format: websoft9:agent:{agent_id}:heartbeat
    /// Value: JSON-serialized Heartbeat
    pub const HEARTBEAT: &str = "heartbeat";
}

/// TTL constants
pub mod ttl {
    /// The heartbeat key expires after this many missed heartbeats
    pub const HEARTBEAT_MISSED_BEATS: u64 = 3;

    /// Heartbeat TTL for a given heartbeat interval
    #[must_use]
    pub fn heartbeat_secs(interval_secs: u64) -> u64 {
        interval_secs.saturating_mul(HEARTBEAT_MISSED_BEATS).max(1)
    }
}

/// Maximum agent id length (same bound as a systemd unit name)
pub const MAX_AGENT_ID_LEN: usize = 64;

fn agent_scoped(agent_id: &str, suffix: &str) -> String {
    format!("{}:{}:{}", keys::AGENT, agent_id, suffix)
}

pub fn tasks_channel(agent_id: &str) -> String {
    agent_scoped(agent_id, keys::TASKS)
}

pub fn results_channel(agent_id: &str) -> String {
    agent_scoped(agent_id, keys::RESULTS)
}

pub fn metrics_channel(agent_id: &str) -> String {
    agent_scoped(agent_id, keys::METRICS)
}

pub fn heartbeat_key(agent_id: &str) -> String {
    agent_scoped(agent_id, keys::HEARTBEAT)
}

/// Validate that an agent id matches `[a-zA-Z0-9_-]{1,64}`.
/// SECURITY: Always call before constructing keys from configured or remote input.
/// Prevents namespace injection through `:` and oversized keys (CWE-20).
pub fn validate_agent_id(agent_id: &str) -> Result<(), &'static str> {
    if agent_id.is_empty() {
        return Err("agent id must not be empty");
    }
    if agent_id.len() > MAX_AGENT_ID_LEN {
        return Err("agent id must be at most 64 characters");
    }
    if !agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("agent id must match [a-zA-Z0-9_-]");
    }
    Ok(())
}
