//! Typed domain error enums.
//!
//! Validation messages name the rule that was violated. They never echo the
//! full rejected input, so they are safe to put in a `TaskResult` and in
//! `info`-level audit logs.

use std::time::Duration;

use thiserror::Error;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Input rejected before it reaches any process or filesystem call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("command must not be empty")]
    EmptyCommand,

    #[error("command contains forbidden character '{0}'")]
    ForbiddenCharacter(char),

    #[error("base command is not in the allowlist")]
    CommandNotAllowed,

    #[error("systemctl action is not allowed (allowed: {allowed})")]
    SystemctlActionNotAllowed { allowed: String },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service name must match [a-zA-Z0-9_-]+")]
    InvalidServiceName,

    #[error("service name is {len} characters long (max {max})")]
    ServiceNameTooLong { len: usize, max: usize },

    #[error("path must not be empty")]
    EmptyPath,

    #[error("path cannot be resolved: {0}")]
    UnresolvablePath(String),

    #[error("path is a dangling symlink")]
    DanglingSymlink,

    #[error("path is outside the allowed directories")]
    PathOutsideAllowedRoots,

    #[error("file extension is not allowed (allowed: {allowed})")]
    ExtensionNotAllowed { allowed: String },

    #[error("parameter key must match [a-zA-Z0-9_-]+")]
    InvalidParamKey,

    #[error("parameter '{key}' is {len} bytes long (max {max})")]
    ParamValueTooLong { key: String, len: usize, max: usize },

    #[error("missing string parameter '{0}'")]
    MissingParam(&'static str),

    #[error("'{field}' must be one of: {allowed}")]
    NotOneOf { field: &'static str, allowed: String },
}

// ── Execution errors ──────────────────────────────────────────────────────────

/// Failure to run a validated invocation to completion.
///
/// A non-zero exit is *not* an `ExecError`; it is reported through the
/// captured `Output`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s and was killed", .limit.as_secs())]
    TimedOut {
        program: String,
        limit: Duration,
        /// OS pid of the killed child, when the platform reported one.
        pid: Option<u32>,
    },
}

// ── Task errors ───────────────────────────────────────────────────────────────

/// Error returned by a task handler. The dispatcher converts every variant
/// into a structured `TaskResult`; none of them stops a worker.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors in the loaded agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid agent id: {0}")]
    InvalidAgentId(&'static str),

    #[error("{field} must be greater than 0")]
    ZeroInterval { field: &'static str },

    #[error("invalid log level '{0}' (valid: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("allowed root '{0}' must be an absolute path")]
    RelativeRoot(String),

    #[error("security.allowed_commands must not be empty")]
    NoAllowedCommands,
}

// ── Lifecycle errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("agent is already running")]
    AlreadyRunning,
}
