//! Allowlist validation for everything that reaches a process or the filesystem.
//!
//! Checks are layered fail-fast: the metacharacter denylist first, then the
//! base-command allowlist, then command-specific sub-validation. A
//! [`SecurityPolicy`] is built once at startup and shared read-only, so
//! concurrent callers need no locking.
//!
//! The only way to obtain an [`Invocation`] (the value a `CommandRunner`
//! accepts) is through a policy method that has validated the input.

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use websoft9_common::Params;

use crate::domain::error::ValidationError;

/// `[a-zA-Z0-9_-]+`, shared by service names and parameter keys.
pub static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex")
});

/// Shell metacharacters rejected anywhere in a command string.
pub const FORBIDDEN_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>', '"', '\'',
];

/// Base commands permitted when the configuration does not override them.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "systemctl", "docker", "ps", "top", "df", "free", "uptime", "whoami", "id", "pwd", "ls", "cat",
    "grep", "awk", "sed", "tail", "head",
];

pub const SYSTEMCTL_ACTIONS: &[&str] = &[
    "start", "stop", "restart", "status", "enable", "disable", "reload",
];

/// Directories a config or transfer path may resolve into by default.
pub const DEFAULT_ALLOWED_ROOTS: &[&str] = &[
    "/etc/websoft9",
    "/var/lib/websoft9",
    "/opt/websoft9",
    "/tmp/websoft9",
];

pub const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "toml", "conf"];

pub const MAX_SERVICE_NAME_LEN: usize = 64;
pub const MAX_INPUT_BYTES: usize = 1024;
pub const MAX_PARAM_VALUE_BYTES: usize = 4096;

// ── Invocation ────────────────────────────────────────────────────────────────

/// A program and its discrete argument vector, produced only by validation.
///
/// Runners execute it directly; it is never re-joined into a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Append compile-time constant arguments (e.g. a `docker --format`
    /// template). Only `'static` strings are accepted, so remote input can
    /// never take this path.
    #[must_use]
    pub fn with_fixed_args(mut self, extra: &[&'static str]) -> Self {
        self.args.extend(extra.iter().map(|a| (*a).to_string()));
        self
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ── Policy ────────────────────────────────────────────────────────────────────

/// Immutable allowlists supplied by configuration.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    allowed_commands: BTreeSet<String>,
    allowed_roots: Vec<PathBuf>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_COMMANDS.iter().copied(),
            DEFAULT_ALLOWED_ROOTS.iter().copied(),
        )
    }
}

impl SecurityPolicy {
    pub fn new<C, R>(
        allowed_commands: impl IntoIterator<Item = C>,
        allowed_roots: impl IntoIterator<Item = R>,
    ) -> Self
    where
        C: Into<String>,
        R: Into<PathBuf>,
    {
        Self {
            allowed_commands: allowed_commands.into_iter().map(Into::into).collect(),
            allowed_roots: allowed_roots.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    #[must_use]
    pub fn is_command_allowed(&self, base: &str) -> bool {
        self.allowed_commands.contains(base)
    }

    /// Validate a full command line.
    ///
    /// # Errors
    ///
    /// Returns the first rule the command violates.
    pub fn validate_command(&self, command: &str) -> Result<(), ValidationError> {
        self.command_invocation(command).map(|_| ())
    }

    /// Validate a command line and split it into an argv [`Invocation`].
    ///
    /// # Errors
    ///
    /// Returns the first rule the command violates.
    pub fn command_invocation(&self, command: &str) -> Result<Invocation, ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        if let Some(c) = command.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(ValidationError::ForbiddenCharacter(c));
        }

        let mut parts = command.split_whitespace();
        let Some(base) = parts.next() else {
            return Err(ValidationError::EmptyCommand);
        };
        let args: Vec<String> = parts.map(str::to_owned).collect();

        if !self.is_command_allowed(base) {
            tracing::debug!(base, "rejected base command");
            return Err(ValidationError::CommandNotAllowed);
        }

        if base == "systemctl" && args.len() >= 2 {
            validate_systemctl_action(&args[0])?;
            validate_service_name(&args[1])?;
        }

        Ok(Invocation {
            program: base.to_string(),
            args,
        })
    }

    /// Validate a systemctl action and unit name and build the invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if `systemctl` itself is not allowed, or the action
    /// or service name is invalid.
    pub fn systemctl_invocation(
        &self,
        action: &str,
        service: &str,
    ) -> Result<Invocation, ValidationError> {
        if !self.is_command_allowed("systemctl") {
            return Err(ValidationError::CommandNotAllowed);
        }
        validate_systemctl_action(action)?;
        validate_service_name(service)?;
        Ok(Invocation {
            program: "systemctl".to_string(),
            args: vec![action.to_string(), service.to_string()],
        })
    }

    /// Canonicalize `path` and require it to live under an allowed root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, cannot be resolved, is a
    /// dangling symlink, or resolves outside every allowed root.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf, ValidationError> {
        if path.is_empty() {
            return Err(ValidationError::EmptyPath);
        }

        let canonical = resolve_path(Path::new(path))?;

        let inside = self
            .allowed_roots
            .iter()
            .filter_map(|root| resolve_path(root).ok())
            .any(|root| canonical.starts_with(root));
        if !inside {
            return Err(ValidationError::PathOutsideAllowedRoots);
        }
        Ok(canonical)
    }

    /// [`validate_path`](Self::validate_path) plus a config-file extension check.
    ///
    /// # Errors
    ///
    /// Returns an error if the path fails `validate_path` or its extension
    /// is not one of [`CONFIG_EXTENSIONS`].
    pub fn validate_config_path(&self, path: &str) -> Result<PathBuf, ValidationError> {
        let canonical = self.validate_path(path)?;
        let ext_ok = canonical
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CONFIG_EXTENSIONS.contains(&e));
        if !ext_ok {
            return Err(ValidationError::ExtensionNotAllowed {
                allowed: CONFIG_EXTENSIONS.join(", "),
            });
        }
        Ok(canonical)
    }
}

// ── Pure validators ───────────────────────────────────────────────────────────

/// # Errors
///
/// Returns an error unless `action` is one of [`SYSTEMCTL_ACTIONS`].
pub fn validate_systemctl_action(action: &str) -> Result<(), ValidationError> {
    if SYSTEMCTL_ACTIONS.contains(&action) {
        Ok(())
    } else {
        Err(ValidationError::SystemctlActionNotAllowed {
            allowed: SYSTEMCTL_ACTIONS.join(", "),
        })
    }
}

/// # Errors
///
/// Returns an error if `name` is empty, contains characters outside
/// `[a-zA-Z0-9_-]`, or is longer than [`MAX_SERVICE_NAME_LEN`].
pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyServiceName);
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(ValidationError::InvalidServiceName);
    }
    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(ValidationError::ServiceNameTooLong {
            len: name.len(),
            max: MAX_SERVICE_NAME_LEN,
        });
    }
    Ok(())
}

/// Strip ASCII control bytes, cap at [`MAX_INPUT_BYTES`] (on a char
/// boundary) and trim surrounding whitespace. Total and idempotent.
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    let mut cleaned: String = input.chars().filter(|c| !c.is_ascii_control()).collect();
    if cleaned.len() > MAX_INPUT_BYTES {
        let mut end = MAX_INPUT_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    cleaned.trim().to_string()
}

/// Walk a parameter map: keys must be identifiers, string values at most
/// [`MAX_PARAM_VALUE_BYTES`], nested maps are checked recursively. Other
/// value types are not inspected.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_task_params(params: &Params) -> Result<(), ValidationError> {
    for (key, value) in params {
        if !IDENTIFIER_RE.is_match(key) {
            return Err(ValidationError::InvalidParamKey);
        }
        match value {
            serde_json::Value::String(s) if s.len() > MAX_PARAM_VALUE_BYTES => {
                return Err(ValidationError::ParamValueTooLong {
                    key: key.clone(),
                    len: s.len(),
                    max: MAX_PARAM_VALUE_BYTES,
                });
            }
            serde_json::Value::Object(nested) => validate_task_params(nested)?,
            _ => {}
        }
    }
    Ok(())
}

/// Require `value` to be one of `allowed`.
///
/// # Errors
///
/// Returns [`ValidationError::NotOneOf`] naming `field`.
pub fn require_one_of(
    field: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::NotOneOf {
            field,
            allowed: allowed.join(", "),
        })
    }
}

// ── Path resolution ───────────────────────────────────────────────────────────

/// Resolve `path` to an absolute path free of `.`/`..` and symlinks.
///
/// Existing prefixes are canonicalized component by component, so a `..`
/// after a symlink pops the symlink *target*, as the kernel would. Missing
/// trailing components are appended lexically.
fn resolve_path(path: &Path) -> Result<PathBuf, ValidationError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ValidationError::UnresolvablePath(e.kind().to_string()))?
            .join(path)
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                match std::fs::canonicalize(&resolved) {
                    Ok(real) => resolved = real,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        if std::fs::symlink_metadata(&resolved).is_ok() {
                            return Err(ValidationError::DanglingSymlink);
                        }
                    }
                    Err(e) => return Err(ValidationError::UnresolvablePath(e.kind().to_string())),
                }
            }
        }
    }
    Ok(resolved)
}

// ── Unit tests ────────────────────────────────────────────────────────────────
