//! Domain layer: pure types and validation, no async and no process I/O.

pub mod config;
pub mod error;
pub mod security;
pub mod task;

pub use error::{ConfigError, ExecError, LifecycleError, TaskError, ValidationError};
pub use security::{Invocation, SecurityPolicy};
pub use task::TaskKind;
