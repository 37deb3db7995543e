//! Application layer: port trait definitions, task dispatch and the worker
//! lifecycle.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`.

pub mod dispatcher;
pub mod handlers;
pub mod lifecycle;
pub mod monitor;
pub mod ports;

pub use dispatcher::Dispatcher;
pub use lifecycle::{Agent, WorkerIntervals};
pub use ports::{CommandRunner, NetworkProbe, Transport};
