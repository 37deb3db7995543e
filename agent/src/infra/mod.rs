//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, config
//! file loading, network probes and control-plane transports.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.

pub mod command_runner;
pub mod config;
pub mod network;
pub mod transport;
