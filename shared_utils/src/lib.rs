//! Shared utilities for the seed server components.
//!
//! This crate provides the pieces used by the configuration generator and its
//! tooling: address ranges and HA address assignment, configuration loading,
//! and logging setup.

pub mod config;
pub mod logging;
pub mod network;

// Re-export commonly used items for convenience
pub use config::{Config, ConfigError};
pub use network::{AllocationError, IpFamilies, IpNet};
