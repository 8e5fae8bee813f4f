//! Codemap Core Components
//!
//! This crate provides the core functionality for the codemap daemon,
//! including global configuration, the project registry, and the
//! multi-project monitor.

mod config;
mod error;
mod monitor;
pub mod pidfile;
mod registry;

pub use config::{GlobalConfig, CONFIG_DIR_ENV};
pub use error::CoreError;
pub use monitor::{regenerate_once, Monitor, MonitorOptions, SyncReport};
pub use registry::ProjectRegistry;
