//! Guestdisk Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the inspection runtime
//! and the `guestdisk` CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{AugeasOptions, InspectConfig, LogLevel, DEFAULT_SEARCH_ROOTS};
pub use error::{InspectError, Result};

/// Guestdisk version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
