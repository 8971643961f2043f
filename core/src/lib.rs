//! mlist Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the registry engine and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{ListKind, PushOptions, RegistryConfig};
pub use error::{ListError, Result};

/// mlist version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
