//! IntelX Core - Shared foundation for the IntelX search client.
//!
//! This crate carries the pieces every other crate in the workspace needs:
//! the integer code tables of the remote protocol and the client
//! configuration.
//!
//! # Modules
//!
//! - [`codes`] - Protocol code tables (`SearchStatus`, `MediaType`, ...)
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`error`] - Configuration errors using thiserror
//!
//! # Example
//!
//! ```rust
//! use intelx_core::{ClientConfig, MediaType};
//!
//! let config = ClientConfig::default();
//! assert_eq!(config.search.rate_limit_ms, 1000);
//! assert_eq!(MediaType::from(1).label(), "Paste");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod codes;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use codes::{
    ContentType, FileFormat, MediaType, PhonebookTarget, SearchStatus, SortOrder,
};
pub use config::{ApiConfig, ApiRoot, ClientConfig, SearchConfig, DEFAULT_RATE_LIMIT_MS};
pub use error::{ConfigError, ConfigResult};
