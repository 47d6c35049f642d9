//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (command-line flags overlay the file)
//!     → validation.rs (semantic checks, upstream URL parsing)
//!     → ValidatedConfig (immutable)
//!     → passed by value to the transport builder and HTTP server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::{ProxyConfig, TransportConfig};
pub use validation::{UpstreamTarget, ValidatedConfig, ValidationError};
