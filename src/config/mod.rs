//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → handed to the supervisor, which hands slices to subsystems
//! ```
//!
//! Runtime-mutable settings do not live here: they arrive as hot properties
//! through the fetcher.
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::DaemonConfig;
pub use schema::FetcherConfig;
pub use schema::HealthConfig;
pub use schema::IdentityConfig;
pub use schema::LifecycleConfig;
pub use schema::LoadConfig;
pub use schema::NodeRole;
pub use schema::ObservabilityConfig;
