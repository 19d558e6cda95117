//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SelectorConfig (validated, immutable)
//!     → load_balancer::builder_from_config → global selector
//! ```
//!
//! # Design Decisions
//! - All fields have defaults; an empty file yields the P2C/EWMA setup
//! - Validation separates syntactic (serde) from semantic checks
//! - Config is read once at startup; selectors are not reconfigured live

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancerKind, DirectConfig, EwmaConfig, NodeConfig, ObservabilityConfig, P2cConfig,
    SelectorConfig,
};
pub use validation::{validate_config, ValidationError};
