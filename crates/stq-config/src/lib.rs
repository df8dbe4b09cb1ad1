//! # stq config
//!
//! TOML configuration for the stq queue engine: storage root, runner
//! backend and buffering, loop polling, registry policy and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
