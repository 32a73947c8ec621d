//! Configuration types and loading for the mutation relay.
//!
//! [`shared`] holds the serde types consumed by the `relay` crate, [`load_config`] builds them
//! from layered files and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
