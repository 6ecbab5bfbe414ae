//! Configuration resolution for the `run` command.
//!
//! Values are merged in the order CLI arguments, `-S` overrides and file
//! values, then [`defaults::DefaultsConfig`].

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::build_config;
pub use models::AppConfig;
