//! Shared types, configuration, and target discovery for the TidaLuna installer.

pub mod config;
pub mod model;
pub mod resolver;
pub mod util;

pub use config::*;
pub use model::*;
pub use resolver::*;
