//! # Herald Config
//!
//! Broker connection settings and layered configuration loading.
//! Settings can be built in code or loaded from TOML files and
//! `HERALD__`-prefixed environment variables.

mod loader;
mod settings;

pub use loader::*;
pub use settings::*;
