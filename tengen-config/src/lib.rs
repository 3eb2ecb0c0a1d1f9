//! Centralized configuration loading from tengen.toml.
//!
//! # Configuration priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`TENGEN_<SECTION>_<KEY>`)
//! 2. tengen.toml file
//! 3. Built-in defaults
//!
//! # Environment variable override pattern
//!
//! ```text
//! TENGEN_<SECTION>_<KEY>=value
//!
//! Examples:
//!     TENGEN_COMMON_LOG_LEVEL=debug
//!     TENGEN_SEARCH_NUM_THREADS=8
//!     TENGEN_SEARCH_MAX_PLAYOUTS=1600
//!     TENGEN_TIME_MAIN_TIME_CS=60000
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, try_load_from_path, ConfigError, CONFIG_SEARCH_PATHS};
pub use structs::*;
