//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable
//! overrides.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::CentralConfig;

/// Standard locations to search for tengen.toml.
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "tengen.toml",    // current directory
    "../tengen.toml", // parent directory (when running from a subdirectory)
];

/// Errors from the strict loading path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load the central configuration.
///
/// Searches in order: the path in `TENGEN_CONFIG`, then
/// [`CONFIG_SEARCH_PATHS`]. Falls back to built-in defaults, and always
/// applies environment variable overrides last.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("TENGEN_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("loading config from TENGEN_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "TENGEN_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("no tengen.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path, warning and falling back to
/// defaults when the file is unreadable or malformed.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match try_load_from_path(path) {
        Ok(config) => apply_env_overrides(config),
        Err(err) => {
            warn!("{err}, using defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Strict variant of [`load_from_path`]: surfaces read/parse errors instead
/// of swallowing them. No environment overrides are applied.
pub fn try_load_from_path(path: &Path) -> Result<CentralConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Macro to reduce env override boilerplate.
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (i32, usize, f32, bool, ...)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern `TENGEN_<SECTION>_<KEY>`.
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "TENGEN_COMMON_LOG_LEVEL");

    // Search
    env_override!(
        config,
        search.num_threads,
        "TENGEN_SEARCH_NUM_THREADS",
        parse
    );
    env_override!(
        config,
        search.max_playouts,
        "TENGEN_SEARCH_MAX_PLAYOUTS",
        parse
    );
    env_override!(config, search.max_visits, "TENGEN_SEARCH_MAX_VISITS", parse);
    env_override!(
        config,
        search.max_tree_size,
        "TENGEN_SEARCH_MAX_TREE_SIZE",
        parse
    );
    env_override!(config, search.puct, "TENGEN_SEARCH_PUCT", parse);
    env_override!(config, search.noise, "TENGEN_SEARCH_NOISE", parse);
    env_override!(config, search.dumbpass, "TENGEN_SEARCH_DUMBPASS", parse);
    env_override!(config, search.resignpct, "TENGEN_SEARCH_RESIGNPCT", parse);
    env_override!(config, search.quiet, "TENGEN_SEARCH_QUIET", parse);
    env_override!(
        config,
        search.lagbuffer_cs,
        "TENGEN_SEARCH_LAGBUFFER_CS",
        parse
    );
    env_override!(
        config,
        search.analyze_interval_cs,
        "TENGEN_SEARCH_ANALYZE_INTERVAL_CS",
        parse
    );

    // Time
    env_override!(config, time.main_time_cs, "TENGEN_TIME_MAIN_TIME_CS", parse);
    env_override!(config, time.byo_time_cs, "TENGEN_TIME_BYO_TIME_CS", parse);
    env_override!(config, time.byo_stones, "TENGEN_TIME_BYO_STONES", parse);
    env_override!(config, time.byo_periods, "TENGEN_TIME_BYO_PERIODS", parse);

    config
}
