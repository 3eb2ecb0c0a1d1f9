//! Configuration struct definitions.

use serde::Deserialize;
use tengen_mcts::{SearchConfig, TimeControl};

use crate::defaults;

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_main_time_cs() -> i32 {
    defaults::main_time_cs()
}
fn d_byo_time_cs() -> i32 {
    defaults::byo_time_cs()
}
fn d_byo_stones() -> i32 {
    defaults::byo_stones()
}
fn d_byo_periods() -> i32 {
    defaults::byo_periods()
}

/// Settings shared by every component.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonConfig {
    /// Log filter level: trace, debug, info, warn, error.
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
        }
    }
}

/// Game clock settings, centiseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeConfig {
    #[serde(default = "d_main_time_cs")]
    pub main_time_cs: i32,
    #[serde(default = "d_byo_time_cs")]
    pub byo_time_cs: i32,
    #[serde(default = "d_byo_stones")]
    pub byo_stones: i32,
    #[serde(default = "d_byo_periods")]
    pub byo_periods: i32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            main_time_cs: d_main_time_cs(),
            byo_time_cs: d_byo_time_cs(),
            byo_stones: d_byo_stones(),
            byo_periods: d_byo_periods(),
        }
    }
}

impl TimeConfig {
    /// Materialize a fresh clock from these settings.
    pub fn time_control(&self) -> TimeControl {
        TimeControl::new(
            self.main_time_cs,
            self.byo_time_cs,
            self.byo_stones,
            self.byo_periods,
        )
    }
}

/// The whole configuration tree of a tengen host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    pub common: CommonConfig,
    pub search: SearchConfig,
    pub time: TimeConfig,
}
