//! Built-in defaults, kept in one place so the struct definitions and the
//! documentation cannot drift apart.

pub fn log_level() -> &'static str {
    "info"
}

/// Absolute main time, centiseconds: 10 minutes.
pub fn main_time_cs() -> i32 {
    60_000
}

pub fn byo_time_cs() -> i32 {
    0
}

pub fn byo_stones() -> i32 {
    0
}

pub fn byo_periods() -> i32 {
    0
}
