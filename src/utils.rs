//! # Utility Functions
//!
//! Formatting and parsing helpers shared by the aggregator, the reporters
//! and the run record loader.
//!
//! ## Usage Examples
//!
//! ```rust
//! use ntttcp_report::utils::*;
//!
//! assert_eq!(format_throughput(1_500, 1.0), "12.00Kbps");
//! assert_eq!(unit_atod("64K").unwrap(), 65536.0);
//! ```

use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};

pub const KIBI: u64 = 1 << 10;
pub const MEBI: u64 = 1 << 20;
pub const GIBI: u64 = 1 << 30;
pub const BYTE_TO_BITS: f64 = 8.0;

/// Ticks per second of the process CPU clock, fixed by XSI
pub const CLOCKS_PER_SEC: u64 = 1_000_000;

const UNIT_BPS: [&str; 4] = ["bps", "Kbps", "Mbps", "Gbps"];

/// Format a byte count over a duration as a bit rate
///
/// Scales by 1000 while the value exceeds 1000, stopping at Gbps, and prints
/// two decimals followed by the unit.
///
/// The caller must not pass a zero duration; aggregation refuses to run on
/// one, so reporters never reach this with it.
///
/// ## Examples
///
/// ```rust
/// # use ntttcp_report::utils::format_throughput_bits;
/// assert_eq!(format_throughput_bits(999.0), "999.00bps");
/// assert_eq!(format_throughput_bits(1_500.0), "1.50Kbps");
/// assert_eq!(format_throughput_bits(1_500_000_000.0), "1.50Gbps");
/// ```
pub fn format_throughput(bytes_transferred: u64, test_duration: f64) -> String {
    format_throughput_bits(bytes_transferred as f64 * BYTE_TO_BITS / test_duration)
}

/// Format an already computed bits-per-second value
pub fn format_throughput_bits(bits_per_second: f64) -> String {
    let mut value = bits_per_second;
    let mut unit_idx = 0;

    while value > 1000.0 && unit_idx < UNIT_BPS.len() - 1 {
        value /= 1000.0;
        unit_idx += 1;
    }

    format!("{:.2}{}", value, UNIT_BPS[unit_idx])
}

/// Parse a number with an optional binary unit suffix
///
/// `k`/`K` multiplies by 2^10, `m`/`M` by 2^20 and `g`/`G` by 2^30. Any other
/// trailing character is ignored, like the legacy command line did.
///
/// ## Examples
///
/// ```rust
/// # use ntttcp_report::utils::unit_atod;
/// assert_eq!(unit_atod("128k").unwrap(), 131072.0);
/// assert_eq!(unit_atod("1.5M").unwrap(), 1572864.0);
/// assert_eq!(unit_atod("42").unwrap(), 42.0);
/// ```
pub fn unit_atod(s: &str) -> Result<f64> {
    let s = s.trim();
    let split = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let (num_str, rest) = s.split_at(split);
    let n: f64 = num_str
        .parse()
        .map_err(|_| ReportError::InvalidInput(format!("invalid size value: {:?}", s)))?;

    let multiplier = match rest.chars().next() {
        Some('g') | Some('G') => GIBI,
        Some('m') | Some('M') => MEBI,
        Some('k') | Some('K') => KIBI,
        _ => 1,
    };

    Ok(n * multiplier as f64)
}

/// A wall-clock instant split into seconds and microseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStamp {
    pub sec: i64,
    pub usec: i64,
}

impl TimeStamp {
    pub fn new(sec: i64, usec: i64) -> Self {
        Self { sec, usec }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.usec as f64 / 1_000_000.0
    }
}

/// Absolute difference between two instants, in seconds
pub fn time_diff(t1: &TimeStamp, t2: &TimeStamp) -> f64 {
    (t1.as_secs_f64() - t2.as_secs_f64()).abs()
}
