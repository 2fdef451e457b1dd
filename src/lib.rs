//! # NTTTCP Report Library
//!
//! Result aggregation and report serialization for a multi-threaded network
//! throughput test. Once every send/receive worker has joined, the raw
//! counters of the run are turned into derived metrics and rendered as a
//! console summary and an XML report compatible with the legacy
//! cross-platform schema.
//!
//! ## Architecture Overview
//!
//! - `results`: raw counter snapshots, per-thread outcomes and derived metrics
//! - `metrics`: the aggregation pass from raw counters to derived metrics
//! - `report`: console summary
//! - `xml`: XML escaping and the fixed-schema XML report
//! - `system`: shell command capture, host name, CPU speed, open-file limits
//! - `config`: report configuration and on-disk run records
//! - `cli`: command-line interface of the `ntttcp-report` binary
//! - `utils`: throughput formatting and unit parsing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ntttcp_report::{
//!     config::{ReportConfig, RunRecord},
//!     metrics::MetricsAggregator,
//!     report::report_console,
//!     system::ProcCpuInfo,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let (endpoint, parameters) = RunRecord::load("run.json")?.into_endpoint()?;
//!     let aggregator = MetricsAggregator::new(Box::new(ProcCpuInfo::new()));
//!     let results = aggregator.aggregate(&endpoint)?;
//!
//!     let config = ReportConfig {
//!         parameters,
//!         ..Default::default()
//!     };
//!     report_console(&config, &results)?;
//!     Ok(())
//! }
//! ```

/// Command-line interface of the report binary
pub mod cli;

/// Report configuration and run record loading
///
/// Converts the on-disk record of a finished run into the endpoint handed to
/// aggregation and carries the options that shape the reports.
pub mod config;

pub mod error;

pub mod logging;

/// Aggregation of raw counters into derived metrics
///
/// A single pass over an immutable endpoint that yields a fresh
/// `AggregatedResults`, refusing to run on a zero-length test.
pub mod metrics;

/// Console summary rendering
pub mod report;

/// Raw counters and derived metrics
pub mod results;

/// OS queries: command capture, host name, CPU speed, resource limits
pub mod system;

pub mod utils;

/// Fixed-schema XML report
pub mod xml;

pub use error::{ReportError, Result};
pub use metrics::{CpuSpeedSource, MetricsAggregator};
pub use results::{AggregatedResults, CounterSnapshot, PerThreadResult, TestEndpoint};

/// The current version of the report tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Parameter defaults match the test engine's own defaults so that records
/// without a `parameters` block still echo sensible values in the XML report.
pub mod defaults {
    /// Schema version written into the XML root element
    pub const XML_SCHEMA_VERSION: &str = "5.33-linux";

    /// `<os>` content when the OS description cannot be captured
    pub const UNKNOWN_OS: &str = "Unknown";

    /// RTT value the test engine records for "not measured"
    pub const RTT_NOT_MEASURED: u32 = u32::MAX;

    pub const SEND_BUFFER_SIZE: u64 = 128 * 1024;
    pub const RECV_BUFFER_SIZE: u64 = 64 * 1024;
    pub const BASE_PORT: u16 = 5001;
    pub const SERVER_PORTS: u32 = 16;
    pub const THREADS_PER_SERVER_PORT: u32 = 4;
    pub const CONNS_PER_THREAD: u32 = 1;
    pub const RUN_TIME_SECS: u32 = 60;
}
