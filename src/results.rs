//! # Test Result Data Model
//!
//! Raw counters handed over by the test engine once every worker thread has
//! joined, and the derived metrics computed from them.
//!
//! ## Lifecycle
//!
//! 1. The test engine fills a [`TestEndpoint`]: per-thread byte counts and
//!    durations plus an "init" and a "final" [`CounterSnapshot`] bracketing
//!    the measured window.
//! 2. [`crate::metrics::MetricsAggregator`] reads it once and produces an
//!    [`AggregatedResults`] value. The raw side is never mutated.
//! 3. The console and XML reporters read the aggregated value only.
//!
//! CPU usage fields are fractions in `[0, 1]`; they become percentages only
//! when printed.

use serde::{Deserialize, Serialize};

/// Which side of the benchmarked connection this process was
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    Sender,
    Receiver,
}

/// Transport protocol used by the test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Socket address family used by the test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointRole::Sender => write!(f, "sender"),
            EndpointRole::Receiver => write!(f, "receiver"),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Identity of a test endpoint, carried through to the reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub role: EndpointRole,
    pub protocol: Protocol,
    pub domain: AddressFamily,
    /// Whether this endpoint initiated the connections. Usually the sender.
    pub client_role: bool,
}

impl EndpointInfo {
    pub fn new(role: EndpointRole, protocol: Protocol) -> Self {
        Self {
            role,
            protocol,
            domain: AddressFamily::Ipv4,
            client_role: role == EndpointRole::Sender,
        }
    }

    /// RTT is only sampled on the sending side of a TCP test
    pub fn measures_rtt(&self) -> bool {
        self.role == EndpointRole::Sender && self.protocol == Protocol::Tcp
    }
}

/// TCP retransmission counters from the kernel's SNMP statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpRetransCounters {
    pub retrans_segs: u64,
    pub tcp_lost_retransmit: u64,
    pub tcp_syn_retrans: u64,
    pub tcp_fast_retrans: u64,
    pub tcp_forward_retrans: u64,
    pub tcp_slow_start_retrans: u64,
    pub tcp_retrans_fail: u64,
}

/// Cumulative per-state CPU time across all processors, in clock ticks
///
/// An `nproc` of 0 means the processor count was not recorded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStateTimes {
    pub user_time: u64,
    pub system_time: u64,
    pub idle_time: u64,
    pub iowait_time: u64,
    pub softirq_time: u64,
    pub total_time: u64,
    pub nproc: u32,
}

/// Process CPU clock and wall time at one instant
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessCpuUsage {
    /// Processor time consumed by the process, in `CLOCKS_PER_SEC` ticks
    pub clock: u64,
    /// Wall-clock time in microseconds
    pub time: f64,
}

/// Point-in-time capture of system and process counters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterSnapshot {
    pub tcp_retrans: TcpRetransCounters,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub interrupts: u64,
    pub cpu_ps: CpuStateTimes,
    pub cpu_usage: ProcessCpuUsage,
}

/// Outcome of one worker thread
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerThreadResult {
    pub total_bytes: u64,
    /// Measured duration in seconds
    pub actual_test_time: f64,
    /// Control/handshake thread with no throughput data
    #[serde(default)]
    pub is_sync_thread: bool,
    /// Average TCP RTT in microseconds, `None` when not measured
    #[serde(default)]
    pub average_rtt: Option<u32>,
    #[serde(default)]
    pub num_conns_created: u32,
}

impl PerThreadResult {
    pub fn new(total_bytes: u64, actual_test_time: f64) -> Self {
        Self {
            total_bytes,
            actual_test_time,
            ..Default::default()
        }
    }

    /// A synchronization-only thread
    pub fn sync_thread() -> Self {
        Self {
            is_sync_thread: true,
            ..Default::default()
        }
    }

    pub fn with_rtt(mut self, average_rtt_us: u32) -> Self {
        self.average_rtt = Some(average_rtt_us);
        self
    }

    pub fn with_connections(mut self, num_conns_created: u32) -> Self {
        self.num_conns_created = num_conns_created;
        self
    }
}

/// Whole-run raw counters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEndpointResult {
    pub total_bytes: u64,
    /// Measured duration of the whole run in seconds
    pub actual_test_time: f64,
    pub init: CounterSnapshot,
    #[serde(rename = "final")]
    pub final_: CounterSnapshot,
    pub threads: Vec<PerThreadResult>,
}

/// A test endpoint with its raw results, as handed over by the test engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestEndpoint {
    pub info: EndpointInfo,
    pub results: TestEndpointResult,
}

impl TestEndpoint {
    pub fn new(info: EndpointInfo, results: TestEndpointResult) -> Self {
        Self { info, results }
    }

    pub fn total_threads(&self) -> usize {
        self.results.threads.len()
    }
}

/// Derived throughput of one non-synchronization thread
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadThroughput {
    /// Position of the thread in the endpoint's thread list
    pub index: usize,
    pub total_bytes: u64,
    pub actual_test_time: f64,
    pub kbytes_per_sec: f64,
    pub mbytes_per_sec: f64,
    pub mbits_per_sec: f64,
}

/// Per-second TCP retransmission rates over the measured window
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetransRates {
    pub retrans_segments: f64,
    pub lost_retransmit: f64,
    pub syn_retrans: f64,
    pub fast_retrans: f64,
    pub forward_retrans: f64,
    pub slow_start_retrans: f64,
    pub retrans_fail: f64,
}

/// Share of total CPU time spent in each state, as fractions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuBreakdown {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub softirq: f64,
}

/// Every metric derived from one endpoint's raw counters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResults {
    pub endpoint: EndpointInfo,
    pub total_bytes: u64,
    pub actual_test_time: f64,
    pub threads: Vec<ThreadThroughput>,
    pub total_conns_created: u64,

    pub retrans_per_sec: RetransRates,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub total_interrupts: u64,
    pub packets_per_interrupt: f64,

    pub cpu: CpuBreakdown,
    pub init_nproc: u32,
    pub final_nproc: u32,
    pub cpu_speed_mhz: f64,

    pub total_bytes_mb: f64,
    pub throughput_mbytes_per_sec: f64,
    pub throughput_mbits_per_sec: f64,
    pub cycles_per_byte: f64,
    pub packets_retransmitted: u64,
    /// Process CPU time over wall time, as a fraction
    pub cpu_busy_percent: f64,
    pub errors: u32,

    /// Mean TCP RTT in microseconds across threads that measured one
    pub average_rtt: Option<u32>,
}
