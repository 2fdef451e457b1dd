//! # Report Configuration and Run Records
//!
//! [`ReportConfig`] is what the reporters need to know about the test
//! configuration: verbosity, which optional blocks to print, where the XML
//! report goes and the parameters echoed into it.
//!
//! [`RunRecord`] is the on-disk (JSON) form of a finished run as the test
//! engine hands it over: endpoint identity, test parameters, whole-run
//! counters and per-thread outcomes.
//!
//! ## Run Record Example
//!
//! ```json
//! {
//!   "role": "sender",
//!   "protocol": "tcp",
//!   "parameters": { "send_buf_size": "128K", "server_ports": 16 },
//!   "total_bytes": 1073741824,
//!   "actual_test_time": 10.0,
//!   "init": { "tx_packets": 10 },
//!   "final": { "tx_packets": 90010 },
//!   "threads": [
//!     { "total_bytes": 1073741824, "actual_test_time": 10.0, "average_rtt": 210 },
//!     { "is_sync_thread": true }
//!   ]
//! }
//! ```

use crate::cli::Args;
use crate::defaults;
use crate::error::{ReportError, Result};
use crate::results::{
    AddressFamily, CounterSnapshot, EndpointInfo, EndpointRole, PerThreadResult, Protocol,
    TestEndpoint, TestEndpointResult,
};
use crate::utils::{time_diff, unit_atod, TimeStamp};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Test parameters echoed into the XML `<parameters>` block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameters {
    #[serde(deserialize_with = "deserialize_size")]
    pub send_buf_size: u64,
    #[serde(deserialize_with = "deserialize_size")]
    pub recv_buf_size: u64,
    pub server_base_port: u16,
    pub server_ports: u32,
    pub threads_per_server_port: u32,
    pub conns_per_thread: u32,
    /// Configured run time in seconds
    pub duration: u32,
}

impl Default for TestParameters {
    fn default() -> Self {
        Self {
            send_buf_size: defaults::SEND_BUFFER_SIZE,
            recv_buf_size: defaults::RECV_BUFFER_SIZE,
            server_base_port: defaults::BASE_PORT,
            server_ports: defaults::SERVER_PORTS,
            threads_per_server_port: defaults::THREADS_PER_SERVER_PORT,
            conns_per_thread: defaults::CONNS_PER_THREAD,
            duration: defaults::RUN_TIME_SECS,
        }
    }
}

/// Buffer sizes may be given as plain integers or as "64K"-style strings
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Bytes(u64),
        Text(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Bytes(n) => Ok(n),
        SizeValue::Text(s) => unit_atod(&s)
            .map(|n| n as u64)
            .map_err(serde::de::Error::custom),
    }
}

/// RTT samples use `-1` or `u32::MAX` for "not measured"
fn deserialize_rtt<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None | Some(-1) => Ok(None),
        Some(n) if n == i64::from(defaults::RTT_NOT_MEASURED) => Ok(None),
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid average_rtt: {}", n))),
    }
}

/// Configuration consumed by the console and XML reporters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportConfig {
    pub verbose: bool,
    pub show_tcp_retransmit: bool,
    /// Interface whose packet counters were sampled, if any
    pub show_interface_packets: Option<String>,
    /// Device whose interrupts were sampled, if any
    pub show_dev_interrupts: Option<String>,
    pub xml_log_file: Option<PathBuf>,
    pub parameters: TestParameters,
}

impl ReportConfig {
    pub fn from_args(args: &Args, parameters: TestParameters) -> Self {
        Self {
            verbose: args.verbose,
            show_tcp_retransmit: args.show_tcp_retrans,
            show_interface_packets: args.show_nic_packets.clone(),
            show_dev_interrupts: args.show_dev_interrupts.clone(),
            xml_log_file: args.xml_output.clone(),
            parameters,
        }
    }

    pub fn shows_packets(&self) -> bool {
        self.show_interface_packets
            .as_deref()
            .map_or(false, |iface| !iface.is_empty())
    }

    pub fn shows_interrupts(&self) -> bool {
        self.show_dev_interrupts
            .as_deref()
            .map_or(false, |dev| !dev.is_empty())
    }
}

/// One worker thread as recorded by the test engine
///
/// The duration is either given directly or as a start/end pair. RTT uses
/// the engine's all-bits-set sentinel for "not measured".
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ThreadRecord {
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub actual_test_time: Option<f64>,
    #[serde(default)]
    pub start: Option<TimeStamp>,
    #[serde(default)]
    pub end: Option<TimeStamp>,
    #[serde(default)]
    pub is_sync_thread: bool,
    #[serde(default, deserialize_with = "deserialize_rtt")]
    pub average_rtt: Option<u32>,
    #[serde(default)]
    pub num_conns_created: u32,
}

impl ThreadRecord {
    fn into_result(self, index: usize) -> Result<PerThreadResult> {
        let actual_test_time = match (self.actual_test_time, self.start, self.end) {
            (Some(t), _, _) => t,
            (None, Some(start), Some(end)) => time_diff(&end, &start),
            // Sync threads carry no throughput data, so they need no duration
            (None, _, _) if self.is_sync_thread => 0.0,
            _ => {
                return Err(ReportError::InvalidInput(format!(
                    "thread {} has neither actual_test_time nor start/end",
                    index
                )))
            }
        };

        Ok(PerThreadResult {
            total_bytes: self.total_bytes,
            actual_test_time,
            is_sync_thread: self.is_sync_thread,
            average_rtt: self.average_rtt,
            num_conns_created: self.num_conns_created,
        })
    }
}

/// A finished run as recorded on disk
#[derive(Clone, Debug, Deserialize)]
pub struct RunRecord {
    pub role: EndpointRole,
    pub protocol: Protocol,
    #[serde(default)]
    pub domain: AddressFamily,
    #[serde(default)]
    pub client_role: Option<bool>,
    #[serde(default)]
    pub parameters: TestParameters,
    pub total_bytes: u64,
    pub actual_test_time: f64,
    #[serde(default)]
    pub init: CounterSnapshot,
    #[serde(default, rename = "final")]
    pub final_: CounterSnapshot,
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

impl RunRecord {
    /// Parse a run record from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReportError::InvalidInput(format!("malformed run record: {}", e)))
    }

    /// Read and parse a run record file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        debug!("Loaded run record from {:?}", path.as_ref());
        Self::from_json(&json)
    }

    /// Split into the endpoint handed to aggregation and the echoed parameters
    pub fn into_endpoint(self) -> Result<(TestEndpoint, TestParameters)> {
        let info = EndpointInfo {
            role: self.role,
            protocol: self.protocol,
            domain: self.domain,
            client_role: self
                .client_role
                .unwrap_or(self.role == EndpointRole::Sender),
        };

        let threads = self
            .threads
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_result(i))
            .collect::<Result<Vec<_>>>()?;

        let mut init = self.init;
        let mut final_ = self.final_;
        fill_missing_nproc(&mut init.cpu_ps.nproc, &mut final_.cpu_ps.nproc);

        let results = TestEndpointResult {
            total_bytes: self.total_bytes,
            actual_test_time: self.actual_test_time,
            init,
            final_,
            threads,
        };

        Ok((TestEndpoint::new(info, results), self.parameters))
    }
}

/// Resolve processor counts the record left out (0)
///
/// A count missing from one snapshot is taken from the other. Only when both
/// are missing does the local host's count stand in.
fn fill_missing_nproc(init: &mut u32, fin: &mut u32) {
    match (*init, *fin) {
        (0, 0) => {
            let local = num_cpus::get() as u32;
            warn!("run record has no processor count; using this host's {}", local);
            *init = local;
            *fin = local;
        }
        (0, n) => {
            warn!("initial processor count missing; using final count {}", n);
            *init = n;
        }
        (n, 0) => {
            warn!("final processor count missing; using initial count {}", n);
            *fin = n;
        }
        _ => {}
    }
}
