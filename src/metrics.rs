//! # Metrics Aggregation
//!
//! Turns the raw counters of a finished run into the derived metrics both
//! reporters print. Aggregation is a single pass over an immutable
//! [`TestEndpoint`]; the result is a fresh [`AggregatedResults`] value, so a
//! failed precondition can never leave half-written metrics behind.
//!
//! ## Formulas
//!
//! - Per thread: `KB/s = bytes / 1024 / time`, `MB/s = KB/s / 1024`,
//!   `mbps = MB/s * 8`. Byte counts are truncated to whole units before the
//!   division, matching the legacy report.
//! - Retransmission rates: `(final - init) / duration` per counter.
//! - CPU states: `(final - init) / (final.total - init.total)`.
//! - Cycles per byte:
//!   `cpu_mhz * 1e6 * duration * nproc * (1 - idle) / total_bytes`.
//! - CPU busy: process clock delta in microseconds over wall time delta.

use crate::error::{ReportError, Result};
use crate::results::{
    AggregatedResults, CpuBreakdown, CpuStateTimes, PerThreadResult, RetransRates,
    TestEndpoint, ThreadThroughput,
};
use crate::utils::{BYTE_TO_BITS, CLOCKS_PER_SEC, KIBI, MEBI};
use tracing::{debug, error, warn};

/// Source of the processor clock speed used for cycles-per-byte
pub trait CpuSpeedSource {
    /// CPU speed in MHz, 0.0 when unknown
    fn cpu_speed_mhz(&self) -> f64;
}

/// A CPU speed known up front, e.g. given on the command line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedCpuSpeed(pub f64);

impl CpuSpeedSource for FixedCpuSpeed {
    fn cpu_speed_mhz(&self) -> f64 {
        self.0
    }
}

/// Derives every reported metric from a finished test endpoint
pub struct MetricsAggregator {
    cpu_speed: Box<dyn CpuSpeedSource>,
}

impl MetricsAggregator {
    pub fn new(cpu_speed: Box<dyn CpuSpeedSource>) -> Self {
        Self { cpu_speed }
    }

    /// Compute all derived metrics for `endpoint`
    ///
    /// Fails with [`ReportError::ZeroDuration`] before looking at any other
    /// counter when the run has no measured duration.
    pub fn aggregate(&self, endpoint: &TestEndpoint) -> Result<AggregatedResults> {
        let raw = &endpoint.results;
        let test_duration = raw.actual_test_time;
        let total_bytes = raw.total_bytes;

        if test_duration == 0.0 {
            error!("test duration is zero; no metrics derived");
            return Err(ReportError::ZeroDuration);
        }

        let threads: Vec<ThreadThroughput> = raw
            .threads
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_sync_thread)
            .map(|(index, t)| thread_throughput(index, t))
            .collect();

        let total_conns_created: u64 = raw
            .threads
            .iter()
            .filter(|t| !t.is_sync_thread)
            .map(|t| u64::from(t.num_conns_created))
            .sum();

        let cpu_speed_mhz = self.cpu_speed.cpu_speed_mhz();
        debug!("cpu speed: {:.3}MHz", cpu_speed_mhz);

        let init = &raw.init;
        let fin = &raw.final_;

        let retrans_per_sec = {
            let (i, f) = (&init.tcp_retrans, &fin.tcp_retrans);
            let rate = |name, from, to| per_second(name, from, to, test_duration);
            RetransRates {
                retrans_segments: rate("retrans_segs", i.retrans_segs, f.retrans_segs),
                lost_retransmit: rate(
                    "tcp_lost_retransmit",
                    i.tcp_lost_retransmit,
                    f.tcp_lost_retransmit,
                ),
                syn_retrans: rate("tcp_syn_retrans", i.tcp_syn_retrans, f.tcp_syn_retrans),
                fast_retrans: rate("tcp_fast_retrans", i.tcp_fast_retrans, f.tcp_fast_retrans),
                forward_retrans: rate(
                    "tcp_forward_retrans",
                    i.tcp_forward_retrans,
                    f.tcp_forward_retrans,
                ),
                slow_start_retrans: rate(
                    "tcp_slow_start_retrans",
                    i.tcp_slow_start_retrans,
                    f.tcp_slow_start_retrans,
                ),
                retrans_fail: rate("tcp_retrans_fail", i.tcp_retrans_fail, f.tcp_retrans_fail),
            }
        };

        let packets_sent = fin.tx_packets.wrapping_sub(init.tx_packets);
        let packets_received = fin.rx_packets.wrapping_sub(init.rx_packets);
        let total_interrupts = fin.interrupts.wrapping_sub(init.interrupts);
        // No interrupts counted reads as zero packets per interrupt rather than "no data".
        let packets_per_interrupt = if total_interrupts == 0 {
            0.0
        } else {
            (packets_sent as f64 + packets_received as f64) / total_interrupts as f64
        };

        let cpu = cpu_breakdown(&init.cpu_ps, &fin.cpu_ps);

        let total_bytes_mb = (total_bytes / MEBI) as f64;
        let throughput_mbytes_per_sec = total_bytes_mb / test_duration;
        let throughput_mbits_per_sec = throughput_mbytes_per_sec * BYTE_TO_BITS;

        let cycles_per_byte = if total_bytes == 0 {
            0.0
        } else {
            let busy_cycles = cpu_speed_mhz
                * 1_000_000.0
                * test_duration
                * f64::from(fin.cpu_ps.nproc)
                * (1.0 - cpu.idle);
            busy_cycles / total_bytes as f64
        };

        let packets_retransmitted = fin
            .tcp_retrans
            .retrans_segs
            .wrapping_sub(init.tcp_retrans.retrans_segs);

        let cpu_busy_percent = {
            let clock_us = delta(init.cpu_usage.clock, fin.cpu_usage.clock) * 1_000_000.0
                / CLOCKS_PER_SEC as f64;
            let wall_us = fin.cpu_usage.time - init.cpu_usage.time;
            if wall_us == 0.0 {
                warn!("process wall time did not advance; cpu busy reported as 0");
                0.0
            } else {
                clock_us / wall_us
            }
        };

        let average_rtt = if endpoint.info.measures_rtt() {
            average_rtt(&raw.threads)
        } else {
            None
        };

        Ok(AggregatedResults {
            endpoint: endpoint.info,
            total_bytes,
            actual_test_time: test_duration,
            threads,
            total_conns_created,
            retrans_per_sec,
            packets_sent,
            packets_received,
            total_interrupts,
            packets_per_interrupt,
            cpu,
            init_nproc: init.cpu_ps.nproc,
            final_nproc: fin.cpu_ps.nproc,
            cpu_speed_mhz,
            total_bytes_mb,
            throughput_mbytes_per_sec,
            throughput_mbits_per_sec,
            cycles_per_byte,
            packets_retransmitted,
            cpu_busy_percent,
            errors: 0,
            average_rtt,
        })
    }
}

/// Throughput of a single worker thread
pub fn thread_throughput(index: usize, thread: &PerThreadResult) -> ThreadThroughput {
    let kbytes_per_sec = if thread.actual_test_time == 0.0 {
        debug!("thread {} has no measured duration", index);
        0.0
    } else {
        (thread.total_bytes / KIBI) as f64 / thread.actual_test_time
    };
    let mbytes_per_sec = kbytes_per_sec / KIBI as f64;

    ThreadThroughput {
        index,
        total_bytes: thread.total_bytes,
        actual_test_time: thread.actual_test_time,
        kbytes_per_sec,
        mbytes_per_sec,
        mbits_per_sec: mbytes_per_sec * BYTE_TO_BITS,
    }
}

/// Mean RTT over the threads that measured one
///
/// Synchronization threads and threads without a sample are skipped. The
/// mean is truncated to whole microseconds. Returns `None` when no thread
/// has a sample.
pub fn average_rtt(threads: &[PerThreadResult]) -> Option<u32> {
    let (total, count) = threads
        .iter()
        .filter(|t| !t.is_sync_thread)
        .filter_map(|t| t.average_rtt)
        .fold((0u64, 0u64), |(sum, n), rtt| (sum + u64::from(rtt), n + 1));

    if count == 0 {
        debug!("no thread reported an RTT sample");
        return None;
    }

    Some((total / count) as u32)
}

/// Signed difference of two cumulative counters
fn delta(init: u64, fin: u64) -> f64 {
    (i128::from(fin) - i128::from(init)) as f64
}

/// Rate of a cumulative counter over the test window
///
/// A counter that went backwards (reset, wraparound) is passed through as a
/// negative rate.
fn per_second(name: &str, init: u64, fin: u64, test_duration: f64) -> f64 {
    if fin < init {
        warn!(
            "counter {} decreased during the test ({} -> {}); rate will be negative",
            name, init, fin
        );
    }
    delta(init, fin) / test_duration
}

fn cpu_breakdown(init: &CpuStateTimes, fin: &CpuStateTimes) -> CpuBreakdown {
    let total_diff = delta(init.total_time, fin.total_time);
    if total_diff == 0.0 {
        warn!("total cpu time did not advance; cpu usage reported as 0");
        return CpuBreakdown::default();
    }

    CpuBreakdown {
        user: delta(init.user_time, fin.user_time) / total_diff,
        system: delta(init.system_time, fin.system_time) / total_diff,
        idle: delta(init.idle_time, fin.idle_time) / total_diff,
        iowait: delta(init.iowait_time, fin.iowait_time) / total_diff,
        softirq: delta(init.softirq_time, fin.softirq_time) / total_diff,
    }
}
