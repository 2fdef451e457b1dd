//! # Console Report
//!
//! Renders the aggregated results as the plain-text summary printed at the
//! end of a run. Lines are built first and then emitted through `tracing`,
//! so the exact text can be tested without capturing stdout.

use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::results::AggregatedResults;
use crate::utils::{format_throughput, format_throughput_bits};
use tracing::{error, info};

/// Separator printed after the summary
pub const SEPARATOR: &str = "---------------------------------------------------------";

/// How a console line is emitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineLevel {
    Info,
    Error,
    /// Written straight to stdout, bypassing the logger
    Plain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleLine {
    pub level: LineLevel,
    pub text: String,
}

impl ConsoleLine {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: LineLevel::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: LineLevel::Error,
            text: text.into(),
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            level: LineLevel::Plain,
            text: text.into(),
        }
    }
}

/// Build the console summary lines
pub fn render_console(
    config: &ReportConfig,
    results: &AggregatedResults,
) -> Result<Vec<ConsoleLine>> {
    let test_duration = results.actual_test_time;
    if test_duration == 0.0 {
        return Err(ReportError::ZeroDuration);
    }

    let mut lines = Vec::new();

    if config.verbose {
        lines.push(ConsoleLine::info("\tThread\tTime(s)\tThroughput"));
        lines.push(ConsoleLine::info("\t======\t=======\t=========="));
        for t in &results.threads {
            let throughput = if t.actual_test_time == 0.0 {
                format_throughput_bits(0.0)
            } else {
                format_throughput(t.total_bytes, t.actual_test_time)
            };
            lines.push(ConsoleLine::info(format!(
                "\t{}\t {:.2}\t {}",
                t.index, t.actual_test_time, throughput
            )));
        }
    }

    // Only the side that opened the connections knows how many it made
    if results.endpoint.client_role {
        lines.push(ConsoleLine::info(format!(
            "{} connections tested",
            results.total_conns_created
        )));
    }

    lines.push(ConsoleLine::info("#####  Totals:  #####"));
    lines.push(ConsoleLine::info(format!("test duration\t:{:.2} seconds", test_duration)));
    lines.push(ConsoleLine::info(format!("total bytes\t:{}", results.total_bytes)));
    lines.push(ConsoleLine::info(format!(
        "\t throughput\t:{}",
        format_throughput(results.total_bytes, test_duration)
    )));

    if config.show_tcp_retransmit {
        let r = &results.retrans_per_sec;
        lines.push(ConsoleLine::info("tcp retransmit:"));
        for (name, rate) in [
            ("retrans_segments", r.retrans_segments),
            ("lost_retrans", r.lost_retransmit),
            ("syn_retrans", r.syn_retrans),
            ("fast_retrans", r.fast_retrans),
            ("forward_retrans", r.forward_retrans),
            ("slowStart_retrans", r.slow_start_retrans),
            ("retrans_fail", r.retrans_fail),
        ] {
            lines.push(ConsoleLine::info(format!("\t {}/sec\t:{:.2}", name, rate)));
        }
    }

    if config.shows_packets() {
        lines.push(ConsoleLine::info("total packets:"));
        lines.push(ConsoleLine::info(format!("\t tx_packets\t:{}", results.packets_sent)));
        lines.push(ConsoleLine::info(format!("\t rx_packets\t:{}", results.packets_received)));
    }
    if config.shows_interrupts() {
        lines.push(ConsoleLine::info("interrupts:"));
        lines.push(ConsoleLine::info(format!("\t total\t\t:{}", results.total_interrupts)));
    }
    if config.shows_packets() && config.shows_interrupts() {
        lines.push(ConsoleLine::info(format!(
            "\t pkts/interrupt\t:{:.2}",
            results.packets_per_interrupt
        )));
    }

    if results.final_nproc == results.init_nproc {
        lines.push(ConsoleLine::info(format!("cpu cores\t:{}", results.final_nproc)));
    } else {
        lines.push(ConsoleLine::error(format!(
            "number of CPUs does not match: initial: {}; final: {}",
            results.init_nproc, results.final_nproc
        )));
    }

    let cpu = &results.cpu;
    lines.push(ConsoleLine::info(format!("\t cpu speed\t:{:.3}MHz", results.cpu_speed_mhz)));
    lines.push(ConsoleLine::info(format!("\t user\t\t:{:.2}%", cpu.user * 100.0)));
    lines.push(ConsoleLine::info(format!("\t system\t\t:{:.2}%", cpu.system * 100.0)));
    lines.push(ConsoleLine::info(format!("\t idle\t\t:{:.2}%", cpu.idle * 100.0)));
    lines.push(ConsoleLine::info(format!("\t iowait\t\t:{:.2}%", cpu.iowait * 100.0)));
    lines.push(ConsoleLine::info(format!("\t softirq\t:{:.2}%", cpu.softirq * 100.0)));
    lines.push(ConsoleLine::info(format!("\t cycles/byte\t:{:.2}", results.cycles_per_byte)));
    lines.push(ConsoleLine::info(format!(
        "cpu busy (all)\t:{:.2}%",
        results.cpu_busy_percent * 100.0
    )));

    if config.verbose && results.endpoint.measures_rtt() {
        lines.push(ConsoleLine::info(format!(
            "tcpi rtt\t\t:{} us",
            results.average_rtt.unwrap_or(0)
        )));
    }

    lines.push(ConsoleLine::plain(SEPARATOR));
    Ok(lines)
}

/// Print the console summary
pub fn report_console(config: &ReportConfig, results: &AggregatedResults) -> Result<()> {
    let lines = render_console(config, results).map_err(|e| {
        error!("{}", e);
        e
    })?;

    for line in lines {
        match line.level {
            LineLevel::Info => info!("{}", line.text),
            LineLevel::Error => error!("{}", line.text),
            LineLevel::Plain => println!("{}", line.text),
        }
    }
    Ok(())
}
