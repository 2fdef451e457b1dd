//! # NTTTCP Report - Main Entry Point
//!
//! Loads the run record a finished throughput test left behind, derives the
//! metrics and prints the console summary, optionally writing the XML report.
//!
//! 1. **Initialize logging**: tagged, colorized console output plus an
//!    optional plain log file
//! 2. **Parse arguments** and load the run record
//! 3. **Check limits** (advisory) when asked
//! 4. **Aggregate** the raw counters
//! 5. **Report** to the console and, if requested, to the XML file

use anyhow::{Context, Result};
use clap::Parser;
use ntttcp_report::{
    cli::Args,
    config::{ReportConfig, RunRecord},
    logging::LevelTagFormatter,
    metrics::{CpuSpeedSource, FixedCpuSpeed, MetricsAggregator},
    report::report_console,
    system::{check_resource_limit, HostInfo, ProcCpuInfo},
    xml::write_xml_report,
};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose/--quiet
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));

    let (file_layer, _guard) = match args.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .context("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .event_format(LevelTagFormatter::plain())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(LevelTagFormatter::colored()))
        .with(file_layer)
        .init();

    debug!("Configuration: {:?}", args);

    let record = RunRecord::load(&args.input)
        .with_context(|| format!("failed to load run record {:?}", args.input))?;
    let (endpoint, parameters) = record
        .into_endpoint()
        .with_context(|| format!("invalid run record {:?}", args.input))?;

    info!(
        "{} {} endpoint with {} threads",
        endpoint.info.protocol,
        endpoint.info.role,
        endpoint.total_threads()
    );

    if args.check_limits && !check_resource_limit(&parameters, endpoint.info.client_role) {
        info!("continuing: the limit check is advisory for recorded runs");
    }

    let cpu_speed: Box<dyn CpuSpeedSource> = match args.cpu_speed_mhz {
        Some(mhz) => Box::new(FixedCpuSpeed(mhz)),
        None => Box::new(ProcCpuInfo::new()),
    };
    let aggregator = MetricsAggregator::new(cpu_speed);

    // Failures below are logged where they are detected
    let results = match aggregator.aggregate(&endpoint) {
        Ok(results) => results,
        Err(_) => return Ok(ExitCode::FAILURE),
    };

    let config = ReportConfig::from_args(&args, parameters);
    if report_console(&config, &results).is_err() {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(ref path) = config.xml_log_file {
        if write_xml_report(path, &config, &results, &HostInfo::detect()).is_err() {
            error!("Error writing log to xml file");
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}
