use clap::Parser;
use std::path::PathBuf;

/// NTTTCP Report - aggregate a finished throughput test and print its results
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Run record (JSON) written by the test engine
    #[clap(short = 'i', long, help_heading = "Core Options")]
    pub input: PathBuf,

    /// Also write the results as an XML report to this file
    #[clap(short = 'x', long, help_heading = "Core Options")]
    pub xml_output: Option<PathBuf>,

    /// Verbose output: per-thread table, RTT and debug logging
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[clap(short = 'q', long, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print TCP retransmission rates
    #[clap(long, default_value_t = false)]
    pub show_tcp_retrans: bool,

    /// Print packet totals for the named network interface
    #[clap(long, value_name = "IFACE")]
    pub show_nic_packets: Option<String>,

    /// Print interrupt totals for the named device
    #[clap(long, value_name = "DEV")]
    pub show_dev_interrupts: Option<String>,

    /// Warn when the open-file limit is too low for the recorded test parameters
    #[clap(long, default_value_t = false)]
    pub check_limits: bool,

    /// CPU speed in MHz to use instead of reading /proc/cpuinfo
    #[clap(long, value_name = "MHZ")]
    pub cpu_speed_mhz: Option<f64>,

    /// Also write log output to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Default log directive when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let args = Args::try_parse_from(["ntttcp-report", "-i", "run.json"]).unwrap();
        assert_eq!(args.input, PathBuf::from("run.json"));
        assert!(args.xml_output.is_none());
        assert!(!args.verbose);
        assert_eq!(args.log_level(), "info");
    }

    #[test]
    fn test_input_is_required() {
        assert!(Args::try_parse_from(["ntttcp-report"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["ntttcp-report", "-i", "r.json", "-v", "-q"]).is_err());
        let quiet = Args::try_parse_from(["ntttcp-report", "-i", "r.json", "-q"]).unwrap();
        assert_eq!(quiet.log_level(), "warn");
    }

    #[test]
    fn test_parse_report_options() {
        let args = Args::try_parse_from([
            "ntttcp-report",
            "-i",
            "run.json",
            "-x",
            "out.xml",
            "--show-dev-interrupts",
            "mlx4",
            "--cpu-speed-mhz",
            "2400.5",
            "--check-limits",
        ])
        .unwrap();

        assert_eq!(args.xml_output, Some(PathBuf::from("out.xml")));
        assert_eq!(args.show_dev_interrupts.as_deref(), Some("mlx4"));
        assert_eq!(args.cpu_speed_mhz, Some(2400.5));
        assert!(args.check_limits);
    }
}
