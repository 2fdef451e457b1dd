//! # System Information
//!
//! OS queries used around the report: shell command capture for the `<os>`
//! element, host name, CPU clock speed from `/proc/cpuinfo`, and the
//! open-file limit check run before a test opens its connections.

use crate::config::TestParameters;
use crate::error::{ReportError, Result};
use crate::metrics::CpuSpeedSource;
use nix::sys::resource::{getrlimit, Resource};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, error, warn};

/// Run `command` through the shell and capture the first line it prints
///
/// The returned line keeps its trailing newline, if any. An empty string means
/// the command produced no output; callers treat that like a failure and fall
/// back to a placeholder.
pub fn run_system_command(command: &str) -> Result<String> {
    run_command_with("sh", command)
}

/// Like [`run_system_command`], through the given shell binary
pub fn run_command_with(shell: &str, command: &str) -> Result<String> {
    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| {
            error!("Error opening process to execute command: {}", command);
            ReportError::Spawn {
                command: command.to_string(),
                source,
            }
        })?;

    let mut line = String::new();
    if let Some(stdout) = child.stdout.take() {
        if let Err(e) = BufReader::new(stdout).read_line(&mut line) {
            debug!("reading output of `{}` failed: {}", command, e);
            line.clear();
        }
    }

    // stdout is closed at this point, so the child cannot block on a full pipe
    if let Err(e) = child.wait() {
        debug!("waiting for `{}` failed: {}", command, e);
    }

    Ok(line)
}

/// Host identification embedded in the XML report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
    pub computer_name: String,
    /// First line of `uname -a`, `None` when it could not be captured
    pub os_description: Option<String>,
}

impl HostInfo {
    pub fn detect() -> Self {
        Self::detect_with_shell("sh")
    }

    /// Detect host info, running `uname -a` through `shell`
    pub fn detect_with_shell(shell: &str) -> Self {
        let os_description = match run_command_with(shell, "uname -a") {
            Ok(line) if !line.is_empty() => Some(line),
            _ => None,
        };

        Self {
            computer_name: host_name(),
            os_description,
        }
    }
}

/// Local host name, empty when it cannot be read
pub fn host_name() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("failed to read host name: {}", e);
            String::new()
        }
    }
}

/// CPU speed read from a cpuinfo-formatted file
#[derive(Clone, Debug)]
pub struct ProcCpuInfo {
    path: PathBuf,
}

impl ProcCpuInfo {
    pub fn new() -> Self {
        Self::with_path("/proc/cpuinfo")
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcCpuInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSpeedSource for ProcCpuInfo {
    fn cpu_speed_mhz(&self) -> f64 {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => parse_cpu_mhz(&contents).unwrap_or_else(|| {
                debug!("no cpu MHz entry in {}", self.path.display());
                0.0
            }),
            Err(e) => {
                debug!("cannot read {}: {}", self.path.display(), e);
                0.0
            }
        }
    }
}

/// First `cpu MHz` value in cpuinfo text
fn parse_cpu_mhz(contents: &str) -> Option<f64> {
    contents
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "cpu MHz")
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Number of connections a test with these parameters opens on this side
///
/// A receiver cannot know how many threads the sender runs per port, so it
/// only counts one per port.
pub fn expected_connections(params: &TestParameters, client_role: bool) -> u64 {
    let ports = u64::from(params.server_ports);
    if client_role {
        ports
            .saturating_mul(u64::from(params.threads_per_server_port))
            .saturating_mul(u64::from(params.conns_per_thread))
    } else {
        ports
    }
}

/// Compare an expected connection count with an open-file soft limit
pub fn check_connection_limit(expected: u64, soft_limit: u64) -> Result<()> {
    if expected > soft_limit {
        return Err(ReportError::ResourceLimitExceeded {
            expected,
            soft_limit,
        });
    }
    Ok(())
}

/// Check the test's connection count against a given soft limit
///
/// Logs an error and returns false when the limit is too small.
pub fn check_limit_against(params: &TestParameters, client_role: bool, soft_limit: u64) -> bool {
    let expected = expected_connections(params, client_role);
    match check_connection_limit(expected, soft_limit) {
        Ok(()) => true,
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

/// Check the process open-file limit against the connections the test will open
///
/// Advisory only: the caller decides whether to abort the run.
pub fn check_resource_limit(params: &TestParameters, client_role: bool) -> bool {
    let (soft_limit, hard_limit) = match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok(limits) => limits,
        Err(e) => {
            error!("Failed to load resource limits: {}", e);
            return false;
        }
    };

    debug!(
        "user limits for maximum number of open files: soft: {}; hard: {}",
        soft_limit, hard_limit
    );

    check_limit_against(params, client_role, soft_limit as u64)
}
