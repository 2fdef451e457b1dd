//! # XML Report
//!
//! Writes the aggregated results in the fixed schema of the legacy
//! cross-platform report (`<ntttcps>` for senders, `<ntttcpr>` for
//! receivers). Downstream tooling parses this file, so element order,
//! indentation and number formatting are reproduced exactly, including the
//! constant placeholder values for fields this tool never measures.
//!
//! The document is first built as a flat list of [`XmlNode`]s and then
//! rendered, which keeps the schema readable as data and lets tests compare
//! whole documents.

use crate::config::ReportConfig;
use crate::defaults;
use crate::error::{ReportError, Result};
use crate::results::{AddressFamily, AggregatedResults, EndpointRole, Protocol};
use crate::system::HostInfo;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{error, info};

/// Escape text for use in XML character data
///
/// `<`, `>`, `&`, `'` and `"` become entities and newlines are dropped.
/// The second value is the number of characters copied through untouched,
/// which tells the caller whether anything plain survived; it is not the
/// length of the escaped text.
///
/// ## Examples
///
/// ```rust
/// # use ntttcp_report::xml::escape_xml;
/// assert_eq!(escape_xml("a<b"), ("a&lt;b".to_string(), 2));
/// assert_eq!(escape_xml("line\n"), ("line".to_string(), 4));
/// ```
pub fn escape_xml(input: &str) -> (String, usize) {
    let mut out = String::with_capacity(input.len());
    let mut untranslated = 0;

    for c in input.chars() {
        match c {
            '>' => out.push_str("&gt;"),
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '\n' => {}
            _ => {
                untranslated += 1;
                out.push(c);
            }
        }
    }

    (out, untranslated)
}

/// One line of the report document
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    Open {
        tag: String,
        attrs: Vec<(&'static str, String)>,
    },
    Close(String),
    Element {
        tag: &'static str,
        metric: Option<&'static str>,
        value: String,
    },
}

impl XmlNode {
    fn open(tag: impl Into<String>, attrs: Vec<(&'static str, String)>) -> Self {
        XmlNode::Open {
            tag: tag.into(),
            attrs,
        }
    }

    fn close(tag: impl Into<String>) -> Self {
        XmlNode::Close(tag.into())
    }

    fn element(tag: &'static str, value: impl ToString) -> Self {
        XmlNode::Element {
            tag,
            metric: None,
            value: value.to_string(),
        }
    }

    fn metric(tag: &'static str, metric: &'static str, value: impl ToString) -> Self {
        XmlNode::Element {
            tag,
            metric: Some(metric),
            value: value.to_string(),
        }
    }
}

fn fixed3(value: f64) -> String {
    format!("{:.3}", value)
}

fn fixed6(value: f64) -> String {
    format!("{:.6}", value)
}

fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn root_tag(role: EndpointRole) -> &'static str {
    match role {
        EndpointRole::Receiver => "ntttcpr",
        EndpointRole::Sender => "ntttcps",
    }
}

fn parameter_nodes(config: &ReportConfig, results: &AggregatedResults) -> Vec<XmlNode> {
    let p = &config.parameters;
    let endpoint = &results.endpoint;

    let parameters: [(&'static str, String); 31] = [
        ("send_socket_buff", p.send_buf_size.to_string()),
        ("recv_socket_buff", p.recv_buf_size.to_string()),
        ("port", p.server_base_port.to_string()),
        ("sync_port", flag(false).into()),
        ("no_sync", flag(false).into()),
        ("wait_timeout_milliseconds", "0".into()),
        ("async", flag(false).into()),
        ("verbose", flag(config.verbose).into()),
        ("wsa", flag(false).into()),
        ("use_ipv6", flag(endpoint.domain == AddressFamily::Ipv6).into()),
        ("udp", flag(endpoint.protocol == Protocol::Udp).into()),
        ("verify_data", flag(false).into()),
        ("wait_all", flag(false).into()),
        ("run_time", p.duration.to_string()),
        ("warmup_time", "0".into()),
        ("cooldown_time", "0".into()),
        ("dash_n_timeout", "0".into()),
        ("bind_sender", flag(false).into()),
        ("sender_name", "NA".into()),
        ("max_active_threads", "0".into()),
        ("tp", flag(false).into()),
        ("no_stdio_buffer", flag(false).into()),
        ("throughput_Bpms", "0".into()),
        ("cpu_burn", "0".into()),
        ("latency_measurement", flag(false).into()),
        ("use_io_compl_ports", "NA".into()),
        ("cpu_from_idle_flag", flag(false).into()),
        ("get_estats", flag(false).into()),
        ("qos_flag", flag(false).into()),
        ("jitter_measurement", flag(false).into()),
        ("packet_spacing", "0".into()),
    ];

    let mut nodes = Vec::with_capacity(parameters.len() + 2);
    nodes.push(XmlNode::open("parameters", vec![]));
    nodes.extend(
        parameters
            .into_iter()
            .map(|(tag, value)| XmlNode::element(tag, value)),
    );
    nodes.push(XmlNode::close("parameters"));
    nodes
}

fn thread_nodes(results: &AggregatedResults) -> Vec<XmlNode> {
    let mut nodes = Vec::with_capacity(results.threads.len() * 7);
    for t in &results.threads {
        nodes.push(XmlNode::open("thread", vec![("index", t.index.to_string())]));
        nodes.push(XmlNode::metric("realtime", "s", fixed3(t.actual_test_time)));
        nodes.push(XmlNode::metric("throughput", "KB/s", fixed3(t.kbytes_per_sec)));
        nodes.push(XmlNode::metric("throughput", "MB/s", fixed3(t.mbytes_per_sec)));
        nodes.push(XmlNode::metric("throughput", "mbps", fixed3(t.mbits_per_sec)));
        nodes.push(XmlNode::metric("avg_bytes_per_compl", "B", fixed3(0.0)));
        nodes.push(XmlNode::close("thread"));
    }
    nodes
}

fn total_nodes(results: &AggregatedResults) -> Vec<XmlNode> {
    let mut nodes = vec![
        XmlNode::metric("total_bytes", "MB", fixed6(results.total_bytes_mb)),
        XmlNode::metric("realtime", "s", fixed6(results.actual_test_time)),
        XmlNode::metric("avg_bytes_per_compl", "B", fixed3(0.0)),
        XmlNode::metric("threads_avg_bytes_per_compl", "B", fixed3(0.0)),
        XmlNode::metric("avg_frame_size", "B", fixed3(0.0)),
        XmlNode::metric("throughput", "MB/s", fixed3(results.throughput_mbytes_per_sec)),
        XmlNode::metric("throughput", "mbps", fixed3(results.throughput_mbits_per_sec)),
        XmlNode::element("total_buffers", fixed3(0.0)),
        XmlNode::metric("throughput", "buffers/s", fixed3(0.0)),
        XmlNode::metric(
            "avg_packets_per_interrupt",
            "packets/interrupt",
            fixed3(results.packets_per_interrupt),
        ),
        XmlNode::metric("interrupts", "count/sec", fixed3(0.0)),
        XmlNode::metric("dpcs", "count/sec", fixed3(0.0)),
        XmlNode::metric("avg_packets_per_dpc", "packets/dpc", fixed3(0.0)),
        XmlNode::metric("cycles", "cycles/byte", fixed3(results.cycles_per_byte)),
        XmlNode::element("packets_sent", results.packets_sent),
        XmlNode::element("packets_received", results.packets_received),
        XmlNode::element("packets_retransmitted", results.packets_retransmitted),
        XmlNode::element("errors", results.errors),
        XmlNode::metric("cpu", "%", fixed3(results.cpu_busy_percent * 100.0)),
        XmlNode::element("bufferCount", 0),
        XmlNode::element("bufferLen", 0),
        XmlNode::element("io", 0),
    ];

    if results.endpoint.measures_rtt() {
        nodes.push(XmlNode::metric(
            "tcp_average_rtt",
            "us",
            results.average_rtt.unwrap_or(0),
        ));
    }
    nodes
}

/// Build the report document as an ordered list of nodes
pub fn build_document(
    config: &ReportConfig,
    results: &AggregatedResults,
    host: &HostInfo,
) -> Vec<XmlNode> {
    let root = root_tag(results.endpoint.role);
    let (computer_name, _) = escape_xml(&host.computer_name);

    let os = match host.os_description.as_deref() {
        Some(line) if !line.is_empty() => escape_xml(line).0,
        _ => defaults::UNKNOWN_OS.to_string(),
    };

    let mut nodes = vec![XmlNode::open(
        root,
        vec![
            ("computername", computer_name),
            ("version", defaults::XML_SCHEMA_VERSION.to_string()),
        ],
    )];
    nodes.extend(parameter_nodes(config, results));
    nodes.extend(thread_nodes(results));
    nodes.extend(total_nodes(results));
    nodes.push(XmlNode::element("os", os));
    nodes.push(XmlNode::close(root));
    nodes
}

/// Render nodes one per line, tab-indented by nesting depth
pub fn render_nodes(nodes: &[XmlNode]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;

    for node in nodes {
        match node {
            XmlNode::Open { tag, attrs } => {
                out.push_str(&"\t".repeat(depth));
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, value));
                }
                out.push_str(">\n");
                depth += 1;
            }
            XmlNode::Close(tag) => {
                depth = depth.saturating_sub(1);
                out.push_str(&format!("{}</{}>\n", "\t".repeat(depth), tag));
            }
            XmlNode::Element { tag, metric, value } => {
                let indent = "\t".repeat(depth);
                match metric {
                    Some(m) => out.push_str(&format!(
                        "{}<{} metric=\"{}\">{}</{}>\n",
                        indent, tag, m, value, tag
                    )),
                    None => out.push_str(&format!("{}<{}>{}</{}>\n", indent, tag, value, tag)),
                }
            }
        }
    }
    out
}

/// Render the full report document
///
/// Fails with [`ReportError::ZeroDuration`] for results without a measured
/// duration.
pub fn render_xml(
    config: &ReportConfig,
    results: &AggregatedResults,
    host: &HostInfo,
) -> Result<String> {
    if results.actual_test_time == 0.0 {
        return Err(ReportError::ZeroDuration);
    }
    Ok(render_nodes(&build_document(config, results, host)))
}

/// Write the XML report to `path`
///
/// An unopenable destination is logged and returned as
/// [`ReportError::FileOpen`]; the aggregated results are unaffected.
pub fn write_xml_report<P: AsRef<Path>>(
    path: P,
    config: &ReportConfig,
    results: &AggregatedResults,
    host: &HostInfo,
) -> Result<()> {
    let path = path.as_ref();
    let document = render_xml(config, results, host)?;

    let file = File::create(path).map_err(|source| {
        error!("Error opening file to write log: {}", path.display());
        ReportError::FileOpen {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut writer = BufWriter::new(file);
    writer.write_all(document.as_bytes())?;
    writer.flush()?;

    info!("XML report written to: {:?}", path);
    Ok(())
}
