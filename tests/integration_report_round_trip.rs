use ntttcp_report::{
    config::{ReportConfig, RunRecord, TestParameters},
    metrics::{FixedCpuSpeed, MetricsAggregator},
    report::{render_console, LineLevel, SEPARATOR},
    results::{
        CounterSnapshot, CpuStateTimes, EndpointInfo, EndpointRole, PerThreadResult,
        ProcessCpuUsage, Protocol, TestEndpoint, TestEndpointResult,
    },
    system::HostInfo,
    utils::CLOCKS_PER_SEC,
    xml::{render_xml, write_xml_report},
    ReportError,
};

const MIB: u64 = 1 << 20;

fn host() -> HostInfo {
    HostInfo {
        computer_name: "bench-host".to_string(),
        os_description: Some("Linux bench-host 6.1.0 #1 SMP x86_64 GNU/Linux\n".to_string()),
    }
}

fn snapshots() -> (CounterSnapshot, CounterSnapshot) {
    let mut init = CounterSnapshot::default();
    let mut fin = CounterSnapshot::default();

    init.tcp_retrans.retrans_segs = 10;
    fin.tcp_retrans.retrans_segs = 30;
    init.tx_packets = 1_000;
    fin.tx_packets = 11_000;
    init.rx_packets = 500;
    fin.rx_packets = 5_500;
    init.interrupts = 100;
    fin.interrupts = 5_100;

    init.cpu_ps = CpuStateTimes {
        user_time: 0,
        system_time: 0,
        idle_time: 0,
        iowait_time: 0,
        softirq_time: 0,
        total_time: 0,
        nproc: 2,
    };
    fin.cpu_ps = CpuStateTimes {
        user_time: 200,
        system_time: 100,
        idle_time: 600,
        iowait_time: 50,
        softirq_time: 50,
        total_time: 1_000,
        nproc: 2,
    };

    init.cpu_usage = ProcessCpuUsage { clock: 0, time: 0.0 };
    fin.cpu_usage = ProcessCpuUsage {
        clock: 2 * CLOCKS_PER_SEC,
        time: 10_000_000.0,
    };

    (init, fin)
}

fn endpoint(role: EndpointRole) -> TestEndpoint {
    let (init, fin) = snapshots();
    TestEndpoint::new(
        EndpointInfo::new(role, Protocol::Tcp),
        TestEndpointResult {
            total_bytes: 150 * MIB,
            actual_test_time: 10.0,
            init,
            final_: fin,
            threads: vec![
                PerThreadResult::new(100 * MIB, 10.0).with_rtt(150).with_connections(1),
                PerThreadResult::sync_thread(),
                PerThreadResult::new(50 * MIB, 5.0).with_rtt(250).with_connections(1),
            ],
        },
    )
}

fn aggregator() -> MetricsAggregator {
    MetricsAggregator::new(Box::new(FixedCpuSpeed(2500.0)))
}

const PARAMETERS_BLOCK: &str = "\t<parameters>
\t\t<send_socket_buff>131072</send_socket_buff>
\t\t<recv_socket_buff>65536</recv_socket_buff>
\t\t<port>5001</port>
\t\t<sync_port>False</sync_port>
\t\t<no_sync>False</no_sync>
\t\t<wait_timeout_milliseconds>0</wait_timeout_milliseconds>
\t\t<async>False</async>
\t\t<verbose>False</verbose>
\t\t<wsa>False</wsa>
\t\t<use_ipv6>False</use_ipv6>
\t\t<udp>False</udp>
\t\t<verify_data>False</verify_data>
\t\t<wait_all>False</wait_all>
\t\t<run_time>60</run_time>
\t\t<warmup_time>0</warmup_time>
\t\t<cooldown_time>0</cooldown_time>
\t\t<dash_n_timeout>0</dash_n_timeout>
\t\t<bind_sender>False</bind_sender>
\t\t<sender_name>NA</sender_name>
\t\t<max_active_threads>0</max_active_threads>
\t\t<tp>False</tp>
\t\t<no_stdio_buffer>False</no_stdio_buffer>
\t\t<throughput_Bpms>0</throughput_Bpms>
\t\t<cpu_burn>0</cpu_burn>
\t\t<latency_measurement>False</latency_measurement>
\t\t<use_io_compl_ports>NA</use_io_compl_ports>
\t\t<cpu_from_idle_flag>False</cpu_from_idle_flag>
\t\t<get_estats>False</get_estats>
\t\t<qos_flag>False</qos_flag>
\t\t<jitter_measurement>False</jitter_measurement>
\t\t<packet_spacing>0</packet_spacing>
\t</parameters>
";

const THREADS_AND_TOTALS: &str = "\t<thread index=\"0\">
\t\t<realtime metric=\"s\">10.000</realtime>
\t\t<throughput metric=\"KB/s\">10240.000</throughput>
\t\t<throughput metric=\"MB/s\">10.000</throughput>
\t\t<throughput metric=\"mbps\">80.000</throughput>
\t\t<avg_bytes_per_compl metric=\"B\">0.000</avg_bytes_per_compl>
\t</thread>
\t<thread index=\"2\">
\t\t<realtime metric=\"s\">5.000</realtime>
\t\t<throughput metric=\"KB/s\">10240.000</throughput>
\t\t<throughput metric=\"MB/s\">10.000</throughput>
\t\t<throughput metric=\"mbps\">80.000</throughput>
\t\t<avg_bytes_per_compl metric=\"B\">0.000</avg_bytes_per_compl>
\t</thread>
\t<total_bytes metric=\"MB\">150.000000</total_bytes>
\t<realtime metric=\"s\">10.000000</realtime>
\t<avg_bytes_per_compl metric=\"B\">0.000</avg_bytes_per_compl>
\t<threads_avg_bytes_per_compl metric=\"B\">0.000</threads_avg_bytes_per_compl>
\t<avg_frame_size metric=\"B\">0.000</avg_frame_size>
\t<throughput metric=\"MB/s\">15.000</throughput>
\t<throughput metric=\"mbps\">120.000</throughput>
\t<total_buffers>0.000</total_buffers>
\t<throughput metric=\"buffers/s\">0.000</throughput>
\t<avg_packets_per_interrupt metric=\"packets/interrupt\">3.000</avg_packets_per_interrupt>
\t<interrupts metric=\"count/sec\">0.000</interrupts>
\t<dpcs metric=\"count/sec\">0.000</dpcs>
\t<avg_packets_per_dpc metric=\"packets/dpc\">0.000</avg_packets_per_dpc>
\t<cycles metric=\"cycles/byte\">127.157</cycles>
\t<packets_sent>10000</packets_sent>
\t<packets_received>5000</packets_received>
\t<packets_retransmitted>20</packets_retransmitted>
\t<errors>0</errors>
\t<cpu metric=\"%\">20.000</cpu>
\t<bufferCount>0</bufferCount>
\t<bufferLen>0</bufferLen>
\t<io>0</io>
";

#[test]
fn sender_xml_matches_legacy_schema() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Sender)).unwrap();
    let xml = render_xml(&ReportConfig::default(), &results, &host()).unwrap();

    let expected = format!(
        "<ntttcps computername=\"bench-host\" version=\"5.33-linux\">\n{}{}\t<tcp_average_rtt metric=\"us\">200</tcp_average_rtt>\n\t<os>Linux bench-host 6.1.0 #1 SMP x86_64 GNU/Linux</os>\n</ntttcps>\n",
        PARAMETERS_BLOCK, THREADS_AND_TOTALS
    );
    assert_eq!(xml, expected);
}

#[test]
fn receiver_xml_has_no_rtt_and_unknown_os() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Receiver)).unwrap();
    let host = HostInfo {
        computer_name: "bench-host".to_string(),
        os_description: None,
    };
    let xml = render_xml(&ReportConfig::default(), &results, &host).unwrap();

    let expected = format!(
        "<ntttcpr computername=\"bench-host\" version=\"5.33-linux\">\n{}{}\t<os>Unknown</os>\n</ntttcpr>\n",
        PARAMETERS_BLOCK, THREADS_AND_TOTALS
    );
    assert_eq!(xml, expected);
}

#[test]
fn xml_escapes_os_description() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Receiver)).unwrap();
    let host = HostInfo {
        computer_name: "bench-host".to_string(),
        os_description: Some("Linux <test> \"build\" & co\n".to_string()),
    };
    let xml = render_xml(&ReportConfig::default(), &results, &host).unwrap();

    assert!(xml.contains("\t<os>Linux &lt;test&gt; &quot;build&quot; &amp; co</os>\n"));
}

#[test]
fn xml_parameters_follow_configuration() {
    let mut ep = endpoint(EndpointRole::Sender);
    ep.info.protocol = Protocol::Udp;
    ep.info.domain = ntttcp_report::results::AddressFamily::Ipv6;
    let results = aggregator().aggregate(&ep).unwrap();

    let config = ReportConfig {
        verbose: true,
        parameters: TestParameters {
            send_buf_size: 1 << 20,
            server_base_port: 6001,
            duration: 30,
            ..Default::default()
        },
        ..Default::default()
    };
    let xml = render_xml(&config, &results, &host()).unwrap();

    assert!(xml.contains("\t\t<send_socket_buff>1048576</send_socket_buff>\n"));
    assert!(xml.contains("\t\t<port>6001</port>\n"));
    assert!(xml.contains("\t\t<verbose>True</verbose>\n"));
    assert!(xml.contains("\t\t<use_ipv6>True</use_ipv6>\n"));
    assert!(xml.contains("\t\t<udp>True</udp>\n"));
    assert!(xml.contains("\t\t<run_time>30</run_time>\n"));
    // UDP senders have no RTT
    assert!(!xml.contains("tcp_average_rtt"));
}

#[test]
fn xml_report_written_to_file() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Sender)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xml");

    write_xml_report(&path, &ReportConfig::default(), &results, &host()).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let rendered = render_xml(&ReportConfig::default(), &results, &host()).unwrap();
    assert_eq!(written, rendered);
}

#[test]
fn xml_report_unopenable_path_is_file_open_error() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Sender)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.xml");

    let err = write_xml_report(&path, &ReportConfig::default(), &results, &host()).unwrap_err();
    assert!(matches!(err, ReportError::FileOpen { .. }));
    assert!(!path.exists());
}

#[test]
fn sync_threads_never_reach_the_console() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Sender)).unwrap();
    let config = ReportConfig {
        verbose: true,
        ..Default::default()
    };
    let lines = render_console(&config, &results).unwrap();
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();

    assert_eq!(texts[2], "\t0\t 10.00\t 83.89Mbps");
    assert_eq!(texts[3], "\t2\t 5.00\t 83.89Mbps");
    assert_eq!(texts[4], "2 connections tested");
    assert!(texts.contains(&"\t cycles/byte\t:127.16"));
    assert!(texts.contains(&"cpu busy (all)\t:20.00%"));
    assert!(texts.contains(&"tcpi rtt\t\t:200 us"));
    assert_eq!(lines.last().map(|l| l.level), Some(LineLevel::Plain));
    assert_eq!(texts.last(), Some(&SEPARATOR));
}

#[test]
fn zero_duration_produces_no_output() {
    let mut ep = endpoint(EndpointRole::Sender);
    ep.results.actual_test_time = 0.0;

    assert!(matches!(
        aggregator().aggregate(&ep),
        Err(ReportError::ZeroDuration)
    ));
}

#[test]
fn run_record_end_to_end() {
    let json = r#"{
        "role": "receiver",
        "protocol": "tcp",
        "parameters": { "recv_buf_size": "1M", "server_ports": 4 },
        "total_bytes": 10485760,
        "actual_test_time": 2.0,
        "init": { "cpu_ps": { "nproc": 4 } },
        "final": { "cpu_ps": { "idle_time": 50, "total_time": 100, "nproc": 4 } },
        "threads": [
            { "total_bytes": 10485760, "actual_test_time": 2.0 },
            { "is_sync_thread": true }
        ]
    }"#;

    let (ep, parameters) = RunRecord::from_json(json).unwrap().into_endpoint().unwrap();
    let results = aggregator().aggregate(&ep).unwrap();
    let config = ReportConfig {
        parameters,
        ..Default::default()
    };

    let lines = render_console(&config, &results).unwrap();
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts[0], "#####  Totals:  #####");
    assert!(texts.contains(&"\t throughput\t:41.94Mbps"));
    assert!(texts.contains(&"cpu cores\t:4"));
    assert!(texts.contains(&"\t idle\t\t:50.00%"));

    let xml = render_xml(&config, &results, &host()).unwrap();
    assert!(xml.starts_with("<ntttcpr computername=\"bench-host\" version=\"5.33-linux\">\n"));
    assert!(xml.contains("\t\t<recv_socket_buff>1048576</recv_socket_buff>\n"));
    assert!(xml.contains("\t<thread index=\"0\">\n"));
    assert!(!xml.contains("\t<thread index=\"1\">\n"));
    assert!(xml.ends_with("</ntttcpr>\n"));
}

#[test]
fn unavailable_shell_reports_unknown_os() {
    let results = aggregator().aggregate(&endpoint(EndpointRole::Sender)).unwrap();
    let host = HostInfo::detect_with_shell("/nonexistent/bin/sh");
    let xml = render_xml(&ReportConfig::default(), &results, &host).unwrap();

    assert!(xml.contains("\t<os>Unknown</os>\n"));
}

#[test]
fn run_record_missing_final_nproc_keeps_recorded_count() {
    let json = r#"{
        "role": "receiver",
        "protocol": "tcp",
        "total_bytes": 1048576,
        "actual_test_time": 1.0,
        "init": { "cpu_ps": { "nproc": 1024 } },
        "final": { "cpu_ps": { "idle_time": 50, "total_time": 100 } },
        "threads": [ { "total_bytes": 1048576, "actual_test_time": 1.0 } ]
    }"#;

    let (ep, _) = RunRecord::from_json(json).unwrap().into_endpoint().unwrap();
    let results = MetricsAggregator::new(Box::new(FixedCpuSpeed(1.0)))
        .aggregate(&ep)
        .unwrap();

    assert_eq!(results.init_nproc, 1024);
    assert_eq!(results.final_nproc, 1024);
    // 1e6 * 1 * 1024 * 0.5 / 2^20
    assert!((results.cycles_per_byte - 488.28125).abs() < 1e-6);

    let lines = render_console(&ReportConfig::default(), &results).unwrap();
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert!(texts.contains(&"cpu cores\t:1024"));
    assert!(!texts.iter().any(|l| l.starts_with("number of CPUs")));
}
