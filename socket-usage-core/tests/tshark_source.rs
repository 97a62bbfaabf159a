#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use socket_usage_core::{CaptureConfig, EngineConfig, Error, FlowEngine, PacketSource, TcpFlags};

/// Field output in the dual-stack layout tshark is asked for, with an ICMP
/// quoted header and a non UTF-8 line mixed in.
const FIELDS: &str = "\
printf '1|10.0.0.5||50000|10.0.0.1||80|0|1|1|0|1|0\\n'
printf '2|10.0.0.9,10.0.0.1||80|10.0.0.5,10.0.0.2||50000|1|1|0|0|1|0\\n'
printf '\\377\\376|not text\\n'
printf '3|10.0.0.1||80|10.0.0.5||50000|100|1|0|1|0|0\\n'
printf '4|10.0.0.5||50000|10.0.0.1||80|1|101|0|0|1|0\\n'
printf '5||2001:db8::5|51000||2001:db8::1|443|1|1|0|0|1|0\\n'
";

// Writing a script while another test forks can leave it busy for exec
static SPAWN: Mutex<()> = Mutex::new(());

fn fake_tshark(dir: &Path, body: &str) -> PathBuf {
	let path = dir.join("tshark");
	std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	path
}

fn open(body: &str) -> (tempfile::TempDir, PacketSource) {
	let _guard = SPAWN.lock();
	let dir = tempfile::tempdir().unwrap();
	let tool = fake_tshark(dir.path(), body);
	let config = CaptureConfig::new(dir.path().join("trace.pcap")).with_tshark_path(Some(tool));
	let source = PacketSource::open(&config).unwrap();
	(dir, source)
}

#[test]
fn test_streams_records_and_skips_noise() {
	let (_dir, source) = open(&format!("{FIELDS}exit 0\n"));
	let records: Vec<_> = source.collect::<Result<_, _>>().unwrap();

	let frames: Vec<u64> = records.iter().map(|r| r.frame).collect();
	assert_eq!(frames, [1, 3, 4, 5]);
	assert_eq!(records[0].flags, TcpFlags::SYN | TcpFlags::ACK);
	assert_eq!(records[1].seq, 100);
	assert_eq!(records[3].src_ip, "2001:db8::5");
	assert_eq!(records[3].dst_port, 443);
}

#[test]
fn test_tool_output_through_engine() {
	let (_dir, source) = open(&format!("{FIELDS}exit 0\n"));
	let mut engine = FlowEngine::new(EngineConfig::default());
	engine.consume(source).unwrap();

	let summary = engine.summary();
	assert_eq!(summary.active, 2);
	assert_eq!(summary.total_open, 1);
	assert_eq!(summary.total_lingering, 1);
	assert!(summary.servers.iter().any(|row| row.endpoint == "2001:db8::1"));
}

#[test]
fn test_nonzero_exit_is_tool_failed() {
	let (_dir, source) = open(&format!("{FIELDS}exit 2\n"));
	let results: Vec<_> = source.collect();

	assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
	assert!(matches!(results.last(), Some(Err(Error::ToolFailed { .. }))));
}

#[test]
fn test_nonzero_exit_fails_consume() {
	let (_dir, source) = open(&format!("{FIELDS}exit 2\n"));
	let mut engine = FlowEngine::new(EngineConfig::default());
	assert!(matches!(engine.consume(source), Err(Error::ToolFailed { .. })));
	assert_eq!(engine.stats().records, 4);
}

#[test]
fn test_shutdown_ends_stream_cleanly() {
	let (_dir, mut source) = open("printf '1|10.0.0.5||50000|10.0.0.1||80|0|1|1|0|1|0\\n'\nexec sleep 30\n");
	let handle = source.shutdown_handle();
	assert_eq!(source.next().unwrap().unwrap().frame, 1);

	let started = Instant::now();
	handle.shutdown().unwrap();
	assert!(handle.is_shutdown());
	// Killed by us, so the exit status is not reported as a failure
	assert!(source.next().is_none());
	assert!(source.next().is_none());
	assert!(started.elapsed() < Duration::from_secs(10));

	// Stopping twice is fine
	handle.shutdown().unwrap();
}

#[test]
fn test_drop_stops_running_tool() {
	let (_dir, source) = open("exec sleep 30\n");
	let started = Instant::now();
	drop(source);
	assert!(started.elapsed() < Duration::from_secs(10));
}
