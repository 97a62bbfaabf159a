//! Error types for socket-usage core
//!
//! All fallible operations use `snafu` for structured error handling.
//! Record-level problems (malformed lines, unknown flows) are not errors;
//! they are skipped by the capture sources and the engine.

use std::path::PathBuf;

use snafu::prelude::*;

/// Result type alias for operations using snafu error handling
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type for socket-usage operations
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	/// No packet dissection tool could be located
	#[snafu(display("tshark not found, searched: {}", searched.join(", ")))]
	ToolNotFound { searched: Vec<String> },

	/// The dissection tool could not be started
	#[snafu(display("Failed to start {}: {source}", path.display()))]
	ToolSpawn {
		source: std::io::Error,
		path: PathBuf,
	},

	/// The dissection tool exited unsuccessfully
	#[snafu(display("tshark exited with {status}"))]
	ToolFailed { status: std::process::ExitStatus },

	/// Reading the dissection tool output failed
	#[snafu(display("Failed to read capture output: {source}"))]
	CaptureRead { source: std::io::Error },

	/// The capture file could not be opened
	#[snafu(display("Failed to open capture file {}: {source}", path.display()))]
	InputOpen {
		source: std::io::Error,
		path: PathBuf,
	},

	/// The capture file is not a readable pcap file
	#[snafu(display("Failed to read pcap header from {}: {source}", path.display()))]
	PcapOpen {
		source: pcap_file::PcapError,
		path: PathBuf,
	},

	/// A pcap packet could not be read
	#[snafu(display("Failed to read pcap packet: {source}"))]
	PcapRead { source: pcap_file::PcapError },

	/// The pcap link type cannot be dissected natively
	#[snafu(display("Unsupported pcap link type: {datalink:?}"))]
	UnsupportedDataLink { datalink: pcap_file::DataLink },

	/// A host selector is not an IP literal
	#[snafu(display("Invalid host filter value: {value:?}"))]
	InvalidHost {
		source: std::net::AddrParseError,
		value: String,
	},

	/// A port selector is not a port number
	#[snafu(display("Invalid port filter value: {value:?}"))]
	InvalidPort {
		source: std::num::ParseIntError,
		value: String,
	},

	/// Stopping the capture tool failed
	#[snafu(display("Failed to stop capture: {source}"))]
	Shutdown { source: std::io::Error },
}
