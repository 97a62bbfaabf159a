//! Configuration types for socket-usage.

use std::net::IpAddr;
use std::path::PathBuf;

use crate::record::TcpFlags;

/// What happens to a flow once both sides of its close have been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
	/// Remove the flow from the table as soon as it is closed.
	/// A later plain ACK for the same identity starts a new flow.
	#[default]
	Eager,

	/// Keep closed flows in the table and leave them out at report time.
	/// Later packets for the identity keep updating the retained flow.
	Retain,
}

/// Order of the four flag fields at the end of a textual record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagOrder {
	/// `syn|fin|ack|rst`, the order the capture tool is asked for
	#[default]
	SynFinAckRst,

	/// `syn|ack|fin|rst`
	SynAckFinRst,
}

impl FlagOrder {
	/// Flags in field order, most significant bit first.
	#[must_use]
	pub fn flags(&self) -> [TcpFlags; 4] {
		match self {
			FlagOrder::SynFinAckRst => [TcpFlags::SYN, TcpFlags::FIN, TcpFlags::ACK, TcpFlags::RST],
			FlagOrder::SynAckFinRst => [TcpFlags::SYN, TcpFlags::ACK, TcpFlags::FIN, TcpFlags::RST],
		}
	}

	/// Dissector field names in field order.
	#[must_use]
	pub fn field_names(&self) -> [&'static str; 4] {
		match self {
			FlagOrder::SynFinAckRst => {
				["tcp.flags.syn", "tcp.flags.fin", "tcp.flags.ack", "tcp.flags.reset"]
			}
			FlagOrder::SynAckFinRst => {
				["tcp.flags.syn", "tcp.flags.ack", "tcp.flags.fin", "tcp.flags.reset"]
			}
		}
	}

	/// Decode the concatenated flag bits (first field is the MSB).
	#[must_use]
	pub fn decode(&self, bits: u8) -> TcpFlags {
		self
			.flags()
			.iter()
			.enumerate()
			.filter(|(i, _)| bits & (0b1000 >> i) != 0)
			.fold(TcpFlags::NONE, |acc, (_, flag)| acc | *flag)
	}
}

/// Runtime configuration for the flow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
	/// Eager removal or retention of closed flows.
	pub retention: Retention,
	/// Backfill a missing sequence number with `seq - 1` on RST.
	pub rst_backfill: bool,
	/// Log every transition at debug level.
	pub debug: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			retention: Retention::default(),
			rst_backfill: true,
			debug: false,
		}
	}
}

impl EngineConfig {
	/// Create a new config with default values.
	#[must_use]
	pub fn new() -> Self { Self::default() }

	/// Set the closed-flow retention mode.
	#[must_use]
	pub fn with_retention(mut self, retention: Retention) -> Self {
		self.retention = retention;
		self
	}

	/// Enable or disable RST sequence backfill.
	#[must_use]
	pub fn with_rst_backfill(mut self, rst_backfill: bool) -> Self {
		self.rst_backfill = rst_backfill;
		self
	}

	/// Enable or disable per-record debug logging.
	#[must_use]
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}
}

/// Where packet records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
	/// Run tshark and parse its field output.
	#[default]
	Tshark,

	/// Read classic pcap files directly.
	Native,
}

/// Configuration for opening a packet source.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
	/// Capture file to read.
	pub input: PathBuf,
	/// Only keep segments to or from these hosts (empty keeps all).
	pub hosts: Vec<IpAddr>,
	/// Only keep segments to or from these ports (empty keeps all).
	pub ports: Vec<u16>,
	/// Order of the flag fields requested from and read back from tshark.
	pub flag_order: FlagOrder,
	/// Record source backend.
	pub backend: Backend,
	/// Explicit tshark binary, skipping the search.
	pub tshark_path: Option<PathBuf>,
	/// Log the tool invocation and let its stderr through.
	pub debug: bool,
}

impl CaptureConfig {
	/// Create a new config reading `input` with default values.
	#[must_use]
	pub fn new(input: impl Into<PathBuf>) -> Self {
		Self {
			input: input.into(),
			hosts: Vec::new(),
			ports: Vec::new(),
			flag_order: FlagOrder::default(),
			backend: Backend::default(),
			tshark_path: None,
			debug: false,
		}
	}

	/// Set the host selectors.
	#[must_use]
	pub fn with_hosts(mut self, hosts: Vec<IpAddr>) -> Self {
		self.hosts = hosts;
		self
	}

	/// Set the port selectors.
	#[must_use]
	pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
		self.ports = ports;
		self
	}

	/// Set the flag field order.
	#[must_use]
	pub fn with_flag_order(mut self, flag_order: FlagOrder) -> Self {
		self.flag_order = flag_order;
		self
	}

	/// Set the record source backend.
	#[must_use]
	pub fn with_backend(mut self, backend: Backend) -> Self {
		self.backend = backend;
		self
	}

	/// Use an explicit tshark binary.
	#[must_use]
	pub fn with_tshark_path(mut self, path: Option<PathBuf>) -> Self {
		self.tshark_path = path;
		self
	}

	/// Enable or disable capture debugging.
	#[must_use]
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	/// Check whether an address passes the host selectors.
	pub fn matches_host(&self, addr: &IpAddr) -> bool { self.hosts.is_empty() || self.hosts.contains(addr) }

	/// Check whether a port passes the port selectors.
	pub fn matches_port(&self, port: u16) -> bool { self.ports.is_empty() || self.ports.contains(&port) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_decode_default_order() {
		// syn|fin|ack|rst = 1|0|1|0
		let flags = FlagOrder::SynFinAckRst.decode(0b1010);
		assert_eq!(flags, TcpFlags::SYN | TcpFlags::ACK);
		// syn|fin|ack|rst = 0|1|1|0
		let flags = FlagOrder::SynFinAckRst.decode(0b0110);
		assert_eq!(flags, TcpFlags::FIN | TcpFlags::ACK);
	}

	#[test]
	fn test_decode_alternate_order() {
		// syn|ack|fin|rst = 0|1|1|0
		let flags = FlagOrder::SynAckFinRst.decode(0b0110);
		assert_eq!(flags, TcpFlags::FIN | TcpFlags::ACK);
		// syn|ack|fin|rst = 0|1|0|0
		let flags = FlagOrder::SynAckFinRst.decode(0b0100);
		assert_eq!(flags, TcpFlags::ACK);
	}

	#[test]
	fn test_field_names_follow_order() {
		for order in [FlagOrder::SynFinAckRst, FlagOrder::SynAckFinRst] {
			let names = order.field_names();
			for (name, flag) in names.iter().zip(order.flags()) {
				let expected = match flag {
					TcpFlags::SYN => "tcp.flags.syn",
					TcpFlags::ACK => "tcp.flags.ack",
					TcpFlags::FIN => "tcp.flags.fin",
					_ => "tcp.flags.reset",
				};
				assert_eq!(*name, expected);
			}
		}
	}

	#[test]
	fn test_engine_config_builder() {
		let config = EngineConfig::new()
			.with_retention(Retention::Retain)
			.with_rst_backfill(false)
			.with_debug(true);
		assert_eq!(config.retention, Retention::Retain);
		assert!(!config.rst_backfill);
		assert!(config.debug);
		assert!(EngineConfig::default().rst_backfill);
	}

	#[test]
	fn test_capture_selectors() {
		let config = CaptureConfig::new("trace.pcap")
			.with_hosts(vec!["10.0.0.1".parse().unwrap()])
			.with_ports(vec![443]);
		assert!(config.matches_host(&"10.0.0.1".parse().unwrap()));
		assert!(!config.matches_host(&"10.0.0.2".parse().unwrap()));
		assert!(config.matches_port(443));
		assert!(!config.matches_port(80));

		let open = CaptureConfig::new("trace.pcap");
		assert!(open.matches_host(&"192.0.2.7".parse().unwrap()));
		assert!(open.matches_port(22));
	}
}
