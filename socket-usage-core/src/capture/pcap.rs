//! Native pcap record source.
//!
//! Reads classic pcap files with `pcap-file` and dissects frames with
//! `etherparse`, yielding the same records tshark would. Sequence numbers
//! are the absolute values on the wire, not tshark's relative ones; the
//! engine only compares them within a flow so either works.

use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use log::{debug, trace};
use pcap_file::DataLink;
use pcap_file::pcap::PcapReader;
use snafu::ResultExt;

use crate::config::CaptureConfig;
use crate::error::{self, Result};
use crate::record::{PacketRecord, TcpFlags};

/// Records read straight from a pcap file.
pub struct PcapRecords {
	reader: PcapReader<BufReader<File>>,
	datalink: DataLink,
	selection: CaptureConfig,
	frame: u64,
	stopped: Arc<AtomicBool>,
}

impl PcapRecords {
	/// Open the configured capture file.
	///
	/// # Errors
	///
	/// Returns an error if the file cannot be opened, is not a pcap file, or
	/// uses a link type that cannot be dissected
	pub fn open(config: &CaptureConfig, stopped: Arc<AtomicBool>) -> Result<Self> {
		let file = File::open(&config.input).context(error::InputOpenSnafu { path: config.input.clone() })?;
		let reader = PcapReader::new(BufReader::new(file)).context(error::PcapOpenSnafu { path: config.input.clone() })?;
		let datalink = reader.header().datalink;
		if !is_supported(datalink) {
			return error::UnsupportedDataLinkSnafu { datalink }.fail();
		}
		debug!("Reading {} natively, link type {:?}", config.input.display(), datalink);

		Ok(Self {
			reader,
			datalink,
			selection: config.clone(),
			frame: 0,
			stopped,
		})
	}

	fn selected(&self, record: &PacketRecord, src: &IpAddr, dst: &IpAddr) -> bool {
		let host_ok = self.selection.matches_host(src) || self.selection.matches_host(dst);
		let port_ok = self.selection.matches_port(record.src_port) || self.selection.matches_port(record.dst_port);
		host_ok && port_ok
	}
}

fn is_supported(datalink: DataLink) -> bool {
	matches!(
		datalink,
		DataLink::ETHERNET | DataLink::LINUX_SLL | DataLink::RAW | DataLink::IPV4 | DataLink::IPV6
	)
}

fn slice(datalink: DataLink, data: &[u8]) -> Option<SlicedPacket<'_>> {
	match datalink {
		DataLink::ETHERNET => SlicedPacket::from_ethernet(data).ok(),
		DataLink::LINUX_SLL => SlicedPacket::from_linux_sll(data).ok(),
		_ => SlicedPacket::from_ip(data).ok(),
	}
}

/// Turn a dissected frame into a record, if it is a TCP segment over IP.
fn tcp_record(frame: u64, packet: &SlicedPacket<'_>) -> Option<(PacketRecord, IpAddr, IpAddr)> {
	let (src, dst): (IpAddr, IpAddr) = match &packet.net {
		Some(NetSlice::Ipv4(ip4)) => (ip4.header().source_addr().into(), ip4.header().destination_addr().into()),
		Some(NetSlice::Ipv6(ip6)) => (ip6.header().source_addr().into(), ip6.header().destination_addr().into()),
		_ => return None,
	};
	let Some(TransportSlice::Tcp(tcp)) = &packet.transport else {
		return None;
	};

	let record = PacketRecord {
		frame,
		src_ip: src.to_string(),
		src_port: tcp.source_port(),
		dst_ip: dst.to_string(),
		dst_port: tcp.destination_port(),
		seq: tcp.sequence_number(),
		ack: tcp.acknowledgment_number(),
		flags: TcpFlags::from_bools(tcp.syn(), tcp.ack(), tcp.fin(), tcp.rst()),
	};
	Some((record, src, dst))
}

impl Iterator for PcapRecords {
	type Item = Result<PacketRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if self.stopped.load(Ordering::Acquire) {
				debug!("Native capture stopped after {} frames", self.frame);
				return None;
			}
			let found = match self.reader.next_packet()? {
				Ok(packet) => {
					self.frame += 1;
					slice(self.datalink, &packet.data).and_then(|sliced| tcp_record(self.frame, &sliced))
				}
				Err(e) => return Some(Err(e).context(error::PcapReadSnafu)),
			};
			match found {
				Some((record, src, dst)) if self.selected(&record, &src, &dst) => return Some(Ok(record)),
				Some(_) => {}
				None => trace!("Skipping frame {}: not a TCP segment", self.frame),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_supported_link_types() {
		assert!(is_supported(DataLink::ETHERNET));
		assert!(is_supported(DataLink::RAW));
		assert!(is_supported(DataLink::LINUX_SLL));
		assert!(!is_supported(DataLink::NULL));
	}

	#[test]
	fn test_tcp_record_from_raw_ip() {
		let builder = etherparse::PacketBuilder::ipv4([10, 0, 0, 5], [10, 0, 0, 1], 64)
			.tcp(50000, 80, 1000, 512)
			.syn()
			.ack(1);
		let mut data = Vec::with_capacity(builder.size(0));
		builder.write(&mut data, &[]).unwrap();

		let sliced = slice(DataLink::RAW, &data).expect("valid ip packet");
		let (record, src, dst) = tcp_record(7, &sliced).expect("tcp segment");
		assert_eq!(record.frame, 7);
		assert_eq!(record.src_ip, "10.0.0.5");
		assert_eq!(record.dst_port, 80);
		assert_eq!(record.seq, 1000);
		assert_eq!(record.ack, 1);
		assert_eq!(record.flags, TcpFlags::SYN | TcpFlags::ACK);
		assert_eq!(src, IpAddr::from([10, 0, 0, 5]));
		assert_eq!(dst, IpAddr::from([10, 0, 0, 1]));
	}

	#[test]
	fn test_udp_is_not_a_record() {
		let builder = etherparse::PacketBuilder::ipv4([10, 0, 0, 5], [10, 0, 0, 1], 64).udp(5353, 53);
		let mut data = Vec::with_capacity(builder.size(4));
		builder.write(&mut data, &[1, 2, 3, 4]).unwrap();
		let sliced = slice(DataLink::RAW, &data).unwrap();
		assert!(tcp_record(1, &sliced).is_none());
	}
}
