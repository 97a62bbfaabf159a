//! Packet records and the textual record codec.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::config::FlagOrder;
use crate::constants::{
	ADDRESS_FIELD_COUNT, DUAL_STACK_RECORD_FIELD_COUNT, FIELD_SEPARATOR, LIST_SEPARATOR, RECORD_FIELD_COUNT,
};

/// The TCP flags the engine looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags(u8);

impl TcpFlags {
	pub const NONE: TcpFlags = TcpFlags(0);
	pub const SYN: TcpFlags = TcpFlags(0b1000);
	pub const FIN: TcpFlags = TcpFlags(0b0100);
	pub const ACK: TcpFlags = TcpFlags(0b0010);
	pub const RST: TcpFlags = TcpFlags(0b0001);

	/// Build from individual flag bits.
	#[must_use]
	pub fn from_bools(syn: bool, ack: bool, fin: bool, rst: bool) -> Self {
		let mut flags = TcpFlags::NONE;
		for (set, flag) in [(syn, Self::SYN), (ack, Self::ACK), (fin, Self::FIN), (rst, Self::RST)] {
			if set {
				flags |= flag;
			}
		}
		flags
	}

	/// True if every flag in `other` is set.
	pub fn contains(&self, other: TcpFlags) -> bool { self.0 & other.0 == other.0 }

	/// True if the set is exactly ACK, nothing else.
	pub fn is_plain_ack(&self) -> bool { *self == Self::ACK }

	pub fn bits(&self) -> u8 { self.0 }
}

impl BitOr for TcpFlags {
	type Output = TcpFlags;

	fn bitor(self, rhs: TcpFlags) -> TcpFlags { TcpFlags(self.0 | rhs.0) }
}

impl BitOrAssign for TcpFlags {
	fn bitor_assign(&mut self, rhs: TcpFlags) { self.0 |= rhs.0; }
}

impl fmt::Display for TcpFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names: Vec<&str> = [
			(Self::SYN, "SYN"),
			(Self::FIN, "FIN"),
			(Self::ACK, "ACK"),
			(Self::RST, "RST"),
		]
		.into_iter()
		.filter(|(flag, _)| self.contains(*flag))
		.map(|(_, name)| name)
		.collect();
		if names.is_empty() {
			f.write_str("-")
		} else {
			f.write_str(&names.join("+"))
		}
	}
}

/// One observed TCP segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
	pub frame: u64,
	pub src_ip: String,
	pub src_port: u16,
	pub dst_ip: String,
	pub dst_port: u16,
	pub seq: u32,
	pub ack: u32,
	pub flags: TcpFlags,
}

impl PacketRecord {
	/// Parse one line of field output.
	///
	/// Accepts one address column per side, or the dual-stack layout with an
	/// IPv4 and an IPv6 column per side where exactly one of each pair is set.
	///
	/// Returns `None` for anything that does not have the shape of a single
	/// TCP segment: wrong field count, an embedded list separator, empty
	/// addresses, or unparsable numbers. Empty seq/ack fields read as 0.
	pub fn parse_line(line: &str, order: FlagOrder) -> Option<Self> {
		let line = line.trim_end_matches(['\r', '\n']);
		if line.contains(LIST_SEPARATOR) {
			return None;
		}
		let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
		let fields = match fields.len() {
			RECORD_FIELD_COUNT => fields,
			DUAL_STACK_RECORD_FIELD_COUNT => merge_address_columns(&fields)?,
			_ => return None,
		};
		if fields[1].is_empty() || fields[3].is_empty() {
			return None;
		}

		let bits = fields[ADDRESS_FIELD_COUNT..]
			.iter()
			.try_fold(0u8, |acc, field| Some(acc << 1 | u8::from(parse_flag(field)?)))?;

		Some(Self {
			frame: fields[0].parse().ok()?,
			src_ip: fields[1].to_owned(),
			src_port: fields[2].parse().ok()?,
			dst_ip: fields[3].to_owned(),
			dst_port: fields[4].parse().ok()?,
			seq: parse_number(fields[5])?,
			ack: parse_number(fields[6])?,
			flags: order.decode(bits),
		})
	}
}

impl fmt::Display for PacketRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"#{} {}:{} -> {}:{} seq={} ack={} [{}]",
			self.frame, self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.seq, self.ack, self.flags
		)
	}
}

/// Collapse `frame|ip.src|ipv6.src|port|ip.dst|ipv6.dst|port|...` into the
/// single address column layout.
fn merge_address_columns<'a>(fields: &[&'a str]) -> Option<Vec<&'a str>> {
	// IPv6 tunneled in IPv4 sets both columns; treat it like list noise
	let pick = |v4: &'a str, v6: &'a str| match (v4.is_empty(), v6.is_empty()) {
		(false, true) => Some(v4),
		(true, false) => Some(v6),
		_ => None,
	};
	let mut merged = vec![fields[0], pick(fields[1], fields[2])?, fields[3], pick(fields[4], fields[5])?];
	merged.extend_from_slice(&fields[6..]);
	Some(merged)
}

fn parse_number(field: &str) -> Option<u32> {
	if field.is_empty() {
		Some(0)
	} else {
		field.parse().ok()
	}
}

fn parse_flag(field: &str) -> Option<bool> {
	match field {
		"1" | "True" | "true" => Some(true),
		"0" | "False" | "false" => Some(false),
		_ => None,
	}
}
