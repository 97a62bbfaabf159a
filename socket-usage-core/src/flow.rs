//! Flow identity and role assignment.

use std::collections::BTreeSet;
use std::fmt;

use crate::record::PacketRecord;

/// Key for identifying a flow regardless of direction.
///
/// This is the unordered set of the four address/port strings of a segment,
/// so both directions of a connection share one key. Being a set, it also
/// merges tuples that only differ by which side owns which port
/// (`A:1 -> B:2` and `A:2 -> B:1`) and drops duplicates (`A:80 -> B:80`
/// is a three element set).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowIdentity(BTreeSet<String>);

impl FlowIdentity {
	pub fn of(record: &PacketRecord) -> Self {
		Self(BTreeSet::from([
			record.src_ip.clone(),
			record.src_port.to_string(),
			record.dst_ip.clone(),
			record.dst_port.to_string(),
		]))
	}

	pub fn parts(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}

impl fmt::Display for FlowIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<&str> = self.parts().collect();
		write!(f, "{{{}}}", parts.join(", "))
	}
}

/// One side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
	pub ip: String,
	pub port: u16,
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.ip.contains(':') {
			write!(f, "[{}]:{}", self.ip, self.port)
		} else {
			write!(f, "{}:{}", self.ip, self.port)
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Client,
	Server,
}

impl Role {
	pub fn peer(&self) -> Role {
		match self {
			Role::Client => Role::Server,
			Role::Server => Role::Client,
		}
	}
}

/// Pick `(client, server)` for a new flow.
///
/// The endpoint with the numerically larger port is the client; on equal
/// ports the destination is. This is a heuristic: two peers that both use
/// ephemeral ports can be labeled the wrong way round, and the labels are
/// never revisited afterwards.
pub fn assign_roles(record: &PacketRecord) -> (Endpoint, Endpoint) {
	let src = Endpoint {
		ip: record.src_ip.clone(),
		port: record.src_port,
	};
	let dst = Endpoint {
		ip: record.dst_ip.clone(),
		port: record.dst_port,
	};
	if record.src_port > record.dst_port { (src, dst) } else { (dst, src) }
}
