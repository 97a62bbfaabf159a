//! Flow table keyed by flow identity.

use std::collections::HashMap;

use log::trace;

use crate::connection::Connection;
use crate::flow::FlowIdentity;

/// Maps flow identities to their connection state.
///
/// The table is owned by one engine and mutated through `&mut self`; sharing
/// it between threads needs external synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowTable {
	flows: HashMap<FlowIdentity, Connection>,
}

impl FlowTable {
	/// Create an empty FlowTable
	pub fn new() -> Self { Self::default() }

	/// Insert a connection, replacing and returning any previous one
	pub fn upsert(&mut self, identity: FlowIdentity, connection: Connection) -> Option<Connection> {
		trace!("Flow {} set to {}", identity, connection);
		self.flows.insert(identity, connection)
	}

	pub fn get(&self, identity: &FlowIdentity) -> Option<&Connection> { self.flows.get(identity) }

	pub fn get_mut(&mut self, identity: &FlowIdentity) -> Option<&mut Connection> { self.flows.get_mut(identity) }

	/// Remove a flow. Removing an unknown identity is a no-op.
	pub fn remove(&mut self, identity: &FlowIdentity) -> Option<Connection> {
		let removed = self.flows.remove(identity);
		if let Some(connection) = &removed {
			trace!("Flow {} removed ({})", identity, connection);
		}
		removed
	}

	pub fn contains(&self, identity: &FlowIdentity) -> bool { self.flows.contains_key(identity) }

	pub fn len(&self) -> usize { self.flows.len() }

	pub fn is_empty(&self) -> bool { self.flows.is_empty() }

	/// Iterate over all tracked flows, in no particular order
	pub fn iter(&self) -> impl Iterator<Item = (&FlowIdentity, &Connection)> { self.flows.iter() }

	/// Iterate over all tracked connections, in no particular order
	pub fn connections(&self) -> impl Iterator<Item = &Connection> { self.flows.values() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::flow::{assign_roles, FlowIdentity};
	use crate::record::{PacketRecord, TcpFlags};

	fn synack() -> PacketRecord {
		PacketRecord {
			frame: 1,
			src_ip: "10.0.0.1".to_owned(),
			src_port: 80,
			dst_ip: "10.0.0.5".to_owned(),
			dst_port: 50000,
			seq: 0,
			ack: 1,
			flags: TcpFlags::SYN | TcpFlags::ACK,
		}
	}

	fn fresh(record: &PacketRecord) -> (FlowIdentity, Connection) {
		let (client, server) = assign_roles(record);
		(FlowIdentity::of(record), Connection::new(client, server))
	}

	#[test]
	fn test_upsert_overwrites() {
		let mut table = FlowTable::new();
		let (identity, mut conn) = fresh(&synack());
		conn.server_side.seq = Some(100);
		assert!(table.upsert(identity.clone(), conn).is_none());

		let (_, replacement) = fresh(&synack());
		let previous = table.upsert(identity.clone(), replacement).expect("replaced");
		assert_eq!(previous.server_side.seq, Some(100));
		assert!(table.get(&identity).unwrap().is_open());
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn test_remove_is_idempotent() {
		let mut table = FlowTable::new();
		let (identity, conn) = fresh(&synack());
		table.upsert(identity.clone(), conn);
		assert!(table.remove(&identity).is_some());
		assert!(table.remove(&identity).is_none());
		assert!(!table.contains(&identity));
		assert!(table.is_empty());
	}

	#[test]
	fn test_get_mut_updates_in_place() {
		let mut table = FlowTable::new();
		let (identity, conn) = fresh(&synack());
		table.upsert(identity.clone(), conn);
		if let Some(conn) = table.get_mut(&identity) {
			conn.client_side.seq = Some(5);
		}
		assert_eq!(table.get(&identity).unwrap().client_side.seq, Some(5));
		assert_eq!(table.connections().count(), 1);
		assert_eq!(table.iter().count(), 1);
	}
}
