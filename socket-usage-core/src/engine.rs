//! Flow state inference engine.
//!
//! Each record is classified into a [`Transition`] from its flag set and
//! whether its flow is already known, then the transition is applied to the
//! flow table. The engine makes a single forward pass and never looks back.

use log::{debug, info};
use serde::Serialize;

use crate::aggregate::{Summary, summarize};
use crate::config::{EngineConfig, Retention};
use crate::connection::Connection;
use crate::flow::{FlowIdentity, Role, assign_roles};
use crate::record::{PacketRecord, TcpFlags};
use crate::table::FlowTable;

/// What a record does to the flow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	/// Start (or restart) tracking a flow
	Establish,
	/// A side sends its FIN
	Fin,
	/// A bare acknowledgment on a known flow
	AckOnly,
	/// A side aborts with RST
	Reset,
	/// Nothing to do
	Ignore,
}

impl Transition {
	/// Classify a flag set, in priority order.
	///
	/// Flags match by containment except for the plain ACK cases, which need
	/// exactly ACK. A plain ACK on an unknown flow is treated as an
	/// establishment so captures that start mid-connection still count.
	pub fn classify(flags: TcpFlags, known: bool) -> Self {
		if flags.contains(TcpFlags::SYN | TcpFlags::ACK) || (flags.is_plain_ack() && !known) {
			Transition::Establish
		} else if !known {
			Transition::Ignore
		} else if flags.contains(TcpFlags::FIN) {
			Transition::Fin
		} else if flags.is_plain_ack() {
			Transition::AckOnly
		} else if flags.contains(TcpFlags::RST) {
			Transition::Reset
		} else {
			Transition::Ignore
		}
	}
}

/// Running counters for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineStats {
	pub records: u64,
	pub ignored: u64,
	pub created: u64,
	pub replaced: u64,
	pub closed: u64,
	pub removed: u64,
}

/// Owns the flow table and applies records to it.
///
/// Not meant to be shared between threads without external locking.
#[derive(Debug, Clone)]
pub struct FlowEngine {
	config: EngineConfig,
	table: FlowTable,
	stats: EngineStats,
}

impl FlowEngine {
	pub fn new(config: EngineConfig) -> Self {
		Self {
			config,
			table: FlowTable::new(),
			stats: EngineStats::default(),
		}
	}

	pub fn config(&self) -> &EngineConfig { &self.config }

	pub fn table(&self) -> &FlowTable { &self.table }

	pub fn stats(&self) -> &EngineStats { &self.stats }

	/// Apply every record of a stream, stopping at the first source error.
	///
	/// # Errors
	///
	/// Returns the first error yielded by the record stream
	pub fn consume<I, E>(&mut self, records: I) -> Result<(), E>
	where
		I: IntoIterator<Item = Result<PacketRecord, E>>,
	{
		for record in records {
			self.process(&record?);
		}
		info!(
			"Processed {} records: {} flows created, {} replaced, {} closed, {} tracked",
			self.stats.records,
			self.stats.created,
			self.stats.replaced,
			self.stats.closed,
			self.table.len()
		);
		Ok(())
	}

	/// Apply one record and return the transition it was classified as.
	pub fn process(&mut self, record: &PacketRecord) -> Transition {
		self.stats.records += 1;
		let identity = FlowIdentity::of(record);
		let transition = Transition::classify(record.flags, self.table.contains(&identity));
		if self.config.debug {
			debug!("{:?}: {}", transition, record);
		}

		match transition {
			Transition::Establish => self.establish(identity, record),
			Transition::Fin | Transition::AckOnly | Transition::Reset => {
				self.update(identity, record, transition)
			}
			Transition::Ignore => self.stats.ignored += 1,
		}
		transition
	}

	/// Summarize the flows that are not closed.
	pub fn summary(&self) -> Summary {
		let mut summary = summarize(self.table.connections().filter(|c| !c.is_closed()));
		summary.retained_closed = self.table.connections().filter(|c| c.is_closed()).count();
		summary
	}

	fn establish(&mut self, identity: FlowIdentity, record: &PacketRecord) {
		let (client, server) = assign_roles(record);
		let connection = Connection::new(client, server);
		if self.config.debug {
			debug!("New connection: {}", connection);
		}
		if self.table.upsert(identity, connection).is_some() {
			self.stats.replaced += 1;
		}
		self.stats.created += 1;
	}

	fn update(&mut self, identity: FlowIdentity, record: &PacketRecord, transition: Transition) {
		let Some(connection) = self.table.get_mut(&identity) else {
			self.stats.ignored += 1;
			return;
		};
		let Some(role) = connection.role_of(&record.src_ip, record.src_port) else {
			if self.config.debug {
				debug!("Source {}:{} is not part of {}", record.src_ip, record.src_port, connection);
			}
			self.stats.ignored += 1;
			return;
		};

		let was_closed = connection.is_closed();
		match transition {
			Transition::Fin => apply_fin(connection, role, record),
			Transition::AckOnly => apply_ack(connection, role, record),
			Transition::Reset => apply_reset(connection, role, record, self.config.rst_backfill),
			Transition::Establish | Transition::Ignore => {}
		}
		if was_closed || !connection.is_closed() {
			return;
		}

		self.stats.closed += 1;
		if self.config.debug {
			debug!("Connection closed: {}", connection);
		}
		if self.config.retention == Retention::Eager && self.table.remove(&identity).is_some() {
			self.stats.removed += 1;
		}
	}
}

/// Record the sender's closing sequence and, on FIN+ACK, its acknowledgment
/// of an earlier peer close.
fn apply_fin(connection: &mut Connection, role: Role, record: &PacketRecord) {
	let peer_seq = connection.side(role.peer()).seq;
	let side = connection.side_mut(role);
	side.seq.get_or_insert(record.seq);
	if record.flags.contains(TcpFlags::ACK)
		&& side.ack.is_none()
		&& peer_seq.is_some_and(|seq| record.ack > seq)
	{
		side.ack = Some(record.ack);
	}
}

/// Record the sender's acknowledgment of the peer's close.
fn apply_ack(connection: &mut Connection, role: Role, record: &PacketRecord) {
	let peer_seq = connection.side(role.peer()).seq;
	let side = connection.side_mut(role);
	if side.ack.is_none() && peer_seq.is_some_and(|seq| record.ack > seq) {
		side.ack = Some(record.ack);
	}
}

/// Mark the sender as done: acknowledgment 0 and, if missing, `seq - 1`.
fn apply_reset(connection: &mut Connection, role: Role, record: &PacketRecord, backfill: bool) {
	let side = connection.side_mut(role);
	side.ack = Some(0);
	if backfill && side.seq.is_none() {
		side.seq = Some(record.seq.wrapping_sub(1));
	}
}
