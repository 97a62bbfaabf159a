//! Per-flow connection state.

use std::fmt;

use serde::Serialize;

use crate::flow::{Endpoint, Role};

/// Where a connection is in its close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
	Open,
	Lingering,
	Closed,
}

/// Sequence/acknowledgment progress of one side of the close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideState {
	/// Sequence number this side closed with.
	pub seq: Option<u32>,
	/// Acknowledgment this side sent for the peer's close.
	/// `Some(0)` after a RST from this side.
	pub ack: Option<u32>,
}

/// The mutable record kept for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
	client: Endpoint,
	server: Endpoint,
	pub client_side: SideState,
	pub server_side: SideState,
}

impl Connection {
	/// Create a connection with nothing observed on either side.
	pub fn new(client: Endpoint, server: Endpoint) -> Self {
		Self {
			client,
			server,
			client_side: SideState::default(),
			server_side: SideState::default(),
		}
	}

	pub fn client(&self) -> &Endpoint { &self.client }

	pub fn server(&self) -> &Endpoint { &self.server }

	/// Attribute a segment source to a role.
	///
	/// Matches by IP, client first. When both roles share an IP (loopback)
	/// the port decides.
	pub fn role_of(&self, ip: &str, port: u16) -> Option<Role> {
		if self.client.ip == self.server.ip {
			if ip != self.client.ip {
				return None;
			}
			return if port == self.client.port {
				Some(Role::Client)
			} else if port == self.server.port {
				Some(Role::Server)
			} else {
				None
			};
		}
		if ip == self.client.ip {
			Some(Role::Client)
		} else if ip == self.server.ip {
			Some(Role::Server)
		} else {
			None
		}
	}

	pub fn side(&self, role: Role) -> &SideState {
		match role {
			Role::Client => &self.client_side,
			Role::Server => &self.server_side,
		}
	}

	pub fn side_mut(&mut self, role: Role) -> &mut SideState {
		match role {
			Role::Client => &mut self.client_side,
			Role::Server => &mut self.server_side,
		}
	}

	/// No side has started closing.
	pub fn is_open(&self) -> bool { self.client_side.seq.is_none() && self.server_side.seq.is_none() }

	/// Some side has started closing and some acknowledgment is missing.
	pub fn is_lingering(&self) -> bool {
		(self.client_side.seq.is_some() || self.server_side.seq.is_some())
			&& (self.client_side.ack.is_none() || self.server_side.ack.is_none())
	}

	/// Both sides have closed and been acknowledged.
	pub fn is_closed(&self) -> bool {
		self.client_side.seq.is_some()
			&& self.client_side.ack.is_some()
			&& self.server_side.seq.is_some()
			&& self.server_side.ack.is_some()
	}

	/// Classify as open, then closed, then lingering for everything else.
	///
	/// The predicates do not cover every combination (e.g. one sequence and
	/// all acknowledgments present after RSTs without backfill); those
	/// count as lingering.
	pub fn lifecycle(&self) -> Lifecycle {
		if self.is_open() {
			Lifecycle::Open
		} else if self.is_closed() {
			Lifecycle::Closed
		} else {
			Lifecycle::Lingering
		}
	}
}

impl fmt::Display for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}<->{}", self.client, self.server) }
}
