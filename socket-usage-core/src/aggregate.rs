//! Per-endpoint flow counts.

use std::collections::HashMap;

use serde::Serialize;

use crate::connection::{Connection, Lifecycle};

/// Flow counts for one IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCount {
	pub endpoint: String,
	pub total: usize,
	pub open: usize,
	pub lingering: usize,
}

/// Frequency map from IP address to its flow counts.
#[derive(Debug, Clone, Default)]
pub struct EndpointCounter {
	counts: HashMap<String, EndpointCount>,
}

impl EndpointCounter {
	pub fn new() -> Self { Self::default() }

	/// Count one flow of the given lifecycle against `endpoint`.
	pub fn add(&mut self, endpoint: &str, lifecycle: Lifecycle) {
		let entry = self
			.counts
			.entry(endpoint.to_owned())
			.or_insert_with(|| EndpointCount {
				endpoint: endpoint.to_owned(),
				total: 0,
				open: 0,
				lingering: 0,
			});
		entry.total += 1;
		match lifecycle {
			Lifecycle::Open => entry.open += 1,
			Lifecycle::Lingering => entry.lingering += 1,
			Lifecycle::Closed => {}
		}
	}

	pub fn get(&self, endpoint: &str) -> Option<&EndpointCount> { self.counts.get(endpoint) }

	pub fn len(&self) -> usize { self.counts.len() }

	pub fn is_empty(&self) -> bool { self.counts.is_empty() }

	/// Endpoints by descending total, ties by ascending address string.
	/// `limit` keeps only the first `n` rows.
	pub fn most_common(&self, limit: Option<usize>) -> Vec<EndpointCount> {
		let mut rows: Vec<EndpointCount> = self.counts.values().cloned().collect();
		rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.endpoint.cmp(&b.endpoint)));
		if let Some(limit) = limit {
			rows.truncate(limit);
		}
		rows
	}
}

/// Aggregate view handed to the report renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
	/// Per server IP, most common first
	pub servers: Vec<EndpointCount>,
	/// Per client IP, most common first
	pub clients: Vec<EndpointCount>,
	pub total_open: usize,
	pub total_lingering: usize,
	/// Flows counted in this summary
	pub active: usize,
	/// Closed flows still held in the table (retentive mode only)
	pub retained_closed: usize,
}

/// Group connections by server IP and by client IP.
pub fn summarize<'a, I>(connections: I) -> Summary
where
	I: IntoIterator<Item = &'a Connection>,
{
	let mut servers = EndpointCounter::new();
	let mut clients = EndpointCounter::new();
	let mut summary = Summary::default();

	for connection in connections {
		let lifecycle = connection.lifecycle();
		servers.add(&connection.server().ip, lifecycle);
		clients.add(&connection.client().ip, lifecycle);
		summary.active += 1;
		match lifecycle {
			Lifecycle::Open => summary.total_open += 1,
			Lifecycle::Lingering => summary.total_lingering += 1,
			Lifecycle::Closed => {}
		}
	}

	summary.servers = servers.most_common(None);
	summary.clients = clients.most_common(None);
	summary
}
