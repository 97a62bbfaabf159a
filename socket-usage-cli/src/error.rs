//! Error types for the socket-usage binary

use snafu::prelude::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	#[snafu(display("No capture file given, usage: socket-usage [<options>] <pcapfile>"))]
	MissingInput,

	#[snafu(display("{source}"))]
	Core { source: socket_usage_core::Error },

	/// The blocking engine task panicked or was cancelled
	#[snafu(display("Capture worker failed: {source}"))]
	Worker { source: tokio::task::JoinError },

	#[snafu(display("Failed to encode report: {source}"))]
	Encode { source: serde_json::Error },
}
