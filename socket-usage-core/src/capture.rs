//! Packet record sources
//!
//! Turns a capture file into a pull-based stream of [`PacketRecord`]s,
//! either by running tshark or by reading the pcap file natively.
//!
//! ## Usage
//!
//! ```ignore
//! use socket_usage_core::capture::PacketSource;
//!
//! let source = PacketSource::open(&config)?;
//! let shutdown = source.shutdown_handle();
//! engine.consume(source)?;
//! ```

pub mod filter;
pub mod pcap;
pub mod tshark;

use std::io::ErrorKind;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::Mutex;
use snafu::ResultExt;

use crate::config::{Backend, CaptureConfig};
use crate::error::{self, Result};
use crate::record::PacketRecord;
use self::pcap::PcapRecords;
use self::tshark::TsharkRecords;

enum Inner {
	Tshark(TsharkRecords),
	Native(PcapRecords),
}

/// A stream of packet records from one capture file
pub struct PacketSource {
	inner: Inner,
	stopped: Arc<AtomicBool>,
}

impl PacketSource {
	/// Open the capture with the configured backend
	///
	/// # Errors
	///
	/// Returns `ToolNotFound` up front when the tshark backend is selected
	/// and no tshark is installed, or an open error from the native reader
	pub fn open(config: &CaptureConfig) -> Result<Self> {
		let stopped = Arc::new(AtomicBool::new(false));
		let inner = match config.backend {
			Backend::Tshark => Inner::Tshark(TsharkRecords::spawn(config, stopped.clone())?),
			Backend::Native => Inner::Native(PcapRecords::open(config, stopped.clone())?),
		};
		Ok(Self { inner, stopped })
	}

	/// Returns a shutdown handle that ends the stream early
	pub fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			stopped: self.stopped.clone(),
			child: match &self.inner {
				Inner::Tshark(records) => Some(records.child()),
				Inner::Native(_) => None,
			},
		}
	}
}

impl Iterator for PacketSource {
	type Item = Result<PacketRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		match &mut self.inner {
			Inner::Tshark(records) => records.next(),
			Inner::Native(records) => records.next(),
		}
	}
}

/// Stops a [`PacketSource`] from another thread.
///
/// After shutdown the source drains what is already buffered and then ends
/// like a normal end of file.
#[derive(Clone)]
pub struct ShutdownHandle {
	stopped: Arc<AtomicBool>,
	child: Option<Arc<Mutex<Child>>>,
}

impl ShutdownHandle {
	/// Stop the capture
	///
	/// # Errors
	///
	/// Returns an error if the tshark process could not be killed
	pub fn shutdown(&self) -> Result<()> {
		self.stopped.store(true, Ordering::Release);
		let Some(child) = &self.child else {
			return Ok(());
		};
		debug!("Stopping tshark");
		match child.lock().kill() {
			Ok(()) => Ok(()),
			// Already exited
			Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
			Err(e) => Err(e).context(error::ShutdownSnafu),
		}
	}

	pub fn is_shutdown(&self) -> bool { self.stopped.load(Ordering::Acquire) }
}
