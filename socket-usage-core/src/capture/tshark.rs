//! tshark subprocess record source.

use std::env;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use snafu::ResultExt;

use super::filter::build_display_filter;
use crate::config::{CaptureConfig, FlagOrder};
use crate::constants::{FIELD_SEPARATOR, TSHARK_BINARY, TSHARK_ENV, TSHARK_LOCATIONS};
use crate::error::{self, Result};
use crate::record::PacketRecord;

/// Find the tshark binary.
///
/// Checks the explicit path, then `SOCKET_USAGE_TSHARK`, then the platform's
/// usual install locations, then every `PATH` entry.
///
/// # Errors
///
/// Returns `ToolNotFound` listing every place searched
pub fn locate_tshark(explicit: Option<&Path>) -> Result<PathBuf> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(path) = explicit {
		candidates.push(path.to_path_buf());
	}
	if let Some(path) = env::var_os(TSHARK_ENV) {
		candidates.push(PathBuf::from(path));
	}
	candidates.extend(TSHARK_LOCATIONS.iter().map(PathBuf::from));
	if let Some(paths) = env::var_os("PATH") {
		candidates.extend(env::split_paths(&paths).map(|dir| dir.join(TSHARK_BINARY)));
	}

	match candidates.iter().find(|path| is_executable(path)) {
		Some(path) => {
			debug!("Using tshark at {}", path.display());
			Ok(path.clone())
		}
		None => error::ToolNotFoundSnafu {
			searched: candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
		}
		.fail(),
	}
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	path.metadata()
		.map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool { path.is_file() }

/// Build the tshark argument list for a capture.
pub fn tshark_args(config: &CaptureConfig) -> Vec<OsString> {
	let mut args: Vec<OsString> = ["-n", "-l", "-Y"].into_iter().map(OsString::from).collect();
	args.push(build_display_filter(&config.hosts, &config.ports).into());
	for arg in ["-E".to_owned(), format!("separator={FIELD_SEPARATOR}"), "-T".to_owned(), "fields".to_owned()] {
		args.push(arg.into());
	}

	let fields = [
		"frame.number",
		"ip.src",
		"ipv6.src",
		"tcp.srcport",
		"ip.dst",
		"ipv6.dst",
		"tcp.dstport",
		"tcp.seq",
		"tcp.ack",
	];
	for field in fields.into_iter().chain(config.flag_order.field_names()) {
		args.push("-e".into());
		args.push(field.into());
	}
	args.push("-r".into());
	args.push(config.input.clone().into_os_string());
	args
}

/// Records parsed from a running tshark process.
pub struct TsharkRecords {
	lines: std::io::Split<BufReader<ChildStdout>>,
	child: Arc<Mutex<Child>>,
	stopped: Arc<AtomicBool>,
	flag_order: FlagOrder,
	finished: bool,
}

impl TsharkRecords {
	/// Start tshark on the configured capture file.
	///
	/// # Errors
	///
	/// Returns `ToolNotFound` before anything runs if tshark is missing, or
	/// `ToolSpawn` if it cannot be started
	pub fn spawn(config: &CaptureConfig, stopped: Arc<AtomicBool>) -> Result<Self> {
		let path = locate_tshark(config.tshark_path.as_deref())?;
		let args = tshark_args(config);
		if config.debug {
			debug!("Tshark command: {} {:?}", path.display(), args);
		}

		let mut child = Command::new(&path)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(if config.debug { Stdio::inherit() } else { Stdio::null() })
			.spawn()
			.context(error::ToolSpawnSnafu { path: path.clone() })?;
		let Some(stdout) = child.stdout.take() else {
			let _ = child.kill();
			return Err(std::io::Error::new(ErrorKind::BrokenPipe, "no stdout pipe"))
				.context(error::ToolSpawnSnafu { path });
		};

		Ok(Self {
			lines: BufReader::new(stdout).split(b'\n'),
			child: Arc::new(Mutex::new(child)),
			stopped,
			flag_order: config.flag_order,
			finished: false,
		})
	}

	/// Shared handle to the child, used to kill it on shutdown.
	pub(crate) fn child(&self) -> Arc<Mutex<Child>> { self.child.clone() }

	fn finish(&mut self) -> Option<Result<PacketRecord>> {
		self.finished = true;
		let status = match self.child.lock().wait().context(error::CaptureReadSnafu) {
			Ok(status) => status,
			Err(e) => return Some(Err(e)),
		};
		if status.success() || self.stopped.load(Ordering::Acquire) {
			debug!("tshark finished with {}", status);
			None
		} else {
			Some(error::ToolFailedSnafu { status }.fail())
		}
	}
}

impl Iterator for TsharkRecords {
	type Item = Result<PacketRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}
		loop {
			let line = match self.lines.next() {
				Some(Ok(line)) => line,
				Some(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
				Some(Err(e)) => {
					self.finished = true;
					return Some(Err(e).context(error::CaptureReadSnafu));
				}
				None => return self.finish(),
			};
			let Ok(line) = std::str::from_utf8(&line) else {
				trace!("Skipping non UTF-8 line");
				continue;
			};
			match PacketRecord::parse_line(line, self.flag_order) {
				Some(record) => return Some(Ok(record)),
				None => trace!("Skipping line: {:?}", line),
			}
		}
	}
}

impl Drop for TsharkRecords {
	fn drop(&mut self) {
		if self.finished {
			return;
		}
		let mut child = self.child.lock();
		if let Err(e) = child.kill()
			&& e.kind() != ErrorKind::InvalidInput
		{
			warn!("Failed to stop tshark: {}", e);
		}
		let _ = child.wait();
	}
}
