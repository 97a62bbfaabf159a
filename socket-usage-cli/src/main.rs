//! Estimate the number of active TCP sockets in a packet capture.

mod error;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use log::{debug, info};
use logforth::filter::env_filter::EnvFilterBuilder;
use snafu::ResultExt;
use socket_usage_core::capture::filter::{parse_hosts, parse_ports};
use socket_usage_core::constants::DEFAULT_REPORT_ROWS;
use socket_usage_core::{Backend, CaptureConfig, EngineConfig, FlowEngine, PacketSource, Retention};

use crate::error::Result;
use crate::report::ReportOptions;

#[derive(FromArgs)]
/// Estimate the number of active TCP sockets in a pcap file.
struct Args {
	/// host filter, if multiple separate them with "|"
	#[argh(option, default = "String::new()")]
	hosts: String,

	/// port filter, if multiple separate them with "|"
	#[argh(option, default = "String::new()")]
	ports: String,

	/// enable debug output
	#[argh(switch, short = 'd')]
	debug: bool,

	/// show version and exit
	#[argh(switch, short = 'v')]
	version: bool,

	/// keep closed connections for the run and report them separately
	#[argh(switch)]
	retain: bool,

	/// do not fill in a missing close sequence from a RST
	#[argh(switch)]
	no_rst_backfill: bool,

	/// read the pcap file directly instead of running tshark
	#[argh(switch)]
	native: bool,

	/// path to the tshark binary
	#[argh(option)]
	tshark: Option<PathBuf>,

	/// rows shown per table
	#[argh(option, default = "DEFAULT_REPORT_ROWS")]
	top: usize,

	/// print the report as JSON
	#[argh(switch)]
	json: bool,

	/// capture file
	#[argh(positional)]
	pcapfile: Option<PathBuf>,
}

impl Args {
	fn engine_config(&self) -> EngineConfig {
		let retention = if self.retain { Retention::Retain } else { Retention::Eager };
		EngineConfig::new()
			.with_retention(retention)
			.with_rst_backfill(!self.no_rst_backfill)
			.with_debug(self.debug)
	}

	fn capture_config(&self, input: PathBuf) -> Result<CaptureConfig> {
		let backend = if self.native { Backend::Native } else { Backend::Tshark };
		Ok(CaptureConfig::new(input)
			.with_hosts(parse_hosts(&self.hosts).context(error::CoreSnafu)?)
			.with_ports(parse_ports(&self.ports).context(error::CoreSnafu)?)
			.with_backend(backend)
			.with_tshark_path(self.tshark.clone())
			.with_debug(self.debug))
	}
}

/// Log filter used when `RUST_LOG` is not set
fn default_log_filter(debug: bool) -> &'static str { if debug { "debug" } else { "info" } }

#[tokio::main]
async fn main() -> ExitCode {
	let args: Args = argh::from_env();
	if args.version {
		println!("v{}", env!("CARGO_PKG_VERSION"));
		return ExitCode::SUCCESS;
	}

	let filter = EnvFilterBuilder::from_default_env_or(default_log_filter(args.debug)).build();
	if let Err(e) = logforth::starter_log::stderr().filter(filter).try_apply() {
		eprintln!("Failed to set up logging: {e}");
	}

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			debug!("{e:?}");
			eprintln!("ERROR: {e}");
			ExitCode::FAILURE
		}
	}
}

async fn run(args: Args) -> Result<()> {
	let Some(input) = args.pcapfile.clone() else {
		return error::MissingInputSnafu.fail();
	};
	let capture = args.capture_config(input)?;
	let engine_config = args.engine_config();

	let source = PacketSource::open(&capture).context(error::CoreSnafu)?;
	let shutdown = source.shutdown_handle();

	let mut worker = tokio::task::spawn_blocking(move || {
		let mut engine = FlowEngine::new(engine_config);
		let result = engine.consume(source);
		(engine, result)
	});

	let (engine, result) = tokio::select! {
		joined = &mut worker => joined.context(error::WorkerSnafu)?,
		Ok(()) = tokio::signal::ctrl_c() => {
			info!("Ctrl-C received, summarizing what was read so far");
			shutdown.shutdown().context(error::CoreSnafu)?;
			worker.await.context(error::WorkerSnafu)?
		}
	};
	result.context(error::CoreSnafu)?;

	let summary = engine.summary();
	let options = ReportOptions {
		top: args.top,
		retained: args.retain,
	};
	if args.json {
		println!("{}", report::render_json(&summary, engine.stats(), options)?);
	} else {
		print!("{}", report::render_text(&summary, options));
	}
	Ok(())
}
