//! Report rendering for the end of a run.
//!
//! The text layout puts the server table beside the client table, one
//! endpoint per row, most common first.

use serde::Serialize;
use snafu::ResultExt;
use socket_usage_core::{EndpointCount, EngineStats, Summary};

use crate::error::{self, Result};

const ENDPOINT_WIDTH: usize = 15;
const GAP: &str = "     ";
const TRUNCATED: &str = "...truncated...";

/// Output options.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
	/// Rows shown per table
	pub top: usize,
	/// Show the retained closed count
	pub retained: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
	servers: &'a [EndpointCount],
	clients: &'a [EndpointCount],
	truncated: bool,
	total_open: usize,
	total_lingering: usize,
	active: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	retained_closed: Option<usize>,
	stats: &'a EngineStats,
}

fn is_truncated(summary: &Summary, top: usize) -> bool { summary.servers.len() > top || summary.clients.len() > top }

fn head(rows: &[EndpointCount], top: usize) -> &[EndpointCount] { &rows[..rows.len().min(top)] }

fn columns(row: Option<&EndpointCount>) -> String {
	match row {
		Some(row) => format!(
			"{:>width$} {:>5} {:>5} {:>6}",
			row.endpoint,
			row.total,
			row.open,
			row.lingering,
			width = ENDPOINT_WIDTH
		),
		None => format!("{:width$} {:5} {:5} {:6}", "", "", "", "", width = ENDPOINT_WIDTH),
	}
}

/// Render the side-by-side text report.
pub fn render_text(summary: &Summary, options: ReportOptions) -> String {
	let servers = head(&summary.servers, options.top);
	let clients = head(&summary.clients, options.top);

	let header = format!(
		"{:<width$} {:>5} {:>5} {:>6}{GAP}{:<width$} {:>5} {:>5} {:>6}",
		"Server IP",
		"Qty",
		"Open",
		"Linger",
		"Client IP",
		"Qty",
		"Open",
		"Linger",
		width = ENDPOINT_WIDTH
	);

	let rule = "-".repeat(header.len());
	let mut lines = vec![String::new(), header, rule];
	for i in 0..servers.len().max(clients.len()) {
		let line = format!("{}{GAP}{}", columns(servers.get(i)), columns(clients.get(i)));
		lines.push(line.trim_end().to_owned());
	}
	if is_truncated(summary, options.top) {
		lines.push(TRUNCATED.to_owned());
	}

	lines.push(String::new());
	lines.push(format!("Total no. of active sockets: {}", summary.active));
	lines.push(format!("  open:      {}", summary.total_open));
	lines.push(format!("  lingering: {}", summary.total_lingering));
	if options.retained {
		lines.push(format!("Closed sockets retained: {}", summary.retained_closed));
	}
	lines.push(String::new());
	lines.join("\n")
}

/// Render the report as a JSON document.
///
/// # Errors
///
/// Returns an error if serialization fails
pub fn render_json(summary: &Summary, stats: &EngineStats, options: ReportOptions) -> Result<String> {
	let report = JsonReport {
		servers: head(&summary.servers, options.top),
		clients: head(&summary.clients, options.top),
		truncated: is_truncated(summary, options.top),
		total_open: summary.total_open,
		total_lingering: summary.total_lingering,
		active: summary.active,
		retained_closed: options.retained.then_some(summary.retained_closed),
		stats,
	};
	serde_json::to_string_pretty(&report).context(error::EncodeSnafu)
}
