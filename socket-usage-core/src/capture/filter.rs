//! Host and port selectors.
//!
//! Parses the `a|b` selector strings given on the command line and turns
//! them into a tshark display filter.

use std::net::IpAddr;

use snafu::ResultExt;

use crate::constants::BASE_DISPLAY_FILTER;
use crate::error::{self, Result};

/// Parse a `|` separated list of IP literals, e.g. `10.0.0.1|10.0.0.2`.
///
/// # Errors
///
/// Returns `InvalidHost` for the first value that is not an IP address
pub fn parse_hosts(value: &str) -> Result<Vec<IpAddr>> {
	selectors(value)
		.map(|host| host.parse().context(error::InvalidHostSnafu { value: host }))
		.collect()
}

/// Parse a `|` separated list of port numbers, e.g. `80|443`.
///
/// # Errors
///
/// Returns `InvalidPort` for the first value that is not a port number
pub fn parse_ports(value: &str) -> Result<Vec<u16>> {
	selectors(value)
		.map(|port| port.parse().context(error::InvalidPortSnafu { value: port }))
		.collect()
}

fn selectors(value: &str) -> impl Iterator<Item = &str> {
	value.split('|').map(str::trim).filter(|s| !s.is_empty())
}

/// Build the tshark display filter for the host and port selectors.
///
/// Hosts are OR-combined, ports are OR-combined, and both are ANDed with
/// the TCP base filter.
pub fn build_display_filter(hosts: &[IpAddr], ports: &[u16]) -> String {
	let host_filter = hosts
		.iter()
		.map(|host| match host {
			IpAddr::V4(_) => format!("ip.addr=={host}"),
			IpAddr::V6(_) => format!("ipv6.addr=={host}"),
		})
		.collect::<Vec<_>>();
	let port_filter = ports
		.iter()
		.map(|port| format!("tcp.port=={port}"))
		.collect::<Vec<_>>();

	let mut parts = vec![BASE_DISPLAY_FILTER.to_owned()];
	for group in [host_filter, port_filter] {
		if !group.is_empty() {
			parts.push(format!("({})", group.join("||")));
		}
	}
	parts.join("&&")
}
