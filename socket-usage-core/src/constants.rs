//! Shared constants for socket-usage
//!
//! Centralized values used by the record codec, capture sources and CLI.

/// Separator the dissection tool places between fields
pub const FIELD_SEPARATOR: char = '|';

/// Separator the dissection tool uses inside a multi-occurrence field.
/// Seeing it means the line described more than one layer (e.g. ICMP errors
/// quoting a TCP header) and is not a plain TCP segment.
pub const LIST_SEPARATOR: char = ',';

/// Number of fields before the flag fields: frame, src ip, src port,
/// dst ip, dst port, seq, ack
pub const ADDRESS_FIELD_COUNT: usize = 7;

/// Number of flag fields at the end of each record
pub const FLAG_FIELD_COUNT: usize = 4;

/// Total fields in a well-formed record
pub const RECORD_FIELD_COUNT: usize = ADDRESS_FIELD_COUNT + FLAG_FIELD_COUNT;

/// Fields in a record carrying separate IPv4 and IPv6 address columns per
/// side, as requested from tshark
pub const DUAL_STACK_RECORD_FIELD_COUNT: usize = RECORD_FIELD_COUNT + 2;

/// Base display filter every capture is restricted to
pub const BASE_DISPLAY_FILTER: &str = "tcp";

/// Environment variable naming an explicit tshark binary
pub const TSHARK_ENV: &str = "SOCKET_USAGE_TSHARK";

/// Well-known tshark install locations, checked before `PATH`
#[cfg(windows)]
pub const TSHARK_LOCATIONS: &[&str] = &[
	"C:\\Program Files\\Wireshark\\tshark.exe",
	"C:\\Program Files (x86)\\Wireshark\\tshark.exe",
];

/// Well-known tshark install locations, checked before `PATH`
#[cfg(not(windows))]
pub const TSHARK_LOCATIONS: &[&str] = &["/usr/sbin/tshark", "/usr/bin/tshark", "/usr/local/bin/tshark"];

/// tshark executable name looked up on `PATH`
#[cfg(windows)]
pub const TSHARK_BINARY: &str = "tshark.exe";

/// tshark executable name looked up on `PATH`
#[cfg(not(windows))]
pub const TSHARK_BINARY: &str = "tshark";

/// Default number of rows shown per endpoint table
pub const DEFAULT_REPORT_ROWS: usize = 10;
