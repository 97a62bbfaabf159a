//! # socket-usage core library
//!
//! Estimates how many TCP sockets are active in a packet capture by
//! inferring each flow's lifecycle from SYN/ACK/FIN/RST flags and
//! sequence/acknowledgment numbers. This is a rough estimate, not a TCP
//! stack: there is no window tracking, reordering or retransmission handling.
//!
//! ## Modules
//!
//! - `record` - Packet records and the textual record codec
//! - `flow` - Flow identity and client/server role assignment
//! - `connection` - Per-flow close tracking and lifecycle predicates
//! - `table` - Flow identity to connection map
//! - `engine` - Transition classification and the flow state machine
//! - `aggregate` - Per-endpoint counts for reporting
//! - `capture` - tshark and native pcap record sources
//! - `config` - Engine and capture configuration
//! - `error` - Error types and handling
//! - `constants` - Shared constants
//!
//! The engine is single threaded: it owns its flow table and processes one
//! record at a time from a stream it never rewinds.

pub mod aggregate;
pub mod capture;
pub mod config;
pub mod connection;
pub mod constants;
pub mod engine;
pub mod error;
pub mod flow;
pub mod record;
pub mod table;

pub use aggregate::{EndpointCount, EndpointCounter, Summary, summarize};
pub use capture::{PacketSource, ShutdownHandle};
pub use config::{Backend, CaptureConfig, EngineConfig, FlagOrder, Retention};
pub use connection::{Connection, Lifecycle};
pub use engine::{EngineStats, FlowEngine, Transition};
pub use error::{Error, Result};
pub use flow::{Endpoint, FlowIdentity, Role};
pub use record::{PacketRecord, TcpFlags};
pub use table::FlowTable;
