use socket_usage_core::{
	EngineConfig, FlagOrder, FlowEngine, FlowIdentity, Lifecycle, PacketRecord, Retention, Transition,
};

/// Field output for a handful of flows, in tshark's default flag order
/// (syn|fin|ack|rst).
const CAPTURE: &str = "\
1|10.0.0.5|50000|10.0.0.1|80|0|1|1|0|1|0
2|10.0.0.1|80|10.0.0.5|50000|100|1|0|1|0|0
3|10.0.0.5|50000|10.0.0.1|80|1|101|0|0|1|0
4|10.0.0.6|41000|10.0.0.1|443|0|1|1|0|1|0
5|10.0.0.7|42000|10.0.0.2|22|9|9|0|0|1|0
6|10.0.0.9,10.0.0.1|80|10.0.0.5,10.0.0.2|50000|1|1|0|0|1|0
7|10.0.0.8|43000|10.0.0.1|80|0|1|1|0|1|0
8|10.0.0.8|43000|10.0.0.1|80|20|0|0|0|0|1
9|10.0.0.1|80|10.0.0.8|43000|30|0|0|0|0|1
10|garbage
";

fn records() -> Vec<PacketRecord> {
	CAPTURE
		.lines()
		.filter_map(|line| PacketRecord::parse_line(line, FlagOrder::SynFinAckRst))
		.collect()
}

fn run(config: EngineConfig) -> FlowEngine {
	let mut engine = FlowEngine::new(config);
	engine
		.consume(records().into_iter().map(Ok::<_, std::convert::Infallible>))
		.unwrap();
	engine
}

#[test]
fn test_noise_lines_are_dropped_before_the_engine() {
	assert_eq!(records().len(), 8);
}

#[test]
fn test_fin_then_ack_leaves_flow_lingering() {
	let lines = [
		"1|10.0.0.5|50000|10.0.0.1|80|0|1|1|0|1|0",
		"2|10.0.0.1|80|10.0.0.5|50000|100|1|0|1|0|0",
		"3|10.0.0.5|50000|10.0.0.1|80|1|101|0|0|1|0",
	];
	let mut engine = FlowEngine::new(EngineConfig::default());
	let transitions: Vec<Transition> = lines
		.iter()
		.map(|line| PacketRecord::parse_line(line, FlagOrder::SynFinAckRst).unwrap())
		.map(|record| engine.process(&record))
		.collect();
	assert_eq!(transitions, [Transition::Establish, Transition::Fin, Transition::AckOnly]);

	let first = PacketRecord::parse_line(lines[0], FlagOrder::SynFinAckRst).unwrap();
	let conn = engine.table().get(&FlowIdentity::of(&first)).unwrap();
	assert_eq!(conn.client().ip, "10.0.0.5");
	assert_eq!(conn.client().port, 50000);
	assert_eq!(conn.server().ip, "10.0.0.1");
	assert_eq!(conn.server().port, 80);
	assert_eq!(conn.server_side.seq, Some(100));
	assert_eq!(conn.client_side.ack, Some(101));
	assert_eq!(conn.lifecycle(), Lifecycle::Lingering);
}

#[test]
fn test_eager_mode_summary() {
	let engine = run(EngineConfig::default());
	// The reset pair on 10.0.0.8 closes and is dropped
	assert_eq!(engine.table().len(), 3);
	assert_eq!(engine.stats().removed, 1);

	let summary = engine.summary();
	assert_eq!(summary.active, 3);
	assert_eq!(summary.total_open, 2);
	assert_eq!(summary.total_lingering, 1);
	assert_eq!(summary.retained_closed, 0);

	let servers: Vec<(&str, usize, usize, usize)> = summary
		.servers
		.iter()
		.map(|row| (row.endpoint.as_str(), row.total, row.open, row.lingering))
		.collect();
	assert_eq!(servers, [("10.0.0.1", 2, 1, 1), ("10.0.0.2", 1, 1, 0)]);
}

#[test]
fn test_mid_stream_ack_uses_port_order() {
	let engine = run(EngineConfig::default());
	let record = PacketRecord::parse_line("5|10.0.0.7|42000|10.0.0.2|22|9|9|0|0|1|0", FlagOrder::SynFinAckRst).unwrap();
	let conn = engine.table().get(&FlowIdentity::of(&record)).unwrap();
	assert!(conn.is_open());
	// 42000 > 22, so the sender is the client and 10.0.0.7 is labeled client
	assert_eq!(conn.client().ip, "10.0.0.7");
	assert_eq!(conn.server().ip, "10.0.0.2");
}

#[test]
fn test_retentive_mode_reports_closed_separately() {
	let engine = run(EngineConfig::new().with_retention(Retention::Retain));
	assert_eq!(engine.table().len(), 4);
	let summary = engine.summary();
	assert_eq!(summary.active, 3);
	assert_eq!(summary.retained_closed, 1);
	assert_eq!(summary.servers[0].endpoint, "10.0.0.1");
	assert_eq!(summary.servers[0].total, 2);
	assert!(summary.clients.iter().all(|row| row.endpoint != "10.0.0.8"));
}

#[test]
fn test_replay_is_deterministic() {
	let first = run(EngineConfig::default());
	let second = run(EngineConfig::default());
	assert_eq!(first.table(), second.table());
	assert_eq!(first.summary(), second.summary());
	assert_eq!(first.stats(), second.stats());
}

#[test]
fn test_consume_stops_at_source_error() {
	let mut engine = FlowEngine::new(EngineConfig::default());
	let mut stream: Vec<Result<PacketRecord, &str>> = records().into_iter().take(2).map(Ok).collect();
	stream.push(Err("capture went away"));
	stream.extend(records().into_iter().skip(2).map(Ok));

	assert_eq!(engine.consume(stream), Err("capture went away"));
	assert_eq!(engine.stats().records, 2);
}
