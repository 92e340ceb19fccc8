//! Tests for building and sending commands with [`CommandNode`].
//!
//! Rendering does not need a connected instrument. Everything that is sent is checked against a
//! [`LoopbackSession`] transcript.

use rstest::*;

use easyscpi::{
    CommandNode, Connection, Invocation, LoopbackBackend, LoopbackSession, Platform, Reply,
    ScpiArg, ScpiError, State,
};

const RESOURCE: &str = "ASRL/dev/ttyUSB0::INSTR";

/// A connection that is never connected, only used to render commands.
#[fixture]
fn offline() -> Connection {
    Connection::builder().backend("@loopback").build().unwrap()
}

/// Create a connected instrument. The identification query on connect is part of the transcript.
fn connected(from_host: &[&str], from_inst: &[&str]) -> Connection {
    let mut host = vec!["*IDN?"];
    host.extend_from_slice(from_host);
    let mut inst = vec!["ACME,GEN1,42,1.0"];
    inst.extend_from_slice(from_inst);

    let session = LoopbackSession::from_strs(&host, &inst, "\n");
    let backend = LoopbackBackend::new(vec![RESOURCE.to_string()], session);
    let mut conn = Connection::builder()
        .resource_manager(Box::new(backend))
        .platform(Platform::Unix)
        .port("/dev/ttyUSB0")
        .build()
        .unwrap();
    conn.connect().unwrap();
    conn
}

#[rstest]
#[case(&["freq"], "FREQ")]
#[case(&["FREQ"], "FREQ")]
#[case(&["sour", "freq"], "SOUR:FREQ")]
#[case(&["Sour", "Volt", "Lev", "Imm", "Ampl"], "SOUR:VOLT:LEV:IMM:AMPL")]
#[case(&["*idn"], "*IDN")]
fn path_is_uppercased_and_joined(
    offline: Connection,
    #[case] names: &[&str],
    #[case] exp: &str,
) {
    let mut node = offline.node(names[0]);
    for name in &names[1..] {
        node = node.node(name);
    }
    assert_eq!(node.path(), exp);
    assert_eq!(node.command(), exp);
}

#[rstest]
fn path_is_case_insensitive(offline: Connection) {
    let lower = offline.node("sour").node("freq");
    let upper = offline.node("SOUR").node("FREQ");
    assert_eq!(lower.command(), upper.command());
}

#[rstest]
#[case("sour:freq", "SOUR:FREQ")]
#[case(":sour:freq", "SOUR:FREQ")]
#[case("sour::freq:", "SOUR:FREQ")]
fn path_node_splits_segments(offline: Connection, #[case] path: &str, #[case] exp: &str) {
    assert_eq!(offline.path_node(path).path(), exp);
    assert_eq!(offline.node("outp").path_node(path).path(), format!("OUTP:{exp}"));
}

#[rstest]
fn nodes_are_immutable(offline: Connection) {
    let sour = offline.node("sour");
    let freq = sour.node("freq");
    let volt = sour.node("volt");
    assert_eq!(sour.path(), "SOUR");
    assert_eq!(freq.path(), "SOUR:FREQ");
    assert_eq!(volt.path(), "SOUR:VOLT");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn prefix_at_any_depth(mut offline: Connection, #[case] depth: usize) {
    offline.set_prefix_commands(true);
    let mut node = offline.node("a");
    for _ in 1..depth {
        node = node.node("b");
    }
    let cmd = node.command();
    assert!(node.is_prefixed());
    assert!(cmd.starts_with(':'));
    assert!(!cmd.starts_with("::"));
    assert_eq!(cmd.trim_start_matches(':'), node.path());
}

#[rstest]
fn no_prefix_by_default(offline: Connection) {
    let node = offline.node("sour").node("freq");
    assert!(!node.is_prefixed());
    assert_eq!(node.command(), "SOUR:FREQ");
}

#[rstest]
fn render_invocations(offline: Connection) {
    let node = offline.node("sour").node("freq");
    assert_eq!(node.render(&Invocation::Query), "SOUR:FREQ?");
    assert_eq!(node.render(&Invocation::Execute), "SOUR:FREQ");
    assert_eq!(
        node.render(&Invocation::Write(vec!["1".into(), "2".into()])),
        "SOUR:FREQ 1,2"
    );
    assert_eq!(
        node.render(&Invocation::QueryWith(vec!["MAX".into()])),
        "SOUR:FREQ? MAX"
    );
}

#[rstest]
fn render_with_custom_separator(mut offline: Connection) {
    offline.set_arg_separator(";");
    let node = offline.node("list");
    assert_eq!(
        node.render(&Invocation::from_args(&[&1, &2.5, &"A"], false)),
        "LIST 1;2.5;A"
    );
}

#[rstest]
fn render_extreme_floats(offline: Connection) {
    let node = offline.node("volt");
    assert_eq!(
        node.render(&Invocation::from_args(&[&1e-30], false)),
        "VOLT 1e-30"
    );
    assert_eq!(
        node.render(&Invocation::from_args(&[&1e300, &0.5], false)),
        "VOLT 1e300,0.5"
    );
}

#[rstest]
fn invocation_from_args() {
    assert_eq!(Invocation::from_args(&[], false), Invocation::Query);
    assert_eq!(Invocation::from_args(&[], true), Invocation::Query);
    assert_eq!(
        Invocation::from_args(&[&true, &3], false),
        Invocation::Write(vec!["ON".to_string(), "3".to_string()])
    );
    assert_eq!(
        Invocation::from_args(&[&"MIN"], true),
        Invocation::QueryWith(vec!["MIN".to_string()])
    );
    assert!(Invocation::Query.is_query());
    assert!(!Invocation::Execute.is_query());
}

#[rstest]
fn call_query_and_write() {
    let conn = connected(&["SOUR:FREQ?", "SOUR:FREQ 1000"], &["100.00"]);
    let freq = conn.node("sour").node("freq");

    assert_eq!(
        freq.call(Invocation::Query).unwrap(),
        Reply::Response("100.00".to_string())
    );
    let reply = freq.call_with(&[&1000], false).unwrap();
    assert_eq!(reply, Reply::Ack("SOUR:FREQ 1000\n".len()));
    assert_eq!(reply.into_response(), None);
}

#[rstest]
fn shorthands() {
    let conn = connected(
        &["OUTP?", "OUTP OFF", "VOLT? MAX", "*RST", "CURR 1.5,2"],
        &["ON", "30.0"],
    );

    let outp = conn.node("outp");
    assert_eq!(outp.query().unwrap(), "ON");
    outp.write(&[&State::Off]).unwrap();
    assert_eq!(conn.node("volt").query_with(&[&"MAX"]).unwrap(), "30.0");
    conn.node("*rst").execute().unwrap();
    conn.node("curr").write(&[&1.5, &2]).unwrap();
}

#[rstest]
fn write_without_args_executes() {
    let conn = connected(&["INIT:IMM"], &[]);
    let written = conn.node("init").node("imm").write(&[]).unwrap();
    assert_eq!(written, "INIT:IMM\n".len());
}

#[rstest]
fn prefixed_commands_on_the_wire() {
    let mut conn = connected(&[":SOUR:FREQ?"], &["1.00"]);
    conn.set_prefix_commands(true);
    assert_eq!(conn.path_node("sour:freq").query().unwrap(), "1.00");
}

#[rstest]
fn custom_arguments() {
    enum Coupling {
        Dc,
    }

    impl ScpiArg for Coupling {
        fn to_scpi(&self) -> String {
            match self {
                Coupling::Dc => "DC".to_string(),
            }
        }
    }

    let conn = connected(&["INP:COUP DC"], &[]);
    conn.node("inp").node("coup").write(&[&Coupling::Dc]).unwrap();
}

#[rstest]
fn errors_surface_unchanged(offline: Connection) {
    let node: CommandNode<'_> = offline.node("freq");
    assert!(matches!(
        node.query(),
        Err(ScpiError::NotConnected { operation: "query" })
    ));
    assert!(matches!(
        node.write(&[&1]),
        Err(ScpiError::NotConnected { operation: "write" })
    ));
}
