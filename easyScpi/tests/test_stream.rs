//! Tests for sessions on byte streams: an in-memory port and a TCP/IP socket on localhost.

use std::{
    collections::VecDeque,
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread,
    time::Duration,
};

use rstest::*;

use easyscpi::{
    Connection, ResourceManager, ResourceParam, ScpiError, Session, StreamBackend, StreamSession,
};

/// A session on an in-memory port: everything written can be read back.
#[fixture]
fn echo() -> StreamSession<VecDeque<u8>> {
    StreamSession::from_port("LOOP::INSTR", VecDeque::new(), |_| Ok(VecDeque::new()))
}

#[rstest]
fn echo_write_read(mut echo: StreamSession<VecDeque<u8>>) {
    assert_eq!(echo.resource_id(), "LOOP::INSTR");
    assert_eq!(echo.write("*IDN?").unwrap(), 6);
    assert_eq!(echo.read().unwrap(), "*IDN?");
}

#[rstest]
fn echo_terminations(mut echo: StreamSession<VecDeque<u8>>) {
    echo.set_attribute("write_termination", &"\r\n".into())
        .unwrap();
    echo.set_attribute("read_termination", &"\r\n".into())
        .unwrap();
    assert_eq!(echo.attributes().write_termination, "\r\n");

    echo.write_raw(b"A\nB\r\n").unwrap();
    assert_eq!(echo.read().unwrap(), "A\nB");
    assert_eq!(echo.query("VOLT?").unwrap(), "VOLT?");
}

#[rstest]
fn echo_skips_invalid_utf8(mut echo: StreamSession<VecDeque<u8>>) {
    echo.write_raw(&[b'O', 0xFF, b'K', b'\n']).unwrap();
    assert_eq!(echo.read().unwrap(), "OK");
}

#[rstest]
fn echo_keeps_replacement_character(mut echo: StreamSession<VecDeque<u8>>) {
    let mut data = "A\u{FFFD}B".as_bytes().to_vec();
    data.extend_from_slice(&[0xC3, b'C', b'\n']);
    echo.write_raw(&data).unwrap();
    assert_eq!(echo.read().unwrap(), "A\u{FFFD}BC");
}

#[rstest]
fn echo_timeout(mut echo: StreamSession<VecDeque<u8>>) {
    echo.set_attribute("timeout", &ResourceParam::Int(0)).unwrap();
    match echo.read() {
        Err(ScpiError::Timeout(timeout)) => assert_eq!(timeout, Duration::ZERO),
        other => panic!("Expected timeout error, but got {other:?}"),
    }
}

#[rstest]
fn echo_missing_terminator(mut echo: StreamSession<VecDeque<u8>>) {
    echo.write_raw(b"partial").unwrap();
    assert!(matches!(echo.read(), Err(ScpiError::Io(_))));
}

#[rstest]
fn echo_unsupported_option(mut echo: StreamSession<VecDeque<u8>>) {
    assert!(matches!(
        echo.set_attribute("baud_rate", &ResourceParam::Int(9600)),
        Err(ScpiError::UnsupportedParameter(_))
    ));
    assert!(matches!(
        echo.set_attribute("timeout", &"soon".into()),
        Err(ScpiError::InvalidParameter { .. })
    ));
}

#[rstest]
fn echo_close_and_reopen(mut echo: StreamSession<VecDeque<u8>>) {
    echo.write_raw(b"stale").unwrap();
    echo.close().unwrap();
    assert!(!echo.is_live().unwrap());
    assert!(matches!(
        echo.write("*RST"),
        Err(ScpiError::NotConnected { operation: "write" })
    ));

    echo.reopen().unwrap();
    assert!(echo.is_live().unwrap());
    assert_eq!(echo.query("*RST").unwrap(), "*RST");
}

#[rstest]
#[case("USB0::0x1AB1::0x04CE::DS1ZA::INSTR")]
#[case("GPIB0::12::INSTR")]
fn backend_rejects_unsupported(#[case] rid: &str) {
    let mut backend = StreamBackend::default();
    assert!(matches!(
        backend.open_resource(rid),
        Err(ScpiError::UnsupportedResource(_))
    ));
}

#[cfg(not(feature = "serial"))]
#[rstest]
fn backend_without_serial() {
    let mut backend = StreamBackend::default();
    assert!(backend.list_resources().unwrap().is_empty());
    assert!(matches!(
        backend.open_resource("ASRL/dev/ttyUSB0::INSTR"),
        Err(ScpiError::UnsupportedResource(_))
    ));
}

/// Answer each line received on one connection until the host hangs up.
fn serve_one(listener: TcpListener) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut received = Vec::new();
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            let reply = match line.as_str() {
                "*IDN?" => Some("ACME,SOCK,1,1.0"),
                "MEAS:VOLT?" => Some("1.5"),
                _ => None,
            };
            if let Some(reply) = reply {
                writer.write_all(format!("{reply}\n").as_bytes()).unwrap();
            }
            received.push(line);
        }
        received
    })
}

#[rstest]
fn tcp_socket_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = serve_one(listener);

    {
        let mut inst = Connection::builder()
            .port(&format!("TCPIP::127.0.0.1::{port}::SOCKET"))
            .port_match(false)
            .resource_param("timeout", Duration::from_secs(2))
            .build()
            .unwrap();
        inst.connect().unwrap();
        assert_eq!(inst.identity(), Some("ACME,SOCK,1,1.0"));
        assert_eq!(inst.node("meas").node("volt").query().unwrap(), "1.5");
        inst.node("volt").write(&[&2.5]).unwrap();
    }

    let received = server.join().unwrap();
    assert_eq!(received, ["*IDN?", "MEAS:VOLT?", "VOLT 2.5"]);
}
