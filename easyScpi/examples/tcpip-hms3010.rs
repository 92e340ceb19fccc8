use std::time::Duration;

use easyscpi::Connection;

fn main() {
    env_logger::init();

    let ip = "192.108.0.220";
    let port = 50000;

    // Sockets can not be discovered, so the resource id is taken as given.
    let mut inst = Connection::builder()
        .port(&format!("TCPIP::{ip}::{port}::SOCKET"))
        .port_match(false)
        .resource_param("read_termination", "\n")
        .resource_param("write_termination", "\n")
        .resource_param("timeout", Duration::from_secs(5))
        .build()
        .unwrap();

    // Connect to the spectrum analyzer, this also identifies it.
    inst.connect().expect("Instrument must be reachable.");
    println!("Connected to: {}", inst.identity().unwrap_or("unknown"));

    // Switch to receiver mode and use the average detector
    inst.node("system").node("mode").write(&[&"RMODe"]).unwrap();
    inst.node("rmode").node("detector").write(&[&"AVG"]).unwrap();

    // Plain queries work as well
    println!("Receiver level: {}", inst.query("RMODe:LEVel?").unwrap());

    // Nodes can be kept around as shorthand
    let freq = inst.path_node("rmode:frequency");
    freq.write(&[&100e6]).unwrap();
    println!("Receiver frequency: {}", freq.query().unwrap());

    inst.disconnect().unwrap();
}
