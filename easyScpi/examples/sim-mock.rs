use easyscpi::{Connection, Handshake, to_state};

fn main() {
    env_logger::init();

    // The simulated backend hosts a mock instrument, no hardware required.
    let mut inst = Connection::builder()
        .backend("@sim")
        .port("TCPIP::0.0.0.1::3000::SOCKET")
        .port_match(false)
        .build()
        .unwrap();

    {
        // Disconnects when the guard goes out of scope.
        let inst = inst.scoped().unwrap();
        println!("Instrument: {}", inst.id().unwrap());

        let freq = inst.node("freq");
        println!("Frequency: {}", freq.query().unwrap());

        // The mock acknowledges every set with "OK"
        freq.write(&[&1.0]).unwrap();
        println!("Set acknowledged with: {}", inst.read().unwrap());
        println!("Frequency after set: {}", freq.query().unwrap());

        // Out of range values are refused
        println!("Setting 0 Hz: {}", inst.query("FREQ 0").unwrap());
    }

    // Treat the acknowledgement of sets as a handshake instead of reading it by hand.
    inst.connect().unwrap();
    inst.set_handshake(Handshake::from(true));
    inst.node("freq").write(&[&2500]).unwrap();
    inst.set_handshake(Handshake::Disabled);
    println!("Frequency after handshake: {}", inst.node("freq").query().unwrap());

    println!("State for user input \"1\": {}", to_state("1").unwrap());
}
