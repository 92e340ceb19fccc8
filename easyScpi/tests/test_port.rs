//! Tests for the port policies and resource matching.

use rstest::*;

use easyscpi::{
    Platform, PortPolicy, ResourcePattern, ScpiError, UnixPolicy, WindowsPolicy, match_resource,
};

fn same(pattern: &str) -> ResourcePattern {
    ResourcePattern {
        pattern: pattern.to_string(),
        literal: pattern.to_string(),
    }
}

#[rstest]
#[case("/dev/ttyUSB0", "ASRL/dev/ttyUSB0::INSTR")]
#[case("ttyUSB0", "ASRL/ttyUSB0::INSTR")]
#[case("ASRL/dev/ttyUSB0", "ASRL/dev/ttyUSB0::INSTR")]
#[case("ASRL/dev/ttyUSB0::INSTR", "ASRL/dev/ttyUSB0::INSTR")]
#[case("TCPIP::192.168.0.2::5025::SOCKET", "TCPIP::192.168.0.2::5025::SOCKET")]
#[case("tcpip0::10.0.0.1::inst0::INSTR", "tcpip0::10.0.0.1::inst0::INSTR")]
#[case("USB0::0x1AB1::0x04CE", "USB0::0x1AB1::0x04CE::.*::INSTR")]
#[case("GPIB0::12", "GPIB0::12::.*::INSTR")]
fn unix_policy(#[case] port: &str, #[case] exp: &str) {
    assert_eq!(UnixPolicy.resource_pattern(port).unwrap(), same(exp));
}

#[rstest]
#[case("COM3", "ASRL((?:COM)?3)::INSTR", "ASRL3::INSTR")]
#[case("com15", "ASRL((?:COM)?15)::INSTR", "ASRL15::INSTR")]
#[case("TCPIP::192.168.0.2::5025::SOCKET", "TCPIP::192.168.0.2::5025::SOCKET", "TCPIP::192.168.0.2::5025::SOCKET")]
#[case("GPIB0::12", "GPIB0::12::.*::INSTR", "GPIB0::12::.*::INSTR")]
fn windows_policy(#[case] port: &str, #[case] pattern: &str, #[case] literal: &str) {
    let exp = ResourcePattern {
        pattern: pattern.to_string(),
        literal: literal.to_string(),
    };
    assert_eq!(WindowsPolicy.resource_pattern(port).unwrap(), exp);
}

#[rstest]
#[case("/dev/ttyUSB0")]
#[case("ASRL3::INSTR")]
#[case("LPT1")]
#[case("")]
fn windows_policy_rejects(#[case] port: &str) {
    match WindowsPolicy.resource_pattern(port) {
        Err(ScpiError::InvalidPort {
            port: got,
            expected,
        }) => {
            assert_eq!(got, port);
            assert_eq!(expected, ["COM", "USB", "GPIB", "TCPIP"]);
        }
        other => panic!("Expected an invalid port, got {other:?}"),
    }
}

#[rstest]
fn platform_policies() {
    assert_eq!(
        Platform::Unix.policy().resource_pattern("ttyS0").unwrap(),
        same("ASRL/ttyS0::INSTR")
    );
    assert!(Platform::Windows.policy().resource_pattern("ttyS0").is_err());
    assert_eq!(Platform::default(), Platform::host());
}

#[rstest]
#[case("ASRL((?:COM)?3)::INSTR", "ASRL3::INSTR")]
#[case("ASRL((?:COM)?4)::INSTR", "ASRLCOM4::INSTR")]
#[case("asrl/dev/ttyusb0::instr", "ASRL/dev/ttyUSB0::INSTR")]
#[case("USB0::0x1AB1::.*::INSTR", "USB0::0x1AB1::0x04CE::DS1ZA::INSTR")]
fn match_exactly_one(#[case] pattern: &str, #[case] exp: &str) {
    let resources: Vec<String> = [
        "ASRL3::INSTR",
        "ASRLCOM4::INSTR",
        "ASRL/dev/ttyUSB0::INSTR",
        "USB0::0x1AB1::0x04CE::DS1ZA::INSTR",
        "USB0::0x0957::0x1798::MY001::INSTR",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect();
    assert_eq!(match_resource(pattern, &resources).unwrap(), exp);
}

#[rstest]
fn match_is_anchored_at_start() {
    let resources = vec!["TCPIP::10.0.0.1::INSTR".to_string()];
    assert!(matches!(
        match_resource("10.0.0.1", &resources),
        Err(ScpiError::ResourceNotFound(_))
    ));
}

#[rstest]
fn match_ambiguous_lists_candidates() {
    let resources = vec![
        "ASRL1::INSTR".to_string(),
        "ASRL10::INSTR".to_string(),
        "ASRL11::INSTR".to_string(),
    ];
    match match_resource("ASRL1.*", &resources) {
        Err(ScpiError::AmbiguousResource { pattern, matches }) => {
            assert_eq!(pattern, "ASRL1.*");
            assert_eq!(matches, resources);
        }
        other => panic!("Expected an ambiguous match, got {other:?}"),
    }
}

#[rstest]
fn match_nothing_visible() {
    assert!(matches!(
        match_resource("ASRL3::INSTR", &[]),
        Err(ScpiError::ResourceNotFound(_))
    ));
}
