//! Tests for the conversion of values into SCPI tokens.

use rstest::*;

use easyscpi::{BoolLike, ErrorKind, ScpiArg, ScpiError, State, to_bool, to_state};

#[rstest]
#[case("on", true)]
#[case("ON", true)]
#[case("1", true)]
#[case("Off", false)]
#[case("0", false)]
fn bool_from_str(#[case] input: &str, #[case] exp: bool) {
    assert_eq!(to_bool(input).unwrap(), exp);
    assert_eq!(to_bool(input.to_string()).unwrap(), exp);
}

#[rstest]
#[case("yes")]
#[case("true")]
#[case("")]
#[case("2")]
fn bool_from_invalid_str(#[case] input: &str) {
    let err = to_bool(input).unwrap_err();
    assert!(matches!(&err, ScpiError::InvalidBool(val) if val == input));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[rstest]
fn bool_from_native() {
    assert!(to_bool(true).unwrap());
    assert!(!to_bool(false).unwrap());
    assert!(to_bool(1u8).unwrap());
    assert!(!to_bool(0i64).unwrap());
    assert!(to_bool(State::On).unwrap());
    assert!(matches!(to_bool(2), Err(ScpiError::InvalidBool(_))));
    assert!(matches!(to_bool(-1), Err(ScpiError::InvalidBool(_))));
}

#[rstest]
#[case("on", State::On)]
#[case("0", State::Off)]
fn state_from_str(#[case] input: &str, #[case] exp: State) {
    assert_eq!(to_state(input).unwrap(), exp);
}

#[rstest]
fn state_tokens() {
    assert_eq!(to_state(true).unwrap().to_string(), "ON");
    assert_eq!(to_state(0).unwrap().to_string(), "OFF");
    assert!(State::On.is_on());
    assert!(!State::from(false).is_on());
    assert!(to_state("maybe").is_err());
}

#[rstest]
fn bool_like_as_trait_object() {
    let inputs: [&dyn BoolLike; 3] = [&"off", &true, &1u16];
    let states: Vec<bool> = inputs.iter().map(|b| b.to_bool().unwrap()).collect();
    assert_eq!(states, [false, true, true]);
}

#[rstest]
#[case(&1, "1")]
#[case(&-42i64, "-42")]
#[case(&1.0, "1")]
#[case(&2.5f32, "2.5")]
#[case(&0.1, "0.1")]
#[case(&1e-9, "1e-9")]
#[case(&1e-20, "1e-20")]
#[case(&1e300, "1e300")]
#[case(&-2.5e16, "-2.5e16")]
#[case(&1e15, "1000000000000000")]
#[case(&0.0001, "0.0001")]
#[case(&f64::MAX, "1.7976931348623157e308")]
#[case(&true, "ON")]
#[case(&false, "OFF")]
#[case(&State::Off, "OFF")]
#[case(&'A', "A")]
#[case(&"MAX", "MAX")]
fn scpi_tokens(#[case] arg: &dyn ScpiArg, #[case] exp: &str) {
    assert_eq!(arg.to_scpi(), exp);
}

#[rstest]
#[case(0.1 + 0.2)]
#[case(1.0 / 3.0)]
#[case(f64::MAX)]
#[case(f64::MIN_POSITIVE)]
#[case(5e-324)]
#[case(-0.0)]
fn float_tokens_are_stable(#[case] value: f64) {
    let first = value.to_scpi();
    for _ in 0..3 {
        assert_eq!(value.to_scpi(), first);
    }
    assert_eq!(first.parse::<f64>().unwrap(), value);
    assert!(first.len() <= 24);
}
