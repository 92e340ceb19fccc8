//! Conversion of Rust values into the tokens that end up in a SCPI command.
//!
//! Every argument that is passed to a [`crate::CommandNode`] is rendered with the [`ScpiArg`]
//! trait. The rendering is pure, so the same value always produces the same token.
//!
//! Furthermore, this module contains the helpers to normalize loosely typed on/off values, e.g.,
//! user input, into a [`State`].

use std::fmt;

use crate::ScpiError;

/// A value that can be used as an argument of a SCPI command.
///
/// Implement this trait for your own enums in order to pass their enumerated token directly:
///
/// ```
/// use easyscpi::ScpiArg;
///
/// enum Coupling {
///     Ac,
///     Dc,
/// }
///
/// impl ScpiArg for Coupling {
///     fn to_scpi(&self) -> String {
///         match self {
///             Coupling::Ac => "AC".to_string(),
///             Coupling::Dc => "DC".to_string(),
///         }
///     }
/// }
///
/// assert_eq!(Coupling::Dc.to_scpi(), "DC");
/// ```
pub trait ScpiArg {
    /// Render the value as it should appear in the command string.
    fn to_scpi(&self) -> String;
}

impl<T: ScpiArg + ?Sized> ScpiArg for &T {
    fn to_scpi(&self) -> String {
        (**self).to_scpi()
    }
}

impl ScpiArg for str {
    fn to_scpi(&self) -> String {
        self.to_string()
    }
}

impl ScpiArg for String {
    fn to_scpi(&self) -> String {
        self.clone()
    }
}

impl ScpiArg for char {
    fn to_scpi(&self) -> String {
        self.to_string()
    }
}

/// Booleans are sent as `ON`/`OFF`.
impl ScpiArg for bool {
    fn to_scpi(&self) -> String {
        State::from(*self).to_string()
    }
}

macro_rules! display_arg {
    ($($t:ty),*) => {
        $(
            impl ScpiArg for $t {
                fn to_scpi(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_arg!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize
);

// Floats use the shortest representation that round-trips, e.g., `1.0` renders as `1`. Very
// large and very small magnitudes switch to exponent notation, e.g., `1e-20`.
macro_rules! float_arg {
    ($($t:ty),*) => {
        $(
            impl ScpiArg for $t {
                fn to_scpi(&self) -> String {
                    let magnitude = self.abs();
                    if magnitude != 0.0 && (magnitude >= 1e16 || magnitude < 1e-4) {
                        format!("{self:e}")
                    } else {
                        self.to_string()
                    }
                }
            }
        )*
    };
}

float_arg!(f32, f64);

/// SCPI on/off state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// `ON`
    On,
    /// `OFF`
    Off,
}

impl State {
    /// Returns `true` for [`State::On`].
    pub fn is_on(self) -> bool {
        self == State::On
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        if value { State::On } else { State::Off }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::On => write!(f, "ON"),
            State::Off => write!(f, "OFF"),
        }
    }
}

impl ScpiArg for State {
    fn to_scpi(&self) -> String {
        self.to_string()
    }
}

/// A value that can be interpreted as a boolean.
///
/// Accepted are:
/// - `true`: `"on"`, `"1"` (case-insensitive), `true`, `1`
/// - `false`: `"off"`, `"0"` (case-insensitive), `false`, `0`
///
/// Anything else is rejected with [`ScpiError::InvalidBool`].
pub trait BoolLike {
    /// Try to interpret the value as a boolean.
    fn to_bool(&self) -> Result<bool, ScpiError>;
}

impl<T: BoolLike + ?Sized> BoolLike for &T {
    fn to_bool(&self) -> Result<bool, ScpiError> {
        (**self).to_bool()
    }
}

impl BoolLike for bool {
    fn to_bool(&self) -> Result<bool, ScpiError> {
        Ok(*self)
    }
}

impl BoolLike for str {
    fn to_bool(&self) -> Result<bool, ScpiError> {
        match self.to_lowercase().as_str() {
            "on" | "1" => Ok(true),
            "off" | "0" => Ok(false),
            _ => Err(ScpiError::InvalidBool(self.to_string())),
        }
    }
}

impl BoolLike for String {
    fn to_bool(&self) -> Result<bool, ScpiError> {
        self.as_str().to_bool()
    }
}

impl BoolLike for State {
    fn to_bool(&self) -> Result<bool, ScpiError> {
        Ok(self.is_on())
    }
}

macro_rules! int_bool {
    ($($t:ty),*) => {
        $(
            impl BoolLike for $t {
                fn to_bool(&self) -> Result<bool, ScpiError> {
                    match *self {
                        0 => Ok(false),
                        1 => Ok(true),
                        _ => Err(ScpiError::InvalidBool(self.to_string())),
                    }
                }
            }
        )*
    };
}

int_bool!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Convert a boolean-like value into a `bool`.
///
/// # Example
/// ```
/// use easyscpi::to_bool;
///
/// assert!(to_bool("ON").unwrap());
/// assert!(!to_bool(0).unwrap());
/// assert!(to_bool("maybe").is_err());
/// ```
pub fn to_bool<T: BoolLike>(value: T) -> Result<bool, ScpiError> {
    value.to_bool()
}

/// Convert a boolean-like value into a SCPI [`State`].
///
/// # Example
/// ```
/// use easyscpi::{State, to_state};
///
/// assert_eq!(to_state("1").unwrap(), State::On);
/// assert_eq!(to_state(false).unwrap().to_string(), "OFF");
/// ```
pub fn to_state<T: BoolLike>(value: T) -> Result<State, ScpiError> {
    Ok(State::from(value.to_bool()?))
}
