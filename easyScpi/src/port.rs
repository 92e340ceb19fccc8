//! Resolution of human readable port specifiers into resource ids.
//!
//! How a port is written depends on the host: Windows users talk about `COM3`, everyone else
//! about `/dev/ttyUSB0`. USB, GPIB, and TCP/IP ports are written the same everywhere. Each
//! platform has its own [`PortPolicy`] that turns a port into a [`ResourcePattern`], which is then
//! either matched against the resources that are currently visible, or used as is.

use log::debug;
use regex::RegexBuilder;

use crate::ScpiError;

/// Prefixes of ports that are not serial lines. They are handled the same on every platform.
const INSTRUMENT_PREFIXES: [&str; 3] = ["USB", "GPIB", "TCPIP"];

/// Prefixes accepted by the [`WindowsPolicy`].
const WINDOWS_PREFIXES: [&str; 4] = ["COM", "USB", "GPIB", "TCPIP"];

/// The platform whose port naming rules apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// `COM<n>` serial ports.
    Windows,
    /// Serial ports are device paths, e.g., `/dev/ttyUSB0`.
    Unix,
}

impl Platform {
    /// The platform this program runs on.
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// The port policy of this platform.
    pub fn policy(self) -> &'static dyn PortPolicy {
        match self {
            Platform::Windows => &WindowsPolicy,
            Platform::Unix => &UnixPolicy,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::host()
    }
}

/// The result of classifying a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePattern {
    /// Case-insensitive regular expression, matched at the start of each visible resource id.
    pub pattern: String,
    /// The resource id to use without matching.
    pub literal: String,
}

impl ResourcePattern {
    fn same(pattern: String) -> Self {
        Self {
            literal: pattern.clone(),
            pattern,
        }
    }
}

/// Turns a port specifier into a resource pattern.
pub trait PortPolicy: Sync {
    /// Classify `port` and build its resource pattern.
    fn resource_pattern(&self, port: &str) -> Result<ResourcePattern, ScpiError>;
}

/// Port rules on Windows.
///
/// Accepts ports starting with `COM`, `USB`, `GPIB`, or `TCPIP`. `COM<n>` matches both
/// `ASRL<n>::INSTR` and `ASRLCOM<n>::INSTR`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsPolicy;

impl PortPolicy for WindowsPolicy {
    fn resource_pattern(&self, port: &str) -> Result<ResourcePattern, ScpiError> {
        let port_name = port.to_uppercase();
        if let Some(pattern) = instrument_pattern(port, &port_name) {
            return Ok(pattern);
        }

        if port_name.starts_with("COM") {
            let number = port.get(3..).unwrap_or_default();
            return Ok(ResourcePattern {
                pattern: format!("ASRL((?:COM)?{})::INSTR", regex::escape(number)),
                literal: format!("ASRL{number}::INSTR"),
            });
        }

        Err(ScpiError::InvalidPort {
            port: port.to_string(),
            expected: &WINDOWS_PREFIXES,
        })
    }
}

/// Port rules on Linux, macOS, and other unix systems.
///
/// Everything that is not a USB, GPIB, or TCP/IP port is a serial device: `ttyUSB0`,
/// `/dev/ttyUSB0`, and `ASRL/dev/ttyUSB0::INSTR` all end up as `ASRL/dev/ttyUSB0::INSTR`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnixPolicy;

impl PortPolicy for UnixPolicy {
    fn resource_pattern(&self, port: &str) -> Result<ResourcePattern, ScpiError> {
        let port_name = port.to_uppercase();
        if let Some(pattern) = instrument_pattern(port, &port_name) {
            return Ok(pattern);
        }

        let mut resource = port.to_string();
        if !resource.starts_with("ASRL") {
            let asrl = if resource.starts_with('/') { "ASRL" } else { "ASRL/" };
            resource = format!("{asrl}{resource}");
        }
        if !resource.ends_with("::INSTR") {
            resource.push_str("::INSTR");
        }
        Ok(ResourcePattern::same(resource))
    }
}

/// Pattern for USB, GPIB, and TCP/IP ports, `None` for all other ports.
///
/// Fully qualified resource ids are used verbatim, anything else is completed with a wildcard
/// that matches the rest of an `INSTR` resource id.
fn instrument_pattern(port: &str, port_name: &str) -> Option<ResourcePattern> {
    if !INSTRUMENT_PREFIXES.iter().any(|p| port_name.starts_with(p)) {
        return None;
    }
    if port_name.ends_with("INSTR") || port_name.ends_with("SOCKET") {
        Some(ResourcePattern::same(port.to_string()))
    } else {
        Some(ResourcePattern::same(format!("{port}::.*::INSTR")))
    }
}

/// Find the one resource that matches `pattern`.
///
/// The pattern is a case-insensitive regular expression that has to match at the start of the
/// resource id. The matched part of the resource id is returned.
///
/// # Example
/// ```
/// use easyscpi::match_resource;
///
/// let resources = vec![
///     "ASRL1::INSTR".to_string(),
///     "USB0::0x0957::0x1798::MY123::INSTR".to_string(),
/// ];
/// let rid = match_resource("usb0::0x0957::.*::INSTR", &resources).unwrap();
/// assert_eq!(rid, "USB0::0x0957::0x1798::MY123::INSTR");
/// ```
pub fn match_resource(pattern: &str, resources: &[String]) -> Result<String, ScpiError> {
    let re = RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
        .map_err(|source| ScpiError::InvalidResourcePattern {
            pattern: pattern.to_string(),
            source,
        })?;

    let mut matches: Vec<String> = resources
        .iter()
        .filter_map(|res| re.find(res).map(|m| m.as_str().to_string()))
        .collect();
    debug!("resources matching {pattern}: {matches:?}");

    match matches.len() {
        0 => Err(ScpiError::ResourceNotFound(pattern.to_string())),
        1 => Ok(matches.swap_remove(0)),
        _ => Err(ScpiError::AmbiguousResource {
            pattern: pattern.to_string(),
            matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_pattern_skips_serial() {
        assert_eq!(instrument_pattern("COM3", "COM3"), None);
        assert_eq!(instrument_pattern("ttyUSB0", "TTYUSB0"), None);
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            match_resource("USB0::(", &["USB0::1::INSTR".to_string()]),
            Err(ScpiError::InvalidResourcePattern { .. })
        ));
    }
}
