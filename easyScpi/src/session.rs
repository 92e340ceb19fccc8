//! The transport boundary: resource managers that discover and open resources, and the sessions
//! they hand out.
//!
//! A [`Session`] is the equivalent of an opened VISA resource. Implementors only need to provide
//! the raw byte transfer and the lifecycle functions; writing terminated messages and reading
//! terminated replies is provided on top of that.

use std::{fmt, time::Duration, time::Instant};

use log::trace;

use crate::{LoopbackBackend, ScpiError, SimBackend, StreamBackend};

/// Value of a resource parameter, see [`Session::set_attribute`].
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceParam {
    /// A string value, e.g., a terminator.
    Str(String),
    /// An integer value, e.g., a baud rate or a timeout in milliseconds.
    Int(i64),
    /// A floating point value, e.g., a timeout in milliseconds.
    Float(f64),
    /// A flag.
    Bool(bool),
    /// A duration, e.g., a timeout.
    Duration(Duration),
}

impl ResourceParam {
    /// Interpret the parameter as a duration. Numbers are taken as milliseconds.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            ResourceParam::Duration(d) => Some(*d),
            ResourceParam::Int(ms) if *ms >= 0 => Some(Duration::from_millis(*ms as u64)),
            ResourceParam::Float(ms) if *ms >= 0.0 && ms.is_finite() => {
                Some(Duration::from_secs_f64(ms / 1000.0))
            }
            _ => None,
        }
    }

    /// Interpret the parameter as an unsigned integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ResourceParam::Int(val) => u32::try_from(*val).ok(),
            ResourceParam::Str(val) => val.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the parameter as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResourceParam::Str(val) => Some(val),
            _ => None,
        }
    }

    /// Build the error for a value that the named parameter cannot take.
    pub(crate) fn invalid(&self, name: &str) -> ScpiError {
        ScpiError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
        }
    }
}

impl fmt::Display for ResourceParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceParam::Str(val) => write!(f, "{val:?}"),
            ResourceParam::Int(val) => write!(f, "{val}"),
            ResourceParam::Float(val) => write!(f, "{val}"),
            ResourceParam::Bool(val) => write!(f, "{val}"),
            ResourceParam::Duration(val) => write!(f, "{val:?}"),
        }
    }
}

impl From<&str> for ResourceParam {
    fn from(value: &str) -> Self {
        ResourceParam::Str(value.to_string())
    }
}

impl From<String> for ResourceParam {
    fn from(value: String) -> Self {
        ResourceParam::Str(value)
    }
}

impl From<i64> for ResourceParam {
    fn from(value: i64) -> Self {
        ResourceParam::Int(value)
    }
}

impl From<i32> for ResourceParam {
    fn from(value: i32) -> Self {
        ResourceParam::Int(value.into())
    }
}

impl From<u32> for ResourceParam {
    fn from(value: u32) -> Self {
        ResourceParam::Int(value.into())
    }
}

impl From<f64> for ResourceParam {
    fn from(value: f64) -> Self {
        ResourceParam::Float(value)
    }
}

impl From<bool> for ResourceParam {
    fn from(value: bool) -> Self {
        ResourceParam::Bool(value)
    }
}

impl From<Duration> for ResourceParam {
    fn from(value: Duration) -> Self {
        ResourceParam::Duration(value)
    }
}

/// Attributes every session understands.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionAttributes {
    /// Terminator that ends every reply of the instrument.
    pub read_termination: String,
    /// Terminator appended to every message sent to the instrument.
    pub write_termination: String,
    /// How long to wait for the read termination.
    pub timeout: Duration,
}

impl Default for SessionAttributes {
    fn default() -> Self {
        Self {
            read_termination: "\n".to_string(),
            write_termination: "\n".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

impl SessionAttributes {
    /// Apply a named attribute.
    ///
    /// Returns `Ok(false)` if the name is not one of the common attributes such that sessions
    /// can handle their own attributes afterwards.
    pub fn apply(&mut self, name: &str, value: &ResourceParam) -> Result<bool, ScpiError> {
        match name {
            "read_termination" => {
                self.read_termination = value
                    .as_str()
                    .ok_or_else(|| value.invalid(name))?
                    .to_string();
            }
            "write_termination" => {
                self.write_termination = value
                    .as_str()
                    .ok_or_else(|| value.invalid(name))?
                    .to_string();
            }
            "timeout" => {
                self.timeout = value.as_duration().ok_or_else(|| value.invalid(name))?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// An opened resource.
///
/// This trait mirrors what a VISA resource offers: raw reads and writes, terminated messages on
/// top of those, configuration by attribute name, and an open/close lifecycle. A closed session
/// keeps its configuration and can be reopened with [`Session::reopen`].
pub trait Session: Send {
    /// Write raw bytes to the resource and flush them.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError>;

    /// Read exactly as many bytes as fit into `buf`.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError>;

    /// The common attributes of this session.
    fn attributes(&self) -> &SessionAttributes;

    /// Mutable access to the common attributes of this session.
    fn attributes_mut(&mut self) -> &mut SessionAttributes;

    /// Close the session. Closing a closed session does nothing.
    fn close(&mut self) -> Result<(), ScpiError>;

    /// Open the same resource again after it was closed.
    fn reopen(&mut self) -> Result<(), ScpiError>;

    /// Whether the session is open. Implementations may fail if the probe itself fails.
    fn is_live(&self) -> Result<bool, ScpiError>;

    /// Set an attribute by name, e.g., `"timeout"` or `"read_termination"`.
    ///
    /// Sessions with transport specific attributes override this, handle their own names, and
    /// defer to [`SessionAttributes::apply`] for the rest.
    fn set_attribute(&mut self, name: &str, value: &ResourceParam) -> Result<(), ScpiError> {
        if self.attributes_mut().apply(name, value)? {
            Ok(())
        } else {
            Err(ScpiError::UnsupportedParameter(name.to_string()))
        }
    }

    /// Send a message with the write termination appended.
    ///
    /// Returns the number of bytes that were written, including the termination.
    fn write(&mut self, msg: &str) -> Result<usize, ScpiError> {
        trace!("write: {msg:?}");
        let data = format!("{msg}{}", self.attributes().write_termination);
        self.write_raw(data.as_bytes())?;
        Ok(data.len())
    }

    /// Read a reply until the read termination and return it without the termination.
    ///
    /// Reading happens byte by byte. If the termination is not found before the timeout, a
    /// [`ScpiError::Timeout`] is returned. Bytes that are not valid UTF-8 are skipped.
    fn read(&mut self) -> Result<String, ScpiError> {
        let timeout = self.attributes().timeout;
        let terminator = self.attributes().read_termination.clone();
        let mut response = Vec::new();
        let mut single_buf = [0u8];

        let tic = Instant::now();
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            response.push(single_buf[0]);
            if response.ends_with(terminator.as_bytes()) {
                response.truncate(response.len() - terminator.len());
                let reply: String = response.utf8_chunks().map(|chunk| chunk.valid()).collect();
                trace!("read: {reply:?}");
                return Ok(reply);
            }
        }
        Err(ScpiError::Timeout(timeout))
    }

    /// Send a message and read the reply.
    fn query(&mut self, msg: &str) -> Result<String, ScpiError> {
        self.write(msg)?;
        self.read()
    }
}

/// Discovers resources and opens sessions to them.
pub trait ResourceManager: Send {
    /// List the ids of all resources that are currently visible.
    fn list_resources(&mut self) -> Result<Vec<String>, ScpiError>;

    /// Open a session to the resource with the given id.
    fn open_resource(&mut self, resource_id: &str) -> Result<Box<dyn Session>, ScpiError>;
}

/// Create the resource manager for a backend selector.
///
/// - `""` or `"@py"`: the [`StreamBackend`] that talks to TCP/IP sockets and serial ports.
/// - `"@sim"` or `"<profile>@sim"`: the [`SimBackend`] with the default mock instrument.
/// - `"@loopback"`: an empty [`LoopbackBackend`] that has no resources.
///
/// Any other selector is a configuration error.
pub fn backend_from_selector(selector: &str) -> Result<Box<dyn ResourceManager>, ScpiError> {
    match selector.trim() {
        "" | "@py" => Ok(Box::new(StreamBackend::default())),
        "@loopback" => Ok(Box::new(LoopbackBackend::empty())),
        sel if sel.ends_with("@sim") => Ok(Box::new(SimBackend::default())),
        sel => Err(ScpiError::UnknownBackend(sel.to_string())),
    }
}
