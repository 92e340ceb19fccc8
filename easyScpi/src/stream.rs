//! Sessions on top of byte streams, e.g., TCP/IP sockets and serial ports.
//!
//! A [`StreamSession`] can be built with any port that implements [`std::io::Read`] and
//! [`std::io::Write`] and the small [`Port`] trait. The [`StreamBackend`] resource manager uses it
//! to open `TCPIP::<host>::<port>::SOCKET` resources with [`std::net::TcpStream`] and, with the
//! `serial` feature enabled, `ASRL<device>::INSTR` resources with the `serialport` crate.

use std::{
    collections::VecDeque,
    io::{Read, Write},
    net::TcpStream,
    time::Duration,
};

use log::debug;

use crate::{ResourceManager, ResourceParam, ScpiError, Session, SessionAttributes};

/// A byte stream that a [`StreamSession`] can talk through.
pub trait Port: Read + Write + Send {
    /// Set the read and write timeout of the port.
    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ScpiError> {
        Ok(())
    }

    /// Apply a transport specific option. Return `Ok(false)` if the option is unknown.
    fn set_option(&mut self, _name: &str, _value: &ResourceParam) -> Result<bool, ScpiError> {
        Ok(false)
    }
}

impl Port for TcpStream {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        // A zero timeout is rejected by the socket, block as short as possible instead.
        let timeout = timeout.max(Duration::from_millis(1));
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))?;
        Ok(())
    }
}

/// In-memory port: everything written can be read back. Handy for tests.
impl Port for VecDeque<u8> {}

/// Function that opens the port for a resource id.
pub type PortOpener<P> = fn(&str) -> Result<P, ScpiError>;

/// A session that talks through a byte stream.
///
/// The session remembers how to open its port, such that it can be closed and reopened without
/// going through the resource manager again. Options that were applied to the port are applied
/// again after reopening.
///
/// # Example
///
/// ```
/// use std::collections::VecDeque;
///
/// use easyscpi::{Session, StreamSession};
///
/// let mut session = StreamSession::from_port(
///     "LOOP::INSTR",
///     VecDeque::new(),
///     |_| Ok(VecDeque::new()),
/// );
/// session.write("*IDN?").unwrap();
/// assert_eq!(session.read().unwrap(), "*IDN?");
/// ```
pub struct StreamSession<P: Port> {
    resource_id: String,
    port: Option<P>,
    opener: PortOpener<P>,
    attributes: SessionAttributes,
    options: Vec<(String, ResourceParam)>,
}

impl<P: Port> StreamSession<P> {
    /// Open the port for `resource_id` and wrap it into a session.
    pub fn open(resource_id: &str, opener: PortOpener<P>) -> Result<Self, ScpiError> {
        let port = opener(resource_id)?;
        let mut session = Self::from_port(resource_id, port, opener);
        let timeout = session.attributes.timeout;
        if let Some(port) = session.port.as_mut() {
            port.set_timeout(timeout)?;
        }
        Ok(session)
    }

    /// Wrap an already opened port into a session.
    pub fn from_port(resource_id: &str, port: P, opener: PortOpener<P>) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            port: Some(port),
            opener,
            attributes: SessionAttributes::default(),
            options: Vec::new(),
        }
    }

    /// The resource id this session was opened for.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn port_mut(&mut self, operation: &'static str) -> Result<&mut P, ScpiError> {
        self.port
            .as_mut()
            .ok_or(ScpiError::NotConnected { operation })
    }
}

impl<P: Port> Session for StreamSession<P> {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        let port = self.port_mut("write")?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        self.port_mut("read")?.read_exact(buf)?;
        Ok(())
    }

    fn attributes(&self) -> &SessionAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut SessionAttributes {
        &mut self.attributes
    }

    fn close(&mut self) -> Result<(), ScpiError> {
        if self.port.take().is_some() {
            debug!("closed {}", self.resource_id);
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), ScpiError> {
        if self.port.is_some() {
            return Ok(());
        }
        let mut port = (self.opener)(&self.resource_id)?;
        port.set_timeout(self.attributes.timeout)?;
        for (name, value) in &self.options {
            port.set_option(name, value)?;
        }
        self.port = Some(port);
        debug!("reopened {}", self.resource_id);
        Ok(())
    }

    fn is_live(&self) -> Result<bool, ScpiError> {
        Ok(self.port.is_some())
    }

    fn set_attribute(&mut self, name: &str, value: &ResourceParam) -> Result<(), ScpiError> {
        if self.attributes.apply(name, value)? {
            if name == "timeout" {
                let timeout = self.attributes.timeout;
                if let Some(port) = self.port.as_mut() {
                    port.set_timeout(timeout)?;
                }
            }
            return Ok(());
        }

        let port = self.port_mut("configure")?;
        if port.set_option(name, value)? {
            self.options.retain(|(n, _)| n != name);
            self.options.push((name.to_string(), value.clone()));
            Ok(())
        } else {
            Err(ScpiError::UnsupportedParameter(name.to_string()))
        }
    }
}

/// A resource id understood by the [`StreamBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceAddress {
    /// Raw TCP/IP socket, `TCPIP[board]::<host>::<port>::SOCKET`.
    Socket {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
    /// Serial line, `ASRL<device>::INSTR`.
    Serial {
        /// Name of the serial device as the operating system knows it.
        device: String,
    },
}

impl ResourceAddress {
    /// Parse a resource id.
    ///
    /// Resource classes without a stream transport, e.g., USB or GPIB instruments, return
    /// [`ScpiError::UnsupportedResource`].
    pub fn parse(resource_id: &str) -> Result<Self, ScpiError> {
        let unsupported = || ScpiError::UnsupportedResource(resource_id.to_string());
        let parts: Vec<&str> = resource_id.split("::").collect();
        let class = parts[0].to_uppercase();

        match parts.as_slice() {
            [_, host, port, suffix]
                if class.starts_with("TCPIP") && suffix.eq_ignore_ascii_case("SOCKET") =>
            {
                let port = port.parse().map_err(|_| unsupported())?;
                Ok(ResourceAddress::Socket {
                    host: host.to_string(),
                    port,
                })
            }
            [asrl, suffix] if class.starts_with("ASRL") && suffix.eq_ignore_ascii_case("INSTR") => {
                let device = asrl.get(4..).unwrap_or_default();
                if device.is_empty() {
                    return Err(unsupported());
                }
                Ok(ResourceAddress::Serial {
                    device: serial_device_name(device),
                })
            }
            _ => Err(unsupported()),
        }
    }
}

/// Map the device part of an `ASRL` resource to the name the operating system uses.
///
/// On Windows, a plain number refers to the COM port with that number.
fn serial_device_name(device: &str) -> String {
    if cfg!(windows) && device.chars().all(|c| c.is_ascii_digit()) {
        format!("COM{device}")
    } else {
        device.to_string()
    }
}

fn open_socket(resource_id: &str) -> Result<TcpStream, ScpiError> {
    match ResourceAddress::parse(resource_id)? {
        ResourceAddress::Socket { host, port } => {
            debug!("connecting to {host}:{port}");
            Ok(TcpStream::connect((host.as_str(), port))?)
        }
        ResourceAddress::Serial { .. } => {
            Err(ScpiError::UnsupportedResource(resource_id.to_string()))
        }
    }
}

/// The default backend: TCP/IP sockets, and serial ports if the `serial` feature is enabled.
///
/// Sockets cannot be discovered, therefore only serial ports show up when listing resources.
/// Use `port_match(false)` when connecting to a socket.
#[derive(Debug, Default)]
pub struct StreamBackend {}

impl ResourceManager for StreamBackend {
    fn list_resources(&mut self) -> Result<Vec<String>, ScpiError> {
        #[cfg(feature = "serial")]
        {
            crate::serial::list_resources()
        }
        #[cfg(not(feature = "serial"))]
        {
            Ok(Vec::new())
        }
    }

    fn open_resource(&mut self, resource_id: &str) -> Result<Box<dyn Session>, ScpiError> {
        match ResourceAddress::parse(resource_id)? {
            ResourceAddress::Socket { .. } => {
                Ok(Box::new(StreamSession::open(resource_id, open_socket)?))
            }
            #[cfg(feature = "serial")]
            ResourceAddress::Serial { .. } => Ok(Box::new(StreamSession::open(
                resource_id,
                crate::serial::open_port,
            )?)),
            #[cfg(not(feature = "serial"))]
            ResourceAddress::Serial { .. } => {
                Err(ScpiError::UnsupportedResource(resource_id.to_string()))
            }
        }
    }
}
