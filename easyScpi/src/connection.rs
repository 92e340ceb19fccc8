//! The connection to an instrument.
//!
//! A [`Connection`] owns the resource manager of its backend and, while connected, the session to
//! the instrument. It resolves ports into resource ids, enforces the connected state for all I/O,
//! checks handshakes, and is the entry point into the command builder via [`Connection::node`].

use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
    sync::{Mutex, PoisonError},
};

use log::{debug, info, warn};

use crate::{
    CommandNode, Platform, ResourceManager, ResourceParam, ScpiError, Session,
    backend_from_selector, match_resource,
};

/// Handshake mode of a connection.
///
/// With a handshake, the instrument confirms every write and query with an additional line that
/// must equal the expected message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Handshake {
    /// No confirmation is read.
    #[default]
    Disabled,
    /// Read one line after every write and query and compare it to this message.
    Expect(String),
}

/// `true` expects the default confirmation `"OK"`, `false` disables the handshake.
impl From<bool> for Handshake {
    fn from(value: bool) -> Self {
        if value {
            Handshake::Expect("OK".to_string())
        } else {
            Handshake::Disabled
        }
    }
}

impl From<&str> for Handshake {
    fn from(value: &str) -> Self {
        Handshake::Expect(value.to_string())
    }
}

impl From<String> for Handshake {
    fn from(value: String) -> Self {
        Handshake::Expect(value)
    }
}

/// Builder for a [`Connection`].
///
/// All settings have defaults: no port, port matching enabled, the default backend, no
/// handshake, `","` as argument separator, no command prefix, no resource parameters, and the
/// port rules of the host platform.
pub struct ConnectionBuilder {
    port: Option<String>,
    port_match: bool,
    backend: String,
    manager: Option<Box<dyn ResourceManager>>,
    handshake: Handshake,
    arg_separator: String,
    prefix_commands: bool,
    resource_params: BTreeMap<String, ResourceParam>,
    platform: Platform,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            port: None,
            port_match: true,
            backend: String::new(),
            manager: None,
            handshake: Handshake::Disabled,
            arg_separator: ",".to_string(),
            prefix_commands: false,
            resource_params: BTreeMap::new(),
            platform: Platform::host(),
        }
    }
}

impl ConnectionBuilder {
    /// The port to resolve when building, e.g., `"COM3"`, `"/dev/ttyUSB0"`, or
    /// `"TCPIP::192.168.0.2::5025::SOCKET"`.
    pub fn port(mut self, port: &str) -> Self {
        self.port = Some(port.to_string());
        self
    }

    /// Whether the port must match exactly one visible resource. If not, the resource id is
    /// built from the port directly.
    pub fn port_match(mut self, port_match: bool) -> Self {
        self.port_match = port_match;
        self
    }

    /// The backend selector, see [`crate::backend_from_selector`].
    pub fn backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_string();
        self
    }

    /// Use this resource manager instead of creating one from the backend selector.
    pub fn resource_manager(mut self, manager: Box<dyn ResourceManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// The handshake mode, e.g., `true` for `"OK"` or a custom message.
    pub fn handshake<H: Into<Handshake>>(mut self, handshake: H) -> Self {
        self.handshake = handshake.into();
        self
    }

    /// Separator between multiple arguments of a command.
    pub fn arg_separator(mut self, separator: &str) -> Self {
        self.arg_separator = separator.to_string();
        self
    }

    /// Whether commands start with a colon.
    pub fn prefix_commands(mut self, prefix: bool) -> Self {
        self.prefix_commands = prefix;
        self
    }

    /// Parameter applied to the session when it is opened, e.g., `"timeout"` or
    /// `"read_termination"`.
    pub fn resource_param<V: Into<ResourceParam>>(mut self, name: &str, value: V) -> Self {
        self.resource_params.insert(name.to_string(), value.into());
        self
    }

    /// Port rules to use instead of the ones of the host platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Create the connection and resolve the port, if one was given.
    ///
    /// The connection is not connected yet, call [`Connection::connect`] for that.
    pub fn build(self) -> Result<Connection, ScpiError> {
        let manager = match self.manager {
            Some(manager) => manager,
            None => backend_from_selector(&self.backend)?,
        };
        let mut conn = Connection {
            port: None,
            resource_id: None,
            port_match: self.port_match,
            backend: self.backend,
            manager: Mutex::new(manager),
            handshake: self.handshake,
            arg_separator: self.arg_separator,
            prefix_commands: self.prefix_commands,
            resource_params: self.resource_params,
            platform: self.platform,
            session: Mutex::new(None),
            identity: None,
        };
        conn.set_port(self.port.as_deref())?;
        Ok(conn)
    }
}

/// A connection to an instrument.
///
/// Arbitrary SCPI commands can be sent by chaining their names with [`Connection::node`] and
/// [`CommandNode::node`]:
///
/// - read a property: `inst.node("p1").node("p2").query()` sends `P1:P2?`
/// - set a property: `inst.node("p1").node("p2").write(&[&value])` sends `P1:P2 <value>`
/// - run a command: `inst.node("p1").node("p2").execute()` sends `P1:P2`
///
/// # Example
///
/// ```
/// use easyscpi::Connection;
///
/// let mut inst = Connection::builder()
///     .backend("@sim")
///     .port("TCPIP::0.0.0.1::3000::SOCKET")
///     .port_match(false)
///     .resource_param("read_termination", "\n")
///     .resource_param("write_termination", "\n")
///     .build()
///     .unwrap();
///
/// inst.connect().unwrap();
/// assert_eq!(inst.id().unwrap(), "mock instrument");
/// assert_eq!(inst.node("freq").query().unwrap(), "100.00");
/// assert_eq!(inst.query("FREQ 1.00").unwrap(), "OK");
/// assert_eq!(inst.node("freq").query().unwrap(), "1.00");
/// ```
///
/// The connection is disconnected when it is dropped.
pub struct Connection {
    port: Option<String>,
    resource_id: Option<String>,
    port_match: bool,
    backend: String,
    manager: Mutex<Box<dyn ResourceManager>>,
    handshake: Handshake,
    arg_separator: String,
    prefix_commands: bool,
    resource_params: BTreeMap<String, ResourceParam>,
    platform: Platform,
    session: Mutex<Option<Box<dyn Session>>>,
    identity: Option<String>,
}

impl Connection {
    /// Start building a connection.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    /// Create a connection with default settings on the default backend and resolve `port`.
    pub fn new(port: Option<&str>) -> Result<Self, ScpiError> {
        let builder = Connection::builder();
        match port {
            Some(port) => builder.port(port).build(),
            None => builder.build(),
        }
    }

    /// First node of a command path, e.g., `inst.node("sour")`. The name is converted to upper
    /// case.
    pub fn node(&self, name: &str) -> CommandNode<'_> {
        CommandNode::root(self).node(name)
    }

    /// Nodes of a colon-delimited command path, e.g., `inst.path_node("sour:freq")`.
    pub fn path_node(&self, path: &str) -> CommandNode<'_> {
        CommandNode::root(self).path_node(path)
    }

    /// The port as it was given.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Set a new port and resolve its resource id.
    ///
    /// `None` clears port and resource id. Otherwise, the port is classified with the rules of
    /// the platform, any existing session is closed and dropped, and the resource id is resolved:
    /// with port matching, the resource must be the only visible one that matches; without, the
    /// resource id is built from the port directly. If resolution fails, the resource id is
    /// unset. The connection does not reconnect. A session that fails to close is dropped
    /// anyway and the failure is logged.
    pub fn set_port(&mut self, port: Option<&str>) -> Result<(), ScpiError> {
        let Some(port) = port else {
            self.drop_session();
            self.port = None;
            self.resource_id = None;
            return Ok(());
        };

        let pattern = self.platform.policy().resource_pattern(port)?;
        self.drop_session();
        self.port = Some(port.to_string());
        self.resource_id = None;

        let resource_id = if self.port_match {
            let resources = self
                .manager
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .list_resources()?;
            match_resource(&pattern.pattern, &resources)?
        } else {
            pattern.literal
        };
        debug!("port {port} resolved to {resource_id}");
        self.resource_id = Some(resource_id);
        Ok(())
    }

    /// The resolved resource id.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Set the resource id directly, bypassing port resolution. Any existing session is closed
    /// and dropped.
    pub fn set_resource_id(&mut self, resource_id: Option<String>) -> Result<(), ScpiError> {
        self.drop_session();
        self.resource_id = resource_id;
        Ok(())
    }

    /// Whether ports must match exactly one visible resource.
    pub fn port_match(&self) -> bool {
        self.port_match
    }

    /// Require ports to be matched or not. Applies to the next [`Connection::set_port`].
    pub fn set_port_match(&mut self, port_match: bool) {
        self.port_match = port_match;
    }

    /// The backend selector this connection was built with.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The handshake mode.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Set the handshake mode.
    pub fn set_handshake<H: Into<Handshake>>(&mut self, handshake: H) {
        self.handshake = handshake.into();
    }

    /// Separator between multiple arguments of a command.
    pub fn arg_separator(&self) -> &str {
        &self.arg_separator
    }

    /// Set the separator between multiple arguments of a command.
    pub fn set_arg_separator(&mut self, separator: &str) {
        self.arg_separator = separator.to_string();
    }

    /// Whether commands start with a colon.
    pub fn prefix_commands(&self) -> bool {
        self.prefix_commands
    }

    /// Let commands start with a colon or not.
    pub fn set_prefix_commands(&mut self, prefix: bool) {
        self.prefix_commands = prefix;
    }

    /// Parameters that are applied to the session when it is opened.
    pub fn resource_params(&self) -> &BTreeMap<String, ResourceParam> {
        &self.resource_params
    }

    /// The port rules in use.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The identification the instrument reported on the last [`Connection::connect`].
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Connect to the instrument.
    ///
    /// The first connect opens a session to the resource and applies all resource parameters.
    /// Later connects reopen that same session. Afterwards, the instrument is identified with
    /// `*IDN?`, which also puts many instruments into remote control. The identification is
    /// best-effort: if it fails, the error is logged, [`Connection::identity`] is `None`, and the
    /// connection stays open.
    pub fn connect(&mut self) -> Result<(), ScpiError> {
        let resource_id = self.resource_id.clone().ok_or(ScpiError::NoResourceId)?;

        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        match session {
            Some(session) => session.reopen()?,
            None => {
                debug!("opening {resource_id}");
                let mut opened = self
                    .manager
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .open_resource(&resource_id)?;
                for (name, value) in &self.resource_params {
                    opened.set_attribute(name, value)?;
                }
                *session = Some(opened);
            }
        }

        self.identity = match self.id() {
            Ok(identity) => {
                info!("connected to {resource_id}: {identity}");
                Some(identity)
            }
            Err(err) => {
                warn!("connected to {resource_id}, identification failed: {err}");
                None
            }
        };
        Ok(())
    }

    /// Close the session, if there is one. The resource id is kept for the next connect.
    pub fn disconnect(&mut self) -> Result<(), ScpiError> {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = session.as_mut() {
            session.close()?;
            debug!("disconnected from {:?}", self.resource_id);
        }
        Ok(())
    }

    /// Whether a session exists and is open. A failing liveness probe counts as not connected.
    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| s.is_live().unwrap_or(false))
    }

    /// Connect and return a guard that disconnects when it goes out of scope.
    ///
    /// # Example
    /// ```
    /// use easyscpi::Connection;
    ///
    /// let mut inst = Connection::builder()
    ///     .backend("@sim")
    ///     .port("TCPIP::0.0.0.1::3000::SOCKET")
    ///     .port_match(false)
    ///     .build()
    ///     .unwrap();
    /// {
    ///     let guard = inst.scoped().unwrap();
    ///     assert!(guard.is_connected());
    /// }
    /// assert!(!inst.is_connected());
    /// ```
    pub fn scoped(&mut self) -> Result<ConnectionGuard<'_>, ScpiError> {
        self.connect()?;
        Ok(ConnectionGuard { conn: self })
    }

    /// Send a message. With a handshake, the confirmation is read and checked afterwards.
    ///
    /// Returns the number of bytes the transport wrote.
    pub fn write(&self, msg: &str) -> Result<usize, ScpiError> {
        self.with_session("write", |session| {
            let written = session.write(msg)?;
            self.check_handshake(session)?;
            Ok(written)
        })
    }

    /// Read the next reply. No handshake is read.
    pub fn read(&self) -> Result<String, ScpiError> {
        self.with_session("read", |session| session.read())
    }

    /// Send a message and return the reply. With a handshake, the confirmation is read and
    /// checked afterwards.
    pub fn query(&self, msg: &str) -> Result<String, ScpiError> {
        self.with_session("query", |session| {
            let resp = session.query(msg)?;
            self.check_handshake(session)?;
            Ok(resp)
        })
    }

    /// Identification of the instrument, queried with `*IDN?`.
    pub fn id(&self) -> Result<String, ScpiError> {
        self.query("*IDN?")
    }

    /// Current reading of the instrument, queried with `READ?`.
    pub fn value(&self) -> Result<String, ScpiError> {
        self.query("READ?")
    }

    /// Reset the instrument to its default state with `*RST`.
    pub fn reset(&self) -> Result<usize, ScpiError> {
        self.write("*RST")
    }

    /// Initialize the instrument for a measurement with `INIT`.
    pub fn init(&self) -> Result<usize, ScpiError> {
        self.write("INIT")
    }

    /// Run `f` with the open session. The session stays locked for the whole request.
    fn with_session<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn Session) -> Result<T, ScpiError>,
    ) -> Result<T, ScpiError> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match session.as_mut() {
            Some(session) if session.is_live().unwrap_or(false) => f(session.as_mut()),
            _ => Err(ScpiError::NotConnected { operation }),
        }
    }

    fn check_handshake(&self, session: &mut dyn Session) -> Result<(), ScpiError> {
        if let Handshake::Expect(expected) = &self.handshake {
            let received = session.read()?;
            if received != *expected {
                return Err(ScpiError::HandshakeMismatch {
                    expected: expected.clone(),
                    received,
                });
            }
        }
        Ok(())
    }

    /// Close and forget the session, such that the next connect opens a new one.
    ///
    /// The session is gone afterwards even if closing it fails.
    fn drop_session(&mut self) {
        self.identity = None;
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut session) = session {
            if let Err(err) = session.close() {
                warn!("failed to close dropped session: {err}");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.is_connected() {
            if let Err(err) = self.disconnect() {
                warn!("failed to disconnect on drop: {err}");
            }
        }
    }
}

/// A connected [`Connection`] that disconnects when dropped. Created by [`Connection::scoped`].
pub struct ConnectionGuard<'a> {
    conn: &'a mut Connection,
}

impl Deref for ConnectionGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl DerefMut for ConnectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.conn.disconnect() {
            warn!("failed to disconnect at end of scope: {err}");
        }
    }
}
