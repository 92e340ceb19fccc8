//! Simulated instruments, selected with the `@sim` backend.
//!
//! A [`SimDevice`] answers fixed dialogues (e.g., `*IDN?`) and exposes properties that can be
//! queried with `<NAME>?` and set with `<NAME> <value>`. Devices are registered with a
//! [`SimBackend`] under one or more resource ids. All sessions to the same device share its state,
//! so a value that was set survives closing and reopening the session.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use log::trace;

use crate::{ResourceManager, ScpiError, Session, SessionAttributes};

/// Value of a simulated property.
#[derive(Clone, Debug, PartialEq)]
pub enum SimProperty {
    /// A number that is reported with a fixed number of decimals.
    Float {
        /// Current value.
        value: f64,
        /// Number of decimals in replies.
        precision: usize,
        /// Smallest value that can be set.
        min: f64,
        /// Largest value that can be set.
        max: f64,
    },
    /// A token out of a set of allowed tokens. An empty set allows anything.
    Text {
        /// Current value.
        value: String,
        /// Allowed values, compared case-insensitively.
        allowed: Vec<String>,
    },
}

impl SimProperty {
    /// An unbounded float property.
    pub fn float(value: f64, precision: usize) -> Self {
        SimProperty::Float {
            value,
            precision,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// A text property that accepts anything.
    pub fn text(value: &str) -> Self {
        SimProperty::Text {
            value: value.to_string(),
            allowed: Vec::new(),
        }
    }

    /// Restrict a float property to `[min, max]`. Does nothing for text properties.
    pub fn with_range(mut self, lower: f64, upper: f64) -> Self {
        if let SimProperty::Float { min, max, .. } = &mut self {
            *min = lower;
            *max = upper;
        }
        self
    }

    /// Restrict a text property to the given tokens. Does nothing for float properties.
    pub fn with_allowed(mut self, tokens: &[&str]) -> Self {
        if let SimProperty::Text { allowed, .. } = &mut self {
            *allowed = tokens.iter().map(|t| t.to_uppercase()).collect();
        }
        self
    }

    fn get(&self) -> String {
        match self {
            SimProperty::Float {
                value, precision, ..
            } => format!("{value:.prec$}", prec = *precision),
            SimProperty::Text { value, .. } => value.clone(),
        }
    }

    /// Set the property from its string form. Returns `false` if the value is not accepted.
    fn set(&mut self, input: &str) -> bool {
        match self {
            SimProperty::Float {
                value, min, max, ..
            } => match input.trim().parse::<f64>() {
                Ok(val) if val >= *min && val <= *max => {
                    *value = val;
                    true
                }
                _ => false,
            },
            SimProperty::Text { value, allowed } => {
                let token = input.trim().to_uppercase();
                if allowed.is_empty() || allowed.contains(&token) {
                    *value = input.trim().to_string();
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// A simulated instrument.
///
/// # Example
///
/// ```
/// use easyscpi::{SimDevice, SimProperty};
///
/// let mut dev = SimDevice::new("ACME,PSU1,0,1.0")
///     .with_property("VOLT", SimProperty::float(0.0, 3).with_range(0.0, 30.0));
///
/// assert_eq!(dev.respond("volt 12.5"), Some("OK".to_string()));
/// assert_eq!(dev.respond("VOLT?"), Some("12.500".to_string()));
/// assert_eq!(dev.respond("VOLT 99"), Some("ERROR".to_string()));
/// ```
#[derive(Clone, Debug)]
pub struct SimDevice {
    dialogues: BTreeMap<String, String>,
    properties: BTreeMap<String, SimProperty>,
    set_response: Option<String>,
    error_response: String,
}

impl SimDevice {
    /// Create a device that answers `*IDN?` with `identity`.
    ///
    /// Sets are acknowledged with `"OK"` and everything the device does not understand is
    /// answered with `"ERROR"`.
    pub fn new(identity: &str) -> Self {
        let mut dialogues = BTreeMap::new();
        dialogues.insert("*IDN?".to_string(), identity.to_string());
        Self {
            dialogues,
            properties: BTreeMap::new(),
            set_response: Some("OK".to_string()),
            error_response: "ERROR".to_string(),
        }
    }

    /// The mock instrument of the default `@sim` backend.
    ///
    /// Identifies as `"mock instrument"` and has a `FREQ` property starting at `100.00`.
    pub fn mock() -> Self {
        SimDevice::new("mock instrument").with_property(
            "FREQ",
            SimProperty::float(100.0, 2).with_range(1.0, 100_000.0),
        )
    }

    /// Add a fixed reply to a message.
    pub fn with_dialogue(mut self, query: &str, response: &str) -> Self {
        self.dialogues.insert(normalize(query), response.to_string());
        self
    }

    /// Add a property under a colon-delimited name, e.g., `"SOUR:FREQ"`.
    pub fn with_property(mut self, name: &str, property: SimProperty) -> Self {
        self.properties.insert(normalize(name), property);
        self
    }

    /// Reply that acknowledges a successful set. `None` sets silently.
    pub fn with_set_response(mut self, response: Option<&str>) -> Self {
        self.set_response = response.map(str::to_string);
        self
    }

    /// Reply to anything that is not understood.
    pub fn with_error_response(mut self, response: &str) -> Self {
        self.error_response = response.to_string();
        self
    }

    /// Current value of a property as it would be reported.
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.get(&normalize(name)).map(SimProperty::get)
    }

    /// Process one message and return the reply, if any.
    pub fn respond(&mut self, msg: &str) -> Option<String> {
        let key = normalize(msg);
        if let Some(reply) = self.dialogues.get(&key) {
            return Some(reply.clone());
        }

        if let Some(name) = key.strip_suffix('?') {
            return Some(match self.properties.get(name) {
                Some(prop) => prop.get(),
                None => self.error_response.clone(),
            });
        }

        let (name, value) = match key.split_once(' ') {
            Some((name, _)) => {
                // Keep the case of the value, only the header is normalized.
                let value = msg.trim().split_once(' ').map_or("", |(_, v)| v);
                (name.to_string(), value)
            }
            None => return Some(self.error_response.clone()),
        };

        let accepted = self
            .properties
            .get_mut(&name)
            .is_some_and(|prop| prop.set(value));
        if accepted {
            self.set_response.clone()
        } else {
            Some(self.error_response.clone())
        }
    }
}

/// Upper-case the header of a message and drop a leading colon.
fn normalize(msg: &str) -> String {
    let msg = msg.trim();
    let msg = msg.strip_prefix(':').unwrap_or(msg);
    match msg.split_once(' ') {
        Some((header, args)) => format!("{} {}", header.to_uppercase(), args.trim()),
        None => msg.to_uppercase(),
    }
}

/// A session to a [`SimDevice`].
pub struct SimSession {
    device: Arc<Mutex<SimDevice>>,
    attributes: SessionAttributes,
    open: bool,
    from_host: Vec<u8>,
    to_host: VecDeque<u8>,
}

impl SimSession {
    fn new(device: Arc<Mutex<SimDevice>>) -> Self {
        Self {
            device,
            attributes: SessionAttributes::default(),
            open: true,
            from_host: Vec::new(),
            to_host: VecDeque::new(),
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), ScpiError> {
        if self.open {
            Ok(())
        } else {
            Err(ScpiError::NotConnected { operation })
        }
    }

    /// Hand every complete message in the input buffer to the device.
    fn process(&mut self) {
        let term = self.attributes.write_termination.as_bytes().to_vec();
        if term.is_empty() {
            return;
        }
        while let Some(pos) = self
            .from_host
            .windows(term.len())
            .position(|w| w == term.as_slice())
        {
            let msg: Vec<u8> = self.from_host.drain(..pos + term.len()).collect();
            let msg = String::from_utf8_lossy(&msg[..pos]).to_string();
            let reply = self
                .device
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .respond(&msg);
            trace!("sim: {msg:?} -> {reply:?}");
            if let Some(reply) = reply {
                let reply = format!("{reply}{}", self.attributes.read_termination);
                self.to_host.extend(reply.as_bytes());
            }
        }
    }
}

impl Session for SimSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.ensure_open("write")?;
        self.from_host.extend_from_slice(data);
        self.process();
        Ok(())
    }

    /// Fails with a timeout right away if the device has nothing to say.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        self.ensure_open("read")?;
        if self.to_host.len() < buf.len() {
            return Err(ScpiError::Timeout(self.attributes.timeout));
        }
        for byte in buf.iter_mut() {
            *byte = self.to_host.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn attributes(&self) -> &SessionAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut SessionAttributes {
        &mut self.attributes
    }

    fn close(&mut self) -> Result<(), ScpiError> {
        self.open = false;
        self.from_host.clear();
        self.to_host.clear();
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), ScpiError> {
        self.open = true;
        Ok(())
    }

    fn is_live(&self) -> Result<bool, ScpiError> {
        Ok(self.open)
    }
}

/// Resource manager that hosts simulated devices.
///
/// The default backend hosts [`SimDevice::mock`] under `TCPIP::0.0.0.1::3000::SOCKET` and
/// `ASRL/dev/ttyMOCK::INSTR`.
pub struct SimBackend {
    devices: Vec<(String, Arc<Mutex<SimDevice>>)>,
}

impl SimBackend {
    /// A backend without any devices.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Register a device under the given resource ids.
    pub fn with_device(mut self, resource_ids: &[&str], device: SimDevice) -> Self {
        let device = Arc::new(Mutex::new(device));
        for rid in resource_ids {
            self.devices.push((rid.to_string(), Arc::clone(&device)));
        }
        self
    }

    /// Shared handle to the device registered under `resource_id`.
    pub fn device(&self, resource_id: &str) -> Option<Arc<Mutex<SimDevice>>> {
        self.devices
            .iter()
            .find(|(rid, _)| rid.eq_ignore_ascii_case(resource_id))
            .map(|(_, dev)| Arc::clone(dev))
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        SimBackend::new().with_device(
            &["TCPIP::0.0.0.1::3000::SOCKET", "ASRL/dev/ttyMOCK::INSTR"],
            SimDevice::mock(),
        )
    }
}

impl ResourceManager for SimBackend {
    fn list_resources(&mut self) -> Result<Vec<String>, ScpiError> {
        Ok(self.devices.iter().map(|(rid, _)| rid.clone()).collect())
    }

    fn open_resource(&mut self, resource_id: &str) -> Result<Box<dyn Session>, ScpiError> {
        let device = self.device(resource_id).ok_or_else(|| {
            ScpiError::Transport(format!("No simulated device at {resource_id}"))
        })?;
        Ok(Box::new(SimSession::new(device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(":sour:freq 1.5"), "SOUR:FREQ 1.5");
        assert_eq!(normalize("  *idn?  "), "*IDN?");
    }

    #[test]
    fn test_mock_freq() {
        let mut dev = SimDevice::mock();
        assert_eq!(dev.respond("FREQ?").as_deref(), Some("100.00"));
        assert_eq!(dev.respond("FREQ 1.00").as_deref(), Some("OK"));
        assert_eq!(dev.property("freq").as_deref(), Some("1.00"));
        assert_eq!(dev.respond("FREQ 0").as_deref(), Some("ERROR"));
        assert_eq!(dev.respond("AMPL?").as_deref(), Some("ERROR"));
    }

    #[test]
    fn test_text_property() {
        let mut dev = SimDevice::new("x")
            .with_property("RMOD:DET", SimProperty::text("PEAK").with_allowed(&["PEAK", "AVG"]));
        assert_eq!(dev.respond("rmod:det avg").as_deref(), Some("OK"));
        assert_eq!(dev.respond("RMOD:DET?").as_deref(), Some("avg"));
        assert_eq!(dev.respond("RMOD:DET RMS").as_deref(), Some("ERROR"));
    }

    #[test]
    fn test_session_split_messages() {
        let mut session = SimSession::new(Arc::new(Mutex::new(SimDevice::mock())));
        session.write_raw(b"FRE").unwrap();
        session.write_raw(b"Q?\n*IDN?\n").unwrap();
        assert_eq!(session.read().unwrap(), "100.00");
        assert_eq!(session.read().unwrap(), "mock instrument");
        assert!(matches!(session.read(), Err(ScpiError::Timeout(_))));
    }
}
