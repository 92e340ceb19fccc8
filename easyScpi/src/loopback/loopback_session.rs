//! Loopback session implemented for testing code that talks SCPI through a [`crate::Connection`].
//!
//! End-of-message is always determined by a terminator string, usually `"\n"`.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{ResourceParam, ScpiError, Session, SessionAttributes, loopback::IncrIndex};

/// A session that allows you to simply write tests for code that uses a [`crate::Connection`].
///
/// # Example
///
/// Let us check that connecting to an instrument identifies it and that a chained command ends up
/// on the wire as expected.
///
/// ```
/// use easyscpi::{Connection, LoopbackBackend, LoopbackSession};
///
/// let host2inst = vec!["*IDN?".to_string(), "SOUR:FREQ 1000".to_string()];
/// let inst2host = vec!["ACME,GEN1,42,1.0".to_string()];
///
/// // Create the loopback session with the expected messages and hand it to a backend that
/// // lists a single serial resource.
/// let session = LoopbackSession::new(host2inst, inst2host, "\n");
/// let backend = LoopbackBackend::new(vec!["ASRL/dev/ttyUSB0::INSTR".to_string()], session);
///
/// let mut inst = Connection::builder()
///     .resource_manager(Box::new(backend))
///     .port("/dev/ttyUSB0")
///     .build()
///     .unwrap();
/// inst.connect().unwrap();
/// assert_eq!(inst.identity(), Some("ACME,GEN1,42,1.0"));
///
/// inst.node("sour").node("freq").write(&[&1000]).unwrap();
/// ```
///
/// Once the session is dropped, it panics if any scripted message was not used, just as it panics
/// whenever the host sends a message that is not the next expected one.
pub struct LoopbackSession {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    terminator_exp: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    attributes: SessionAttributes,
    open: bool,
    applied: AttributeLog,
}

/// Shared record of the attributes set on a [`LoopbackSession`], see
/// [`LoopbackSession::attribute_log`].
pub type AttributeLog = Arc<Mutex<Vec<(String, ResourceParam)>>>;

impl LoopbackSession {
    /// Create a new loopback session with given messages to and from the instrument.
    ///
    /// The messages are consumed in order. Whenever the host sends something that is not
    /// expected, the [`LoopbackSession`] panics. When it is dropped, a `finalize` function is
    /// called that checks if all messages that you have provided have been used.
    ///
    /// # Arguments:
    /// * `from_host` - Messages from host to instrument.
    /// * `from_inst` - Messages from instrument to host.
    /// * `terminator_exp` - The expected terminator. Both directions use it, so set the session's
    ///   terminators to the same value (they default to `"\n"`).
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackSession {
            from_host,
            from_inst,
            terminator_exp: terminator_exp.to_string(),
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            attributes: SessionAttributes::default(),
            open: true,
            applied: AttributeLog::default(),
        }
    }

    /// Same as [`LoopbackSession::new`] but takes string slices.
    pub fn from_strs(from_host: &[&str], from_inst: &[&str], terminator_exp: &str) -> Self {
        Self::new(
            from_host.iter().map(|s| s.to_string()).collect(),
            from_inst.iter().map(|s| s.to_string()).collect(),
            terminator_exp,
        )
    }

    /// This command panics if not all messages in the [`LoopbackSession`] have been used.
    ///
    /// It is automatically called when the [`LoopbackSession`] is dropped, but you can also call
    /// it manually to ensure that all messages have been used.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.next());
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.next());
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected messages found from host to instrument: {fil}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected messages found from instrument to host: {fil}");
        }
    }

    /// Handle to the attributes that get set on this session, in order.
    ///
    /// Grab the handle before handing the session to a [`crate::LoopbackBackend`], the session
    /// itself is owned by the connection afterwards.
    pub fn attribute_log(&self) -> AttributeLog {
        Arc::clone(&self.applied)
    }

    /// Get the next message from host to instrument, or panic.
    fn get_next_from_host(&mut self) -> &str {
        self.from_host
            .get(self.from_host_index.next())
            .expect("No more messages were expected from host to instrument.")
    }

    /// Get the next message from instrument to host, or panic.
    fn get_next_from_inst(&mut self) -> &str {
        self.from_inst
            .get(self.from_inst_index.next())
            .expect("No more messages were expected from instrument to host.")
    }

    /// Function to read exactly one byte from the next message from the instrument.
    ///
    /// This just panics if there are no more messages. If there are no more messages but one is
    /// required, the panic is justified as this is a test interface.
    fn read_one_byte(&mut self) -> u8 {
        match self.curr_bytes.pop_front() {
            Some(byte) => byte,
            None => {
                let next_msg = self.get_next_from_inst().to_string();
                let next_msg = format!("{next_msg}{}", self.terminator_exp);
                self.curr_bytes = next_msg.as_bytes().iter().copied().collect();
                self.read_one_byte()
            }
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), ScpiError> {
        if self.open {
            Ok(())
        } else {
            Err(ScpiError::NotConnected { operation })
        }
    }
}

impl Session for LoopbackSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.ensure_open("write")?;
        let exp = self.get_next_from_host().to_string();
        let exp = format!("{exp}{}", self.terminator_exp);
        assert_eq!(
            exp.as_bytes(),
            data,
            "Expected message '{0}', got '{1:?}'",
            exp,
            str::from_utf8(data)
        );
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        self.ensure_open("read")?;
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
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
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), ScpiError> {
        self.open = true;
        Ok(())
    }

    fn is_live(&self) -> Result<bool, ScpiError> {
        Ok(self.open)
    }

    /// Records the attribute. Common attributes are applied, all others are accepted as is.
    fn set_attribute(&mut self, name: &str, value: &ResourceParam) -> Result<(), ScpiError> {
        self.attributes.apply(name, value)?;
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), value.clone()));
        Ok(())
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        // A second panic while unwinding would abort the test binary.
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
