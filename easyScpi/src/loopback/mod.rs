//! The loopback module provides a scripted instrument for testing purposes.
//!
//! The [`LoopbackBackend`] hands out a single [`LoopbackSession`] that checks every message sent
//! by the host against an expected transcript and answers with scripted replies. Check out the
//! [`LoopbackSession`] for more details and examples on how to use it.

mod loopback_session;

pub use loopback_session::*;

use crate::{ResourceManager, ScpiError, Session};

/// A self-incrementing index structure that by default starts at 0 and increments whenever `next`
/// is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}

/// A resource manager that lists fixed resources and opens one scripted [`LoopbackSession`].
///
/// Opening a resource that is not listed fails with [`ScpiError::UnsupportedResource`].
/// Opening a second time hands out nothing, as the transcript can only be consumed once, and
/// fails with [`ScpiError::Transport`].
pub struct LoopbackBackend {
    resources: Vec<String>,
    session: Option<LoopbackSession>,
    opened: usize,
}

impl LoopbackBackend {
    /// Create a backend that lists `resources` and opens `session` for any of them.
    pub fn new(resources: Vec<String>, session: LoopbackSession) -> Self {
        Self {
            resources,
            session: Some(session),
            opened: 0,
        }
    }

    /// Create a backend that lists `resources` but cannot open any of them.
    pub fn listing(resources: Vec<String>) -> Self {
        Self {
            resources,
            session: None,
            opened: 0,
        }
    }

    /// A backend with neither resources nor a session.
    pub fn empty() -> Self {
        Self::listing(Vec::new())
    }
}

impl ResourceManager for LoopbackBackend {
    fn list_resources(&mut self) -> Result<Vec<String>, ScpiError> {
        Ok(self.resources.clone())
    }

    fn open_resource(&mut self, resource_id: &str) -> Result<Box<dyn Session>, ScpiError> {
        if !self
            .resources
            .iter()
            .any(|r| r.eq_ignore_ascii_case(resource_id))
        {
            return Err(ScpiError::UnsupportedResource(resource_id.to_string()));
        }
        self.opened += 1;
        match self.session.take() {
            Some(session) => Ok(Box::new(session)),
            None => Err(ScpiError::Transport(format!(
                "Loopback resource {resource_id} has no session left to open (open number {}).",
                self.opened
            ))),
        }
    }
}
