//! Error type shared by the command builder, the connection, and all transport backends.

use std::time::Duration;

use thiserror::Error;

/// Broad category of an [`ScpiError`].
///
/// Useful if you want to react to a whole class of failures, e.g., retry on transport errors
/// but bail out on configuration errors, without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection is configured in a way that cannot work.
    Configuration,
    /// Port resolution found no or too many matching resources.
    Resolution,
    /// The operation needs an open session but there is none.
    State,
    /// The instrument answered, but not with what was expected.
    Protocol,
    /// A value could not be coerced into the requested form.
    Validation,
    /// The underlying transport failed.
    Transport,
}

/// The error enum for everything in `easyscpi`.
///
/// All operations return this error such that it can be propagated with the `?` operator.
/// Transport failures are passed through as they are, nothing is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScpiError {
    /// The port specifier does not start with any of the accepted prefixes.
    #[error("Port must start with one of the following: {expected:?}. Got: {port}")]
    InvalidPort {
        /// The port specifier that was given.
        port: String,
        /// The accepted prefixes.
        expected: &'static [&'static str],
    },
    /// `connect` was called before a resource id was resolved.
    #[error("Can not connect. No resource id provided.")]
    NoResourceId,
    /// The resource pattern built from the port is not a valid regular expression.
    #[error("Resource pattern {pattern} is invalid: {source}")]
    InvalidResourcePattern {
        /// The offending pattern.
        pattern: String,
        /// Why the pattern could not be compiled.
        source: regex::Error,
    },
    /// The backend selector does not name any known backend.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
    /// The backend cannot open this kind of resource.
    #[error("Resource {0} is not supported by this backend.")]
    UnsupportedResource(String),
    /// The session does not know the given resource parameter.
    #[error("Resource parameter {0} is not supported by this session.")]
    UnsupportedParameter(String),
    /// The resource parameter is known, but its value is not usable.
    #[error("Invalid value for resource parameter {name}: {value}")]
    InvalidParameter {
        /// Name of the parameter.
        name: String,
        /// The value that was rejected, formatted for display.
        value: String,
    },
    /// No visible resource matches the pattern built from the port.
    #[error("Could not find resource {0}")]
    ResourceNotFound(String),
    /// More than one visible resource matches the pattern built from the port.
    #[error("Found multiple resources matching {pattern}: {matches:?}")]
    AmbiguousResource {
        /// The pattern that was matched against.
        pattern: String,
        /// All resources that matched.
        matches: Vec<String>,
    },
    /// The operation requires an open session.
    #[error("Can not {operation}, instrument not connected.")]
    NotConnected {
        /// The operation that was attempted, e.g., `"write"`.
        operation: &'static str,
    },
    /// The handshake read after a write or query did not return the expected message. The
    /// message that was received instead is contained in the error.
    #[error("Handshake failed, expected {expected} but instrument responded with: {received}")]
    HandshakeMismatch {
        /// The configured handshake message.
        expected: String,
        /// What the instrument sent instead.
        received: String,
    },
    /// A value could not be interpreted as a boolean state.
    #[error("Invalid input for a boolean state: {0}")]
    InvalidBool(String),
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// Timeout occurred while waiting for the read termination. The error contains the
    /// timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Any other failure reported by a transport backend.
    #[error("{0}")]
    Transport(String),
}

impl ScpiError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScpiError::InvalidPort { .. }
            | ScpiError::NoResourceId
            | ScpiError::InvalidResourcePattern { .. }
            | ScpiError::UnknownBackend(_)
            | ScpiError::UnsupportedResource(_)
            | ScpiError::UnsupportedParameter(_)
            | ScpiError::InvalidParameter { .. } => ErrorKind::Configuration,
            ScpiError::ResourceNotFound(_) | ScpiError::AmbiguousResource { .. } => {
                ErrorKind::Resolution
            }
            ScpiError::NotConnected { .. } => ErrorKind::State,
            ScpiError::HandshakeMismatch { .. } => ErrorKind::Protocol,
            ScpiError::InvalidBool(_) => ErrorKind::Validation,
            ScpiError::Io(_) | ScpiError::Timeout(_) | ScpiError::Transport(_) => {
                ErrorKind::Transport
            }
            #[cfg(feature = "serial")]
            ScpiError::Serialport(_) => ErrorKind::Transport,
        }
    }
}
