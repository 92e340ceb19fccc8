//! EasyScpi: Talk SCPI to your instruments without building command strings
//!
//! Instruments that speak SCPI organize their commands in a tree, e.g., `SOUR:FREQ 1000` sets the
//! frequency of a source and `SOUR:FREQ?` queries it. The EasyScpi library lets you write these
//! commands by chaining the names of the tree nodes on a [`Connection`]:
//!
//! ```
//! use easyscpi::Connection;
//!
//! let mut inst = Connection::builder()
//!     .backend("@sim")
//!     .port("TCPIP::0.0.0.1::3000::SOCKET")
//!     .port_match(false)
//!     .build()
//!     .unwrap();
//! inst.connect().unwrap();
//!
//! let freq = inst.node("freq");
//! assert_eq!(freq.query().unwrap(), "100.00");
//! ```
//!
//! No command set has to be declared up front: any name is accepted, it is converted to upper
//! case, and the instrument decides whether it understands the command.
//!
//! # Ports and backends
//!
//! Ports are given the way users know them, e.g., `COM3` on Windows, `/dev/ttyUSB0` on Linux, or
//! `TCPIP::192.168.0.2::5025::SOCKET` for an instrument on the network. The port is resolved into
//! a VISA-style resource id by the [`PortPolicy`] of the [`Platform`] and, by default, matched
//! against the resources that the backend can see.
//!
//! The backend is chosen with a selector string, see [`backend_from_selector`]:
//! - `""`: TCP/IP sockets with the standard library and, with the `serial` feature, serial ports
//!   with the [`serialport`](https://docs.rs/serialport) crate.
//! - `"@sim"`: simulated instruments, see [`SimBackend`].
//! - `"@loopback"`: scripted sessions for tests, see [`LoopbackBackend`].
//!
//! Other transports can be added by implementing [`ResourceManager`] and [`Session`] and handing
//! the manager to [`ConnectionBuilder::resource_manager`].
//!
//! # Logging
//!
//! EasyScpi logs through the [`log`](https://docs.rs/log) facade: port resolution and connection
//! changes on `debug`, every message on the wire on `trace`.
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod command;
mod connection;
mod error;
mod loopback;
mod port;
#[cfg(feature = "serial")]
mod serial;
mod session;
mod sim;
mod stream;
mod value;

pub use command::{CommandNode, DELIMITER, Invocation, Reply};
pub use connection::{Connection, ConnectionBuilder, ConnectionGuard, Handshake};
pub use error::{ErrorKind, ScpiError};
pub use loopback::{AttributeLog, LoopbackBackend, LoopbackSession};
pub use port::{
    Platform, PortPolicy, ResourcePattern, UnixPolicy, WindowsPolicy, match_resource,
};
pub use session::{
    ResourceManager, ResourceParam, Session, SessionAttributes, backend_from_selector,
};
pub use sim::{SimBackend, SimDevice, SimProperty, SimSession};
pub use stream::{Port, PortOpener, ResourceAddress, StreamBackend, StreamSession};
pub use value::{BoolLike, ScpiArg, State, to_bool, to_state};
