//! The dynamic command builder.
//!
//! A [`CommandNode`] is one node in the SCPI command tree. Nodes are created from a
//! [`Connection`] and extended name by name; any name is accepted, since the command set of an
//! instrument is only known to the instrument itself. Calling a node turns it into a query or a
//! write, depending on the arguments.

use crate::{Connection, ScpiArg, ScpiError};

/// Delimiter between the segments of a command path.
pub const DELIMITER: char = ':';

/// What to do with a command path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    /// `<path>?`
    Query,
    /// `<path>? <args>`
    QueryWith(Vec<String>),
    /// `<path> <args>`
    Write(Vec<String>),
    /// `<path>`, a command without arguments, e.g., `*RST`.
    Execute,
}

impl Invocation {
    /// Pick the invocation from the shape of the arguments.
    ///
    /// Without arguments, this is always a [`Invocation::Query`]. With arguments, it is a
    /// [`Invocation::Write`], unless `query` is set, which makes it a [`Invocation::QueryWith`].
    pub fn from_args(args: &[&dyn ScpiArg], query: bool) -> Self {
        if args.is_empty() {
            return Invocation::Query;
        }
        let args = args.iter().map(|a| a.to_scpi()).collect();
        if query {
            Invocation::QueryWith(args)
        } else {
            Invocation::Write(args)
        }
    }

    /// Whether the instrument is expected to reply.
    pub fn is_query(&self) -> bool {
        matches!(self, Invocation::Query | Invocation::QueryWith(_))
    }
}

/// Result of calling a [`CommandNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The reply to a query.
    Response(String),
    /// Acknowledgement of a write by the transport, i.e., the number of bytes written.
    Ack(usize),
}

impl Reply {
    /// The reply to a query, `None` for writes.
    pub fn into_response(self) -> Option<String> {
        match self {
            Reply::Response(resp) => Some(resp),
            Reply::Ack(_) => None,
        }
    }
}

/// One node in a SCPI command path.
///
/// Nodes are immutable and cheap to clone, so a node can be kept around as a shorthand for a long
/// path. Nothing is sent until the node is called.
///
/// # Example
///
/// ```
/// use easyscpi::{Connection, Invocation, Reply};
///
/// let mut inst = Connection::builder()
///     .backend("@sim")
///     .port("TCPIP::0.0.0.1::3000::SOCKET")
///     .port_match(false)
///     .build()
///     .unwrap();
/// inst.connect().unwrap();
///
/// let freq = inst.node("freq");
/// assert_eq!(freq.command(), "FREQ");
/// assert_eq!(freq.query().unwrap(), "100.00");
///
/// // Set the frequency, the mock instrument acknowledges with "OK".
/// freq.write(&[&2.5]).unwrap();
/// assert_eq!(inst.read().unwrap(), "OK");
/// assert_eq!(
///     freq.call(Invocation::Query).unwrap(),
///     Reply::Response("2.50".to_string())
/// );
/// ```
#[derive(Clone)]
pub struct CommandNode<'c> {
    conn: &'c Connection,
    path: String,
    prefixed: bool,
    arg_separator: String,
}

impl<'c> CommandNode<'c> {
    /// Empty root of a new command path, see [`Connection::node`].
    pub(crate) fn root(conn: &'c Connection) -> Self {
        CommandNode {
            conn,
            path: String::new(),
            prefixed: conn.prefix_commands(),
            arg_separator: conn.arg_separator().to_string(),
        }
    }

    /// Extend the path by one segment. The name is converted to upper case.
    pub fn node(&self, name: &str) -> CommandNode<'c> {
        let name = name.to_uppercase();
        let path = if self.path.is_empty() {
            name
        } else {
            format!("{}{DELIMITER}{name}", self.path)
        };
        CommandNode {
            conn: self.conn,
            path,
            prefixed: self.prefixed,
            arg_separator: self.arg_separator.clone(),
        }
    }

    /// Extend the path by all segments of a colon-delimited path, e.g., `"sour:freq"`.
    ///
    /// Empty segments, e.g., from a leading colon, are skipped.
    pub fn path_node(&self, path: &str) -> CommandNode<'c> {
        path.split(DELIMITER)
            .filter(|seg| !seg.is_empty())
            .fold(self.clone(), |node, seg| node.node(seg))
    }

    /// The path without prefix, e.g., `"SOUR:FREQ"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the rendered command starts with a delimiter.
    pub fn is_prefixed(&self) -> bool {
        self.prefixed
    }

    /// The rendered path, e.g., `":SOUR:FREQ"` if prefixed.
    pub fn command(&self) -> String {
        if self.prefixed {
            format!("{DELIMITER}{}", self.path)
        } else {
            self.path.clone()
        }
    }

    /// The message that an invocation of this node sends.
    pub fn render(&self, invocation: &Invocation) -> String {
        let cmd = self.command();
        match invocation {
            Invocation::Query => format!("{cmd}?"),
            Invocation::QueryWith(args) => format!("{cmd}? {}", args.join(&self.arg_separator)),
            Invocation::Write(args) => format!("{cmd} {}", args.join(&self.arg_separator)),
            Invocation::Execute => cmd,
        }
    }

    /// Send the invocation through the connection.
    pub fn call(&self, invocation: Invocation) -> Result<Reply, ScpiError> {
        let msg = self.render(&invocation);
        if invocation.is_query() {
            Ok(Reply::Response(self.conn.query(&msg)?))
        } else {
            Ok(Reply::Ack(self.conn.write(&msg)?))
        }
    }

    /// Call the node with the given arguments, see [`Invocation::from_args`].
    pub fn call_with(&self, args: &[&dyn ScpiArg], query: bool) -> Result<Reply, ScpiError> {
        self.call(Invocation::from_args(args, query))
    }

    /// Query the value, sends `<path>?`.
    pub fn query(&self) -> Result<String, ScpiError> {
        self.conn.query(&self.render(&Invocation::Query))
    }

    /// Query with arguments, sends `<path>? <args>`, or `<path>?` without arguments.
    pub fn query_with(&self, args: &[&dyn ScpiArg]) -> Result<String, ScpiError> {
        self.conn
            .query(&self.render(&Invocation::from_args(args, true)))
    }

    /// Set a value, sends `<path> <args>`. Without arguments, this is the same as
    /// [`CommandNode::execute`].
    pub fn write(&self, args: &[&dyn ScpiArg]) -> Result<usize, ScpiError> {
        let invocation = match Invocation::from_args(args, false) {
            Invocation::Query => Invocation::Execute,
            other => other,
        };
        self.conn.write(&self.render(&invocation))
    }

    /// Run a command without arguments, sends `<path>`.
    pub fn execute(&self) -> Result<usize, ScpiError> {
        self.conn.write(&self.render(&Invocation::Execute))
    }
}

impl std::fmt::Debug for CommandNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("path", &self.path)
            .field("prefixed", &self.prefixed)
            .field("arg_separator", &self.arg_separator)
            .finish()
    }
}
