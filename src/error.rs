use std::io;
use std::sync::Arc;

use thiserror::Error;

/// The error envelope for every fallible operation in this crate.
///
/// Diagnosing a misbehaving queue usually requires the exact wire context,
/// so every error keeps the connection name, the command bytes that were
/// sent, and the raw reply line alongside the typed [`ErrorKind`]. For a
/// failure of an implicitly issued `use` command, `cmd` is the `use`
/// command rather than the caller's own command.
///
/// Name-validation failures happen before any I/O; their `cmd` and `reply`
/// are empty.
#[derive(Debug, Error)]
#[error("{conn}: {cmd:?} -> {reply:?}: {kind}")]
pub struct Error {
    /// Name of the connection, usually the remote address.
    pub conn: String,

    /// The command bytes sent on the wire, lossily decoded for display.
    pub cmd: String,

    /// The raw reply line as read from the server, terminator included.
    /// On a mid-reply EOF this holds the partial bytes that were read.
    pub reply: String,

    /// What went wrong.
    #[source]
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(conn: &str, cmd: &[u8], reply: &str, kind: ErrorKind) -> Error {
        Error {
            conn: conn.to_string(),
            cmd: String::from_utf8_lossy(cmd).into_owned(),
            reply: reply.to_string(),
            kind,
        }
    }

    /// An error with no wire context, e.g. from name validation.
    pub(crate) fn bare(conn: &str, kind: ErrorKind) -> Error {
        Error::new(conn, b"", "", kind)
    }
}

/// The closed set of failures a caller can observe.
///
/// The first twelve variants are reported by the server as reply keywords.
/// `BadReply` covers replies the server should never send: an unexpected
/// keyword, a wrong argument count, or a malformed integer or body length.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The server ran out of memory trying to grow its data structures.
    #[error("server out of memory")]
    OutOfMemory,

    /// The server detected an internal error, i.e. a server bug.
    #[error("server internal error")]
    InternalError,

    /// The server is in drain mode and refuses new jobs.
    #[error("server draining")]
    Draining,

    /// The server could not parse the command it was sent.
    #[error("bad command format")]
    BadFormat,

    /// The server did not recognize the command.
    #[error("unknown command")]
    UnknownCommand,

    /// The server buried the job instead of completing the operation.
    #[error("job buried")]
    Buried,

    /// The job body was not followed by CR LF.
    #[error("server expected CR LF")]
    ExpectedCrLf,

    /// The job body exceeds the server's max-job-size.
    #[error("job too big")]
    JobTooBig,

    /// A reserved job's time-to-run is about to expire.
    #[error("job deadline soon")]
    DeadlineSoon,

    /// The reserve timeout elapsed with no job available.
    #[error("reserve timed out")]
    TimedOut,

    /// No job or tube matched the request.
    #[error("job or tube not found")]
    NotFound,

    /// The watch list would become empty, so the tube was not ignored.
    #[error("tube not ignored")]
    NotIgnored,

    /// The server sent a reply this client cannot make sense of.
    #[error("bad reply from server")]
    BadReply,

    /// A tube name contains a byte outside `[A-Za-z0-9+/;.$_()-]`, starts
    /// with `-`, or is empty.
    #[error("illegal character in tube name")]
    IllegalChar,

    /// A tube name is longer than 200 bytes.
    #[error("tube name too long")]
    NameTooLong,

    /// The connection pipeline has shut down; no further commands can be
    /// sent.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O failure on the socket. The same failure is delivered to every
    /// caller that was waiting on the connection when it died, hence the
    /// shared handle.
    #[error("i/o: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> ErrorKind {
        ErrorKind::Io(Arc::new(e))
    }
}
