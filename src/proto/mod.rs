//! The connection pipeline.
//!
//! One pipeline runs per TCP connection, split across two long-lived tasks
//! that share the socket: the batcher owns the write half and the receiver
//! owns the read half. Callers never touch the socket; they hand a
//! [`Request`] to the batcher over the submit channel and wait on a private
//! oneshot slot for the matching [`Reply`].
//!
//! The in-flight queue between the two tasks is an unbounded channel so a
//! slow reader can never stall the batcher mid-batch. Emission order on
//! that queue is the request/reply matching order: the n-th reply off the
//! wire resolves the n-th request pushed by the batcher.

mod batch;
mod recv;
pub(crate) mod reply;

pub(crate) use reply::Reply;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, oneshot};

use crate::error::ErrorKind;

/// How many submitted requests may queue ahead of the batcher. Bursts past
/// this depth apply backpressure to callers rather than growing a buffer.
const SUBMIT_DEPTH: usize = 32;

/// A caller's command on its way to the wire.
pub(crate) struct Request {
    /// Full command bytes, body and terminators included.
    pub(crate) cmd: Vec<u8>,
    /// Which implicit server state the command depends on.
    pub(crate) affinity: Affinity,
    /// Where the matched reply is delivered.
    pub(crate) promise: oneshot::Sender<Reply>,
}

/// A command's dependence on per-connection server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Affinity {
    /// Independent of tube state, or carries the tube name inline.
    None,
    /// Must run while the given tube is the used tube.
    Use(String),
    /// Must run while exactly the given tubes are watched.
    Watch(Vec<String>),
}

impl Request {
    pub(crate) fn resolve(self, reply: Reply) {
        let _ = self.promise.send(reply);
    }

    /// Resolve with an error and no reply line.
    pub(crate) fn fail(self, kind: ErrorKind) {
        let Request { cmd, promise, .. } = self;
        let _ = promise.send(Reply::failed(cmd, kind));
    }
}

pub(crate) type Submit = mpsc::Sender<Request>;

/// Start the pipeline tasks for `stream` and return the submit handle.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn<S>(stream: S) -> Submit
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (submit_tx, submit_rx) = mpsc::channel(SUBMIT_DEPTH);
    let (inflight_tx, inflight_rx) = mpsc::unbounded_channel();
    let (rd, wr) = tokio::io::split(stream);
    tokio::spawn(batch::run(submit_rx, wr, inflight_tx));
    tokio::spawn(recv::run(BufReader::new(rd), inflight_rx));
    submit_tx
}

/// Submit one command and wait for its reply.
///
/// Once the pipeline has shut down (the connection died or every handle was
/// dropped) this resolves immediately with `ConnectionClosed`.
pub(crate) async fn submit(ch: &Submit, cmd: Vec<u8>, affinity: Affinity) -> Reply {
    let (tx, rx) = oneshot::channel();
    let req = Request {
        cmd,
        affinity,
        promise: tx,
    };
    match ch.send(req).await {
        Ok(()) => match rx.await {
            Ok(reply) => reply,
            Err(_) => Reply::failed(Vec::new(), ErrorKind::ConnectionClosed),
        },
        Err(mpsc::error::SendError(req)) => Reply::failed(req.cmd, ErrorKind::ConnectionClosed),
    }
}
