//! The batcher task: drains submitted requests, collapses tube-affine
//! commands against the tracked server state, and writes each batch as a
//! single buffer.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::error::ErrorKind;
use crate::proto::reply::{reply_error, Reply};
use crate::proto::{Affinity, Request};

pub(crate) async fn run<W>(
    mut submit: mpsc::Receiver<Request>,
    mut wr: W,
    inflight: mpsc::UnboundedSender<Request>,
) where
    W: AsyncWrite + Unpin + Send,
{
    // The server starts every connection using "default" and watching
    // {"default"}; track its state from there.
    let mut used = String::from("default");
    let mut watched = vec![String::from("default")];

    while let Some(first) = submit.recv().await {
        let mut batch = vec![first];
        while let Ok(req) = submit.try_recv() {
            batch.push(req);
        }

        let batch = rewrite_used(&mut used, batch);
        let batch = rewrite_watched(&mut watched, batch);

        let mut wire = Vec::with_capacity(batch.iter().map(|r| r.cmd.len()).sum());
        for req in &batch {
            wire.extend_from_slice(&req.cmd);
        }

        if let Err(e) = write_batch(&mut wr, &wire).await {
            let err = Arc::new(e);
            tracing::debug!(error = %err, "batch write failed, shutting down");
            for req in batch {
                req.fail(ErrorKind::Io(Arc::clone(&err)));
            }
            break;
        }

        // Hand the batch to the receiver in emission order. A refused
        // hand-off means the receiver tore the connection down; resolve
        // what's left and stop accepting submissions.
        let mut dead = false;
        for req in batch {
            if dead {
                req.fail(ErrorKind::ConnectionClosed);
            } else if let Err(mpsc::error::SendError(req)) = inflight.send(req) {
                dead = true;
                req.fail(ErrorKind::ConnectionClosed);
            }
        }
        if dead {
            break;
        }
    }

    // Either the connection failed or every handle was dropped. Shut the
    // write side down so the server sees EOF and the receiver can drain.
    let _ = wr.shutdown().await;
}

async fn write_batch<W: AsyncWrite + Unpin>(wr: &mut W, wire: &[u8]) -> std::io::Result<()> {
    wr.write_all(wire).await?;
    wr.flush().await
}

/// Insert `use` commands where a request's tube differs from the tracked
/// used tube, and track the switch.
fn rewrite_used(used: &mut String, batch: Vec<Request>) -> Vec<Request> {
    let mut out = Vec::with_capacity(batch.len());
    for req in batch {
        let switch = match &req.affinity {
            Affinity::Use(tube) if tube.as_str() != used.as_str() => Some(tube.clone()),
            _ => None,
        };
        match switch {
            Some(tube) => {
                let (use_req, orig) = use_op(&tube, req);
                out.push(use_req);
                out.push(orig);
                *used = tube;
            }
            None => out.push(req),
        }
    }
    out
}

/// Insert `watch`/`ignore` commands to move the tracked watch list to each
/// watching request's set before that request.
fn rewrite_watched(watched: &mut Vec<String>, batch: Vec<Request>) -> Vec<Request> {
    let mut out = Vec::with_capacity(batch.len());
    for req in batch {
        if let Affinity::Watch(want) = &req.affinity {
            for name in want {
                if !watched.contains(name) {
                    out.push(watch_op(name));
                }
            }
            for name in watched.iter() {
                if !want.contains(name) {
                    out.push(ignore_op(name));
                }
            }
            *watched = want.clone();
        }
        out.push(req);
    }
    out
}

/// Split a tube-switching request into a synthesized `use` plus the
/// original command, both of which go on the wire. The adapter task waits
/// for both replies and delivers exactly one result to the caller: the
/// `use` command's failure outranks the original's, and a `use` that draws
/// a server error keyword is delivered as-is so the caller's decoder maps
/// it with the `use` command in the envelope.
fn use_op(tube: &str, dep: Request) -> (Request, Request) {
    let (use_tx, use_rx) = oneshot::channel::<Reply>();
    let (orig_tx, orig_rx) = oneshot::channel::<Reply>();

    let Request {
        cmd,
        affinity,
        promise,
    } = dep;

    tokio::spawn(async move {
        let use_reply = use_rx.await;
        let orig_reply = orig_rx.await;
        let deliver = match use_reply {
            Ok(u) if u.err.is_some() => u,
            Ok(u) if reply_error(&u.word).is_some() => u,
            Ok(_) => match orig_reply {
                Ok(o) => o,
                Err(_) => Reply::failed(Vec::new(), ErrorKind::ConnectionClosed),
            },
            Err(_) => Reply::failed(Vec::new(), ErrorKind::ConnectionClosed),
        };
        let _ = promise.send(deliver);
    });

    let use_req = Request {
        cmd: format!("use {tube}\r\n").into_bytes(),
        affinity: Affinity::None,
        promise: use_tx,
    };
    let orig = Request {
        cmd,
        affinity,
        promise: orig_tx,
    };
    (use_req, orig)
}

fn watch_op(tube: &str) -> Request {
    synthetic(format!("watch {tube}\r\n"))
}

fn ignore_op(tube: &str) -> Request {
    synthetic(format!("ignore {tube}\r\n"))
}

/// A synthesized command whose reply no caller is waiting on. The reply
/// still has to be consumed to keep the in-flight queue aligned; anything
/// other than a clean `WATCHING` is logged and dropped.
fn synthetic(cmd: String) -> Request {
    let (tx, rx) = oneshot::channel::<Reply>();
    let label = cmd.trim_end().to_string();
    tokio::spawn(async move {
        if let Ok(reply) = rx.await {
            if reply.err.is_some() || reply.word != "WATCHING" {
                tracing::warn!(
                    cmd = %label,
                    line = %reply.line.trim_end(),
                    "unexpected reply to synthesized command"
                );
            }
        }
    });
    Request {
        cmd: cmd.into_bytes(),
        affinity: Affinity::None,
        promise: tx,
    }
}
