//! The receiver task: reads reply lines and bodies off the socket and
//! resolves them against the in-flight queue in order.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::ErrorKind;
use crate::proto::reply::Reply;
use crate::proto::Request;

pub(crate) async fn run<R>(mut rd: R, mut inflight: mpsc::UnboundedReceiver<Request>)
where
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        match read_wire(&mut rd).await {
            Ok(Some(wire)) => {
                let req = match inflight.recv().await {
                    Some(req) => req,
                    None => return,
                };
                let Request { cmd, promise, .. } = req;
                let _ = promise.send(Reply {
                    cmd,
                    line: wire.line,
                    body: wire.body,
                    word: wire.word,
                    args: wire.args,
                    err: None,
                });
            }
            Ok(None) => {
                let err = io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection");
                teardown(inflight, String::new(), Arc::new(err)).await;
                return;
            }
            Err(fail) => {
                teardown(inflight, fail.partial, Arc::new(fail.err)).await;
                return;
            }
        }
    }
}

/// Deliver a transport error to every caller still waiting on this
/// connection. The caller whose reply was being read gets the partial
/// line; the rest were never answered at all. Closing the queue makes the
/// batcher's next hand-off fail, which shuts the whole pipeline down.
async fn teardown(
    mut inflight: mpsc::UnboundedReceiver<Request>,
    partial: String,
    err: Arc<io::Error>,
) {
    inflight.close();
    tracing::debug!(error = %err, "read failed, tearing down connection");
    let mut line = Some(partial);
    while let Some(req) = inflight.recv().await {
        let Request { cmd, promise, .. } = req;
        let _ = promise.send(Reply {
            cmd,
            line: line.take().unwrap_or_default(),
            body: Vec::new(),
            word: String::new(),
            args: Vec::new(),
            err: Some(ErrorKind::Io(Arc::clone(&err))),
        });
    }
}

#[derive(Debug)]
struct Wire {
    line: String,
    word: String,
    args: Vec<String>,
    body: Vec<u8>,
}

#[derive(Debug)]
struct ReadFail {
    partial: String,
    err: io::Error,
}

/// Read one complete reply: a line terminated by `\n` (a preceding `\r` is
/// tolerated and stripped with the rest of the surrounding whitespace
/// during tokenization), plus a body when the keyword calls for one.
///
/// `Ok(None)` is a clean EOF at a reply boundary. EOF in the middle of a
/// line or body is a failure carrying the partial line.
async fn read_wire<R: AsyncBufRead + Unpin>(rd: &mut R) -> Result<Option<Wire>, ReadFail> {
    let mut raw = Vec::new();
    match rd.read_until(b'\n', &mut raw).await {
        Ok(0) => return Ok(None),
        Ok(_) if raw.last() != Some(&b'\n') => {
            return Err(ReadFail {
                partial: String::from_utf8_lossy(&raw).into_owned(),
                err: io::Error::new(io::ErrorKind::UnexpectedEof, "eof mid reply line"),
            })
        }
        Ok(_) => {}
        Err(err) => {
            return Err(ReadFail {
                partial: String::from_utf8_lossy(&raw).into_owned(),
                err,
            })
        }
    }
    let line = String::from_utf8_lossy(&raw).into_owned();

    let mut words = line.split_whitespace();
    let word = words.next().unwrap_or("").to_string();
    let args: Vec<String> = words.map(str::to_string).collect();

    let mut body = Vec::new();
    let n = body_len(&word, &args);
    if n > 0 {
        body.resize(n, 0);
        if let Err(err) = rd.read_exact(&mut body).await {
            return Err(ReadFail { partial: line, err });
        }
        // The body's trailing CRLF is not part of the declared length.
        let mut crlf = [0u8; 2];
        if let Err(err) = rd.read_exact(&mut crlf).await {
            return Err(ReadFail { partial: line, err });
        }
    }

    Ok(Some(Wire {
        line,
        word,
        args,
        body,
    }))
}

/// How many body bytes follow the reply line. A malformed length is left
/// for the decoder to reject; no body is read for it.
fn body_len(word: &str, args: &[String]) -> usize {
    match word {
        "FOUND" | "RESERVED" if args.len() == 2 => args[1].parse().unwrap_or(0),
        "OK" if args.len() == 1 => args[0].parse().unwrap_or(0),
        _ => 0,
    }
}
