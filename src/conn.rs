use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, ErrorKind};
use crate::job::Job;
use crate::proto::{self, Affinity, Reply};
use crate::tube::{check_name, Tube, TubeSet};
use crate::Micros;

/// A connection to a beanstalkd server.
///
/// A `Conn` is a cheap handle onto a per-connection pipeline; clone it
/// freely and issue commands from as many tasks as you like. Commands from
/// concurrent callers are batched onto the socket together, and commands
/// that depend on the connection's used tube or watch list have the
/// necessary `use`/`watch`/`ignore` traffic inserted (or elided) for them.
///
/// Methods on `Conn` itself are the commands that operate outside any
/// tube. Producing into a tube goes through [`Conn::tube`], consuming
/// through [`Conn::tube_set`].
///
/// Dropping every handle onto a connection (including its [`Tube`]s,
/// [`TubeSet`]s, and [`Job`]s) shuts the pipeline down and closes the
/// socket.
#[derive(Debug, Clone)]
pub struct Conn {
    name: Arc<str>,
    submit: proto::Submit,
}

impl Conn {
    /// Connect to the beanstalkd server at `addr` (`host:port`).
    ///
    /// The new connection produces into the `default` tube and watches
    /// only `default`, per the protocol.
    pub async fn dial(addr: &str) -> Result<Conn, Error> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::bare(addr, ErrorKind::from(e)))?;
        Ok(Conn::with_stream(addr, stream))
    }

    /// Run a connection over an already-established stream.
    ///
    /// `name` is used in error envelopes; it is usually the remote
    /// address. This is how tests drive the client against an in-memory
    /// stream, and how a non-TCP transport would be plugged in.
    ///
    /// Must be called from within a tokio runtime: the connection's
    /// pipeline tasks are spawned here.
    pub fn with_stream<S>(name: &str, stream: S) -> Conn
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Conn {
            name: Arc::from(name),
            submit: proto::spawn(stream),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn run(&self, cmd: Vec<u8>, affinity: Affinity) -> Reply {
        proto::submit(&self.submit, cmd, affinity).await
    }

    /// A handle onto the named tube. Validates the name; no I/O happens.
    pub fn tube(&self, name: impl Into<String>) -> Result<Tube, Error> {
        let name = name.into();
        check_name(&name).map_err(|kind| Error::bare(&self.name, kind))?;
        Ok(Tube::new_unchecked(self.clone(), name))
    }

    /// A handle onto a set of tubes to consume from. Validates every name
    /// and drops duplicates (first occurrence wins); no I/O happens.
    ///
    /// The reserve timeout defaults to [`Micros::INFINITY`]; see
    /// [`TubeSet::with_timeout`].
    pub fn tube_set<I, S>(&self, names: I) -> Result<TubeSet, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Vec::new();
        for name in names {
            let name = name.into();
            check_name(&name).map_err(|kind| Error::bare(&self.name, kind))?;
            if !set.contains(&name) {
                set.push(name);
            }
        }
        Ok(TubeSet::new_unchecked(self.clone(), set))
    }

    /// Get a copy of the job with the given id.
    pub async fn peek(&self, id: u64) -> Result<Job, Error> {
        let cmd = format!("peek {id}\r\n").into_bytes();
        self.run(cmd, Affinity::None).await.check_job(self, "FOUND")
    }

    /// Server-wide statistics.
    pub async fn stats(&self) -> Result<HashMap<String, String>, Error> {
        self.run(b"stats\r\n".to_vec(), Affinity::None)
            .await
            .check_dict(&self.name)
    }

    /// The names of all tubes that currently exist on the server.
    pub async fn list_tubes(&self) -> Result<Vec<String>, Error> {
        self.run(b"list-tubes\r\n".to_vec(), Affinity::None)
            .await
            .check_list(&self.name)
    }

    /// The tube this connection is currently producing into, as the server
    /// sees it.
    pub async fn list_tube_used(&self) -> Result<String, Error> {
        self.run(b"list-tube-used\r\n".to_vec(), Affinity::None)
            .await
            .check_arg(&self.name, "USING")
    }

    /// The tubes this connection is currently watching, as the server sees
    /// them.
    pub async fn list_tubes_watched(&self) -> Result<Vec<String>, Error> {
        self.run(b"list-tubes-watched\r\n".to_vec(), Affinity::None)
            .await
            .check_list(&self.name)
    }

    /// Kick the job with the given id out of the buried or delayed state
    /// into the ready queue.
    pub async fn kick_job(&self, id: u64) -> Result<(), Error> {
        let cmd = format!("kick-job {id}\r\n").into_bytes();
        self.run(cmd, Affinity::None).await.check_word(&self.name, "KICKED")
    }

    /// Put a job into the `default` tube. Shorthand for going through
    /// [`Conn::tube`].
    pub async fn put(
        &self,
        body: &[u8],
        pri: u32,
        delay: Micros,
        ttr: Micros,
    ) -> Result<u64, Error> {
        self.default_tube().put(body, pri, delay, ttr).await
    }

    /// Reserve a job from the `default` tube. Shorthand for going through
    /// [`Conn::tube_set`].
    pub async fn reserve(&self) -> Result<Job, Error> {
        TubeSet::new_unchecked(self.clone(), vec![String::from("default")])
            .reserve()
            .await
    }

    fn default_tube(&self) -> Tube {
        Tube::new_unchecked(self.clone(), String::from("default"))
    }
}
