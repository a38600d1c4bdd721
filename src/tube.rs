use std::collections::HashMap;

use crate::conn::Conn;
use crate::error::{Error, ErrorKind};
use crate::job::Job;
use crate::proto::Affinity;
use crate::Micros;

const NAME_MAX: usize = 200;

/// Validate a tube name: 1–200 bytes from `[A-Za-z0-9+/;.$_()-]`, not
/// starting with `-`.
pub(crate) fn check_name(name: &str) -> Result<(), ErrorKind> {
    if name.len() > NAME_MAX {
        return Err(ErrorKind::NameTooLong);
    }
    if name.is_empty() || name.starts_with('-') {
        return Err(ErrorKind::IllegalChar);
    }
    if !name.bytes().all(legal_name_byte) {
        return Err(ErrorKind::IllegalChar);
    }
    Ok(())
}

fn legal_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'-' | b'+' | b'/' | b';' | b'.' | b'$' | b'_' | b'(' | b')')
}

/// A single named tube on one connection; the producer side of the API.
///
/// Commands that act on the connection's *used* tube (`put`, `kick`, and
/// the tube peeks) switch the used tube on demand: the first such command
/// costs an extra `use` round trip folded into the same batch, and
/// subsequent ones on the same tube cost nothing. Commands that name the
/// tube inline (`pause`, `stats`) never switch it.
///
/// Obtained from [`Conn::tube`].
#[derive(Debug, Clone)]
pub struct Tube {
    conn: Conn,
    name: String,
}

impl Tube {
    pub(crate) fn new_unchecked(conn: Conn, name: String) -> Tube {
        Tube { conn, name }
    }

    /// The tube's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Put a job with the given body into this tube and return its id.
    ///
    /// `pri` orders ready jobs (lower runs sooner), `delay` keeps the job
    /// invisible after insertion, and `ttr` is how long a consumer may
    /// hold the job once reserved. `delay` and `ttr` are sent with
    /// one-second granularity.
    pub async fn put(
        &self,
        body: &[u8],
        pri: u32,
        delay: Micros,
        ttr: Micros,
    ) -> Result<u64, Error> {
        let mut cmd = format!(
            "put {} {} {} {}\r\n",
            pri,
            delay.as_secs(),
            ttr.as_secs(),
            body.len()
        )
        .into_bytes();
        cmd.extend_from_slice(body);
        cmd.extend_from_slice(b"\r\n");
        self.conn
            .run(cmd, Affinity::Use(self.name.clone()))
            .await
            .check_int(self.conn.name(), "INSERTED")
    }

    /// Get a copy of the next ready job in this tube, if any.
    pub async fn peek_ready(&self) -> Result<Job, Error> {
        self.peek_state("ready").await
    }

    /// Get a copy of the next delayed job in this tube, if any.
    pub async fn peek_delayed(&self) -> Result<Job, Error> {
        self.peek_state("delayed").await
    }

    /// Get a copy of a buried job in this tube, if any.
    pub async fn peek_buried(&self) -> Result<Job, Error> {
        self.peek_state("buried").await
    }

    async fn peek_state(&self, state: &str) -> Result<Job, Error> {
        let cmd = format!("peek-{state}\r\n").into_bytes();
        self.conn
            .run(cmd, Affinity::Use(self.name.clone()))
            .await
            .check_job(&self.conn, "FOUND")
    }

    /// Kick up to `bound` buried (or, if none are buried, delayed) jobs in
    /// this tube into the ready queue; returns how many were kicked.
    pub async fn kick(&self, bound: u64) -> Result<u64, Error> {
        let cmd = format!("kick {bound}\r\n").into_bytes();
        self.conn
            .run(cmd, Affinity::Use(self.name.clone()))
            .await
            .check_int(self.conn.name(), "KICKED")
    }

    /// Prevent jobs from being reserved from this tube for the given time.
    /// The server applies one-second granularity.
    pub async fn pause(&self, delay: Micros) -> Result<(), Error> {
        // Carries the tube name inline; the used tube is not involved.
        let cmd = format!("pause-tube {} {}\r\n", self.name, delay.as_secs()).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_word(self.conn.name(), "PAUSED")
    }

    /// Statistics about this tube.
    pub async fn stats(&self) -> Result<HashMap<String, String>, Error> {
        let cmd = format!("stats-tube {}\r\n", self.name).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_dict(self.conn.name())
    }
}

/// A set of tubes to consume from on one connection.
///
/// [`TubeSet::reserve`] draws a job from any tube in the set. The
/// connection's watch list is reconciled lazily: the `watch` and `ignore`
/// commands needed to make the server's list match this set are batched in
/// front of the reserve itself, and reserving repeatedly from the same set
/// sends no extra traffic at all.
///
/// Obtained from [`Conn::tube_set`].
#[derive(Debug, Clone)]
pub struct TubeSet {
    conn: Conn,
    names: Vec<String>,
    timeout: Micros,
}

impl TubeSet {
    pub(crate) fn new_unchecked(conn: Conn, names: Vec<String>) -> TubeSet {
        TubeSet {
            conn,
            names,
            timeout: Micros::INFINITY,
        }
    }

    /// The tubes in this set, in the order given at construction.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Use the given reserve timeout instead of the default
    /// [`Micros::INFINITY`]. The timeout is enforced by the server, with
    /// one-second granularity.
    pub fn with_timeout(mut self, timeout: Micros) -> TubeSet {
        self.timeout = timeout;
        self
    }

    /// Reserve a job from any one of the tubes in this set.
    ///
    /// Waits until a job is ready or the timeout elapses; on timeout the
    /// error is [`ErrorKind::TimedOut`].
    ///
    /// [`ErrorKind::TimedOut`]: crate::ErrorKind::TimedOut
    pub async fn reserve(&self) -> Result<Job, Error> {
        let cmd = format!("reserve-with-timeout {}\r\n", self.timeout.as_secs()).into_bytes();
        self.conn
            .run(cmd, Affinity::Watch(self.names.clone()))
            .await
            .check_job(&self.conn, "RESERVED")
    }
}
