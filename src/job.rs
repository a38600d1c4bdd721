use std::collections::HashMap;

use crate::conn::Conn;
use crate::error::Error;
use crate::proto::Affinity;
use crate::Micros;

/// A job held by the server, together with the connection it was seen on.
///
/// Job ids are assigned by the server and scoped to it. The body is opaque
/// bytes; the client never interprets it. A `Job` obtained from
/// [`TubeSet::reserve`](crate::TubeSet::reserve) is reserved by this
/// connection until it is deleted, released, buried, or its time-to-run
/// expires; one obtained from a peek is just a copy.
#[derive(Debug, Clone)]
pub struct Job {
    id: u64,
    body: Vec<u8>,
    conn: Conn,
}

impl Job {
    pub(crate) fn new(id: u64, body: Vec<u8>, conn: Conn) -> Job {
        Job { id, body, conn }
    }

    /// The server-assigned job id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The job body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the job handle, keeping only the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Delete this job from the server.
    pub async fn delete(&self) -> Result<(), Error> {
        let cmd = format!("delete {}\r\n", self.id).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_word(self.conn.name(), "DELETED")
    }

    /// Request more time to run this reserved job, pushing its deadline
    /// back by the job's full time-to-run.
    pub async fn touch(&self) -> Result<(), Error> {
        let cmd = format!("touch {}\r\n", self.id).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_word(self.conn.name(), "TOUCHED")
    }

    /// Bury this job: take it out of the run queue until it is kicked,
    /// giving it the new priority `pri`.
    pub async fn bury(&self, pri: u32) -> Result<(), Error> {
        let cmd = format!("bury {} {}\r\n", self.id, pri).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_word(self.conn.name(), "BURIED")
    }

    /// Release this reserved job back to the ready queue with priority
    /// `pri`, after an optional delay.
    ///
    /// If the server had to bury the job instead (it ran out of memory
    /// growing the priority queue), the error is
    /// [`ErrorKind::Buried`](crate::ErrorKind::Buried).
    pub async fn release(&self, pri: u32, delay: Micros) -> Result<(), Error> {
        let cmd = format!("release {} {} {}\r\n", self.id, pri, delay.as_secs()).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_word(self.conn.name(), "RELEASED")
    }

    /// Kick this job out of the buried or delayed state into the ready
    /// queue.
    pub async fn kick(&self) -> Result<(), Error> {
        self.conn.kick_job(self.id).await
    }

    /// Statistics about this job.
    pub async fn stats(&self) -> Result<HashMap<String, String>, Error> {
        let cmd = format!("stats-job {}\r\n", self.id).into_bytes();
        self.conn
            .run(cmd, Affinity::None)
            .await
            .check_dict(self.conn.name())
    }
}
