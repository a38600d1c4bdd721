//! An async client for the [beanstalkd](https://beanstalkd.github.io/) work
//! queue.
//!
//! The wire protocol is simple; what this crate adds is the plumbing that
//! makes one connection safe and fast to share. Every command issued on a
//! [`Conn`] (from any number of tasks) flows through a single pipeline that
//! batches concurrent commands into one write, matches each reply back to
//! the caller that issued the command, and manages the connection's
//! server-side tube state — the *used* tube and the *watch list* — by
//! inserting `use`, `watch`, and `ignore` commands only when that state
//! actually has to change. Issuing ten puts to the same tube from ten tasks
//! costs one `use` on the wire, total.
//!
//! We are lenient about the protocol: server replies may end in CR LF or
//! bare LF, and horizontal whitespace around reply words is ignored.
//!
//! # Producing jobs
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use beanstalk::{Conn, Micros};
//!
//! let c = Conn::dial("localhost:11300").await.unwrap();
//! let tube = c.tube("mail").unwrap();
//! let id = tube
//!     .put(b"kitten.jpg 30x30", 1024, Micros::ZERO, Micros::from_secs(120))
//!     .await
//!     .unwrap();
//! println!("inserted job {id}");
//! # });
//! ```
//!
//! If you don't care about the id, don't wait around for it: spawn the
//! call. The pipeline keeps ordering and batching correct either way.
//!
//! # Consuming jobs
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use beanstalk::Conn;
//!
//! let c = Conn::dial("localhost:11300").await.unwrap();
//! let tubes = c.tube_set(["mail", "mail-retry"]).unwrap();
//! loop {
//!     let job = tubes.reserve().await.unwrap();
//!     println!("job {}: {:?}", job.id(), job.body());
//!     job.delete().await.unwrap();
//! }
//! # });
//! ```
//!
//! # Errors
//!
//! Every failure is an [`Error`] envelope carrying the connection name,
//! the exact command bytes sent, the raw reply line, and a typed
//! [`ErrorKind`]. There is no retrying and no reconnecting here: when the
//! connection dies, every caller waiting on it gets the transport error,
//! later calls fail with [`ErrorKind::ConnectionClosed`], and it is up to
//! the application to dial again.

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

mod conn;
mod error;
mod job;
mod proto;
mod time;
mod tube;

pub use crate::conn::Conn;
pub use crate::error::{Error, ErrorKind};
pub use crate::job::Job;
pub use crate::time::Micros;
pub use crate::tube::{Tube, TubeSet};
