//! Server replies and the per-command decoders that turn them into typed
//! values.

use std::collections::HashMap;

use crate::conn::Conn;
use crate::error::{Error, ErrorKind};
use crate::job::Job;

/// One server reply, matched to the command that provoked it.
pub(crate) struct Reply {
    /// Echo of the command bytes, kept for the error envelope.
    pub(crate) cmd: Vec<u8>,
    /// The raw reply line, terminator included. On a transport failure this
    /// holds whatever partial bytes were read.
    pub(crate) line: String,
    /// The body, for body-bearing replies; empty otherwise.
    pub(crate) body: Vec<u8>,
    /// First whitespace-delimited word of the reply line.
    pub(crate) word: String,
    /// The remaining words.
    pub(crate) args: Vec<String>,
    /// A transport or pipeline failure, if the reply never arrived.
    pub(crate) err: Option<ErrorKind>,
}

impl Reply {
    pub(crate) fn failed(cmd: Vec<u8>, kind: ErrorKind) -> Reply {
        Reply {
            cmd,
            line: String::new(),
            body: Vec::new(),
            word: String::new(),
            args: Vec::new(),
            err: Some(kind),
        }
    }
}

/// Map a server error keyword to its typed error.
pub(crate) fn reply_error(word: &str) -> Option<ErrorKind> {
    match word {
        "OUT_OF_MEMORY" => Some(ErrorKind::OutOfMemory),
        "INTERNAL_ERROR" => Some(ErrorKind::InternalError),
        "DRAINING" => Some(ErrorKind::Draining),
        "BAD_FORMAT" => Some(ErrorKind::BadFormat),
        "UNKNOWN_COMMAND" => Some(ErrorKind::UnknownCommand),
        "BURIED" => Some(ErrorKind::Buried),
        "EXPECTED_CRLF" => Some(ErrorKind::ExpectedCrLf),
        "JOB_TOO_BIG" => Some(ErrorKind::JobTooBig),
        "DEADLINE_SOON" => Some(ErrorKind::DeadlineSoon),
        "TIMED_OUT" => Some(ErrorKind::TimedOut),
        "NOT_FOUND" => Some(ErrorKind::NotFound),
        "NOT_IGNORED" => Some(ErrorKind::NotIgnored),
        _ => None,
    }
}

/// Strict base-10 unsigned parse: digits only, no sign, no surrounding
/// junk (tokenization already trimmed whitespace).
fn uint(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl Reply {
    fn envelope(&self, conn: &str, kind: ErrorKind) -> Error {
        Error::new(conn, &self.cmd, &self.line, kind)
    }

    /// The checks every decoder runs first: propagate a transport failure,
    /// map a server error keyword, and require the expected success
    /// keyword. `BURIED` is both an error keyword and the success keyword
    /// for `bury`, so the expected-keyword match wins.
    fn expect(self, conn: &str, word: &str) -> Result<Reply, Error> {
        if let Some(kind) = self.err.clone() {
            return Err(self.envelope(conn, kind));
        }
        if self.word != word {
            if let Some(kind) = reply_error(&self.word) {
                return Err(self.envelope(conn, kind));
            }
            return Err(self.envelope(conn, ErrorKind::BadReply));
        }
        Ok(self)
    }

    /// `<word> <n>` replies: `INSERTED <id>`, `KICKED <count>`.
    pub(crate) fn check_int(self, conn: &str, word: &str) -> Result<u64, Error> {
        let r = self.expect(conn, word)?;
        if r.args.len() != 1 {
            return Err(r.envelope(conn, ErrorKind::BadReply));
        }
        match uint(&r.args[0]) {
            Some(n) => Ok(n),
            None => Err(r.envelope(conn, ErrorKind::BadReply)),
        }
    }

    /// Bare-word replies: `DELETED`, `TOUCHED`, `BURIED`, `RELEASED`,
    /// `PAUSED`, `KICKED`.
    pub(crate) fn check_word(self, conn: &str, word: &str) -> Result<(), Error> {
        self.expect(conn, word).map(|_| ())
    }

    /// `<word> <name>` replies: `USING <tube>`.
    pub(crate) fn check_arg(self, conn: &str, word: &str) -> Result<String, Error> {
        let mut r = self.expect(conn, word)?;
        if r.args.len() != 1 {
            return Err(r.envelope(conn, ErrorKind::BadReply));
        }
        Ok(r.args.remove(0))
    }

    /// `FOUND <id> <len>` / `RESERVED <id> <len>` replies with a body.
    pub(crate) fn check_job(self, conn: &Conn, word: &str) -> Result<Job, Error> {
        let r = self.expect(conn.name(), word)?;
        if r.args.len() != 2 {
            return Err(r.envelope(conn.name(), ErrorKind::BadReply));
        }
        let id = match uint(&r.args[0]) {
            Some(id) => id,
            None => return Err(r.envelope(conn.name(), ErrorKind::BadReply)),
        };
        if uint(&r.args[1]).is_none() {
            return Err(r.envelope(conn.name(), ErrorKind::BadReply));
        }
        Ok(Job::new(id, r.body, conn.clone()))
    }

    /// `OK <len>` replies whose body is a YAML-lite dictionary.
    pub(crate) fn check_dict(self, conn: &str) -> Result<HashMap<String, String>, Error> {
        let r = self.check_payload(conn)?;
        Ok(parse_dict(&String::from_utf8_lossy(&r.body)))
    }

    /// `OK <len>` replies whose body is a YAML-lite list.
    pub(crate) fn check_list(self, conn: &str) -> Result<Vec<String>, Error> {
        let r = self.check_payload(conn)?;
        Ok(parse_list(&String::from_utf8_lossy(&r.body)))
    }

    fn check_payload(self, conn: &str) -> Result<Reply, Error> {
        let r = self.expect(conn, "OK")?;
        if r.args.len() != 1 || uint(&r.args[0]).is_none() {
            return Err(r.envelope(conn, ErrorKind::BadReply));
        }
        Ok(r)
    }
}

/// Parse the YAML-lite dictionary the server sends for `stats*`. An
/// optional leading `---` marker, then `key: value` lines; anything else
/// is skipped.
pub(crate) fn parse_dict(s: &str) -> HashMap<String, String> {
    let s = s.strip_prefix("---").unwrap_or(s);
    let mut d = HashMap::new();
    for line in s.trim().split('\n') {
        if let Some((k, v)) = line.split_once(": ") {
            d.insert(k.to_string(), v.to_string());
        }
    }
    d
}

/// Parse the YAML-lite list the server sends for `list-tubes*`. An
/// optional leading `---` marker, then `- item` lines; anything else is
/// skipped.
pub(crate) fn parse_list(s: &str) -> Vec<String> {
    let s = s.strip_prefix("---").unwrap_or(s);
    s.trim()
        .split('\n')
        .filter_map(|line| line.strip_prefix("- "))
        .map(str::to_string)
        .collect()
}
