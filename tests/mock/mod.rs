use beanstalk::Conn;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::{timeout, Duration};

/// The server's end of an in-memory connection. Canned replies are loaded
/// up front (the client only reads a reply once its command is in flight,
/// so scripting ahead is safe), and the bytes the client writes are read
/// back out for assertion.
pub struct Server {
    stream: DuplexStream,
}

/// A connection wired to a scripted server that will answer with `reply`.
pub async fn responder(reply: &[u8]) -> (Conn, Server) {
    init_tracing();
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    if !reply.is_empty() {
        server.write_all(reply).await.unwrap();
    }
    (Conn::with_stream("<fake>", client), Server { stream: server })
}

impl Server {
    /// Assert that the next bytes the client put on the wire are exactly
    /// `wire`.
    pub async fn expect(&mut self, wire: &str) {
        let mut buf = vec![0u8; wire.len()];
        timeout(Duration::from_secs(5), self.stream.read_exact(&mut buf))
            .await
            .expect("timed out waiting for client bytes")
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&buf), wire);
    }

    /// Assert that the client writes nothing for a little while.
    pub async fn expect_idle(&mut self) {
        let mut buf = [0u8; 1];
        let read = timeout(Duration::from_millis(50), self.stream.read(&mut buf)).await;
        assert!(read.is_err(), "client unexpectedly wrote {:?}", buf[0] as char);
    }

    /// Send more scripted reply bytes.
    pub async fn push(&mut self, reply: &[u8]) {
        self.stream.write_all(reply).await.unwrap();
    }

    /// Stop replying, as if the server process died: the client sees EOF.
    pub async fn hang_up(&mut self) {
        self.stream.shutdown().await.unwrap();
    }
}

/// Route the pipeline's `tracing` output (synthesized-command warnings,
/// teardown notices) through the test capture, so it shows up in failing
/// test output. `try_init` loses the race gracefully when another test got
/// there first.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
