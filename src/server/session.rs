//! Read/dispatch/write loop shared by all stream connections.

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use super::protocol::{self, Command, Reply};
use crate::error::LobbyError;

/// Longest accepted command line, in bytes.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Per-connection command handler.
pub trait SessionHandler: Send {
    /// Handles one decoded command and produces the reply.
    fn handle(&mut self, command: Command) -> impl Future<Output = Reply> + Send;

    /// Called once when the connection ends, for any reason.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Runs a connection until the peer disconnects or `token` is cancelled.
///
/// Malformed lines get an error reply; they never drop the connection.
pub async fn run_session<S, H>(stream: S, peer: SocketAddr, mut handler: H, token: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: SessionHandler,
{
    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (mut tx, mut rx) = framed.split();

    loop {
        tokio::select! {
            () = token.cancelled() => {
                tracing::debug!(%peer, "closing session for shutdown");
                break;
            }
            line = rx.next() => {
                let reply = match line {
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match protocol::decode(&line) {
                            Ok(command) => handler.handle(command).await,
                            Err(reply) => reply,
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        tracing::warn!(%peer, limit = MAX_LINE_LENGTH, "command line too long");
                        Reply::from(LobbyError::InvalidRequest(format!(
                            "line exceeds {MAX_LINE_LENGTH} bytes"
                        )))
                    }
                    Some(Err(LinesCodecError::Io(e))) => {
                        tracing::debug!(%peer, error = %e, "session read failed");
                        break;
                    }
                    None => break,
                };
                if tx.send(protocol::encode(&reply)).await.is_err() {
                    break;
                }
            }
        }
    }

    handler.close().await;
    tracing::debug!(%peer, "session closed");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;

    struct PingOnly {
        closed: Arc<AtomicBool>,
    }

    impl SessionHandler for PingOnly {
        async fn handle(&mut self, command: Command) -> Reply {
            match command {
                Command::Ping => Reply::Pong,
                _ => Reply::from(LobbyError::InvalidRequest("unsupported".to_string())),
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn peer() -> SocketAddr {
        ([127, 0, 0, 1], 50_000).into()
    }

    #[tokio::test]
    async fn answers_ping_then_closes_on_eof() {
        let closed = Arc::new(AtomicBool::new(false));
        let stream = tokio_test::io::Builder::new()
            .read(b"{\"command\":\"ping\"}\n")
            .write(b"{\"command\":\"pong\"}\n")
            .build();
        let handler = PingOnly {
            closed: Arc::clone(&closed),
        };

        run_session(stream, peer(), handler, CancellationToken::new()).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn malformed_line_keeps_connection_open() {
        let (client, server) = tokio::io::duplex(1024);
        let handler = PingOnly {
            closed: Arc::new(AtomicBool::new(false)),
        };
        let session = tokio::spawn(run_session(server, peer(), handler, CancellationToken::new()));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        assert!(write_half.write_all(b"garbage\n").await.is_ok());
        let Ok(Some(first)) = lines.next_line().await else {
            panic!("expected an error reply");
        };
        assert!(first.contains("\"error\""));

        assert!(write_half.write_all(b"{\"command\":\"ping\"}\n").await.is_ok());
        let Ok(Some(second)) = lines.next_line().await else {
            panic!("expected a pong");
        };
        assert_eq!(second, r#"{"command":"pong"}"#);

        drop(write_half);
        drop(lines);
        let finished = tokio::time::timeout(Duration::from_secs(1), session).await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn cancellation_ends_idle_session() {
        let (_client, server) = tokio::io::duplex(64);
        let closed = Arc::new(AtomicBool::new(false));
        let handler = PingOnly {
            closed: Arc::clone(&closed),
        };
        let token = CancellationToken::new();
        let session = tokio::spawn(run_session(server, peer(), handler, token.clone()));

        token.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(1), session).await;
        assert!(finished.is_ok());
        assert!(closed.load(Ordering::SeqCst));
    }
}
