//! UDP packet listener used for NAT traversal queries.
//!
//! Game clients send a datagram starting with [`NAT_QUERY_PREFIX`]; the
//! server answers with the same prefix followed by the public `ip:port` it
//! saw the query arrive from. Clients use that to learn their external
//! mapping before opening peer connections.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::IO_ERROR_BACKOFF;

/// First byte of every query and its answer.
pub const NAT_QUERY_PREFIX: u8 = 0x08;

/// Largest datagram read; longer packets are truncated by the OS.
const MAX_DATAGRAM: usize = 2048;

/// Builds the answer for one datagram, or `None` if it is not a NAT query.
#[must_use]
pub fn query_reply(packet: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
    if packet.first() != Some(&NAT_QUERY_PREFIX) {
        return None;
    }
    let mut reply = vec![NAT_QUERY_PREFIX];
    reply.extend_from_slice(peer.to_string().as_bytes());
    Some(reply)
}

/// Logs a failed receive and pauses so a persistent error cannot spin
/// the loop.
async fn recv_failed(error: &std::io::Error) {
    tracing::debug!(%error, "nat recv failed");
    tokio::time::sleep(IO_ERROR_BACKOFF).await;
}

/// Answers NAT queries until `token` is cancelled. The socket is closed when
/// this returns.
pub async fn serve(socket: UdpSocket, token: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    let packet = buf.get(..len).unwrap_or_default();
                    match query_reply(packet, peer) {
                        Some(reply) => {
                            if let Err(e) = socket.send_to(&reply, peer).await {
                                tracing::debug!(%peer, error = %e, "nat reply failed");
                            }
                        }
                        None => tracing::debug!(%peer, len, "ignoring datagram without nat prefix"),
                    }
                }
                // ICMP port-unreachable from an earlier reply surfaces here on
                // some platforms; it says nothing about this socket.
                Err(e) => recv_failed(&e).await,
            },
        }
    }
    tracing::info!("nat packet listener closed");
}
