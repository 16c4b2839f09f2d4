//! Listener set: control plane, lobby, and the game pair.
//!
//! # Data Flow
//! ```text
//! ListenerSet (descriptors from config)
//!     → bind_all: control ∥ lobby ∥ (game tcp ∥ game udp)
//!     → BoundListeners (sockets open, nothing accepted yet)
//!     → serve: one task per listener, one task per connection
//!     → RunningListeners::shutdown: cancel, drain, close
//! ```
//!
//! Binding and serving are separate steps so a failed bind never leaves a
//! sibling accepting traffic: on failure every socket that did bind is
//! dropped before the error is returned.

pub mod control;
pub mod game;
pub mod lobby;
pub mod nat;
pub mod protocol;
pub mod session;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use self::game::GameSession;
use self::lobby::LobbySession;
use self::session::{SessionHandler, run_session};
use crate::config::ServerConfig;
use crate::error::LobbyError;
use crate::service::ServiceGraph;

/// Pending connections queued by the OS per stream listener.
const LISTEN_BACKLOG: i32 = 1024;

/// Pause after a failed `accept` or `recv_from` (e.g. out of file
/// descriptors).
const IO_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Socket type of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Connection-oriented (TCP).
    Stream,
    /// Connectionless (UDP).
    Datagram,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("tcp"),
            Self::Datagram => f.write_str("udp"),
        }
    }
}

/// What to bind, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerDescriptor {
    /// Listener name used in logs and errors.
    pub name: &'static str,
    /// Bind address.
    pub addr: SocketAddr,
    /// Socket type.
    pub transport: Transport,
    /// Enable `SO_KEEPALIVE` on the listening socket and every accepted
    /// connection.
    pub keepalive: bool,
}

/// The four sockets the server opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSet {
    /// Administrative HTTP listener.
    pub control: ListenerDescriptor,
    /// Client lobby listener.
    pub lobby: ListenerDescriptor,
    /// Game traffic stream listener.
    pub game_tcp: ListenerDescriptor,
    /// NAT query datagram listener, sharing the game address.
    pub game_udp: ListenerDescriptor,
}

impl ListenerSet {
    /// Derives the descriptors from the configured addresses.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            control: ListenerDescriptor {
                name: "control",
                addr: config.control_addr,
                transport: Transport::Stream,
                keepalive: false,
            },
            lobby: ListenerDescriptor {
                name: "lobby",
                addr: config.lobby_addr,
                transport: Transport::Stream,
                keepalive: true,
            },
            game_tcp: ListenerDescriptor {
                name: "game",
                addr: config.game_addr,
                transport: Transport::Stream,
                keepalive: false,
            },
            game_udp: ListenerDescriptor {
                name: "nat",
                addr: config.game_addr,
                transport: Transport::Datagram,
                keepalive: false,
            },
        }
    }
}

/// Actual local addresses after binding (resolves port 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerAddrs {
    /// Control plane.
    pub control: SocketAddr,
    /// Lobby.
    pub lobby: SocketAddr,
    /// Game traffic (TCP).
    pub game_tcp: SocketAddr,
    /// NAT queries (UDP).
    pub game_udp: SocketAddr,
}

/// Opens a stream listener with the descriptor's socket options.
///
/// # Errors
///
/// Returns [`LobbyError::Bind`] if the socket cannot be created, configured
/// or bound.
pub fn bind_stream(desc: &ListenerDescriptor) -> Result<TcpListener, LobbyError> {
    let bind_err = |source| LobbyError::Bind {
        listener: desc.name,
        addr: desc.addr,
        source,
    };

    let socket = Socket::new(Domain::for_address(desc.addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    #[cfg(unix)]
    socket.set_reuse_address(true).map_err(bind_err)?;
    if desc.keepalive {
        socket.set_keepalive(true).map_err(bind_err)?;
    }
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&desc.addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    let listener = TcpListener::from_std(socket.into()).map_err(bind_err)?;
    log_bound(desc, listener.local_addr().ok());
    Ok(listener)
}

/// Opens a datagram socket.
///
/// # Errors
///
/// Returns [`LobbyError::Bind`] if the address is unavailable.
pub async fn bind_datagram(desc: &ListenerDescriptor) -> Result<UdpSocket, LobbyError> {
    let socket = UdpSocket::bind(desc.addr)
        .await
        .map_err(|source| LobbyError::Bind {
            listener: desc.name,
            addr: desc.addr,
            source,
        })?;
    log_bound(desc, socket.local_addr().ok());
    Ok(socket)
}

fn log_bound(desc: &ListenerDescriptor, local: Option<SocketAddr>) {
    tracing::info!(
        listener = desc.name,
        transport = %desc.transport,
        addr = %local.unwrap_or(desc.addr),
        keepalive = desc.keepalive,
        "listener bound"
    );
}

/// Keeps the first error, logs later ones, and drops any socket that did
/// bind so it is closed.
fn settle<T>(name: &'static str, result: Result<T, LobbyError>, first: &mut Option<LobbyError>) {
    match result {
        Ok(socket) => {
            tracing::warn!(listener = name, "closing listener after sibling failed to bind");
            drop(socket);
        }
        Err(e) => {
            if first.is_none() {
                *first = Some(e);
            } else {
                tracing::error!(listener = name, error = %e, "additional bind failure");
            }
        }
    }
}

async fn bind_game_pair(set: &ListenerSet) -> Result<(TcpListener, UdpSocket), LobbyError> {
    let (tcp, udp) = tokio::join!(async { bind_stream(&set.game_tcp) }, bind_datagram(&set.game_udp));
    match (tcp, udp) {
        (Ok(tcp), Ok(udp)) => Ok((tcp, udp)),
        (tcp, udp) => {
            let mut first = None;
            settle(set.game_tcp.name, tcp, &mut first);
            settle(set.game_udp.name, udp, &mut first);
            Err(first.unwrap_or_else(|| LobbyError::Internal("game bind failed".to_string())))
        }
    }
}

/// Binds every listener concurrently.
///
/// All binds run to completion even if one fails; sockets that did bind
/// are then closed and the first failure is returned.
///
/// # Errors
///
/// Returns the first [`LobbyError::Bind`] encountered.
pub async fn bind_all(set: &ListenerSet) -> Result<BoundListeners, LobbyError> {
    let (control, lobby, game) = tokio::join!(
        async { bind_stream(&set.control) },
        async { bind_stream(&set.lobby) },
        bind_game_pair(set),
    );

    match (control, lobby, game) {
        (Ok(control), Ok(lobby), Ok((game_tcp, game_udp))) => Ok(BoundListeners {
            control,
            lobby,
            game_tcp,
            game_udp,
        }),
        (control, lobby, game) => {
            let mut first = None;
            settle(set.control.name, control, &mut first);
            settle(set.lobby.name, lobby, &mut first);
            settle("game", game, &mut first);
            Err(first.unwrap_or_else(|| LobbyError::Internal("listener bind failed".to_string())))
        }
    }
}

/// Listening sockets that are open but not yet accepting.
#[derive(Debug)]
pub struct BoundListeners {
    control: TcpListener,
    lobby: TcpListener,
    game_tcp: TcpListener,
    game_udp: UdpSocket,
}

impl BoundListeners {
    /// Resolved local addresses.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Io`] if the OS cannot report an address.
    pub fn local_addrs(&self) -> Result<ListenerAddrs, LobbyError> {
        Ok(ListenerAddrs {
            control: self.control.local_addr()?,
            lobby: self.lobby.local_addr()?,
            game_tcp: self.game_tcp.local_addr()?,
            game_udp: self.game_udp.local_addr()?,
        })
    }

    /// Starts one accept task per listener.
    ///
    /// Every task and every connection it spawns is tracked, and each gets
    /// a child of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Io`] if the local addresses cannot be read.
    pub fn serve(
        self,
        services: &Arc<ServiceGraph>,
        token: &CancellationToken,
    ) -> Result<RunningListeners, LobbyError> {
        let addrs = self.local_addrs()?;
        let tasks = TaskTracker::new();

        tasks.spawn(control::serve(
            self.control,
            Arc::clone(services),
            token.child_token(),
        ));
        tasks.spawn(accept_loop(
            "lobby",
            self.lobby,
            true,
            token.child_token(),
            tasks.clone(),
            {
                let services = Arc::clone(services);
                move |peer| LobbySession::new(Arc::clone(&services), peer)
            },
        ));
        tasks.spawn(accept_loop(
            "game",
            self.game_tcp,
            false,
            token.child_token(),
            tasks.clone(),
            {
                let services = Arc::clone(services);
                move |peer| GameSession::new(Arc::clone(&services), peer)
            },
        ));
        tasks.spawn(nat::serve(self.game_udp, token.child_token()));

        Ok(RunningListeners {
            addrs,
            tasks,
            token: token.clone(),
        })
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    SockRef::from(stream).set_keepalive(true)
}

/// Accepts stream connections until `token` is cancelled and runs a
/// session for each. The listener is closed when this returns.
async fn accept_loop<F, H>(
    name: &'static str,
    listener: TcpListener,
    keepalive: bool,
    token: CancellationToken,
    tasks: TaskTracker,
    make_handler: F,
) where
    F: Fn(SocketAddr) -> H + Send + 'static,
    H: SessionHandler + 'static,
{
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if keepalive {
                        if let Err(e) = enable_keepalive(&stream) {
                            tracing::warn!(listener = name, %peer, error = %e, "failed to enable keep-alive");
                        }
                    }
                    tracing::debug!(listener = name, %peer, "connection accepted");
                    tasks.spawn(run_session(stream, peer, make_handler(peer), token.child_token()));
                }
                Err(e) => {
                    tracing::warn!(listener = name, error = %e, "accept failed");
                    tokio::time::sleep(IO_ERROR_BACKOFF).await;
                }
            },
        }
    }
    drop(listener);
    tracing::info!(listener = name, "listener closed");
}

/// Handle to the serving listeners and their connections.
#[derive(Debug)]
pub struct RunningListeners {
    addrs: ListenerAddrs,
    tasks: TaskTracker,
    token: CancellationToken,
}

impl RunningListeners {
    /// Resolved local addresses.
    #[must_use]
    pub const fn addrs(&self) -> ListenerAddrs {
        self.addrs
    }

    /// Number of live listener and connection tasks.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Stops accepting, asks every connection to close, and waits up to
    /// `grace` for all of them. Returns the number of tasks still running
    /// when the grace period ran out.
    pub async fn shutdown(self, grace: Duration) -> usize {
        self.token.cancel();
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_ok() {
            tracing::info!("all listeners and connections closed");
            0
        } else {
            let remaining = self.tasks.len();
            tracing::warn!(remaining, grace_secs = grace.as_secs(), "shutdown grace period elapsed");
            remaining
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn loopback(name: &'static str, transport: Transport) -> ListenerDescriptor {
        ListenerDescriptor {
            name,
            addr: ([127, 0, 0, 1], 0).into(),
            transport,
            keepalive: name == "lobby",
        }
    }

    fn loopback_set() -> ListenerSet {
        ListenerSet {
            control: loopback("control", Transport::Stream),
            lobby: loopback("lobby", Transport::Stream),
            game_tcp: loopback("game", Transport::Stream),
            game_udp: loopback("nat", Transport::Datagram),
        }
    }

    #[test]
    fn only_lobby_requests_keepalive() {
        let Ok(config) = ServerConfig::from_lookup(|_| None) else {
            panic!("default config");
        };
        let set = ListenerSet::from_config(&config);
        assert!(set.lobby.keepalive);
        assert!(!set.control.keepalive);
        assert!(!set.game_tcp.keepalive);
        assert_eq!(set.game_tcp.addr, set.game_udp.addr);
        assert_eq!(set.game_udp.transport, Transport::Datagram);
    }

    #[tokio::test]
    async fn lobby_listener_has_keepalive() {
        let Ok(listener) = bind_stream(&loopback("lobby", Transport::Stream)) else {
            panic!("bind");
        };
        assert_eq!(SockRef::from(&listener).keepalive().ok(), Some(true));
    }

    #[tokio::test]
    async fn bind_all_binds_four_sockets() {
        let Ok(bound) = bind_all(&loopback_set()).await else {
            panic!("bind_all");
        };
        let Ok(addrs) = bound.local_addrs() else {
            panic!("addrs");
        };
        assert_ne!(addrs.control.port(), 0);
        assert_ne!(addrs.lobby, addrs.control);
    }

    #[tokio::test]
    async fn failed_lobby_bind_closes_control_listener() {
        let Ok(occupied) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("occupy port");
        };
        let Ok(taken) = occupied.local_addr() else {
            panic!("addr");
        };

        // Pick a concrete free port for control so we can check it is released.
        let Ok(scratch) = std::net::TcpListener::bind("127.0.0.1:0") else {
            panic!("scratch bind");
        };
        let Ok(control_addr) = scratch.local_addr() else {
            panic!("scratch addr");
        };
        drop(scratch);

        let mut set = loopback_set();
        set.control.addr = control_addr;
        set.lobby.addr = taken;

        let result = bind_all(&set).await;
        let Err(LobbyError::Bind { listener, addr, .. }) = result else {
            panic!("lobby bind must fail");
        };
        assert_eq!(listener, "lobby");
        assert_eq!(addr, taken);

        // The control socket was closed during unwind, so its port is free again.
        assert!(TcpListener::bind(control_addr).await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_drains_idle_listeners() {
        let Ok(graph) = ServiceGraph::build(crate::persistence::DatabasePool::Mock(
            crate::persistence::MockPool::new(1),
        )) else {
            panic!("graph");
        };
        let services = Arc::new(graph);
        let Ok(bound) = bind_all(&loopback_set()).await else {
            panic!("bind_all");
        };
        let token = CancellationToken::new();
        let Ok(running) = bound.serve(&services, &token) else {
            panic!("serve");
        };
        assert_eq!(running.active_tasks(), 4);
        assert_eq!(running.shutdown(Duration::from_secs(2)).await, 0);
    }
}
