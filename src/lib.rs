//! # lobby-server
//!
//! Lobby and matchmaking backend for a multiplayer game: a shared database
//! pool, a small graph of in-process services, and three network listeners
//! brought up together and torn down together on SIGINT or SIGTERM.
//!
//! ## Architecture
//!
//! ```text
//! Clients
//!     │
//!     ├── Control plane HTTP (api/, server::control)
//!     ├── Lobby TCP, keep-alive (server::lobby)
//!     ├── Game TCP + NAT UDP (server::game, server::nat)
//!     │
//!     ├── ServiceGraph (service/)
//!     │     PlayerDirectory ⇄ MatchmakerQueue, GameRegistry
//!     │
//!     └── DatabasePool (persistence/): MySQL, PostgreSQL or mock
//! ```
//!
//! [`lifecycle::Orchestrator`] sequences startup and teardown;
//! [`lifecycle::ShutdownCoordinator`] resolves once per process.

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod persistence;
pub mod server;
pub mod service;
