//! Line-delimited JSON commands and replies for stream connections.
//!
//! Each line is one JSON object with a `command` discriminator:
//!
//! ```text
//! → {"command":"hello","player_id":42,"login":"alice"}
//! ← {"command":"welcome","player_id":42,"login":"alice"}
//! → {"command":"host_game","title":"4v4 open"}
//! ← {"command":"game_hosted","game":{...}}
//! → {"command":"search_ladder"}
//! ← {"command":"search_started","queue":"ladder1v1","position":1}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{GameEntry, GameId, PlayerId};
use crate::error::LobbyError;

/// Commands a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Liveness check.
    Ping,
    /// Identify the connection as a player.
    Hello {
        /// Account id.
        player_id: PlayerId,
        /// Display name.
        login: String,
    },
    /// Open a custom game hosted by this player.
    HostGame {
        /// Title shown in the game list.
        title: String,
    },
    /// Join the ladder queue.
    SearchLadder,
    /// Leave the ladder queue.
    CancelSearch,
    /// List all games.
    GameList,
    /// Fetch one game.
    GameState {
        /// Game to fetch.
        game_id: GameId,
    },
}

/// Replies sent back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Reply {
    /// Answer to [`Command::Ping`].
    Pong,
    /// Login accepted.
    Welcome {
        /// Account id.
        player_id: PlayerId,
        /// Display name.
        login: String,
    },
    /// Custom game opened.
    GameHosted {
        /// The created game.
        game: GameEntry,
    },
    /// Search queued without an immediate match.
    SearchStarted {
        /// Queue name.
        queue: String,
        /// 1-based position in the queue.
        position: usize,
    },
    /// Search matched immediately.
    MatchFound {
        /// The created game.
        game: GameEntry,
    },
    /// Search withdrawn.
    SearchCancelled {
        /// Queue name.
        queue: String,
        /// Whether a search was actually pending.
        was_searching: bool,
    },
    /// All games.
    GameList {
        /// Games, oldest first.
        games: Vec<GameEntry>,
    },
    /// One game.
    GameState {
        /// The requested game.
        game: GameEntry,
    },
    /// The command failed.
    Error {
        /// Numeric error code, shared with the control plane.
        code: u32,
        /// Human-readable message.
        message: String,
    },
}

impl From<LobbyError> for Reply {
    fn from(err: LobbyError) -> Self {
        if err.is_fatal() {
            tracing::error!(error = %err, "fatal-class error surfaced in a session");
        }
        Self::Error {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// Parses one line into a [`Command`], or an error reply for the client.
///
/// # Errors
///
/// Returns a [`Reply::Error`] describing why the line was rejected.
pub fn decode(line: &str) -> Result<Command, Reply> {
    serde_json::from_str(line)
        .map_err(|e| Reply::from(LobbyError::InvalidRequest(format!("malformed command: {e}"))))
}

/// Serialises a reply into one line (without the trailing newline).
#[must_use]
pub fn encode(reply: &Reply) -> String {
    serde_json::to_string(reply).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode reply");
        r#"{"command":"error","code":3000,"message":"internal error"}"#.to_string()
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hello() {
        let Ok(command) = decode(r#"{"command":"hello","player_id":42,"login":"alice"}"#) else {
            panic!("valid hello");
        };
        assert_eq!(
            command,
            Command::Hello {
                player_id: PlayerId::new(42),
                login: "alice".to_string(),
            }
        );
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let Err(Reply::Error { code, message }) = decode(r#"{"command":"dance"}"#) else {
            panic!("unknown command must be rejected");
        };
        assert_eq!(code, 1001);
        assert!(message.contains("malformed command"));
    }

    #[test]
    fn garbage_is_an_error_reply() {
        assert!(decode("not json").is_err());
    }

    #[test]
    fn encodes_tagged_replies() {
        assert_eq!(encode(&Reply::Pong), r#"{"command":"pong"}"#);
        let started = encode(&Reply::SearchStarted {
            queue: "ladder1v1".to_string(),
            position: 1,
        });
        assert_eq!(
            started,
            r#"{"command":"search_started","queue":"ladder1v1","position":1}"#
        );
    }

    #[test]
    fn lobby_errors_keep_their_code() {
        let reply = Reply::from(LobbyError::PlayerNotFound(PlayerId::new(3)));
        let Reply::Error { code, .. } = reply else {
            panic!("expected error reply");
        };
        assert_eq!(code, 2001);
    }
}
