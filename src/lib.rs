//! Pure Rust async client for the [Source server queries](https://developer.valvesoftware.com/wiki/Server_queries)
//! A2S_INFO and A2S_PLAYER, challenge handshake included.
//!
//! Each call opens its own socket, runs one exchange against one deadline and
//! closes the socket again, so any number of queries can run concurrently.
//!
//! ```no_run
//! # async fn status() -> Result<(), a2squery::error::SourceQueryError> {
//! let info = a2squery::query_info_with_challenge("127.0.0.1", 27015, None).await?;
//! let players = a2squery::query_players("127.0.0.1", 27015, None).await?;
//! println!("{} on {}: {:?}", info.name, info.map, players.names());
//! # Ok(())
//! # }
//! ```
pub mod error;
pub mod handshake;
pub mod info;
pub mod packet;
pub mod players;
pub mod session;
mod parse;

use std::time::Duration;

use crate::error::SourceQueryError;
use crate::handshake::{ChallengePolicy, Handshake, Reply};
use crate::packet::{PacketType, QueryKind};
use crate::session::QuerySession;

pub use crate::error::FailureKind;
pub use crate::info::{InfoReply, ServerInfo};
pub use crate::packet::ChallengeToken;
pub use crate::players::PlayerList;

/// Used whenever a query is given no timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

async fn run(
    host: &str,
    port: u16,
    timeout_dur: Option<Duration>,
    kind: QueryKind,
    policy: ChallengePolicy,
) -> Result<Reply, SourceQueryError> {
    let timeout_dur: Duration = timeout_dur.unwrap_or(DEFAULT_TIMEOUT);
    let session: QuerySession = QuerySession::open(host, port, timeout_dur).await?;
    let result = session.run(Handshake::new(kind, policy)).await;
    if let Err(e) = &result {
        log::debug!("{:?} query to {}:{} failed ({}): {}", kind, host, port, e.kind(), e);
    }
    result
}

/// Query `host:port` with a single A2S_INFO request.
///
/// A server that answers with a challenge is not asked again; the token comes
/// back as [InfoReply::Challenge]. Use [query_info_with_challenge] to have it
/// answered automatically.
pub async fn query_info(host: &str, port: u16, timeout_dur: Option<Duration>) -> Result<InfoReply, SourceQueryError> {
    match run(host, port, timeout_dur, QueryKind::Info, ChallengePolicy::Surface).await? {
        Reply::Info(info) => Ok(InfoReply::Info(info)),
        Reply::Challenge(token) => Ok(InfoReply::Challenge(token)),
        Reply::Players(_) => Err(unexpected(PacketType::InfoResponse, PacketType::PlayerResponse)),
    }
}

/// Query `host:port` with A2S_INFO, repeating the request once if challenged.
///
/// `timeout_dur` (default [DEFAULT_TIMEOUT]) covers the whole exchange,
/// resend included.
///
/// Example usage:
/// ```no_run
/// # async fn f() -> Result<(), a2squery::error::SourceQueryError> {
/// let info = a2squery::query_info_with_challenge("nyc-1.us.uncletopia.com", 27015, None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn query_info_with_challenge(
    host: &str,
    port: u16,
    timeout_dur: Option<Duration>,
) -> Result<ServerInfo, SourceQueryError> {
    match run(host, port, timeout_dur, QueryKind::Info, ChallengePolicy::Resend).await? {
        Reply::Info(info) => Ok(info),
        Reply::Challenge(_) => Err(SourceQueryError::UnexpectedChallenge),
        Reply::Players(_) => Err(unexpected(PacketType::InfoResponse, PacketType::PlayerResponse)),
    }
}

/// Query `host:port` with A2S_PLAYER and return the player names.
pub async fn query_players(host: &str, port: u16, timeout_dur: Option<Duration>) -> Result<PlayerList, SourceQueryError> {
    match run(host, port, timeout_dur, QueryKind::Player, ChallengePolicy::Resend).await? {
        Reply::Players(players) => Ok(players),
        Reply::Challenge(_) => Err(SourceQueryError::UnexpectedChallenge),
        Reply::Info(_) => Err(unexpected(PacketType::PlayerResponse, PacketType::InfoResponse)),
    }
}

fn unexpected(expected: PacketType, found: PacketType) -> SourceQueryError {
    SourceQueryError::UnexpectedPacketType {
        expected: expected.to_byte(),
        found: found.to_byte(),
    }
}
