use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("failed to bind a local UDP port: {0}")]
    FailedPortBind(#[source] std::io::Error),
    #[error("host is unreachable: {0}")]
    UnreachableHost(#[source] std::io::Error),
    #[error("host {0} has no IPv4 address")]
    NoIpv4Address(String),
    #[error("failed to send packet: {0}")]
    SendError(#[source] std::io::Error),
    #[error("failed to receive packet: {0}")]
    ReceiveError(#[source] std::io::Error),
    #[error("query timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("unknown packet header {0:#x}")]
    UnknownPacketHeader(i32),
    #[error("split responses are not supported")]
    SplitResponse,
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),
    #[error("expected packet type {expected:#04x}, got {found:#04x}")]
    UnexpectedPacketType { expected: u8, found: u8 },
    #[error("server sent another challenge after the challenged request")]
    UnexpectedChallenge,
    #[error("datagram arrived after the query finished")]
    QueryFinished,
    #[error("packet truncated at offset {offset}: needed {needed} bytes, {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),
}

impl SourceQueryError {
    /// Which of the three failure classes this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceQueryError::Timeout(_) => FailureKind::Timeout,
            SourceQueryError::FailedPortBind(_)
            | SourceQueryError::UnreachableHost(_)
            | SourceQueryError::NoIpv4Address(_)
            | SourceQueryError::SendError(_)
            | SourceQueryError::ReceiveError(_) => FailureKind::Transport,
            SourceQueryError::UnknownPacketHeader(_)
            | SourceQueryError::SplitResponse
            | SourceQueryError::UnknownPacketType(_)
            | SourceQueryError::UnexpectedPacketType { .. }
            | SourceQueryError::UnexpectedChallenge
            | SourceQueryError::QueryFinished
            | SourceQueryError::Truncated { .. }
            | SourceQueryError::UnterminatedString(_) => FailureKind::Protocol,
        }
    }
}

/// Coarse classification of a failed query.
///
/// Every kind means the same thing to a poller: no data this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// No final datagram arrived before the deadline.
    Timeout,
    /// A datagram arrived but could not be decoded.
    Protocol,
    /// The OS refused to send or receive.
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Protocol => "protocol",
            FailureKind::Transport => "transport",
        };
        f.write_str(name)
    }
}
