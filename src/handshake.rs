//! Per-query challenge state machine.
//!
//! A server may answer the first request with S2C_CHALLENGE. The request is then
//! repeated once with the token attached, and the next datagram is final.

use crate::error::SourceQueryError;
use crate::info::ServerInfo;
use crate::packet::{self, ChallengeToken, PacketType, QueryKind, RequestPacket};
use crate::players::PlayerList;

/// What to do when the first reply is a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePolicy {
    /// Resend the request once with the token attached.
    Resend,
    /// Hand the token back to the caller as the reply.
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Resend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Sent(Attempt),
    Done,
}

/// A decoded final reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Info(ServerInfo),
    Players(PlayerList),
    Challenge(ChallengeToken),
}

/// Outcome of feeding one datagram to a [Handshake].
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Transmit these bytes and keep waiting.
    Resend(Vec<u8>),
    Done(Reply),
}

#[derive(Debug)]
pub struct Handshake {
    kind: QueryKind,
    policy: ChallengePolicy,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(kind: QueryKind, policy: ChallengePolicy) -> Self {
        Handshake {
            kind,
            policy,
            state: HandshakeState::Sent(Attempt::Initial),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The unchallenged request that opens the exchange.
    pub fn initial_request(&self) -> Vec<u8> {
        RequestPacket::new(self.kind, None).pack()
    }

    /// Interpret one received datagram.
    ///
    /// Any error is terminal, as is any [Step::Done].
    pub fn on_datagram(&mut self, datagram: &[u8]) -> Result<Step, SourceQueryError> {
        let attempt: Attempt = match self.state {
            HandshakeState::Sent(attempt) => attempt,
            HandshakeState::Done => return Err(SourceQueryError::QueryFinished),
        };
        // terminal whatever happens below, unless we resend
        self.state = HandshakeState::Done;

        let found: u8 = packet::peek_type(datagram)?;
        if found == PacketType::Challenge.to_byte() {
            let token: ChallengeToken = packet::challenge_of(datagram)?;
            return match (attempt, self.policy) {
                (Attempt::Initial, ChallengePolicy::Resend) => {
                    log::debug!("challenged with {:#010x}, resending {:?} request", token.value(), self.kind);
                    self.state = HandshakeState::Sent(Attempt::Resend);
                    Ok(Step::Resend(RequestPacket::new(self.kind, Some(token)).pack()))
                }
                (Attempt::Initial, ChallengePolicy::Surface) => Ok(Step::Done(Reply::Challenge(token))),
                (Attempt::Resend, _) => {
                    log::warn!("server challenged the challenged {:?} request again", self.kind);
                    Err(SourceQueryError::UnexpectedChallenge)
                }
            };
        }

        let reply: Reply = match self.kind {
            QueryKind::Info => Reply::Info(ServerInfo::parse(datagram)?),
            QueryKind::Player => Reply::Players(PlayerList::parse(datagram)?),
        };
        Ok(Step::Done(reply))
    }
}
