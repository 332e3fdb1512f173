use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::SourceQueryError;

/// According to the Valve wiki, Source query responses use 1400 bytes + IP/UDP headers.
pub const MAX_PACKET_SIZE: usize = 1400;

const HEADER_RANGE: Range<usize> = 0..4;
const TYPE_OFFSET: usize = 4;
const CHALLENGE_RANGE: Range<usize> = 5..9;

/// Body of every A2S_INFO request, terminator included.
const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

#[derive(Debug, PartialEq, Eq)]
pub enum PacketHeader {
    Single,
    Split,
}

impl TryFrom<i32> for PacketHeader {
    type Error = SourceQueryError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(PacketHeader::Single),
            -2 => Ok(PacketHeader::Split),
            n => Err(SourceQueryError::UnknownPacketHeader(n)),
        }
    }
}

/// For packing a [PacketHeader] into a packet in [RequestPacket::pack].
impl PacketHeader {
    pub fn to_le_bytes(&self) -> [u8; 4] {
        let value: i32 = match self {
            PacketHeader::Single => -1,
            PacketHeader::Split => -2,
        };
        value.to_le_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// A2S_INFO request -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO
    InfoRequest,
    /// A2S_PLAYER request -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_PLAYER
    PlayerRequest,
    /// S2C_CHALLENGE
    ///
    /// the server may reply with a challenge to the client using S2C_CHALLENGE
    /// ('A' or 0x41). In that case, the client should repeat the request by appending the challenge number.
    Challenge,
    /// A2S_INFO response, parsed by [crate::info::ServerInfo::parse].
    InfoResponse,
    /// A2S_PLAYER response, parsed by [crate::players::PlayerList::parse].
    PlayerResponse,
}

impl TryFrom<u8> for PacketType {
    type Error = SourceQueryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x54 => Ok(PacketType::InfoRequest),
            0x55 => Ok(PacketType::PlayerRequest),
            0x41 => Ok(PacketType::Challenge),
            0x49 => Ok(PacketType::InfoResponse),
            0x44 => Ok(PacketType::PlayerResponse),
            n => Err(SourceQueryError::UnknownPacketType(n)),
        }
    }
}

impl PacketType {
    pub fn to_byte(&self) -> u8 {
        match self {
            PacketType::InfoRequest => 0x54,   // 'T'
            PacketType::PlayerRequest => 0x55, // 'U'
            PacketType::Challenge => 0x41,     // 'A'
            PacketType::InfoResponse => 0x49,  // 'I'
            PacketType::PlayerResponse => 0x44, // 'D'
        }
    }
}

/// The two queries this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Info,
    Player,
}

impl QueryKind {
    pub fn request_type(&self) -> PacketType {
        match self {
            QueryKind::Info => PacketType::InfoRequest,
            QueryKind::Player => PacketType::PlayerRequest,
        }
    }
}

/// Opaque 4-byte anti-spoofing value handed out by a server in S2C_CHALLENGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeToken([u8; 4]);

impl ChallengeToken {
    /// Placeholder sent when no challenge is known yet.
    pub const NONE: ChallengeToken = ChallengeToken([0xFF; 4]);

    pub fn new(bytes: [u8; 4]) -> Self {
        ChallengeToken(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SourceQueryError> {
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| SourceQueryError::Truncated {
            offset: CHALLENGE_RANGE.start,
            needed: 4,
            remaining: bytes.len(),
        })?;
        Ok(ChallengeToken(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The token read as a little-endian signed integer.
    pub fn value(&self) -> i32 {
        LittleEndian::read_i32(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RequestPacket {
    packet_header: PacketHeader,
    kind: QueryKind,
    challenge: Option<ChallengeToken>,
}

impl RequestPacket {
    pub fn new(kind: QueryKind, challenge: Option<ChallengeToken>) -> Self {
        RequestPacket {
            packet_header: PacketHeader::Single,
            kind,
            challenge,
        }
    }

    /// Serializes a request packet into an array of bytes.
    ///
    /// Info: header, type, body (and challenge).
    /// Player: header, type, challenge (the placeholder if none is known).
    pub fn pack(&self) -> Vec<u8> {
        let mut payload: Vec<u8> = Vec::with_capacity(4 + 1 + INFO_PAYLOAD.len() + 4);
        payload.extend_from_slice(&self.packet_header.to_le_bytes());
        payload.push(self.kind.request_type().to_byte());
        match self.kind {
            QueryKind::Info => {
                payload.extend_from_slice(INFO_PAYLOAD);
                if let Some(c) = &self.challenge {
                    payload.extend_from_slice(c.as_bytes());
                }
            }
            QueryKind::Player => {
                let challenge: ChallengeToken = self.challenge.unwrap_or(ChallengeToken::NONE);
                payload.extend_from_slice(challenge.as_bytes());
            }
        }

        payload
    }
}

/// Check the header of an incoming datagram and return its raw type byte.
///
/// Only single-packet responses are accepted.
pub fn peek_type(datagram: &[u8]) -> Result<u8, SourceQueryError> {
    if datagram.len() <= TYPE_OFFSET {
        return Err(SourceQueryError::Truncated {
            offset: 0,
            needed: TYPE_OFFSET + 1,
            remaining: datagram.len(),
        });
    }
    let raw_header: i32 = LittleEndian::read_i32(&datagram[HEADER_RANGE]);
    match PacketHeader::try_from(raw_header)? {
        PacketHeader::Single => Ok(datagram[TYPE_OFFSET]),
        PacketHeader::Split => Err(SourceQueryError::SplitResponse),
    }
}

/// Like [peek_type], but fails unless the type byte is `expected`.
pub fn expect_type(datagram: &[u8], expected: PacketType) -> Result<(), SourceQueryError> {
    let found: u8 = peek_type(datagram)?;
    if found != expected.to_byte() {
        return Err(SourceQueryError::UnexpectedPacketType {
            expected: expected.to_byte(),
            found,
        });
    }
    Ok(())
}

/// The token carried by an S2C_CHALLENGE datagram.
pub fn challenge_of(datagram: &[u8]) -> Result<ChallengeToken, SourceQueryError> {
    expect_type(datagram, PacketType::Challenge)?;
    let end: usize = datagram.len().min(CHALLENGE_RANGE.end);
    ChallengeToken::from_slice(&datagram[CHALLENGE_RANGE.start..end])
}

/// Offset of the first body byte, just past the type byte.
pub const BODY_OFFSET: usize = TYPE_OFFSET + 1;
