use serde::{Serialize, Serializer};

use crate::error::SourceQueryError;
use crate::packet::{self, ChallengeToken, PacketType, BODY_OFFSET};
use crate::parse::{get_string, get_u16, get_u64, get_u8, skip};

/// EDF bit: the server's game port follows.
pub const EDF_PORT: u8 = 0x80;
/// EDF bit: the server's 64-bit Steam ID follows.
pub const EDF_STEAM_ID: u8 = 0x10;
/// EDF bit: SourceTV port and name follow.
pub const EDF_SPECTATOR: u8 = 0x40;
/// EDF bit: the keyword (tags) string follows.
pub const EDF_KEYWORDS: u8 = 0x20;
/// EDF bit: the 64-bit game id follows.
pub const EDF_GAME_ID: u8 = 0x01;

/// Server type as reported by A2S_INFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// `d`
    Dedicated,
    /// `l`, non-dedicated
    Listen,
    /// `p`, SourceTV relay (proxy)
    SourceTv,
    Other(char),
}

impl From<u8> for ServerType {
    fn from(code: u8) -> Self {
        match code {
            b'd' | b'D' => ServerType::Dedicated,
            b'l' | b'L' => ServerType::Listen,
            b'p' | b'P' => ServerType::SourceTv,
            c => ServerType::Other(char::from(c)),
        }
    }
}

/// Operating system the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// `l`
    Linux,
    /// `w`
    Windows,
    /// `m` or `o`
    Mac,
    Other(char),
}

impl From<u8> for Environment {
    fn from(code: u8) -> Self {
        match code {
            b'l' | b'L' => Environment::Linux,
            b'w' | b'W' => Environment::Windows,
            b'm' | b'M' | b'o' | b'O' => Environment::Mac,
            c => Environment::Other(char::from(c)),
        }
    }
}

/// Server information as obtained by [crate::query_info].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// A2S_INFO protocol version
    pub protocol: u8,
    /// Server hostname
    pub name: String,
    /// Current map
    pub map: String,
    /// Location of server files
    pub folder: String,
    /// Name of game
    pub game: String,
    /// Steam application id
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: ServerType,
    pub environment: Environment,
    /// Visibility flag, set when the server asks for a password
    pub password_protected: bool,
    pub vac_enabled: bool,
    pub version: String,
    /// Game port, if the EDF says so
    pub port: Option<u16>,
    #[serde(serialize_with = "decimal_string")]
    pub steam_id: Option<u64>,
    /// Raw comma-separated tags
    pub keywords: Option<String>,
    #[serde(serialize_with = "decimal_string")]
    pub game_id: Option<u64>,
}

/// 64-bit ids go out as strings so JSON consumers keep every digit.
fn decimal_string<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ServerInfo {
    /// Parse an A2S_INFO response datagram, header included, into its [ServerInfo].
    pub fn parse(datagram: &[u8]) -> Result<ServerInfo, SourceQueryError> {
        packet::expect_type(datagram, PacketType::InfoResponse)?;
        let data: &[u8] = datagram;
        let mut offset: usize = BODY_OFFSET;

        let protocol: u8 = get_u8(data, &mut offset)?;
        let name: String = get_string(data, &mut offset)?;
        let map: String = get_string(data, &mut offset)?;
        let folder: String = get_string(data, &mut offset)?;
        let game: String = get_string(data, &mut offset)?;
        let app_id: u16 = get_u16(data, &mut offset)?;
        let players: u8 = get_u8(data, &mut offset)?;
        let max_players: u8 = get_u8(data, &mut offset)?;
        let bots: u8 = get_u8(data, &mut offset)?;
        let server_type = ServerType::from(get_u8(data, &mut offset)?);
        let environment = Environment::from(get_u8(data, &mut offset)?);
        let password_protected: bool = get_u8(data, &mut offset)? == 1;
        let vac_enabled: bool = get_u8(data, &mut offset)? == 1;
        let version: String = get_string(data, &mut offset)?;

        let mut info = ServerInfo {
            protocol,
            name,
            map,
            folder,
            game,
            app_id,
            players,
            max_players,
            bots,
            server_type,
            environment,
            password_protected,
            vac_enabled,
            version,
            port: None,
            steam_id: None,
            keywords: None,
            game_id: None,
        };

        // no EDF byte at all is fine, everything optional stays empty
        if offset >= data.len() {
            return Ok(info);
        }
        let edf: u8 = get_u8(data, &mut offset)?;

        // wire order is fixed, independent of bit value
        if edf & EDF_PORT != 0 {
            info.port = Some(get_u16(data, &mut offset)?);
        }
        if edf & EDF_STEAM_ID != 0 {
            info.steam_id = Some(get_u64(data, &mut offset)?);
        }
        if edf & EDF_SPECTATOR != 0 {
            skip(data, &mut offset, 2)?;
            get_string(data, &mut offset)?;
        }
        if edf & EDF_KEYWORDS != 0 {
            info.keywords = Some(get_string(data, &mut offset)?);
        }
        if edf & EDF_GAME_ID != 0 {
            info.game_id = Some(get_u64(data, &mut offset)?);
        }

        Ok(info)
    }

    /// Keywords split into individual tags, empty entries dropped.
    pub fn keyword_tags(&self) -> Vec<&str> {
        match &self.keywords {
            Some(k) => k.split(',').map(str::trim).filter(|t| !t.is_empty()).collect(),
            None => Vec::new(),
        }
    }
}

/// What a single unchallenged A2S_INFO exchange can yield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoReply {
    Info(ServerInfo),
    /// The server wants the request repeated with this token.
    Challenge(ChallengeToken),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Header, `I`, protocol 17 and the fixed fields up to the version string.
    pub(crate) fn fixture() -> Vec<u8> {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, b'I', 17];
        data.extend_from_slice(b"Srv\0de_test\0csgo\0Counter-Strike\0");
        data.extend_from_slice(&240u16.to_le_bytes());
        data.extend_from_slice(&[5, 10, 0, b'd', b'l', 0, 1]);
        data.extend_from_slice(b"1.0\0");
        data
    }

    fn with_edf(edf: u8) -> Vec<u8> {
        let mut data = fixture();
        data.push(edf);
        if edf & EDF_PORT != 0 {
            data.extend_from_slice(&27015u16.to_le_bytes());
        }
        if edf & EDF_STEAM_ID != 0 {
            data.extend_from_slice(&90071996842377216u64.to_le_bytes());
        }
        if edf & EDF_SPECTATOR != 0 {
            data.extend_from_slice(&27020u16.to_le_bytes());
            data.extend_from_slice(b"SourceTV\0");
        }
        if edf & EDF_KEYWORDS != 0 {
            data.extend_from_slice(b"secure,competitive\0");
        }
        if edf & EDF_GAME_ID != 0 {
            data.extend_from_slice(&730u64.to_le_bytes());
        }
        data
    }

    #[test]
    fn parses_fixed_fields() {
        let info = ServerInfo::parse(&with_edf(0x00)).unwrap();
        assert_eq!(info.protocol, 17);
        assert_eq!(info.name, "Srv");
        assert_eq!(info.map, "de_test");
        assert_eq!(info.folder, "csgo");
        assert_eq!(info.game, "Counter-Strike");
        assert_eq!(info.app_id, 240);
        assert_eq!((info.players, info.max_players, info.bots), (5, 10, 0));
        assert_eq!(info.server_type, ServerType::Dedicated);
        assert_eq!(info.environment, Environment::Linux);
        assert!(!info.password_protected);
        assert!(info.vac_enabled);
        assert_eq!(info.version, "1.0");
        assert_eq!(info.port, None);
        assert_eq!(info.steam_id, None);
        assert_eq!(info.keywords, None);
        assert_eq!(info.game_id, None);
    }

    #[test]
    fn missing_edf_byte_is_not_an_error() {
        let info = ServerInfo::parse(&fixture()).unwrap();
        assert_eq!(info.version, "1.0");
        assert!(info.port.is_none() && info.keywords.is_none());
    }

    #[test]
    fn each_edf_bit_surfaces_only_its_field() {
        let info = ServerInfo::parse(&with_edf(EDF_PORT)).unwrap();
        assert_eq!(info.port, Some(27015));
        assert!(info.steam_id.is_none() && info.keywords.is_none() && info.game_id.is_none());

        let info = ServerInfo::parse(&with_edf(EDF_STEAM_ID)).unwrap();
        assert_eq!(info.steam_id, Some(90071996842377216));
        assert!(info.port.is_none() && info.keywords.is_none() && info.game_id.is_none());

        let info = ServerInfo::parse(&with_edf(EDF_KEYWORDS)).unwrap();
        assert_eq!(info.keywords.as_deref(), Some("secure,competitive"));
        assert!(info.port.is_none() && info.steam_id.is_none() && info.game_id.is_none());

        let info = ServerInfo::parse(&with_edf(EDF_GAME_ID)).unwrap();
        assert_eq!(info.game_id, Some(730));
        assert!(info.port.is_none() && info.steam_id.is_none() && info.keywords.is_none());
    }

    #[test]
    fn all_edf_bits_decode_in_wire_order() {
        let edf = EDF_PORT | EDF_STEAM_ID | EDF_SPECTATOR | EDF_KEYWORDS | EDF_GAME_ID;
        let info = ServerInfo::parse(&with_edf(edf)).unwrap();
        assert_eq!(info.port, Some(27015));
        assert_eq!(info.steam_id, Some(90071996842377216));
        assert_eq!(info.keywords.as_deref(), Some("secure,competitive"));
        assert_eq!(info.game_id, Some(730));
    }

    #[test]
    fn presence_follows_supported_bits_for_every_mask() {
        for edf in 0..=u8::MAX {
            // unsupported bits carry no payload, so the fixture stays well formed
            let info = ServerInfo::parse(&with_edf(edf)).unwrap();
            assert_eq!(info.port.is_some(), edf & EDF_PORT != 0, "edf {edf:#04x}");
            assert_eq!(info.steam_id.is_some(), edf & EDF_STEAM_ID != 0, "edf {edf:#04x}");
            assert_eq!(info.keywords.is_some(), edf & EDF_KEYWORDS != 0, "edf {edf:#04x}");
            assert_eq!(info.game_id.is_some(), edf & EDF_GAME_ID != 0, "edf {edf:#04x}");
        }
    }

    #[test]
    fn truncated_fixed_field_is_an_error() {
        let data = fixture();
        // cut inside the app id
        let cut = &data[..6 + "Srv\0de_test\0csgo\0Counter-Strike\0".len() + 1];
        assert!(matches!(
            ServerInfo::parse(cut),
            Err(SourceQueryError::Truncated { needed: 2, remaining: 1, .. })
        ));
    }

    #[test]
    fn truncated_edf_field_is_an_error() {
        let mut data = fixture();
        data.push(EDF_GAME_ID);
        data.extend_from_slice(&[1, 2, 3]);
        assert!(ServerInfo::parse(&data).is_err());
    }

    #[test]
    fn wrong_opcode_is_rejected() {
        let mut data = fixture();
        data[4] = b'D';
        assert!(matches!(
            ServerInfo::parse(&data),
            Err(SourceQueryError::UnexpectedPacketType { expected: 0x49, found: 0x44 })
        ));
    }

    #[test]
    fn latin1_name_is_decoded_lossily() {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, b'I', 17];
        data.extend_from_slice(b"Caf\xE9\0de_test\0csgo\0Counter-Strike\0");
        data.extend_from_slice(&fixture()[6 + "Srv\0de_test\0csgo\0Counter-Strike\0".len()..]);
        let info = ServerInfo::parse(&data).unwrap();
        assert_eq!(info.name, "Caf\u{FFFD}");
        assert_eq!(info.map, "de_test");
        assert_eq!(info.version, "1.0");
    }

    #[test]
    fn codes_map_to_enums() {
        assert_eq!(ServerType::from(b'p'), ServerType::SourceTv);
        assert_eq!(ServerType::from(b'x'), ServerType::Other('x'));
        assert_eq!(Environment::from(b'o'), Environment::Mac);
        assert_eq!(Environment::from(b'w'), Environment::Windows);
        for code in [b'm', b'M', b'o', b'O'] {
            assert_eq!(Environment::from(code), Environment::Mac);
        }
        assert_eq!(Environment::from(b'L'), Environment::Linux);
        assert_eq!(ServerType::from(b'D'), ServerType::Dedicated);
    }

    #[test]
    fn keyword_tags_split_on_commas() {
        let info = ServerInfo::parse(&with_edf(EDF_KEYWORDS)).unwrap();
        assert_eq!(info.keyword_tags(), vec!["secure", "competitive"]);
    }

    #[test]
    fn ids_serialize_as_decimal_strings() {
        let info = ServerInfo::parse(&with_edf(EDF_STEAM_ID)).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["steam_id"], "90071996842377216");
        assert!(json["game_id"].is_null());
        assert_eq!(json["server_type"], "dedicated");
    }
}
