use serde::Serialize;

use crate::error::SourceQueryError;
use crate::packet::{self, PacketType, BODY_OFFSET};
use crate::parse::get_string_lossy;

/// Score (4 bytes) and session duration (4 bytes), both ignored.
const SCORE_AND_DURATION_LEN: usize = 8;

/// Player names in the order the server reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlayerList(Vec<String>);

impl PlayerList {
    /// Parse an A2S_PLAYER response datagram, header included.
    ///
    /// A datagram that ends before the declared player count is reached
    /// yields the players read so far. Empty names are dropped.
    pub fn parse(datagram: &[u8]) -> Result<PlayerList, SourceQueryError> {
        packet::expect_type(datagram, PacketType::PlayerResponse)?;
        let data: &[u8] = datagram;

        let mut offset: usize = BODY_OFFSET;
        let Some(&count) = data.get(offset) else {
            return Ok(PlayerList::default());
        };
        offset += 1;

        let mut names: Vec<String> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if offset >= data.len() {
                log::trace!("player list cut short after {} of {} players", names.len(), count);
                break;
            }
            // index byte
            offset += 1;
            let name: String = get_string_lossy(data, &mut offset);
            offset += SCORE_AND_DURATION_LEN;
            if !name.is_empty() {
                names.push(name);
            }
        }

        Ok(PlayerList(names))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl IntoIterator for PlayerList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
