//! Room catalogue.
//!
//! A [`Room`] is one language-specific broadcast channel.  The set of rooms is
//! fixed at startup:
//!
//! | id   | room name | target language |
//! |------|-----------|-----------------|
//! | `zh` | `room_zh` | none (original) |
//! | `kr` | `room_kr` | Korean          |
//! | `vn` | `room_vn` | Vietnamese      |
//!
//! The broadcaster always speaks the source language ([`Language::Chinese`]);
//! translated rooms carry a machine-translated voice and subtitle track.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// Identity of one broadcast room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomId {
    /// Untouched original audio.
    Zh,
    /// Korean translation.
    Kr,
    /// Vietnamese translation.
    Vn,
}

impl RoomId {
    /// Every room, in catalogue order.
    pub const ALL: [RoomId; 3] = [RoomId::Zh, RoomId::Kr, RoomId::Vn];

    /// Short id used in URLs and logs (`"zh"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomId::Zh => "zh",
            RoomId::Kr => "kr",
            RoomId::Vn => "vn",
        }
    }

    /// Transport-level room name (`"room_zh"`).
    pub fn room_name(&self) -> &'static str {
        match self {
            RoomId::Zh => "room_zh",
            RoomId::Kr => "room_kr",
            RoomId::Vn => "room_vn",
        }
    }

    /// Key under which the room appears in the status payload.
    pub fn status_key(&self) -> &'static str {
        match self {
            RoomId::Zh => "chinese",
            RoomId::Kr => "korean",
            RoomId::Vn => "vietnamese",
        }
    }

    /// Dense index for per-room arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            RoomId::Zh => 0,
            RoomId::Kr => 1,
            RoomId::Vn => 2,
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown room: {0}")]
pub struct UnknownRoom(pub String);

impl FromStr for RoomId {
    type Err = UnknownRoom;

    /// Accepts both the short id (`"kr"`) and the room name (`"room_kr"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        RoomId::ALL
            .into_iter()
            .find(|id| key == id.as_str() || key == id.room_name())
            .ok_or_else(|| UnknownRoom(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Spoken / written language of a room's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    Korean,
    Vietnamese,
}

impl Language {
    /// Language the broadcaster speaks.
    pub const SOURCE: Language = Language::Chinese;

    /// ISO-639-1 code passed to collaborators.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Chinese => "zh",
            Language::Korean => "ko",
            Language::Vietnamese => "vi",
        }
    }

    /// English name, used in interpreter prompts.
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::Korean => "Korean",
            Language::Vietnamese => "Vietnamese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Immutable description of one room, defined at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub display_name: String,
    /// `None` for the original-audio room.
    pub target_language: Option<Language>,
}

impl Room {
    /// The catalogue entry for `id`.
    pub fn for_id(id: RoomId) -> Self {
        let (display_name, target_language) = match id {
            RoomId::Zh => ("Chinese (original)", None),
            RoomId::Kr => ("Korean", Some(Language::Korean)),
            RoomId::Vn => ("Vietnamese", Some(Language::Vietnamese)),
        };
        Self {
            id,
            display_name: display_name.to_string(),
            target_language,
        }
    }

    /// All default rooms, in catalogue order.
    pub fn catalogue() -> Vec<Room> {
        RoomId::ALL.into_iter().map(Room::for_id).collect()
    }

    /// Transport-level room name.
    pub fn name(&self) -> &'static str {
        self.id.room_name()
    }

    /// Whether frames for this room go through translation and TTS.
    pub fn requires_translation(&self) -> bool {
        self.target_language.is_some()
    }

    /// Language of the subtitles this room emits.
    pub fn output_language(&self) -> Language {
        self.target_language.unwrap_or(Language::SOURCE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_id_and_room_name() {
        assert_eq!("kr".parse::<RoomId>().unwrap(), RoomId::Kr);
        assert_eq!("room_vn".parse::<RoomId>().unwrap(), RoomId::Vn);
        assert_eq!(" ZH ".parse::<RoomId>().unwrap(), RoomId::Zh);
    }

    #[test]
    fn rejects_unknown_room() {
        let err = "room_fr".parse::<RoomId>().unwrap_err();
        assert_eq!(err, UnknownRoom("room_fr".into()));
    }

    #[test]
    fn catalogue_has_one_original_room() {
        let rooms = Room::catalogue();
        assert_eq!(rooms.len(), 3);
        let originals: Vec<_> = rooms.iter().filter(|r| !r.requires_translation()).collect();
        assert_eq!(originals.len(), 1);
        assert_eq!(originals[0].id, RoomId::Zh);
        assert_eq!(originals[0].output_language(), Language::Chinese);
    }

    #[test]
    fn room_names_match_deployment() {
        let names: Vec<_> = Room::catalogue().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["room_zh", "room_kr", "room_vn"]);
    }

    #[test]
    fn indices_are_dense() {
        for (i, id) in RoomId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn serde_uses_short_ids() {
        assert_eq!(serde_json::to_string(&RoomId::Kr).unwrap(), "\"kr\"");
        let id: RoomId = serde_json::from_str("\"vn\"").unwrap();
        assert_eq!(id, RoomId::Vn);
    }
}
