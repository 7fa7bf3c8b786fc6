use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frames recorded per second of game time.
pub const FRAMES_PER_SECOND: f64 = 60.0;

// Action state ranges that mark a player as being punished.
const DAMAGE_START: u16 = 0x4B;
const DAMAGE_END: u16 = 0x5B;
const CAPTURE_START: u16 = 0xDF;
const CAPTURE_END: u16 = 0xE8;
const COMMAND_GRAB_RANGE1_START: u16 = 0x10A;
const COMMAND_GRAB_RANGE1_END: u16 = 0x130;
const COMMAND_GRAB_RANGE2_START: u16 = 0x147;
const COMMAND_GRAB_RANGE2_END: u16 = 0x152;
const BARREL_WAIT: u16 = 0x125;

/// Decoded form of a single replay file.
///
/// Owned by the processing of one file and dropped once detection has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReplay {
    pub metadata: ReplayMetadata,

    /// Player-state events ordered by frame, then by player index.
    pub events: Vec<PlayerStateEvent>,
}

/// Match-level information carried alongside the event stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayMetadata {
    #[serde(default)]
    pub stage: Option<String>,

    pub players: Vec<PlayerInfo>,

    #[serde(default)]
    pub duration_frames: u32,

    /// Wall-clock start of the match, if the recorder stored one
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub index: u8,
    pub character: String,

    #[serde(default)]
    pub tag: Option<String>,
}

impl PlayerInfo {
    /// Name used when a player is shown in a file name: the tag if set, otherwise the character.
    pub fn display_name(&self) -> &str {
        match self.tag.as_deref() {
            Some(tag) if !tag.trim().is_empty() => tag,
            _ => &self.character,
        }
    }
}

/// State of one player on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStateEvent {
    pub frame: i32,
    pub player_index: u8,
    pub action_state: u16,
    pub percent: f32,
    pub stocks_remaining: u8,

    /// Player whose attack last connected with this player
    #[serde(default)]
    pub last_hit_by: Option<u8>,
}

impl PlayerStateEvent {
    pub fn is_damaged(&self) -> bool {
        (DAMAGE_START..=DAMAGE_END).contains(&self.action_state)
    }

    pub fn is_grabbed(&self) -> bool {
        (CAPTURE_START..=CAPTURE_END).contains(&self.action_state)
    }

    pub fn is_command_grabbed(&self) -> bool {
        let state = self.action_state;
        ((COMMAND_GRAB_RANGE1_START..=COMMAND_GRAB_RANGE1_END).contains(&state)
            || (COMMAND_GRAB_RANGE2_START..=COMMAND_GRAB_RANGE2_END).contains(&state))
            && state != BARREL_WAIT
    }

    /// Whether the player is in a state that means someone else is comboing them.
    pub fn is_punished(&self) -> bool {
        self.is_damaged() || self.is_grabbed() || self.is_command_grabbed()
    }
}

impl GameReplay {
    /// Player indices declared in the metadata, ascending.
    pub fn player_indices(&self) -> Vec<u8> {
        let mut indices: Vec<u8> = self.metadata.players.iter().map(|p| p.index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Last frame present in the event stream.
    pub fn last_frame(&self) -> Option<i32> {
        self.events.last().map(|e| e.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action_state: u16) -> PlayerStateEvent {
        PlayerStateEvent {
            frame: 0,
            player_index: 0,
            action_state,
            percent: 0.0,
            stocks_remaining: 4,
            last_hit_by: None,
        }
    }

    #[test]
    fn test_punished_ranges() {
        assert!(event(0x4B).is_punished());
        assert!(event(0x5B).is_punished());
        assert!(event(0xE0).is_grabbed());
        assert!(event(0x10A).is_command_grabbed());
        assert!(event(0x150).is_command_grabbed());

        assert!(!event(0x0E).is_punished()); // wait
        assert!(!event(0x5C).is_punished());
    }

    #[test]
    fn test_barrel_is_not_a_command_grab() {
        assert!(!event(BARREL_WAIT).is_command_grabbed());
        assert!(!event(BARREL_WAIT).is_punished());
    }

    #[test]
    fn test_display_name_prefers_tag() {
        let tagged = PlayerInfo {
            index: 0,
            character: "Fox".to_string(),
            tag: Some("MANG0".to_string()),
        };
        let untagged = PlayerInfo {
            index: 1,
            character: "Marth".to_string(),
            tag: Some("  ".to_string()),
        };

        assert_eq!(tagged.display_name(), "MANG0");
        assert_eq!(untagged.display_name(), "Marth");
    }

    #[test]
    fn test_replay_document_defaults() {
        let json = r#"{
            "metadata": { "players": [ { "index": 1, "character": "Falco" }, { "index": 0, "character": "Fox" } ] },
            "events": [ { "frame": 3, "player_index": 0, "action_state": 14, "percent": 0.0, "stocks_remaining": 4 } ]
        }"#;

        let replay: GameReplay = serde_json::from_str(json).unwrap();
        assert_eq!(replay.player_indices(), vec![0, 1]);
        assert_eq!(replay.last_frame(), Some(3));
        assert!(replay.metadata.started_at.is_none());
        assert!(replay.events[0].last_hit_by.is_none());
    }
}
