//! Shared helpers for integration tests: scripted replays written to temp folders.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use replay_batch::models::{GameReplay, PlayerInfo, PlayerStateEvent, ReplayMetadata};
use std::fs;
use tempfile::TempDir;

pub const WAIT: u16 = 0x0E;
pub const DAMAGED: u16 = 0x4B;
pub const GRABBED: u16 = 0xE0;
const ATTACK_BASE: u16 = 0x2C;

/// Builds a two-player replay in which player 0 punishes player 1.
pub struct ReplayScript {
    frame: i32,
    percent: f32,
    events: Vec<PlayerStateEvent>,
    started_at: Option<DateTime<Utc>>,
}

impl ReplayScript {
    pub fn new() -> Self {
        Self {
            frame: 0,
            percent: 0.0,
            events: Vec::new(),
            started_at: None,
        }
    }

    fn push(&mut self, attacker_state: u16, defender_state: u16) {
        for (player_index, action_state, percent) in [
            (0, attacker_state, 0.0),
            (1, defender_state, self.percent),
        ] {
            self.events.push(PlayerStateEvent {
                frame: self.frame,
                player_index,
                action_state,
                percent,
                stocks_remaining: 4,
                last_hit_by: None,
            });
        }
        self.frame += 1;
    }

    pub fn idle(mut self, frames: u32) -> Self {
        for _ in 0..frames {
            self.push(WAIT, WAIT);
        }
        self
    }

    /// Four distinct hits for 40% in total, then enough idle frames to close the run.
    pub fn combo(mut self) -> Self {
        for hit in 0..4 {
            self.percent += 10.0;
            for _ in 0..10 {
                self.push(ATTACK_BASE + hit, DAMAGED);
            }
        }
        self.idle(60)
    }

    /// A single hit: a conversion that is not a combo.
    pub fn conversion(mut self) -> Self {
        self.percent += 8.0;
        for _ in 0..10 {
            self.push(ATTACK_BASE, DAMAGED);
        }
        self.idle(60)
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn build(self) -> GameReplay {
        GameReplay {
            metadata: ReplayMetadata {
                stage: Some("Final Destination".to_string()),
                players: vec![
                    PlayerInfo {
                        index: 0,
                        character: "Fox".to_string(),
                        tag: Some("AAA".to_string()),
                    },
                    PlayerInfo {
                        index: 1,
                        character: "Falco".to_string(),
                        tag: None,
                    },
                ],
                duration_frames: self.frame as u32,
                started_at: self.started_at,
            },
            events: self.events,
        }
    }
}

/// Replay with `combos` combo-grade sequences.
pub fn replay_with_combos(combos: usize) -> GameReplay {
    let mut script = ReplayScript::new().idle(10);
    for _ in 0..combos {
        script = script.combo();
    }
    script.build()
}

pub fn match_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 5).unwrap()
}

pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

/// Serialize `replay` to `dir/name`, creating parent folders.
pub fn write_replay(dir: &Utf8Path, name: &str, replay: &GameReplay) -> Utf8PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, serde_json::to_vec(replay).unwrap()).unwrap();
    path
}

pub fn write_garbage(dir: &Utf8Path, name: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\x00\x01 not a replay").unwrap();
    path
}
