//! Combo and conversion detection.
//!
//! Each player is scanned as an attacker. A run opens on the first frame an
//! attributable opponent is in a punished state (damaged or grabbed) and stays
//! open while the attacker keeps punishing that opponent. It closes once more
//! than the gap tolerance has elapsed (in frame numbers, so sparse replays
//! behave like dense ones) since the last attributable punished frame, when the
//! opponent loses a stock, or when the replay ends.
//!
//! Only hits attributed to the attacker count. In games with more than two
//! players, a third player hitting the same target neither adds moves nor
//! damage to the attacker's run. A closed run is graded:
//!
//! - **conversion**: at least `conversion_min_moves` moves
//! - **combo**: a conversion with at least `combo_min_moves` moves and
//!   `combo_min_damage` percent of damage
//!
//! An attacker tracks one run at a time, so runs attributed to the same
//! player never overlap.

use std::collections::{BTreeMap, HashSet};

use super::decoder::DecodeError;
use crate::models::{
    DetectedSequence, DetectionMode, DetectionThresholds, GameReplay, PlayerStateEvent,
    SequenceGrade,
};

/// Finds combos and conversions in decoded replays.
#[derive(Debug, Clone, Default)]
pub struct ComboDetector {
    thresholds: DetectionThresholds,
}

/// All player states recorded on one frame, keyed by player index.
struct FrameStates<'a> {
    frame: i32,
    players: BTreeMap<u8, &'a PlayerStateEvent>,
}

#[derive(Debug)]
struct OpenRun {
    target: u8,
    start_frame: i32,
    start_percent: f32,
    current_percent: f32,
    moves: u32,
    last_hit_animation: Option<u16>,
    last_punished_frame: i32,
}

impl OpenRun {
    fn close(self, attacker: u8, end_frame: i32, end_percent: f32, did_kill: bool) -> ClosedRun {
        ClosedRun {
            player_index: attacker,
            opponent_index: self.target,
            start_frame: self.start_frame,
            end_frame,
            moves: self.moves,
            start_percent: self.start_percent,
            end_percent,
            did_kill,
        }
    }
}

/// A finished run before grading.
#[derive(Debug)]
struct ClosedRun {
    player_index: u8,
    opponent_index: u8,
    start_frame: i32,
    end_frame: i32,
    moves: u32,
    start_percent: f32,
    end_percent: f32,
    did_kill: bool,
}

impl ComboDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    /// Detect sequences in `replay`, keeping those that match `mode`.
    ///
    /// Output is ordered by start frame, then by player index.
    pub fn detect(
        &self,
        replay: &GameReplay,
        mode: DetectionMode,
    ) -> Result<Vec<DetectedSequence>, DecodeError> {
        validate(replay)?;

        let frames = group_by_frame(&replay.events);
        let players = replay.player_indices();
        let two_player = players.len() == 2;

        let mut sequences: Vec<DetectedSequence> = players
            .iter()
            .flat_map(|&attacker| self.scan_attacker(attacker, &players, two_player, &frames))
            .filter_map(|run| self.grade(run))
            .filter(|seq| match mode {
                DetectionMode::OnlyCombos => seq.grade == SequenceGrade::Combo,
                DetectionMode::OnlyConversions => true,
            })
            .collect();

        sequences.sort_by(|a, b| {
            a.start_frame
                .cmp(&b.start_frame)
                .then(a.player_index.cmp(&b.player_index))
        });

        tracing::debug!(
            "Detected {} {} across {} frames",
            sequences.len(),
            mode.noun(),
            frames.len()
        );

        Ok(sequences)
    }

    fn scan_attacker(
        &self,
        attacker: u8,
        players: &[u8],
        two_player: bool,
        frames: &[FrameStates<'_>],
    ) -> Vec<ClosedRun> {
        let mut closed = Vec::new();
        let mut run: Option<OpenRun> = None;
        let mut previous: BTreeMap<u8, &PlayerStateEvent> = BTreeMap::new();

        for states in frames {
            if run.is_none() {
                run = players
                    .iter()
                    .filter(|&&p| p != attacker)
                    .find_map(|&target| {
                        let opponent = states.players.get(&target)?;
                        let attributable = hit_by(opponent, attacker, two_player);
                        (attributable && opponent.is_punished()).then(|| {
                            let start_percent =
                                previous.get(&target).map_or(opponent.percent, |p| p.percent);
                            OpenRun {
                                target,
                                start_frame: states.frame,
                                start_percent,
                                current_percent: start_percent,
                                moves: 0,
                                last_hit_animation: None,
                                last_punished_frame: states.frame,
                            }
                        })
                    });
            }

            if let Some(mut open) = run.take() {
                let attacker_state = states.players.get(&attacker).map(|e| e.action_state);
                let opponent = states.players.get(&open.target).copied();
                let prev_opponent = previous.get(&open.target).copied();

                if attacker_state != open.last_hit_animation {
                    open.last_hit_animation = None;
                }

                let (punished, lost_stock, killed) = match (opponent, prev_opponent) {
                    (Some(opp), prev) => {
                        let ours = hit_by(opp, attacker, two_player);
                        let lost_stock =
                            prev.is_some_and(|p| opp.stocks_remaining < p.stocks_remaining);
                        let damage_taken = prev
                            .map(|p| opp.percent - p.percent)
                            .filter(|d| *d > 0.0 && !lost_stock);
                        let newly_grabbed = (opp.is_grabbed() || opp.is_command_grabbed())
                            && !prev.is_some_and(|p| p.is_grabbed() || p.is_command_grabbed());

                        if ours
                            && ((damage_taken.is_some() && open.last_hit_animation.is_none())
                                || newly_grabbed)
                        {
                            open.moves += 1;
                            open.last_hit_animation = attacker_state;
                        }
                        if ours && !lost_stock {
                            open.current_percent = opp.percent;
                        }
                        (ours && opp.is_punished(), lost_stock, lost_stock && ours)
                    }
                    (None, _) => (false, false, false),
                };

                if punished {
                    open.last_punished_frame = states.frame;
                }

                // Frames are validated to be non-decreasing, so the gap is never negative
                let gap = states.frame.saturating_sub(open.last_punished_frame);
                let gap_exceeded = !u32::try_from(gap)
                    .is_ok_and(|gap| gap <= self.thresholds.gap_tolerance_frames);

                if killed {
                    let end_percent = prev_opponent.map_or(open.current_percent, |p| p.percent);
                    closed.push(open.close(attacker, states.frame, end_percent, true));
                } else if lost_stock || gap_exceeded {
                    let end_percent = open.current_percent;
                    closed.push(open.close(attacker, states.frame, end_percent, false));
                } else {
                    run = Some(open);
                }
            }

            for (&player, &event) in &states.players {
                previous.insert(player, event);
            }
        }

        if let (Some(open), Some(last)) = (run, frames.last()) {
            let end_percent = open.current_percent;
            closed.push(open.close(attacker, last.frame, end_percent, false));
        }

        closed
    }

    fn grade(&self, run: ClosedRun) -> Option<DetectedSequence> {
        let t = &self.thresholds;
        if run.moves < t.conversion_min_moves {
            return None;
        }

        let damage = (run.end_percent - run.start_percent).max(0.0);
        let grade = if run.moves >= t.combo_min_moves && damage >= t.combo_min_damage {
            SequenceGrade::Combo
        } else {
            SequenceGrade::Conversion
        };

        Some(DetectedSequence {
            player_index: run.player_index,
            opponent_index: run.opponent_index,
            start_frame: run.start_frame,
            end_frame: run.end_frame,
            moves: run.moves,
            start_percent: run.start_percent,
            end_percent: run.end_percent,
            did_kill: run.did_kill,
            grade,
        })
    }
}

/// Whether `attacker` is credited with the state `opponent` is in.
///
/// Without `last_hit_by`, a punished opponent can only be credited in a
/// two-player game.
fn hit_by(opponent: &PlayerStateEvent, attacker: u8, two_player: bool) -> bool {
    match opponent.last_hit_by {
        Some(by) => by == attacker,
        None => two_player,
    }
}

/// Reject event streams the detector cannot reason about.
fn validate(replay: &GameReplay) -> Result<(), DecodeError> {
    let players: HashSet<u8> = replay.metadata.players.iter().map(|p| p.index).collect();
    if players.is_empty() {
        return Err(DecodeError::Malformed("replay declares no players".to_string()));
    }

    let mut last_frame = i32::MIN;
    let mut seen_on_frame: HashSet<u8> = HashSet::new();

    for event in &replay.events {
        if !players.contains(&event.player_index) {
            return Err(DecodeError::Malformed(format!(
                "event on frame {} references undeclared player {}",
                event.frame, event.player_index
            )));
        }
        if event.frame < last_frame {
            return Err(DecodeError::Malformed(format!(
                "frame {} appears after frame {}",
                event.frame, last_frame
            )));
        }
        if event.frame != last_frame {
            seen_on_frame.clear();
            last_frame = event.frame;
        }
        if !seen_on_frame.insert(event.player_index) {
            return Err(DecodeError::Malformed(format!(
                "player {} has more than one state on frame {}",
                event.player_index, event.frame
            )));
        }
        if !event.percent.is_finite() || event.percent < 0.0 {
            return Err(DecodeError::Malformed(format!(
                "player {} has invalid percent {} on frame {}",
                event.player_index, event.percent, event.frame
            )));
        }
    }

    Ok(())
}

fn group_by_frame(events: &[PlayerStateEvent]) -> Vec<FrameStates<'_>> {
    let mut frames: Vec<FrameStates<'_>> = Vec::new();
    for event in events {
        match frames.last_mut() {
            Some(states) if states.frame == event.frame => {
                states.players.insert(event.player_index, event);
            }
            _ => frames.push(FrameStates {
                frame: event.frame,
                players: BTreeMap::from([(event.player_index, event)]),
            }),
        }
    }
    frames
}
