//! Action log and recording session state machine

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::court::Vec2;

/// A single recorded player action.
///
/// `time` is a logical sequence number assigned at record time; replay
/// pacing is driven by fixed pauses, never by this field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub time: u64,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Action payload, exactly one variant per gesture kind.
///
/// Serializes to the `{type: "move"|"hit", data: {...}}` wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ActionKind {
    /// Final position reached by a player drag
    #[serde(rename_all = "camelCase")]
    Move { player_id: usize, x: f32, y: f32 },
    /// Strike: launch point and the exact velocity computed at release
    #[serde(rename_all = "camelCase")]
    Hit {
        player_id: usize,
        start_x: f32,
        start_y: f32,
        velocity_x: f32,
        velocity_y: f32,
    },
}

impl ActionKind {
    /// Player the action belongs to, clamped to a valid index
    pub fn player_index(&self) -> usize {
        let id = match self {
            ActionKind::Move { player_id, .. } => *player_id,
            ActionKind::Hit { player_id, .. } => *player_id,
        };
        id.min(1)
    }
}

/// Ordered action sequence plus the player positions at recording start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub initial_positions: [Vec2; 2],
    pub actions: Vec<Action>,
}

impl ActionLog {
    pub fn empty() -> Self {
        Self {
            initial_positions: [Vec2::ZERO, Vec2::ZERO],
            actions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Recording session states; there is no paused state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Owns the action log and gates writes to an active recording session
#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    log: ActionLog,
    next_time: u64,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            log: ActionLog::empty(),
            next_time: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Begin a recording session: snapshot the players' current positions
    /// and discard the previous log. No-op if already recording.
    pub fn start(&mut self, positions: [Vec2; 2]) {
        if self.state == RecorderState::Recording {
            return;
        }
        self.log = ActionLog {
            initial_positions: positions,
            actions: Vec::new(),
        };
        self.next_time = 0;
        self.state = RecorderState::Recording;
        debug!("recording started");
    }

    /// Append an action with the next logical time value.
    /// Silently ignored outside a recording session.
    pub fn record(&mut self, kind: ActionKind) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.log.actions.push(Action {
            time: self.next_time,
            kind,
        });
        self.next_time += 1;
    }

    /// End the recording session. No-op when idle.
    pub fn stop(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.state = RecorderState::Idle;
        debug!(actions = self.log.len(), "recording stopped");
    }

    /// Replace the log wholesale with an imported one.
    /// Only valid while idle; the active session owns the log otherwise.
    pub fn replace_log(&mut self, log: ActionLog) -> bool {
        if self.state == RecorderState::Recording {
            return false;
        }
        self.next_time = log.len() as u64;
        self.log = log;
        true
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn move_action(x: f32, y: f32) -> ActionKind {
        ActionKind::Move {
            player_id: 0,
            x,
            y,
        }
    }

    #[test]
    fn record_outside_session_is_a_noop() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.log().len(), 0);

        recorder.record(move_action(10.0, 10.0));
        assert_eq!(recorder.log().len(), 0);

        recorder.start([Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]);
        recorder.stop();
        recorder.record(move_action(10.0, 10.0));
        assert_eq!(recorder.log().len(), 0);
    }

    #[test]
    fn start_snapshots_positions_and_clears_previous_log() {
        let mut recorder = Recorder::new();

        recorder.start([Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]);
        recorder.record(move_action(5.0, 6.0));
        recorder.stop();
        assert_eq!(recorder.log().len(), 1);

        recorder.start([Vec2::new(9.0, 9.0), Vec2::new(8.0, 8.0)]);
        assert_eq!(recorder.log().len(), 0);
        assert_eq!(
            recorder.log().initial_positions,
            [Vec2::new(9.0, 9.0), Vec2::new(8.0, 8.0)]
        );
    }

    #[test]
    fn times_increase_monotonically() {
        let mut recorder = Recorder::new();
        recorder.start([Vec2::ZERO, Vec2::ZERO]);
        recorder.record(move_action(1.0, 1.0));
        recorder.record(ActionKind::Hit {
            player_id: 1,
            start_x: 1.0,
            start_y: 1.0,
            velocity_x: -5.0,
            velocity_y: 0.0,
        });
        recorder.record(move_action(2.0, 2.0));
        recorder.stop();

        let times: Vec<u64> = recorder.log().actions.iter().map(|a| a.time).collect();
        assert_eq!(times, vec![0, 1, 2]);
    }

    #[test]
    fn replace_log_rejected_while_recording() {
        let mut recorder = Recorder::new();
        recorder.start([Vec2::ZERO, Vec2::ZERO]);
        recorder.record(move_action(1.0, 1.0));

        assert!(!recorder.replace_log(ActionLog::empty()));
        assert_eq!(recorder.log().len(), 1);

        recorder.stop();
        assert!(recorder.replace_log(ActionLog::empty()));
        assert_eq!(recorder.log().len(), 0);
    }

    #[test]
    fn out_of_range_player_id_clamps() {
        let kind = ActionKind::Move {
            player_id: 7,
            x: 0.0,
            y: 0.0,
        };
        assert_eq!(kind.player_index(), 1);
    }
}
