//! Deterministic replay engine
//!
//! The engine is a resumable state machine: every `advance` call performs
//! exactly one scheduling unit (one pause, one interpolation step, or one
//! physics frame) and reports how long the driver should wait before the
//! next call. The session tick loop is the only scheduler; cancellation is
//! a flag observed at every advance, i.e. at every suspension point.

use std::time::Duration;

use tracing::debug;

use super::court::{SimConstants, Vec2};
use super::physics::{BallPhysics, StepOutcome};
use super::recording::{ActionKind, ActionLog};
use super::session::SimulationState;

/// Fixed pause before each action is applied
pub const ACTION_PAUSE: Duration = Duration::from_millis(2000);
/// Delay between physics frames while replaying a hit
pub const FLIGHT_FRAME_DELAY: Duration = Duration::from_millis(32);
/// Hard cap on physics frames per hit, against strikes that never settle
pub const FLIGHT_FRAME_CAP: u32 = 300;
/// Interpolation steps for a replayed player move (one second total)
pub const MOVE_STEPS: u32 = 60;
/// Delay between interpolation steps
pub const MOVE_STEP_DELAY: Duration = Duration::from_millis(1000 / MOVE_STEPS as u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    /// Not started, or ran to completion
    Idle,
    Running,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Waiting out the inter-action pause before action `next`
    Pause { next: usize },
    /// Interpolating a player move, `step` of `MOVE_STEPS` applied
    Move { index: usize, from: Vec2, step: u32 },
    /// Stepping ball flight for a hit
    Flight { index: usize, frame: u32 },
    Done,
}

/// One completed scheduling unit
#[derive(Debug, Clone, Copy)]
pub struct ReplayTick {
    /// How long the driver should wait before the next `advance`
    pub delay: Duration,
}

/// Replays an action log against a simulation it temporarily owns.
/// The log is only ever read; replays are repeatable.
#[derive(Debug)]
pub struct ReplayEngine {
    phase: Phase,
    status: ReplayStatus,
}

impl ReplayEngine {
    /// Reset the simulation to the log's initial snapshot and begin.
    /// Players return to their recorded positions, the ball re-attaches
    /// to the first player, and all trajectory history is cleared.
    pub fn start(log: &ActionLog, sim: &mut SimulationState) -> Self {
        for (player, position) in sim.players.iter_mut().zip(log.initial_positions) {
            player.position = position;
        }
        sim.ball = super::physics::BallState::attached_at(0, sim.players[0].position);
        sim.trajectory_history.clear();

        debug!(actions = log.len(), "replay started");
        Self {
            phase: Phase::Pause { next: 0 },
            status: ReplayStatus::Running,
        }
    }

    pub fn status(&self) -> ReplayStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == ReplayStatus::Running
    }

    /// Request cancellation; observed on the next `advance`. State stays
    /// at the last completed step, never rolled back.
    pub fn cancel(&mut self) {
        if self.status == ReplayStatus::Running {
            self.status = ReplayStatus::Cancelled;
        }
    }

    /// Perform one scheduling unit. Returns `None` once the replay has
    /// finished or was cancelled; the simulation is left consistent at the
    /// last completed step either way.
    pub fn advance(
        &mut self,
        log: &ActionLog,
        sim: &mut SimulationState,
        constants: &SimConstants,
    ) -> Option<ReplayTick> {
        if self.status != ReplayStatus::Running {
            return None;
        }

        match self.phase {
            Phase::Pause { next } => {
                if next >= log.actions.len() {
                    self.phase = Phase::Done;
                    self.status = ReplayStatus::Idle;
                    debug!("replay finished");
                    return None;
                }
                // Arm the action without applying it, so a cancellation
                // during the pause leaves it untouched.
                self.phase = match log.actions[next].kind {
                    ActionKind::Move { .. } => Phase::Move {
                        index: next,
                        from: sim.players[log.actions[next].kind.player_index()].position,
                        step: 0,
                    },
                    ActionKind::Hit { .. } => Phase::Flight {
                        index: next,
                        frame: 0,
                    },
                };
                Some(ReplayTick {
                    delay: ACTION_PAUSE,
                })
            }

            Phase::Move { index, from, step } => {
                let player = log.actions[index].kind.player_index();
                let ActionKind::Move { x, y, .. } = log.actions[index].kind else {
                    unreachable!("move phase armed from a move action");
                };

                let progress = step as f32 / MOVE_STEPS as f32;
                sim.players[player].position = Vec2::new(
                    from.x + (x - from.x) * progress,
                    from.y + (y - from.y) * progress,
                );
                sim.sync_attached_ball();

                self.phase = if step >= MOVE_STEPS {
                    Phase::Pause { next: index + 1 }
                } else {
                    Phase::Move {
                        index,
                        from,
                        step: step + 1,
                    }
                };
                Some(ReplayTick {
                    delay: MOVE_STEP_DELAY,
                })
            }

            Phase::Flight { index, frame } => {
                let ActionKind::Hit {
                    start_x,
                    start_y,
                    velocity_x,
                    velocity_y,
                    ..
                } = log.actions[index].kind
                else {
                    unreachable!("flight phase armed from a hit action");
                };

                if frame == 0 {
                    // Recorded velocity is used verbatim, never recomputed
                    // from the drag points.
                    sim.ball.launch(
                        log.actions[index].kind.player_index(),
                        Vec2::new(start_x, start_y),
                        Vec2::new(velocity_x, velocity_y),
                    );
                }

                let court = sim.court;
                let outcome = BallPhysics::step(&mut sim.ball, court, constants);
                let frame = frame + 1;

                if outcome == StepOutcome::Settled || frame >= FLIGHT_FRAME_CAP {
                    sim.archive_flight();
                    self.phase = Phase::Pause { next: index + 1 };
                } else {
                    self.phase = Phase::Flight { index, frame };
                }
                Some(ReplayTick {
                    delay: FLIGHT_FRAME_DELAY,
                })
            }

            Phase::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::court::CourtDimensions;
    use crate::game::recording::Action;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn new_sim() -> SimulationState {
        SimulationState::new(CourtDimensions::default())
    }

    fn log_with(actions: Vec<ActionKind>) -> ActionLog {
        ActionLog {
            initial_positions: [Vec2::new(288.0, 292.5), Vec2::new(96.0, 292.5)],
            actions: actions
                .into_iter()
                .enumerate()
                .map(|(i, kind)| Action {
                    time: i as u64,
                    kind,
                })
                .collect(),
        }
    }

    fn run_to_end(log: &ActionLog, sim: &mut SimulationState, constants: &SimConstants) {
        let mut engine = ReplayEngine::start(log, sim);
        while engine.advance(log, sim, constants).is_some() {}
        assert_eq!(engine.status(), ReplayStatus::Idle);
    }

    #[test]
    fn first_advance_is_a_pause_that_applies_nothing() {
        let constants = SimConstants::default();
        let log = log_with(vec![ActionKind::Move {
            player_id: 0,
            x: 50.0,
            y: 50.0,
        }]);
        let mut sim = new_sim();
        let mut engine = ReplayEngine::start(&log, &mut sim);

        let before = sim.players[0].position;
        let tick = engine.advance(&log, &mut sim, &constants).unwrap();

        assert_eq!(tick.delay, ACTION_PAUSE);
        assert_eq!(sim.players[0].position, before);
    }

    #[test]
    fn cancel_during_pause_leaves_the_action_unapplied() {
        let constants = SimConstants::default();
        let log = log_with(vec![ActionKind::Hit {
            player_id: 0,
            start_x: 288.0,
            start_y: 292.5,
            velocity_x: -20.0,
            velocity_y: 0.0,
        }]);
        let mut sim = new_sim();
        let mut engine = ReplayEngine::start(&log, &mut sim);

        engine.advance(&log, &mut sim, &constants).unwrap();
        engine.cancel();

        assert!(engine.advance(&log, &mut sim, &constants).is_none());
        assert_eq!(engine.status(), ReplayStatus::Cancelled);
        assert!(sim.ball.is_attached(), "hit must not have launched");
        assert!(sim.ball.trajectory.is_empty());
    }

    #[test]
    fn move_interpolates_to_the_exact_destination() {
        let constants = SimConstants::default();
        let log = log_with(vec![ActionKind::Move {
            player_id: 1,
            x: 200.0,
            y: 100.0,
        }]);
        let mut sim = new_sim();
        let mut engine = ReplayEngine::start(&log, &mut sim);

        // Pause tick
        engine.advance(&log, &mut sim, &constants).unwrap();

        let mut move_ticks = 0;
        while let Some(tick) = engine.advance(&log, &mut sim, &constants) {
            if tick.delay == MOVE_STEP_DELAY {
                move_ticks += 1;
            }
        }

        assert_eq!(move_ticks, MOVE_STEPS + 1, "steps 0..=MOVE_STEPS inclusive");
        assert_eq!(sim.players[1].position, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn attached_ball_follows_a_replayed_move_of_its_player() {
        let constants = SimConstants::default();
        let log = log_with(vec![ActionKind::Move {
            player_id: 0,
            x: 10.0,
            y: 20.0,
        }]);
        let mut sim = new_sim();
        run_to_end(&log, &mut sim, &constants);

        assert_eq!(sim.ball.attached_to, Some(0));
        assert_eq!(sim.ball.position, Vec2::new(10.0, 20.0));
    }

    #[test]
    fn hit_replays_the_stored_velocity_verbatim() {
        let constants = SimConstants::default();
        // A velocity no drag gesture would produce; replay must not care.
        let log = log_with(vec![ActionKind::Hit {
            player_id: 1,
            start_x: 96.0,
            start_y: 292.5,
            velocity_x: 7.125,
            velocity_y: -2.0,
        }]);
        let mut sim = new_sim();
        let mut engine = ReplayEngine::start(&log, &mut sim);

        engine.advance(&log, &mut sim, &constants).unwrap();
        engine.advance(&log, &mut sim, &constants).unwrap();

        // After one physics frame: friction applied once, position moved
        assert!(!sim.ball.is_attached());
        assert!((sim.ball.velocity.x - 7.125 * 0.97).abs() < 1e-5);
        assert_eq!(sim.ball.trajectory.len(), 1);
        assert_eq!(sim.ball.last_hit_by, 1);
    }

    #[test]
    fn flight_frame_cap_bounds_a_hit_that_never_settles() {
        // Lossless constants: the ball bounces forever
        let constants = SimConstants {
            friction: 1.0,
            bounce_loss: 1.0,
            ..SimConstants::default()
        };
        let log = log_with(vec![ActionKind::Hit {
            player_id: 0,
            start_x: 192.0,
            start_y: 292.5,
            velocity_x: 9.0,
            velocity_y: 4.0,
        }]);
        let mut sim = new_sim();
        run_to_end(&log, &mut sim, &constants);

        assert_eq!(sim.trajectory_history.len(), 1);
        assert_eq!(
            sim.trajectory_history[0].points.len(),
            FLIGHT_FRAME_CAP as usize
        );
    }

    #[test]
    fn hit_archives_the_flight_tagged_with_the_striker() {
        let constants = SimConstants::default();
        let log = log_with(vec![
            ActionKind::Hit {
                player_id: 0,
                start_x: 288.0,
                start_y: 292.5,
                velocity_x: -20.0,
                velocity_y: 0.0,
            },
            ActionKind::Hit {
                player_id: 1,
                start_x: 96.0,
                start_y: 292.5,
                velocity_x: 15.0,
                velocity_y: 2.0,
            },
        ]);
        let mut sim = new_sim();
        run_to_end(&log, &mut sim, &constants);

        assert_eq!(sim.trajectory_history.len(), 2);
        assert_eq!(sim.trajectory_history[0].player, 0);
        assert_eq!(sim.trajectory_history[1].player, 1);
        assert!(sim.ball.trajectory.is_empty(), "live buffer cleared");
    }

    #[test]
    fn two_runs_of_the_same_log_are_identical() {
        let constants = SimConstants::default();
        let log = log_with(vec![
            ActionKind::Move {
                player_id: 0,
                x: 300.0,
                y: 120.0,
            },
            ActionKind::Hit {
                player_id: 0,
                start_x: 300.0,
                start_y: 120.0,
                velocity_x: -22.5,
                velocity_y: 13.0,
            },
            ActionKind::Move {
                player_id: 1,
                x: 60.0,
                y: 500.0,
            },
            ActionKind::Hit {
                player_id: 1,
                start_x: 60.0,
                start_y: 500.0,
                velocity_x: 18.0,
                velocity_y: -25.0,
            },
        ]);

        let mut first = new_sim();
        run_to_end(&log, &mut first, &constants);
        let mut second = new_sim();
        run_to_end(&log, &mut second, &constants);

        assert_eq!(first.trajectory_history, second.trajectory_history);
        assert_eq!(first.ball.position, second.ball.position);
        assert_eq!(first.players[0].position, second.players[0].position);
        assert_eq!(first.players[1].position, second.players[1].position);
    }

    #[test]
    fn determinism_holds_over_randomized_logs() {
        let constants = SimConstants::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0x5145);
        let max_speed = BallPhysics::max_launch_speed(&constants);
        let court = CourtDimensions::default();

        for _ in 0..20 {
            let mut actions = Vec::new();
            for _ in 0..rng.gen_range(1..8) {
                let player_id = rng.gen_range(0..2usize);
                let x = rng.gen_range(0.0..court.width);
                let y = rng.gen_range(0.0..court.height);
                if rng.gen_bool(0.5) {
                    actions.push(ActionKind::Move { player_id, x, y });
                } else {
                    actions.push(ActionKind::Hit {
                        player_id,
                        start_x: x,
                        start_y: y,
                        velocity_x: rng.gen_range(-max_speed..max_speed),
                        velocity_y: rng.gen_range(-max_speed..max_speed),
                    });
                }
            }
            let log = log_with(actions);

            let mut first = new_sim();
            run_to_end(&log, &mut first, &constants);
            let mut second = new_sim();
            run_to_end(&log, &mut second, &constants);

            assert_eq!(first.trajectory_history, second.trajectory_history);
            assert_eq!(first.ball.position, second.ball.position);
        }
    }

    #[test]
    fn start_restores_initial_positions_and_resets_the_ball() {
        let log = log_with(vec![ActionKind::Move {
            player_id: 0,
            x: 1.0,
            y: 1.0,
        }]);
        let mut sim = new_sim();
        sim.players[0].position = Vec2::new(5.0, 5.0);
        sim.players[1].position = Vec2::new(6.0, 6.0);
        sim.ball.launch(0, Vec2::new(5.0, 5.0), Vec2::new(3.0, 0.0));

        let engine = ReplayEngine::start(&log, &mut sim);

        assert!(engine.is_running());
        assert_eq!(sim.players[0].position, Vec2::new(288.0, 292.5));
        assert_eq!(sim.players[1].position, Vec2::new(96.0, 292.5));
        assert_eq!(sim.ball.attached_to, Some(0));
        assert_eq!(sim.ball.position, sim.players[0].position);
        assert_eq!(sim.ball.velocity, Vec2::ZERO);
        assert!(sim.trajectory_history.is_empty());
    }
}
