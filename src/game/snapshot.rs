//! Frame snapshot building for the rendering client

use crate::ws::protocol::{BallSnapshot, PlayerSnapshot, ServerMsg, TrajectorySnapshot};

use super::session::SimulationState;

/// Decides when a frame goes out and assembles it
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (used after state-changing events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Assemble a read-only frame of everything the renderer draws
    pub fn build(
        &self,
        sim: &SimulationState,
        recording: bool,
        replay_active: bool,
    ) -> ServerMsg {
        let players = sim
            .players
            .iter()
            .enumerate()
            .map(|(index, p)| PlayerSnapshot {
                index,
                x: p.position.x,
                y: p.position.y,
            })
            .collect();

        let ball = BallSnapshot {
            x: sim.ball.position.x,
            y: sim.ball.position.y,
            velocity_x: sim.ball.velocity.x,
            velocity_y: sim.ball.velocity.y,
            attached: sim.ball.is_attached(),
            attached_player: sim.ball.attached_to,
            trajectory: sim.ball.trajectory.clone(),
        };

        let trajectory_history = sim
            .trajectory_history
            .iter()
            .map(|t| TrajectorySnapshot {
                player: t.player,
                points: t.points.clone(),
            })
            .collect();

        ServerMsg::Frame {
            recording,
            replay_active,
            players,
            ball,
            trajectory_history,
        }
    }
}
