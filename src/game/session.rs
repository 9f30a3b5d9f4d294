//! Rally session: simulation ownership and the authoritative tick loop

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::util::time::{SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::codec;
use super::court::{
    CourtDimensions, SimConstants, Vec2, HIT_CIRCLE_OFFSET, HIT_CIRCLE_RADIUS, PLAYER_RADIUS,
};
use super::physics::{BallPhysics, BallState, StepOutcome};
use super::recording::{ActionKind, Recorder};
use super::replay::{ReplayEngine, ReplayStatus};
use super::snapshot::SnapshotBuilder;
use super::SessionInput;

/// One of the two court players; identity is the array index
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec2,
}

/// A finished flight kept for rendering, tagged with the striker
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedTrajectory {
    pub player: usize,
    pub points: Vec<Vec2>,
}

/// All mutable simulation state. Exactly one engine owns it at a time:
/// the live tick or an active replay, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub court: CourtDimensions,
    pub players: [PlayerState; 2],
    pub ball: BallState,
    pub trajectory_history: Vec<ArchivedTrajectory>,
}

impl SimulationState {
    pub fn new(court: CourtDimensions) -> Self {
        let first = Vec2::new(court.width * 0.75, court.height * 0.5);
        let second = Vec2::new(court.width * 0.25, court.height * 0.5);
        Self {
            court,
            players: [
                PlayerState { position: first },
                PlayerState { position: second },
            ],
            ball: BallState::attached_at(0, first),
            trajectory_history: Vec::new(),
        }
    }

    /// Keep an attached ball glued to its player
    pub fn sync_attached_ball(&mut self) {
        if let Some(index) = self.ball.attached_to {
            self.ball.position = self.players[index].position;
        }
    }

    /// Move the live trajectory into history, tagged with the striker.
    /// No-op for an empty buffer.
    pub fn archive_flight(&mut self) {
        if self.ball.trajectory.is_empty() {
            return;
        }
        self.trajectory_history.push(ArchivedTrajectory {
            player: self.ball.last_hit_by,
            points: std::mem::take(&mut self.ball.trajectory),
        });
    }
}

/// In-progress pointer gesture
#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    None,
    /// Dragging a player body to a new position
    MovePlayer { index: usize },
    /// Dragging out a strike arrow from the player's hit circle
    Aim { player: usize, start: Vec2 },
}

/// A replay in flight, driven by the session tick loop
struct ActiveReplay {
    engine: ReplayEngine,
    next_wake: Instant,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<SessionInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
}

/// Registry of all live sessions, for health reporting
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative rally session
pub struct RallySession {
    id: Uuid,
    constants: SimConstants,
    sim: SimulationState,
    recorder: Recorder,
    drag: DragState,
    /// Live ball flight in progress
    animating: bool,
    replay: Option<ActiveReplay>,
    input_rx: mpsc::Receiver<SessionInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
}

impl RallySession {
    pub fn new(id: Uuid, court: CourtDimensions) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);

        let handle = SessionHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
        };

        let session = Self {
            id,
            constants: SimConstants::default(),
            sim: SimulationState::new(court),
            recorder: Recorder::new(),
            drag: DragState::None,
            animating: false,
            replay: None,
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS),
        };

        (session, handle)
    }

    /// Run the authoritative tick loop until the client disconnects
    pub async fn run(mut self) {
        info!(session_id = %self.id, "Session started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_inputs() {
                break;
            }

            self.tick(Instant::now());

            if self.snapshot_builder.should_send() {
                let frame = self.snapshot_builder.build(
                    &self.sim,
                    self.recorder.is_recording(),
                    self.replay.is_some(),
                );
                let _ = self.snapshot_tx.send(frame);
            }
        }

        info!(session_id = %self.id, "Session closed");
    }

    /// Drain pending client messages; false once the input side is gone
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => self.handle_msg(input.msg),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// One simulation tick: either the replay holds the turn or the live
    /// flight does, never both.
    fn tick(&mut self, now: Instant) {
        if self.replay.is_some() {
            self.drive_replay(now);
        } else if self.animating {
            let court = self.sim.court;
            if BallPhysics::step(&mut self.sim.ball, court, &self.constants)
                == StepOutcome::Settled
            {
                self.animating = false;
            }
        }
        self.sim.sync_attached_ball();
    }

    /// Advance an active replay when its wake time has come. Cancellation
    /// is observed here, the single scheduling point.
    fn drive_replay(&mut self, now: Instant) {
        let ended = {
            let Some(active) = self.replay.as_mut() else {
                return;
            };
            if active.engine.is_running() && now < active.next_wake {
                return;
            }
            match active
                .engine
                .advance(self.recorder.log(), &mut self.sim, &self.constants)
            {
                Some(tick) => {
                    active.next_wake = now + tick.delay;
                    return;
                }
                None => active.engine.status(),
            }
        };

        self.replay = None;
        self.snapshot_builder.force_next();
        let msg = if ended == ReplayStatus::Cancelled {
            ServerMsg::ReplayCancelled
        } else {
            ServerMsg::ReplayFinished
        };
        info!(session_id = %self.id, cancelled = (ended == ReplayStatus::Cancelled), "Replay ended");
        let _ = self.snapshot_tx.send(msg);
    }

    fn handle_msg(&mut self, msg: ClientMsg) {
        // Always answered, replaying or not
        match msg {
            ClientMsg::Ping { t } => {
                let _ = self.snapshot_tx.send(ServerMsg::Pong { t });
                return;
            }
            ClientMsg::CancelReplay => {
                if let Some(active) = self.replay.as_mut() {
                    active.engine.cancel();
                }
                return;
            }
            _ => {}
        }

        // The replay owns the simulation; everything else is dropped
        if self.replay.is_some() {
            return;
        }

        match msg {
            ClientMsg::PointerDown { x, y } => self.pointer_down(Vec2::new(x, y)),
            ClientMsg::PointerMove { x, y } => self.pointer_move(Vec2::new(x, y)),
            ClientMsg::PointerUp { x, y } => self.pointer_up(Vec2::new(x, y)),
            ClientMsg::StartRecording => self.start_recording(),
            ClientMsg::StopRecording => self.stop_recording(),
            ClientMsg::PlayRecording => self.start_replay(),
            ClientMsg::ExportReplay => self.export_replay(),
            ClientMsg::ImportReplay { data } => self.import_replay(&data),
            ClientMsg::Ping { .. } | ClientMsg::CancelReplay => unreachable!("handled above"),
        }
    }

    fn pointer_down(&mut self, point: Vec2) {
        for index in 0..self.sim.players.len() {
            let player = self.sim.players[index].position;

            let hit_circle = Vec2::new(player.x + HIT_CIRCLE_OFFSET, player.y);
            if point.distance_to(hit_circle) < HIT_CIRCLE_RADIUS {
                // Strike gesture: finish the previous flight, then snap
                // the ball to the striker.
                self.sim.archive_flight();
                self.animating = false;
                self.sim.ball.velocity = Vec2::ZERO;
                self.sim.ball.attached_to = Some(index);
                self.sim.ball.last_hit_by = index;
                self.sim.ball.position = player;
                self.drag = DragState::Aim {
                    player: index,
                    start: player,
                };
                return;
            }

            if point.distance_to(player) < PLAYER_RADIUS {
                self.drag = DragState::MovePlayer { index };
                return;
            }
        }
    }

    fn pointer_move(&mut self, point: Vec2) {
        if let DragState::MovePlayer { index } = self.drag {
            self.sim.players[index].position = point;
            self.sim.sync_attached_ball();
        }
    }

    fn pointer_up(&mut self, point: Vec2) {
        match self.drag {
            DragState::Aim { player, start } => {
                let drag = Vec2::new(point.x - start.x, point.y - start.y);
                let velocity = BallPhysics::launch_velocity(drag, &self.constants);
                if velocity != Vec2::ZERO {
                    // The exact release velocity goes into the log; replay
                    // reuses it rather than recomputing from drag points.
                    self.recorder.record(ActionKind::Hit {
                        player_id: player,
                        start_x: start.x,
                        start_y: start.y,
                        velocity_x: velocity.x,
                        velocity_y: velocity.y,
                    });
                    self.sim.ball.launch(player, start, velocity);
                    self.animating = true;
                }
            }
            DragState::MovePlayer { index } => {
                self.sim.players[index].position = point;
                self.sim.sync_attached_ball();
                // Only the final drop position is recorded
                self.recorder.record(ActionKind::Move {
                    player_id: index,
                    x: point.x,
                    y: point.y,
                });
            }
            DragState::None => {}
        }
        self.drag = DragState::None;
    }

    fn start_recording(&mut self) {
        if self.recorder.is_recording() {
            return;
        }
        self.recorder.start([
            self.sim.players[0].position,
            self.sim.players[1].position,
        ]);
        self.snapshot_builder.force_next();
        let _ = self.snapshot_tx.send(ServerMsg::RecordingStarted);
    }

    fn stop_recording(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        self.recorder.stop();
        info!(session_id = %self.id, actions = self.recorder.log().len(), "Recording stopped");
        let _ = self.snapshot_tx.send(ServerMsg::RecordingStopped {
            actions: self.recorder.log().len(),
        });
    }

    fn start_replay(&mut self) {
        if self.replay.is_some() {
            return;
        }
        if self.recorder.is_recording() {
            self.send_error("recording_active", "Stop recording before replaying");
            return;
        }
        if self.recorder.log().is_empty() {
            self.send_error("empty_log", "No recorded actions to replay");
            return;
        }

        let engine = ReplayEngine::start(self.recorder.log(), &mut self.sim);
        self.animating = false;
        self.drag = DragState::None;
        self.replay = Some(ActiveReplay {
            engine,
            next_wake: Instant::now(),
        });
        self.snapshot_builder.force_next();
        let _ = self.snapshot_tx.send(ServerMsg::ReplayStarted);
    }

    fn export_replay(&mut self) {
        match codec::encode(self.recorder.log(), self.sim.court) {
            Ok(data) => {
                let _ = self.snapshot_tx.send(ServerMsg::ReplayExported { data });
            }
            Err(e) => self.send_codec_error(e),
        }
    }

    fn import_replay(&mut self, data: &str) {
        match codec::decode(data, self.sim.court) {
            Ok(log) => {
                let actions = log.len();
                if !self.recorder.replace_log(log) {
                    self.send_error("recording_active", "Stop recording before importing");
                    return;
                }
                let _ = self.snapshot_tx.send(ServerMsg::ReplayImported { actions });
                // Imported replays play back immediately
                self.start_replay();
            }
            // Decode failures leave the current log untouched
            Err(e) => self.send_codec_error(e),
        }
    }

    fn send_codec_error(&self, e: codec::CodecError) {
        warn!(session_id = %self.id, error = %e, "Replay codec error");
        self.send_error(e.code(), &e.to_string());
    }

    fn send_error(&self, code: &str, message: &str) {
        let _ = self.snapshot_tx.send(ServerMsg::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}
