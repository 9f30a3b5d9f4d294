//! WebSocket protocol message definitions
//! These are the wire types between the simulation and the rendering client

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::court::{CourtDimensions, Vec2};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Pointer pressed, in court-local pixel coordinates
    PointerDown { x: f32, y: f32 },

    /// Pointer moved while pressed
    PointerMove { x: f32, y: f32 },

    /// Pointer released; completes a move drag or a strike
    PointerUp { x: f32, y: f32 },

    /// Begin capturing actions into a fresh log
    StartRecording,

    /// End the recording session
    StopRecording,

    /// Play the current log back from its initial snapshot
    PlayRecording,

    /// Abort an active replay at the next scheduling point
    CancelReplay,

    /// Serialize the current log to a shareable string
    ExportReplay,

    /// Replace the current log with a shared replay string
    ImportReplay { data: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        server_time: u64,
        /// Court extent the client should lay out
        court: CourtDimensions,
    },

    /// Render frame (sent at regular intervals)
    Frame {
        /// A recording session is active (blink indicator)
        recording: bool,
        /// A replay currently owns the simulation
        replay_active: bool,
        players: Vec<PlayerSnapshot>,
        ball: BallSnapshot,
        /// Finished flights, one entry per archived trajectory
        trajectory_history: Vec<TrajectorySnapshot>,
    },

    RecordingStarted,

    RecordingStopped {
        /// Number of captured actions
        actions: usize,
    },

    ReplayStarted,

    /// Replay ran to the end of the log
    ReplayFinished,

    /// Replay was cancelled before completion
    ReplayCancelled,

    /// Result of an export request
    ReplayExported { data: String },

    /// An imported log was accepted
    ReplayImported { actions: usize },

    /// Pong response with the client timestamp
    Pong { t: u64 },

    /// User-facing error notice
    Error { code: String, message: String },
}

/// Player position for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub index: usize,
    pub x: f32,
    pub y: f32,
}

/// Ball state for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub attached: bool,
    pub attached_player: Option<usize>,
    /// Points of the flight currently in progress
    pub trajectory: Vec<Vec2>,
}

/// An archived flight, tagged with the striking player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectorySnapshot {
    pub player: usize,
    pub points: Vec<Vec2>,
}
