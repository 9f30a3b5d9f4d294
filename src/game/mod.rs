//! Simulation modules: physics, recording, replay, codec, session

pub mod codec;
pub mod court;
pub mod physics;
pub mod recording;
pub mod replay;
pub mod session;
pub mod snapshot;

pub use session::{RallySession, SessionHandle, SessionRegistry, SimulationState};

use crate::ws::protocol::ClientMsg;

/// Client input forwarded from the WebSocket layer
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub msg: ClientMsg,
    pub received_at: u64,
}
