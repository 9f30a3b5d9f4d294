//! Court geometry and simulation tuning constants

use serde::{Deserialize, Serialize};

/// Display scale used for the default court (1 meter = 60 pixels)
pub const METERS_TO_PIXELS: f32 = 60.0;

/// Default court size: 6.4m x 9.75m singles court
pub const DEFAULT_COURT_WIDTH: f32 = 6.4 * METERS_TO_PIXELS;
pub const DEFAULT_COURT_HEIGHT: f32 = 9.75 * METERS_TO_PIXELS;

/// Player body radius used for move-drag pick detection
pub const PLAYER_RADIUS: f32 = 15.0;
/// Radius of the hit circle next to each player
pub const HIT_CIRCLE_RADIUS: f32 = 8.0;
/// Horizontal offset of the hit circle from the player center
pub const HIT_CIRCLE_OFFSET: f32 = 20.0;

/// A point or vector in court-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_to(&self, other: Vec2) -> f32 {
        Vec2::new(other.x - self.x, other.y - self.y).length()
    }
}

/// Court extent in court-local coordinates (walls at x=0, x=width, y=0, y=height)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CourtDimensions {
    pub width: f32,
    pub height: f32,
}

impl Default for CourtDimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_COURT_WIDTH,
            height: DEFAULT_COURT_HEIGHT,
        }
    }
}

/// Ball tuning constants shared by live animation and replay.
/// Both paths must step with the same values or replays diverge.
#[derive(Debug, Clone, Copy)]
pub struct SimConstants {
    /// Per-step velocity decay, in (0, 1)
    pub friction: f32,
    /// Energy retained on a wall bounce, applied to both axes
    pub bounce_loss: f32,
    /// Both velocity components below this magnitude means settled
    pub settle_threshold: f32,
    /// Maximum strike power at full drag length
    pub max_power: f32,
    /// Base ball speed multiplier
    pub animation_speed: f32,
    /// Launch boost compensating for the strong friction
    pub initial_speed_factor: f32,
    /// Drag length at which strike power saturates
    pub max_arrow_length: f32,
}

impl Default for SimConstants {
    fn default() -> Self {
        Self {
            friction: 0.97,
            bounce_loss: 0.6,
            settle_threshold: 0.1,
            max_power: 150.0,
            animation_speed: 0.15,
            initial_speed_factor: 1.5,
            max_arrow_length: 0.03 * METERS_TO_PIXELS,
        }
    }
}
