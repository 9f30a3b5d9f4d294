//! Ball physics: discrete friction/bounce integration

use super::court::{CourtDimensions, SimConstants, Vec2};

/// Ball state, owned by the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct BallState {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Index of the player the ball is attached to, if any.
    /// While attached the ball tracks that player and has zero velocity.
    pub attached_to: Option<usize>,
    /// Player that launched the current flight
    pub last_hit_by: usize,
    /// Positions accumulated during the current flight
    pub trajectory: Vec<Vec2>,
}

impl BallState {
    pub fn attached_at(player: usize, position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            attached_to: Some(player),
            last_hit_by: player,
            trajectory: Vec::new(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached_to.is_some()
    }

    /// Detach and launch from `start` with the given velocity
    pub fn launch(&mut self, player: usize, start: Vec2, velocity: Vec2) {
        self.position = start;
        self.velocity = velocity;
        self.attached_to = None;
        self.last_hit_by = player;
        self.trajectory.clear();
    }
}

/// Result of a single integration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Ball is still in flight
    Moving,
    /// Both velocity components dropped below the settle threshold
    Settled,
}

/// Physics system for ball flight
pub struct BallPhysics;

impl BallPhysics {
    /// Advance the ball by one discrete step.
    ///
    /// Order is identical on every caller: decay velocity, integrate
    /// position, resolve wall bounces, record the trajectory point, then
    /// test the settle condition. Live animation and replay both go
    /// through here, which is what makes replays bit-for-bit exact.
    pub fn step(
        ball: &mut BallState,
        bounds: CourtDimensions,
        constants: &SimConstants,
    ) -> StepOutcome {
        ball.velocity.x *= constants.friction;
        ball.velocity.y *= constants.friction;

        ball.position.x += ball.velocity.x;
        ball.position.y += ball.velocity.y;

        // Wall bounces: clamp to the boundary, flip the perpendicular
        // component, and bleed energy into the parallel component too.
        let loss = constants.bounce_loss;
        if ball.position.x <= 0.0 {
            ball.position.x = 0.0;
            ball.velocity.x *= -loss;
            ball.velocity.y *= loss;
        }
        if ball.position.x >= bounds.width {
            ball.position.x = bounds.width;
            ball.velocity.x *= -loss;
            ball.velocity.y *= loss;
        }
        if ball.position.y <= 0.0 {
            ball.position.y = 0.0;
            ball.velocity.y *= -loss;
            ball.velocity.x *= loss;
        }
        if ball.position.y >= bounds.height {
            ball.position.y = bounds.height;
            ball.velocity.y *= -loss;
            ball.velocity.x *= loss;
        }

        if !ball.is_attached() {
            ball.trajectory.push(ball.position);
        }

        if ball.velocity.x.abs() < constants.settle_threshold
            && ball.velocity.y.abs() < constants.settle_threshold
        {
            StepOutcome::Settled
        } else {
            StepOutcome::Moving
        }
    }

    /// Compute the launch velocity for a strike drag gesture.
    ///
    /// Direction is the inverse of the drag vector; power scales with the
    /// drag length, saturating at `max_arrow_length`. The result is stored
    /// verbatim in the action log so replay never recomputes it.
    pub fn launch_velocity(drag: Vec2, constants: &SimConstants) -> Vec2 {
        let length = drag.length();
        if length <= f32::EPSILON {
            return Vec2::ZERO;
        }

        let normalized = length.min(constants.max_arrow_length);
        let power = (normalized / constants.max_arrow_length) * constants.max_power;
        let scale = power * constants.animation_speed * constants.initial_speed_factor;

        Vec2::new((-drag.x / length) * scale, (-drag.y / length) * scale)
    }

    /// Maximum launch speed producible by `launch_velocity`
    pub fn max_launch_speed(constants: &SimConstants) -> f32 {
        constants.max_power * constants.animation_speed * constants.initial_speed_factor
    }
}
