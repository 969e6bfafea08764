//! Player movement integration

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::ws::protocol::InputVector;

/// Radius of the ring players spawn on
const SPAWN_RADIUS: f32 = 5.0;

/// 3D vector used for positions and velocities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Movement tuning taken from the game config
#[derive(Debug, Clone, Copy)]
pub struct MovementParams {
    pub acceleration: f32,
    pub damping: f32,
    pub jump_velocity: f32,
    pub gravity: f32,
}

impl From<&GameConfig> for MovementParams {
    fn from(config: &GameConfig) -> Self {
        Self {
            acceleration: config.acceleration,
            damping: config.damping,
            jump_velocity: config.jump_velocity,
            gravity: config.gravity,
        }
    }
}

/// Physics system for updating player positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one body by `dt` seconds under the given input
    pub fn integrate(
        position: &mut Vec3,
        velocity: &mut Vec3,
        input: &InputVector,
        params: &MovementParams,
        dt: f32,
    ) {
        velocity.x += input.x * params.acceleration * dt;
        velocity.z += input.z * params.acceleration * dt;

        let grounded = position.y <= 0.0;
        if input.jump && grounded {
            velocity.y = params.jump_velocity;
        } else if !grounded {
            velocity.y -= params.gravity * dt;
        }

        velocity.x *= params.damping;
        velocity.z *= params.damping;

        position.x += velocity.x * dt;
        position.y += velocity.y * dt;
        position.z += velocity.z * dt;

        // Landed
        if position.y <= 0.0 {
            position.y = 0.0;
            if velocity.y < 0.0 {
                velocity.y = 0.0;
            }
        }
    }

    /// Spawn point for a seat, evenly spaced on a ring around the origin
    pub fn spawn_position(seat: usize, seats: usize) -> Vec3 {
        let angle = std::f32::consts::TAU * seat as f32 / seats.max(1) as f32;
        Vec3::new(angle.cos() * SPAWN_RADIUS, 0.0, angle.sin() * SPAWN_RADIUS)
    }
}
