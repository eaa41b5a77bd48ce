//! Math types for StarSonic

pub use glam::{Vec2, Vec3};

/// Position, velocity and facing of the listener.
///
/// The game plane is XY; `heading` is the facing angle in radians measured
/// from +X towards +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerPose {
    pub position: Vec3,
    pub velocity: Vec3,
    pub heading: f32,
}

impl ListenerPose {
    pub fn new(heading: f32, position: Vec2, velocity: Vec2) -> Self {
        Self {
            position: plane(position),
            velocity: plane(velocity),
            heading,
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.heading.cos(), self.heading.sin(), 0.0)
    }

    /// The plane is viewed from above, so up is +Z.
    pub fn up(&self) -> Vec3 {
        Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up())
    }
}

impl Default for ListenerPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            heading: 0.0,
        }
    }
}

/// Lifts a game-plane coordinate into 3D.
pub fn plane(v: Vec2) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0)
}
