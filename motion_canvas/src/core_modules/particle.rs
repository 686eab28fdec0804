//! A single transient visual element.

use crate::core_modules::pattern::{PatternKind, PatternProfile};
use image::Rgb;
use rand::Rng;

/// Spawn offset around the motion center, per axis, at full intensity.
const SPAWN_SPREAD: f32 = 20.0;

/// A single particle with physics and rendering state.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    /// Remaining life, starting at `initial_life` and only ever decreasing.
    pub life: f32,
    pub initial_life: f32,
    /// Radius in pixels, shrinking geometrically.
    pub size: f32,
    /// Fixed at spawn.
    pub color: Rgb<u8>,
    /// Fixed at spawn.
    pub pattern: PatternKind,
}

impl Particle {
    pub const INITIAL_LIFE: f32 = 1.0;
    /// Particles at or below this size are dead.
    pub const MIN_SIZE: f32 = 0.5;

    /// Creates a particle near `center` following `profile`'s spawn rules.
    pub fn spawn<R: Rng + ?Sized>(
        profile: &PatternProfile,
        rng: &mut R,
        center: (i32, i32),
        intensity: f32,
    ) -> Self {
        let spread = SPAWN_SPREAD * intensity;
        let offset = |rng: &mut R| {
            if spread > 0.0 {
                rng.gen_range(-spread..spread)
            } else {
                0.0
            }
        };
        let position = [
            center.0 as f32 + offset(&mut *rng),
            center.1 as f32 + offset(&mut *rng),
        ];

        Particle {
            position,
            velocity: profile.spawn_velocity(rng, intensity),
            life: Self::INITIAL_LIFE,
            initial_life: Self::INITIAL_LIFE,
            size: profile.spawn_size(rng, intensity),
            color: profile.spawn_color(rng, intensity),
            pattern: profile.kind,
        }
    }

    /// Advance particle physics by one tick. Returns false when expired.
    pub fn tick(&mut self, profile: &PatternProfile) -> bool {
        self.position[0] += self.velocity[0];
        self.position[1] += self.velocity[1];

        profile.force.apply(self.position, &mut self.velocity);

        self.life -= profile.life_decay;
        self.size *= profile.size_decay;

        self.is_alive()
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0 && self.size > Self::MIN_SIZE
    }

    /// Remaining fraction of life, used to fade the particle out.
    pub fn fade(&self) -> f32 {
        (self.life / self.initial_life).clamp(0.0, 1.0)
    }
}
