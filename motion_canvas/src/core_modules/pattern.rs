// THEORY:
// A `PatternProfile` is the full rulebook for one visual theme. It is static data
// plus pure functions; it holds no particles and no state between ticks.
//
// Each profile answers four questions:
// 1.  **Spawn velocity**: how fast new particles leave the motion center.
// 2.  **Color**: what a new particle looks like, given the motion intensity. Some
//     rules draw on the injected random source, so a seeded generator gives
//     reproducible colors.
// 3.  **Force**: how velocity changes each tick (rising fire, falling and bouncing
//     water, settling stars, free-drifting rainbow).
// 4.  **Decay**: how fast life and size shrink, shared by every particle of the theme.
//
// Presentation hints used by the renderer (background tint, glow ring) live here
// too, so adding a theme means adding one profile and nothing else.

use crate::config::EngineConfig;
use crate::core_modules::pixel::pixel::hsv_to_rgb;
use crate::error::Error;
use image::Rgb;
use rand::Rng;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// The themes the engine can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Fire,
    Water,
    Rainbow,
    Stars,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Fire,
        PatternKind::Water,
        PatternKind::Rainbow,
        PatternKind::Stars,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Fire => "fire",
            PatternKind::Water => "water",
            PatternKind::Rainbow => "rainbow",
            PatternKind::Stars => "stars",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatternKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPattern(s.to_string()))
    }
}

/// Per-tick change to a particle's velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceRule {
    /// Constant upward pull with horizontal friction.
    Rise { lift: f32, friction: f32 },
    /// Constant downward pull; below `floor_y` the vertical velocity flips and damps.
    Gravity { pull: f32, floor_y: f32, bounce: f32 },
    /// Both components shrink by `damping` each tick.
    Settle { damping: f32 },
    /// No force at all.
    Drift,
}

impl ForceRule {
    /// Applies the rule to `velocity`, given the particle's already-moved position.
    pub fn apply(&self, position: [f32; 2], velocity: &mut [f32; 2]) {
        match *self {
            ForceRule::Rise { lift, friction } => {
                velocity[1] -= lift;
                velocity[0] *= friction;
            }
            ForceRule::Gravity {
                pull,
                floor_y,
                bounce,
            } => {
                velocity[1] += pull;
                if position[1] > floor_y {
                    velocity[1] *= bounce;
                }
            }
            ForceRule::Settle { damping } => {
                velocity[0] *= damping;
                velocity[1] *= damping;
            }
            ForceRule::Drift => {}
        }
    }
}

/// The rulebook for one pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternProfile {
    pub kind: PatternKind,
    /// Spawn velocity is uniform in `±spawn_speed` per axis, scaled by intensity.
    pub spawn_speed: f32,
    /// Spawn size range, scaled by intensity.
    pub spawn_size: Range<f32>,
    pub force: ForceRule,
    pub life_decay: f32,
    pub size_decay: f32,
    /// Whether large particles get a dim halo ring.
    pub glow: bool,
    /// Frame color before any particle is drawn.
    pub background: Rgb<u8>,
}

impl PatternProfile {
    pub fn new(kind: PatternKind, config: &EngineConfig) -> Self {
        let force = match kind {
            PatternKind::Fire => ForceRule::Rise {
                lift: 0.2,
                friction: 0.98,
            },
            PatternKind::Water => ForceRule::Gravity {
                pull: 0.15,
                floor_y: config.output_height as f32 - 50.0,
                bounce: -0.3,
            },
            PatternKind::Rainbow => ForceRule::Drift,
            PatternKind::Stars => ForceRule::Settle { damping: 0.95 },
        };

        Self {
            kind,
            spawn_speed: 3.0,
            spawn_size: 2.0..8.0,
            force,
            life_decay: config.particle_life_decay,
            size_decay: config.particle_size_decay,
            glow: matches!(kind, PatternKind::Fire | PatternKind::Stars),
            background: match kind {
                PatternKind::Fire => Rgb([10, 0, 0]),
                _ => Rgb([0, 0, 0]),
            },
        }
    }

    /// Profiles for the configured pattern cycle.
    pub fn cycle(config: &EngineConfig) -> crate::error::Result<Vec<PatternProfile>> {
        Ok(config
            .pattern_kinds()?
            .into_iter()
            .map(|kind| PatternProfile::new(kind, config))
            .collect())
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn spawn_velocity<R: Rng + ?Sized>(&self, rng: &mut R, intensity: f32) -> [f32; 2] {
        let speed = self.spawn_speed;
        [
            rng.gen_range(-speed..speed) * intensity,
            rng.gen_range(-speed..speed) * intensity,
        ]
    }

    pub fn spawn_size<R: Rng + ?Sized>(&self, rng: &mut R, intensity: f32) -> f32 {
        rng.gen_range(self.spawn_size.clone()) * intensity
    }

    /// Color for a new particle. Brightness always scales with `intensity`.
    pub fn spawn_color<R: Rng + ?Sized>(&self, rng: &mut R, intensity: f32) -> Rgb<u8> {
        let channel = |value: f32| value.clamp(0.0, 255.0) as u8;
        match self.kind {
            PatternKind::Fire => Rgb([
                channel(255.0 * intensity),
                channel(150.0 * intensity * rng.gen_range(0.3f32..0.8)),
                channel(50.0 * intensity * rng.gen_range(0.0f32..0.3)),
            ]),
            PatternKind::Water => Rgb([
                channel(50.0 * intensity),
                channel(150.0 * intensity * rng.gen_range(0.5f32..1.0)),
                channel(255.0 * intensity),
            ]),
            PatternKind::Rainbow => hsv_to_rgb(rng.gen_range(0.0..1.0), 0.8, intensity),
            PatternKind::Stars => {
                let value = channel(255.0 * intensity);
                Rgb([value, value, value])
            }
        }
    }
}
