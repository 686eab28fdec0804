// THEORY:
// The `ParticleSystem` owns every live particle and the cycle of pattern profiles.
// It is the only place particles are created, advanced, or destroyed.
//
// Key architectural principles:
// 1.  **Bounded Population**: Particles live in a ring preallocated to
//     `max_particles`, oldest at the front. A spawn burst that overflows the cap
//     evicts from the front, so the population never exceeds the cap and the
//     newest particles always survive.
// 2.  **Order-Preserving Expiry**: `integrate` filters in place with `retain_mut`.
//     Survivors keep their relative age order, which is what makes front eviction
//     correct.
// 3.  **Injected Randomness**: A single `StdRng` drives every random choice. With a
//     configured seed, two systems fed the same inputs produce the same particles.
// 4.  **Clean Switches**: Changing the pattern clears the population, so particles
//     of one theme are never advanced by another theme's forces.

use crate::config::EngineConfig;
use crate::core_modules::particle::Particle;
use crate::core_modules::pattern::PatternProfile;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Upper bound on particles created by a single `spawn` call.
const MAX_SPAWN_PER_CALL: usize = 15;

pub struct ParticleSystem {
    particles: VecDeque<Particle>,
    profiles: Vec<PatternProfile>,
    active: usize,
    rng: StdRng,
    max_particles: usize,
    spawn_threshold: f32,
}

impl ParticleSystem {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let profiles = PatternProfile::cycle(config)?;

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            particles: VecDeque::with_capacity(config.max_particles + MAX_SPAWN_PER_CALL),
            profiles,
            active: 0,
            rng,
            max_particles: config.max_particles,
            spawn_threshold: config.spawn_threshold,
        })
    }

    /// Emits a burst of particles around `center`. Weak motion emits nothing.
    pub fn spawn(&mut self, center: (i32, i32), intensity: f32) {
        if intensity < self.spawn_threshold {
            return;
        }

        let count = ((intensity * 10.0).floor() as usize + 1).min(MAX_SPAWN_PER_CALL);
        let profile = &self.profiles[self.active];
        for _ in 0..count {
            self.particles
                .push_back(Particle::spawn(profile, &mut self.rng, center, intensity));
        }

        while self.particles.len() > self.max_particles {
            self.particles.pop_front();
        }
    }

    /// Advances every particle one tick and drops the expired ones.
    pub fn integrate(&mut self) {
        let profile = &self.profiles[self.active];
        self.particles.retain_mut(|particle| particle.tick(profile));
    }

    /// Moves to the next pattern in the cycle and clears the population.
    pub fn change_pattern(&mut self) {
        self.active = (self.active + 1) % self.profiles.len();
        self.particles.clear();
        log::info!("Switched to {} pattern", self.current_pattern_name());
    }

    pub fn reset(&mut self) {
        self.particles.clear();
        log::debug!("Particles cleared");
    }

    pub fn current_pattern_name(&self) -> &'static str {
        self.active_profile().name()
    }

    pub fn active_profile(&self) -> &PatternProfile {
        &self.profiles[self.active]
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Live particles, oldest first.
    pub fn particles(&self) -> &VecDeque<Particle> {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pattern::PatternKind;

    fn seeded(max_particles: usize) -> ParticleSystem {
        let config = EngineConfig {
            max_particles,
            rng_seed: Some(1234),
            ..EngineConfig::default()
        };
        ParticleSystem::new(&config).unwrap()
    }

    #[test]
    fn burst_size_follows_intensity() {
        let mut system = seeded(150);
        system.spawn((400, 300), 0.5);
        assert_eq!(system.particle_count(), 6);

        system.spawn((400, 300), 1.0);
        assert_eq!(system.particle_count(), 6 + 11);
    }

    #[test]
    fn weak_motion_spawns_nothing() {
        let mut system = seeded(150);
        system.spawn((400, 300), 0.09);
        assert_eq!(system.particle_count(), 0);
    }

    #[test]
    fn population_never_exceeds_the_cap() {
        let mut system = seeded(150);
        // Each call at 0.5 adds 6 particles, so the cap is first hit on call 25.
        for call in 1..=200 {
            system.spawn((400, 300), 0.5);
            if call >= 25 {
                assert_eq!(system.particle_count(), 150, "call {call}");
            } else {
                assert_eq!(system.particle_count(), call * 6);
            }
        }
    }

    #[test]
    fn overflow_evicts_the_oldest_first() {
        let mut system = seeded(150);
        for _ in 0..30 {
            system.spawn((10, 10), 0.5);
        }
        // The final burst lands far away so its particles are easy to spot.
        system.spawn((700, 500), 0.5);

        let particles = system.particles();
        assert_eq!(particles.len(), 150);
        assert!(particles.iter().rev().take(6).all(|p| p.position[0] > 600.0));
        assert!(particles.iter().take(144).all(|p| p.position[0] < 100.0));
    }

    #[test]
    fn integrate_removes_expired_particles_and_keeps_order() {
        let mut system = seeded(150);
        system.spawn((400, 300), 0.5);
        let ages: Vec<_> = system.particles().iter().map(|p| p.color).collect();

        system.integrate();
        let after: Vec<_> = system.particles().iter().map(|p| p.color).collect();
        assert_eq!(ages, after);

        for _ in 0..60 {
            system.integrate();
        }
        assert_eq!(system.particle_count(), 0);
    }

    #[test]
    fn life_and_size_only_shrink() {
        let mut system = seeded(150);
        system.spawn((400, 300), 1.0);
        for _ in 0..40 {
            let before: Vec<_> = system.particles().iter().map(|p| (p.life, p.size)).collect();
            system.integrate();
            for (p, (life, size)) in system.particles().iter().zip(before) {
                assert!(p.life <= life);
                assert!(p.size <= size);
            }
        }
    }

    #[test]
    fn change_pattern_cycles_and_clears() {
        let mut system = seeded(150);
        assert_eq!(system.current_pattern_name(), "fire");
        system.spawn((400, 300), 0.8);

        system.change_pattern();
        assert_eq!(system.current_pattern_name(), "water");
        assert_eq!(system.particle_count(), 0);

        for _ in 0..3 {
            system.change_pattern();
        }
        assert_eq!(system.active_profile().kind, PatternKind::Fire);
    }

    #[test]
    fn reset_keeps_the_pattern() {
        let mut system = seeded(150);
        system.change_pattern();
        system.spawn((400, 300), 0.8);
        system.reset();
        assert_eq!(system.particle_count(), 0);
        assert_eq!(system.current_pattern_name(), "water");
    }

    #[test]
    fn new_particles_take_the_active_pattern() {
        let mut system = seeded(150);
        system.change_pattern();
        system.change_pattern();
        system.spawn((400, 300), 0.5);
        assert!(system.particles().iter().all(|p| p.pattern == PatternKind::Rainbow));
    }

    #[test]
    fn same_seed_same_particles() {
        let mut a = seeded(150);
        let mut b = seeded(150);
        a.spawn((100, 100), 0.7);
        b.spawn((100, 100), 0.7);
        assert_eq!(a.particles(), b.particles());
    }
}
