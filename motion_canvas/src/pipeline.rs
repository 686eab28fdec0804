// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires one
// `MotionDetector`, one `ParticleSystem`, and one `Renderer` into a single tick:
//
//   capture → segment → spawn → integrate → render → indicator
//
// Callers drive the clock. Each `tick` awaits one bounded sensor read and returns one
// finished frame, so a frontend only needs a loop, a window, and the few commands
// exposed here (`change_pattern`, `reset`, and the read-only accessors).

use crate::config::{EngineConfig, SensorMode};
use crate::core_modules::capture::SensorDevice;
use crate::core_modules::motion_detector::{MotionDetector, MotionSample};
use crate::core_modules::particle_system::ParticleSystem;
use crate::core_modules::renderer::{draw_motion_indicator, Renderer};
use crate::error::Result;
use image::RgbImage;

/// The main, top-level struct for the particle engine.
pub struct PatternPipeline {
    detector: MotionDetector,
    particles: ParticleSystem,
    renderer: Renderer,
    indicator_threshold: f32,
}

impl PatternPipeline {
    /// Validates `config` and builds every stage around `device`.
    pub fn new(device: Box<dyn SensorDevice>, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: MotionDetector::new(device, config),
            particles: ParticleSystem::new(config)?,
            renderer: Renderer::new(config.output_width, config.output_height),
            indicator_threshold: config.indicator_threshold,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.detector.start().await
    }

    pub async fn stop(&mut self) {
        self.detector.stop().await;
    }

    /// Runs one full capture-to-frame pass.
    pub async fn tick(&mut self) -> RgbImage {
        let sample = self.detector.update().await;
        self.advance(sample)
    }

    /// Runs the particle and render stages for an already computed sample.
    pub fn advance(&mut self, sample: MotionSample) -> RgbImage {
        let visible = sample.intensity > self.indicator_threshold;
        if visible {
            self.particles.spawn(sample.center, sample.intensity);
        }
        self.particles.integrate();

        let mut frame = self
            .renderer
            .render(self.particles.particles(), self.particles.active_profile());
        if visible {
            draw_motion_indicator(&mut frame, &sample);
        }
        frame
    }

    pub fn change_pattern(&mut self) {
        self.particles.change_pattern();
    }

    pub fn reset(&mut self) {
        self.particles.reset();
    }

    pub fn current_pattern_name(&self) -> &'static str {
        self.particles.current_pattern_name()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.particle_count()
    }

    pub fn motion_intensity(&self) -> f32 {
        self.detector.intensity()
    }

    pub fn motion_center(&self) -> (i32, i32) {
        self.detector.center()
    }

    pub fn sensor_mode(&self) -> SensorMode {
        self.detector.mode()
    }

    pub fn is_running(&self) -> bool {
        self.detector.is_running()
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.renderer.dimensions()
    }
}
