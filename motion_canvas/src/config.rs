// THEORY:
// The `config` module holds the single value object that tunes the whole engine.
// It is built once at startup (defaults, optionally overlaid by a TOML file) and
// handed by reference to every component constructor. Nothing reads global state.
//
// Every field has a default matching the reference tuning, so a partial TOML file
// only overrides what it names.

use crate::core_modules::pattern::PatternKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Which device backend feeds the motion detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorMode {
    /// Color camera, motion found by background differencing.
    #[default]
    Camera,
    /// Depth sensor, motion found by a near-distance threshold.
    DepthSensor,
}

impl SensorMode {
    pub fn name(&self) -> &'static str {
        match self {
            SensorMode::Camera => "camera",
            SensorMode::DepthSensor => "depth-sensor",
        }
    }
}

impl fmt::Display for SensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camera" | "webcam" => Ok(SensorMode::Camera),
            "depth-sensor" | "depth" | "kinect" => Ok(SensorMode::DepthSensor),
            other => Err(Error::Config(format!("unknown sensor mode `{other}`"))),
        }
    }
}

/// Configuration for the whole engine, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Output ---
    pub output_width: u32,
    pub output_height: u32,
    pub target_fps: u32,

    // --- Sensor ---
    pub sensor_mode: SensorMode,
    pub camera_index: i32,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Upper bound on a single device read. A slower read counts as "no motion".
    pub read_timeout_ms: u64,

    // --- Camera (background difference) path ---
    /// Per-pixel difference above which a pixel is considered moving.
    pub motion_threshold: u8,
    pub background_learning_rate: f32,
    /// Gaussian kernel size applied before differencing. Must be odd.
    pub blur_kernel_size: u32,
    pub dilate_iterations: u32,
    pub camera_area_normalizer: f32,
    pub camera_decay_factor: f32,

    // --- Depth path ---
    /// Objects strictly closer than this (and farther than zero) count as motion.
    pub near_threshold_mm: u16,
    /// Side of the square element used to open the depth mask.
    pub depth_open_kernel: u32,
    pub depth_area_normalizer: f32,
    pub depth_decay_factor: f32,

    // --- Shared detection ---
    /// Contours with an area at or below this are ignored.
    pub min_contour_area: f32,

    // --- Particles ---
    pub max_particles: usize,
    pub particle_life_decay: f32,
    pub particle_size_decay: f32,
    /// Intensity below which `spawn` adds nothing.
    pub spawn_threshold: f32,
    /// Intensity above which the pipeline spawns and draws the motion ring.
    pub indicator_threshold: f32,
    pub patterns: Vec<String>,
    /// Fixed seed for reproducible particle spawns. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_width: 800,
            output_height: 600,
            target_fps: 30,
            sensor_mode: SensorMode::Camera,
            camera_index: 0,
            capture_width: 640,
            capture_height: 480,
            read_timeout_ms: 200,
            motion_threshold: 25,
            background_learning_rate: 0.05,
            blur_kernel_size: 21,
            dilate_iterations: 2,
            camera_area_normalizer: 20_000.0,
            camera_decay_factor: 0.95,
            near_threshold_mm: 1000,
            depth_open_kernel: 5,
            depth_area_normalizer: 50_000.0,
            depth_decay_factor: 0.9,
            min_contour_area: 500.0,
            max_particles: 150,
            particle_life_decay: 0.02,
            particle_size_decay: 0.995,
            spawn_threshold: 0.1,
            indicator_threshold: 0.05,
            patterns: ["fire", "water", "rainbow", "stars"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document on top of the defaults and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(Error::Config("output resolution must be non-zero".into()));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(Error::Config("capture resolution must be non-zero".into()));
        }
        if self.target_fps == 0 {
            return Err(Error::Config("target_fps must be at least 1".into()));
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(Error::Config(format!(
                "blur_kernel_size must be odd, got {}",
                self.blur_kernel_size
            )));
        }
        if self.depth_open_kernel == 0 {
            return Err(Error::Config("depth_open_kernel must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.background_learning_rate) {
            return Err(Error::Config("background_learning_rate must be in [0, 1]".into()));
        }
        for (name, factor) in [
            ("camera_decay_factor", self.camera_decay_factor),
            ("depth_decay_factor", self.depth_decay_factor),
            ("particle_size_decay", self.particle_size_decay),
        ] {
            if !(0.0..1.0).contains(&factor) {
                return Err(Error::Config(format!("{name} must be in [0, 1), got {factor}")));
            }
        }
        if self.particle_life_decay <= 0.0 {
            return Err(Error::Config("particle_life_decay must be positive".into()));
        }
        if self.camera_area_normalizer <= 0.0 || self.depth_area_normalizer <= 0.0 {
            return Err(Error::Config("area normalizers must be positive".into()));
        }
        if self.max_particles == 0 {
            return Err(Error::Config("max_particles must be at least 1".into()));
        }
        for (name, value) in [
            ("spawn_threshold", self.spawn_threshold),
            ("indicator_threshold", self.indicator_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        if self.min_contour_area < 0.0 {
            return Err(Error::Config(format!(
                "min_contour_area must not be negative, got {}",
                self.min_contour_area
            )));
        }
        self.pattern_kinds().map(|_| ())
    }

    /// Resolves the configured pattern names, in cycling order.
    pub fn pattern_kinds(&self) -> Result<Vec<PatternKind>> {
        if self.patterns.is_empty() {
            return Err(Error::Config("at least one pattern is required".into()));
        }
        self.patterns.iter().map(|name| name.parse()).collect()
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    pub fn decay_factor(&self, mode: SensorMode) -> f32 {
        match mode {
            SensorMode::Camera => self.camera_decay_factor,
            SensorMode::DepthSensor => self.depth_decay_factor,
        }
    }

    pub fn area_normalizer(&self, mode: SensorMode) -> f32 {
        match mode {
            SensorMode::Camera => self.camera_area_normalizer,
            SensorMode::DepthSensor => self.depth_area_normalizer,
        }
    }
}
