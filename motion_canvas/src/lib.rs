// THEORY:
// This file is the main entry point for the `motion_canvas` library crate.
//
// The public face of the engine is the `PatternPipeline` together with the
// `EngineConfig` that tunes it and the `SensorDevice` trait that frontends implement
// to plug in real hardware. The stages underneath (`core_modules`) stay public so
// frontends and tests can drive a single stage, but a typical caller only needs the
// re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use crate::config::{EngineConfig, SensorMode};
pub use crate::core_modules::capture::{select_device, DepthMap, SensorDevice, SensorFrame};
pub use crate::core_modules::motion_detector::MotionSample;
pub use crate::core_modules::pattern::PatternKind;
pub use crate::error::{Error, ReadError, Result};
pub use crate::pipeline::PatternPipeline;
