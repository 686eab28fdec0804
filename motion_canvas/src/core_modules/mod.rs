pub mod background;
pub mod capture;
pub mod contour;
pub mod morphology;
pub mod motion_detector;
pub mod motion_source;
pub mod particle;
pub mod particle_system;
pub mod pattern;
pub mod pixel;
pub mod renderer;
