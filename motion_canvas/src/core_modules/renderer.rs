// THEORY:
// The `Renderer` is a pure function of the particle population: it owns no state
// between frames beyond the output size. Every frame is drawn from scratch.
//
// Drawing order:
// 1.  Fill with the pattern's background color.
// 2.  For each particle, oldest first: a filled disc in its faded color, then (for
//     glowing patterns and large particles) a dim halo ring around it.
// 3.  When the scene is crowded, a light Gaussian blur softens the whole frame.
//
// The motion indicator is a separate overlay so callers can decide when to show it.

use crate::core_modules::motion_detector::MotionSample;
use crate::core_modules::morphology::kernel_sigma;
use crate::core_modules::particle::Particle;
use crate::core_modules::pattern::PatternProfile;
use crate::core_modules::pixel::pixel::scale;
use image::{Rgb, RgbImage};
use std::collections::VecDeque;

/// Above this many live particles the frame is blurred.
const BLUR_ABOVE: usize = 50;
const BLUR_KERNEL: u32 = 3;

/// Particles larger than this get a halo, whatever their drawn radius.
const GLOW_MIN_SIZE: f32 = 2.0;
const GLOW_GAP: i32 = 2;
const GLOW_THICKNESS: i32 = 2;
const GLOW_STRENGTH: f32 = 0.3;

const INDICATOR_RADIUS: i32 = 20;
const INDICATOR_THICKNESS: i32 = 3;

pub struct Renderer {
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draws one frame of `particles` in the style of `profile`.
    pub fn render(&self, particles: &VecDeque<Particle>, profile: &PatternProfile) -> RgbImage {
        let mut frame = RgbImage::from_pixel(self.width, self.height, profile.background);

        for particle in particles {
            let center = (
                particle.position[0].round() as i32,
                particle.position[1].round() as i32,
            );
            if !self.contains(center) {
                continue;
            }

            let radius = (particle.size.round() as i32).max(1);
            let color = scale(particle.color, particle.fade());
            draw_disc(&mut frame, center, radius, color);

            if profile.glow && particle.size > GLOW_MIN_SIZE {
                draw_ring(
                    &mut frame,
                    center,
                    radius + GLOW_GAP,
                    GLOW_THICKNESS,
                    scale(color, GLOW_STRENGTH),
                );
            }
        }

        if particles.len() > BLUR_ABOVE {
            frame = image::imageops::blur(&frame, kernel_sigma(BLUR_KERNEL));
        }
        frame
    }

    fn contains(&self, (x, y): (i32, i32)) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

/// Green ring at the motion center, brighter for stronger motion.
pub fn draw_motion_indicator(frame: &mut RgbImage, sample: &MotionSample) {
    let green = (255.0 * sample.intensity).clamp(0.0, 255.0) as u8;
    draw_ring(
        frame,
        sample.center,
        INDICATOR_RADIUS,
        INDICATOR_THICKNESS,
        Rgb([0, green, 0]),
    );
}

/// Filled disc, clipped to the frame.
pub fn draw_disc(frame: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let limit = (radius * radius) as i64;
    paint_where(frame, center, radius, color, |distance_sq| distance_sq <= limit);
}

/// Ring whose stroke of `thickness` pixels is centered on `radius`, clipped to the frame.
pub fn draw_ring(
    frame: &mut RgbImage,
    center: (i32, i32),
    radius: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    let half = thickness as f32 / 2.0;
    let inner = (radius as f32 - half).max(0.0);
    let outer = radius as f32 + half;
    let (inner_sq, outer_sq) = ((inner * inner) as f64, (outer * outer) as f64);
    paint_where(frame, center, outer.ceil() as i32, color, |distance_sq| {
        let distance_sq = distance_sq as f64;
        distance_sq >= inner_sq && distance_sq <= outer_sq
    });
}

fn paint_where<F>(frame: &mut RgbImage, center: (i32, i32), extent: i32, color: Rgb<u8>, inside: F)
where
    F: Fn(i64) -> bool,
{
    let (width, height) = (frame.width() as i32, frame.height() as i32);
    let (cx, cy) = center;

    for y in (cy - extent).max(0)..=(cy + extent).min(height - 1) {
        for x in (cx - extent).max(0)..=(cx + extent).min(width - 1) {
            let (dx, dy) = ((x - cx) as i64, (y - cy) as i64);
            if inside(dx * dx + dy * dy) {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core_modules::pattern::PatternKind;

    fn profile(kind: PatternKind) -> PatternProfile {
        PatternProfile::new(kind, &EngineConfig::default())
    }

    fn particle(x: f32, y: f32, size: f32, life: f32) -> Particle {
        Particle {
            position: [x, y],
            velocity: [0.0, 0.0],
            life,
            initial_life: 1.0,
            size,
            color: Rgb([200, 100, 40]),
            pattern: PatternKind::Rainbow,
        }
    }

    fn population(particles: Vec<Particle>) -> VecDeque<Particle> {
        particles.into()
    }

    #[test]
    fn empty_scene_is_the_background() {
        let renderer = Renderer::new(80, 60);
        let frame = renderer.render(&VecDeque::new(), &profile(PatternKind::Fire));
        assert_eq!(frame.dimensions(), (80, 60));
        assert!(frame.pixels().all(|p| *p == Rgb([10, 0, 0])));

        let frame = renderer.render(&VecDeque::new(), &profile(PatternKind::Water));
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn particles_are_faded_discs_at_their_rounded_position() {
        let renderer = Renderer::new(80, 60);
        let scene = population(vec![particle(39.6, 20.4, 3.0, 0.5)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Rainbow));

        assert_eq!(*frame.get_pixel(40, 20), Rgb([100, 50, 20]));
        assert_eq!(*frame.get_pixel(43, 20), Rgb([100, 50, 20]));
        assert_eq!(*frame.get_pixel(44, 20), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(43, 22), Rgb([0, 0, 0]));
    }

    #[test]
    fn tiny_particles_still_cover_a_pixel() {
        let renderer = Renderer::new(20, 20);
        let scene = population(vec![particle(10.0, 10.0, 0.6, 1.0)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Water));
        assert_eq!(*frame.get_pixel(10, 10), Rgb([200, 100, 40]));
        assert_eq!(*frame.get_pixel(11, 10), Rgb([200, 100, 40]));
        assert_eq!(*frame.get_pixel(11, 11), Rgb([0, 0, 0]));
    }

    #[test]
    fn off_frame_particles_are_skipped() {
        let renderer = Renderer::new(40, 40);
        let scene = population(vec![particle(-1.0, 10.0, 6.0, 1.0), particle(10.0, 40.0, 6.0, 1.0)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Rainbow));
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn edge_particles_are_clipped() {
        let renderer = Renderer::new(40, 40);
        let scene = population(vec![particle(0.0, 0.0, 5.0, 1.0)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Rainbow));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([200, 100, 40]));
        assert_eq!(*frame.get_pixel(3, 3), Rgb([200, 100, 40]));
    }

    #[test]
    fn glowing_patterns_add_a_dim_halo() {
        let renderer = Renderer::new(60, 60);
        let scene = population(vec![particle(30.0, 30.0, 4.0, 1.0)]);

        let stars = renderer.render(&scene, &profile(PatternKind::Stars));
        assert_eq!(*stars.get_pixel(36, 30), Rgb([60, 30, 12]));
        assert_eq!(*stars.get_pixel(34, 30), Rgb([200, 100, 40]));
        assert_eq!(*stars.get_pixel(38, 30), Rgb([0, 0, 0]));

        let water = renderer.render(&scene, &profile(PatternKind::Water));
        assert_eq!(*water.get_pixel(36, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn small_particles_do_not_glow() {
        let renderer = Renderer::new(60, 60);
        let scene = population(vec![particle(30.0, 30.0, 2.0, 1.0)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Stars));
        assert_eq!(*frame.get_pixel(34, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn glow_follows_particle_size_not_drawn_radius() {
        let renderer = Renderer::new(60, 60);
        // Drawn with radius 2, but still larger than the glow cutoff.
        let scene = population(vec![particle(30.0, 30.0, 2.3, 1.0)]);
        let frame = renderer.render(&scene, &profile(PatternKind::Fire));
        assert_eq!(*frame.get_pixel(32, 30), Rgb([200, 100, 40]));
        assert_eq!(*frame.get_pixel(34, 30), Rgb([60, 30, 12]));
    }

    #[test]
    fn crowded_scenes_are_blurred() {
        let renderer = Renderer::new(60, 60);
        let rainbow = profile(PatternKind::Rainbow);

        let sparse = population(vec![particle(30.0, 30.0, 3.0, 1.0); 50]);
        assert_eq!(*renderer.render(&sparse, &rainbow).get_pixel(34, 30), Rgb([0, 0, 0]));

        let crowded = population(vec![particle(30.0, 30.0, 3.0, 1.0); 51]);
        let frame = renderer.render(&crowded, &rainbow);
        assert!(frame.get_pixel(34, 30).0[0] > 0);
        assert!(frame.get_pixel(33, 30).0[0] < 200);
    }

    #[test]
    fn indicator_is_a_green_ring_scaled_by_intensity() {
        let mut frame = RgbImage::new(100, 100);
        draw_motion_indicator(&mut frame, &MotionSample::new((50, 50), 0.5));

        assert_eq!(*frame.get_pixel(70, 50), Rgb([0, 127, 0]));
        assert_eq!(*frame.get_pixel(50, 31), Rgb([0, 127, 0]));
        assert_eq!(*frame.get_pixel(50, 50), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(73, 50), Rgb([0, 0, 0]));
    }
}
