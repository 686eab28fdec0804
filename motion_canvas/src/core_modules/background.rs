// THEORY:
// The `BackgroundModel` is the camera path's memory of what the scene looks like
// when nothing is moving. It is the only temporal state in motion detection.
//
// Key architectural principles:
// 1.  **Continuous Adaptation**: Every frame is blended in by an exponential moving
//     average, `bg = (1 - rate) * bg + rate * frame`. A subject that stops moving
//     slowly fades into the background; lighting drift is absorbed the same way.
// 2.  **Float Accumulator**: The running average is kept in `f32` so small learning
//     rates still move the model. Comparisons use its byte-truncated value.
// 3.  **Single Owner**: Only the `DifferenceSource` holds and mutates the model, once
//     per tick, after the frame has been compared against it.

use image::{GrayImage, Luma};

/// A smoothed grayscale reference image of the scene.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    /// Row-major running average, one value per pixel.
    accumulator: Vec<f32>,
}

impl BackgroundModel {
    /// Seeds the model with a first (already blurred) frame.
    pub fn seeded_from(frame: &GrayImage) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            accumulator: frame.pixels().map(|p| p.0[0] as f32).collect(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn matches(&self, frame: &GrayImage) -> bool {
        frame.dimensions() == self.dimensions()
    }

    /// Background value at `(x, y)` as stored, before truncation.
    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.accumulator[(y * self.width + x) as usize]
    }

    /// Per-pixel `|frame - background|`, with the background truncated to a byte.
    pub fn absolute_difference(&self, frame: &GrayImage) -> GrayImage {
        debug_assert!(self.matches(frame));
        let mut diff = GrayImage::new(self.width, self.height);
        for ((current, reference), target) in frame
            .pixels()
            .zip(self.accumulator.iter())
            .zip(diff.pixels_mut())
        {
            let reference = reference.clamp(0.0, 255.0) as u8;
            *target = Luma([current.0[0].abs_diff(reference)]);
        }
        diff
    }

    /// Blends `frame` into the model with the given learning rate.
    pub fn accumulate(&mut self, frame: &GrayImage, learning_rate: f32) {
        debug_assert!(self.matches(frame));
        let keep = 1.0 - learning_rate;
        for (value, current) in self.accumulator.iter_mut().zip(frame.pixels()) {
            *value = keep * *value + learning_rate * current.0[0] as f32;
        }
    }
}
