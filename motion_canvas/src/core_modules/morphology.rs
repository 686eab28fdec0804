// THEORY:
// Neighborhood operations on single-channel frames. These are the noise-control
// stages between a raw sensor frame and the contour tracer:
// 1.  **Blur** suppresses per-pixel sensor noise before differencing.
// 2.  **Threshold** turns a difference or depth frame into a binary mask (0 / 255).
// 3.  **Dilate / Erode / Open** merge fragments of one moving region or strip
//     isolated speckles, using a square structuring element.
//
// Square elements are separable, so each pass is a row sweep followed by a column
// sweep. Pixels outside the frame never contribute to a result.

use image::{GrayImage, Luma};

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Gaussian sigma implied by a kernel size when no sigma is given.
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub fn gaussian_blur(frame: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return frame.clone();
    }
    image::imageops::blur(frame, kernel_sigma(kernel_size))
}

/// Binary mask of pixels where `predicate` holds.
pub fn mask_where<F>(width: u32, height: u32, mut predicate: F) -> GrayImage
where
    F: FnMut(u32, u32) -> bool,
{
    GrayImage::from_fn(width, height, |x, y| {
        Luma([if predicate(x, y) { MASK_ON } else { MASK_OFF }])
    })
}

/// Pixels strictly above `threshold` become `MASK_ON`.
pub fn threshold(frame: &GrayImage, threshold: u8) -> GrayImage {
    mask_where(frame.width(), frame.height(), |x, y| {
        frame.get_pixel(x, y).0[0] > threshold
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    Dilate,
    Erode,
}

impl Sweep {
    #[inline]
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Sweep::Dilate => a.max(b),
            Sweep::Erode => a.min(b),
        }
    }
}

fn square_pass(mask: &GrayImage, kernel_size: u32, sweep: Sweep) -> GrayImage {
    let (width, height) = mask.dimensions();
    let radius = (kernel_size / 2) as i64;
    let low = -radius;
    // Even kernels anchor at their center-left element.
    let high = kernel_size as i64 - 1 - radius;

    let sweep_axis = |source: &GrayImage, horizontal: bool| -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let mut value = source.get_pixel(x, y).0[0];
            for offset in low..=high {
                let (nx, ny) = if horizontal {
                    (x as i64 + offset, y as i64)
                } else {
                    (x as i64, y as i64 + offset)
                };
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                value = sweep.pick(value, source.get_pixel(nx as u32, ny as u32).0[0]);
            }
            Luma([value])
        })
    };

    let rows = sweep_axis(mask, true);
    sweep_axis(&rows, false)
}

pub fn dilate(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let mut result = mask.clone();
    for _ in 0..iterations {
        result = square_pass(&result, kernel_size, Sweep::Dilate);
    }
    result
}

pub fn erode(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let mut result = mask.clone();
    for _ in 0..iterations {
        result = square_pass(&result, kernel_size, Sweep::Erode);
    }
    result
}

/// Erode then dilate: removes regions smaller than the element, keeps the rest.
pub fn open(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    dilate(&erode(mask, kernel_size, 1), kernel_size, 1)
}

pub fn count_on(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] != MASK_OFF).count()
}
