// THEORY:
// A `MotionSource` turns one raw sensor frame into a binary motion mask. There are
// two sources, one per sensor path, and exactly one is chosen at startup:
//
// - `DifferenceSource` (camera): gray → blur → |frame - background| → threshold →
//   dilate, then the background absorbs the current frame. The very first frame
//   only seeds the background and yields no mask.
// - `DepthSource` (depth sensor): keep pixels strictly between zero (no return) and
//   the near threshold, then open the mask to remove speckle.
//
// Both paths then share `locate_motion`: largest external contour, minimum-area gate,
// centroid from raw moments, and a linear map from mask resolution to output
// resolution. Each miss carries its reason so the detector can log it.

use crate::config::{EngineConfig, SensorMode};
use crate::core_modules::background::BackgroundModel;
use crate::core_modules::capture::SensorFrame;
use crate::core_modules::contour::{find_external_contours, largest_contour};
use crate::core_modules::morphology;
use crate::core_modules::pixel::pixel;
use crate::error::ReadError;
use image::GrayImage;

/// Structuring element side used when dilating the camera mask.
const DILATE_KERNEL: u32 = 3;

/// Segments raw frames of one sensor kind into motion masks.
pub trait MotionSource: Send {
    fn mode(&self) -> SensorMode;

    /// Returns the motion mask for `frame`, or `None` when this frame cannot be
    /// judged yet (the camera path's seeding frame).
    fn segment(&mut self, frame: &SensorFrame) -> Result<Option<GrayImage>, ReadError>;
}

/// Builds the source matching the selected device.
pub fn motion_source_for(mode: SensorMode, config: &EngineConfig) -> Box<dyn MotionSource> {
    match mode {
        SensorMode::Camera => Box::new(DifferenceSource::new(config)),
        SensorMode::DepthSensor => Box::new(DepthSource::new(config)),
    }
}

/// Camera path: background differencing.
pub struct DifferenceSource {
    blur_kernel_size: u32,
    motion_threshold: u8,
    dilate_iterations: u32,
    learning_rate: f32,
    background: Option<BackgroundModel>,
}

impl DifferenceSource {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            blur_kernel_size: config.blur_kernel_size,
            motion_threshold: config.motion_threshold,
            dilate_iterations: config.dilate_iterations,
            learning_rate: config.background_learning_rate,
            background: None,
        }
    }

    pub fn background(&self) -> Option<&BackgroundModel> {
        self.background.as_ref()
    }
}

impl MotionSource for DifferenceSource {
    fn mode(&self) -> SensorMode {
        SensorMode::Camera
    }

    fn segment(&mut self, frame: &SensorFrame) -> Result<Option<GrayImage>, ReadError> {
        let SensorFrame::Color(color) = frame else {
            return Err(ReadError::UnexpectedFrame);
        };

        let gray = morphology::gaussian_blur(&pixel::to_luma(color), self.blur_kernel_size);

        let background = match self.background.as_mut() {
            Some(background) if background.matches(&gray) => background,
            _ => {
                log::debug!(
                    "Seeding background model at {}x{}",
                    gray.width(),
                    gray.height()
                );
                self.background = Some(BackgroundModel::seeded_from(&gray));
                return Ok(None);
            }
        };

        let diff = background.absolute_difference(&gray);
        let mask = morphology::threshold(&diff, self.motion_threshold);
        let mask = morphology::dilate(&mask, DILATE_KERNEL, self.dilate_iterations);

        background.accumulate(&gray, self.learning_rate);
        Ok(Some(mask))
    }
}

/// Depth path: near-object threshold.
pub struct DepthSource {
    near_threshold_mm: u16,
    open_kernel: u32,
}

impl DepthSource {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            near_threshold_mm: config.near_threshold_mm,
            open_kernel: config.depth_open_kernel,
        }
    }
}

impl MotionSource for DepthSource {
    fn mode(&self) -> SensorMode {
        SensorMode::DepthSensor
    }

    fn segment(&mut self, frame: &SensorFrame) -> Result<Option<GrayImage>, ReadError> {
        let SensorFrame::Depth(depth) = frame else {
            return Err(ReadError::UnexpectedFrame);
        };

        let near = self.near_threshold_mm;
        let mask = morphology::mask_where(depth.width(), depth.height(), |x, y| {
            let distance = depth.get_pixel(x, y).0[0];
            distance > 0 && distance < near
        });
        Ok(Some(morphology::open(&mask, self.open_kernel)))
    }
}

/// The dominant motion region, in output-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub center: (i32, i32),
    pub area: f64,
}

/// Why a mask produced no usable detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Miss {
    NoContour,
    TooSmall(f64),
    /// The largest contour encloses no area, so it has no centroid.
    Degenerate,
}

/// Finds the largest region of `mask` and maps its centroid to `output` size.
pub fn locate_motion(
    mask: &GrayImage,
    min_contour_area: f32,
    output: (u32, u32),
) -> Result<Detection, Miss> {
    let contours = find_external_contours(mask);
    let (largest, area) = largest_contour(&contours).ok_or(Miss::NoContour)?;

    if area <= min_contour_area as f64 {
        return Err(Miss::TooSmall(area));
    }

    let (cx, cy) = largest.moments().centroid().ok_or(Miss::Degenerate)?;
    let (cx, cy) = (cx as i64, cy as i64);

    let (mask_width, mask_height) = mask.dimensions();
    let center = (
        (cx * output.0 as i64 / mask_width.max(1) as i64) as i32,
        (cy * output.1 as i64 / mask_height.max(1) as i64) as i32,
    );
    Ok(Detection { center, area })
}
