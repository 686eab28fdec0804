// THEORY:
// The `MotionDetector` turns a noisy, sometimes-silent sensor into a steady signal.
// It owns one device (through a `CaptureWorker`) and the `MotionSource` that matches
// it, and publishes one `MotionSample` per tick.
//
// Key architectural principles:
// 1.  **Graceful Fade**: Any tick without a usable detection (no contour, too small,
//     degenerate, read failure, read timeout) multiplies the intensity by a per-mode
//     decay factor instead of zeroing it. A subject stepping briefly out of view
//     fades the effect instead of cutting it.
// 2.  **Sticky Center**: The center only moves when something is detected, so a fading
//     effect stays where the motion was last seen.
// 3.  **Fatal Only at Startup**: `start` fails loudly when the device cannot be
//     opened. After that, nothing in `update` can fail; errors become fading.

use crate::config::{EngineConfig, SensorMode};
use crate::core_modules::capture::{CaptureWorker, SensorDevice, SensorFrame};
use crate::core_modules::motion_source::{locate_motion, motion_source_for, Miss, MotionSource};
use crate::error::{Error, ReadError, Result};
use std::time::Duration;

/// The detector's per-tick output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Motion position in output-frame pixels.
    pub center: (i32, i32),
    /// Normalized motion strength, always within `[0, 1]`.
    pub intensity: f32,
}

impl MotionSample {
    pub fn new(center: (i32, i32), intensity: f32) -> Self {
        Self {
            center,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    /// The same position with intensity scaled by `factor`.
    pub fn decayed(&self, factor: f32) -> Self {
        Self::new(self.center, self.intensity * factor)
    }
}

pub struct MotionDetector {
    mode: SensorMode,
    device: Option<Box<dyn SensorDevice>>,
    worker: Option<CaptureWorker>,
    source: Box<dyn MotionSource>,
    sample: MotionSample,
    output: (u32, u32),
    min_contour_area: f32,
    area_normalizer: f32,
    decay_factor: f32,
    read_timeout: Duration,
}

impl MotionDetector {
    /// Builds a detector around an already selected device.
    pub fn new(device: Box<dyn SensorDevice>, config: &EngineConfig) -> Self {
        let mode = device.mode();
        Self {
            mode,
            device: Some(device),
            worker: None,
            source: motion_source_for(mode, config),
            sample: MotionSample::new(
                (config.output_width as i32 / 2, config.output_height as i32 / 2),
                0.0,
            ),
            output: (config.output_width, config.output_height),
            min_contour_area: config.min_contour_area,
            area_normalizer: config.area_normalizer(mode),
            decay_factor: config.decay_factor(mode),
            read_timeout: config.read_timeout(),
        }
    }

    /// Opens the device on its capture worker.
    pub async fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyStarted);
        }
        let device = self
            .device
            .take()
            .ok_or_else(|| Error::DeviceUnavailable("device was already released".into()))?;

        self.worker = Some(CaptureWorker::spawn(device).await?);
        log::info!("Motion detection started in {} mode", self.mode);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Runs one bounded read and segmentation pass.
    pub async fn update(&mut self) -> MotionSample {
        let Some(worker) = self.worker.as_ref() else {
            return self.sample;
        };

        let read = worker.read(self.read_timeout).await;
        match read {
            Ok(frame) => self.process_frame(&frame),
            Err(e) => self.absorb_read_failure(e),
        }
    }

    /// Segments a frame that was obtained outside the capture worker.
    pub fn process_frame(&mut self, frame: &SensorFrame) -> MotionSample {
        let mask = match self.source.segment(frame) {
            Ok(Some(mask)) => mask,
            Ok(None) => return self.fade(),
            Err(e) => return self.absorb_read_failure(e),
        };

        match locate_motion(&mask, self.min_contour_area, self.output) {
            Ok(detection) => {
                let intensity = (detection.area / self.area_normalizer as f64).min(1.0) as f32;
                self.sample = MotionSample::new(detection.center, intensity);
            }
            Err(Miss::NoContour) => {
                self.fade();
            }
            Err(Miss::TooSmall(area)) => {
                log::trace!("Largest contour too small ({area:.0} px)");
                self.fade();
            }
            Err(Miss::Degenerate) => {
                log::debug!("Largest contour is degenerate, treating as no motion");
                self.fade();
            }
        }
        self.sample
    }

    fn absorb_read_failure(&mut self, error: ReadError) -> MotionSample {
        match error {
            ReadError::Timeout => log::debug!("{} read timed out", self.mode),
            other => log::warn!("{} read failed: {other}", self.mode),
        }
        self.fade()
    }

    fn fade(&mut self) -> MotionSample {
        self.sample = self.sample.decayed(self.decay_factor);
        self.sample
    }

    /// Releases the device. Calling it again does nothing.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown(self.read_timeout.max(Duration::from_millis(500))).await;
            log::info!("Motion detection stopped");
        }
        if let Some(mut device) = self.device.take() {
            device.release();
        }
    }

    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    pub fn sample(&self) -> MotionSample {
        self.sample
    }

    pub fn intensity(&self) -> f32 {
        self.sample.intensity
    }

    pub fn center(&self) -> (i32, i32) {
        self.sample.center
    }

    pub fn decay_factor(&self) -> f32 {
        self.decay_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::capture::testing::{ScriptedDevice, Step};
    use crate::core_modules::capture::DepthMap;
    use assert_approx_eq::assert_approx_eq;
    use image::{Luma, Rgb, RgbImage};
    use std::sync::atomic::Ordering;

    /// A depth frame whose near block covers `side`² pixels centered on the sensor.
    fn depth_with_block(side: u32) -> SensorFrame {
        let (x0, y0) = (320 - side / 2, 240 - side / 2);
        SensorFrame::Depth(DepthMap::from_fn(640, 480, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Luma([700])
            } else {
                Luma([0])
            }
        }))
    }

    fn empty_depth() -> SensorFrame {
        SensorFrame::Depth(DepthMap::new(640, 480))
    }

    fn depth_detector(script: Vec<Step>) -> MotionDetector {
        let device = ScriptedDevice::new(SensorMode::DepthSensor, script);
        MotionDetector::new(Box::new(device), &EngineConfig::default())
    }

    #[test]
    fn starts_centered_and_still() {
        let detector = depth_detector(Vec::new());
        assert_eq!(detector.center(), (400, 300));
        assert_eq!(detector.intensity(), 0.0);
        assert!(!detector.is_running());
    }

    #[test]
    fn detection_sets_center_and_normalized_intensity() {
        let mut detector = depth_detector(Vec::new());
        let sample = detector.process_frame(&depth_with_block(101));
        assert_eq!(sample.center, (400, 300));
        assert_approx_eq!(sample.intensity, 10_000.0 / 50_000.0, 1e-6);
    }

    #[test]
    fn intensity_saturates_at_one() {
        let mut detector = depth_detector(Vec::new());
        let sample = detector.process_frame(&depth_with_block(401));
        assert_eq!(sample.intensity, 1.0);
    }

    #[test]
    fn missing_motion_decays_geometrically() {
        let mut detector = depth_detector(Vec::new());
        let start = detector.process_frame(&depth_with_block(401)).intensity;

        let mut expected = start;
        for _ in 0..50 {
            let sample = detector.process_frame(&empty_depth());
            expected *= 0.9;
            assert_approx_eq!(sample.intensity, expected, 1e-6);
            assert!(sample.intensity >= 0.0);
            assert_eq!(sample.center, (400, 300));
        }
    }

    #[test]
    fn camera_mode_uses_its_own_decay() {
        let device = ScriptedDevice::new(SensorMode::Camera, Vec::new());
        let detector = MotionDetector::new(Box::new(device), &EngineConfig::default());
        assert_eq!(detector.decay_factor(), 0.95);
    }

    #[test]
    fn camera_misses_fade_by_the_camera_factor() {
        let device = ScriptedDevice::new(SensorMode::Camera, Vec::new());
        let mut detector = MotionDetector::new(Box::new(device), &EngineConfig::default());
        let dark = SensorFrame::Color(RgbImage::from_pixel(320, 240, Rgb([20, 20, 20])));
        let lit = SensorFrame::Color(RgbImage::from_fn(320, 240, |x, y| {
            if (120..200).contains(&x) && (80..160).contains(&y) {
                Rgb([250, 250, 250])
            } else {
                Rgb([20, 20, 20])
            }
        }));

        assert_eq!(detector.process_frame(&dark).intensity, 0.0);
        let hit = detector.process_frame(&lit);
        assert!(hit.intensity > 0.0);

        // The background only absorbed a twentieth of the square, which stays under
        // the motion threshold, so every dark frame is a miss.
        let mut previous = hit;
        for _ in 0..10 {
            let sample = detector.process_frame(&dark);
            assert_approx_eq!(sample.intensity, previous.intensity * 0.95, 1e-6);
            assert_eq!(sample.center, hit.center);
            previous = sample;
        }
        assert!(previous.intensity < hit.intensity * 0.6);
    }

    #[test]
    fn wrong_frame_kind_is_absorbed() {
        let mut detector = depth_detector(Vec::new());
        detector.process_frame(&depth_with_block(401));
        let sample = detector.process_frame(&SensorFrame::Color(image::RgbImage::new(8, 8)));
        assert_approx_eq!(sample.intensity, 0.9, 1e-6);
    }

    #[tokio::test]
    async fn update_reads_through_the_worker() {
        let mut detector = depth_detector(vec![
            Step::Frame(depth_with_block(101)),
            Step::Fail,
            Step::Frame(empty_depth()),
        ]);
        detector.start().await.unwrap();
        assert!(detector.is_running());

        let first = detector.update().await;
        assert_approx_eq!(first.intensity, 0.2, 1e-6);
        let second = detector.update().await;
        assert_approx_eq!(second.intensity, 0.18, 1e-6);
        let third = detector.update().await;
        assert_approx_eq!(third.intensity, 0.162, 1e-6);

        detector.stop().await;
    }

    #[tokio::test]
    async fn stalled_device_fades_instead_of_blocking() {
        let mut config = EngineConfig::default();
        config.read_timeout_ms = 20;
        let device = ScriptedDevice::new(
            SensorMode::DepthSensor,
            vec![
                Step::Frame(depth_with_block(401)),
                Step::Stall(Duration::from_millis(250)),
            ],
        );
        let mut detector = MotionDetector::new(Box::new(device), &config);
        detector.start().await.unwrap();

        assert_eq!(detector.update().await.intensity, 1.0);
        let faded = detector.update().await;
        assert_approx_eq!(faded.intensity, 0.9, 1e-6);

        detector.stop().await;
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_stop_is_idempotent() {
        let device = ScriptedDevice::new(SensorMode::Camera, Vec::new());
        let releases = device.releases.clone();
        let mut detector = MotionDetector::new(Box::new(device), &EngineConfig::default());

        detector.start().await.unwrap();
        assert!(matches!(detector.start().await, Err(Error::AlreadyStarted)));

        detector.stop().await;
        detector.stop().await;
        assert!(!detector.is_running());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(matches!(detector.start().await, Err(Error::DeviceUnavailable(_))));
    }

    #[tokio::test]
    async fn open_failure_fails_start() {
        let mut device = ScriptedDevice::new(SensorMode::Camera, Vec::new());
        device.fail_open = true;
        let mut detector = MotionDetector::new(Box::new(device), &EngineConfig::default());
        assert!(detector.start().await.is_err());
        assert!(!detector.is_running());
    }

    #[tokio::test]
    async fn update_before_start_changes_nothing() {
        let mut detector = depth_detector(Vec::new());
        let sample = detector.update().await;
        assert_eq!(sample, MotionSample::new((400, 300), 0.0));
    }
}
