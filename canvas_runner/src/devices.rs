// THEORY:
// OpenCV-backed implementations of `SensorDevice`. Both run on the engine's
// blocking capture worker, so every call here may block freely.
//
// - `CameraDevice` reads BGR frames from a webcam and hands the engine RGB.
// - `DepthDevice` reads 16-bit depth maps (millimeters) through OpenCV's OpenNI2
//   backend. Probing opens the first OpenNI2 device and releases it again.

use image::RgbImage;
use motion_canvas::{DepthMap, EngineConfig, Error, ReadError, SensorDevice, SensorFrame, SensorMode};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

fn backend(e: opencv::Error) -> ReadError {
    ReadError::Backend(e.to_string())
}

fn close(capture: &mut VideoCapture, what: &str) {
    if let Err(e) = capture.release() {
        log::warn!("Failed to release {what}: {e}");
    }
}

pub struct CameraDevice {
    index: i32,
    width: u32,
    height: u32,
    capture: Option<VideoCapture>,
}

impl CameraDevice {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            index: config.camera_index,
            width: config.capture_width,
            height: config.capture_height,
            capture: None,
        }
    }
}

impl SensorDevice for CameraDevice {
    fn mode(&self) -> SensorMode {
        SensorMode::Camera
    }

    fn open(&mut self) -> motion_canvas::Result<()> {
        let unavailable = |e: opencv::Error| Error::DeviceUnavailable(format!("camera {}: {e}", self.index));

        let mut capture = VideoCapture::new(self.index, videoio::CAP_ANY).map_err(unavailable)?;
        if !capture.is_opened().map_err(unavailable)? {
            return Err(Error::DeviceUnavailable(format!(
                "camera {} could not be opened",
                self.index
            )));
        }

        capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, self.width as f64)
            .map_err(unavailable)?;
        capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, self.height as f64)
            .map_err(unavailable)?;

        log::info!("Camera {} opened at {}x{}", self.index, self.width, self.height);
        self.capture = Some(capture);
        Ok(())
    }

    fn read(&mut self) -> Result<SensorFrame, ReadError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| ReadError::Backend("camera is not open".into()))?;

        let mut bgr = Mat::default();
        if !capture.read(&mut bgr).map_err(backend)? || bgr.empty() {
            return Err(ReadError::Backend("camera returned no frame".into()));
        }

        // The engine works in RGB.
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(backend)?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb.data_bytes().map_err(backend)?.to_vec();
        RgbImage::from_raw(width, height, bytes)
            .map(SensorFrame::Color)
            .ok_or_else(|| ReadError::Backend("camera frame has an unexpected layout".into()))
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            close(&mut capture, "camera");
        }
    }
}

#[derive(Default)]
pub struct DepthDevice {
    capture: Option<VideoCapture>,
}

impl DepthDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn connect() -> opencv::Result<Option<VideoCapture>> {
        let capture = VideoCapture::new(0, videoio::CAP_OPENNI2)?;
        Ok(capture.is_opened()?.then_some(capture))
    }
}

impl SensorDevice for DepthDevice {
    fn mode(&self) -> SensorMode {
        SensorMode::DepthSensor
    }

    fn probe(&mut self) -> motion_canvas::Result<usize> {
        match Self::connect() {
            Ok(Some(mut capture)) => {
                close(&mut capture, "depth probe");
                Ok(1)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(Error::DeviceUnavailable(format!("OpenNI2 backend: {e}"))),
        }
    }

    fn open(&mut self) -> motion_canvas::Result<()> {
        let capture = Self::connect()
            .map_err(|e| Error::DeviceUnavailable(format!("OpenNI2 backend: {e}")))?
            .ok_or(Error::NoDevicesFound)?;

        log::info!("Depth sensor opened");
        self.capture = Some(capture);
        Ok(())
    }

    fn read(&mut self) -> Result<SensorFrame, ReadError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| ReadError::Backend("depth sensor is not open".into()))?;

        if !capture.grab().map_err(backend)? {
            return Err(ReadError::Backend("depth sensor returned no frame".into()));
        }
        let mut depth = Mat::default();
        if !capture
            .retrieve(&mut depth, videoio::CAP_OPENNI_DEPTH_MAP)
            .map_err(backend)?
            || depth.empty()
        {
            return Err(ReadError::Backend("depth map not available".into()));
        }
        if depth.typ() != core::CV_16UC1 {
            return Err(ReadError::UnexpectedFrame);
        }

        let (width, height) = (depth.cols() as u32, depth.rows() as u32);
        let millimeters = depth.data_typed::<u16>().map_err(backend)?.to_vec();
        DepthMap::from_raw(width, height, millimeters)
            .map(SensorFrame::Depth)
            .ok_or_else(|| ReadError::Backend("depth map has an unexpected layout".into()))
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            close(&mut capture, "depth sensor");
        }
    }
}
