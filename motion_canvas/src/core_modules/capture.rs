// THEORY:
// The `capture` module is the boundary between the engine and real hardware.
//
// Key architectural principles:
// 1.  **Capability, not Inspection**: A backend is anything implementing
//     `SensorDevice` (`probe`, `open`, `read`, `release`). The detector never asks
//     which concrete backend it holds; it only looks at the declared `SensorMode`.
// 2.  **Actor Ownership**: The device is moved into a dedicated blocking worker and
//     never touched by the tick loop directly. The loop sends a `Read` message with a
//     oneshot reply channel, the same request/reply shape used for any actor here.
// 3.  **Bounded Reads**: The caller awaits the reply under a timeout. A device that
//     stalls costs one tick of "no motion", never a frozen frame. A reply that
//     arrives after its deadline is simply dropped with its channel.
// 4.  **Startup Selection**: `select_device` picks the depth backend only when it
//     exists and reports at least one connected sensor; otherwise the camera.

use crate::config::SensorMode;
use crate::error::{Error, ReadError, Result};
use image::{ImageBuffer, Luma, RgbImage};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Read requests that may queue up behind a stalled device.
const CAPTURE_QUEUE_DEPTH: usize = 2;

/// Per-pixel distances in millimeters. Zero marks an invalid reading.
pub type DepthMap = ImageBuffer<Luma<u16>, Vec<u16>>;

/// One raw frame as delivered by a backend.
#[derive(Debug, Clone)]
pub enum SensorFrame {
    /// An RGB color frame at capture resolution.
    Color(RgbImage),
    /// A depth map at sensor resolution.
    Depth(DepthMap),
}

impl SensorFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SensorFrame::Color(frame) => frame.dimensions(),
            SensorFrame::Depth(frame) => frame.dimensions(),
        }
    }
}

/// A camera or depth-sensor backend.
pub trait SensorDevice: Send + 'static {
    /// Which motion path this device feeds.
    fn mode(&self) -> SensorMode;

    /// Number of connected devices this backend can see. Called before `open`.
    fn probe(&mut self) -> Result<usize> {
        Ok(1)
    }

    /// Opens the device. Failure here is fatal to startup.
    fn open(&mut self) -> Result<()>;

    /// Grabs one frame. May block; callers bound it with a timeout.
    fn read(&mut self) -> std::result::Result<SensorFrame, ReadError>;

    /// Releases the device handle. Must tolerate being called more than once.
    fn release(&mut self);
}

/// Picks the backend for the requested mode, falling back to the camera when the
/// depth backend is missing, fails to probe, or sees no sensors.
pub fn select_device(
    requested: SensorMode,
    depth: Option<Box<dyn SensorDevice>>,
    camera: Box<dyn SensorDevice>,
) -> Box<dyn SensorDevice> {
    if requested == SensorMode::Camera {
        log::info!("Camera mode selected");
        return camera;
    }

    let Some(mut depth) = depth else {
        log::warn!("Depth backend not available, falling back to camera");
        return camera;
    };

    match depth.probe() {
        Ok(0) => {
            log::warn!("No depth sensor detected, falling back to camera");
            camera
        }
        Ok(count) => {
            log::info!("Depth sensor mode selected ({count} device(s) detected)");
            depth
        }
        Err(e) => {
            log::warn!("Depth sensor probe failed ({e}), falling back to camera");
            camera
        }
    }
}

/// Message type for the capture actor
enum CaptureMessage {
    Read(oneshot::Sender<std::result::Result<SensorFrame, ReadError>>),
    Shutdown,
}

/// Owns a `SensorDevice` on a blocking worker and serves bounded reads.
pub struct CaptureWorker {
    mode: SensorMode,
    sender: mpsc::Sender<CaptureMessage>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Moves `device` onto a blocking worker and opens it there.
    pub async fn spawn(mut device: Box<dyn SensorDevice>) -> Result<Self> {
        let mode = device.mode();
        let (sender, mut receiver) = mpsc::channel::<CaptureMessage>(CAPTURE_QUEUE_DEPTH);
        let (opened_tx, opened_rx) = oneshot::channel::<Result<()>>();

        let handle = tokio::task::spawn_blocking(move || {
            let opened = device.open();
            let is_open = opened.is_ok();
            let _ = opened_tx.send(opened);
            if !is_open {
                return;
            }

            while let Some(message) = receiver.blocking_recv() {
                match message {
                    CaptureMessage::Read(reply) => {
                        let _ = reply.send(device.read());
                    }
                    CaptureMessage::Shutdown => break,
                }
            }

            device.release();
            log::debug!("Capture worker released the {} device", device.mode());
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(Self {
                mode,
                sender,
                handle: Some(handle),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::DeviceUnavailable(
                "capture worker exited while opening the device".into(),
            )),
        }
    }

    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    /// Requests one frame and waits at most `timeout` for it.
    pub async fn read(&self, timeout: Duration) -> std::result::Result<SensorFrame, ReadError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .try_send(CaptureMessage::Read(reply_tx))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ReadError::Timeout,
                mpsc::error::TrySendError::Closed(_) => ReadError::WorkerGone,
            })?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => Err(ReadError::WorkerGone),
            Err(_) => Err(ReadError::Timeout),
        }
    }

    /// Stops the worker and waits up to `grace` for the device to be released.
    pub async fn shutdown(mut self, grace: Duration) {
        let _ = self.sender.try_send(CaptureMessage::Shutdown);
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Closing the channel ends the worker even if the shutdown message did not fit.
        drop(self);
        if tokio::time::timeout(grace, handle).await.is_err() {
            log::warn!("Capture device did not release within {grace:?}");
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        if self.handle.is_some() {
            let _ = self.sender.try_send(CaptureMessage::Shutdown);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted devices shared by the detector and pipeline tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub enum Step {
        Frame(SensorFrame),
        Fail,
        Stall(Duration),
    }

    /// Replays a fixed script of frames; once exhausted it repeats the last frame.
    pub struct ScriptedDevice {
        pub mode: SensorMode,
        pub connected: usize,
        pub fail_open: bool,
        pub script: VecDeque<Step>,
        pub last: Option<SensorFrame>,
        pub releases: Arc<AtomicUsize>,
    }

    impl ScriptedDevice {
        pub fn new(mode: SensorMode, script: Vec<Step>) -> Self {
            Self {
                mode,
                connected: 1,
                fail_open: false,
                script: script.into(),
                last: None,
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SensorDevice for ScriptedDevice {
        fn mode(&self) -> SensorMode {
            self.mode
        }

        fn probe(&mut self) -> Result<usize> {
            Ok(self.connected)
        }

        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(Error::DeviceUnavailable("scripted open failure".into()));
            }
            Ok(())
        }

        fn read(&mut self) -> std::result::Result<SensorFrame, ReadError> {
            match self.script.pop_front() {
                Some(Step::Frame(frame)) => {
                    self.last = Some(frame.clone());
                    Ok(frame)
                }
                Some(Step::Fail) => Err(ReadError::Backend("scripted failure".into())),
                Some(Step::Stall(duration)) => {
                    std::thread::sleep(duration);
                    Err(ReadError::Backend("stalled".into()))
                }
                None => self.last.clone().ok_or(ReadError::Backend("empty script".into())),
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
