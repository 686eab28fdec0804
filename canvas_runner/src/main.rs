// THEORY:
// `canvas_runner` is the interactive frontend for the `motion_canvas` engine. It owns
// everything the library deliberately does not: real devices, the window, the
// keyboard, and the clock.
//
// Key architectural principles:
// 1.  **Paced Ticks**: A `tokio::time::interval` at the configured frame rate drives
//     the engine. When a tick overruns, the next one is delayed rather than bunched.
// 2.  **Cooperative Shutdown**: Ctrl-C only flips a `watch` flag. The loop checks it
//     before each tick, so a tick in flight always completes and the device is
//     released through the normal `stop` path.
// 3.  **Startup Is the Only Hard Failure**: Device selection falls back to the
//     camera on its own; only a camera that cannot be opened aborts the program.

mod devices;
mod hud;

use anyhow::Context;
use clap::Parser;
use devices::{CameraDevice, DepthDevice};
use motion_canvas::{select_device, EngineConfig, PatternPipeline, SensorDevice, SensorMode};
use opencv::highgui;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const WINDOW: &str = "Motion Canvas";

#[derive(Parser, Debug)]
#[command(name = "canvas_runner", version, about = "Reactive particle patterns driven by motion")]
struct Args {
    /// TOML file overriding the default engine configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor to use: camera or depth-sensor.
    #[arg(short, long, env = "MOTION_CANVAS_MODE")]
    mode: Option<SensorMode>,

    #[arg(long)]
    camera_index: Option<i32>,
}

/// What a key press asks the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    ChangePattern,
    Reset,
}

impl Command {
    fn from_key(key: i32) -> Option<Self> {
        if key < 0 {
            return None;
        }
        match (key & 0xFF) as u8 {
            b'q' | b'Q' | 27 => Some(Command::Quit),
            b'p' | b'P' => Some(Command::ChangePattern),
            b' ' => Some(Command::Reset),
            _ => None,
        }
    }
}

/// Counts rendered frames and reports the rate about once a second.
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn frame(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= Duration::from_secs(1) {
            log::debug!("FPS: {:.1}", self.frames as f64 / elapsed.as_secs_f64());
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.sensor_mode = mode;
    }
    if let Some(index) = args.camera_index {
        config.camera_index = index;
    }
    config.validate().context("invalid configuration")?;

    let depth: Option<Box<dyn SensorDevice>> = Some(Box::new(DepthDevice::new()));
    let device = select_device(config.sensor_mode, depth, Box::new(CameraDevice::new(&config)));

    let mut pipeline = PatternPipeline::new(device, &config)?;
    pipeline
        .start()
        .await
        .context("failed to start motion detection")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, shutting down");
            let _ = stop_tx.send(true);
        }
    });

    let outcome = run(&mut pipeline, &config, stop_rx).await;

    pipeline.stop().await;
    if let Err(e) = highgui::destroy_all_windows() {
        log::warn!("Failed to close windows: {e}");
    }
    outcome
}

async fn run(
    pipeline: &mut PatternPipeline,
    config: &EngineConfig,
    stop: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE)?;
    log::info!(
        "Running {} at {} fps; Q/Esc quits, P changes pattern, Space resets",
        pipeline.sensor_mode(),
        config.target_fps
    );

    let mut interval = tokio::time::interval(config.tick_duration());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut fps = FpsCounter::new();

    loop {
        interval.tick().await;
        if *stop.borrow() {
            break;
        }

        let frame = pipeline.tick().await;
        let mut display = hud::to_bgr_mat(&frame)?;
        hud::draw_hud(&mut display, &hud::status_lines(pipeline))?;
        highgui::imshow(WINDOW, &display)?;

        match Command::from_key(highgui::wait_key(1)?) {
            Some(Command::Quit) => break,
            Some(Command::ChangePattern) => pipeline.change_pattern(),
            Some(Command::Reset) => pipeline.reset(),
            None => {}
        }
        fps.frame();
    }

    log::info!("Motion canvas stopped");
    Ok(())
}
