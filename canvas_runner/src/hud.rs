//! Conversion of engine frames into displayable OpenCV images, plus the text overlay.

use image::RgbImage;
use motion_canvas::PatternPipeline;
use opencv::{
    core::{self, Mat, Point, Scalar},
    imgproc,
    prelude::*,
};

const LINE_HEIGHT: i32 = 30;
const MARGIN: i32 = 10;

/// Copies an RGB frame into a new BGR `Mat`.
pub fn to_bgr_mat(frame: &RgbImage) -> opencv::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Status lines shown in the top-left corner.
pub fn status_lines(pipeline: &PatternPipeline) -> Vec<String> {
    vec![
        format!("Pattern: {}", pipeline.current_pattern_name()),
        format!("Particles: {}", pipeline.particle_count()),
        format!("Intensity: {:.2}", pipeline.motion_intensity()),
        format!("Mode: {}", pipeline.sensor_mode()),
        "Q/Esc: quit  P: pattern  Space: reset".to_string(),
    ]
}

pub fn draw_hud(display: &mut Mat, lines: &[String]) -> opencv::Result<()> {
    let white = Scalar::new(255.0, 255.0, 255.0, 0.0);
    for (row, line) in lines.iter().enumerate() {
        imgproc::put_text(
            display,
            line,
            Point::new(MARGIN, LINE_HEIGHT * (row as i32 + 1)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            white,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}
