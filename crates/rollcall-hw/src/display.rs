//! Preview window (minifb) and the headless sink.

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use rollcall_core::{FrameSink, ProcessedFrame};
use std::convert::Infallible;
use thiserror::Error;

const TARGET_FPS: usize = 30;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("could not open window: {0}")]
    Open(#[source] minifb::Error),
    #[error("could not draw frame: {0}")]
    Update(#[source] minifb::Error),
}

/// Pack an RGB image into minifb's `0RGB` u32 buffer.
pub fn rgb_to_argb_buffer(image: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        image
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}

/// A desktop window showing annotated frames. `q`, Esc or closing the
/// window requests a stop.
pub struct WindowDisplay {
    window: Window,
    buffer: Vec<u32>,
    closed: bool,
}

impl WindowDisplay {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(DisplayError::Open)?;
        window.set_target_fps(TARGET_FPS);
        tracing::info!(title, width, height, "preview window opened");

        Ok(Self {
            window,
            buffer: Vec::new(),
            closed: false,
        })
    }
}

impl FrameSink for WindowDisplay {
    type Error = DisplayError;

    fn show(&mut self, frame: &ProcessedFrame) -> Result<(), DisplayError> {
        if !self.window.is_open() {
            self.closed = true;
            return Ok(());
        }
        rgb_to_argb_buffer(&frame.image, &mut self.buffer);
        self.window
            .update_with_buffer(
                &self.buffer,
                frame.image.width() as usize,
                frame.image.height() as usize,
            )
            .map_err(DisplayError::Update)
    }

    fn quit_requested(&mut self) -> bool {
        self.closed
            || !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_pressed(Key::Q, KeyRepeat::No)
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        tracing::debug!("preview window closed");
    }
}

/// Sink for headless runs: shows nothing and never asks to stop.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl FrameSink for NullDisplay {
    type Error = Infallible;

    fn show(&mut self, frame: &ProcessedFrame) -> Result<(), Infallible> {
        if !frame.newly_recorded.is_empty() {
            tracing::debug!(names = ?frame.newly_recorded, "recorded (headless)");
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_argb_buffer_packs_channels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0x12, 0x34, 0x56]));
        img.put_pixel(1, 0, Rgb([255, 0, 0]));

        let mut buf = vec![7, 7, 7];
        rgb_to_argb_buffer(&img, &mut buf);
        assert_eq!(buf, vec![0x0012_3456, 0x00FF_0000]);
    }

    #[test]
    fn test_null_display_never_quits() {
        let mut sink = NullDisplay;
        let frame = ProcessedFrame {
            image: RgbImage::new(1, 1),
            annotations: Vec::new(),
            newly_recorded: vec!["Ann".into()],
            faces_detected: 1,
        };
        assert!(sink.show(&frame).is_ok());
        assert!(!sink.quit_requested());
    }
}
