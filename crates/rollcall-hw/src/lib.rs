//! rollcall-hw: webcam capture and the preview window.
//!
//! V4L2 access through the `v4l` crate, frames converted to RGB for the
//! recognition pipeline, and a minifb window for the live view.

pub mod camera;
pub mod display;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use display::{DisplayError, NullDisplay, WindowDisplay};
pub use frame::{FrameError, PixelFormat};
