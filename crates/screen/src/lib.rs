//! Window, framebuffer, and input plumbing shared by the master and the
//! local preview worker.

pub mod input;
pub mod surface;

pub use input::{InputEvents, InputReader};
pub use surface::{Surface, Tile};

/// Target display rate and the tick budget derived from it.
pub const FPS: u32 = 30;
pub const MS_PER_FRAME: u64 = 1000 / FPS as u64;

/// Opens a window sized for a `width x height` framebuffer.
pub fn open_window(
    title: &str,
    width: usize,
    height: usize,
) -> Result<minifb::Window, minifb::Error> {
    minifb::Window::new(title, width, height, minifb::WindowOptions::default())
}
