use protocol::{Colour, TraceResults};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// One painted partition: a screen-space window plus its traced colours,
/// ordered `results[i * height + j]` for window offset `(i, j)`.
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub results: TraceResults,
}

/// The shared framebuffer coordinators composite frames into.
///
/// Pixels are row-major `0RGB` words, the layout the window presents
/// directly. The frame-chain token guarantees at most one painter at a
/// time; the mutex is for the reader on the window thread.
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Mutex<Vec<u32>>,
    dirty: AtomicBool,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            pixels: Mutex::new(vec![0; width * height]),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Clears the framebuffer and paints a full frame of tiles.
    ///
    /// Each tile pixel `(x+i, y+j)` comes from `results[i * tile_height + j]`.
    /// Tiles whose result count does not match their window are dropped
    /// rather than smearing a torn frame.
    pub fn paint_frame(&self, tiles: &[Tile]) {
        let mut pixels = self.pixels.lock().expect("surface lock poisoned");
        pixels.fill(0);

        for tile in tiles {
            let expected = tile.width as usize * tile.height as usize;
            if tile.results.results.len() != expected {
                warn!(
                    x = tile.x,
                    y = tile.y,
                    got = tile.results.results.len(),
                    expected,
                    "dropping malformed tile"
                );
                continue;
            }

            for i in 0..tile.width as usize {
                for j in 0..tile.height as usize {
                    let px = (tile.x as usize + i, tile.y as usize + j);
                    if px.0 >= self.width || px.1 >= self.height {
                        continue;
                    }
                    let colour = tile.results.results[i * tile.height as usize + j];
                    pixels[px.1 * self.width + px.0] = pack(colour);
                }
            }
        }

        drop(pixels);
        self.dirty.store(true, Ordering::Release);
    }

    /// Pushes the framebuffer to the window when a new frame was painted
    /// since the last present; otherwise just pumps the window's events.
    pub fn present(&self, window: &mut minifb::Window) -> Result<(), minifb::Error> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            let pixels = self.pixels.lock().expect("surface lock poisoned");
            window.update_with_buffer(&pixels, self.width, self.height)
        } else {
            window.update();
            Ok(())
        }
    }

    /// A copy of the current framebuffer, row-major.
    pub fn snapshot(&self) -> Vec<u32> {
        self.pixels.lock().expect("surface lock poisoned").clone()
    }

    /// Whether a painted frame is waiting to be presented.
    pub fn has_pending_frame(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

fn pack(colour: Colour) -> u32 {
    (colour.r & 0xFF) << 16 | (colour.g & 0xFF) << 8 | (colour.b & 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, colour: Colour) -> TraceResults {
        TraceResults {
            results: vec![colour; (width * height) as usize],
        }
    }

    #[test]
    fn tiles_land_at_their_window_offsets() {
        let surface = Surface::new(4, 4);
        surface.paint_frame(&[
            Tile {
                x: 0,
                y: 0,
                width: 2,
                height: 4,
                results: solid(2, 4, Colour { r: 0xFF, g: 0, b: 0 }),
            },
            Tile {
                x: 2,
                y: 0,
                width: 2,
                height: 4,
                results: solid(2, 4, Colour { r: 0, g: 0xFF, b: 0 }),
            },
        ]);

        let pixels = surface.snapshot();
        assert_eq!(pixels[0], 0xFF0000);
        assert_eq!(pixels[1], 0xFF0000);
        assert_eq!(pixels[2], 0x00FF00);
        assert_eq!(pixels[3 * 4 + 3], 0x00FF00);
    }

    #[test]
    fn column_major_tile_order_is_respected() {
        // A 2x2 tile with distinct colours: results[i*h + j] -> (x+i, y+j).
        let surface = Surface::new(2, 2);
        let results = TraceResults {
            results: vec![
                Colour { r: 1, g: 0, b: 0 }, // (0, 0)
                Colour { r: 2, g: 0, b: 0 }, // (0, 1)
                Colour { r: 3, g: 0, b: 0 }, // (1, 0)
                Colour { r: 4, g: 0, b: 0 }, // (1, 1)
            ],
        };
        surface.paint_frame(&[Tile {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            results,
        }]);

        let pixels = surface.snapshot();
        assert_eq!(pixels, vec![0x010000, 0x030000, 0x020000, 0x040000]);
    }

    #[test]
    fn malformed_tiles_are_dropped() {
        let surface = Surface::new(4, 4);
        surface.paint_frame(&[Tile {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            results: solid(2, 2, Colour { r: 9, g: 9, b: 9 }),
        }]);
        assert!(surface.snapshot().iter().all(|&p| p == 0));
    }

    #[test]
    fn painting_sets_the_pending_flag() {
        let surface = Surface::new(2, 2);
        assert!(!surface.has_pending_frame());
        surface.paint_frame(&[]);
        assert!(surface.has_pending_frame());
    }

    #[test]
    fn a_new_frame_clears_the_previous_one() {
        let surface = Surface::new(2, 2);
        surface.paint_frame(&[Tile {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            results: solid(2, 2, Colour { r: 0xAA, g: 0, b: 0 }),
        }]);
        surface.paint_frame(&[]);
        assert!(surface.snapshot().iter().all(|&p| p == 0));
    }
}
