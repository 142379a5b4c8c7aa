use minifb::{Key, KeyRepeat, MouseMode, Window};
use scene::MoveDirs;

/// Everything the main loop needs from one tick of input.
#[derive(Debug, Clone, Copy)]
pub struct InputEvents {
    pub running: bool,
    pub dirs: MoveDirs,
    /// Accumulated yaw, in units of `fov / 2` radians per half-screen of
    /// mouse travel.
    pub yaw: f64,
    /// Accumulated pitch, same units, inverted so mouse-up looks up.
    pub pitch: f64,
}

impl InputEvents {
    pub fn moved(&self) -> bool {
        !self.dirs.is_empty() || self.yaw != 0.0 || self.pitch != 0.0
    }
}

/// Tracks held movement keys and the last mouse position across ticks.
#[derive(Default)]
pub struct InputReader {
    dirs: MoveDirs,
    last_mouse: Option<(f32, f32)>,
}

const KEY_BINDINGS: [(Key, MoveDirs); 6] = [
    (Key::W, MoveDirs::FORWARD),
    (Key::A, MoveDirs::LEFTWARD),
    (Key::S, MoveDirs::BACKWARD),
    (Key::D, MoveDirs::RIGHTWARD),
    (Key::Space, MoveDirs::UPWARD),
    (Key::LeftShift, MoveDirs::DOWNWARD),
];

impl InputReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains this tick's input from the window.
    ///
    /// Pressing a key whose opposite is held cancels the pair; releasing a
    /// key clears only its own direction. Mouse deltas convert to yaw and
    /// pitch scaled by half the window size.
    pub fn poll(&mut self, window: &Window) -> InputEvents {
        let running = window.is_open() && !window.is_key_down(Key::Escape);

        for (key, dir) in KEY_BINDINGS {
            if window.is_key_pressed(key, KeyRepeat::No) {
                self.dirs.press(dir);
            }
            if window.is_key_released(key) {
                self.dirs.release(dir);
            }
        }

        let (mut yaw, mut pitch) = (0.0, 0.0);
        if let Some((mx, my)) = window.get_mouse_pos(MouseMode::Pass) {
            if let Some((px, py)) = self.last_mouse {
                let (width, height) = window.get_size();
                yaw = f64::from(mx - px) / f64::from(width as u32 / 2);
                pitch = -f64::from(my - py) / f64::from(height as u32 / 2);
            }
            self.last_mouse = Some((mx, my));
        }

        InputEvents {
            running,
            dirs: self.dirs,
            yaw,
            pitch,
        }
    }
}
