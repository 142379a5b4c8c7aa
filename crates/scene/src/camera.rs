use crate::error::SceneError;
use geom::{VectorExt, GLOBAL_UP};
use glam::DVec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Magnitude of the random nudge applied when a yaw leaves the forward
/// vector parallel to the global up. Keeps the basis from collapsing; the
/// fallback forcing one axis non-zero is part of the correctness guarantee.
const NUDGE: f64 = 1e-4;

/// Held movement directions, one bit per direction.
///
/// Pressing a direction whose opposite is already held cancels both, the
/// same way the event reader treats simultaneous opposing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveDirs(u8);

impl MoveDirs {
    pub const FORWARD: MoveDirs = MoveDirs(1);
    pub const LEFTWARD: MoveDirs = MoveDirs(1 << 1);
    pub const BACKWARD: MoveDirs = MoveDirs(1 << 2);
    pub const RIGHTWARD: MoveDirs = MoveDirs(1 << 3);
    pub const UPWARD: MoveDirs = MoveDirs(1 << 4);
    pub const DOWNWARD: MoveDirs = MoveDirs(1 << 5);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, dir: MoveDirs) -> bool {
        self.0 & dir.0 != 0
    }

    /// Registers a key press: sets `dir`, unless its opposite is held, in
    /// which case both are cleared.
    pub fn press(&mut self, dir: MoveDirs) {
        let opposite = Self::opposite(dir);
        if self.contains(opposite) {
            self.0 &= !(dir.0 | opposite.0);
        } else {
            self.0 |= dir.0;
        }
    }

    /// Registers a key release: clears `dir`.
    pub fn release(&mut self, dir: MoveDirs) {
        self.0 &= !dir.0;
    }

    fn opposite(dir: MoveDirs) -> MoveDirs {
        match dir {
            Self::FORWARD => Self::BACKWARD,
            Self::BACKWARD => Self::FORWARD,
            Self::LEFTWARD => Self::RIGHTWARD,
            Self::RIGHTWARD => Self::LEFTWARD,
            Self::UPWARD => Self::DOWNWARD,
            Self::DOWNWARD => Self::UPWARD,
            _ => MoveDirs(0),
        }
    }
}

/// A camera with a cached orthonormal basis.
///
/// `forward`, `left`, and `up` stay normalized so error cannot build up
/// across repeated rotations; `up` is recomputed from `left x forward`
/// after every rotation for the same reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub pos: DVec3,
    forward: DVec3,
    left: DVec3,
    up: DVec3,
    pub fov: f64,
}

impl Camera {
    /// Creates a camera looking along `dir`. Fails when `dir` is parallel
    /// to the global up, which would leave the basis undefined.
    pub fn new(pos: DVec3, dir: DVec3, fov: f64) -> Result<Self, SceneError> {
        if dir.cross(GLOBAL_UP).is_exactly_zero() {
            return Err(SceneError::ParallelUp);
        }
        let forward = dir.normalize();
        let left = dir.cross(GLOBAL_UP).normalize();
        let up = left.cross(forward);
        Ok(Self {
            pos,
            forward,
            left,
            up,
            fov,
        })
    }

    pub fn forward(&self) -> DVec3 {
        self.forward
    }

    pub fn left(&self) -> DVec3 {
        self.left
    }

    pub fn up(&self) -> DVec3 {
        self.up
    }

    /// Moves the camera `distance` along the combination of held
    /// directions. Opposing directions cancel; no movement happens when the
    /// combination sums to zero.
    pub fn move_by(&mut self, distance: f64, dirs: MoveDirs) {
        let mut dir = DVec3::ZERO;
        if dirs.contains(MoveDirs::FORWARD) != dirs.contains(MoveDirs::BACKWARD) {
            if dirs.contains(MoveDirs::FORWARD) {
                dir += self.forward;
            } else {
                dir -= self.forward;
            }
        }
        if dirs.contains(MoveDirs::LEFTWARD) != dirs.contains(MoveDirs::RIGHTWARD) {
            if dirs.contains(MoveDirs::LEFTWARD) {
                dir += self.left;
            } else {
                dir -= self.left;
            }
        }
        if dirs.contains(MoveDirs::UPWARD) != dirs.contains(MoveDirs::DOWNWARD) {
            if dirs.contains(MoveDirs::UPWARD) {
                dir += self.up;
            } else {
                dir -= self.up;
            }
        }

        if !dir.is_exactly_zero() {
            self.pos += dir.normalize() * distance;
        }
    }

    /// Rotates the camera `theta` radians around its up vector.
    pub fn yaw(&mut self, theta: f64) {
        if theta % std::f64::consts::TAU == 0.0 {
            return;
        }
        self.forward = self.forward.rotate_around(self.up, theta).normalize();

        if self.forward.cross(GLOBAL_UP).is_exactly_zero() {
            self.nudge_forward();
        }

        // left is rebuilt against the global up so drift stays bounded to
        // this frame instead of accumulating across yaws.
        self.left = self.forward.cross(GLOBAL_UP).normalize();
        self.up = self.left.cross(self.forward).normalize();
    }

    /// Rotates the camera `theta` radians around its left vector.
    pub fn pitch(&mut self, theta: f64) {
        if theta % std::f64::consts::TAU == 0.0 {
            return;
        }
        self.forward = self.forward.rotate_around(self.left, theta).normalize();
        self.up = self.left.cross(self.forward).normalize();
    }

    /// Offsets the forward vector by [`NUDGE`] along a random combination
    /// of axes, forcing one axis non-zero if the draw comes up all zeros.
    fn nudge_forward(&mut self) {
        let mut rng = rand::thread_rng();
        let mut nudge = DVec3::new(
            NUDGE * f64::from(rng.gen_range(-1..=1)),
            NUDGE * f64::from(rng.gen_range(-1..=1)),
            NUDGE * f64::from(rng.gen_range(-1..=1)),
        );
        if nudge.is_exactly_zero() {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            match rng.gen_range(0..3) {
                0 => nudge.x = sign * NUDGE,
                1 => nudge.y = sign * NUDGE,
                _ => nudge.z = sign * NUDGE,
            }
        }
        self.forward = (self.forward + nudge).normalize();
    }
}

/// The wire form: position, forward direction, and field of view. The basis
/// is rebuilt on decode, so a corrupted forward parallel to the global up
/// fails the decode rather than producing a collapsed camera.
#[derive(Serialize, Deserialize)]
struct CameraWire {
    pos: DVec3,
    forward: DVec3,
    fov: f64,
}

impl Serialize for Camera {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CameraWire {
            pos: self.pos,
            forward: self.forward,
            fov: self.fov,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Camera {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = CameraWire::deserialize(deserializer)?;
        Camera::new(wire.pos, wire.forward, wire.fov).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(cam: &Camera) {
        assert!((cam.forward().length() - 1.0).abs() < 1e-9);
        assert!((cam.left().length() - 1.0).abs() < 1e-9);
        assert!((cam.up().length() - 1.0).abs() < 1e-9);
        assert!(cam.forward().dot(cam.left()).abs() < 1e-6);
        assert!(cam.forward().dot(cam.up()).abs() < 1e-6);
        assert!(cam.left().dot(cam.up()).abs() < 1e-6);
    }

    #[test]
    fn new_rejects_parallel_up() {
        assert!(matches!(
            Camera::new(DVec3::ZERO, DVec3::new(0.0, 3.0, 0.0), 1.0),
            Err(SceneError::ParallelUp)
        ));
    }

    #[test]
    fn basis_is_orthonormal_after_construction() {
        let cam = Camera::new(DVec3::ZERO, DVec3::new(0.3, 0.2, -1.0), 1.0).unwrap();
        assert_orthonormal(&cam);
    }

    #[test]
    fn basis_stays_orthonormal_across_rotations() {
        let mut cam = Camera::new(DVec3::ZERO, DVec3::new(0.0, 0.0, -1.0), 1.0).unwrap();
        for i in 0..500 {
            cam.yaw(0.13 * ((i % 7) as f64 - 3.0));
            cam.pitch(0.07 * ((i % 5) as f64 - 2.0));
            assert_orthonormal(&cam);
        }
    }

    #[test]
    fn pitching_onto_the_pole_survives_the_next_yaw() {
        let mut cam = Camera::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0), 1.0).unwrap();
        // Pitch until forward points almost straight up, then keep yawing.
        cam.pitch(std::f64::consts::FRAC_PI_2);
        for _ in 0..10 {
            cam.yaw(0.3);
            assert_orthonormal(&cam);
            assert!(!cam.forward().cross(GLOBAL_UP).is_exactly_zero());
        }
    }

    #[test]
    fn opposing_moves_cancel() {
        let mut cam = Camera::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0), 1.0).unwrap();
        let mut dirs = MoveDirs::default();
        dirs.press(MoveDirs::FORWARD);
        dirs.press(MoveDirs::BACKWARD);
        assert!(dirs.is_empty());
        cam.move_by(0.1, dirs);
        assert_eq!(cam.pos, DVec3::ZERO);
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut cam = Camera::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0), 1.0).unwrap();
        let mut dirs = MoveDirs::default();
        dirs.press(MoveDirs::FORWARD);
        dirs.press(MoveDirs::LEFTWARD);
        cam.move_by(1.0, dirs);
        assert!((cam.pos.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn release_clears_only_its_direction() {
        let mut dirs = MoveDirs::default();
        dirs.press(MoveDirs::FORWARD);
        dirs.press(MoveDirs::UPWARD);
        dirs.release(MoveDirs::FORWARD);
        assert!(!dirs.contains(MoveDirs::FORWARD));
        assert!(dirs.contains(MoveDirs::UPWARD));
    }

    #[test]
    fn full_turn_yaw_is_a_no_op() {
        let mut cam = Camera::new(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.5), 1.0).unwrap();
        let before = cam.forward();
        cam.yaw(0.0);
        assert_eq!(cam.forward(), before);
    }

    #[test]
    fn serde_round_trip_rebuilds_the_basis() {
        let mut cam = Camera::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(0.4, 0.1, -1.0), 1.2)
            .unwrap();
        cam.yaw(0.5);
        cam.pitch(-0.25);

        let bytes = bincode::serialize(&cam).unwrap();
        let decoded: Camera = bincode::deserialize(&bytes).unwrap();
        assert!((decoded.pos - cam.pos).length() < 1e-12);
        assert!((decoded.forward() - cam.forward()).length() < 1e-12);
        assert_orthonormal(&decoded);
    }

    #[test]
    fn decoding_a_parallel_up_forward_fails() {
        let wire = CameraWire {
            pos: DVec3::ZERO,
            forward: DVec3::new(0.0, 1.0, 0.0),
            fov: 1.0,
        };
        let bytes = bincode::serialize(&wire).unwrap();
        assert!(bincode::deserialize::<Camera>(&bytes).is_err());
    }
}
