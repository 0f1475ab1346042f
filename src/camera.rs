//! Perspective camera and the orbit interaction rig.
//!
//! The rig keeps two copies of its spherical state: the *goal* values driven
//! directly by pointer input, and the *current* values that chase the goals
//! with one damping step per rendered frame. `update()` must be called
//! exactly once per frame, before the draw call.
//!
//! Input plumbing is kept free of winit types; the viewer translates window
//! events into `begin_rotate` / `begin_pan` / `on_cursor` / `on_scroll`.

use glam::{Mat4, Vec3, vec3};

/// Damping factor applied once per frame.
pub const DAMPING_FACTOR: f32 = 0.1;

/// Vertical field of view in degrees.
pub const FOV_Y_DEGREES: f32 = 75.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;

/// Default camera placement: above and in front of the origin.
pub const DEFAULT_EYE: Vec3 = vec3(0.0, 8.0, 5.0);

#[derive(Debug, Clone, Copy)]
pub struct PerspectiveCamera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            fov_y_deg: FOV_Y_DEGREES,
            aspect,
            near: Z_NEAR,
            far: Z_FAR,
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect.max(1e-6),
            self.near,
            self.far,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragMode {
    Rotate,
    Pan,
}

/// Orbit/pan/zoom rig with inertial damping.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    pub damping: f32,

    // Current (damped) spherical state around the target.
    yaw: f32,
    pitch: f32,
    distance: f32,
    target: Vec3,

    // Goal state, moved directly by pointer input.
    yaw_goal: f32,
    pitch_goal: f32,
    distance_goal: f32,
    target_goal: Vec3,

    rotate_speed: f32,
    pan_speed: f32,
    zoom_step: f32,
    min_distance: f32,
    max_distance: f32,
    max_pitch: f32,

    drag: Option<DragMode>,
    cursor: Option<(f64, f64)>,
}

impl OrbitControls {
    /// Build a rig looking from `eye` toward `target`.
    pub fn from_eye_target(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let horizontal = (offset.x * offset.x + offset.z * offset.z).sqrt();
        let yaw = offset.x.atan2(offset.z);
        let pitch = offset.y.atan2(horizontal);
        let distance = offset.length().max(1e-3);

        Self {
            enabled: true,
            damping: DAMPING_FACTOR,
            yaw,
            pitch,
            distance,
            target,
            yaw_goal: yaw,
            pitch_goal: pitch,
            distance_goal: distance,
            target_goal: target,
            rotate_speed: 0.005,
            pan_speed: 0.002,
            zoom_step: 0.95,
            min_distance: 0.5,
            max_distance: 80.0,
            max_pitch: std::f32::consts::FRAC_PI_2 - 0.01,
            drag: None,
            cursor: None,
        }
    }

    /// Current eye position derived from the damped spherical state.
    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + vec3(
                self.distance * cos_pitch * sin_yaw,
                self.distance * sin_pitch,
                self.distance * cos_pitch * cos_yaw,
            )
    }

    #[inline]
    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    /// Apply one damping step toward the goal state.
    ///
    /// Call exactly once per rendered frame, before the draw.
    pub fn update(&mut self) {
        let k = self.damping;
        self.yaw += (self.yaw_goal - self.yaw) * k;
        self.pitch += (self.pitch_goal - self.pitch) * k;
        self.distance += (self.distance_goal - self.distance) * k;
        self.target += (self.target_goal - self.target) * k;
    }

    pub fn begin_rotate(&mut self) {
        if self.enabled {
            self.drag = Some(DragMode::Rotate);
        }
    }

    pub fn begin_pan(&mut self) {
        if self.enabled {
            self.drag = Some(DragMode::Pan);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Feed an absolute cursor position (physical pixels).
    pub fn on_cursor(&mut self, x: f64, y: f64) {
        let last = self.cursor.replace((x, y));
        if !self.enabled {
            return;
        }
        let Some((lx, ly)) = last else {
            return;
        };
        let dx = (x - lx) as f32;
        let dy = (y - ly) as f32;

        match self.drag {
            Some(DragMode::Rotate) => {
                self.yaw_goal -= dx * self.rotate_speed;
                self.pitch_goal =
                    (self.pitch_goal + dy * self.rotate_speed).clamp(-self.max_pitch, self.max_pitch);
            }
            Some(DragMode::Pan) => {
                // Pan in the camera plane, scaled by distance so the motion
                // feels constant on screen.
                let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
                let right = vec3(cos_yaw, 0.0, -sin_yaw);
                let forward = vec3(-sin_yaw, 0.0, -cos_yaw);
                let scale = self.pan_speed * self.distance;
                self.target_goal += right * (-dx * scale) + forward * (-dy * scale);
            }
            None => {}
        }
    }

    /// Feed a wheel delta; positive zooms in.
    pub fn on_scroll(&mut self, delta: f32) {
        if !self.enabled {
            return;
        }
        let factor = self.zoom_step.powf(delta);
        self.distance_goal =
            (self.distance_goal * factor).clamp(self.min_distance, self.max_distance);
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::from_eye_target(DEFAULT_EYE, Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_round_trips_through_spherical_state() {
        let rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        assert!((rig.eye() - DEFAULT_EYE).length() < 1e-4);
        assert_eq!(rig.target(), Vec3::ZERO);
    }

    #[test]
    fn update_moves_ten_percent_toward_the_goal() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        rig.yaw_goal = rig.yaw + 1.0;
        let before = rig.yaw;
        rig.update();
        assert!((rig.yaw - (before + 0.1)).abs() < 1e-6);
    }

    #[test]
    fn repeated_updates_converge_to_the_goal() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        rig.yaw_goal = rig.yaw + 2.0;
        rig.distance_goal = rig.distance * 0.5;
        for _ in 0..200 {
            rig.update();
        }
        assert!((rig.yaw - rig.yaw_goal).abs() < 1e-4);
        assert!((rig.distance - rig.distance_goal).abs() < 1e-3);
    }

    #[test]
    fn rotate_drag_clamps_pitch() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        rig.begin_rotate();
        rig.on_cursor(0.0, 0.0);
        rig.on_cursor(0.0, 1e6);
        assert!(rig.pitch_goal <= rig.max_pitch + 1e-6);
        for _ in 0..500 {
            rig.update();
        }
        // The eye never flips over the pole.
        assert!(rig.eye().y / rig.distance < 1.0);
    }

    #[test]
    fn scroll_clamps_distance() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        rig.on_scroll(1e4);
        assert!(rig.distance_goal >= rig.min_distance);
        rig.on_scroll(-1e4);
        assert!(rig.distance_goal <= rig.max_distance);
    }

    #[test]
    fn pan_moves_the_target_not_the_orbit_radius() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        let d = rig.distance_goal;
        rig.begin_pan();
        rig.on_cursor(0.0, 0.0);
        rig.on_cursor(50.0, 0.0);
        assert!(rig.target_goal.length() > 0.0);
        assert_eq!(rig.distance_goal, d);
    }

    #[test]
    fn disabled_rig_ignores_input() {
        let mut rig = OrbitControls::from_eye_target(DEFAULT_EYE, Vec3::ZERO);
        rig.enabled = false;
        rig.begin_rotate();
        rig.on_cursor(0.0, 0.0);
        rig.on_cursor(100.0, 100.0);
        rig.on_scroll(5.0);
        assert_eq!(rig.yaw_goal, rig.yaw);
        assert_eq!(rig.distance_goal, rig.distance);
    }

    #[test]
    fn projection_tolerates_degenerate_aspect() {
        let cam = PerspectiveCamera::new(0.0);
        let m = cam.projection();
        assert!(m.is_finite());
    }
}
