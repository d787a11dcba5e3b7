use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::{Mat4, Vec3};

/// Camera pose for one frame. Focus targets and the dust anchor are
/// recomputed from it every tick, so nothing assumes it is immobile.
#[derive(Debug, Clone, Copy)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Ray through a cursor position given in normalized device
    /// coordinates (x right, y up, both in [-1, 1]).
    pub fn picking_ray(&self, ndc_x: f32, ndc_y: f32, aspect: f32) -> Ray {
        let inverse = self.view_projection(aspect).inverse();
        let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        Ray {
            origin: near,
            direction: (far - near).normalize(),
        }
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 20.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 45f32.to_radians(),
            near: 0.1,
            far: 200.0,
        }
    }
}

/// Spherical rig the input handlers drive. Azimuth is unbounded; polar
/// angle and distance are clamped so the camera can neither dive under
/// the floor nor clip into the tree.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    target: Vec3,
    azimuth: f32,
    polar: f32,
    distance: f32,
}

const POLAR_MIN: f32 = FRAC_PI_4;
const POLAR_MAX: f32 = FRAC_PI_2;
const DISTANCE_MIN: f32 = 8.0;
const DISTANCE_MAX: f32 = 30.0;
const ROTATE_SENSITIVITY: f32 = 0.005;
const ZOOM_STEP: f32 = 0.95;
/// Half a revolution per minute once the tree has formed.
const AUTO_ROTATE_RATE: f32 = PI / 60.0;

impl OrbitCamera {
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.azimuth -= dx * ROTATE_SENSITIVITY;
        self.polar = (self.polar + dy * ROTATE_SENSITIVITY).clamp(POLAR_MIN, POLAR_MAX);
    }

    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * ZOOM_STEP.powf(steps)).clamp(DISTANCE_MIN, DISTANCE_MAX);
    }

    pub fn tick(&mut self, dt: f32, auto_rotate: bool) {
        if auto_rotate {
            self.azimuth += AUTO_ROTATE_RATE * dt;
        }
    }

    pub fn pose(&self) -> CameraPose {
        let offset = Vec3::new(
            self.polar.sin() * self.azimuth.sin(),
            self.polar.cos(),
            self.polar.sin() * self.azimuth.cos(),
        ) * self.distance;
        CameraPose {
            eye: self.target + offset,
            target: self.target,
            ..CameraPose::default()
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 2.0, 0.0),
            azimuth: 0.0,
            polar: FRAC_PI_2,
            distance: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Distance along the ray to the first hit on the sphere, if any.
    pub fn hit_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let offset = self.origin - center;
        let half_b = offset.dot(self.direction);
        let c = offset.length_squared() - radius * radius;
        let discriminant = half_b * half_b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = -half_b - discriminant.sqrt();
        if t >= 0.0 { Some(t) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_points_at_the_target() {
        let camera = CameraPose::default();
        let forward = camera.forward();
        assert!((forward - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn center_ray_hits_a_sphere_on_axis() {
        let camera = CameraPose::default();
        let ray = camera.picking_ray(0.0, 0.0, 16.0 / 9.0);
        let hit = ray.hit_sphere(Vec3::ZERO, 1.0);
        assert!(hit.is_some(), "center ray should strike the origin sphere");
        let t = hit.unwrap();
        assert!((t - 19.0).abs() < 0.05, "hit distance {t} should be ~19");
    }

    #[test]
    fn offset_ray_misses_a_small_centered_sphere() {
        let camera = CameraPose::default();
        let ray = camera.picking_ray(0.9, 0.9, 1.0);
        assert!(ray.hit_sphere(Vec3::ZERO, 0.5).is_none());
    }
}
