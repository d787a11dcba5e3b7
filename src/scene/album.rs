use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use glam::{Mat3, Quat, Vec3};
use rand::Rng;
use slotmap::{SlotMap, new_key_type};

use crate::scene::camera::{CameraPose, Ray};
use crate::scene::entities::FormationSpace;
use crate::scene::progress::{damp, damp_quat, damp_vec3};

new_key_type! {
    /// Generation-counted handle to a photo frame. A key taken before a
    /// removal can never alias a frame added later into the same slot.
    pub struct PhotoKey;
}

/// Gold border extends 10% past the photo quad on each axis; picking uses
/// the same margin so the border is clickable.
const FRAME_BORDER_SCALE: f32 = 1.1;
const ORBIT_BASE_SCALE: f32 = 1.5;
const ORBIT_MARGIN: f32 = 1.0;
const SCATTER_DRIFT: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Orbit,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Focused(PhotoKey),
    Defocused(PhotoKey),
    Swapped { from: PhotoKey, to: PhotoKey },
}

/// One floating photo panel. Orbit parameters are frozen when the photo
/// joins the pool; the slot-dependent layout values are re-derived every
/// tick from the current pool size, so insertions and removals reflow the
/// ring without any cached index going stale.
#[derive(Debug)]
pub struct PhotoFrame {
    path: PathBuf,
    aspect: f32,
    orbit_speed: f32,
    orbit_phase: f32,
    position: Vec3,
    orientation: Quat,
    scale: Vec3,
    tumble_x: f32,
    tumble_z: f32,
    initialized: bool,
}

impl PhotoFrame {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Radius of the picking sphere around the frame, border included.
    pub fn pick_radius(&self) -> f32 {
        self.scale.x.max(self.scale.y) * 0.5 * FRAME_BORDER_SCALE
    }
}

/// The dynamic pool of photo frames plus the at-most-one focus marker, and
/// the camera-anchored dust backdrop that fades in behind a focused photo.
#[derive(Debug)]
pub struct PhotoAlbum {
    frames: SlotMap<PhotoKey, PhotoFrame>,
    order: Vec<PhotoKey>,
    focused: Option<PhotoKey>,
    space: FormationSpace,
    focus_distance: f32,
    focus_height_fraction: f32,
    focus_smoothing: f32,
    orbit_position_smoothing: f32,
    orbit_scale_smoothing: f32,
    dust: DustField,
}

impl PhotoAlbum {
    pub fn new(
        space: FormationSpace,
        focus_distance: f32,
        focus_height_fraction: f32,
        focus_smoothing: f32,
        formation_smoothing: f32,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            frames: SlotMap::with_key(),
            order: Vec::new(),
            focused: None,
            space,
            focus_distance,
            focus_height_fraction,
            focus_smoothing,
            orbit_position_smoothing: formation_smoothing,
            orbit_scale_smoothing: 1.2,
            dust: DustField::new(rng),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn focused(&self) -> Option<PhotoKey> {
        self.focused
    }

    pub fn state_of(&self, key: PhotoKey) -> Option<FrameState> {
        if !self.frames.contains_key(key) {
            return None;
        }
        Some(if self.focused == Some(key) {
            FrameState::Focused
        } else {
            FrameState::Orbit
        })
    }

    pub fn get(&self, key: PhotoKey) -> Option<&PhotoFrame> {
        self.frames.get(key)
    }

    /// Frames in insertion order; index within this iteration is the
    /// frame's current orbit slot.
    pub fn iter(&self) -> impl Iterator<Item = (PhotoKey, &PhotoFrame)> {
        self.order
            .iter()
            .filter_map(|key| self.frames.get(*key).map(|frame| (*key, frame)))
    }

    pub fn key_for(&self, path: &Path) -> Option<PhotoKey> {
        self.iter()
            .find(|(_, frame)| frame.path == path)
            .map(|(key, _)| key)
    }

    /// Adds a photo, or refreshes its aspect in place when the same path
    /// is loaded again (a file overwritten on disk keeps its slot).
    pub fn add<R: Rng + ?Sized>(&mut self, path: PathBuf, aspect: f32, rng: &mut R) -> PhotoKey {
        if let Some(existing) = self.key_for(&path) {
            if let Some(frame) = self.frames.get_mut(existing) {
                frame.aspect = aspect;
            }
            return existing;
        }
        let key = self.frames.insert(PhotoFrame {
            path,
            aspect,
            orbit_speed: 0.2 + rng.random::<f32>() * 0.2,
            orbit_phase: rng.random::<f32>() * TAU,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            tumble_x: 0.0,
            tumble_z: 0.0,
            initialized: false,
        });
        self.order.push(key);
        key
    }

    /// Removes the frame for `path`. Removing an unknown path is a no-op;
    /// removing the focused frame clears the focus.
    pub fn remove_by_path(&mut self, path: &Path) -> Option<PhotoKey> {
        let key = self.key_for(path)?;
        self.frames.remove(key);
        self.order.retain(|k| *k != key);
        if self.focused == Some(key) {
            self.focused = None;
        }
        Some(key)
    }

    /// Selection input. Selecting the focused frame defocuses it; selecting
    /// another frame while one is focused hands the focus over in the same
    /// tick; selecting a stale key does nothing.
    pub fn select(&mut self, key: PhotoKey) -> Option<FocusChange> {
        if !self.frames.contains_key(key) {
            return None;
        }
        match self.focused {
            Some(active) if active == key => {
                self.focused = None;
                Some(FocusChange::Defocused(active))
            }
            Some(active) => {
                self.focused = Some(key);
                Some(FocusChange::Swapped {
                    from: active,
                    to: key,
                })
            }
            None => {
                self.focused = Some(key);
                Some(FocusChange::Focused(key))
            }
        }
    }

    /// Background deselect.
    pub fn clear_focus(&mut self) -> Option<FocusChange> {
        self.focused.take().map(FocusChange::Defocused)
    }

    /// Nearest frame whose picking sphere the ray hits.
    pub fn pick(&self, ray: &Ray) -> Option<PhotoKey> {
        self.iter()
            .filter_map(|(key, frame)| {
                ray.hit_sphere(frame.position, frame.pick_radius())
                    .map(|t| (key, t))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| key)
    }

    pub fn dust(&self) -> &DustField {
        &self.dust
    }

    /// Advances every frame's damped pose and the dust backdrop. Layout
    /// slots are re-derived from the pool size here, every tick.
    pub fn tick(&mut self, dt: f32, time: f32, progress: f32, camera: &CameraPose) {
        let total = self.order.len();
        let focused = self.focused;
        for (index, key) in self.order.iter().enumerate() {
            let Some(frame) = self.frames.get_mut(*key) else {
                continue;
            };
            let is_focused = focused == Some(*key);

            let slot_fraction = if total <= 1 {
                0.0
            } else {
                index as f32 / (total - 1) as f32
            };
            let y_base =
                -self.space.tree_height / 3.0 + slot_fraction * self.space.tree_height * 0.6;
            let orbit_radius = self.space.cone_radius_at(y_base) * 1.2 + ORBIT_MARGIN;
            let current_radius = orbit_radius + (1.0 - progress) * SCATTER_DRIFT;

            let angle = time * frame.orbit_speed + frame.orbit_phase;
            let bob = (time * 1.5 + frame.orbit_phase).sin() * 0.5;
            let orbit_position = Vec3::new(
                angle.cos() * current_radius,
                y_base + bob,
                angle.sin() * current_radius,
            );

            let (target_position, target_scale) = if is_focused {
                let position = camera.eye + camera.forward() * self.focus_distance;
                let height = (camera.fov_y_radians / 2.0).tan()
                    * self.focus_distance
                    * 2.0
                    * self.focus_height_fraction;
                (position, Vec3::new(height * frame.aspect, height, 1.0))
            } else {
                (
                    orbit_position,
                    Vec3::new(ORBIT_BASE_SCALE * frame.aspect, ORBIT_BASE_SCALE, 1.0),
                )
            };

            // Tumble accumulates while the cloud is scattered and unwinds
            // once the tree takes shape or the frame is focused.
            if !is_focused && progress < 0.5 {
                frame.tumble_z += dt * 0.5;
                frame.tumble_x += dt * 0.2;
            } else {
                frame.tumble_z = damp(frame.tumble_z, 0.0, self.orbit_position_smoothing, dt);
                frame.tumble_x = damp(frame.tumble_x, 0.0, self.orbit_position_smoothing, dt);
            }

            let target_orientation = if is_focused {
                face_towards(target_position, camera.eye)
            } else {
                face_towards(orbit_position, Vec3::new(0.0, orbit_position.y, 0.0))
                    * Quat::from_euler(
                        glam::EulerRot::XYZ,
                        frame.tumble_x,
                        0.0,
                        frame.tumble_z,
                    )
            };

            if !frame.initialized {
                frame.position = target_position;
                frame.scale = target_scale;
                frame.orientation = target_orientation;
                frame.initialized = true;
                continue;
            }

            let position_smoothing = if is_focused {
                self.focus_smoothing
            } else {
                self.orbit_position_smoothing
            };
            let scale_smoothing = if is_focused {
                self.focus_smoothing
            } else {
                self.orbit_scale_smoothing
            };
            frame.position = damp_vec3(frame.position, target_position, position_smoothing, dt);
            frame.scale = damp_vec3(frame.scale, target_scale, scale_smoothing, dt);
            frame.orientation = damp_quat(
                frame.orientation,
                target_orientation,
                position_smoothing,
                dt,
            );
        }

        self.dust.tick(dt, time, focused.is_some());
    }
}

/// Orientation that points a panel's +Z face at `target`, yaw-up.
fn face_towards(position: Vec3, target: Vec3) -> Quat {
    let forward = (target - position).normalize_or(Vec3::Z);
    let right = Vec3::Y.cross(forward).normalize_or(Vec3::X);
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward))
}

/// Drifting gold motes shown behind a focused photo. Points live in
/// camera-local space; the renderer anchors the whole field a fixed
/// distance in front of whatever pose the camera has this frame.
#[derive(Debug)]
pub struct DustField {
    points: Vec<Vec3>,
    opacity: f32,
}

pub const DUST_COUNT: usize = 300;
pub const DUST_ANCHOR_DISTANCE: f32 = 10.0;
const DUST_EXTENT: Vec3 = Vec3::new(15.0, 10.0, 5.0);
const DUST_SMOOTHING: f32 = 1.0;

impl DustField {
    fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let points = (0..DUST_COUNT)
            .map(|_| {
                Vec3::new(
                    (rng.random::<f32>() - 0.5) * DUST_EXTENT.x,
                    (rng.random::<f32>() - 0.5) * DUST_EXTENT.y,
                    (rng.random::<f32>() - 0.5) * DUST_EXTENT.z,
                )
            })
            .collect();
        Self {
            points,
            opacity: 0.0,
        }
    }

    fn tick(&mut self, dt: f32, time: f32, visible: bool) {
        let target = if visible { 1.0 } else { 0.0 };
        self.opacity = damp(self.opacity, target, DUST_SMOOTHING, dt);
        // Normalized to the original's per-frame drift at 60 fps.
        for (i, point) in self.points.iter_mut().enumerate() {
            point.y += (time + i as f32).sin() * 0.6 * dt;
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn album(rng: &mut StdRng) -> PhotoAlbum {
        let space = FormationSpace::new(12.0, 4.5, 25.0).unwrap();
        PhotoAlbum::new(space, 8.0, 0.65, 0.6, 1.5, rng)
    }

    fn camera() -> CameraPose {
        CameraPose::default()
    }

    #[test]
    fn selecting_a_second_frame_hands_focus_over() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.5, &mut rng);
        let b = album.add(PathBuf::from("/photos/b.jpg"), 1.0, &mut rng);

        assert_eq!(album.select(a), Some(FocusChange::Focused(a)));
        assert_eq!(album.state_of(a), Some(FrameState::Focused));

        assert_eq!(
            album.select(b),
            Some(FocusChange::Swapped { from: a, to: b })
        );
        assert_eq!(album.focused(), Some(b));
        assert_eq!(album.state_of(a), Some(FrameState::Orbit));
        assert_eq!(album.state_of(b), Some(FrameState::Focused));
    }

    #[test]
    fn reselecting_the_focused_frame_toggles_it_off() {
        let mut rng = StdRng::seed_from_u64(32);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.5, &mut rng);
        album.select(a);
        assert_eq!(album.select(a), Some(FocusChange::Defocused(a)));
        assert_eq!(album.focused(), None);
    }

    #[test]
    fn removing_the_focused_frame_clears_focus() {
        let mut rng = StdRng::seed_from_u64(33);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.5, &mut rng);
        album.select(a);
        assert_eq!(album.remove_by_path(Path::new("/photos/a.jpg")), Some(a));
        assert_eq!(album.focused(), None);
        assert!(album.is_empty());
    }

    #[test]
    fn removing_an_unknown_path_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(34);
        let mut album = album(&mut rng);
        album.add(PathBuf::from("/photos/a.jpg"), 1.5, &mut rng);
        assert_eq!(album.remove_by_path(Path::new("/photos/missing.jpg")), None);
        assert_eq!(album.len(), 1);
    }

    #[test]
    fn add_then_remove_everything_leaves_no_residue() {
        let mut rng = StdRng::seed_from_u64(35);
        let mut album = album(&mut rng);
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| PathBuf::from(format!("/photos/{i}.jpg")))
            .collect();
        for path in &paths {
            album.add(path.clone(), 1.0, &mut rng);
        }
        album.select(album.key_for(&paths[3]).unwrap());
        for path in &paths {
            album.remove_by_path(path);
        }
        assert!(album.is_empty());
        assert_eq!(album.focused(), None);
        assert_eq!(album.iter().count(), 0);
    }

    #[test]
    fn stale_keys_never_reach_a_reused_slot() {
        let mut rng = StdRng::seed_from_u64(36);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.0, &mut rng);
        album.remove_by_path(Path::new("/photos/a.jpg"));
        let b = album.add(PathBuf::from("/photos/b.jpg"), 1.0, &mut rng);
        assert_ne!(a, b);
        assert_eq!(album.select(a), None, "stale key must not focus anything");
        assert_eq!(album.focused(), None);
        assert!(album.get(a).is_none());
        assert!(album.get(b).is_some());
    }

    #[test]
    fn re_adding_a_path_keeps_its_slot_and_updates_aspect() {
        let mut rng = StdRng::seed_from_u64(37);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.0, &mut rng);
        let again = album.add(PathBuf::from("/photos/a.jpg"), 2.0, &mut rng);
        assert_eq!(a, again);
        assert_eq!(album.len(), 1);
        assert_eq!(album.get(a).unwrap().aspect(), 2.0);
    }

    #[test]
    fn single_frame_layout_uses_slot_fraction_zero() {
        let mut rng = StdRng::seed_from_u64(38);
        let mut album = album(&mut rng);
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.0, &mut rng);
        // First tick snaps the frame straight onto its orbit slot.
        album.tick(1.0 / 60.0, 0.0, 1.0, &camera());
        let frame = album.get(a).unwrap();
        // Fraction 0 pins y_base to the bottom of the band; only the bob
        // term moves it off exactly -tree_height/3.
        assert!((frame.position().y - (-4.0)).abs() < 0.6);
    }

    #[test]
    fn focused_frame_damps_toward_the_camera_line() {
        let mut rng = StdRng::seed_from_u64(39);
        let mut album = album(&mut rng);
        let camera = camera();
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.5, &mut rng);
        album.tick(1.0 / 60.0, 0.0, 1.0, &camera);
        album.select(a);
        for step in 0..600 {
            let time = step as f32 / 60.0;
            album.tick(1.0 / 60.0, time, 1.0, &camera);
        }
        let frame = album.get(a).unwrap();
        let expected = camera.eye + camera.forward() * 8.0;
        assert!(
            (frame.position() - expected).length() < 0.05,
            "focused frame should settle on the camera axis"
        );
        let expected_height = (camera.fov_y_radians / 2.0).tan() * 8.0 * 2.0 * 0.65;
        assert!((frame.scale().y - expected_height).abs() < 0.01);
        assert!((frame.scale().x - expected_height * 1.5).abs() < 0.02);
    }

    #[test]
    fn dust_fades_in_only_while_something_is_focused() {
        let mut rng = StdRng::seed_from_u64(40);
        let mut album = album(&mut rng);
        let camera = camera();
        let a = album.add(PathBuf::from("/photos/a.jpg"), 1.0, &mut rng);
        album.tick(1.0 / 60.0, 0.0, 0.0, &camera);
        assert!(album.dust().opacity() < 1e-3);

        album.select(a);
        for step in 0..240 {
            album.tick(1.0 / 60.0, step as f32 / 60.0, 0.0, &camera);
        }
        assert!(album.dust().opacity() > 0.9);

        album.clear_focus();
        for step in 0..600 {
            album.tick(1.0 / 60.0, step as f32 / 60.0, 0.0, &camera);
        }
        assert!(album.dust().opacity() < 0.01);
    }
}
