pub mod album;
pub mod camera;
pub mod distribution;
pub mod entities;
pub mod foliage;
pub mod instances;
pub mod palette;
pub mod progress;

use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::Configuration;
use self::album::{FocusChange, PhotoAlbum, PhotoKey};
use self::camera::{CameraPose, Ray};
use self::entities::{FormationSpace, ScenePools};
use self::foliage::DeviceAnimatedSet;
use self::instances::RigidInstances;
use self::progress::{Formation, ProgressState};

/// The whole animated scene minus the GPU: formation progress, the frozen
/// entity pools, the per-frame instance buffers, and the photo album. The
/// render loop owns one of these and calls [`SceneEngine::tick`] once per
/// frame before encoding draws.
pub struct SceneEngine {
    progress: ProgressState,
    pools: ScenePools,
    rigid: RigidInstances,
    foliage: DeviceAnimatedSet,
    album: PhotoAlbum,
    rng: StdRng,
    time: f32,
}

impl SceneEngine {
    pub fn new(config: &Configuration) -> Result<Self> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(config: &Configuration, mut rng: StdRng) -> Result<Self> {
        let space = FormationSpace::new(
            config.tree_height,
            config.tree_radius,
            config.scatter_radius,
        )?;
        let pools = ScenePools::generate(
            &mut rng,
            space,
            config.foliage_count,
            config.ornament_count,
            config.gift_count,
        )?;
        let rigid = RigidInstances::new(&pools);
        let foliage = DeviceAnimatedSet::new(&pools.foliage);
        let album = PhotoAlbum::new(
            space,
            config.focus_distance,
            config.focus_height_fraction,
            config.focus_smoothing.as_secs_f32(),
            config.formation_smoothing.as_secs_f32(),
            &mut rng,
        );
        let mut engine = Self {
            progress: ProgressState::new(
                config.startup_formation,
                config.formation_smoothing.as_secs_f32(),
            ),
            pools,
            rigid,
            foliage,
            album,
            rng,
            time: 0.0,
        };
        // Instance buffers hold the boot pose before the first frame ticks.
        engine.refresh_instances();
        Ok(engine)
    }

    /// Advances the scene by `dt` seconds. The progress scalar steps first;
    /// every entity category then reads the same post-step value, so no
    /// frame ever mixes two morph states.
    pub fn tick(&mut self, dt: f32, camera: &CameraPose) {
        self.time += dt;
        let progress = self.progress.tick(dt);
        self.rigid.tick(&self.pools, progress, self.time);
        self.foliage.tick(progress, self.time);
        self.album.tick(dt, self.time, progress, camera);
    }

    fn refresh_instances(&mut self) {
        let progress = self.progress.value();
        self.rigid.tick(&self.pools, progress, self.time);
        self.foliage.tick(progress, self.time);
    }

    pub fn toggle_formation(&mut self) -> Formation {
        self.progress.toggle()
    }

    pub fn set_formation(&mut self, formation: Formation) {
        self.progress.set_formation(formation);
    }

    pub fn formation(&self) -> Formation {
        self.progress.formation()
    }

    pub fn progress_value(&self) -> f32 {
        self.progress.value()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn add_photo(&mut self, path: PathBuf, aspect: f32) -> PhotoKey {
        self.album.add(path, aspect, &mut self.rng)
    }

    pub fn remove_photo(&mut self, path: &Path) -> Option<PhotoKey> {
        self.album.remove_by_path(path)
    }

    pub fn pick_photo(&self, ray: &Ray) -> Option<PhotoKey> {
        self.album.pick(ray)
    }

    pub fn select_photo(&mut self, key: PhotoKey) -> Option<FocusChange> {
        self.album.select(key)
    }

    pub fn clear_focus(&mut self) -> Option<FocusChange> {
        self.album.clear_focus()
    }

    pub fn album(&self) -> &PhotoAlbum {
        &self.album
    }

    pub fn pools(&self) -> &ScenePools {
        &self.pools
    }

    pub fn rigid(&self) -> &RigidInstances {
        &self.rigid
    }

    pub fn foliage(&self) -> &DeviceAnimatedSet {
        &self.foliage
    }

    pub fn space(&self) -> FormationSpace {
        self.pools.space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn engine(startup: Formation) -> SceneEngine {
        let config = Configuration {
            foliage_count: 50,
            ornament_count: 40,
            gift_count: 4,
            startup_formation: startup,
            ..Configuration::default()
        };
        SceneEngine::with_rng(&config, StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn boots_settled_in_the_startup_formation() {
        let scattered = engine(Formation::Scattered);
        assert_eq!(scattered.progress_value(), 0.0);
        let tree = engine(Formation::Tree);
        assert_eq!(tree.progress_value(), 1.0);
    }

    #[test]
    fn entities_see_the_post_step_progress() {
        let mut engine = engine(Formation::Scattered);
        engine.toggle_formation();
        engine.tick(0.25, &CameraPose::default());
        let progress = engine.progress_value();
        assert!(progress > 0.0);
        assert_eq!(engine.foliage().globals().progress, progress);
    }

    #[test]
    fn toggling_twice_returns_to_the_start() {
        let mut engine = engine(Formation::Scattered);
        assert_eq!(engine.toggle_formation(), Formation::Tree);
        assert_eq!(engine.toggle_formation(), Formation::Scattered);
    }

    #[test]
    fn instance_buffers_are_populated_before_the_first_tick() {
        let engine = engine(Formation::Tree);
        assert_eq!(
            engine.rigid().ornament_len(),
            engine.pools().ornaments.len()
        );
        assert_eq!(engine.foliage().len(), 50);
    }

    #[test]
    fn picking_hits_the_frame_under_the_cursor_ray() {
        let mut engine = engine(Formation::Tree);
        let camera = CameraPose::default();
        let key = engine.add_photo(PathBuf::from("/photos/a.jpg"), 1.5);
        engine.tick(1.0 / 60.0, &camera);

        let target = engine.album().get(key).unwrap().position();
        let ray = Ray {
            origin: camera.eye,
            direction: (target - camera.eye).normalize(),
        };
        assert_eq!(engine.pick_photo(&ray), Some(key));

        let miss = Ray {
            origin: camera.eye,
            direction: Vec3::Y,
        };
        assert_eq!(engine.pick_photo(&miss), None);
    }

    #[test]
    fn removing_a_photo_releases_focus_and_slot() {
        let mut engine = engine(Formation::Tree);
        let key = engine.add_photo(PathBuf::from("/photos/a.jpg"), 1.0);
        engine.select_photo(key);
        assert_eq!(engine.remove_photo(Path::new("/photos/a.jpg")), Some(key));
        assert!(engine.album().is_empty());
        assert_eq!(engine.album().focused(), None);
    }
}
