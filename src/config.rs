use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::scene::progress::Formation;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory to scan recursively for photos.
    pub photo_library_path: PathBuf,
    /// Number of GPU-animated foliage planes.
    pub foliage_count: usize,
    /// Number of rigid ornaments split across the three shapes.
    pub ornament_count: usize,
    /// Number of boxes on the floor ring.
    pub gift_count: usize,
    /// Cone height in world units.
    pub tree_height: f32,
    /// Cone base radius in world units.
    pub tree_radius: f32,
    /// Radius of the scattered cloud.
    pub scatter_radius: f32,
    /// Time constant of the formation morph.
    #[serde(with = "humantime_serde")]
    pub formation_smoothing: Duration,
    /// Time constant of the focus fly-in.
    #[serde(with = "humantime_serde")]
    pub focus_smoothing: Duration,
    /// Distance in front of the camera a focused photo settles at.
    pub focus_distance: f32,
    /// Fraction of the viewport height a focused photo covers.
    pub focus_height_fraction: f32,
    /// Long edge photos are downscaled to before upload.
    pub max_photo_dimension: u32,
    /// Quiet period after a filesystem burst before photos are reloaded.
    #[serde(with = "humantime_serde")]
    pub photo_debounce: Duration,
    /// Formation the scene boots into.
    pub startup_formation: Formation,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.photo_library_path.as_os_str().is_empty(),
            "photo-library-path must be set"
        );
        ensure!(
            self.foliage_count > 0,
            "foliage-count must be greater than zero"
        );
        ensure!(
            self.ornament_count > 0,
            "ornament-count must be greater than zero"
        );
        ensure!(self.gift_count > 0, "gift-count must be greater than zero");
        ensure!(
            self.tree_height.is_finite() && self.tree_height > 0.0,
            "tree-height must be a positive number"
        );
        ensure!(
            self.tree_radius.is_finite() && self.tree_radius > 0.0,
            "tree-radius must be a positive number"
        );
        ensure!(
            self.scatter_radius.is_finite() && self.scatter_radius > 0.0,
            "scatter-radius must be a positive number"
        );
        ensure!(
            self.formation_smoothing > Duration::ZERO,
            "formation-smoothing must be greater than zero"
        );
        ensure!(
            self.focus_smoothing > Duration::ZERO,
            "focus-smoothing must be greater than zero"
        );
        ensure!(
            self.focus_distance.is_finite() && self.focus_distance > 0.0,
            "focus-distance must be a positive number"
        );
        ensure!(
            self.focus_height_fraction > 0.0 && self.focus_height_fraction <= 1.0,
            "focus-height-fraction must be in (0, 1]"
        );
        ensure!(
            self.max_photo_dimension > 0,
            "max-photo-dimension must be greater than zero"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::new(),
            foliage_count: 900,
            ornament_count: 400,
            gift_count: 12,
            tree_height: 12.0,
            tree_radius: 4.5,
            scatter_radius: 25.0,
            formation_smoothing: Duration::from_millis(1500),
            focus_smoothing: Duration::from_millis(600),
            focus_distance: 8.0,
            focus_height_fraction: 0.65,
            max_photo_dimension: 1600,
            photo_debounce: Duration::from_millis(500),
            startup_formation: Formation::Scattered,
        }
    }
}
