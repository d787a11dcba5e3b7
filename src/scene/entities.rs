use std::f32::consts::{PI, TAU};

use anyhow::{Result, ensure};
use glam::Vec3;
use rand::Rng;

use crate::scene::distribution::{sample_annulus, sample_cone, sample_sphere};
use crate::scene::palette;

/// The two formations' shared geometry: a cone of `tree_height` and base
/// `tree_radius` centered vertically on the origin, inside a scatter cloud
/// of `scatter_radius`. Validated once; everything downstream trusts it.
#[derive(Debug, Clone, Copy)]
pub struct FormationSpace {
    pub tree_height: f32,
    pub tree_radius: f32,
    pub scatter_radius: f32,
}

impl FormationSpace {
    pub fn new(tree_height: f32, tree_radius: f32, scatter_radius: f32) -> Result<Self> {
        ensure!(
            tree_height.is_finite() && tree_height > 0.0,
            "tree-height must be a positive number"
        );
        ensure!(
            tree_radius.is_finite() && tree_radius > 0.0,
            "tree-radius must be a positive number"
        );
        ensure!(
            scatter_radius.is_finite() && scatter_radius > 0.0,
            "scatter-radius must be a positive number"
        );
        Ok(Self {
            tree_height,
            tree_radius,
            scatter_radius,
        })
    }

    /// Ground plane of the tree (cone base, gift resting height).
    pub fn floor_y(&self) -> f32 {
        -self.tree_height / 2.0
    }

    /// Cone radius at a world-space height, clamped to zero above the apex.
    pub fn cone_radius_at(&self, y: f32) -> f32 {
        let local = y - self.floor_y();
        (self.tree_radius * (self.tree_height - local) / self.tree_height).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrnamentShape {
    Ball,
    Cube,
    Tetrahedron,
}

/// A rigid bauble. All fields are frozen at creation; the per-frame
/// transform is derived from them plus the shared progress.
#[derive(Debug, Clone, Copy)]
pub struct Ornament {
    pub scatter: Vec3,
    pub target: Vec3,
    pub base_rotation: Vec3,
    pub scale: f32,
    pub color: [f32; 4],
}

/// Ornaments grouped by mesh, one instanced batch per shape.
#[derive(Debug, Clone, Default)]
pub struct OrnamentPool {
    pub balls: Vec<Ornament>,
    pub cubes: Vec<Ornament>,
    pub tetrahedra: Vec<Ornament>,
}

impl OrnamentPool {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize, space: &FormationSpace) -> Self {
        let mut pool = OrnamentPool::default();
        for _ in 0..count {
            let shape_draw: f32 = rng.random();
            let ornament = Ornament {
                scatter: sample_sphere(rng, space.scatter_radius * 0.8),
                target: sample_cone(
                    rng,
                    space.tree_height,
                    space.tree_radius * 1.1,
                    space.floor_y(),
                ),
                base_rotation: Vec3::new(
                    rng.random::<f32>() * PI,
                    rng.random::<f32>() * PI,
                    rng.random::<f32>() * PI,
                ),
                scale: rng.random::<f32>() * 0.3 + 0.15,
                color: palette::linear_rgba(
                    palette::ORNAMENT_CHOICES
                        [rng.random_range(0..palette::ORNAMENT_CHOICES.len())],
                ),
            };
            if shape_draw < 0.33 {
                pool.balls.push(ornament);
            } else if shape_draw < 0.66 {
                pool.cubes.push(ornament);
            } else {
                pool.tetrahedra.push(ornament);
            }
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.balls.len() + self.cubes.len() + self.tetrahedra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A wrapped box that settles on the floor ring around the trunk. The
/// target height is lifted by half the box height at creation so the box
/// rests on the ground instead of intersecting it.
#[derive(Debug, Clone, Copy)]
pub struct Gift {
    pub scatter: Vec3,
    pub target: Vec3,
    pub base_rotation: Vec3,
    pub dims: Vec3,
    pub upright_yaw: f32,
    pub color: [f32; 4],
}

pub fn generate_gifts<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    space: &FormationSpace,
) -> Vec<Gift> {
    (0..count)
        .map(|index| {
            let scatter = sample_sphere(rng, space.scatter_radius);
            let ring = sample_annulus(
                rng,
                space.tree_radius * 0.5,
                space.tree_radius * 1.5,
                space.floor_y(),
            );
            let dims = Vec3::new(
                0.8 + rng.random::<f32>() * 0.6,
                0.5 + rng.random::<f32>() * 0.8,
                0.8 + rng.random::<f32>() * 0.6,
            );
            let target = Vec3::new(ring.x, ring.y + dims.y / 2.0, ring.z);
            Gift {
                scatter,
                target,
                base_rotation: Vec3::new(
                    rng.random::<f32>() * PI,
                    rng.random::<f32>() * PI,
                    rng.random::<f32>() * PI,
                ),
                dims,
                upright_yaw: target.x,
                color: palette::linear_rgba(
                    palette::GIFT_CYCLE[index % palette::GIFT_CYCLE.len()],
                ),
            }
        })
        .collect()
}

/// The star topper. One entity; its scale pops from 0.5 to 1.2 as the
/// tree forms.
#[derive(Debug, Clone, Copy)]
pub struct Topper {
    pub scatter: Vec3,
    pub target: Vec3,
}

pub fn generate_topper<R: Rng + ?Sized>(rng: &mut R, space: &FormationSpace) -> Topper {
    Topper {
        scatter: sample_sphere(rng, space.scatter_radius),
        target: Vec3::new(0.0, space.tree_height / 2.0 + 1.0, 0.0),
    }
}

/// Frozen per-instance inputs for the device-animated foliage batch.
#[derive(Debug, Clone, Copy)]
pub struct FoliageSeed {
    pub scatter: Vec3,
    pub target: Vec3,
    pub seed: f32,
    pub rotation_axis: Vec3,
    pub rotation_angle: f32,
}

pub fn generate_foliage<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    space: &FormationSpace,
) -> Vec<FoliageSeed> {
    (0..count)
        .map(|_| FoliageSeed {
            scatter: sample_sphere(rng, space.scatter_radius),
            target: sample_cone(rng, space.tree_height, space.tree_radius, space.floor_y()),
            seed: rng.random(),
            rotation_axis: random_axis(rng),
            rotation_angle: rng.random::<f32>() * TAU,
        })
        .collect()
}

fn random_axis<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let v = Vec3::new(
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
    );
    v.normalize_or(Vec3::Y)
}

/// Every entity category, generated in one pass from validated dimensions.
#[derive(Debug, Clone)]
pub struct ScenePools {
    pub space: FormationSpace,
    pub foliage: Vec<FoliageSeed>,
    pub ornaments: OrnamentPool,
    pub gifts: Vec<Gift>,
    pub topper: Topper,
}

impl ScenePools {
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        space: FormationSpace,
        foliage_count: usize,
        ornament_count: usize,
        gift_count: usize,
    ) -> Result<Self> {
        ensure!(foliage_count > 0, "foliage-count must be greater than zero");
        ensure!(
            ornament_count > 0,
            "ornament-count must be greater than zero"
        );
        ensure!(gift_count > 0, "gift-count must be greater than zero");
        Ok(Self {
            space,
            foliage: generate_foliage(rng, foliage_count, &space),
            ornaments: OrnamentPool::generate(rng, ornament_count, &space),
            gifts: generate_gifts(rng, gift_count, &space),
            topper: generate_topper(rng, &space),
        })
    }
}
