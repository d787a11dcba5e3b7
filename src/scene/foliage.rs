use bytemuck::{Pod, Zeroable};

use crate::scene::entities::FoliageSeed;

/// Frozen per-instance attributes for the foliage batch. Uploaded once at
/// creation; every per-frame displacement happens in the vertex shader.
/// The seed and rotation angle ride in the fourth component of the two
/// position attributes to keep the stride at three vec4s.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FoliageInstanceRaw {
    pub scatter_seed: [f32; 4],
    pub target_angle: [f32; 4],
    pub rotation_axis: [f32; 4],
}

/// Per-frame uniforms for the displacement shader. This is the entire
/// host-to-device traffic for the category once the instances are frozen.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FoliageGlobals {
    pub time: f32,
    pub progress: f32,
    pub _pad: [f32; 2],
}

/// The device-animated half of the instancing split: the host freezes the
/// attribute buffer at creation and afterwards only retargets two scalars
/// per frame, in contrast to the rigid categories whose matrices are
/// recomputed host-side every tick.
#[derive(Debug)]
pub struct DeviceAnimatedSet {
    instances: Vec<FoliageInstanceRaw>,
    globals: FoliageGlobals,
}

impl DeviceAnimatedSet {
    pub fn new(seeds: &[FoliageSeed]) -> Self {
        let instances = seeds
            .iter()
            .map(|seed| FoliageInstanceRaw {
                scatter_seed: [seed.scatter.x, seed.scatter.y, seed.scatter.z, seed.seed],
                target_angle: [
                    seed.target.x,
                    seed.target.y,
                    seed.target.z,
                    seed.rotation_angle,
                ],
                rotation_axis: [
                    seed.rotation_axis.x,
                    seed.rotation_axis.y,
                    seed.rotation_axis.z,
                    0.0,
                ],
            })
            .collect();
        Self {
            instances,
            globals: FoliageGlobals::zeroed(),
        }
    }

    pub fn tick(&mut self, progress: f32, time: f32) {
        self.globals.time = time;
        self.globals.progress = progress;
    }

    pub fn instances(&self) -> &[FoliageInstanceRaw] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn globals(&self) -> FoliageGlobals {
        self.globals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::entities::{FormationSpace, generate_foliage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn freezes_seed_data_into_instance_lanes() {
        let mut rng = StdRng::seed_from_u64(21);
        let space = FormationSpace::new(12.0, 4.5, 25.0).unwrap();
        let seeds = generate_foliage(&mut rng, 16, &space);
        let set = DeviceAnimatedSet::new(&seeds);
        assert_eq!(set.len(), 16);
        for (raw, seed) in set.instances().iter().zip(&seeds) {
            assert_eq!(raw.scatter_seed[3], seed.seed);
            assert_eq!(raw.target_angle[3], seed.rotation_angle);
            assert_eq!(raw.rotation_axis[3], 0.0);
        }
    }

    #[test]
    fn tick_only_moves_the_two_shared_scalars() {
        let mut rng = StdRng::seed_from_u64(22);
        let space = FormationSpace::new(12.0, 4.5, 25.0).unwrap();
        let seeds = generate_foliage(&mut rng, 4, &space);
        let mut set = DeviceAnimatedSet::new(&seeds);
        let frozen: Vec<_> = set.instances().to_vec();

        set.tick(0.75, 42.0);
        assert_eq!(
            set.globals(),
            FoliageGlobals {
                time: 42.0,
                progress: 0.75,
                _pad: [0.0; 2],
            }
        );
        for (after, before) in set.instances().iter().zip(&frozen) {
            assert_eq!(after.scatter_seed, before.scatter_seed);
            assert_eq!(after.target_angle, before.target_angle);
            assert_eq!(after.rotation_axis, before.rotation_axis);
        }
    }
}
