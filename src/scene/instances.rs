use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::scene::entities::{Gift, Ornament, ScenePools, Topper};
use crate::scene::palette;
use crate::scene::progress::lerp;

/// Per-instance data uploaded for the rigid categories. Must match the
/// instanced vertex layout in the rigid shader exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RigidInstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

/// Decomposed world transform for one entity at one instant. Kept as
/// position/rotation/scale so tests can assert on components before the
/// matrix is composed.
#[derive(Debug, Clone, Copy)]
pub struct EntityTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl EntityTransform {
    pub fn to_raw(&self, color: [f32; 4]) -> RigidInstanceRaw {
        RigidInstanceRaw {
            model: Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
                .to_cols_array_2d(),
            color,
        }
    }
}

/// Ornament pose: lerped position with an x/y float that settles as the
/// tree forms, plus a shared-rate spin on all three base Euler angles.
/// `index` is the slot within the shape batch and desynchronizes the float
/// phases.
pub fn ornament_transform(
    ornament: &Ornament,
    index: usize,
    progress: f32,
    time: f32,
) -> EntityTransform {
    let i = index as f32;
    let amp = lerp(1.5, 0.05, progress);
    let float = Vec3::new(
        (time * 0.5 + i).sin() * amp,
        (time * 0.3 + i * 2.0).cos() * amp,
        0.0,
    );
    let spin = time * lerp(0.5, 0.2, progress);
    EntityTransform {
        position: ornament.scatter.lerp(ornament.target, progress) + float,
        rotation: Quat::from_euler(
            EulerRot::XYZ,
            ornament.base_rotation.x + spin,
            ornament.base_rotation.y + spin,
            ornament.base_rotation.z + spin,
        ),
        scale: Vec3::splat(ornament.scale),
    }
}

/// Gift pose: y-only bob that dies out completely at full progress, and a
/// per-axis blend from free tumbling to resting upright with a stable
/// pseudo-random yaw.
pub fn gift_transform(gift: &Gift, index: usize, progress: f32, time: f32) -> EntityTransform {
    let i = index as f32;
    let amp = lerp(1.0, 0.0, progress);
    let float_y = (time + i).sin() * amp;
    let rotation = Quat::from_euler(
        EulerRot::XYZ,
        lerp(gift.base_rotation.x + time, 0.0, progress),
        lerp(gift.base_rotation.y + time, gift.upright_yaw, progress),
        lerp(gift.base_rotation.z + time, 0.0, progress),
    );
    EntityTransform {
        position: gift.scatter.lerp(gift.target, progress) + Vec3::new(0.0, float_y, 0.0),
        rotation,
        scale: gift.dims,
    }
}

/// Topper pose: the spin never stops, it only slows, and the scale pops
/// from 0.5 to 1.2 as the star reaches the apex.
pub fn topper_transform(topper: &Topper, progress: f32, time: f32) -> EntityTransform {
    let amp = lerp(1.0, 0.05, progress);
    let yaw = time * lerp(2.0, 0.8, progress);
    let tilt = (time * 0.5).sin() * 0.05;
    EntityTransform {
        position: topper.scatter.lerp(topper.target, progress)
            + Vec3::new(0.0, time.sin() * amp, 0.0),
        rotation: Quat::from_euler(EulerRot::XYZ, 0.0, yaw, tilt),
        scale: Vec3::splat(lerp(0.5, 1.2, progress)),
    }
}

/// Host-side instance buffers for every rigid batch, recomputed in place
/// each frame and re-uploaded whole; nothing in here is assumed static
/// between frames.
#[derive(Debug, Default)]
pub struct RigidInstances {
    pub balls: Vec<RigidInstanceRaw>,
    pub cubes: Vec<RigidInstanceRaw>,
    pub tetrahedra: Vec<RigidInstanceRaw>,
    pub gifts: Vec<RigidInstanceRaw>,
    pub topper: Vec<RigidInstanceRaw>,
    topper_color: [f32; 4],
}

impl RigidInstances {
    pub fn new(pools: &ScenePools) -> Self {
        Self {
            balls: Vec::with_capacity(pools.ornaments.balls.len()),
            cubes: Vec::with_capacity(pools.ornaments.cubes.len()),
            tetrahedra: Vec::with_capacity(pools.ornaments.tetrahedra.len()),
            gifts: Vec::with_capacity(pools.gifts.len()),
            topper: Vec::with_capacity(1),
            topper_color: palette::linear_rgba(palette::GOLD_METALLIC),
        }
    }

    pub fn tick(&mut self, pools: &ScenePools, progress: f32, time: f32) {
        fill_ornaments(&mut self.balls, &pools.ornaments.balls, progress, time);
        fill_ornaments(&mut self.cubes, &pools.ornaments.cubes, progress, time);
        fill_ornaments(
            &mut self.tetrahedra,
            &pools.ornaments.tetrahedra,
            progress,
            time,
        );

        self.gifts.clear();
        self.gifts.extend(
            pools
                .gifts
                .iter()
                .enumerate()
                .map(|(i, gift)| gift_transform(gift, i, progress, time).to_raw(gift.color)),
        );

        self.topper.clear();
        self.topper
            .push(topper_transform(&pools.topper, progress, time).to_raw(self.topper_color));
    }

    pub fn ornament_len(&self) -> usize {
        self.balls.len() + self.cubes.len() + self.tetrahedra.len()
    }
}

fn fill_ornaments(
    raws: &mut Vec<RigidInstanceRaw>,
    ornaments: &[Ornament],
    progress: f32,
    time: f32,
) {
    raws.clear();
    raws.extend(
        ornaments
            .iter()
            .enumerate()
            .map(|(i, o)| ornament_transform(o, i, progress, time).to_raw(o.color)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::entities::FormationSpace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_ornament() -> Ornament {
        Ornament {
            scatter: Vec3::new(10.0, -3.0, 4.0),
            target: Vec3::new(1.0, 2.0, -0.5),
            base_rotation: Vec3::new(0.3, 1.1, 2.0),
            scale: 0.25,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn ornament_endpoints_are_pure_functions_of_the_frozen_points() {
        let ornament = sample_ornament();
        let time = 3.7;

        let scattered = ornament_transform(&ornament, 5, 0.0, time);
        let i = 5.0f32;
        let expected_float = Vec3::new(
            (time * 0.5 + i).sin() * 1.5,
            (time * 0.3 + i * 2.0).cos() * 1.5,
            0.0,
        );
        assert!(
            (scattered.position - (ornament.scatter + expected_float)).length() < 1e-5,
            "at progress 0 the position must derive from the scatter point alone"
        );

        let formed = ornament_transform(&ornament, 5, 1.0, time);
        let expected_float = Vec3::new(
            (time * 0.5 + i).sin() * 0.05,
            (time * 0.3 + i * 2.0).cos() * 0.05,
            0.0,
        );
        assert!((formed.position - (ornament.target + expected_float)).length() < 1e-5);
    }

    #[test]
    fn gift_sits_upright_and_still_at_full_progress() {
        let gift = Gift {
            scatter: Vec3::new(-8.0, 6.0, 2.0),
            target: Vec3::new(3.0, -5.6, 1.0),
            base_rotation: Vec3::new(1.0, 2.0, 3.0),
            dims: Vec3::new(1.0, 0.8, 1.2),
            upright_yaw: 3.0,
            color: [1.0, 0.0, 0.0, 1.0],
        };
        let formed = gift_transform(&gift, 2, 1.0, 12.3);
        assert!((formed.position - gift.target).length() < 1e-5);
        let upright = Quat::from_euler(EulerRot::XYZ, 0.0, gift.upright_yaw, 0.0);
        assert!(formed.rotation.angle_between(upright) < 1e-4);
        assert_eq!(formed.scale, gift.dims);
    }

    #[test]
    fn topper_keeps_spinning_at_full_progress() {
        let topper = Topper {
            scatter: Vec3::new(4.0, 9.0, -2.0),
            target: Vec3::new(0.0, 7.0, 0.0),
        };
        let a = topper_transform(&topper, 1.0, 10.0);
        let b = topper_transform(&topper, 1.0, 10.5);
        assert!(
            a.rotation.angle_between(b.rotation) > 0.1,
            "the star should still rotate once the tree is formed"
        );
        assert!((a.scale.x - 1.2).abs() < 1e-6);
        let scattered = topper_transform(&topper, 0.0, 10.0);
        assert!((scattered.scale.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn update_refreshes_every_batch_slot() {
        let mut rng = StdRng::seed_from_u64(9);
        let pools = ScenePools::generate(
            &mut rng,
            FormationSpace::new(12.0, 4.5, 25.0).unwrap(),
            50,
            40,
            12,
        )
        .unwrap();
        let mut instances = RigidInstances::new(&pools);
        instances.tick(&pools, 0.5, 2.0);
        assert_eq!(instances.balls.len(), pools.ornaments.balls.len());
        assert_eq!(instances.cubes.len(), pools.ornaments.cubes.len());
        assert_eq!(instances.tetrahedra.len(), pools.ornaments.tetrahedra.len());
        assert_eq!(instances.gifts.len(), 12);
        assert_eq!(instances.topper.len(), 1);

        let before = instances.gifts[0].model;
        instances.tick(&pools, 0.5, 2.5);
        assert_ne!(
            before, instances.gifts[0].model,
            "instance matrices must be recomputed every tick"
        );
    }
}
