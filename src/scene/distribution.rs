use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

/// Spiral twist added to a cone sample's azimuth per unit of height, so
/// same-height points braid around the trunk instead of forming flat rings.
const CONE_SPIRAL_TWIST: f32 = 0.5;

/// Uniform volumetric sample inside a sphere of `radius` centered on the
/// origin. The radial fraction is the cube root of a uniform draw, which
/// compensates for shell volume growth; plain uniform radii would cluster
/// samples near the center.
///
/// Callers validate `radius > 0` before building a pool.
pub fn sample_sphere<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let theta = rng.random::<f32>() * TAU;
    let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
    let r = rng.random::<f32>().cbrt() * radius;
    Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos(),
    )
}

/// Sample inside a cone whose radius shrinks linearly from `max_radius` at
/// the base (y = `y_offset`) to zero at the apex (y = `y_offset + height`).
/// The radial fraction is area-uniform within the disk at the sampled
/// height, and the azimuth carries a height-proportional spiral bias.
pub fn sample_cone<R: Rng + ?Sized>(
    rng: &mut R,
    height: f32,
    max_radius: f32,
    y_offset: f32,
) -> Vec3 {
    let y = rng.random::<f32>() * height;
    let radius_at_y = max_radius * (height - y) / height;
    let r = rng.random::<f32>().sqrt() * radius_at_y;
    let theta = rng.random::<f32>() * TAU + y * CONE_SPIRAL_TWIST;
    Vec3::new(r * theta.cos(), y + y_offset, r * theta.sin())
}

/// Uniform sample on a flat annular ring at exactly height `y`. The radial
/// law interpolates the squared radii so density stays area-uniform across
/// the ring.
pub fn sample_annulus<R: Rng + ?Sized>(
    rng: &mut R,
    inner_radius: f32,
    outer_radius: f32,
    y: f32,
) -> Vec3 {
    let theta = rng.random::<f32>() * TAU;
    let r = (rng.random::<f32>() * (outer_radius * outer_radius - inner_radius * inner_radius)
        + inner_radius * inner_radius)
        .sqrt();
    Vec3::new(r * theta.cos(), y, r * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sphere_samples_stay_inside_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let p = sample_sphere(&mut rng, 25.0);
            assert!(p.length() <= 25.0 + 1e-4, "sample escaped sphere: {p:?}");
        }
    }

    #[test]
    fn sphere_radial_density_is_volumetric() {
        // Under the cube-root law, P(|p| <= r/2) = (1/2)^3 = 12.5%.
        let mut rng = StdRng::seed_from_u64(11);
        let total = 10_000;
        let inner = (0..total)
            .filter(|_| sample_sphere(&mut rng, 10.0).length() <= 5.0)
            .count();
        let fraction = inner as f32 / total as f32;
        assert!(
            (fraction - 0.125).abs() < 0.02,
            "inner-half fraction {fraction} should be close to 0.125"
        );
    }

    #[test]
    fn cone_samples_respect_height_band_and_profile() {
        let mut rng = StdRng::seed_from_u64(3);
        let height = 12.0;
        let max_radius = 4.5;
        let y_offset = -6.0;
        for _ in 0..2000 {
            let p = sample_cone(&mut rng, height, max_radius, y_offset);
            assert!(p.y >= y_offset - 1e-4 && p.y <= y_offset + height + 1e-4);
            let local_y = p.y - y_offset;
            let envelope = max_radius * (height - local_y) / height;
            let radial = (p.x * p.x + p.z * p.z).sqrt();
            assert!(
                radial <= envelope + 1e-3,
                "radial {radial} outside cone envelope {envelope} at y {local_y}"
            );
        }
    }

    #[test]
    fn annulus_samples_sit_on_the_ring() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let p = sample_annulus(&mut rng, 2.0, 6.0, -6.0);
            assert_eq!(p.y, -6.0);
            let radial = (p.x * p.x + p.z * p.z).sqrt();
            assert!((2.0 - 1e-4..=6.0 + 1e-4).contains(&radial));
        }
    }
}
