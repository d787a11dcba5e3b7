use std::path::{Path, PathBuf};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use rust_memory_tree::config::Configuration;
use rust_memory_tree::scene::SceneEngine;
use rust_memory_tree::scene::camera::{CameraPose, OrbitCamera, Ray};
use rust_memory_tree::scene::progress::Formation;

const FRAME_DT: f32 = 1.0 / 60.0;

fn engine(startup: Formation) -> SceneEngine {
    let config = Configuration {
        foliage_count: 60,
        ornament_count: 45,
        gift_count: 6,
        startup_formation: startup,
        ..Configuration::default()
    };
    SceneEngine::with_rng(&config, StdRng::seed_from_u64(42)).unwrap()
}

fn run_seconds(engine: &mut SceneEngine, camera: &CameraPose, seconds: f32) {
    let steps = (seconds / FRAME_DT).round() as usize;
    for _ in 0..steps {
        engine.tick(FRAME_DT, camera);
    }
}

#[test]
fn one_smoothing_time_covers_sixty_three_percent_of_the_morph() {
    let mut engine = engine(Formation::Scattered);
    let camera = CameraPose::default();
    engine.toggle_formation();
    // Default smoothing is 1.5 s; after exactly that long the progress
    // should sit at 1 - 1/e.
    run_seconds(&mut engine, &camera, 1.5);
    let progress = engine.progress_value();
    assert!(
        (progress - 0.632).abs() < 0.005,
        "progress after one time constant was {progress}"
    );
}

#[test]
fn morph_settles_and_every_category_reads_the_same_scalar() {
    let mut engine = engine(Formation::Scattered);
    let camera = CameraPose::default();
    engine.toggle_formation();
    run_seconds(&mut engine, &camera, 15.0);
    let progress = engine.progress_value();
    assert!(progress > 0.999);
    assert_eq!(engine.foliage().globals().progress, progress);
    assert_eq!(engine.formation(), Formation::Tree);
}

#[test]
fn toggling_back_mid_morph_never_jumps() {
    let mut engine = engine(Formation::Scattered);
    let camera = CameraPose::default();
    engine.toggle_formation();
    run_seconds(&mut engine, &camera, 0.75);
    let mid = engine.progress_value();
    assert!(mid > 0.1 && mid < 0.9);

    engine.toggle_formation();
    engine.tick(FRAME_DT, &camera);
    let after = engine.progress_value();
    assert!(after < mid, "progress should head back down");
    assert!(
        mid - after < 0.05,
        "reversal must continue from the current value"
    );
}

#[test]
fn photo_lifecycle_survives_the_morph() {
    let mut engine = engine(Formation::Scattered);
    let camera = CameraPose::default();
    let a = engine.add_photo(PathBuf::from("/photos/a.jpg"), 1.5);
    let b = engine.add_photo(PathBuf::from("/photos/b.jpg"), 0.75);
    engine.tick(FRAME_DT, &camera);

    engine.select_photo(a);
    engine.toggle_formation();
    run_seconds(&mut engine, &camera, 5.0);

    // The focused frame tracks the camera line regardless of formation.
    let focused = engine.album().get(a).unwrap();
    let expected = camera.eye + camera.forward() * 8.0;
    assert!((focused.position() - expected).length() < 0.1);

    // The other frame keeps orbiting out in the scene.
    let orbiting = engine.album().get(b).unwrap();
    assert!((orbiting.position() - expected).length() > 1.0);

    assert_eq!(engine.remove_photo(Path::new("/photos/a.jpg")), Some(a));
    assert_eq!(engine.album().focused(), None);
    assert!(engine.album().get(b).is_some());
}

#[test]
fn picking_through_the_orbit_camera_finds_the_frame() {
    let mut engine = engine(Formation::Tree);
    let orbit = OrbitCamera::default();
    let pose = orbit.pose();
    let key = engine.add_photo(PathBuf::from("/photos/a.jpg"), 1.0);
    run_seconds(&mut engine, &pose, 1.0);

    let target = engine.album().get(key).unwrap().position();
    let ray = Ray {
        origin: pose.eye,
        direction: (target - pose.eye).normalize(),
    };
    assert_eq!(engine.pick_photo(&ray), Some(key));

    let miss = Ray {
        origin: pose.eye,
        direction: -pose.forward(),
    };
    assert_eq!(engine.pick_photo(&miss), None);
}

#[test]
fn dust_tracks_the_focus_state_through_the_engine() {
    let mut engine = engine(Formation::Tree);
    let camera = CameraPose::default();
    let key = engine.add_photo(PathBuf::from("/photos/a.jpg"), 1.0);
    run_seconds(&mut engine, &camera, 1.0);
    assert!(engine.album().dust().opacity() < 1e-3);

    engine.select_photo(key);
    run_seconds(&mut engine, &camera, 5.0);
    assert!(engine.album().dust().opacity() > 0.9);

    engine.clear_focus();
    run_seconds(&mut engine, &camera, 10.0);
    assert!(engine.album().dust().opacity() < 0.01);
}

#[test]
fn gifts_land_on_the_floor_once_the_tree_forms() {
    let mut engine = engine(Formation::Scattered);
    let camera = CameraPose::default();
    engine.toggle_formation();
    run_seconds(&mut engine, &camera, 20.0);

    let floor = engine.space().floor_y();
    for (gift, raw) in engine.pools().gifts.iter().zip(engine.rigid().gifts.iter()) {
        // Translation lives in the last matrix column.
        let translation = Vec3::new(raw.model[3][0], raw.model[3][1], raw.model[3][2]);
        assert!((translation - gift.target).length() < 0.05);
        let bottom = translation.y - gift.dims.y / 2.0;
        assert!((bottom - floor).abs() < 0.05);
    }
}
