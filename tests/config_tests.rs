use std::path::PathBuf;
use std::time::Duration;

use rust_memory_tree::config::Configuration;
use rust_memory_tree::scene::progress::Formation;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
photo-library-path: "/photos"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.photo_library_path, PathBuf::from("/photos"));
    assert_eq!(cfg.foliage_count, 900);
    assert_eq!(cfg.ornament_count, 400);
    assert_eq!(cfg.gift_count, 12);
    assert_eq!(cfg.startup_formation, Formation::Scattered);
}

#[test]
fn parse_with_humantime_durations() {
    let yaml = r#"
photo-library-path: "/photos"
formation-smoothing: 2s
focus-smoothing: 450ms
photo-debounce: 1s 500ms
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.formation_smoothing, Duration::from_secs(2));
    assert_eq!(cfg.focus_smoothing, Duration::from_millis(450));
    assert_eq!(cfg.photo_debounce, Duration::from_millis(1500));
}

#[test]
fn parse_with_tree_dimensions_and_startup_formation() {
    let yaml = r#"
photo-library-path: "/photos"
tree-height: 15.0
tree-radius: 5.0
scatter-radius: 30.0
startup-formation: tree
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.tree_height, 15.0);
    assert_eq!(cfg.tree_radius, 5.0);
    assert_eq!(cfg.scatter_radius, 30.0);
    assert_eq!(cfg.startup_formation, Formation::Tree);
}

#[test]
fn unknown_fields_are_rejected() {
    let yaml = r#"
photo-library-path: "/photos"
photo-libary-path: "/typo"
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn validation_requires_a_library_path() {
    let cfg = Configuration::default();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("photo-library-path"));
}

#[test]
fn validation_rejects_zero_counts() {
    let yaml = r#"
photo-library-path: "/photos"
foliage-count: 0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("foliage-count"));
}

#[test]
fn validation_rejects_degenerate_geometry() {
    let yaml = r#"
photo-library-path: "/photos"
tree-height: -2.0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("tree-height"));
}

#[test]
fn validation_rejects_out_of_range_focus_fraction() {
    let yaml = r#"
photo-library-path: "/photos"
focus-height-fraction: 1.5
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("focus-height-fraction"));
}

#[test]
fn validation_rejects_zero_smoothing() {
    let yaml = r#"
photo-library-path: "/photos"
formation-smoothing: 0s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("formation-smoothing"));
}

#[test]
fn full_config_round_trips_through_a_file() {
    let yaml = r#"
photo-library-path: "/var/lib/memory-tree/photos"
foliage-count: 600
ornament-count: 250
gift-count: 8
max-photo-dimension: 1024
focus-distance: 6.5
"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();

    let cfg = Configuration::from_yaml_file(&path)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.foliage_count, 600);
    assert_eq!(cfg.ornament_count, 250);
    assert_eq!(cfg.gift_count, 8);
    assert_eq!(cfg.max_photo_dimension, 1024);
    assert_eq!(cfg.focus_distance, 6.5);
}
