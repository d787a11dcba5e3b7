pub mod mesh;
pub mod stages;
pub mod viewer;
