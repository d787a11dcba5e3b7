pub mod config;
pub mod events;
pub mod render;
pub mod scene;
pub mod tasks {
    pub mod library;
}
