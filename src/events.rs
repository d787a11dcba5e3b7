use std::path::PathBuf;

/// A decoded, orientation-corrected, pre-resized photo ready for GPU upload.
#[derive(Debug, Clone)]
pub struct PreparedPhotoCpu {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows.
    pub pixels: Vec<u8>,
}

impl PreparedPhotoCpu {
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Library task to viewer: the photo pool changed on disk.
#[derive(Debug)]
pub enum PhotoEvent {
    Added(PreparedPhotoCpu),
    Removed(PathBuf),
}

/// Out-of-band control for the viewer (signals, future remotes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    ToggleFormation,
}
