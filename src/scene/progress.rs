use glam::{Quat, Vec3};
use serde::Deserialize;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Formation {
    Scattered,
    Tree,
}

impl Formation {
    pub fn target(self) -> f32 {
        match self {
            Formation::Scattered => 0.0,
            Formation::Tree => 1.0,
        }
    }

    pub fn toggled(self) -> Formation {
        match self {
            Formation::Scattered => Formation::Tree,
            Formation::Tree => Formation::Scattered,
        }
    }
}

/// Exponential step toward `target`: first-order smoothing with time
/// constant `smoothing` seconds. A single decaying pole cannot overshoot,
/// and retargeting mid-flight continues from the current value, so every
/// formation and focus transition stays continuous across frames.
pub fn damp(value: f32, target: f32, smoothing: f32, dt: f32) -> f32 {
    value + (target - value) * (1.0 - (-dt / smoothing).exp())
}

pub fn damp_vec3(value: Vec3, target: Vec3, smoothing: f32, dt: f32) -> Vec3 {
    value + (target - value) * (1.0 - (-dt / smoothing).exp())
}

pub fn damp_quat(value: Quat, target: Quat, smoothing: f32, dt: f32) -> Quat {
    value.slerp(target, 1.0 - (-dt / smoothing).exp())
}

/// The shared formation scalar. One instance drives every entity category
/// so the whole scene morphs in lockstep; entity updaters read the value,
/// only the scene driver ticks it.
#[derive(Debug, Clone, Copy)]
pub struct ProgressState {
    value: f32,
    formation: Formation,
    smoothing: f32,
}

impl ProgressState {
    /// Starts settled at `formation`'s target so a fresh scene does not
    /// morph until asked.
    pub fn new(formation: Formation, smoothing: f32) -> Self {
        Self {
            value: formation.target(),
            formation,
            smoothing,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn formation(&self) -> Formation {
        self.formation
    }

    pub fn set_formation(&mut self, formation: Formation) {
        self.formation = formation;
    }

    pub fn toggle(&mut self) -> Formation {
        self.formation = self.formation.toggled();
        self.formation
    }

    pub fn tick(&mut self, dt: f32) -> f32 {
        self.value = damp(self.value, self.formation.target(), self.smoothing, dt);
        self.value
    }
}
