pub mod dust;
pub mod foliage;
pub mod panels;
pub mod rigid;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene::camera::CameraPose;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame camera uniform shared by every stage at bind group 0. The
/// right/up/forward basis feeds the camera-anchored billboards (dust).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraRaw {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
    pub forward: [f32; 4],
}

impl CameraRaw {
    pub fn from_pose(pose: &CameraPose, aspect: f32) -> Self {
        let forward = pose.forward();
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let up = right.cross(forward);
        Self {
            view_proj: pose.view_projection(aspect).to_cols_array_2d(),
            eye: pose.eye.extend(1.0).to_array(),
            right: right.extend(0.0).to_array(),
            up: up.extend(0.0).to_array(),
            forward: forward.extend(0.0).to_array(),
        }
    }
}

/// The camera uniform buffer and its bind group, created once and written
/// every frame before any stage encodes.
pub struct SharedCamera {
    buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind: wgpu::BindGroup,
}

impl SharedCamera {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-camera-uniforms"),
            size: std::mem::size_of::<CameraRaw>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-camera-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene-camera-bind"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            buffer,
            layout,
            bind,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, pose: &CameraPose, aspect: f32) {
        queue.write_buffer(
            &self.buffer,
            0,
            bytemuck::bytes_of(&CameraRaw::from_pose(pose, aspect)),
        );
    }
}

/// Grow-or-write instance buffer upload, shared by the per-frame batches.
pub fn upload_instances(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    buffer: &mut Option<wgpu::Buffer>,
    bytes: &[u8],
) {
    let required = bytes.len() as u64;
    if required == 0 {
        return;
    }
    match buffer {
        Some(buf) if buf.size() >= required => {
            queue.write_buffer(buf, 0, bytes);
        }
        _ => {
            let buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: required,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            queue.write_buffer(&buf, 0, bytes);
            *buffer = Some(buf);
        }
    }
}
