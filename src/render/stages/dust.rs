use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::render::stages::{DEPTH_FORMAT, SharedCamera};
use crate::scene::album::{DUST_ANCHOR_DISTANCE, DUST_COUNT, DustField};
use crate::scene::camera::CameraPose;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SpriteCorner {
    corner: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DustPoint {
    offset: [f32; 4],
}

/// xyz = anchor in front of the camera, w = global opacity.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DustUniforms {
    anchor: [f32; 4],
}

const CORNERS: [SpriteCorner; 6] = [
    SpriteCorner { corner: [-0.5, -0.5] },
    SpriteCorner { corner: [0.5, -0.5] },
    SpriteCorner { corner: [0.5, 0.5] },
    SpriteCorner { corner: [-0.5, -0.5] },
    SpriteCorner { corner: [0.5, 0.5] },
    SpriteCorner { corner: [-0.5, 0.5] },
];

/// Camera-anchored gold motes behind a focused photo. Additive sprites
/// whose whole-field opacity is the album's damped focus signal.
pub struct DustStage {
    pipeline: wgpu::RenderPipeline,
    corners: wgpu::Buffer,
    points: wgpu::Buffer,
    uniforms_buf: wgpu::Buffer,
    uniforms_bind: wgpu::BindGroup,
    opacity: f32,
}

impl DustStage {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera: &SharedCamera,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("dust-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/dust.wgsl"
            ))),
        });
        let corners = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dust-corners"),
            contents: bytemuck::cast_slice(&CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let points = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dust-points"),
            size: (DUST_COUNT * std::mem::size_of::<DustPoint>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniforms_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dust-uniforms"),
            size: std::mem::size_of::<DustUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("dust-uniforms-layout"),
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
        let uniforms_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("dust-uniforms-bind"),
            layout: &uniforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms_buf.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("dust-pipeline-layout"),
            bind_group_layouts: &[&camera.layout, &uniforms_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("dust-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SpriteCorner>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<DustPoint>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![1 => Float32x4],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent::OVER,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            corners,
            points,
            uniforms_buf,
            uniforms_bind,
            opacity: 0.0,
        }
    }

    /// Points drift every tick, so the whole (small) buffer is rewritten.
    pub fn upload(&mut self, queue: &wgpu::Queue, dust: &DustField, pose: &CameraPose) {
        self.opacity = dust.opacity();
        if self.opacity < 1e-3 {
            return;
        }
        let raws: Vec<DustPoint> = dust
            .points()
            .iter()
            .map(|p| DustPoint {
                offset: [p.x, p.y, p.z, 0.0],
            })
            .collect();
        queue.write_buffer(&self.points, 0, bytemuck::cast_slice(&raws));
        let anchor: Vec3 = pose.eye + pose.forward() * DUST_ANCHOR_DISTANCE;
        queue.write_buffer(
            &self.uniforms_buf,
            0,
            bytemuck::bytes_of(&DustUniforms {
                anchor: [anchor.x, anchor.y, anchor.z, self.opacity],
            }),
        );
    }

    pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, camera: &SharedCamera) {
        if self.opacity < 1e-3 {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &camera.bind, &[]);
        rpass.set_bind_group(1, &self.uniforms_bind, &[]);
        rpass.set_vertex_buffer(0, self.corners.slice(..));
        rpass.set_vertex_buffer(1, self.points.slice(..));
        rpass.draw(0..CORNERS.len() as u32, 0..DUST_COUNT as u32);
    }
}
