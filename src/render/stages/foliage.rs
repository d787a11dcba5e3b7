use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::render::stages::{DEPTH_FORMAT, SharedCamera};
use crate::scene::foliage::{DeviceAnimatedSet, FoliageGlobals, FoliageInstanceRaw};

/// Local-space quad vertex. Two width segments so a spine vertex exists at
/// x = 0 for the wing pinch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 3],
}

const QUAD_SIZE: f32 = 0.25;

fn quad_grid() -> (Vec<QuadVertex>, Vec<u32>) {
    let h = QUAD_SIZE / 2.0;
    let xs = [-h, 0.0, h];
    let ys = [-h, h];
    let vertices = ys
        .iter()
        .flat_map(|y| xs.iter().map(|x| QuadVertex { position: [*x, *y, 0.0] }))
        .collect();
    let mut indices = Vec::new();
    for column in 0..2u32 {
        let a = column;
        let b = column + 1;
        let c = column + 3;
        let d = column + 4;
        indices.extend_from_slice(&[a, b, c, b, d, c]);
    }
    (vertices, indices)
}

/// The device-animated foliage batch. Instance attributes are uploaded once
/// at creation; per frame only the two shared scalars move.
pub struct FoliageStage {
    pipeline: wgpu::RenderPipeline,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    instances: wgpu::Buffer,
    instance_count: u32,
    globals_buf: wgpu::Buffer,
    globals_bind: wgpu::BindGroup,
}

impl FoliageStage {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera: &SharedCamera,
        set: &DeviceAnimatedSet,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("foliage-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/foliage.wgsl"
            ))),
        });

        let (vertices, indices) = quad_grid();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("foliage-quad-vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("foliage-quad-indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("foliage-instances"),
            contents: bytemuck::cast_slice(set.instances()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("foliage-globals"),
            size: std::mem::size_of::<FoliageGlobals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("foliage-globals-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("foliage-globals-bind"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("foliage-pipeline-layout"),
            bind_group_layouts: &[&camera.layout, &globals_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("foliage-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<FoliageInstanceRaw>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            1 => Float32x4, 2 => Float32x4, 3 => Float32x4
                        ],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
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
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex,
            index,
            index_count: indices.len() as u32,
            instances,
            instance_count: set.len() as u32,
            globals_buf,
            globals_bind,
        }
    }

    /// The entire host-to-device traffic for the category after creation.
    pub fn upload_globals(&self, queue: &wgpu::Queue, globals: FoliageGlobals) {
        queue.write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));
    }

    pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, camera: &SharedCamera) {
        if self.instance_count == 0 {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &camera.bind, &[]);
        rpass.set_bind_group(1, &self.globals_bind, &[]);
        rpass.set_vertex_buffer(0, self.vertex.slice(..));
        rpass.set_vertex_buffer(1, self.instances.slice(..));
        rpass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..self.instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_has_a_spine_column() {
        let (vertices, indices) = quad_grid();
        assert_eq!(vertices.len(), 6);
        assert_eq!(indices.len(), 12);
        assert!(vertices.iter().any(|v| v.position[0] == 0.0));
        assert!(indices.iter().all(|i| (*i as usize) < vertices.len()));
    }
}
