use crate::render::mesh::{self, Mesh, MeshVertex};
use crate::render::stages::{self, DEPTH_FORMAT, SharedCamera};
use crate::scene::instances::{RigidInstanceRaw, RigidInstances};

/// One instanced mesh plus its per-frame instance buffer.
struct Batch {
    mesh: Mesh,
    instances: Option<wgpu::Buffer>,
    count: u32,
    label: &'static str,
}

impl Batch {
    fn new(device: &wgpu::Device, label: &'static str, data: &mesh::MeshData) -> Self {
        Self {
            mesh: Mesh::upload(device, label, data),
            instances: None,
            count: 0,
            label,
        }
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, raws: &[RigidInstanceRaw]) {
        stages::upload_instances(
            device,
            queue,
            self.label,
            &mut self.instances,
            bytemuck::cast_slice(raws),
        );
        self.count = raws.len() as u32;
    }

    fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        let Some(instances) = self.instances.as_ref() else {
            return;
        };
        if self.count == 0 {
            return;
        }
        rpass.set_vertex_buffer(0, self.mesh.vertex.slice(..));
        rpass.set_vertex_buffer(1, instances.slice(..));
        rpass.set_index_buffer(self.mesh.index.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.mesh.index_count, 0, 0..self.count);
    }
}

/// Host-animated categories: ornaments by shape, gift boxes, and the star
/// topper. One pipeline, five instanced batches, instance matrices
/// re-uploaded whole every frame.
pub struct RigidStage {
    pipeline: wgpu::RenderPipeline,
    balls: Batch,
    cubes: Batch,
    tetrahedra: Batch,
    gifts: Batch,
    topper: Batch,
}

impl RigidStage {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera: &SharedCamera,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rigid-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/rigid.wgsl"
            ))),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rigid-pipeline-layout"),
            bind_group_layouts: &[&camera.layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rigid-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<MeshVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<RigidInstanceRaw>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4,
                            6 => Float32x4
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
            balls: Batch::new(device, "ornament-balls", &mesh::uv_sphere(1.0, 12, 18)),
            cubes: Batch::new(device, "ornament-cubes", &mesh::cube(1.5)),
            tetrahedra: Batch::new(device, "ornament-tetrahedra", &mesh::tetrahedron(1.2)),
            gifts: Batch::new(device, "gift-boxes", &mesh::cube(1.0)),
            topper: Batch::new(device, "topper-star", &mesh::star(1.2, 0.45, 0.15)),
        }
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, rigid: &RigidInstances) {
        self.balls.upload(device, queue, &rigid.balls);
        self.cubes.upload(device, queue, &rigid.cubes);
        self.tetrahedra.upload(device, queue, &rigid.tetrahedra);
        self.gifts.upload(device, queue, &rigid.gifts);
        self.topper.upload(device, queue, &rigid.topper);
    }

    pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, camera: &SharedCamera) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &camera.bind, &[]);
        self.balls.draw(rpass);
        self.cubes.draw(rpass);
        self.tetrahedra.draw(rpass);
        self.gifts.draw(rpass);
        self.topper.draw(rpass);
    }
}
