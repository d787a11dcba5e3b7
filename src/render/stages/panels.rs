use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use slotmap::SecondaryMap;
use wgpu::util::DeviceExt;

use crate::events::PreparedPhotoCpu;
use crate::render::stages::{self, DEPTH_FORMAT, SharedCamera};
use crate::scene::album::{PhotoAlbum, PhotoKey};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PanelVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PanelInstanceRaw {
    model: [[f32; 4]; 4],
}

/// Matches the pick margin in the album: the gold border extends the quad
/// 10% past the photo on each axis.
const BORDER_SCALE: f32 = 1.1;

const QUAD: [PanelVertex; 6] = [
    PanelVertex { position: [-0.5, -0.5], uv: [0.0, 1.0] },
    PanelVertex { position: [0.5, -0.5], uv: [1.0, 1.0] },
    PanelVertex { position: [0.5, 0.5], uv: [1.0, 0.0] },
    PanelVertex { position: [-0.5, -0.5], uv: [0.0, 1.0] },
    PanelVertex { position: [0.5, 0.5], uv: [1.0, 0.0] },
    PanelVertex { position: [-0.5, 0.5], uv: [0.0, 0.0] },
];

struct PanelTexture {
    _texture: wgpu::Texture,
    bind: wgpu::BindGroup,
}

/// Textured photo quads, one draw per frame so each can bind its own
/// texture. Poses come from the album every frame; textures are uploaded
/// once when the library task delivers the decoded photo.
pub struct PanelStage {
    pipeline: wgpu::RenderPipeline,
    quad: wgpu::Buffer,
    sampler: wgpu::Sampler,
    texture_layout: wgpu::BindGroupLayout,
    textures: SecondaryMap<PhotoKey, PanelTexture>,
    instances: Option<wgpu::Buffer>,
    draws: Vec<PhotoKey>,
}

impl PanelStage {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera: &SharedCamera,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("panel-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/panel.wgsl"
            ))),
        });
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("panel-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("panel-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("panel-texture-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("panel-pipeline-layout"),
            bind_group_layouts: &[&camera.layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("panel-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<PanelVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<PanelInstanceRaw>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4
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
            quad,
            sampler,
            texture_layout,
            textures: SecondaryMap::new(),
            instances: None,
            draws: Vec::new(),
        }
    }

    pub fn add_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        key: PhotoKey,
        photo: &PreparedPhotoCpu,
    ) {
        let size = wgpu::Extent3d {
            width: photo.width.max(1),
            height: photo.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("panel-photo"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &photo.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("panel-photo-bind"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.textures.insert(
            key,
            PanelTexture {
                _texture: texture,
                bind,
            },
        );
    }

    pub fn remove_texture(&mut self, key: PhotoKey) {
        self.textures.remove(key);
    }

    /// Rebuilds the per-frame instance list from the album's current poses.
    /// Frames whose texture has not arrived yet are skipped, not drawn blank.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, album: &PhotoAlbum) {
        self.draws.clear();
        let mut raws = Vec::with_capacity(album.len());
        for (key, frame) in album.iter() {
            if !self.textures.contains_key(key) {
                continue;
            }
            let scale = frame.scale();
            let model = Mat4::from_scale_rotation_translation(
                Vec3::new(scale.x * BORDER_SCALE, scale.y * BORDER_SCALE, 1.0),
                frame.orientation(),
                frame.position(),
            );
            raws.push(PanelInstanceRaw {
                model: model.to_cols_array_2d(),
            });
            self.draws.push(key);
        }
        stages::upload_instances(
            device,
            queue,
            "panel-instances",
            &mut self.instances,
            bytemuck::cast_slice(&raws),
        );
    }

    pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, camera: &SharedCamera) {
        let Some(instances) = self.instances.as_ref() else {
            return;
        };
        if self.draws.is_empty() {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &camera.bind, &[]);
        rpass.set_vertex_buffer(0, self.quad.slice(..));
        rpass.set_vertex_buffer(1, instances.slice(..));
        for (i, key) in self.draws.iter().enumerate() {
            let Some(texture) = self.textures.get(*key) else {
                continue;
            };
            rpass.set_bind_group(1, &texture.bind, &[]);
            let i = i as u32;
            rpass.draw(0..QUAD.len() as u32, i..i + 1);
        }
    }
}
