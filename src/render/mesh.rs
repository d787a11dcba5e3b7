use std::f32::consts::{FRAC_PI_2, PI, TAU};

use bytemuck::{Pod, Zeroable};
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, VertexBuffers,
};
use wgpu::util::DeviceExt;

/// Lit mesh vertex shared by every rigid pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[derive(Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3]) {
        let base = self.vertices.len() as u32;
        for position in corners {
            self.vertices.push(MeshVertex { position, normal });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Uploaded mesh ready to bind.
pub struct Mesh {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
}

impl Mesh {
    pub fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: data.indices.len() as u32,
        }
    }
}

/// Axis-aligned box of the given edge length, flat-shaded.
pub fn cube(edge: f32) -> MeshData {
    let h = edge / 2.0;
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]],
        [0.0, 0.0, 1.0],
    );
    mesh.push_quad(
        [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]],
        [0.0, 0.0, -1.0],
    );
    mesh.push_quad(
        [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]],
        [1.0, 0.0, 0.0],
    );
    mesh.push_quad(
        [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]],
        [-1.0, 0.0, 0.0],
    );
    mesh.push_quad(
        [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]],
        [0.0, 1.0, 0.0],
    );
    mesh.push_quad(
        [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]],
        [0.0, -1.0, 0.0],
    );
    mesh
}

/// Latitude/longitude sphere with smooth normals.
pub fn uv_sphere(radius: f32, rings: u32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for ring in 0..=rings {
        let polar = PI * ring as f32 / rings as f32;
        let (sin_p, cos_p) = polar.sin_cos();
        for segment in 0..=segments {
            let azimuth = TAU * segment as f32 / segments as f32;
            let (sin_a, cos_a) = azimuth.sin_cos();
            let normal = [sin_p * cos_a, cos_p, sin_p * sin_a];
            mesh.vertices.push(MeshVertex {
                position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                normal,
            });
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            mesh.indices
                .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Regular tetrahedron of the given circumradius, flat-shaded.
pub fn tetrahedron(circumradius: f32) -> MeshData {
    let s = circumradius / 3f32.sqrt();
    let corners = [
        [s, s, s],
        [s, -s, -s],
        [-s, s, -s],
        [-s, -s, s],
    ];
    // Each face leaves out one corner; ordering keeps the normals outward.
    let faces = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    let mut mesh = MeshData::default();
    for face in faces {
        let base = mesh.vertices.len() as u32;
        let normal = face_normal(corners[face[0]], corners[face[1]], corners[face[2]]);
        for corner in face {
            mesh.vertices.push(MeshVertex {
                position: corners[corner],
                normal,
            });
        }
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }
    mesh
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt().max(1e-6);
    [n[0] / len, n[1] / len, n[2] / len]
}

/// Five-point star extruded along z: a lyon-tessellated face on each side
/// plus side walls along the outline.
pub fn star(outer_radius: f32, inner_ratio: f32, half_depth: f32) -> MeshData {
    let outline = star_outline(outer_radius, outer_radius * inner_ratio);

    let mut builder = Path::builder();
    builder.begin(point(outline[0][0], outline[0][1]));
    for p in &outline[1..] {
        builder.line_to(point(p[0], p[1]));
    }
    builder.close();
    let path = builder.build();

    let mut face: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    FillTessellator::new()
        .tessellate_path(
            &path,
            &FillOptions::tolerance(0.01),
            &mut BuffersBuilder::new(&mut face, |v: FillVertex| v.position().to_array()),
        )
        .expect("star fill tessellation");

    let mut mesh = MeshData::default();

    // Front face (+z) and mirrored back face (-z, reversed winding).
    let front_base = mesh.vertices.len() as u32;
    for v in &face.vertices {
        mesh.vertices.push(MeshVertex {
            position: [v[0], v[1], half_depth],
            normal: [0.0, 0.0, 1.0],
        });
    }
    for tri in face.indices.chunks_exact(3) {
        mesh.indices
            .extend_from_slice(&[front_base + tri[0], front_base + tri[1], front_base + tri[2]]);
    }
    let back_base = mesh.vertices.len() as u32;
    for v in &face.vertices {
        mesh.vertices.push(MeshVertex {
            position: [v[0], v[1], -half_depth],
            normal: [0.0, 0.0, -1.0],
        });
    }
    for tri in face.indices.chunks_exact(3) {
        mesh.indices
            .extend_from_slice(&[back_base + tri[0], back_base + tri[2], back_base + tri[1]]);
    }

    // Side walls, one quad per outline edge with its outward normal.
    for (i, p0) in outline.iter().enumerate() {
        let p1 = outline[(i + 1) % outline.len()];
        let dx = p1[0] - p0[0];
        let dy = p1[1] - p0[1];
        let len = (dx * dx + dy * dy).sqrt().max(1e-6);
        let normal = [dy / len, -dx / len, 0.0];
        mesh.push_quad(
            [
                [p0[0], p0[1], half_depth],
                [p1[0], p1[1], half_depth],
                [p1[0], p1[1], -half_depth],
                [p0[0], p0[1], -half_depth],
            ],
            normal,
        );
    }

    mesh
}

fn star_outline(outer: f32, inner: f32) -> Vec<[f32; 2]> {
    (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { inner };
            let angle = FRAC_PI_2 + TAU * i as f32 / 10.0;
            [angle.cos() * radius, angle.sin() * radius]
        })
        .collect()
}
