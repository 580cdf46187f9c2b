use std::ops::Range;

use wgpu::{util::DeviceExt, Device};

use super::vertex::Vertex3D;

/// Triangle mesh with lazily created GPU buffers
#[derive(Debug)]
pub struct Mesh {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
}

impl Mesh {
    /// Builds a mesh from flat position/normal arrays (3 floats per vertex)
    pub fn new(positions: Vec<f32>, normals: Vec<f32>, indices: Vec<u32>) -> Self {
        let index_count = indices.len() as u32;

        let vertices = positions
            .chunks_exact(3)
            .zip(normals.chunks_exact(3))
            .map(|(p, n)| Vertex3D {
                position: [p[0], p[1], p[2]],
                normal: [n[0], n[1], n[2]],
            })
            .collect();

        Self {
            vertices,
            indices,
            vertex_buffer: None,
            index_buffer: None,
            index_count,
        }
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Smooth vertex normals averaged from the faces that use each vertex
    pub fn calculate_face_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
        let vertex_count = positions.len() / 3;
        let mut normals = vec![0.0; positions.len()];
        let mut counts = vec![0u32; vertex_count];

        let position = |i: usize| [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];

        for triangle in indices.chunks_exact(3) {
            let [i0, i1, i2] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            if i0.max(i1).max(i2) >= vertex_count {
                continue;
            }

            let (v0, v1, v2) = (position(i0), position(i1), position(i2));
            let edge1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
            let edge2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

            let face_normal = [
                edge1[1] * edge2[2] - edge1[2] * edge2[1],
                edge1[2] * edge2[0] - edge1[0] * edge2[2],
                edge1[0] * edge2[1] - edge1[1] * edge2[0],
            ];

            for &vertex_idx in &[i0, i1, i2] {
                normals[vertex_idx * 3] += face_normal[0];
                normals[vertex_idx * 3 + 1] += face_normal[1];
                normals[vertex_idx * 3 + 2] += face_normal[2];
                counts[vertex_idx] += 1;
            }
        }

        // Normalize; averaging first is unnecessary since only direction matters
        for (i, normal) in normals.chunks_exact_mut(3).enumerate() {
            if counts[i] == 0 {
                continue;
            }
            let length = (normal[0].powi(2) + normal[1].powi(2) + normal[2].powi(2)).sqrt();
            if length > 0.0 {
                normal.iter_mut().for_each(|c| *c /= length);
            }
        }

        normals
    }

    fn upload(&mut self, device: &Device) {
        self.vertex_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.index_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }
}

/// One parsed geometry entry, as it lives in the scene graph.
///
/// Geometry is fixed once inserted; only the GPU upload state changes.
#[derive(Debug)]
pub struct SceneObject {
    id: String,
    pub name: String,
    pub meshes: Vec<Mesh>,
    uploaded: bool,
}

impl SceneObject {
    pub fn new(id: &str, meshes: Vec<Mesh>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            meshes,
            uploaded: false,
        }
    }

    /// Backend identifier this object was loaded from
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn triangle_count(&self) -> u32 {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn vertex_count(&self) -> u32 {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    /// Creates vertex and index buffers; a no-op once done
    pub fn init_gpu_resources(&mut self, device: &Device) {
        if self.uploaded {
            return;
        }
        for mesh in self.meshes.iter_mut() {
            mesh.upload(device);
        }
        self.uploaded = true;
        log::debug!(
            "Uploaded '{}' ({} vertices, {} triangles)",
            self.name,
            self.vertex_count(),
            self.triangle_count()
        );
    }
}

pub trait DrawObject<'a> {
    fn draw_mesh(&mut self, mesh: &'a Mesh);
    fn draw_mesh_instanced(&mut self, mesh: &'a Mesh, instances: Range<u32>);
    fn draw_object(&mut self, object: &'a SceneObject);
}

impl<'a, 'b> DrawObject<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh(&mut self, mesh: &'b Mesh) {
        self.draw_mesh_instanced(mesh, 0..1);
    }

    fn draw_mesh_instanced(&mut self, mesh: &'b Mesh, instances: Range<u32>) {
        // Skip drawing if not uploaded
        let (Some(vertex_buffer), Some(index_buffer)) = (&mesh.vertex_buffer, &mesh.index_buffer)
        else {
            return;
        };

        self.set_vertex_buffer(0, vertex_buffer.slice(..));
        self.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, instances);
    }

    fn draw_object(&mut self, object: &'b SceneObject) {
        for mesh in &object.meshes {
            self.draw_mesh(mesh);
        }
    }
}
