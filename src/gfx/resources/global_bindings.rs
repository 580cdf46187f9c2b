//! Per-frame uniforms shared by every object: camera and lights.

use cgmath::Vector3;

use crate::{
    gfx::{
        camera::camera_utils::CameraUniform,
        scene::{AmbientLight, Headlight},
    },
    wgpu_utils::{binding_types, uniform_buffer::UniformBuffer},
};

/// Global uniform buffer content.
///
/// MUST match `Globals` in `lit.wgsl`; every vec3 is padded to 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUBOContent {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    ambient_color: [f32; 4],
    /// xyz: unit vector towards the headlight
    light_direction: [f32; 4],
    light_color: [f32; 3],
    light_intensity: f32,
}

impl GlobalUBOContent {
    pub fn new(camera: &CameraUniform, ambient: &AmbientLight, headlight: &Headlight) -> Self {
        let direction: Vector3<f32> = headlight.direction();
        let [r, g, b] = ambient.color;
        Self {
            view_position: camera.view_position,
            view_proj: camera.view_proj,
            ambient_color: [r, g, b, 1.0],
            light_direction: [direction.x, direction.y, direction.z, 0.0],
            light_color: headlight.color,
            light_intensity: headlight.intensity,
        }
    }
}

pub type GlobalUBO = UniformBuffer<GlobalUBOContent>;

/// Bind group 0 of every pipeline: the global uniform buffer
pub struct GlobalBindings {
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl GlobalBindings {
    pub fn new(device: &wgpu::Device, ubo: &GlobalUBO) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: binding_types::uniform(),
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.binding_resource(),
            }],
        });

        Self {
            bind_group_layout,
            bind_group,
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}
