//! Scene lighting: a constant ambient term and a directional headlight
//! that follows the camera.

use cgmath::{InnerSpace, Vector3, Zero};

use crate::config::hex_to_rgb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
}

impl AmbientLight {
    pub fn from_hex(hex: u32) -> Self {
        Self {
            color: hex_to_rgb(hex),
        }
    }
}

/// Directional light placed at the viewer.
///
/// Like any directional light it shines from `position` towards `target`;
/// keeping `position` on the camera eye makes the light appear to come from
/// the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Headlight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vector3<f32>,
    pub target: Vector3<f32>,
}

impl Headlight {
    pub fn from_hex(hex: u32, intensity: f32) -> Self {
        Self {
            color: hex_to_rgb(hex),
            intensity,
            position: Vector3::unit_y(),
            target: Vector3::zero(),
        }
    }

    pub fn follow(&mut self, eye: Vector3<f32>, target: Vector3<f32>) {
        self.position = eye;
        self.target = target;
    }

    /// Unit vector pointing from the lit surface towards the light
    pub fn direction(&self) -> Vector3<f32> {
        let towards_light = self.position - self.target;
        if towards_light.magnitude2() > f32::EPSILON {
            towards_light.normalize()
        } else {
            Vector3::unit_y()
        }
    }
}
