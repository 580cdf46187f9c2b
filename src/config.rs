//! # Viewer Configuration
//!
//! Command-line options for the viewer plus the fixed scene constants used
//! by scene setup (camera projection, controller sensitivity, lights).

use std::time::Duration;

use cgmath::{Deg, Vector3};
use clap::Parser;

use crate::{error::LoadError, loader::ViewRegion};

/// Command-line configuration for a viewer session
#[derive(Parser, Debug, Clone)]
#[command(name = "geoview")]
#[command(about = "Native viewer for region-queried geometry (OBJ over HTTP)")]
pub struct ViewerConfig {
    /// Base URL of the geometry backend
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// Minimum corner of the view region as "x,y,z"
    #[arg(long, value_parser = parse_triple, default_value = "12,-9,29", allow_hyphen_values = true)]
    pub min: [f64; 3],

    /// Maximum corner of the view region as "x,y,z"
    #[arg(long, value_parser = parse_triple, default_value = "28,1.8,40", allow_hyphen_values = true)]
    pub max: [f64; 3],

    /// Eye position sent with the region query and applied to the camera
    #[arg(long, value_parser = parse_triple, default_value = "10,-9,28", allow_hyphen_values = true)]
    pub eye: [f64; 3],

    /// Point the camera is aimed at once the region query succeeds
    #[arg(long, value_parser = parse_triple, default_value = "20,-5,35", allow_hyphen_values = true)]
    pub target: [f64; 3],

    /// Upper bound on simultaneous entry fetches
    #[arg(long, default_value_t = 8)]
    pub max_in_flight: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:8080".to_string(),
            min: [12.0, -9.0, 29.0],
            max: [28.0, 1.8, 40.0],
            eye: [10.0, -9.0, 28.0],
            target: [20.0, -5.0, 35.0],
            max_in_flight: 8,
            timeout_secs: 30,
            width: 1200,
            height: 800,
        }
    }
}

impl ViewerConfig {
    /// Builds the validated region query described by this configuration
    pub fn region(&self) -> Result<ViewRegion, LoadError> {
        ViewRegion::new(self.min, self.max, self.eye)
    }

    pub fn target(&self) -> Vector3<f32> {
        to_vector(self.target)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed parameters of scene setup.
///
/// These are not exposed on the command line; they describe the look and
/// feel of the viewer rather than a particular session.
#[derive(Debug, Clone, Copy)]
pub struct SceneSettings {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub damping_factor: f32,
    /// When set, accumulated input is consumed in full on each update
    pub static_moving: bool,
    pub ambient_color: u32,
    pub headlight_color: u32,
    pub headlight_intensity: f32,
    pub clear_color: u32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            fovy: Deg(75.0),
            znear: 1.0,
            zfar: 1000.0,
            rotate_speed: 1.0,
            zoom_speed: 1.2,
            pan_speed: 0.8,
            damping_factor: 0.3,
            static_moving: true,
            ambient_color: 0x202020,
            headlight_color: 0xffffff,
            headlight_intensity: 0.7,
            clear_color: 0x100000,
        }
    }
}

/// Splits a packed `0xRRGGBB` colour into linear `[r, g, b]` in 0..=1
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

pub fn to_vector(v: [f64; 3]) -> Vector3<f32> {
    Vector3::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

fn parse_triple(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got \"{s}\""));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate \"{part}\": {e}"))?;
    }
    Ok(out)
}
