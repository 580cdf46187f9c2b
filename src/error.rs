//! Error types for the viewer and the geometry loader.

use thiserror::Error;

/// Failure while querying, fetching, decoding or parsing geometry.
///
/// None of these are fatal: a region failure becomes a reported status, an
/// entry failure skips that one object.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to parse OBJ geometry: {0}")]
    Parse(#[from] tobj::LoadError),

    #[error("geometry '{0}' contains no faces")]
    EmptyGeometry(String),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("invalid view region: {0}")]
    InvalidRegion(String),

    #[error("loader runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Failure that prevents the viewer from starting or running.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("graphics initialisation failed: {0}")]
    Graphics(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl From<wgpu::CreateSurfaceError> for ViewerError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        ViewerError::Graphics(err.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for ViewerError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        ViewerError::Graphics(err.to_string())
    }
}

impl From<wgpu::RequestAdapterError> for ViewerError {
    fn from(err: wgpu::RequestAdapterError) -> Self {
        ViewerError::Graphics(err.to_string())
    }
}
