//! Error taxonomy for scene synthesis.

use std::path::PathBuf;

use crate::camera::DistortionMode;
use crate::scene::BodyRole;

/// Errors raised by the projection model, the scene composer and its collaborators.
///
/// Asset and configuration errors are fatal at construction time. The
/// remaining variants are per-call or per-frame and are expected to be
/// logged and skipped by the frame loop.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The asset loader could not produce an assembly.
    #[error("failed to parse assembly {path}: {reason}")]
    AssetParse { path: PathBuf, reason: String },

    /// A direction with (near) zero boresight component cannot be projected.
    #[error("cannot project direction {index}: boresight component {z:e} is zero")]
    DegenerateProjection { index: usize, z: f64 },

    /// The requested operation has no implementation for this distortion mode.
    #[error("{operation} is not supported in {mode:?} mode")]
    UnsupportedDistortionMode {
        mode: DistortionMode,
        operation: &'static str,
    },

    /// Polynomial mode requested on a sensor without C/D coefficients.
    #[error("polynomial distortion requested but sensor has no coefficients")]
    MissingDistortionCoefficients,

    /// Texture could not be decoded; the body is drawn without it.
    #[error("texture failed to load at path {path}: {reason}")]
    TextureLoad { path: PathBuf, reason: String },

    /// Screenshot extension is not one of png, jpg, bmp, tga.
    #[error("unsupported image type for screenshot {path}; supported types are png, jpg, bmp, tga")]
    UnsupportedImageFormat { path: PathBuf },

    /// Encoder failed while writing a screenshot.
    #[error("failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Star catalog archive or CSV could not be read.
    #[error("failed to load star catalog {path}: {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    /// Operation referenced a body that was never loaded.
    #[error("no {0:?} body has been loaded")]
    BodyNotLoaded(BodyRole),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config: {0}")]
    ConfigRead(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] ron::error::SpannedError),
}
