//! Stimulator configuration.
//!
//! All sections have working defaults; a RON file only needs to name the
//! fields it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::BodySpec;
use crate::{SceneError, SensorModel};

pub use crate::starfield::StarField as StarFieldConfig;

/// Composer constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Fraction of a body's scale used to pad its near and far clip planes
    pub clip_margin_alpha: f64,
    /// Number of directional light uniform slots the shaders expose
    pub light_slots: usize,
    pub light_ambient: f64,
    pub light_diffuse: f64,
    pub light_specular: f64,
    pub material_shininess: f32,
    /// Distance (m) at which star markers are placed along their line of sight
    pub star_render_distance: f64,
    pub star_near_plane: f64,
    pub star_far_plane: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clip_margin_alpha: 0.2,
            light_slots: 1,
            light_ambient: 0.05,
            light_diffuse: 0.4,
            light_specular: 0.5,
            material_shininess: 32.0,
            star_render_distance: 50.0,
            star_near_plane: 0.1,
            star_far_plane: 100.0,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), SceneError> {
        if !(self.clip_margin_alpha.is_finite() && self.clip_margin_alpha > 0.0) {
            return Err(SceneError::InvalidConfig(
                "clip_margin_alpha must be positive".into(),
            ));
        }
        if self.light_slots == 0 {
            return Err(SceneError::InvalidConfig(
                "at least one light slot is required".into(),
            ));
        }
        if !(self.star_near_plane > 0.0 && self.star_far_plane > self.star_near_plane) {
            return Err(SceneError::InvalidConfig(
                "star clip planes must satisfy 0 < near < far".into(),
            ));
        }
        if !(self.star_render_distance > self.star_near_plane
            && self.star_render_distance < self.star_far_plane)
        {
            return Err(SceneError::InvalidConfig(
                "star render distance must lie between the star clip planes".into(),
            ));
        }
        Ok(())
    }
}

/// Complete stimulator setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulatorConfig {
    pub sensor: SensorModel,
    pub stars: StarFieldConfig,
    pub scene: SceneConfig,
    /// Bodies loaded at construction
    pub bodies: Vec<BodySpec>,
    /// Optional rkyv star catalog
    pub catalog: Option<std::path::PathBuf>,
}

impl StimulatorConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, SceneError> {
        let config: Self = ron::from_str(text).map_err(SceneError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(SceneError::ConfigRead)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        self.sensor.validate()?;
        self.scene.validate()?;
        if !(self.stars.half_fov_deg.is_finite() && self.stars.half_fov_deg >= 0.0) {
            return Err(SceneError::InvalidConfig(
                "half_fov_deg must be non-negative".into(),
            ));
        }
        if self.stars.mapping.bright_mag == self.stars.mapping.dim_mag {
            return Err(SceneError::InvalidConfig(
                "magnitude anchors must differ".into(),
            ));
        }
        for body in &self.bodies {
            if !(body.scale.is_finite() && body.scale > 0.0) {
                return Err(SceneError::InvalidConfig(format!(
                    "{:?} body scale must be positive",
                    body.role
                )));
            }
        }
        Ok(())
    }
}
