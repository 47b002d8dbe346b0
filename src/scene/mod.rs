//! Scene composer.
//!
//! Owns the named bodies of a proximity scene, places them in the render
//! frame, derives per-body clip planes and light descriptors and issues
//! draws to a [`RenderBackend`].
//!
//! Bodies are kept in a map ordered by [`BodyRole`], which fixes the draw
//! order and the light evaluation order. Stars are always drawn after all
//! bodies.

pub mod input;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::{self, AssetLoader};
use crate::backend::{
    MeshHandle, RenderBackend, ShaderKind, TextureHandle, UniformValue, VertexLayout,
};
use crate::catalogs::StarCatalog;
use crate::config::SceneConfig;
use crate::starfield::{StarField, VisibleStar};
use crate::{frames, Matrix4, Quaternion, SceneError, SensorModel, Vector3};

use input::InspectionCamera;

/// Closest allowed near clip plane (m)
pub const MIN_NEAR_PLANE: f64 = 0.1;

/// Named scene members, in draw order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BodyRole {
    /// Observed spacecraft
    Target,
    /// Axis marker drawn at the target pose
    Triad,
    Earth,
    Sun,
    Moon,
    Lamp,
    /// Generic test shape (e.g. a cube)
    Shape,
    /// Mesh instanced once per visible star
    StarMarker,
}

impl BodyRole {
    /// Roles acting as directional lights, in evaluation order
    pub const ILLUMINANTS: [BodyRole; 3] = [BodyRole::Sun, BodyRole::Moon, BodyRole::Lamp];

    pub fn is_illuminant(self) -> bool {
        Self::ILLUMINANTS.contains(&self)
    }
}

/// How to construct a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub role: BodyRole,
    /// Assembly description handed to the asset loader
    pub assembly: PathBuf,
    #[serde(default)]
    pub diffuse_texture: Option<PathBuf>,
    #[serde(default)]
    pub specular_texture: Option<PathBuf>,
    /// Uniform scale applied to the loaded geometry
    pub scale: f64,
    #[serde(default)]
    pub layout: VertexLayout,
}

impl BodySpec {
    pub fn new(role: BodyRole, assembly: impl Into<PathBuf>, scale: f64) -> Self {
        Self {
            role,
            assembly: assembly.into(),
            diffuse_texture: None,
            specular_texture: None,
            scale,
            layout: VertexLayout::Colored,
        }
    }

    pub fn textured(mut self, diffuse: impl Into<PathBuf>, specular: impl Into<PathBuf>) -> Self {
        self.diffuse_texture = Some(diffuse.into());
        self.specular_texture = Some(specular.into());
        self.layout = VertexLayout::Textured;
        self
    }
}

/// Near and far clip distances (m)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub near: f64,
    pub far: f64,
}

/// Clip planes bracketing a body of the given scale at `position` (VBS).
///
/// `near = max(0.1, |r| - alpha*scale)` and `far = near + 2*alpha*scale`.
pub fn compute_clip_planes(position: &Vector3, scale: f64, alpha: f64) -> ClipPlanes {
    let margin = alpha * scale;
    let near = (position.norm() - margin).max(MIN_NEAR_PLANE);
    ClipPlanes {
        near,
        far: near + 2.0 * margin,
    }
}

/// Model matrix `Translate(render position) * Rotate(attitude) * Scale`.
///
/// The rotation step is skipped entirely when the attitude is the identity.
pub fn compose_model_transform(position: &Vector3, attitude: &Quaternion, scale: f64) -> Matrix4 {
    let mut model = Matrix4::new_translation(&frames::vbs_to_render(position));
    if let Some((angle, axis)) = frames::quaternion_to_axis_angle(attitude) {
        let rotation =
            nalgebra::Rotation3::from_axis_angle(&nalgebra::Unit::new_unchecked(axis), angle);
        model *= rotation.to_homogeneous();
    }
    model * Matrix4::new_scaling(scale)
}

/// Directional light for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LightDescriptor {
    pub source: BodyRole,
    /// Render-frame vector from the scene toward the light; not normalized
    pub direction: Vector3,
    pub ambient: Vector3,
    pub diffuse: Vector3,
    pub specular: Vector3,
}

#[derive(Debug, Clone)]
struct MeshPart {
    mesh: MeshHandle,
    triangle_count: usize,
    diffuse: Option<TextureHandle>,
    specular: Option<TextureHandle>,
}

/// A loaded scene member and its current pose
#[derive(Debug, Clone)]
pub struct BodyInstance {
    pub role: BodyRole,
    /// Position in the VBS frame (m)
    pub position: Vector3,
    /// Scalar-first unit quaternion, VBS to body
    pub attitude: Quaternion,
    pub scale: f64,
    pub initialized: bool,
    pub visible: bool,
    pub illuminant: bool,
    layout: VertexLayout,
    parts: Vec<MeshPart>,
    textures: Vec<TextureHandle>,
}

impl BodyInstance {
    pub fn clip_planes(&self, alpha: f64) -> ClipPlanes {
        compute_clip_planes(&self.position, self.scale, alpha)
    }

    pub fn model_transform(&self) -> Matrix4 {
        compose_model_transform(&self.position, &self.attitude, self.scale)
    }

    pub fn render_position(&self) -> Vector3 {
        frames::vbs_to_render(&self.position)
    }

    pub fn is_active(&self) -> bool {
        self.initialized && self.visible
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.triangle_count).sum()
    }

    fn pose_is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.attitude.coords.iter().all(|v| v.is_finite())
            && self.scale.is_finite()
            && self.scale > 0.0
    }

    fn draw_parts(&self, backend: &mut impl RenderBackend) {
        for part in &self.parts {
            backend.bind_textures(part.diffuse, part.specular);
            backend.draw(part.mesh, part.triangle_count);
        }
    }
}

fn load_texture_or_warn(
    backend: &mut impl RenderBackend,
    loader: &impl AssetLoader,
    path: Option<&Path>,
    loaded: &mut Vec<TextureHandle>,
) -> Option<TextureHandle> {
    let path = path?;
    match loader.load_texture(path) {
        Ok(image) => {
            let handle = backend.upload_texture(&image);
            loaded.push(handle);
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("{}", e);
            None
        }
    }
}

/// Named bodies plus the constants needed to draw them.
///
/// Not `Clone`: the scene owns its bodies' backend handles and releases
/// them on unload.
#[derive(Debug, Default)]
pub struct Scene {
    pub config: SceneConfig,
    pub camera: InspectionCamera,
    bodies: BTreeMap<BodyRole, BodyInstance>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Result<Self, SceneError> {
        config.validate()?;
        Ok(Self {
            config,
            camera: InspectionCamera::default(),
            bodies: BTreeMap::new(),
        })
    }

    /// Parse, upload and register a body.
    ///
    /// Assembly errors abort the load with nothing registered. Textures that
    /// fail to load are logged and left unbound. A body already present in
    /// the same role is replaced and its handles released.
    pub fn load_body(
        &mut self,
        backend: &mut impl RenderBackend,
        loader: &impl AssetLoader,
        spec: &BodySpec,
    ) -> Result<(), SceneError> {
        if !(spec.scale.is_finite() && spec.scale > 0.0) {
            return Err(SceneError::InvalidConfig(format!(
                "{:?} body scale must be positive",
                spec.role
            )));
        }
        let assembly = loader.parse_assembly(&spec.assembly)?;

        self.unload_body(spec.role, backend);

        let mut textures = Vec::new();
        let body_diffuse =
            load_texture_or_warn(backend, loader, spec.diffuse_texture.as_deref(), &mut textures);
        let body_specular = load_texture_or_warn(
            backend,
            loader,
            spec.specular_texture.as_deref(),
            &mut textures,
        );

        let mut parts = Vec::with_capacity(assembly.parts.len());
        for part in &assembly.parts {
            let vertices = assets::part_vertices(part, spec.layout);
            let mesh = backend.upload_mesh(&vertices, spec.layout);
            let diffuse = match part.textures.diffuse.as_deref() {
                Some(path) => load_texture_or_warn(backend, loader, Some(path), &mut textures),
                None => body_diffuse,
            };
            let specular = match part.textures.specular.as_deref() {
                Some(path) => load_texture_or_warn(backend, loader, Some(path), &mut textures),
                None => body_specular,
            };
            parts.push(MeshPart {
                mesh,
                triangle_count: part.triangles.len(),
                diffuse,
                specular,
            });
        }

        tracing::info!(
            "Loaded {:?} body from {}: {} parts, {} triangles",
            spec.role,
            spec.assembly.display(),
            parts.len(),
            assembly.triangle_count()
        );

        self.bodies.insert(
            spec.role,
            BodyInstance {
                role: spec.role,
                position: Vector3::zeros(),
                attitude: Quaternion::identity(),
                scale: spec.scale,
                initialized: true,
                visible: true,
                illuminant: spec.role.is_illuminant(),
                layout: spec.layout,
                parts,
                textures,
            },
        );
        Ok(())
    }

    /// Remove a body and release its backend handles
    pub fn unload_body(
        &mut self,
        role: BodyRole,
        backend: &mut impl RenderBackend,
    ) -> Option<BodyInstance> {
        let mut body = self.bodies.remove(&role)?;
        for part in &body.parts {
            backend.release_mesh(part.mesh);
        }
        for texture in &body.textures {
            backend.release_texture(*texture);
        }
        body.initialized = false;
        tracing::info!("Unloaded {:?} body", role);
        Some(body)
    }

    /// Release every body
    pub fn teardown(&mut self, backend: &mut impl RenderBackend) {
        let roles: Vec<BodyRole> = self.bodies.keys().copied().collect();
        for role in roles {
            self.unload_body(role, backend);
        }
    }

    pub fn body(&self, role: BodyRole) -> Option<&BodyInstance> {
        self.bodies.get(&role)
    }

    pub fn body_mut(&mut self, role: BodyRole) -> Option<&mut BodyInstance> {
        self.bodies.get_mut(&role)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &BodyInstance> {
        self.bodies.values()
    }

    /// Overwrite a body's pose.
    ///
    /// `attitude` must be a unit quaternion; this is not checked.
    pub fn update_pose(
        &mut self,
        role: BodyRole,
        position: Vector3,
        attitude: Quaternion,
    ) -> Result<(), SceneError> {
        let body = self
            .bodies
            .get_mut(&role)
            .ok_or(SceneError::BodyNotLoaded(role))?;
        body.position = position;
        body.attitude = attitude;
        Ok(())
    }

    pub fn set_visible(&mut self, role: BodyRole, visible: bool) -> Result<(), SceneError> {
        let body = self
            .bodies
            .get_mut(&role)
            .ok_or(SceneError::BodyNotLoaded(role))?;
        body.visible = visible;
        Ok(())
    }

    /// Light descriptors of every active illuminant, in role order
    pub fn assemble_lights(&self) -> Vec<LightDescriptor> {
        let ambient = Vector3::repeat(self.config.light_ambient);
        let diffuse = Vector3::repeat(self.config.light_diffuse);
        let specular = Vector3::repeat(self.config.light_specular);
        self.bodies
            .values()
            .filter(|body| body.illuminant && body.is_active())
            .map(|body| LightDescriptor {
                source: body.role,
                direction: body.render_position(),
                ambient,
                diffuse,
                specular,
            })
            .collect()
    }

    /// Lights that end up bound to the shader slots.
    ///
    /// When more illuminants are active than there are slots, later lights
    /// overwrite earlier ones, so the last `light_slots` lights win. With a
    /// single slot this is last-enabled-wins.
    pub fn bound_lights(&self) -> Vec<LightDescriptor> {
        let mut lights = self.assemble_lights();
        let excess = lights.len().saturating_sub(self.config.light_slots);
        lights.drain(..excess);
        lights
    }

    fn set_light_uniforms(&self, backend: &mut impl RenderBackend, lights: &[LightDescriptor]) {
        backend.set_uniform("light_count", (lights.len() as i32).into());
        for (slot, light) in lights.iter().enumerate() {
            backend.set_uniform(&format!("lights[{}].direction", slot), light.direction.into());
            backend.set_uniform(&format!("lights[{}].ambient", slot), light.ambient.into());
            backend.set_uniform(&format!("lights[{}].diffuse", slot), light.diffuse.into());
            backend.set_uniform(&format!("lights[{}].specular", slot), light.specular.into());
        }
    }

    /// Issue one body's uniforms and draws. Inactive bodies are ignored and
    /// bodies with a non-finite pose are skipped with a warning.
    pub fn draw_body(
        &self,
        backend: &mut impl RenderBackend,
        sensor: &SensorModel,
        role: BodyRole,
        lights: &[LightDescriptor],
    ) {
        let body = match self.bodies.get(&role) {
            Some(body) if body.is_active() => body,
            _ => return,
        };
        if !body.pose_is_finite() {
            tracing::warn!("Skipping {:?} body with malformed pose", role);
            return;
        }

        backend.use_shader(body.layout.into());
        backend.set_uniform("viewPos", self.camera.position.into());
        backend.set_uniform("material.shininess", self.config.material_shininess.into());
        backend.set_uniform("material.diffuse", UniformValue::Int(0));
        backend.set_uniform("material.specular", UniformValue::Int(1));
        self.set_light_uniforms(backend, lights);

        let clip = body.clip_planes(self.config.clip_margin_alpha);
        backend.set_uniform(
            "projection",
            sensor.projection_matrix(clip.near, clip.far).into(),
        );
        backend.set_uniform("view", self.camera.view_matrix().into());
        backend.set_uniform("model", body.model_transform().into());
        body.draw_parts(backend);
    }

    /// Draw every active body except the star marker, in role order
    pub fn draw_bodies(&self, backend: &mut impl RenderBackend, sensor: &SensorModel) {
        let lights = self.bound_lights();
        tracing::debug!("{} light(s) bound", lights.len());
        for role in self.bodies.keys() {
            if *role != BodyRole::StarMarker {
                self.draw_body(backend, sensor, *role, &lights);
            }
        }
    }

    /// Draw point sources as instances of the star marker mesh placed along
    /// their line of sight
    pub fn draw_stars(
        &self,
        backend: &mut impl RenderBackend,
        sensor: &SensorModel,
        stars: &[VisibleStar],
    ) {
        if stars.is_empty() {
            return;
        }
        let marker = match self.bodies.get(&BodyRole::StarMarker) {
            Some(marker) if marker.is_active() => marker,
            Some(_) => return,
            None => {
                tracing::warn!("No star marker mesh loaded; {} stars not drawn", stars.len());
                return;
            }
        };

        backend.use_shader(ShaderKind::Star);
        backend.set_uniform(
            "projection",
            sensor
                .projection_matrix(self.config.star_near_plane, self.config.star_far_plane)
                .into(),
        );
        backend.set_uniform("view", self.camera.view_matrix().into());

        let scaling = Matrix4::new_scaling(marker.scale);
        for star in stars {
            let r_vbs = star.direction_vbs * self.config.star_render_distance;
            let r_gl = frames::vbs_to_render(&r_vbs);
            backend.set_uniform("model", (Matrix4::new_translation(&r_gl) * scaling).into());
            backend.set_uniform("RGB", star.rgb.into());
            marker.draw_parts(backend);
        }
        tracing::debug!("Drew {} stars", stars.len());
    }

    /// Render one frame: bodies in role order, then the catalog stars
    /// visible at attitude `q_eci2vbs`, then present.
    pub fn draw_frame(
        &self,
        backend: &mut impl RenderBackend,
        sensor: &SensorModel,
        catalog: Option<&StarCatalog>,
        star_field: &StarField,
        q_eci2vbs: &Quaternion,
    ) {
        backend.clear();
        self.draw_bodies(backend, sensor);
        match catalog {
            Some(catalog) => {
                let stars = star_field.query(catalog, q_eci2vbs);
                self.draw_stars(backend, sensor, &stars);
            }
            None => tracing::warn!("No star catalog loaded"),
        }
        backend.present();
    }
}
