//! Top-level optical stimulator.
//!
//! Bundles the sensor model, the star field and the scene composer behind
//! the per-frame operations a simulation loop drives.

use std::path::Path;

use crate::assets::AssetLoader;
use crate::backend::RenderBackend;
use crate::camera::DistortionMode;
use crate::catalogs::loader;
use crate::config::StimulatorConfig;
use crate::scene::input::InputContext;
use crate::scene::{BodyRole, Scene};
use crate::screenshot::{self, ImageSink};
use crate::starfield::{StarField, VisibleStar};
use crate::{Quaternion, SceneError, SensorModel, StarCatalog, Vector2, Vector3};

/// Caller-supplied ephemeris and attitudes for a proximity frame.
///
/// Positions are in the VBS frame (m); attitudes are scalar-first unit
/// quaternions.
#[derive(Debug, Clone, PartialEq)]
pub struct RendezvousState {
    pub sun_position: Vector3,
    pub target_position: Vector3,
    pub target_attitude: Quaternion,
    pub earth_position: Vector3,
    pub earth_attitude: Quaternion,
    /// Sensor attitude used for the star background
    pub q_eci2vbs: Quaternion,
}

/// Not `Clone`: the scene releases its backend handles on teardown
#[derive(Debug)]
pub struct OpticalStimulator {
    pub sensor: SensorModel,
    pub star_field: StarField,
    pub scene: Scene,
    catalog: Option<StarCatalog>,
}

fn read_catalog(path: &Path) -> Result<StarCatalog, SceneError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let result = if is_csv {
        loader::catalog_from_csv(path)
    } else {
        loader::load_catalog(path)
    };
    result.map_err(|e| SceneError::CatalogLoad {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    })
}

impl OpticalStimulator {
    /// Validate `config`, load its bodies through `loader` and read the
    /// star catalog if one is configured.
    pub fn new(
        config: &StimulatorConfig,
        backend: &mut impl RenderBackend,
        loader: &impl AssetLoader,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        // Read before any upload; a bad catalog leaves nothing to release
        let catalog = config.catalog.as_deref().map(read_catalog).transpose()?;
        let mut scene = Scene::new(config.scene.clone())?;
        for spec in &config.bodies {
            if let Err(e) = scene.load_body(backend, loader, spec) {
                scene.teardown(backend);
                return Err(e);
            }
        }
        tracing::info!(
            "Optical stimulator ready: {}x{} sensor, {:.3} deg vertical FOV, {} bodies",
            config.sensor.pixel_format[0],
            config.sensor.pixel_format[1],
            config.sensor.fov_vertical_deg(),
            config.bodies.len()
        );
        Ok(Self::from_parts(
            config.sensor.clone(),
            config.stars.clone(),
            scene,
            catalog,
        ))
    }

    pub fn from_parts(
        sensor: SensorModel,
        star_field: StarField,
        scene: Scene,
        catalog: Option<StarCatalog>,
    ) -> Self {
        Self {
            sensor,
            star_field,
            scene,
            catalog,
        }
    }

    pub fn catalog(&self) -> Option<&StarCatalog> {
        self.catalog.as_ref()
    }

    pub fn set_catalog(&mut self, catalog: StarCatalog) {
        self.catalog = Some(catalog);
    }

    pub fn unit_vectors_to_pixels(
        &self,
        directions: &[Vector3],
        mode: DistortionMode,
    ) -> Result<Vec<Vector2>, SceneError> {
        self.sensor.unit_vectors_to_pixels(directions, mode)
    }

    pub fn pixels_to_unit_vectors(
        &self,
        pixels: &[Vector2],
        mode: DistortionMode,
    ) -> Result<Vec<Vector3>, SceneError> {
        self.sensor.pixels_to_unit_vectors(pixels, mode)
    }

    pub fn magnitude_to_rgb(&self, magnitudes: &[f64]) -> Vec<Vector3> {
        magnitudes
            .iter()
            .map(|m| self.star_field.mapping.rgb(*m))
            .collect()
    }

    /// Catalog stars visible at `q_eci2vbs`; empty without a catalog
    pub fn visible_stars(&self, q_eci2vbs: &Quaternion) -> Vec<VisibleStar> {
        match &self.catalog {
            Some(catalog) => self.star_field.query(catalog, q_eci2vbs),
            None => Vec::new(),
        }
    }

    /// Star-only frame for the given sensor attitude
    pub fn render_attitude(&self, backend: &mut impl RenderBackend, q_eci2vbs: &Quaternion) {
        if self.catalog.is_none() {
            tracing::warn!("No star catalog loaded");
        }
        let stars = self.visible_stars(q_eci2vbs);
        backend.clear();
        self.scene.draw_stars(backend, &self.sensor, &stars);
        backend.present();
    }

    /// Frame of externally supplied point sources: catalog stars followed
    /// by any non-stellar objects, both already in the VBS frame
    pub fn render_point_sources(
        &self,
        backend: &mut impl RenderBackend,
        stars: &[VisibleStar],
        extra: &[VisibleStar],
    ) {
        backend.clear();
        self.scene.draw_stars(backend, &self.sensor, stars);
        self.scene.draw_stars(backend, &self.sensor, extra);
        backend.present();
    }

    /// Proximity frame: Sun as illuminant, the target with its triad, Earth,
    /// then the star background.
    ///
    /// Target and Sun must be loaded; Triad and Earth are posed when present.
    pub fn render_rendezvous(
        &mut self,
        backend: &mut impl RenderBackend,
        state: &RendezvousState,
    ) -> Result<(), SceneError> {
        let scene = &mut self.scene;
        for role in [BodyRole::Sun, BodyRole::Target] {
            if scene.body(role).is_none() {
                return Err(SceneError::BodyNotLoaded(role));
            }
        }
        scene.update_pose(BodyRole::Sun, state.sun_position, Quaternion::identity())?;
        scene.set_visible(BodyRole::Sun, true)?;
        scene.update_pose(BodyRole::Target, state.target_position, state.target_attitude)?;
        if scene.body(BodyRole::Triad).is_some() {
            scene.update_pose(BodyRole::Triad, state.target_position, state.target_attitude)?;
        }
        if scene.body(BodyRole::Earth).is_some() {
            scene.update_pose(BodyRole::Earth, state.earth_position, state.earth_attitude)?;
        }

        self.scene.draw_frame(
            backend,
            &self.sensor,
            self.catalog.as_ref(),
            &self.star_field,
            &state.q_eci2vbs,
        );
        Ok(())
    }

    /// Save the last presented frame.
    ///
    /// Returns `Ok(false)` when nothing was written: the backend cannot read
    /// pixels back or the extension is unsupported.
    pub fn screenshot(
        &self,
        backend: &mut impl RenderBackend,
        sink: &mut impl ImageSink,
        path: &Path,
    ) -> Result<bool, SceneError> {
        match backend.read_pixels() {
            Some(frame) => screenshot::save_frame(sink, path, &frame),
            None => {
                tracing::warn!("Backend cannot read back pixels; screenshot skipped");
                Ok(false)
            }
        }
    }

    /// Move the inspection camera; returns true once a close was requested
    pub fn update_input(&mut self, input: &InputContext) -> bool {
        self.scene.camera.process_input(input);
        self.scene.camera.close_requested
    }

    pub fn teardown(&mut self, backend: &mut impl RenderBackend) {
        self.scene.teardown(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{triangle_part, MemoryLoader};
    use crate::assets::Assembly;
    use crate::backend::{DrawCommand, RecordingBackend, ShaderKind, UniformValue};
    use crate::catalogs::Star;
    use crate::scene::BodySpec;
    use crate::Image;
    use std::path::PathBuf;

    fn loader() -> MemoryLoader {
        let mut loader = MemoryLoader::default();
        for name in ["target", "triad", "sun", "earth", "star"] {
            loader.assemblies.insert(
                PathBuf::from(name),
                Assembly {
                    parts: vec![triangle_part(1, [1.0, 1.0, 1.0])],
                },
            );
        }
        loader
    }

    fn config() -> StimulatorConfig {
        StimulatorConfig {
            bodies: vec![
                BodySpec::new(BodyRole::Target, "target", 1.0),
                BodySpec::new(BodyRole::Triad, "triad", 1.0),
                BodySpec::new(BodyRole::Sun, "sun", 1.0e3),
                BodySpec::new(BodyRole::Earth, "earth", 6.378e6),
                BodySpec::new(BodyRole::StarMarker, "star", 0.05),
            ],
            ..Default::default()
        }
    }

    fn stimulator(backend: &mut RecordingBackend) -> OpticalStimulator {
        let mut stim = OpticalStimulator::new(&config(), backend, &loader()).unwrap();
        stim.set_catalog(StarCatalog::build(vec![
            Star::new(Vector3::z(), 4.0),
            Star::new(Vector3::new(0.0, 0.1, 1.0), 5.0),
            Star::new(Vector3::x(), 2.0),
        ]));
        stim
    }

    struct MemorySink(Vec<(PathBuf, u32, u32)>);

    impl ImageSink for MemorySink {
        fn write_rgb(&mut self, path: &Path, frame: &Image<u8>) -> Result<(), SceneError> {
            screenshot::format_from_path(path)?;
            self.0.push((path.to_path_buf(), frame.width(), frame.height()));
            Ok(())
        }
    }

    #[test]
    fn test_missing_body_aborts_construction() {
        let mut backend = RecordingBackend::new();
        let mut config = config();
        config
            .bodies
            .push(BodySpec::new(BodyRole::Moon, "moon", 1.0));
        let r = OpticalStimulator::new(&config, &mut backend, &loader());
        assert!(matches!(r, Err(SceneError::AssetParse { .. })));
        assert!(backend.meshes.is_empty());
    }

    #[test]
    fn test_missing_catalog_file() {
        let mut backend = RecordingBackend::new();
        let config = StimulatorConfig {
            catalog: Some(PathBuf::from("/nonexistent/stars.rkyv")),
            ..Default::default()
        };
        let r = OpticalStimulator::new(&config, &mut backend, &loader());
        assert!(matches!(r, Err(SceneError::CatalogLoad { .. })));
    }

    #[test]
    fn test_missing_catalog_uploads_nothing() {
        let mut backend = RecordingBackend::new();
        let config = StimulatorConfig {
            catalog: Some(PathBuf::from("/nonexistent/stars.rkyv")),
            ..config()
        };
        let r = OpticalStimulator::new(&config, &mut backend, &loader());
        assert!(matches!(r, Err(SceneError::CatalogLoad { .. })));
        assert!(backend.meshes.is_empty());
        assert!(backend.textures.is_empty());
    }

    #[test]
    fn test_projection_passthrough() {
        let mut backend = RecordingBackend::new();
        let stim = stimulator(&mut backend);
        let (cx, cy) = stim.sensor.principal_point();
        let pixels = stim
            .unit_vectors_to_pixels(&[Vector3::z()], DistortionMode::Pinhole)
            .unwrap();
        assert!((pixels[0] - Vector2::new(cx, cy)).norm() < 1e-9);
        let dirs = stim
            .pixels_to_unit_vectors(&pixels, DistortionMode::Pinhole)
            .unwrap();
        assert!((dirs[0] - Vector3::z()).norm() < 1e-12);

        let rgb = stim.magnitude_to_rgb(&[4.0, 9.0]);
        assert!((rgb[0] - Vector3::repeat(1.0)).norm() < 1e-12);
        assert!(rgb[1].norm() < 1e-12);
    }

    #[test]
    fn test_render_attitude_draws_only_stars() {
        let mut backend = RecordingBackend::new();
        let stim = stimulator(&mut backend);
        stim.render_attitude(&mut backend, &Quaternion::identity());
        let frame = backend.last_frame();
        assert_eq!(frame.first(), Some(&DrawCommand::Clear));
        assert_eq!(frame.last(), Some(&DrawCommand::Present));
        assert!(frame
            .iter()
            .all(|c| !matches!(c, DrawCommand::UseShader(ShaderKind::Colored))));
        assert_eq!(backend.draws().len(), 2);
    }

    #[test]
    fn test_render_point_sources() {
        let mut backend = RecordingBackend::new();
        let stim = stimulator(&mut backend);
        let stars = stim.visible_stars(&Quaternion::identity());
        let extra = vec![VisibleStar {
            direction_vbs: Vector3::new(0.05, 0.0, 1.0).normalize(),
            rgb: Vector3::new(1.0, 0.5, 0.0),
        }];
        stim.render_point_sources(&mut backend, &stars, &extra);
        assert_eq!(backend.draws().len(), 3);
        assert_eq!(
            backend.uniform("RGB"),
            Some(&UniformValue::Vec3(nalgebra::Vector3::new(1.0, 0.5, 0.0)))
        );
    }

    #[test]
    fn test_render_rendezvous() {
        let mut backend = RecordingBackend::new();
        let mut stim = stimulator(&mut backend);
        let half = 0.3_f64;
        let state = RendezvousState {
            sun_position: Vector3::new(1.0e11, 0.0, 5.0e10),
            target_position: Vector3::new(0.0, 0.0, 15.0),
            target_attitude: Quaternion::new(half.cos(), 0.0, half.sin(), 0.0),
            earth_position: Vector3::new(0.0, -7.0e6, 1.0e6),
            earth_attitude: Quaternion::identity(),
            q_eci2vbs: Quaternion::identity(),
        };
        stim.render_rendezvous(&mut backend, &state).unwrap();

        let triad = stim.scene.body(BodyRole::Triad).unwrap();
        assert_eq!(triad.position, state.target_position);
        assert_eq!(triad.attitude, state.target_attitude);
        let lights = stim.scene.bound_lights();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].source, BodyRole::Sun);

        // target, triad, earth, sun bodies then 2 stars
        assert_eq!(backend.draws().len(), 6);
        assert_eq!(backend.last_frame().last(), Some(&DrawCommand::Present));
    }

    #[test]
    fn test_rendezvous_requires_target() {
        let mut backend = RecordingBackend::new();
        let mut stim = stimulator(&mut backend);
        stim.scene.unload_body(BodyRole::Target, &mut backend);
        let state = RendezvousState {
            sun_position: Vector3::x(),
            target_position: Vector3::z(),
            target_attitude: Quaternion::identity(),
            earth_position: Vector3::y(),
            earth_attitude: Quaternion::identity(),
            q_eci2vbs: Quaternion::identity(),
        };
        stim.scene.set_visible(BodyRole::Sun, false).unwrap();
        let r = stim.render_rendezvous(&mut backend, &state);
        assert!(matches!(r, Err(SceneError::BodyNotLoaded(BodyRole::Target))));

        // Failed frame leaves every pose untouched
        let sun = stim.scene.body(BodyRole::Sun).unwrap();
        assert_eq!(sun.position, Vector3::zeros());
        assert!(!sun.visible);
        let triad = stim.scene.body(BodyRole::Triad).unwrap();
        assert_eq!(triad.position, Vector3::zeros());
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn test_screenshot() {
        let mut backend = RecordingBackend::new();
        let stim = stimulator(&mut backend);
        let mut sink = MemorySink(Vec::new());

        assert!(!stim
            .screenshot(&mut backend, &mut sink, Path::new("frame.png"))
            .unwrap());

        backend.framebuffer = Some(Image::new(16, 10));
        assert!(stim
            .screenshot(&mut backend, &mut sink, Path::new("frame.PNG"))
            .unwrap());
        assert!(!stim
            .screenshot(&mut backend, &mut sink, Path::new("frame.tiff"))
            .unwrap());
        assert_eq!(sink.0, vec![(PathBuf::from("frame.PNG"), 16, 10)]);
    }

    #[test]
    fn test_escape_requests_close() {
        let mut backend = RecordingBackend::new();
        let mut stim = stimulator(&mut backend);
        assert!(!stim.update_input(&InputContext {
            forward: true,
            delta_time: 0.1,
            ..Default::default()
        }));
        assert!(stim.update_input(&InputContext {
            escape: true,
            ..Default::default()
        }));
    }
}
