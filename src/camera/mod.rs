pub mod pointing;

use serde::{Deserialize, Serialize};

use crate::{Matrix4, SceneError, Vector2, Vector3};

/// Number of terms in the bivariate quartic distortion polynomial
pub const POLYNOMIAL_TERMS: usize = 25;

/// Below this a direction is treated as perpendicular to the boresight
const MIN_BORESIGHT_COMPONENT: f64 = 1.0e-12;

/// Pixel / line-of-sight mapping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistortionMode {
    /// Ideal pinhole camera
    Pinhole,
    /// Quartic polynomial in the normalized image coordinates
    Polynomial,
}

/// Coefficients of the forward polynomial model.
///
/// Term `5*k + j` multiplies `xn^k * yn^j`; `c` yields the pixel column and
/// `d` the pixel row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialCoefficients {
    pub c: Vec<f64>,
    pub d: Vec<f64>,
}

impl PolynomialCoefficients {
    pub fn new(c: [f64; POLYNOMIAL_TERMS], d: [f64; POLYNOMIAL_TERMS]) -> Self {
        Self {
            c: c.to_vec(),
            d: d.to_vec(),
        }
    }

    /// Coefficients that reproduce the pinhole model of `sensor`
    pub fn pinhole(sensor: &SensorModel) -> Self {
        let (cx, cy) = sensor.principal_point();
        let (fpx, fpy) = sensor.focal_length_pixels();
        let mut c = [0.0; POLYNOMIAL_TERMS];
        let mut d = [0.0; POLYNOMIAL_TERMS];
        c[0] = cx;
        c[5] = fpx;
        d[0] = cy;
        d[1] = fpy;
        Self::new(c, d)
    }

    fn is_well_formed(&self) -> bool {
        self.c.len() == POLYNOMIAL_TERMS && self.d.len() == POLYNOMIAL_TERMS
    }

    fn evaluate(&self, xn: f64, yn: f64) -> Vector2 {
        let mut xn_pow = [1.0; 5];
        let mut yn_pow = [1.0; 5];
        for power in 1..5 {
            xn_pow[power] = xn_pow[power - 1] * xn;
            yn_pow[power] = yn_pow[power - 1] * yn;
        }

        let mut u = 0.0;
        let mut v = 0.0;
        for k in 0..5 {
            for j in 0..5 {
                let term = xn_pow[k] * yn_pow[j];
                u += term * self.c[5 * k + j];
                v += term * self.d[5 * k + j];
            }
        }
        Vector2::new(u, v)
    }
}

/// Sensor intrinsics.
///
/// Pixel pitch and focal length share a length unit (e.g. millimetres).
/// The vertical field of view is always derived from the current
/// intrinsics, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorModel {
    /// Resolution `[Nu, Nv]` in pixels
    pub pixel_format: [usize; 2],
    /// Pixel pitch `[dx, dy]`
    pub pixel_pitch: [f64; 2],
    /// Focal length `[fx, fy]`
    pub focal_length: [f64; 2],
    pub distortion: Option<PolynomialCoefficients>,
}

impl Default for SensorModel {
    fn default() -> Self {
        SensorModel {
            pixel_format: [1920, 1200],
            pixel_pitch: [5.86e-3, 5.86e-3],
            focal_length: [17.6, 17.6],
            distortion: None,
        }
    }
}

impl SensorModel {
    pub fn new(nu: usize, nv: usize, dx: f64, dy: f64, fx: f64, fy: f64) -> Self {
        Self {
            pixel_format: [nu, nv],
            pixel_pitch: [dx, dy],
            focal_length: [fx, fy],
            distortion: None,
        }
    }

    pub fn with_distortion(mut self, coefficients: PolynomialCoefficients) -> Self {
        self.distortion = Some(coefficients);
        self
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if self.pixel_format.iter().any(|&n| n == 0) {
            return Err(SceneError::InvalidConfig(
                "sensor resolution must be positive".into(),
            ));
        }
        let positive = |v: &[f64; 2]| v.iter().all(|x| x.is_finite() && *x > 0.0);
        if !positive(&self.pixel_pitch) || !positive(&self.focal_length) {
            return Err(SceneError::InvalidConfig(
                "pixel pitch and focal length must be positive".into(),
            ));
        }
        if let Some(coefficients) = &self.distortion {
            if !coefficients.is_well_formed() {
                return Err(SceneError::InvalidConfig(format!(
                    "distortion coefficients must have {} terms each",
                    POLYNOMIAL_TERMS
                )));
            }
        }
        Ok(())
    }

    /// Optical center in pixels (image center)
    pub fn principal_point(&self) -> (f64, f64) {
        (
            self.pixel_format[0] as f64 / 2.0,
            self.pixel_format[1] as f64 / 2.0,
        )
    }

    /// Focal length expressed in pixels `(fx/dx, fy/dy)`
    pub fn focal_length_pixels(&self) -> (f64, f64) {
        (
            self.focal_length[0] / self.pixel_pitch[0],
            self.focal_length[1] / self.pixel_pitch[1],
        )
    }

    /// Vertical field of view in degrees
    pub fn fov_vertical_deg(&self) -> f64 {
        (2.0 * (self.pixel_format[1] as f64 * self.pixel_pitch[1] / self.focal_length[1] / 2.0)
            .atan())
        .to_degrees()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.pixel_format[0] as f64 / self.pixel_format[1] as f64
    }

    /// Render-frame perspective projection for the given clip planes
    pub fn projection_matrix(&self, near: f64, far: f64) -> Matrix4 {
        nalgebra::Perspective3::new(
            self.aspect_ratio(),
            self.fov_vertical_deg().to_radians(),
            near,
            far,
        )
        .to_homogeneous()
    }

    /// Project a single VBS direction to pixel coordinates
    pub fn unit_vector_to_pixel(
        &self,
        direction: &Vector3,
        mode: DistortionMode,
    ) -> Result<Vector2, SceneError> {
        self.project(0, direction, mode)
    }

    /// Project VBS directions to pixel coordinates.
    ///
    /// Fails on the first direction lying in the image plane.
    pub fn unit_vectors_to_pixels(
        &self,
        directions: &[Vector3],
        mode: DistortionMode,
    ) -> Result<Vec<Vector2>, SceneError> {
        directions
            .iter()
            .enumerate()
            .map(|(index, direction)| self.project(index, direction, mode))
            .collect()
    }

    /// Line of sight (VBS, unit length) through a pixel
    pub fn pixel_to_unit_vector(
        &self,
        pixel: &Vector2,
        mode: DistortionMode,
    ) -> Result<Vector3, SceneError> {
        match mode {
            DistortionMode::Pinhole => {
                let (cx, cy) = self.principal_point();
                let (fpx, fpy) = self.focal_length_pixels();
                Ok(Vector3::new((pixel.x - cx) / fpx, (pixel.y - cy) / fpy, 1.0).normalize())
            }
            DistortionMode::Polynomial => Err(SceneError::UnsupportedDistortionMode {
                mode,
                operation: "pixel to unit vector",
            }),
        }
    }

    pub fn pixels_to_unit_vectors(
        &self,
        pixels: &[Vector2],
        mode: DistortionMode,
    ) -> Result<Vec<Vector3>, SceneError> {
        pixels
            .iter()
            .map(|pixel| self.pixel_to_unit_vector(pixel, mode))
            .collect()
    }

    fn project(
        &self,
        index: usize,
        direction: &Vector3,
        mode: DistortionMode,
    ) -> Result<Vector2, SceneError> {
        if direction.z.abs() < MIN_BORESIGHT_COMPONENT || !direction.z.is_finite() {
            return Err(SceneError::DegenerateProjection {
                index,
                z: direction.z,
            });
        }
        let xn = direction.x / direction.z;
        let yn = direction.y / direction.z;

        match mode {
            DistortionMode::Pinhole => {
                let (cx, cy) = self.principal_point();
                let (fpx, fpy) = self.focal_length_pixels();
                Ok(Vector2::new(fpx * xn + cx, fpy * yn + cy))
            }
            DistortionMode::Polynomial => {
                let coefficients = self
                    .distortion
                    .as_ref()
                    .ok_or(SceneError::MissingDistortionCoefficients)?;
                if !coefficients.is_well_formed() {
                    return Err(SceneError::MissingDistortionCoefficients);
                }
                Ok(coefficients.evaluate(xn, yn))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn sensor() -> SensorModel {
        SensorModel::new(1024, 768, 0.01, 0.012, 25.0, 25.5)
    }

    #[test]
    fn test_fov_follows_intrinsics() {
        let mut s = sensor();
        let expected = (2.0 * (768.0 * 0.012 / 25.5 / 2.0_f64).atan()).to_degrees();
        assert!((s.fov_vertical_deg() - expected).abs() < 1e-12);

        s.focal_length[1] = 50.0;
        let expected = (2.0 * (768.0 * 0.012 / 50.0 / 2.0_f64).atan()).to_degrees();
        assert!((s.fov_vertical_deg() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_boresight_hits_principal_point() {
        let s = sensor();
        let uv = s
            .unit_vector_to_pixel(&Vector3::z(), DistortionMode::Pinhole)
            .unwrap();
        assert!((uv - Vector2::new(512.0, 384.0)).norm() < 1e-12);
    }

    #[test]
    fn test_pinhole_round_trip() {
        let s = sensor();
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let uv = Vector2::new(
                rng.random_range(0.0..=1024.0),
                rng.random_range(0.0..=768.0),
            );
            let n = s.pixel_to_unit_vector(&uv, DistortionMode::Pinhole).unwrap();
            assert!((n.norm() - 1.0).abs() < 1e-12);
            let back = s.unit_vector_to_pixel(&n, DistortionMode::Pinhole).unwrap();
            assert!(
                (back - uv).norm() < 1e-4,
                "round trip of {:?} gave {:?}",
                uv,
                back
            );
        }
    }

    #[test]
    fn test_degenerate_projection() {
        let s = sensor();
        let dirs = [Vector3::z(), Vector3::x()];
        match s.unit_vectors_to_pixels(&dirs, DistortionMode::Pinhole) {
            Err(SceneError::DegenerateProjection { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected degenerate projection, got {:?}", other),
        }
    }

    #[test]
    fn test_polynomial_inverse_unsupported() {
        let s = sensor();
        let r = s.pixel_to_unit_vector(&Vector2::new(1.0, 1.0), DistortionMode::Polynomial);
        assert!(matches!(
            r,
            Err(SceneError::UnsupportedDistortionMode {
                mode: DistortionMode::Polynomial,
                ..
            })
        ));
    }

    #[test]
    fn test_polynomial_requires_coefficients() {
        let s = sensor();
        let r = s.unit_vector_to_pixel(&Vector3::z(), DistortionMode::Polynomial);
        assert!(matches!(r, Err(SceneError::MissingDistortionCoefficients)));
    }

    #[test]
    fn test_polynomial_pinhole_coefficients_agree() {
        let s = sensor();
        let s = s.clone().with_distortion(PolynomialCoefficients::pinhole(&s));
        let dir = Vector3::new(0.02, -0.03, 1.0).normalize();
        let a = s.unit_vector_to_pixel(&dir, DistortionMode::Pinhole).unwrap();
        let b = s
            .unit_vector_to_pixel(&dir, DistortionMode::Polynomial)
            .unwrap();
        assert!((a - b).norm() < 1e-9);
    }

    #[test]
    fn test_polynomial_cross_term() {
        let mut c = [0.0; POLYNOMIAL_TERMS];
        let mut d = [0.0; POLYNOMIAL_TERMS];
        // u = xn^2 * yn, v = yn^4
        c[5 * 2 + 1] = 1.0;
        d[4] = 1.0;
        let s = sensor().with_distortion(PolynomialCoefficients::new(c, d));
        let uv = s
            .unit_vector_to_pixel(&Vector3::new(0.5, 2.0, 1.0), DistortionMode::Polynomial)
            .unwrap();
        assert!((uv.x - 0.5).abs() < 1e-12);
        assert!((uv.y - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(sensor().validate().is_ok());
        let mut s = sensor();
        s.pixel_pitch[0] = 0.0;
        assert!(matches!(s.validate(), Err(SceneError::InvalidConfig(_))));
    }
}
