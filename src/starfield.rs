//! Star field query and photometric mapping.
//!
//! Per frame the catalog is culled against the sensor boresight, surviving
//! stars are rotated into the VBS frame and their visual magnitude is mapped
//! to a renderable achromatic intensity.

use serde::{Deserialize, Serialize};

use crate::catalogs::{Star, StarCatalog};
use crate::{frames, Matrix3, Quaternion, Vector3};

/// Chord slack so the kd-tree prefilter never drops a boundary star
const CHORD_MARGIN: f64 = 1.0e-9;

/// Linear magnitude to intensity mapping through two anchor points.
///
/// With the defaults magnitude 4 maps to 1.0 and magnitude 9 to 0.0.
/// Outside the anchors the line is extrapolated unless `clamp` is set,
/// so intensities above 1 or below 0 are possible by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnitudeMapping {
    pub bright_mag: f64,
    pub bright_intensity: f64,
    pub dim_mag: f64,
    pub dim_intensity: f64,
    pub clamp: bool,
}

impl Default for MagnitudeMapping {
    fn default() -> Self {
        Self {
            bright_mag: 4.0,
            bright_intensity: 1.0,
            dim_mag: 9.0,
            dim_intensity: 0.0,
            clamp: false,
        }
    }
}

impl MagnitudeMapping {
    /// Scalar intensity for a visual magnitude
    pub fn intensity(&self, mag: f64) -> f64 {
        let a = (self.dim_intensity - self.bright_intensity) / (self.dim_mag - self.bright_mag);
        let b = self.bright_intensity - a * self.bright_mag;
        let dc = a * mag + b;
        if self.clamp {
            let lo = self.bright_intensity.min(self.dim_intensity);
            let hi = self.bright_intensity.max(self.dim_intensity);
            dc.clamp(lo, hi)
        } else {
            dc
        }
    }

    /// Achromatic RGB triple for a visual magnitude
    pub fn rgb(&self, mag: f64) -> Vector3 {
        Vector3::repeat(self.intensity(mag))
    }
}

/// Angular separation in radians between two unit vectors
#[inline]
pub fn angular_separation(a: &Vector3, b: &Vector3) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Stars within `half_fov_deg` of the unit vector `boresight_eci` and no
/// dimmer than `magnitude_threshold`.
///
/// Stars are yielded in catalog order. The returned iterator is lazy and
/// can be cloned to restart the sequence.
pub fn stars_in_fov<'a>(
    catalog: &'a StarCatalog,
    boresight_eci: &Vector3,
    half_fov_deg: f64,
    magnitude_threshold: f64,
) -> FovStars<'a> {
    let half_fov_rad = half_fov_deg.to_radians();
    let boresight = *boresight_eci;

    // Chord length subtending the half angle; beyond pi the whole sphere qualifies
    let chord = if half_fov_rad >= std::f64::consts::PI {
        2.0
    } else {
        2.0 * (half_fov_rad.max(0.0) / 2.0).sin()
    };
    let mut candidates =
        catalog.radius_search([boresight.x, boresight.y, boresight.z], chord + CHORD_MARGIN);
    candidates.sort_unstable();

    FovStars {
        catalog,
        candidates,
        position: 0,
        boresight,
        half_fov_rad,
        magnitude_threshold,
    }
}

/// Lazy cone query result, see [`stars_in_fov`]
#[derive(Debug, Clone)]
pub struct FovStars<'a> {
    catalog: &'a StarCatalog,
    candidates: Vec<usize>,
    position: usize,
    boresight: Vector3,
    half_fov_rad: f64,
    magnitude_threshold: f64,
}

impl<'a> Iterator for FovStars<'a> {
    type Item = &'a Star;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&index) = self.candidates.get(self.position) {
            self.position += 1;
            let star = &self.catalog.items[index];
            if star.v_mag <= self.magnitude_threshold
                && angular_separation(&star.direction(), &self.boresight) <= self.half_fov_rad
            {
                return Some(star);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.candidates.len() - self.position))
    }
}

/// Inertial star direction expressed in the VBS frame.
///
/// `r_eci2vbs` comes from [`frames::quaternion_to_rotation`] and should be
/// computed once per frame.
#[inline]
pub fn rotate_to_sensor_frame(star: &Star, r_eci2vbs: &Matrix3) -> Vector3 {
    r_eci2vbs * star.direction()
}

/// A star ready for point-source rendering
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleStar {
    pub direction_vbs: Vector3,
    pub rgb: Vector3,
}

/// Cone culling and photometric mapping with fixed query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarField {
    pub half_fov_deg: f64,
    pub magnitude_threshold: f64,
    pub mapping: MagnitudeMapping,
}

impl Default for StarField {
    fn default() -> Self {
        Self {
            half_fov_deg: 10.0,
            magnitude_threshold: 6.5,
            mapping: MagnitudeMapping::default(),
        }
    }
}

impl StarField {
    /// Stars visible for the attitude `q_eci2vbs`, in catalog order
    pub fn query(&self, catalog: &StarCatalog, q_eci2vbs: &Quaternion) -> Vec<VisibleStar> {
        let r_eci2vbs = frames::quaternion_to_rotation(q_eci2vbs);
        let boresight = r_eci2vbs.row(2).transpose();
        let stars: Vec<VisibleStar> = stars_in_fov(
            catalog,
            &boresight,
            self.half_fov_deg,
            self.magnitude_threshold,
        )
        .map(|star| VisibleStar {
            direction_vbs: rotate_to_sensor_frame(star, &r_eci2vbs),
            rgb: self.mapping.rgb(star.v_mag),
        })
        .collect();
        tracing::debug!(
            "{} of {} catalog stars in field of view",
            stars.len(),
            catalog.len()
        );
        stars
    }
}
