pub mod kdtree;
pub mod loader;

use rkyv::{Archive, Deserialize, Serialize};

use crate::Vector3;

/// A catalog star: inertial unit direction and visual magnitude
/// (lower is brighter)
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Star {
    pub eci_vec: [f64; 3],
    pub v_mag: f64,
}

impl Star {
    pub fn new(direction: Vector3, v_mag: f64) -> Self {
        let n = direction.normalize();
        Self {
            eci_vec: [n.x, n.y, n.z],
            v_mag,
        }
    }

    pub fn from_ra_dec_deg(ra_deg: f64, dec_deg: f64, v_mag: f64) -> Self {
        let ra_rad = ra_deg.to_radians();
        let dec_rad = dec_deg.to_radians();
        Self {
            eci_vec: [
                dec_rad.cos() * ra_rad.cos(),
                dec_rad.cos() * ra_rad.sin(),
                dec_rad.sin(),
            ],
            v_mag,
        }
    }

    pub fn direction(&self) -> Vector3 {
        Vector3::from(self.eci_vec)
    }
}

impl kdtree::KdPoint<3> for Star {
    fn point(&self) -> [f64; 3] {
        self.eci_vec
    }
}

/// Immutable star catalog.
///
/// Stars keep their load order; the kd-tree index only accelerates
/// cone searches.
pub type StarCatalog = kdtree::KdTree<Star, 3>;
