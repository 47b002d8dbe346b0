//! Frame and rotation utilities.
//!
//! Three frames are in play:
//!
//! - **ECI**: inertial, related to the sensor by the attitude quaternion
//! - **VBS**: sensor body frame, +x right, +y down, +z out along the boresight
//! - **Render**: +x right, +y up, +z toward the viewer, i.e. `(x, -y, -z)` of VBS
//!
//! All functions here are pure and allocation free.

use crate::{Matrix3, Quaternion, Vector3};

/// Below this the vector part of a quaternion has no usable direction
const AXIS_EPSILON: f64 = 1.0e-12;

/// Rotation matrix for a scalar-first unit quaternion.
///
/// For an attitude `q_eci2vbs` the result `R` maps inertial directions into
/// the sensor frame, `v_vbs = R * v_eci`, so row 2 of `R` is the boresight
/// expressed in ECI.
///
/// The quaternion is assumed to be unit norm; this is not checked.
pub fn quaternion_to_rotation(q: &Quaternion) -> Matrix3 {
    nalgebra::UnitQuaternion::new_unchecked(*q)
        .to_rotation_matrix()
        .into_inner()
}

/// Angle (radians) and unit axis of the rotation described by `q`.
///
/// Returns `None` when the rotation is (numerically) the identity,
/// i.e. `q0` is close to +/-1 and the axis is undefined.
pub fn quaternion_to_axis_angle(q: &Quaternion) -> Option<(f64, Vector3)> {
    let axis = q.imag();
    let axis_norm = axis.norm();
    if q.w.abs() >= 1.0 - AXIS_EPSILON || axis_norm < AXIS_EPSILON {
        return None;
    }
    let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
    Some((angle, axis / axis_norm))
}

/// Convert a VBS-frame vector to the render frame
#[inline]
pub fn vbs_to_render(v: &Vector3) -> Vector3 {
    Vector3::new(v.x, -v.y, -v.z)
}

/// Sensor boresight expressed in ECI for the attitude `q_eci2vbs`
pub fn boresight_eci(q_eci2vbs: &Quaternion) -> Vector3 {
    quaternion_to_rotation(q_eci2vbs).row(2).transpose()
}
