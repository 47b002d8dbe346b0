use crate::{Quaternion, UnitQuaternion, Vector3};

/// Source of sensor attitude relative to the inertial frame
pub trait PointingProvider {
    /// Rotation taking ECI directions into the VBS frame
    fn vbs_from_eci(&self) -> UnitQuaternion;

    /// Scalar-first attitude quaternion `q_eci2vbs` as consumed by the scene
    fn attitude(&self) -> Quaternion {
        *self.vbs_from_eci().quaternion()
    }

    fn boresight_eci(&self) -> Vector3 {
        let q = self.vbs_from_eci();
        q.inverse().transform_vector(&Vector3::z_axis())
    }

    fn right_ascension_rad(&self) -> f64 {
        let boresight = self.boresight_eci();
        boresight
            .y
            .atan2(boresight.x)
            .rem_euclid(2.0 * std::f64::consts::PI)
    }

    fn declination_rad(&self) -> f64 {
        self.boresight_eci().z.asin()
    }
}

/// Attitude held constant in the inertial frame
pub struct FixedInertialPointing {
    fixed_vbs_from_eci: UnitQuaternion,
}

impl PointingProvider for FixedInertialPointing {
    fn vbs_from_eci(&self) -> UnitQuaternion {
        self.fixed_vbs_from_eci
    }
}

impl FixedInertialPointing {
    pub fn new(orientation: UnitQuaternion) -> Self {
        Self {
            fixed_vbs_from_eci: orientation,
        }
    }

    /// Wrap a raw scalar-first attitude quaternion, renormalizing it
    pub fn from_attitude(q_eci2vbs: Quaternion) -> Self {
        Self::new(UnitQuaternion::from_quaternion(q_eci2vbs))
    }

    pub fn from_ra_dec_roll_rad(ra_rad: f64, dec_rad: f64, roll_rad: f64) -> Self {
        // Rotates a frame with xhat along the boresight into one with zhat along it
        let qxout2zout =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -std::f64::consts::FRAC_PI_2)
                * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -std::f64::consts::FRAC_PI_2);

        let q_ra = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -ra_rad);
        let q_dec = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), dec_rad);
        let q_roll = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -roll_rad);
        Self::new(qxout2zout * q_roll * q_dec * q_ra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames;

    #[test]
    fn test_fixed_inertial_pointing() {
        let ra = 10.0_f64.to_radians();
        let dec = 20.0_f64.to_radians();
        let pointing = FixedInertialPointing::from_ra_dec_roll_rad(ra, dec, 0.4);

        assert!((pointing.right_ascension_rad() - ra).abs() < 1e-10);
        assert!((pointing.declination_rad() - dec).abs() < 1e-10);

        let v = Vector3::new(ra.cos() * dec.cos(), ra.sin() * dec.cos(), dec.sin());
        let v_vbs = pointing.vbs_from_eci().transform_vector(&v);
        assert!(v_vbs.angle(&Vector3::z()) < 1e-10);
    }

    #[test]
    fn test_attitude_agrees_with_frame_utilities() {
        let pointing = FixedInertialPointing::from_ra_dec_roll_rad(1.2, -0.3, 2.0);
        let q = pointing.attitude();
        let r = frames::quaternion_to_rotation(&q);
        let v = Vector3::new(0.3, -0.4, 0.5).normalize();
        let expected = pointing.vbs_from_eci().transform_vector(&v);
        assert!((r * v - expected).norm() < 1e-12);
        assert!((frames::boresight_eci(&q) - pointing.boresight_eci()).norm() < 1e-12);
    }
}
