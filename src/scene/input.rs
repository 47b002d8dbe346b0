//! Interactive inspection input.
//!
//! Key state is passed in explicitly each frame rather than read from
//! process-wide flags.

use crate::{Matrix4, Vector3};

/// Key and timing state for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputContext {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub escape: bool,
    /// Seconds since the previous frame
    pub delta_time: f64,
}

/// Free-flying viewpoint in the render frame.
///
/// At rest it sits at the sensor origin looking down -z (the boresight),
/// which makes the view matrix the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionCamera {
    pub position: Vector3,
    /// Metres per second
    pub speed: f64,
    pub close_requested: bool,
}

impl Default for InspectionCamera {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            speed: 2.5,
            close_requested: false,
        }
    }
}

impl InspectionCamera {
    pub fn reset(&mut self) {
        self.position = Vector3::zeros();
        self.close_requested = false;
    }

    /// Apply one frame of keyboard input
    pub fn process_input(&mut self, input: &InputContext) {
        if input.escape {
            self.close_requested = true;
        }
        let step = self.speed * input.delta_time;
        if input.forward {
            self.position -= Vector3::z() * step;
        }
        if input.backward {
            self.position += Vector3::z() * step;
        }
        if input.left {
            self.position -= Vector3::x() * step;
        }
        if input.right {
            self.position += Vector3::x() * step;
        }
    }

    pub fn view_matrix(&self) -> Matrix4 {
        let target = nalgebra::Point3::from(self.position - Vector3::z());
        nalgebra::Isometry3::look_at_rh(
            &nalgebra::Point3::from(self.position),
            &target,
            &Vector3::y(),
        )
        .to_homogeneous()
    }
}
