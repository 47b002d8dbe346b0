mod assets;
pub mod backend;
pub mod camera;
pub mod catalogs;
pub mod config;
mod error;
pub mod frames;
pub mod scene;
pub mod screenshot;
pub mod starfield;
mod stimulator;

pub use assets::{Assembly, AssetLoader, MaterialTextures, Part, TextureImage, Triangle};
pub use camera::{DistortionMode, PolynomialCoefficients, SensorModel};
pub use catalogs::{Star, StarCatalog};
pub use config::{SceneConfig, StarFieldConfig, StimulatorConfig};
pub use error::SceneError;
pub use scene::{BodyInstance, BodyRole, BodySpec, LightDescriptor, Scene};
pub use starfield::{MagnitudeMapping, StarField, VisibleStar};
pub use stimulator::{OpticalStimulator, RendezvousState};

/// Common types used in the library
///
/// Attitude quaternions are scalar-first: `Quaternion::new(q0, q1, q2, q3)`.
pub type Quaternion = nalgebra::Quaternion<f64>;
pub type UnitQuaternion = nalgebra::UnitQuaternion<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;

pub type Image<T> = image::ImageBuffer<image::Rgb<T>, Vec<T>>;
