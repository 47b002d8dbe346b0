//! Rendering backend seam.
//!
//! The composer never creates a GPU context. It talks to whatever owns one
//! through [`RenderBackend`]: upload geometry and textures once at scene
//! setup, then per frame set uniforms and issue draws.

mod recording;

pub use recording::{DrawCommand, RecordingBackend};

use serde::{Deserialize, Serialize};

use crate::assets::TextureImage;
use crate::Image;

/// Backend handle for an uploaded vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Backend handle for an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Interleaved vertex formats produced by the asset layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexLayout {
    /// `[position, normal, rgb]`, 9 floats per vertex
    #[default]
    Colored,
    /// `[position, normal, uv]`, 8 floats per vertex
    Textured,
}

impl VertexLayout {
    pub fn floats_per_vertex(self) -> usize {
        match self {
            VertexLayout::Colored => 9,
            VertexLayout::Textured => 8,
        }
    }
}

/// Shader program selected before setting uniforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    /// Lit, per-vertex colored geometry
    Colored,
    /// Lit, texture mapped geometry
    Textured,
    /// Unlit star marker tinted by the `RGB` uniform
    Star,
}

impl From<VertexLayout> for ShaderKind {
    fn from(layout: VertexLayout) -> Self {
        match layout {
            VertexLayout::Colored => ShaderKind::Colored,
            VertexLayout::Textured => ShaderKind::Textured,
        }
    }
}

/// Uniform values accepted by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(nalgebra::Vector3<f32>),
    Mat4(nalgebra::Matrix4<f32>),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<crate::Vector3> for UniformValue {
    fn from(v: crate::Vector3) -> Self {
        UniformValue::Vec3(v.cast::<f32>())
    }
}

impl From<crate::Matrix4> for UniformValue {
    fn from(m: crate::Matrix4) -> Self {
        UniformValue::Mat4(m.cast::<f32>())
    }
}

/// Operations the scene composer needs from a rasterizer
pub trait RenderBackend {
    /// Upload an interleaved vertex buffer
    fn upload_mesh(&mut self, vertices: &[f32], layout: VertexLayout) -> MeshHandle;

    fn upload_texture(&mut self, texture: &TextureImage) -> TextureHandle;

    /// Release a mesh uploaded with [`RenderBackend::upload_mesh`]
    fn release_mesh(&mut self, mesh: MeshHandle);

    fn release_texture(&mut self, texture: TextureHandle);

    fn use_shader(&mut self, shader: ShaderKind);

    /// Bind diffuse (unit 0) and specular (unit 1) maps; `None` binds nothing
    fn bind_textures(&mut self, diffuse: Option<TextureHandle>, specular: Option<TextureHandle>);

    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn draw(&mut self, mesh: MeshHandle, triangle_count: usize);

    fn clear(&mut self);

    fn present(&mut self);

    /// Read back the presented frame as 8-bit RGB, if the backend can
    fn read_pixels(&mut self) -> Option<Image<u8>> {
        None
    }
}
