use std::collections::HashMap;

use super::{MeshHandle, RenderBackend, ShaderKind, TextureHandle, UniformValue, VertexLayout};
use crate::assets::TextureImage;
use crate::Image;

/// Commands issued to a [`RecordingBackend`] in call order
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    UseShader(ShaderKind),
    BindTextures(Option<TextureHandle>, Option<TextureHandle>),
    SetUniform(String, UniformValue),
    Draw(MeshHandle, usize),
    Present,
}

/// Headless backend that records every call.
///
/// Meshes and textures are only counted, never rasterized. Useful for
/// exercising the frame loop without a GPU context.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub commands: Vec<DrawCommand>,
    pub meshes: HashMap<MeshHandle, (VertexLayout, usize)>,
    pub textures: HashMap<TextureHandle, (u32, u32)>,
    /// Image returned from `read_pixels`
    pub framebuffer: Option<Image<u8>>,
    next_handle: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value set for a uniform
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.commands.iter().rev().find_map(|cmd| match cmd {
            DrawCommand::SetUniform(n, v) if n == name => Some(v),
            _ => None,
        })
    }

    /// Draw calls in issue order
    pub fn draws(&self) -> Vec<(MeshHandle, usize)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Draw(mesh, n) => Some((*mesh, *n)),
                _ => None,
            })
            .collect()
    }

    /// Commands issued since the last `Clear`
    pub fn last_frame(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|cmd| *cmd == DrawCommand::Clear)
            .unwrap_or(0);
        &self.commands[start..]
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_mesh(&mut self, vertices: &[f32], layout: VertexLayout) -> MeshHandle {
        let handle = MeshHandle(self.allocate());
        let vertex_count = vertices.len() / layout.floats_per_vertex();
        self.meshes.insert(handle, (layout, vertex_count));
        handle
    }

    fn upload_texture(&mut self, texture: &TextureImage) -> TextureHandle {
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle, (texture.width, texture.height));
        handle
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn use_shader(&mut self, shader: ShaderKind) {
        self.commands.push(DrawCommand::UseShader(shader));
    }

    fn bind_textures(&mut self, diffuse: Option<TextureHandle>, specular: Option<TextureHandle>) {
        self.commands.push(DrawCommand::BindTextures(diffuse, specular));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(DrawCommand::SetUniform(name.to_string(), value));
    }

    fn draw(&mut self, mesh: MeshHandle, triangle_count: usize) {
        self.commands.push(DrawCommand::Draw(mesh, triangle_count));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn present(&mut self) {
        self.commands.push(DrawCommand::Present);
    }

    fn read_pixels(&mut self) -> Option<Image<u8>> {
        self.framebuffer.clone()
    }
}
