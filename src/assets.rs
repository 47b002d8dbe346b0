//! Asset-loading seam and vertex buffer construction.
//!
//! Geometry arrives from an [`AssetLoader`] in millimetres and is converted
//! to metres while interleaving the vertex buffers.

use std::path::{Path, PathBuf};

use crate::backend::VertexLayout;
use crate::{SceneError, Vector3};

/// Geometry unit conversion applied at load time
pub const MM_TO_M: f32 = 1.0 / 1000.0;

/// Offset (mm) added to sphere vertices so no vertex sits on a pole
const SPHERE_POLE_OFFSET_MM: f64 = 1.0e-1;

#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vector3; 3],
    pub normal: Vector3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTextures {
    pub diffuse: Option<PathBuf>,
    pub specular: Option<PathBuf>,
}

/// One rigid part of an assembly
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub triangles: Vec<Triangle>,
    /// Linear RGB in `[0, 1]`
    pub color: [f32; 3],
    pub textures: MaterialTextures,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub parts: Vec<Part>,
}

impl Assembly {
    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.triangles.len()).sum()
    }
}

/// Decoded texture pixels, tightly packed rows
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// 1 (grey), 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    pub data: Vec<u8>,
}

/// Supplier of geometry and material images
pub trait AssetLoader {
    /// Parse an assembly description into parts
    fn parse_assembly(&self, path: &Path) -> Result<Assembly, SceneError>;

    /// Decode a texture image file
    fn load_texture(&self, path: &Path) -> Result<TextureImage, SceneError> {
        let img = image::open(path).map_err(|e| SceneError::TextureLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let (width, height) = (img.width(), img.height());
        let (channels, data) = match img.color().channel_count() {
            1 => (1, img.to_luma8().into_raw()),
            3 => (3, img.to_rgb8().into_raw()),
            _ => (4, img.to_rgba8().into_raw()),
        };
        Ok(TextureImage {
            width,
            height,
            channels,
            data,
        })
    }
}

/// Interleave `part` as `[position (m), normal, rgb]` per vertex
pub fn colored_vertices(part: &Part) -> Vec<f32> {
    let [r, g, b] = part.color;
    let mut vertices = Vec::with_capacity(part.triangles.len() * 3 * 9);
    for t in &part.triangles {
        for v in &t.vertices {
            vertices.extend_from_slice(&[
                v.x as f32 * MM_TO_M,
                v.y as f32 * MM_TO_M,
                v.z as f32 * MM_TO_M,
                t.normal.x as f32,
                t.normal.y as f32,
                t.normal.z as f32,
                r,
                g,
                b,
            ]);
        }
    }
    vertices
}

/// Equirectangular texture coordinates of a point on a sphere
fn sphere_uv(v: &Vector3) -> (f32, f32) {
    let xy_norm = (v.x * v.x + v.y * v.y).sqrt();
    let latitude = v.z.atan2(xy_norm).to_degrees();
    let longitude = v.y.atan2(v.x).to_degrees();
    ((longitude / 360.0 + 0.5) as f32, (0.5 - latitude / 180.0) as f32)
}

/// Interleave `part` as `[position (m), normal, uv]` per vertex using a
/// latitude/longitude mapping of each vertex
pub fn textured_sphere_vertices(part: &Part) -> Vec<f32> {
    let offset = Vector3::repeat(SPHERE_POLE_OFFSET_MM);
    let mut vertices = Vec::with_capacity(part.triangles.len() * 3 * 8);
    for t in &part.triangles {
        for v in &t.vertices {
            let v = v + offset;
            let (u, w) = sphere_uv(&v);
            vertices.extend_from_slice(&[
                v.x as f32 * MM_TO_M,
                v.y as f32 * MM_TO_M,
                v.z as f32 * MM_TO_M,
                t.normal.x as f32,
                t.normal.y as f32,
                t.normal.z as f32,
                u,
                w,
            ]);
        }
    }
    vertices
}

pub fn part_vertices(part: &Part, layout: VertexLayout) -> Vec<f32> {
    match layout {
        VertexLayout::Colored => colored_vertices(part),
        VertexLayout::Textured => textured_sphere_vertices(part),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Loader serving assemblies from memory
    #[derive(Default)]
    pub struct MemoryLoader {
        pub assemblies: HashMap<PathBuf, Assembly>,
        pub textures: HashMap<PathBuf, TextureImage>,
    }

    impl AssetLoader for MemoryLoader {
        fn parse_assembly(&self, path: &Path) -> Result<Assembly, SceneError> {
            self.assemblies
                .get(path)
                .cloned()
                .ok_or_else(|| SceneError::AssetParse {
                    path: path.to_path_buf(),
                    reason: "not found".into(),
                })
        }

        fn load_texture(&self, path: &Path) -> Result<TextureImage, SceneError> {
            self.textures
                .get(path)
                .cloned()
                .ok_or_else(|| SceneError::TextureLoad {
                    path: path.to_path_buf(),
                    reason: "not found".into(),
                })
        }
    }

    pub fn triangle_part(n: usize, color: [f32; 3]) -> Part {
        let triangles = (0..n)
            .map(|i| Triangle {
                vertices: [
                    Vector3::new(1000.0 * i as f64, 0.0, 0.0),
                    Vector3::new(0.0, 2000.0, 0.0),
                    Vector3::new(0.0, 0.0, -500.0),
                ],
                normal: Vector3::z(),
            })
            .collect();
        Part {
            triangles,
            color,
            textures: MaterialTextures::default(),
        }
    }

    #[test]
    fn test_colored_vertices_convert_mm() {
        let part = triangle_part(2, [0.1, 0.2, 0.3]);
        let v = colored_vertices(&part);
        assert_eq!(v.len(), 2 * 3 * 9);
        // second triangle, first vertex
        assert!((v[27] - 1.0).abs() < 1e-6);
        // second vertex y of first triangle
        assert!((v[10] - 2.0).abs() < 1e-6);
        assert!((v[2 * 9 + 2] + 0.5).abs() < 1e-6);
        assert_eq!(&v[3..9], &[0.0, 0.0, 1.0, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_sphere_uv() {
        let part = Part {
            triangles: vec![Triangle {
                vertices: [
                    Vector3::new(1000.0, 0.0, 0.0),
                    Vector3::new(0.0, 1000.0, 0.0),
                    Vector3::new(0.0, 0.0, 1000.0),
                ],
                normal: Vector3::x(),
            }],
            color: [1.0; 3],
            textures: MaterialTextures::default(),
        };
        let v = textured_sphere_vertices(&part);
        assert_eq!(v.len(), 3 * 8);
        // +x on the equator: u = 0.5, v = 0.5
        assert!((v[6] - 0.5).abs() < 1e-4);
        assert!((v[7] - 0.5).abs() < 1e-4);
        // +y: longitude 90 degrees
        assert!((v[8 + 6] - 0.75).abs() < 1e-4);
        // near the north pole: v close to 0
        assert!(v[16 + 7] < 1e-3);
        // positions carry the pole offset
        assert!((v[0] - 1.0001).abs() < 1e-6);
    }

    #[test]
    fn test_missing_texture_file() {
        let loader = MemoryLoader::default();
        struct FileOnly;
        impl AssetLoader for FileOnly {
            fn parse_assembly(&self, _path: &Path) -> Result<Assembly, SceneError> {
                Ok(Assembly::default())
            }
        }
        let r = FileOnly.load_texture(Path::new("/nonexistent/texture.png"));
        assert!(matches!(r, Err(SceneError::TextureLoad { .. })));
        assert!(loader.parse_assembly(Path::new("missing.csv")).is_err());
    }
}
