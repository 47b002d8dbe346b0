//! Frame capture to image files.

use std::path::Path;

use image::{ExtendedColorType, ImageFormat};

use crate::{Image, SceneError};

/// Encoder choice from a file extension, ignoring case.
///
/// Only PNG, JPEG, BMP and TGA are accepted.
pub fn format_from_path(path: &Path) -> Result<ImageFormat, SceneError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => Ok(ImageFormat::Png),
        Some("jpg") | Some("jpeg") => Ok(ImageFormat::Jpeg),
        Some("bmp") => Ok(ImageFormat::Bmp),
        Some("tga") => Ok(ImageFormat::Tga),
        _ => Err(SceneError::UnsupportedImageFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Destination for captured 8-bit RGB frames
pub trait ImageSink {
    fn write_rgb(&mut self, path: &Path, frame: &Image<u8>) -> Result<(), SceneError>;
}

/// Writes frames to disk, picking the encoder from the extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageSink;

impl ImageSink for FileImageSink {
    fn write_rgb(&mut self, path: &Path, frame: &Image<u8>) -> Result<(), SceneError> {
        let format = format_from_path(path)?;
        image::save_buffer_with_format(
            path,
            frame.as_raw(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
            format,
        )
        .map_err(|source| SceneError::ImageWrite {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            "Saved {}x{} screenshot to {}",
            frame.width(),
            frame.height(),
            path.display()
        );
        Ok(())
    }
}

/// Write `frame` to `path`, logging and skipping unsupported formats.
///
/// Returns whether anything was written. Encoder failures still propagate.
pub fn save_frame(
    sink: &mut impl ImageSink,
    path: &Path,
    frame: &Image<u8>,
) -> Result<bool, SceneError> {
    match sink.write_rgb(path, frame) {
        Ok(()) => Ok(true),
        Err(e @ SceneError::UnsupportedImageFormat { .. }) => {
            tracing::warn!("{}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Image<u8> {
        Image::from_fn(width, height, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 16) as u8, 128])
        })
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            format_from_path(Path::new("frame.PNG")).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            format_from_path(Path::new("a/b/frame.Jpg")).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            format_from_path(Path::new("frame.bmp")).unwrap(),
            ImageFormat::Bmp
        );
        assert_eq!(
            format_from_path(Path::new("frame.tga")).unwrap(),
            ImageFormat::Tga
        );
        assert!(matches!(
            format_from_path(Path::new("frame.gif")),
            Err(SceneError::UnsupportedImageFormat { .. })
        ));
        assert!(format_from_path(Path::new("frame")).is_err());
    }

    #[test]
    fn test_png_written_and_readable() {
        let path = std::env::temp_dir().join(format!("optistim_shot_{}.png", std::process::id()));
        let frame = gradient(8, 4);
        assert!(save_frame(&mut FileImageSink, &path, &frame).unwrap());

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (8, 4));
        assert_eq!(back.as_raw(), frame.as_raw());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unsupported_format_skipped() {
        let path = std::env::temp_dir().join("optistim_shot.webp");
        let written = save_frame(&mut FileImageSink, &path, &gradient(2, 2)).unwrap();
        assert!(!written);
        assert!(!path.exists());
    }
}
