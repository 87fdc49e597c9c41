//! Download naming, image saving, and format conversion.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::GenerateError;

/// Prefix of auto-generated download names.
const DOWNLOAD_PREFIX: &str = "dreamo-image";

/// Generate a download filename: `dreamo-image-<unix millis>.jpg`.
#[must_use]
pub fn auto_filename() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("{DOWNLOAD_PREFIX}-{millis}.jpg")
}

/// Resolve the output path: use explicit path or auto-generate.
#[must_use]
pub fn resolve_output_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(auto_filename()),
    }
}

/// Save downloaded image bytes as JPEG, converting when they are another format.
///
/// # Errors
///
/// Returns an error if the bytes are not a recognizable image, conversion
/// fails, or the file cannot be written.
pub fn save_as_jpeg(data: &[u8], output_path: &Path) -> Result<(), GenerateError> {
    let format = image::guess_format(data)
        .map_err(|e| GenerateError::ImageConversion(format!("Unrecognized image data: {e}")))?;

    if format == image::ImageFormat::Jpeg {
        return std::fs::write(output_path, data).map_err(GenerateError::Io);
    }

    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| GenerateError::ImageConversion(format!("Failed to decode image: {e}")))?;
    // JPEG has no alpha channel.
    image::DynamicImage::ImageRgb8(img.to_rgb8())
        .save_with_format(output_path, image::ImageFormat::Jpeg)
        .map_err(|e| GenerateError::ImageConversion(format!("Failed to save as jpeg: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(format: image::ImageFormat) -> Vec<u8> {
        let img = image::DynamicImage::new_rgba8(2, 2);
        let mut buf = std::io::Cursor::new(Vec::<u8>::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn auto_filename_format() {
        let name = auto_filename();
        assert!(name.starts_with("dreamo-image-"));
        assert_eq!(Path::new(&name).extension().unwrap(), "jpg");
    }

    #[test]
    fn resolve_explicit() {
        let path = resolve_output_path(Some(Path::new("my-image.jpg")));
        assert_eq!(path, PathBuf::from("my-image.jpg"));
    }

    #[test]
    fn resolve_auto() {
        let path = resolve_output_path(None);
        assert!(path.to_str().unwrap().starts_with("dreamo-image-"));
    }

    #[test]
    fn png_is_converted_to_jpeg() {
        let out = std::env::temp_dir().join("dreamgate_output_convert.jpg");
        let _ = std::fs::remove_file(&out);

        save_as_jpeg(&encode(image::ImageFormat::Png), &out).unwrap();

        let data = std::fs::read(&out).unwrap();
        assert_eq!(&data[..3], &[0xFF, 0xD8, 0xFF], "Output should be a JPEG file");
        let _ = std::fs::remove_file(&out);
    }

    #[test]
    fn garbage_is_rejected() {
        let out = std::env::temp_dir().join("dreamgate_output_garbage.jpg");
        let err = save_as_jpeg(b"definitely not an image", &out).unwrap_err();
        assert!(matches!(err, GenerateError::ImageConversion(_)));
    }
}
