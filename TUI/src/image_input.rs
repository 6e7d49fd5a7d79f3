//! Image ingestion for the VISION tab: files, clipboard and captured frames
//! all end up as a PNG data URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::path::Path;

use crate::error::ImageError;
use crate::solver::InlineImage;

/// Maximum image size in bytes (8 MB).
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

const PNG_PREFIX: &str = "data:image/png;base64,";

/// Read an image file asynchronously and normalize it to a PNG data URL.
pub async fn load_image_file(path: impl AsRef<Path>) -> Result<String, ImageError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_BYTES));
    }
    let png = to_png(bytes)?;
    png_data_url(&png)
}

/// Grab an image from the system clipboard.
pub fn read_clipboard_image() -> Result<String, ImageError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ImageError::Clipboard(e.to_string()))?;
    let data = clipboard
        .get_image()
        .map_err(|e| ImageError::Clipboard(e.to_string()))?;

    let png = encode_rgba(&data.bytes, data.width as u32, data.height as u32)?;
    png_data_url(&png)
}

pub fn png_data_url(png: &[u8]) -> Result<String, ImageError> {
    if png.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(png.len(), MAX_IMAGE_BYTES));
    }
    Ok(format!("{}{}", PNG_PREFIX, BASE64.encode(png)))
}

/// Split `data:<mime>;base64,<payload>` into the pieces the solver sends.
pub fn split_data_url(url: &str) -> Result<InlineImage, ImageError> {
    let rest = url.strip_prefix("data:").ok_or(ImageError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;
    let mime = meta.strip_suffix(";base64").ok_or(ImageError::NotDataUrl)?;
    if mime.is_empty() || payload.is_empty() {
        return Err(ImageError::NotDataUrl);
    }
    Ok(InlineImage { mime_type: mime.to_string(), data: payload.to_string() })
}

/// Decoded size of the payload, for the status line.
pub fn payload_bytes(url: &str) -> usize {
    split_data_url(url)
        .ok()
        .and_then(|img| BASE64.decode(img.data).ok())
        .map(|bytes| bytes.len())
        .unwrap_or(0)
}

fn to_png(bytes: Vec<u8>) -> Result<Vec<u8>, ImageError> {
    if is_png(&bytes) {
        return Ok(bytes);
    }
    let img = image::load_from_memory(&bytes)?;
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

fn encode_rgba(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ImageError> {
    use image::{ImageBuffer, RgbaImage};

    let img: RgbaImage = ImageBuffer::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| ImageError::Clipboard("invalid RGBA buffer dimensions".into()))?;
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 8 && data[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::io::Write;

    fn tiny_image(format: image::ImageFormat) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_pixel(2, 2, Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn test_split_data_url() {
        let img = split_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data, "AAAA");

        assert!(split_data_url("image/png;base64,AAAA").is_err());
        assert!(split_data_url("data:image/png,AAAA").is_err());
        assert!(split_data_url("data:image/png;base64,").is_err());
    }

    #[test]
    fn test_png_data_url_and_size() {
        let png = tiny_image(image::ImageFormat::Png);
        let url = png_data_url(&png).unwrap();

        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(payload_bytes(&url), png.len());
    }

    #[test]
    fn test_png_data_url_too_large() {
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(png_data_url(&big), Err(ImageError::TooLarge(_, _))));
    }

    #[test]
    fn test_to_png_reencodes_jpeg() {
        let jpeg = tiny_image(image::ImageFormat::Jpeg);
        assert!(!is_png(&jpeg));

        let png = to_png(jpeg).unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn test_encode_rgba_rejects_bad_dimensions() {
        assert!(encode_rgba(&[0u8; 4], 2, 2).is_err());
        assert!(is_png(&encode_rgba(&[0u8; 16], 2, 2).unwrap()));
    }

    #[tokio::test]
    async fn test_load_image_file() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&tiny_image(image::ImageFormat::Png)).unwrap();

        let url = load_image_file(file.path()).await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_load_image_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an image").unwrap();

        assert!(matches!(load_image_file(file.path()).await, Err(ImageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        assert!(matches!(
            load_image_file("/nonexistent/problem.png").await,
            Err(ImageError::Io(_))
        ));
    }
}
