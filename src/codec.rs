//! Image transport encoding: PNG bytes wrapped in standard base64.

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid image: {0}")]
    Image(#[from] image::ImageError),
}

/// Serializes a bitmap to PNG and base64-encodes it.
pub fn encode(img: &DynamicImage) -> Result<String, CodecError> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageOutputFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(&png_bytes))
}

pub fn decode(b64: &str) -> Result<DynamicImage, CodecError> {
    let bytes = general_purpose::STANDARD.decode(b64.trim())?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Decodes an uploaded file (any container `image` understands) and encodes it for transport.
pub fn reencode(bytes: &[u8]) -> Result<String, CodecError> {
    let img = image::load_from_memory(bytes)?;
    encode(&img)
}

/// What a base64 image turned out to be once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspected {
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

fn mime_of(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Checks that a base64 string holds a decodable image without re-encoding it.
pub fn inspect(b64: &str) -> Result<Inspected, CodecError> {
    let bytes = general_purpose::STANDARD.decode(b64.trim())?;
    let format = image::guess_format(&bytes)?;
    let img = image::load_from_memory_with_format(&bytes, format)?;
    Ok(Inspected {
        mime: mime_of(format),
        width: img.width(),
        height: img.height(),
    })
}

/// Wraps base64 image data, as-is, in a `data:` URL the browser can display.
pub fn data_url(mime: &str, b64: &str) -> String {
    format!("data:{mime};base64,{}", b64.trim())
}
