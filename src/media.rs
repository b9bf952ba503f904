//! Upload validation and transport encoding for image payloads

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, ImageReader};

/// Formats the generation service accepts as-is; anything else is
/// re-encoded to PNG before upload.
const TRANSPORT_MIMES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// A base64 image payload ready for the generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportImage {
    pub mime: String,
    pub data: String,
}

/// Best-effort MIME type for an upload: file extension first, content
/// sniffing as fallback.
pub fn sniff_mime(file_name: &str, bytes: &[u8]) -> String {
    if let Some(guess) = mime_guess::from_path(file_name).first() {
        if guess.type_() == mime_guess::mime::IMAGE {
            return guess.essence_str().to_string();
        }
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => "application/octet-stream".to_string(),
    }
}

/// Reads image dimensions from the header without a full decode.
/// Doubles as the upload validity check.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("Failed to read image: {}", e))?
        .into_dimensions()
        .map_err(|e| format!("Not a supported image: {}", e))
}

/// Encodes the effective input for the generation request. Formats the
/// service understands pass through untouched; everything else is decoded
/// and re-encoded as PNG.
pub fn encode_for_transport(bytes: &[u8], mime: &str) -> Result<TransportImage, String> {
    if TRANSPORT_MIMES.contains(&mime) {
        return Ok(TransportImage {
            mime: mime.to_string(),
            data: BASE64.encode(bytes),
        });
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| format!("Failed to decode image for upload: {}", e))?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| format!("Failed to re-encode image: {}", e))?;

    Ok(TransportImage {
        mime: "image/png".to_string(),
        data: BASE64.encode(&png),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn bmp_fixture() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)
            .unwrap();
        buf
    }

    #[test]
    fn png_passes_through_untouched() {
        let bytes = png_fixture(2, 2);
        let encoded = encode_for_transport(&bytes, "image/png").unwrap();
        assert_eq!(encoded.mime, "image/png");
        assert_eq!(BASE64.decode(&encoded.data).unwrap(), bytes);
    }

    #[test]
    fn bmp_is_reencoded_to_png() {
        let bytes = bmp_fixture();
        let encoded = encode_for_transport(&bytes, "image/bmp").unwrap();
        assert_eq!(encoded.mime, "image/png");

        let decoded = BASE64.decode(&encoded.data).unwrap();
        assert_eq!(image::guess_format(&decoded).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn garbage_bytes_fail_encoding() {
        assert!(encode_for_transport(b"not an image", "text/plain").is_err());
    }

    #[test]
    fn probe_reads_header_dimensions() {
        let bytes = png_fixture(3, 5);
        assert_eq!(probe_dimensions(&bytes).unwrap(), (3, 5));
        assert!(probe_dimensions(b"junk").is_err());
    }

    #[test]
    fn sniff_prefers_extension_then_content() {
        assert_eq!(sniff_mime("photo.JPG", &[]), "image/jpeg");
        assert_eq!(sniff_mime("photo.png", &[]), "image/png");

        let bytes = png_fixture(1, 1);
        assert_eq!(sniff_mime("download.tmp", &bytes), "image/png");
        assert_eq!(sniff_mime("notes.tmp", b"junk"), "application/octet-stream");
    }
}
