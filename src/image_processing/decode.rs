use std::fmt;
use std::path::PathBuf;

use image::{ImageFormat, RgbImage};

use crate::error::{PipelineError, PipelineResult};

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Still-image encodings accepted as frame sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Unsupported,
}

impl SourceFormat {
    /// Identify the encoding from the leading bytes of the buffer.
    ///
    /// File names and declared content types are never consulted.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(PNG_SIGNATURE) {
            SourceFormat::Png
        } else if bytes.starts_with(JPEG_SIGNATURE) {
            SourceFormat::Jpeg
        } else {
            SourceFormat::Unsupported
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            SourceFormat::Jpeg => Some(ImageFormat::Jpeg),
            SourceFormat::Png => Some(ImageFormat::Png),
            SourceFormat::Unsupported => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Jpeg => "JPEG",
            SourceFormat::Png => "PNG",
            SourceFormat::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// One uploaded image: the raw bytes plus the sniffed format tag.
///
/// `origin` is informational only (reports, log lines).
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    format: SourceFormat,
    origin: Option<PathBuf>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        let format = SourceFormat::sniff(&bytes);
        Self {
            bytes,
            format,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn origin(&self) -> Option<&PathBuf> {
        self.origin.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode, consuming the buffer.
    pub fn decode(self) -> PipelineResult<RgbImage> {
        decode(&self.bytes)
    }
}

/// Decode a JPEG or PNG buffer into a full-colour RGB grid.
///
/// Any alpha channel is dropped; the output container has no transparency.
pub fn decode(bytes: &[u8]) -> PipelineResult<RgbImage> {
    let format = SourceFormat::sniff(bytes);
    let image_format = format.image_format().ok_or(PipelineError::UnsupportedFormat)?;

    let img = image::load_from_memory_with_format(bytes, image_format)
        .map_err(|e| PipelineError::corrupt(format, e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::corrupt(
            format,
            format!("decoded to empty {}x{} image", img.width(), img.height()),
        ));
    }

    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_fixture(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 10 % 256) as u8, (y * 10 % 256) as u8, 128])
        })
    }

    #[test]
    fn test_sniff_signatures() {
        let png = encode_fixture(&gradient(4, 4), ImageFormat::Png);
        let jpeg = encode_fixture(&gradient(4, 4), ImageFormat::Jpeg);

        assert_eq!(SourceFormat::sniff(&png), SourceFormat::Png);
        assert_eq!(SourceFormat::sniff(&jpeg), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::sniff(b"GIF89a......"), SourceFormat::Unsupported);
        assert_eq!(SourceFormat::sniff(&[]), SourceFormat::Unsupported);
    }

    #[test]
    fn test_decode_png_is_lossless() {
        let img = gradient(7, 5);
        let decoded = decode(&encode_fixture(&img, ImageFormat::Png)).unwrap();

        assert_eq!(decoded.dimensions(), (7, 5));
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_decode_jpeg_dimensions() {
        let decoded = decode(&encode_fixture(&gradient(16, 9), ImageFormat::Jpeg)).unwrap();
        assert_eq!(decoded.dimensions(), (16, 9));
    }

    #[test]
    fn test_decode_drops_alpha() {
        let rgba: RgbaImage = ImageBuffer::from_pixel(3, 3, Rgba([10, 20, 30, 0]));
        let mut buffer = Cursor::new(Vec::new());
        rgba.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let decoded = decode(buffer.get_ref()).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_unsupported_format() {
        let result = decode(b"BM this is not a supported bitmap");
        assert!(matches!(result, Err(PipelineError::UnsupportedFormat)));
    }

    #[test]
    fn test_decode_truncated_png_is_corrupt() {
        let png = encode_fixture(&gradient(32, 32), ImageFormat::Png);
        let truncated = &png[..png.len() / 2];

        match decode(truncated) {
            Err(PipelineError::CorruptData { format, .. }) => {
                assert_eq!(format, SourceFormat::Png)
            }
            other => panic!("expected CorruptData, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_jpeg_signature_with_garbage_body() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01, 0x02];
        assert!(matches!(
            decode(&bytes),
            Err(PipelineError::CorruptData {
                format: SourceFormat::Jpeg,
                ..
            })
        ));
    }

    #[test]
    fn test_raw_image_tags_format() {
        let raw = RawImage::new(encode_fixture(&gradient(2, 2), ImageFormat::Png))
            .with_origin("frames/a.png");

        assert_eq!(raw.format(), SourceFormat::Png);
        assert_eq!(raw.origin().unwrap(), &PathBuf::from("frames/a.png"));
        assert!(!raw.is_empty());
        assert_eq!(raw.decode().unwrap().dimensions(), (2, 2));
    }
}
