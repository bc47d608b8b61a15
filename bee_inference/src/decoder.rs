use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;

/// Upper bound on the decoded pixel buffer of a single frame.
pub const DEFAULT_MAX_DECODED_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FrameDecodeError {
    #[error("Frame is empty")]
    Empty,
    #[error("Unrecognized image format: {0}")]
    UnknownFormat(std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A decoded frame, owned by the decode step until it is preprocessed.
#[derive(Debug)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_dimension: u32,
    max_decoded_bytes: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(8192, DEFAULT_MAX_DECODED_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_dimension: u32, max_decoded_bytes: u64) -> Self {
        Self {
            max_dimension,
            max_decoded_bytes,
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage, FrameDecodeError> {
        if data.is_empty() {
            return Err(FrameDecodeError::Empty);
        }

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some(self.max_decoded_bytes);

        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(FrameDecodeError::UnknownFormat)?;
        reader.limits(limits);

        let image = reader.decode()?;
        Ok(DecodedImage::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([0, 128, 255]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let decoder = FrameDecoder::default();
        let decoded = decoder.decode(&png_bytes(40, 30)).unwrap();

        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(16, 16, Rgb([10, 20, 30]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Jpeg).unwrap();

        let decoded = FrameDecoder::default().decode(cursor.get_ref()).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_decode_empty_frame() {
        let result = FrameDecoder::default().decode(&[]);
        assert!(matches!(result, Err(FrameDecodeError::Empty)));
    }

    #[test]
    fn test_decode_garbage() {
        let result = FrameDecoder::default().decode(b"definitely not an image");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_truncated_png() {
        let bytes = png_bytes(64, 64);
        let result = FrameDecoder::default().decode(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_respects_dimension_limit() {
        let decoder = FrameDecoder::new(32, DEFAULT_MAX_DECODED_BYTES);
        assert!(decoder.decode(&png_bytes(64, 8)).is_err());
        assert!(decoder.decode(&png_bytes(32, 32)).is_ok());
    }

    #[test]
    fn test_decode_respects_allocation_limit() {
        // 512x512 RGB needs 768 KiB once decoded, even though the PNG is tiny.
        let bomb = png_bytes(512, 512);
        assert!(bomb.len() < 100_000);

        let decoder = FrameDecoder::new(8192, 100_000);
        assert!(decoder.decode(&bomb).is_err());
        assert!(decoder.decode(&png_bytes(16, 16)).is_ok());
    }
}
