use crate::{config::TargetShape, decoder::DecodedImage};
use image::imageops::FilterType;
use ndarray::Array3;
use thiserror::Error;

/// A single preprocessed frame laid out as `(height, width, channel)`, RGB,
/// values in `[0, 1]`.
pub type Tensor = Array3<f32>;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("Invalid target shape {height}x{width}")]
    InvalidTarget { height: u32, width: u32 },
    #[error("Failed to build tensor: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Turns a decoded frame into the classifier's input tensor.
pub trait Preprocess: Send + Sync + 'static {
    fn preprocess(&self, image: &DecodedImage) -> Result<Tensor, PreprocessError>;
}

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target: TargetShape,
}

impl Preprocessor {
    pub fn new(target: TargetShape) -> Self {
        Self { target }
    }

    pub fn target(&self) -> TargetShape {
        self.target
    }
}

impl Preprocess for Preprocessor {
    fn preprocess(&self, image: &DecodedImage) -> Result<Tensor, PreprocessError> {
        preprocess(image, self.target)
    }
}

pub fn preprocess(image: &DecodedImage, target: TargetShape) -> Result<Tensor, PreprocessError> {
    let TargetShape { height, width } = target;
    if height == 0 || width == 0 {
        return Err(PreprocessError::InvalidTarget { height, width });
    }

    let (img_width, img_height) = image.dimensions();
    if img_width == 0 || img_height == 0 {
        return Err(PreprocessError::EmptyImage {
            width: img_width,
            height: img_height,
        });
    }

    let rgb = image
        .as_dynamic()
        .resize_exact(width, height, FilterType::Triangle)
        .into_rgb8();

    let data: Vec<f32> = rgb
        .into_raw()
        .into_iter()
        .map(|value| value as f32 / 255.)
        .collect();

    let tensor = Array3::from_shape_vec((height as usize, width as usize, 3), data)?;
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 0, 51]));
        let decoded = DecodedImage::new(DynamicImage::ImageRgb8(img));

        let tensor = Preprocessor::new(TargetShape::default())
            .preprocess(&decoded)
            .unwrap();

        assert_eq!(tensor.shape(), &[224, 224, 3]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((tensor[[10, 10, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[10, 10, 1]].abs() < 1e-6);
        assert!((tensor[[10, 10, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_drops_alpha() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 255, 0, 10]));
        let decoded = DecodedImage::new(DynamicImage::ImageRgba8(img));

        let tensor = preprocess(&decoded, TargetShape { height: 4, width: 6 }).unwrap();

        assert_eq!(tensor.shape(), &[4, 6, 3]);
        assert!((tensor[[0, 0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        let decoded = DecodedImage::new(DynamicImage::new_rgb8(0, 0));
        let result = preprocess(&decoded, TargetShape::default());

        assert!(matches!(result, Err(PreprocessError::EmptyImage { .. })));
    }

    #[test]
    fn test_preprocess_rejects_zero_target() {
        let decoded = DecodedImage::new(DynamicImage::new_rgb8(4, 4));
        let result = preprocess(&decoded, TargetShape { height: 0, width: 4 });

        assert!(matches!(result, Err(PreprocessError::InvalidTarget { .. })));
    }
}
