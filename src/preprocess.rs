//! Turns a decoded image into the NCHW tensor the classifier consumes.

use clap::ValueEnum;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, RgbImage};
use ndarray::Array4;
use std::path::Path;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes an image by sniffing its content. The extension only decides the
/// format when the bytes are not recognised.
pub fn open_image(path: &Path) -> Result<DynamicImage, ImageError> {
    image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResizeMode {
    /// Scale the short side to the target, then crop the center square.
    #[default]
    CenterCrop,
    /// Scale the long side to the target and pad the rest with black.
    Letterbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Normalization {
    /// Pixel values scaled to [0, 1].
    #[default]
    Unit,
    /// [0, 1] values standardized with the ImageNet mean and std.
    Imagenet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    pub size: u32,
    pub resize: ResizeMode,
    pub normalization: Normalization,
}

impl Preprocessor {
    pub fn new(size: u32, resize: ResizeMode, normalization: Normalization) -> Self {
        Self {
            size,
            resize,
            normalization,
        }
    }

    pub fn square(&self, img: &DynamicImage) -> RgbImage {
        match self.resize {
            ResizeMode::CenterCrop => center_crop(img, self.size),
            ResizeMode::Letterbox => letterbox(img, self.size),
        }
    }

    /// Returns a `(1, 3, size, size)` tensor.
    pub fn tensor(&self, img: &DynamicImage) -> Array4<f32> {
        let square = self.square(img);
        let size = self.size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in square.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                let value = match self.normalization {
                    Normalization::Unit => value,
                    Normalization::Imagenet => (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
                };
                input[[0, c, y as usize, x as usize]] = value;
            }
        }
        input
    }
}

fn center_crop(img: &DynamicImage, size: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = if width < height {
        (size, scale(height, size, width))
    } else {
        (scale(width, size, height), size)
    };
    let resized = img
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8();
    let left = (new_width - size) / 2;
    let top = (new_height - size) / 2;
    image::imageops::crop_imm(&resized, left, top, size, size).to_image()
}

fn letterbox(img: &DynamicImage, size: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = if width > height {
        (size, scale(height, size, width))
    } else {
        (scale(width, size, height), size)
    };
    let resized = img
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8();

    let mut canvas = RgbImage::new(size, size);
    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);
    canvas
}

/// `value * target / reference`, rounded, at least 1.
fn scale(value: u32, target: u32, reference: u32) -> u32 {
    let scaled = (value as u64 * target as u64 + reference as u64 / 2) / reference.max(1) as u64;
    (scaled as u32).max(1)
}
