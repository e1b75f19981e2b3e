use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use std::io::Cursor;
use thiserror::Error;

const MIB: usize = 1024 * 1024;

/// 3×3 sharpening kernel, row-major.
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
const CONTRAST_FACTOR: f32 = 2.0;
const THRESHOLD_BLOCK_SIZE: u32 = 11;
const THRESHOLD_CONSTANT: i32 = 2;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("File size exceeds {}.", human_size(.limit))]
    SizeLimitExceeded { limit: usize },
    #[error("Unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

fn human_size(bytes: &usize) -> String {
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Upper bounds applied to every upload before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
    /// Neither side may exceed this many pixels.
    pub max_dimension: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self { max_bytes: 2 * MIB, max_dimension: 1500 }
    }
}

/// An upload that passed validation, still in its original encoding.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`; PNG when a resize had no encoder for the source.
    pub format: ImageFormat,
    /// Format detected in the upload as received.
    pub source_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Check the byte size, then the dimensions, of an uploaded image.
///
/// Oversized payloads are rejected before any decoding happens. Images whose
/// width or height exceeds `max_dimension` are scaled down (aspect ratio
/// kept) and re-encoded in their original format; everything else is
/// returned byte-for-byte.
pub fn validate_upload(data: &[u8], limits: &UploadLimits) -> Result<ValidatedImage, PreprocessError> {
    if data.len() > limits.max_bytes {
        return Err(PreprocessError::SizeLimitExceeded { limit: limits.max_bytes });
    }

    let format = image::guess_format(data)?;
    let img = image::load_from_memory_with_format(data, format)?;
    let (width, height) = img.dimensions();

    if width <= limits.max_dimension && height <= limits.max_dimension {
        return Ok(ValidatedImage {
            bytes: data.to_vec(),
            format,
            source_format: format,
            width,
            height,
            resized: false,
        });
    }

    let scaled = img.resize(limits.max_dimension, limits.max_dimension, FilterType::Lanczos3);
    tracing::debug!(
        from_w = width,
        from_h = height,
        to_w = scaled.width(),
        to_h = scaled.height(),
        "downscaled upload"
    );
    let (bytes, encoded) = encode_as(&scaled, format)?;
    Ok(ValidatedImage {
        width: scaled.width(),
        height: scaled.height(),
        bytes,
        format: encoded,
        source_format: format,
        resized: true,
    })
}

/// Run the fixed enhancement chain over a validated image and re-encode it
/// in the same format.
pub fn enhance(validated: &ValidatedImage) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory_with_format(&validated.bytes, validated.format)?;
    let (bytes, _) = encode_as(&enhance_image(&img), validated.format)?;
    Ok(bytes)
}

/// contrast ×2 → sharpen → grayscale → median denoise → adaptive Gaussian
/// threshold → histogram equalization → gray replicated into RGB.
pub fn enhance_image(img: &DynamicImage) -> DynamicImage {
    let contrasted = boost_contrast(&img.to_rgb8(), CONTRAST_FACTOR);
    let sharpened: RgbImage = imageops::filter3x3(&contrasted, &SHARPEN_KERNEL);
    let gray = imageops::grayscale(&sharpened);
    let denoised = median_filter(&gray, 1, 1);
    let binary = adaptive_threshold_gaussian(&denoised, THRESHOLD_BLOCK_SIZE, THRESHOLD_CONSTANT);
    let equalized = equalize_histogram(&binary);
    DynamicImage::ImageLuma8(equalized).into_rgb8().into()
}

/// Push every channel away from the mean luminance by `factor`.
fn boost_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let gray = imageops::grayscale(img);
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    let mean = (sum as f32 / count as f32).round();

    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let adjust = |c: u8| (mean + factor * (c as f32 - mean)).round().clamp(0.0, 255.0) as u8;
        Rgb([adjust(p[0]), adjust(p[1]), adjust(p[2])])
    })
}

/// Binary threshold against a Gaussian-weighted local mean minus `constant`.
fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    // Same sigma a Gaussian kernel of `block_size` taps would use.
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(gray, sigma);

    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as i32;
        let t = local_mean.get_pixel(x, y)[0] as i32 - constant;
        if p > t {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Encode `img` as `format`, falling back to PNG when the format has no encoder.
fn encode_as(img: &DynamicImage, format: ImageFormat) -> Result<(Vec<u8>, ImageFormat), PreprocessError> {
    let mut buf = Vec::new();
    match img.write_to(&mut Cursor::new(&mut buf), format) {
        Ok(()) => Ok((buf, format)),
        Err(image::ImageError::Unsupported(e)) if format != ImageFormat::Png => {
            tracing::debug!("cannot encode {format:?} ({e}), falling back to PNG");
            buf.clear();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| PreprocessError::Encode(e.to_string()))?;
            Ok((buf, ImageFormat::Png))
        }
        Err(e) => Err(PreprocessError::Encode(e.to_string())),
    }
}
