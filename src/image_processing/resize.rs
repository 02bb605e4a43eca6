use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{ImageBuffer, RgbImage};

use crate::error::{PipelineError, PipelineResult};

/// Largest edge the GIF logical screen can describe
pub const MAX_TARGET_SIZE: u32 = u16::MAX as u32;

/// How the proportionally resized frame is turned into a square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Resize to `size` wide, then resize again to `size x size`.
    ///
    /// The second pass stretches both axes and does not preserve aspect ratio.
    #[default]
    Stretch,
    /// Centre crop to a square, then resize to `size x size`.
    Center,
}

/// Interpolation kernels, all cubic or better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    #[default]
    CatmullRom,
    Mitchell,
    Lanczos3,
}

impl ResampleFilter {
    fn resize_options(self) -> ResizeOptions {
        let filter = match self {
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Mitchell => FilterType::Mitchell,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        };
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(filter))
    }
}

/// Check a requested square edge length.
///
/// Zero is rejected rather than producing an empty grid.
pub fn validate_target_size(target_size: u32) -> PipelineResult<()> {
    if target_size == 0 {
        return Err(PipelineError::invalid_dimension(
            "target size must be greater than 0",
        ));
    }
    if target_size > MAX_TARGET_SIZE {
        return Err(PipelineError::invalid_dimension(format!(
            "target size {} exceeds the maximum of {}",
            target_size, MAX_TARGET_SIZE
        )));
    }
    Ok(())
}

/// Produce a `target_size x target_size` grid from `img`.
pub fn resample(
    img: &RgbImage,
    target_size: u32,
    crop_mode: CropMode,
    filter: ResampleFilter,
) -> PipelineResult<RgbImage> {
    validate_target_size(target_size)?;

    match crop_mode {
        CropMode::Stretch => {
            let (src_width, src_height) = img.dimensions();
            let height = proportional_height(src_width, src_height, target_size);
            let proportional = resize_image(img, target_size, height, filter)?;
            resize_image(&proportional, target_size, target_size, filter)
        }
        CropMode::Center => {
            let cropped = center_square_crop(img)?;
            resize_image(&cropped, target_size, target_size, filter)
        }
    }
}

/// Height matching `target_width` at the source aspect ratio.
///
/// Rounds with a +0.7 bias and never returns less than one row.
pub fn proportional_height(src_width: u32, src_height: u32, target_width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let scaled = src_height as f64 * target_width as f64 / src_width as f64;
    ((scaled + 0.7) as u32).max(1)
}

/// Largest centred square that fits inside `img`
fn center_square_crop(img: &RgbImage) -> PipelineResult<RgbImage> {
    let (src_width, src_height) = img.dimensions();
    let side = src_width.min(src_height);
    let crop_x = (src_width - side) / 2;
    let crop_y = (src_height - side) / 2;
    crop_image(img, crop_x, crop_y, side, side)
}

/// Crop an image to specified dimensions
fn crop_image(img: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> PipelineResult<RgbImage> {
    let (img_width, img_height) = img.dimensions();

    if x + width > img_width || y + height > img_height {
        return Err(PipelineError::invalid_dimension(format!(
            "crop({},{},{}x{}) exceeds {}x{} image",
            x, y, width, height, img_width, img_height
        )));
    }

    Ok(ImageBuffer::from_fn(width, height, |out_x, out_y| {
        *img.get_pixel(x + out_x, y + out_y)
    }))
}

/// Resize to exact dimensions with the selected convolution kernel
fn resize_image(
    img: &RgbImage,
    width: u32,
    height: u32,
    filter: ResampleFilter,
) -> PipelineResult<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }
    if src_width == 0 || src_height == 0 || width == 0 || height == 0 {
        return Err(PipelineError::invalid_dimension(format!(
            "cannot resize {}x{} to {}x{}",
            src_width, src_height, width, height
        )));
    }

    let src_image = ImageRef::new(src_width, src_height, img.as_raw(), PixelType::U8x3)
        .map_err(|e| PipelineError::invalid_dimension(e.to_string()))?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &filter.resize_options())
        .map_err(|e| PipelineError::invalid_dimension(e.to_string()))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec()).ok_or_else(|| {
        PipelineError::invalid_dimension(format!(
            "resized buffer does not match {}x{}",
            width, height
        ))
    })
}
