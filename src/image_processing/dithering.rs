//! Palette quantization with Floyd-Steinberg error diffusion
//!
//! Frames are reduced to the shared batch palette. Error diffusion keeps local
//! colour averages close to the source even with very small palettes.
use std::sync::Arc;

use image::{Rgb, RgbImage};

use super::palette::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMethod {
    /// Error diffusion with the classic 7/16, 3/16, 5/16, 1/16 kernel
    #[default]
    FloydSteinberg,
    /// Plain nearest-colour mapping
    None,
}

/// Palette-indexed frame; every index is valid in `palette`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    width: u32,
    height: u32,
    indices: Vec<u8>,
    palette: Arc<Palette>,
}

impl IndexedFrame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major palette indices
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    pub fn index_at(&self, x: u32, y: u32) -> u8 {
        self.indices[(y * self.width + x) as usize]
    }

    /// Expand back to RGB through the palette.
    pub fn to_rgb_image(&self) -> RgbImage {
        let colors = self.palette.colors();
        RgbImage::from_fn(self.width, self.height, |x, y| {
            colors[self.index_at(x, y) as usize]
        })
    }
}

/// Map every pixel of `img` to an index into `palette`.
pub fn quantize(img: &RgbImage, palette: &Arc<Palette>, method: DitherMethod) -> IndexedFrame {
    let indices = match method {
        DitherMethod::FloydSteinberg => floyd_steinberg_indices(img, palette),
        DitherMethod::None => img
            .pixels()
            .map(|p| palette.nearest_index(p[0] as f32, p[1] as f32, p[2] as f32))
            .collect(),
    };

    IndexedFrame {
        width: img.width(),
        height: img.height(),
        indices,
        palette: Arc::clone(palette),
    }
}

fn floyd_steinberg_indices(img: &RgbImage, palette: &Palette) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let mut indices = Vec::with_capacity((width * height) as usize);
    let (mut working_r, mut working_g, mut working_b) = create_working_buffers(img);

    for y in 0..height {
        for x in 0..width {
            let y_idx = y as usize;
            let x_idx = x as usize;

            // Accumulated error can push values out of range
            let current_r = working_r[y_idx][x_idx].clamp(0.0, 255.0);
            let current_g = working_g[y_idx][x_idx].clamp(0.0, 255.0);
            let current_b = working_b[y_idx][x_idx].clamp(0.0, 255.0);

            let index = palette.nearest_index(current_r, current_g, current_b);
            indices.push(index);

            let Rgb([palette_r, palette_g, palette_b]) = palette.colors()[index as usize];
            let error = [
                current_r - palette_r as f32,
                current_g - palette_g as f32,
                current_b - palette_b as f32,
            ];

            if error != [0.0; 3] {
                distribute_error_floyd_steinberg(
                    [&mut working_r, &mut working_g, &mut working_b],
                    x,
                    y,
                    width,
                    height,
                    error,
                );
            }
        }
    }

    indices
}

/// Per-channel f32 copies of the source, row-major
fn create_working_buffers(img: &RgbImage) -> (Vec<Vec<f32>>, Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let (width, height) = img.dimensions();
    let mut working_r: Vec<Vec<f32>> = Vec::with_capacity(height as usize);
    let mut working_g: Vec<Vec<f32>> = Vec::with_capacity(height as usize);
    let mut working_b: Vec<Vec<f32>> = Vec::with_capacity(height as usize);

    for y in 0..height {
        let mut row_r = Vec::with_capacity(width as usize);
        let mut row_g = Vec::with_capacity(width as usize);
        let mut row_b = Vec::with_capacity(width as usize);

        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            row_r.push(pixel[0] as f32);
            row_g.push(pixel[1] as f32);
            row_b.push(pixel[2] as f32);
        }

        working_r.push(row_r);
        working_g.push(row_g);
        working_b.push(row_b);
    }

    (working_r, working_g, working_b)
}

fn distribute_error_floyd_steinberg(
    channels: [&mut Vec<Vec<f32>>; 3],
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    error: [f32; 3],
) {
    // Floyd-Steinberg error distribution matrix:
    //     * 7/16
    // 3/16 5/16 1/16
    let x_idx = x as usize;
    let y_idx = y as usize;

    for (channel, err) in channels.into_iter().zip(error) {
        if x + 1 < width {
            channel[y_idx][x_idx + 1] += err * 7.0 / 16.0;
        }

        if y + 1 < height {
            if x > 0 {
                channel[y_idx + 1][x_idx - 1] += err * 3.0 / 16.0;
            }
            channel[y_idx + 1][x_idx] += err * 5.0 / 16.0;
            if x + 1 < width {
                channel[y_idx + 1][x_idx + 1] += err * 1.0 / 16.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use proptest::prelude::*;

    fn gray_ramp(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            let v = (x * 255 / (width - 1).max(1)) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_output_dimensions_match_input() {
        let img = gray_ramp(13, 7);
        let frame = quantize(&img, &Arc::new(Palette::rgb8()), DitherMethod::FloydSteinberg);

        assert_eq!(frame.dimensions(), (13, 7));
        assert_eq!(frame.indices().len(), 13 * 7);
    }

    #[test]
    fn test_palette_color_is_noise_free() {
        let palette = Arc::new(Palette::rgb8());
        for (i, color) in palette.colors().iter().enumerate() {
            let img: RgbImage = ImageBuffer::from_pixel(9, 9, *color);
            let frame = quantize(&img, &palette, DitherMethod::FloydSteinberg);

            assert!(frame.indices().iter().all(|&idx| idx as usize == i));
            assert!(frame.to_rgb_image().pixels().all(|p| p == color));
        }
    }

    #[test]
    fn test_mid_gray_dithers_to_checker_average() {
        let palette = Arc::new(Palette::black_white());
        let img: RgbImage = ImageBuffer::from_pixel(32, 32, Rgb([128, 128, 128]));
        let frame = quantize(&img, &palette, DitherMethod::FloydSteinberg);

        let white = frame.indices().iter().filter(|&&i| i == 1).count();
        let ratio = white as f32 / frame.indices().len() as f32;
        assert!((ratio - 0.5).abs() < 0.05, "white ratio {}", ratio);
    }

    #[test]
    fn test_no_dither_maps_to_nearest() {
        let palette = Arc::new(Palette::black_white());
        let img: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([128, 128, 128]));
        let frame = quantize(&img, &palette, DitherMethod::None);

        // 128 is nearer to white than black
        assert!(frame.indices().iter().all(|&i| i == 1));
    }

    #[test]
    fn test_red_and_blue_map_to_black() {
        let palette = Arc::new(Palette::new(vec![Rgb([255, 255, 255]), Rgb([0, 0, 0])]).unwrap());

        for color in [Rgb([255, 0, 0]), Rgb([0, 0, 255])] {
            let img: RgbImage = ImageBuffer::from_pixel(2, 2, color);
            let frame = quantize(&img, &palette, DitherMethod::FloydSteinberg);
            // Diffused error only lands on the already saturated channel
            assert!(frame.indices().iter().all(|&i| i == 1));
        }
    }

    #[test]
    fn test_deterministic() {
        let palette = Arc::new(Palette::web216());
        let img: RgbImage = ImageBuffer::from_fn(24, 24, |x, y| {
            Rgb([(x * 11) as u8, (y * 7) as u8, ((x * y) % 256) as u8])
        });

        let first = quantize(&img, &palette, DitherMethod::FloydSteinberg);
        let second = quantize(&img, &palette, DitherMethod::FloydSteinberg);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shares_palette() {
        let palette = Arc::new(Palette::gray4());
        let frame = quantize(&gray_ramp(4, 4), &palette, DitherMethod::None);
        assert!(Arc::ptr_eq(frame.palette(), &palette));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_indices_are_valid(
            width in 1u32..24,
            height in 1u32..24,
            seed in any::<u8>(),
            palette_size in 1usize..12,
        ) {
            let colors = (0..palette_size)
                .map(|i| Rgb([(i * 23) as u8, (i * 61 % 256) as u8, (255 - i * 19) as u8]))
                .collect();
            let palette = Arc::new(Palette::new(colors).unwrap());
            let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
                Rgb([
                    seed.wrapping_add((x * 31) as u8),
                    seed.wrapping_mul(3).wrapping_add((y * 17) as u8),
                    ((x + y) * 9 % 256) as u8,
                ])
            });

            let frame = quantize(&img, &palette, DitherMethod::FloydSteinberg);
            prop_assert_eq!(frame.indices().len(), (width * height) as usize);
            prop_assert!(frame.indices().iter().all(|&i| (i as usize) < palette_size));
        }
    }
}
