use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PipelineResult;
use crate::image_processing::dithering::DitherMethod;
use crate::image_processing::encode::LoopCount;
use crate::image_processing::palette::{Palette, PalettePreset};
use crate::image_processing::resize::{CropMode, ResampleFilter, MAX_TARGET_SIZE};
use crate::image_processing::ProcessingConfig;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PaletteChoice {
    /// 8-color RGB cube (black, blue, green, cyan, red, magenta, yellow, white)
    #[value(name = "rgb8")]
    Rgb8,
    /// Black & white only
    #[value(name = "bw")]
    BlackWhite,
    /// Four evenly spaced grays
    #[value(name = "gray4")]
    Gray4,
    /// 216-color web-safe cube
    #[value(name = "web216")]
    Web216,
}

impl From<PaletteChoice> for PalettePreset {
    fn from(value: PaletteChoice) -> Self {
        match value {
            PaletteChoice::Rgb8 => PalettePreset::Rgb8,
            PaletteChoice::BlackWhite => PalettePreset::BlackWhite,
            PaletteChoice::Gray4 => PalettePreset::Gray4,
            PaletteChoice::Web216 => PalettePreset::Web216,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CropChoice {
    /// Resize to the target width, then stretch to a square
    #[value(name = "stretch")]
    Stretch,
    /// Crop the centred square, then resize
    #[value(name = "center")]
    Center,
}

impl From<CropChoice> for CropMode {
    fn from(value: CropChoice) -> Self {
        match value {
            CropChoice::Stretch => CropMode::Stretch,
            CropChoice::Center => CropMode::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DitherChoice {
    /// Floyd-Steinberg error diffusion (best for gradients)
    #[value(name = "floyd-steinberg")]
    FloydSteinberg,
    /// Nearest palette color, no diffusion
    #[value(name = "none")]
    None,
}

impl From<DitherChoice> for DitherMethod {
    fn from(value: DitherChoice) -> Self {
        match value {
            DitherChoice::FloydSteinberg => DitherMethod::FloydSteinberg,
            DitherChoice::None => DitherMethod::None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FilterChoice {
    #[value(name = "catmull-rom")]
    CatmullRom,
    #[value(name = "mitchell")]
    Mitchell,
    #[value(name = "lanczos3")]
    Lanczos3,
}

impl From<FilterChoice> for ResampleFilter {
    fn from(value: FilterChoice) -> Self {
        match value {
            FilterChoice::CatmullRom => ResampleFilter::CatmullRom,
            FilterChoice::Mitchell => ResampleFilter::Mitchell,
            FilterChoice::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

pub const DEFAULT_OUTPUT: &str = "output.gif";
pub const DEFAULT_SIZE: u32 = 256;
pub const DEFAULT_DELAY: u16 = 50;
pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png";

#[derive(Parser, Debug)]
#[command(
    name = "animgif-processor",
    version,
    about = "Turn a sequence of still images into an animated GIF",
    long_about = "
Animated GIF Processor

Decodes JPEG/PNG images, resamples each one to a square frame, reduces it to a
shared palette with Floyd-Steinberg dithering and writes all frames, in input
order, as one looping GIF. Images are processed in parallel; the output is
written only if every input succeeds.

Example Usage:
  # Two images, default 256x256 frames, half a second per frame
  animgif-processor -i a.jpg -i b.png -o anim.gif

  # Every image in a directory (sorted by path), 128px, 10 ticks per frame
  animgif-processor -i ~/Photos/burst -o burst.gif -s 128 -d 10

  # Web-safe palette, centre crop, play three times
  animgif-processor -i ~/Photos/burst -o burst.gif --palette web216 --crop-mode center --loop 3

  # Custom palette
  animgif-processor -i frames/ --palette-colors \"#000000,#ffffff,#ff0000,#00ff00\"

  # Run the whole pipeline without writing, then print a per-frame table
  animgif-processor -i frames/ --dry-run --report --verbose"
)]
pub struct Args {
    /// Input image files or directories (order is preserved; can be repeated)
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "config_file",
        value_name = "DIR|FILE"
    )]
    pub input_paths: Vec<PathBuf>,

    /// Output GIF path
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT, value_name = "FILE")]
    pub output: PathBuf,

    /// Edge length of the square frames in pixels
    #[arg(
        short = 's',
        long = "size",
        default_value_t = DEFAULT_SIZE,
        value_parser = parse_target_size,
        value_name = "PIXELS"
    )]
    pub size: u32,

    /// Delay between frames in GIF ticks (1/100 s)
    #[arg(short = 'd', long = "delay", default_value_t = DEFAULT_DELAY, value_name = "TICKS")]
    pub delay: u16,

    /// Palette preset
    #[arg(long = "palette", default_value = "rgb8", value_name = "PRESET")]
    pub palette: PaletteChoice,

    /// Custom palette as comma-separated hex colors (overrides --palette)
    #[arg(long = "palette-colors", value_name = "#RRGGBB,...")]
    pub palette_colors: Option<String>,

    /// How frames are made square
    #[arg(long = "crop-mode", default_value = "stretch", value_name = "MODE")]
    pub crop_mode: CropChoice,

    /// Dithering method for color quantization
    #[arg(long = "dithering", default_value = "floyd-steinberg", value_name = "METHOD")]
    pub dithering: DitherChoice,

    /// Resampling filter
    #[arg(long = "filter", default_value = "catmull-rom", value_name = "FILTER")]
    pub filter: FilterChoice,

    /// Number of repetitions after the first play (0 = loop forever)
    #[arg(long = "loop", default_value_t = 0, value_name = "COUNT")]
    pub loop_count: u16,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value_t = 0, value_name = "N")]
    pub jobs: usize,

    /// Comma-separated list of extensions picked up when scanning directories
    #[arg(long = "extensions", default_value = DEFAULT_EXTENSIONS)]
    pub extensions_str: String,

    /// JSON configuration file; CLI options take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Emit machine-readable JSON lines instead of progress bars
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Print a per-frame table at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Run the pipeline but do not write the output file
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

fn parse_target_size(value: &str) -> Result<u32, String> {
    let size = value
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("Invalid size: '{}'", value))?;

    if size == 0 {
        return Err("Size must be greater than 0".to_string());
    }
    if size > MAX_TARGET_SIZE {
        return Err(format!("Size must be at most {} pixels", MAX_TARGET_SIZE));
    }
    Ok(size)
}

impl Args {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn build_palette(&self) -> PipelineResult<Palette> {
        match &self.palette_colors {
            Some(colors) => Palette::from_hex_list(colors),
            None => Ok(PalettePreset::from(self.palette).build()),
        }
    }

    pub fn loop_count(&self) -> LoopCount {
        LoopCount::from_repetitions(self.loop_count)
    }

    /// Library configuration for these arguments
    pub fn processing_config(&self) -> PipelineResult<ProcessingConfig> {
        let config = ProcessingConfig {
            target_size: self.size,
            delay: self.delay,
            palette: Arc::new(self.build_palette()?),
            crop_mode: self.crop_mode.into(),
            dither: self.dithering.into(),
            filter: self.filter.into(),
            parallel_jobs: self.jobs,
            loop_count: self.loop_count(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Human-readable palette name for banners and reports
    pub fn palette_label(&self) -> String {
        match &self.palette_colors {
            Some(colors) => format!("custom ({} colors)", colors.split(',').filter(|c| !c.trim().is_empty()).count()),
            None => self
                .palette
                .to_possible_value()
                .map(|v| v.get_name().to_string())
                .unwrap_or_default(),
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output: PathBuf::from(DEFAULT_OUTPUT),
            size: DEFAULT_SIZE,
            delay: DEFAULT_DELAY,
            palette: PaletteChoice::Rgb8,
            palette_colors: None,
            crop_mode: CropChoice::Stretch,
            dithering: DitherChoice::FloydSteinberg,
            filter: FilterChoice::CatmullRom,
            loop_count: 0,
            jobs: 0,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            config_file: None,
            json_progress: false,
            report: false,
            verbose: false,
            dry_run: false,
        }
    }
}
