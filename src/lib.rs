// Library exports for the CLI, the inspector binary and integration tests
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use image_processing::batch::FrameBatch;
pub use image_processing::decode::{RawImage, SourceFormat};
pub use image_processing::dithering::{DitherMethod, IndexedFrame};
pub use image_processing::encode::{decode_sequence, encode, LoopCount};
pub use image_processing::palette::Palette;
pub use image_processing::resize::{CropMode, ResampleFilter};
pub use image_processing::{create_animation, ProcessingConfig, ProcessingEngine};
pub use json_output::JsonMessage;
