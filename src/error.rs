//! Error taxonomy for the frame pipeline.
//!
//! Every per-image failure is folded into [`PipelineError::Batch`] by the
//! orchestrator, so callers always see a single terminal error per batch.

use std::io;

use thiserror::Error;

use crate::image_processing::decode::SourceFormat;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input bytes carry neither a JPEG nor a PNG signature.
    #[error("unsupported image format (expected JPEG or PNG)")]
    UnsupportedFormat,

    /// Signature recognised but the body could not be decoded.
    #[error("corrupt {format} data: {reason}")]
    CorruptData { format: SourceFormat, reason: String },

    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    /// First failing image of a batch, by input position.
    #[error("image #{index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("cannot encode an empty batch")]
    EmptyBatch,

    #[error("failed to write animation: {0}")]
    Write(#[from] gif::EncodingError),

    #[error("failed to read animation: {0}")]
    Read(#[from] gif::DecodingError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("temporary storage error ({context}): {source}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn corrupt(format: SourceFormat, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            format,
            reason: reason.into(),
        }
    }

    pub fn invalid_dimension(msg: impl Into<String>) -> Self {
        Self::InvalidDimension(msg.into())
    }

    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn batch(index: usize, source: PipelineError) -> Self {
        Self::Batch {
            index,
            source: Box::new(source),
        }
    }

    /// The per-image error wrapped by a `Batch` failure, or `self` otherwise.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Batch { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert!(PipelineError::UnsupportedFormat
            .to_string()
            .contains("unsupported image format"));
        assert!(PipelineError::corrupt(SourceFormat::Png, "truncated IDAT")
            .to_string()
            .contains("corrupt PNG data: truncated IDAT"));
        assert!(PipelineError::EmptyBatch.to_string().contains("empty batch"));
    }

    #[test]
    fn test_batch_wraps_root_cause() {
        let err = PipelineError::batch(3, PipelineError::UnsupportedFormat);
        assert!(err.to_string().starts_with("image #3 failed"));
        assert!(matches!(err.root(), PipelineError::UnsupportedFormat));
    }

    #[test]
    fn test_write_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "sink closed");
        let err: PipelineError = gif::EncodingError::from(io_err).into();
        assert!(matches!(err, PipelineError::Write(_)));
        assert!(err.to_string().contains("sink closed"));
    }
}
