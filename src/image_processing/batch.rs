use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{PipelineError, PipelineResult};

use super::dithering::IndexedFrame;
use super::palette::Palette;

/// Ordered frames of one batch plus their per-frame delays.
///
/// Position `i` always holds the frame derived from input `i`.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    frames: Vec<IndexedFrame>,
    delays: Vec<u16>,
    palette: Arc<Palette>,
}

impl FrameBatch {
    /// Every frame gets the same `delay`.
    pub fn uniform(frames: Vec<IndexedFrame>, delay: u16, palette: Arc<Palette>) -> PipelineResult<Self> {
        let delays = vec![delay; frames.len()];
        Self::from_parts(frames, delays, palette)
    }

    pub fn from_parts(
        frames: Vec<IndexedFrame>,
        delays: Vec<u16>,
        palette: Arc<Palette>,
    ) -> PipelineResult<Self> {
        if frames.len() != delays.len() {
            return Err(PipelineError::invalid_dimension(format!(
                "{} frames but {} delays",
                frames.len(),
                delays.len()
            )));
        }

        if let Some(first) = frames.first() {
            let dims = first.dimensions();
            if let Some((i, frame)) = frames
                .iter()
                .enumerate()
                .find(|(_, f)| f.dimensions() != dims)
            {
                return Err(PipelineError::invalid_dimension(format!(
                    "frame #{} is {}x{}, expected {}x{}",
                    i,
                    frame.width(),
                    frame.height(),
                    dims.0,
                    dims.1
                )));
            }
        }

        if let Some(i) = frames.iter().position(|f| f.palette() != &palette) {
            return Err(PipelineError::InvalidPalette(format!(
                "frame #{} does not use the batch palette",
                i
            )));
        }

        Ok(Self {
            frames,
            delays,
            palette,
        })
    }

    pub fn frames(&self) -> &[IndexedFrame] {
        &self.frames
    }

    pub fn delays(&self) -> &[u16] {
        &self.delays
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame dimensions, or `None` for an empty batch
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(IndexedFrame::dimensions)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexedFrame, u16)> {
        self.frames.iter().zip(self.delays.iter().copied())
    }
}

/// Batch processing statistics and progress tracking
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let elapsed = self.start_time.elapsed();
        let remaining = self.total_files.saturating_sub(processed);

        if remaining == 0 {
            return Some(Duration::new(0, 0));
        }

        let time_per_item = elapsed / processed as u32;
        Some(time_per_item * remaining as u32)
    }

    /// Get processing speed (items per second)
    pub fn items_per_second(&self) -> f64 {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }

        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if elapsed_secs == 0.0 {
            return 0.0;
        }

        processed as f64 / elapsed_secs
    }
}
