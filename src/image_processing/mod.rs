pub mod batch;
pub mod decode;
pub mod dithering;
pub mod encode;
pub mod palette;
pub mod report;
pub mod resize;
pub mod staging;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, PipelineResult};

use batch::FrameBatch;
use decode::{RawImage, SourceFormat};
use dithering::{DitherMethod, IndexedFrame};
use encode::LoopCount;
use palette::Palette;
use resize::{CropMode, ResampleFilter};
use staging::UploadStaging;

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Edge length of the square output frames, in pixels
    pub target_size: u32,
    /// Per-frame delay in GIF ticks (1/100 s)
    pub delay: u16,
    pub palette: Arc<Palette>,
    pub crop_mode: CropMode,
    pub dither: DitherMethod,
    pub filter: ResampleFilter,
    /// Worker threads; 0 uses every available core
    pub parallel_jobs: usize,
    pub loop_count: LoopCount,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_size: 256,
            delay: 50,
            palette: Arc::new(Palette::rgb8()),
            crop_mode: CropMode::default(),
            dither: DitherMethod::default(),
            filter: ResampleFilter::default(),
            parallel_jobs: 0,
            loop_count: LoopCount::default(),
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        resize::validate_target_size(self.target_size)
    }

    /// Worker count after resolving `0` to the number of cores
    pub fn effective_jobs(&self) -> usize {
        if self.parallel_jobs == 0 {
            num_cpus::get()
        } else {
            self.parallel_jobs
        }
    }
}

/// What happened to one input, for reports and progress output
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub index: usize,
    pub origin: Option<PathBuf>,
    pub source_format: SourceFormat,
    pub source_dimensions: (u32, u32),
    pub output_dimensions: (u32, u32),
    pub delay: u16,
    pub elapsed: Duration,
}

/// A processed batch together with its per-frame reports
#[derive(Debug)]
pub struct ProcessedBatch {
    pub batch: FrameBatch,
    pub reports: Vec<FrameReport>,
    pub elapsed: Duration,
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    pool: ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig) -> PipelineResult<Self> {
        config.validate()?;

        // Local pool so concurrent engines never fight over the global one
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_jobs())
            .thread_name(|i| format!("frame-worker-{}", i))
            .build()?;

        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Turn every input into a frame, preserving input order.
    ///
    /// All-or-nothing: if any image fails, the lowest failing index is
    /// reported as [`PipelineError::Batch`] and no frames are returned.
    pub fn process_all(&self, inputs: &[RawImage]) -> PipelineResult<FrameBatch> {
        self.process_all_with_progress(inputs, |_, _| {})
            .map(|processed| processed.batch)
    }

    /// Same as [`process_all`](Self::process_all), calling
    /// `progress_callback(done, total)` after each image finishes.
    #[instrument(skip_all, fields(images = inputs.len(), size = self.config.target_size))]
    pub fn process_all_with_progress<F>(
        &self,
        inputs: &[RawImage],
        progress_callback: F,
    ) -> PipelineResult<ProcessedBatch>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let start = Instant::now();
        let total = inputs.len();
        let processed_count = AtomicUsize::new(0);
        info!(workers = self.worker_count(), "processing batch");

        let results: Vec<PipelineResult<(IndexedFrame, FrameReport)>> =
            run_ordered(&self.pool, inputs, |index, raw| {
                let result = self.process_single(index, raw);

                let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                progress_callback(count, total);

                result
            });

        let mut frames = Vec::with_capacity(total);
        let mut reports = Vec::with_capacity(total);
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok((frame, report)) => {
                    frames.push(frame);
                    reports.push(report);
                }
                Err(e) => return Err(PipelineError::batch(index, e)),
            }
        }

        let batch = FrameBatch::uniform(frames, self.config.delay, Arc::clone(&self.config.palette))?;
        let elapsed = start.elapsed();
        info!(frames = batch.len(), elapsed_ms = elapsed.as_millis() as u64, "batch complete");

        Ok(ProcessedBatch {
            batch,
            reports,
            elapsed,
        })
    }

    /// Decode, resample and quantize one input
    fn process_single(&self, index: usize, raw: &RawImage) -> PipelineResult<(IndexedFrame, FrameReport)> {
        let start = Instant::now();

        let img = decode::decode(raw.bytes())?;
        debug!(index, format = %raw.format(), width = img.width(), height = img.height(), "decoded");

        let resampled = resize::resample(
            &img,
            self.config.target_size,
            self.config.crop_mode,
            self.config.filter,
        )?;
        debug!(index, size = self.config.target_size, "resampled");

        let frame = dithering::quantize(&resampled, &self.config.palette, self.config.dither);
        debug!(index, colors = self.config.palette.len(), "quantized");

        let report = FrameReport {
            index,
            origin: raw.origin().cloned(),
            source_format: raw.format(),
            source_dimensions: img.dimensions(),
            output_dimensions: frame.dimensions(),
            delay: self.config.delay,
            elapsed: start.elapsed(),
        };
        Ok((frame, report))
    }
}

/// Run `work` for every item on `pool`.
///
/// Results come back in item order whatever order the workers finish in.
fn run_ordered<T, R, F>(pool: &ThreadPool, items: &[T], work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| work(index, item))
            .collect()
    })
}

/// One-shot helper: stage the uploads, build the frames and write the GIF.
///
/// The staging directory is removed whether or not the batch succeeds;
/// a cleanup failure is logged and never replaces the batch result.
pub fn create_animation(
    inputs: &[RawImage],
    config: &ProcessingConfig,
    output_path: &Path,
) -> PipelineResult<PathBuf> {
    let mut staging = UploadStaging::new()?;
    let result = stage_and_encode(&mut staging, inputs, config, output_path);
    staging.cleanup_logged();
    result
}

fn stage_and_encode(
    staging: &mut UploadStaging,
    inputs: &[RawImage],
    config: &ProcessingConfig,
    output_path: &Path,
) -> PipelineResult<PathBuf> {
    staging.stage_all(inputs)?;
    let staged = staging.load_all()?;

    let engine = ProcessingEngine::new(config.clone())?;
    let batch = engine.process_all(&staged)?;
    if batch.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }

    let bytes = encode::encode_to_path(&batch, output_path, config.loop_count)?;
    info!(path = %output_path.display(), frames = batch.len(), bytes, "wrote animation");

    Ok(output_path.to_path_buf())
}
