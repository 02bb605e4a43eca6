//! JSON output for tool integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::FrameReport;

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// One input became a frame
    #[serde(rename = "frame_completed")]
    FrameCompleted {
        index: usize,
        input_path: Option<String>,
        source_width: u32,
        source_height: u32,
        processing_time_ms: u128,
    },
    /// The input that failed the batch
    #[serde(rename = "frame_failed")]
    FrameFailed {
        index: usize,
        input_path: Option<String>,
        error: String,
    },
    /// Processing summary
    Summary {
        total_frames: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
        output_path: Option<String>,
    },
    /// Fatal error outside of a single frame
    Error { message: String },
}

impl JsonMessage {
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Some(json) = self.to_json() {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final progress (current == total) is always emitted to ensure 100% completion.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn frame_completed(report: &FrameReport) -> Self {
        Self::FrameCompleted {
            index: report.index,
            input_path: report.origin.as_deref().map(path_string),
            source_width: report.source_dimensions.0,
            source_height: report.source_dimensions.1,
            processing_time_ms: report.elapsed.as_millis(),
        }
    }

    pub fn frame_failed(index: usize, input_path: Option<&Path>, error: impl Into<String>) -> Self {
        Self::FrameFailed {
            index,
            input_path: input_path.map(path_string),
            error: error.into(),
        }
    }

    /// Create and emit summary message
    pub fn summary(
        total_frames: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
        output_path: Option<&Path>,
    ) {
        Self::Summary {
            total_frames,
            processed,
            failed,
            duration_secs,
            output_path: output_path.map(path_string),
        }
        .emit();
    }

    pub fn error(message: impl Into<String>) {
        Self::Error {
            message: message.into(),
        }
        .emit();
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
