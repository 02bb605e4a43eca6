use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

use super::decode::RawImage;

/// Batch-scoped temporary storage for uploaded image bytes.
///
/// Buffers are written as `upload-NNNN.bin` in input order. The directory is
/// removed by [`UploadStaging::cleanup`] or, failing that, on drop.
pub struct UploadStaging {
    dir: Option<TempDir>,
    entries: Vec<StagedUpload>,
}

#[derive(Debug, Clone)]
struct StagedUpload {
    path: PathBuf,
    origin: Option<PathBuf>,
}

impl UploadStaging {
    /// Create a fresh staging directory under the system temp dir.
    pub fn new() -> PipelineResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("uploaded-images-")
            .tempdir()
            .map_err(|e| PipelineError::storage("create staging directory", e))?;
        debug!(path = %dir.path().display(), "created staging directory");
        Ok(Self {
            dir: Some(dir),
            entries: Vec::new(),
        })
    }

    /// Create the staging directory inside `parent` instead.
    pub fn new_in(parent: &Path) -> PipelineResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("uploaded-images-")
            .tempdir_in(parent)
            .map_err(|e| PipelineError::storage("create staging directory", e))?;
        Ok(Self {
            dir: Some(dir),
            entries: Vec::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist one upload; returns its position in the batch.
    pub fn stage(&mut self, image: &RawImage) -> PipelineResult<usize> {
        let dir = self.dir.as_ref().ok_or_else(|| {
            PipelineError::storage(
                "stage upload",
                std::io::Error::other("staging directory already cleaned up"),
            )
        })?;

        let index = self.entries.len();
        let path = dir.path().join(format!("upload-{:04}.bin", index));
        fs::write(&path, image.bytes())
            .map_err(|e| PipelineError::storage(format!("write {}", path.display()), e))?;

        self.entries.push(StagedUpload {
            path,
            origin: image.origin().cloned(),
        });
        Ok(index)
    }

    pub fn stage_all<'a>(&mut self, images: impl IntoIterator<Item = &'a RawImage>) -> PipelineResult<()> {
        for image in images {
            self.stage(image)?;
        }
        Ok(())
    }

    /// Read every staged upload back, in staging order.
    pub fn load_all(&self) -> PipelineResult<Vec<RawImage>> {
        self.entries
            .iter()
            .map(|entry| {
                let bytes = fs::read(&entry.path).map_err(|e| {
                    PipelineError::storage(format!("read {}", entry.path.display()), e)
                })?;
                let raw = RawImage::new(bytes);
                Ok(match &entry.origin {
                    Some(origin) => raw.with_origin(origin),
                    None => raw,
                })
            })
            .collect()
    }

    /// Remove the staging directory and everything in it.
    pub fn cleanup(mut self) -> PipelineResult<()> {
        self.entries.clear();
        match self.dir.take() {
            Some(dir) => {
                let path = dir.path().to_path_buf();
                dir.close().map_err(|e| {
                    PipelineError::storage(format!("remove {}", path.display()), e)
                })?;
                debug!(path = %path.display(), "removed staging directory");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Like [`cleanup`](Self::cleanup), but only logs failures.
    pub fn cleanup_logged(self) {
        if let Err(e) = self.cleanup() {
            warn!(error = %e, "failed to clean up staged uploads");
        }
    }
}
