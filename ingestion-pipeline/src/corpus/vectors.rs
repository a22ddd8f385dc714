use std::{
    fs::File,
    path::{Path, PathBuf},
};

use common::error::AppError;
use memmap2::Mmap;
use tracing::debug;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Read-only view over a flat file of row-major little-endian `f32` rows.
///
/// The file is memory-mapped so any row range can be decoded without reading
/// the rest of the corpus.
pub struct VectorFile {
    path: PathBuf,
    mmap: Option<Mmap>,
    dimension: usize,
    rows: usize,
}

impl VectorFile {
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if dimension == 0 {
            return Err(AppError::Configuration(
                "vector dimension must be greater than zero".into(),
            ));
        }

        let file = File::open(&path)?;
        let len = usize::try_from(file.metadata()?.len()).map_err(|_| {
            AppError::Configuration(format!("{} is too large to map", path.display()))
        })?;
        let row_bytes = dimension.saturating_mul(F32_BYTES);
        if len % row_bytes != 0 {
            return Err(AppError::Configuration(format!(
                "{} holds {len} bytes, not a whole number of {dimension}-dimension rows",
                path.display()
            )));
        }

        // Zero-length files cannot be mapped on every platform.
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only and the corpus file is not modified during ingestion.
            Some(unsafe { Mmap::map(&file)? })
        };

        let rows = len / row_bytes;
        debug!(path = %path.display(), rows, dimension, "Mapped vector file");
        Ok(Self {
            path,
            mmap,
            dimension,
            rows,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Decodes rows `start..start + count`, clamped to the end of the file.
    pub fn read_rows(&self, start: usize, count: usize) -> Result<Vec<Vec<f32>>, AppError> {
        let end = start.saturating_add(count).min(self.rows);
        if start >= end {
            return Ok(Vec::new());
        }

        let row_bytes = self.dimension * F32_BYTES;
        let bytes = self
            .mmap
            .as_deref()
            .and_then(|data| data.get(start * row_bytes..end * row_bytes))
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "rows {start}..{end} are outside {}",
                    self.path.display()
                ))
            })?;

        Ok(bytes
            .chunks_exact(row_bytes)
            .map(|row| {
                row.chunks_exact(F32_BYTES)
                    .filter_map(|raw| raw.try_into().ok().map(f32::from_le_bytes))
                    .collect()
            })
            .collect())
    }
}
