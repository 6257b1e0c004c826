//! Line-offset index built by chunked background scanning.
//!
//! The index holds the byte offset at which every line starts, in base-file
//! coordinates. It is read-only once built; cancellation or I/O failure
//! during the build resets it so queries never see a partial table.

use memchr::memchr_iter;

use crate::error::{EngineError, EngineResult};
use crate::file_manager::FileManager;
use crate::task::{CancelToken, Progress, ProgressSink};

/// Bytes scanned per chunk.
const SCAN_CHUNK: u64 = 1024 * 1024;

/// Chunks between progress ticks and cooperative yields.
const CHUNKS_PER_TICK: u64 = 10;

/// Ordered table of line-start offsets.
///
/// `offsets[0] == 0`; for `i > 0`, `offsets[i]` is the byte immediately
/// after the `i`-th `\n` of the file. Strictly increasing.
#[derive(Debug, Clone)]
pub struct LineIndex {
    offsets: Vec<u64>,
    file_size: u64,
    built: bool,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LineIndex {
    /// Creates an empty index: one line starting at offset 0.
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            file_size: 0,
            built: false,
        }
    }

    /// Discards any built table, returning to the initial single entry.
    pub fn reset(&mut self) {
        self.offsets.clear();
        self.offsets.push(0);
        self.offsets.shrink_to_fit();
        self.file_size = 0;
        self.built = false;
    }

    /// Whether a build has completed since the last reset.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Scans the open file in 1 MiB chunks and records a line start after
    /// every `\n`. Progress is reported at most every ten chunks plus a
    /// final 100; the task yields between ticks. Cancellation and I/O
    /// failures reset the table before propagating.
    pub async fn build(
        &mut self,
        fm: &FileManager,
        sink: Option<&mut dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> EngineResult<()> {
        self.reset();
        let size = fm.file_size()?;
        self.file_size = size;

        let mut progress = Progress::new(sink);
        if size == 0 {
            self.built = true;
            progress.report(100);
            return Ok(());
        }

        let mut offset = 0u64;
        let mut chunk = 0u64;
        while offset < size {
            if cancel.is_cancelled() {
                log::info!("line index build cancelled at offset {offset}");
                self.reset();
                return Err(EngineError::Cancelled);
            }

            let count = SCAN_CHUNK.min(size - offset);
            let bytes = match fm.read_bytes(offset, count as usize) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("line index build failed at offset {offset}: {err}");
                    self.reset();
                    return Err(err);
                }
            };
            for pos in memchr_iter(b'\n', &bytes) {
                self.offsets.push(offset + pos as u64 + 1);
            }

            offset += count;
            chunk += 1;
            if chunk % CHUNKS_PER_TICK == 0 {
                progress.report((offset * 100 / size) as u32);
                tokio::task::yield_now().await;
            }
        }

        self.built = true;
        progress.report(100);
        log::info!("indexed {} lines over {size} bytes", self.offsets.len());
        Ok(())
    }

    /// Number of lines in the table.
    pub fn line_count(&self) -> usize {
        self.offsets.len()
    }

    /// Start offset of line `i`. Out-of-range indices clamp to the file
    /// start and return 0.
    pub fn line_offset(&self, i: usize) -> u64 {
        self.offsets.get(i).copied().unwrap_or(0)
    }

    /// The largest line index whose start offset is `<= offset`.
    pub fn line_of_offset(&self, offset: u64) -> usize {
        // Strictly increasing table, so the partition point is exact.
        self.offsets.partition_point(|&o| o <= offset) - 1
    }

    /// Length of line `i` in base-file bytes, excluding its `\n` or `\r\n`
    /// terminator. The last line ends at the file size. Out-of-range
    /// indices yield 0.
    pub fn line_length(&self, fm: &FileManager, i: usize) -> EngineResult<u64> {
        if i >= self.offsets.len() {
            return Ok(0);
        }
        let start = self.offsets[i];
        let mut end = match self.offsets.get(i + 1) {
            // The next line starts right after our `\n`.
            Some(&next) => next - 1,
            None => self.file_size,
        };
        if self.offsets.get(i + 1).is_some() && end > start {
            let before = fm.read_bytes(end - 1, 1)?;
            if before[0] == b'\r' {
                end -= 1;
            }
        }
        let end = end.min(self.file_size).max(start);
        Ok(end - start)
    }
}
