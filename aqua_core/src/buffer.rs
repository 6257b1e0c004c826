//! Line-addressed text buffer composing the file manager, line index,
//! edit overlay and history into one editable document view.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tempfile::NamedTempFile;

use crate::config::EngineConfig;
use crate::encoding::Encoding;
use crate::error::{EngineError, EngineResult};
use crate::file_manager::FileManager;
use crate::history::{History, RecordedEdit};
use crate::line_index::LineIndex;
use crate::overlay::{floor_char_boundary, EditOverlay, Patch};
use crate::task::{CancelToken, ProgressSink};

/// Lines written between cooperative yields while saving.
const SAVE_YIELD_EVERY: usize = 1000;

/// Lifecycle notifications consumed by a plugin host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A file finished opening and indexing.
    Opened { path: PathBuf },
    /// The open file was closed.
    Closed { path: PathBuf },
}

/// The editable, line-addressed view of one on-disk file.
///
/// The buffer owns the file manager, the line index, the overlay and the
/// undo/redo history. It outlives every snapshot it hands out; a snapshot
/// keeps the file manager alive through its `Arc`.
#[derive(Debug)]
pub struct TextBuffer {
    file: Arc<FileManager>,
    index: Arc<LineIndex>,
    overlay: EditOverlay,
    history: History,
    encoding: Encoding,
    path: Option<PathBuf>,
    subscribers: Vec<Sender<DocumentEvent>>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Creates a buffer with default settings and no open file.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Creates a buffer wired to the given configuration: cache capacity
    /// and window length go to the file manager, the encoding to line
    /// decoding.
    pub fn with_config(config: &EngineConfig) -> Self {
        let config = config.clone().validated();
        Self {
            file: Arc::new(FileManager::from_config(&config)),
            index: Arc::new(LineIndex::new()),
            overlay: EditOverlay::new(),
            history: History::new(),
            encoding: config.encoding,
            path: None,
            subscribers: Vec::new(),
        }
    }

    // ==================== Lifecycle ====================

    /// Opens `path`: closes any previous file, clears pending edits and
    /// history, maps the file and builds the line index. Progress covers
    /// the index scan; cancellation between chunks closes the file again
    /// and reports `Cancelled`.
    pub async fn open(
        &mut self,
        path: &Path,
        progress: Option<&mut dyn ProgressSink>,
        cancel: &CancelToken,
    ) -> EngineResult<()> {
        self.close();
        self.file.open(path)?;

        let mut index = LineIndex::new();
        if let Err(err) = index.build(&self.file, progress, cancel).await {
            // Never leave a mapped file behind a failed open.
            self.file.close();
            return Err(err);
        }

        self.index = Arc::new(index);
        self.path = Some(path.to_path_buf());
        self.emit(DocumentEvent::Opened {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Closes the open file, releasing every window before the map, and
    /// discards the index, overlay and history. Idempotent.
    pub fn close(&mut self) {
        if let Some(path) = self.path.take() {
            self.emit(DocumentEvent::Closed { path });
        }
        self.file.close();
        self.index = Arc::new(LineIndex::new());
        self.overlay.clear();
        self.history.clear();
    }

    /// Path of the open file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    /// Whether a file is open and indexed.
    pub fn is_indexed(&self) -> bool {
        self.index.is_built()
    }

    /// Registers a listener for open/close notifications.
    pub fn subscribe(&mut self) -> Receiver<DocumentEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: DocumentEvent) {
        self.subscribers
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    // ==================== Reading ====================

    /// Number of lines in the document.
    pub fn line_count(&self) -> usize {
        self.index.line_count()
    }

    /// Start offset of line `i` in base-file bytes (out of range clamps
    /// to 0). This is the core half of go-to-line.
    pub fn line_offset(&self, i: usize) -> u64 {
        self.index.line_offset(i)
    }

    /// Length of line `i` in base-file bytes, excluding terminators.
    /// Errors degrade to 0.
    pub fn line_length(&self, i: usize) -> u64 {
        self.index.line_length(&self.file, i).unwrap_or(0)
    }

    /// Line `i` as decoded text with pending edits applied. Out-of-range
    /// indices and read failures yield an empty line; failures are logged
    /// rather than surfaced so one bad read cannot take down a render
    /// pass.
    pub fn read_line(&self, i: usize) -> String {
        match compose_line(&self.file, &self.index, &self.overlay, self.encoding, i) {
            Ok(line) => line,
            Err(err) => {
                log::warn!("read_line({i}) failed: {err}");
                String::new()
            }
        }
    }

    /// Lines `start..start + count`, clamped to the document, as a lazy
    /// sequence.
    pub fn visible_lines(&self, start: usize, count: usize) -> impl Iterator<Item = String> + '_ {
        let end = start.saturating_add(count).min(self.line_count());
        (start.min(end)..end).map(move |i| self.read_line(i))
    }

    /// A consistent read view for concurrent consumers such as search:
    /// the shared file manager and index plus a copy of the pending
    /// patches taken now.
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            file: Arc::clone(&self.file),
            index: Arc::clone(&self.index),
            overlay: self.overlay.clone(),
            encoding: self.encoding,
        }
    }

    // ==================== Editing ====================

    /// Adds a patch to the overlay without recording history. The single
    /// mutation entry point; undo/redo route through it internally.
    pub fn apply_edit(&mut self, patch: Patch) {
        self.overlay.add(patch);
    }

    /// Records a patch in the history (capturing the text it replaces,
    /// so deletes undo losslessly) and then applies it.
    pub fn record_edit(&mut self, patch: Patch) {
        let replaced = match &patch {
            Patch::Insert { .. } => String::new(),
            Patch::Delete { offset, len } | Patch::Replace { offset, len, .. } => {
                self.effective_text_at(*offset, *len)
            }
        };
        self.history.record(RecordedEdit {
            patch: patch.clone(),
            replaced,
        });
        self.overlay.add(patch);
    }

    /// Discards all pending edits and the history that produced them.
    pub fn clear_edits(&mut self) {
        self.overlay.clear();
        self.history.clear();
    }

    /// Whether any edits are pending.
    pub fn is_modified(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Undoes the most recent recorded edit by applying its inverse to
    /// the overlay. Returns the original patch, or `None` when the undo
    /// stack is empty.
    pub fn undo(&mut self) -> Option<Patch> {
        let (original, inverse) = self.history.undo()?;
        self.overlay.add(inverse);
        Some(original)
    }

    /// Re-applies the most recently undone edit. Returns it, or `None`
    /// when the redo stack is empty.
    pub fn redo(&mut self) -> Option<Patch> {
        let patch = self.history.redo()?;
        self.overlay.add(patch.clone());
        Some(patch)
    }

    /// Whether undo is available.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is available.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// The effective text a delete or replace of `len` bytes at `offset`
    /// will remove: the same slice, position and clamping the overlay
    /// uses when it later applies the patch, so the inverse restores the
    /// document exactly.
    fn effective_text_at(&self, offset: u64, len: usize) -> String {
        let line = self.index.line_of_offset(offset);
        let base = self.index.line_offset(line);
        let text = self.read_line(line);
        let pos = floor_char_boundary(&text, (offset - base) as usize);
        let end = floor_char_boundary(&text, pos.saturating_add(len));
        text[pos..end].to_string()
    }

    // ==================== Saving ====================

    /// Writes the effective document to `path` as UTF-8 with `\n`
    /// separators, routed through a temporary file in the target
    /// directory so the mapped source is never truncated in place.
    /// Yields every thousand lines; cancellation removes the temporary
    /// file and leaves the target untouched.
    pub async fn save(&self, path: &Path, cancel: &CancelToken) -> EngineResult<()> {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        let count = self.line_count();
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            for i in 0..count {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if i > 0 {
                    out.write_all(b"\n")?;
                    if i % SAVE_YIELD_EVERY == 0 {
                        out.flush()?;
                        tokio::task::yield_now().await;
                    }
                }
                out.write_all(self.read_line(i).as_bytes())?;
            }
            out.flush()?;
        }

        tmp.persist(path).map_err(|e| EngineError::Io(e.error))?;
        log::info!("saved {count} lines to {}", path.display());
        Ok(())
    }
}

impl Drop for TextBuffer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read-only view captured from a buffer: shared file and index, copied
/// overlay. Line reads through a snapshot see the document exactly as it
/// was when the snapshot was taken, regardless of later edits.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    file: Arc<FileManager>,
    index: Arc<LineIndex>,
    overlay: EditOverlay,
    encoding: Encoding,
}

impl BufferSnapshot {
    /// Number of lines in the snapshot.
    pub fn line_count(&self) -> usize {
        self.index.line_count()
    }

    /// Line `i` with the snapshot's edits applied, or the error that
    /// prevented reading it.
    pub fn try_read_line(&self, i: usize) -> EngineResult<String> {
        compose_line(&self.file, &self.index, &self.overlay, self.encoding, i)
    }

    /// Line `i`, degrading failures to an empty line.
    pub fn read_line(&self, i: usize) -> String {
        self.try_read_line(i).unwrap_or_default()
    }
}

/// Shared line composition: locate the base range through the index, read
/// the bytes through the window cache, decode, then layer the overlay.
fn compose_line(
    file: &FileManager,
    index: &LineIndex,
    overlay: &EditOverlay,
    encoding: Encoding,
    i: usize,
) -> EngineResult<String> {
    if i >= index.line_count() {
        return Ok(String::new());
    }
    let offset = index.line_offset(i);
    let len = index.line_length(file, i)?;
    let bytes = file.read_bytes(offset, len as usize)?;
    let text = encoding.decode(&bytes);
    Ok(overlay.apply(&text, offset))
}
