//! Read-only windowed access to the open file.
//!
//! The manager owns the file handle and the window cache. Reads copy bytes
//! out of a mapped window while a short exclusive section is held, so
//! concurrent readers (search alongside the front-end) share the cache
//! without ever holding references into an evictable window.

use std::fs::File;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::{EngineConfig, DEFAULT_CACHE_CAPACITY};
use crate::error::{EngineError, EngineResult};
use crate::windows::{align_down, Window, WindowCache, DEFAULT_WINDOW_LEN, PAGE_SIZE};

/// Descriptor of a cached window, as handed to callers. Callers never hold
/// the mapping itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    /// Aligned offset the window starts at.
    pub offset: u64,
    /// Mapped length in bytes.
    pub len: u64,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    size: u64,
    path: PathBuf,
}

#[derive(Debug)]
struct Inner {
    open: Option<OpenFile>,
    cache: WindowCache,
    window_len: u64,
}

/// Owns the memory-mapped file and serves page-aligned windows from an LRU
/// cache. Exactly one file is open at a time.
#[derive(Debug)]
pub struct FileManager {
    inner: Mutex<Inner>,
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManager {
    /// Creates a manager with the default cache capacity and window length.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CACHE_CAPACITY, DEFAULT_WINDOW_LEN)
    }

    /// Creates a manager with an explicit cache capacity and window length.
    /// The window length is clamped to a non-zero multiple of the page size.
    pub fn with_settings(cache_capacity: usize, window_len: u64) -> Self {
        let window_len = if window_len < PAGE_SIZE {
            PAGE_SIZE
        } else {
            window_len - window_len % PAGE_SIZE
        };
        Self {
            inner: Mutex::new(Inner {
                open: None,
                cache: WindowCache::new(cache_capacity),
                window_len,
            }),
        }
    }

    /// Creates a manager from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        let config = config.clone().validated();
        Self::with_settings(config.cache_capacity, config.window_len)
    }

    /// Opens `path` read-only and records its size, closing any previously
    /// open file first. Returns the file size in bytes.
    pub fn open(&self, path: &Path) -> EngineResult<u64> {
        let file = File::open(path).map_err(|e| EngineError::from_open_error(e, path))?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::from_open_error(e, path))?
            .len();

        let mut inner = self.inner.lock();
        inner.cache.clear();
        inner.open = Some(OpenFile {
            file,
            size,
            path: path.to_path_buf(),
        });
        log::info!("opened {} ({size} bytes)", path.display());
        Ok(size)
    }

    /// Releases every cached window, then the file handle. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        // Windows must not outlive the file handle they map.
        inner.cache.clear();
        if let Some(open) = inner.open.take() {
            log::info!("closed {}", open.path.display());
        }
    }

    /// Whether a file is currently open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open.is_some()
    }

    /// Size of the open file in bytes.
    pub fn file_size(&self) -> EngineResult<u64> {
        let inner = self.inner.lock();
        inner
            .open
            .as_ref()
            .map(|o| o.size)
            .ok_or(EngineError::NotOpen)
    }

    /// Path of the open file.
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().open.as_ref().map(|o| o.path.clone())
    }

    /// Ensures a window covering `size` bytes at `offset` is cached and
    /// returns its descriptor. The window starts at `offset` aligned down
    /// to the page boundary; its length is clamped to the remaining file.
    pub fn get_window(&self, offset: u64, size: Option<u64>) -> EngineResult<WindowInfo> {
        let mut inner = self.inner.lock();
        let aligned = Self::ensure_window(&mut *inner, offset, size.unwrap_or(0))?;
        let window = inner.cache.get(aligned).expect("ensured window is cached");
        Ok(WindowInfo {
            offset: window.offset(),
            len: window.len(),
        })
    }

    /// Copies `count` bytes starting at `offset` out of the covering
    /// window. Fails with `OutOfBounds` when the range extends past the
    /// file; short reads are never returned.
    pub fn read_bytes(&self, offset: u64, count: usize) -> EngineResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.open.as_ref().ok_or(EngineError::NotOpen)?.size;
        if offset + count as u64 > size {
            return Err(EngineError::OutOfBounds {
                offset,
                count: count as u64,
                file_size: size,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let aligned = Self::ensure_window(&mut *inner, offset, count as u64)?;
        let window = inner.cache.get(aligned).expect("ensured window is cached");
        Ok(window.bytes(offset, count).to_vec())
    }

    /// Cached window offsets in most-recently-used-first order.
    pub fn cached_windows(&self) -> Vec<u64> {
        self.inner.lock().cache.offsets()
    }

    /// Ensures a cached window covers `need` bytes at `offset`, creating
    /// or widening it as required, and returns its aligned key. The entry
    /// is left at the MRU slot. A mapping failure closes the manager
    /// before propagating.
    fn ensure_window(inner: &mut Inner, offset: u64, need: u64) -> EngineResult<u64> {
        let Inner {
            open: open_slot,
            cache,
            window_len,
        } = inner;
        let open = open_slot.as_ref().ok_or(EngineError::NotOpen)?;
        if open.size == 0 {
            return Err(EngineError::OutOfBounds {
                offset,
                count: need,
                file_size: 0,
            });
        }

        let aligned = align_down(offset.min(open.size - 1));
        let required = (offset - aligned) + need;
        let target_len = required.max(*window_len).min(open.size - aligned);

        let cached_len = cache.get(aligned).map(Window::len);
        let usable = matches!(cached_len, Some(len) if len >= required);
        if !usable {
            if cached_len.is_some() {
                // A shorter window at the same offset is replaced wholesale;
                // the cache key stays the aligned offset.
                cache.remove(aligned);
            }
            match Window::map(&open.file, aligned, target_len) {
                Ok(window) => cache.insert(window),
                Err(err) => {
                    // A manager that cannot map its file is unusable: drop
                    // every window and the handle before reporting.
                    log::warn!(
                        "closing {} after mapping failure: {err}",
                        open.path.display()
                    );
                    cache.clear();
                    *open_slot = None;
                    return Err(err);
                }
            }
        }
        Ok(aligned)
    }
}

impl Drop for FileManager {
    fn drop(&mut self) {
        // Deterministic teardown order: windows first, then the handle.
        let inner = self.inner.get_mut();
        inner.cache.clear();
        inner.open = None;
    }
}
