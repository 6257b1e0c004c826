//! Mapped windows over the open file and the LRU cache that owns them.

use std::fs::File;
use std::num::NonZeroUsize;

use lru::LruCache;
use memmap2::{Mmap, MmapOptions};

use crate::error::{EngineError, EngineResult};

/// Alignment of every window offset.
pub const PAGE_SIZE: u64 = 4096;

/// Length of a freshly mapped window unless the request needs more.
pub const DEFAULT_WINDOW_LEN: u64 = 16 * 1024 * 1024;

/// Aligns a file offset down to the page boundary.
pub fn align_down(offset: u64) -> u64 {
    offset & !(PAGE_SIZE - 1)
}

/// One contiguous mapped region of the file.
///
/// The region is mapped read-only at a page-aligned offset and is released
/// when the window drops, which the cache guarantees happens before the
/// eviction that removed it returns.
#[derive(Debug)]
pub struct Window {
    offset: u64,
    map: Mmap,
}

impl Window {
    /// Maps `len` bytes of `file` starting at the page-aligned `offset`.
    pub fn map(file: &File, offset: u64, len: u64) -> EngineResult<Self> {
        debug_assert_eq!(offset % PAGE_SIZE, 0, "window offset must be page aligned");
        debug_assert!(len > 0, "window length must be non-zero");

        // SAFETY:
        // - The file is opened read-only and the map is never written.
        // - The file manager keeps the file handle alive while windows exist.
        // - Callers only ever see copies of the mapped bytes.
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(len as usize)
                .map(file)
                .map_err(|e| EngineError::from_map_error(e, len))?
        };
        Ok(Self { offset, map })
    }

    /// The aligned file offset this window starts at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    /// Returns true when the window maps nothing.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether the window covers `count` bytes starting at the absolute
    /// file offset `offset`.
    pub fn covers(&self, offset: u64, count: u64) -> bool {
        offset >= self.offset && offset + count <= self.offset + self.len()
    }

    /// The mapped bytes for `count` bytes at the absolute file offset
    /// `offset`. The caller must have checked `covers` first.
    pub fn bytes(&self, offset: u64, count: usize) -> &[u8] {
        let start = (offset - self.offset) as usize;
        &self.map[start..start + count]
    }
}

/// Fixed-capacity most-recently-used cache of windows, keyed by their
/// aligned offset. At most one window exists per aligned offset.
pub struct WindowCache {
    entries: LruCache<u64, Window>,
}

impl std::fmt::Debug for WindowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCache")
            .field("capacity", &self.capacity())
            .field("offsets", &self.offsets())
            .finish()
    }
}

impl WindowCache {
    /// Creates a cache holding at most `capacity` windows (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Looks up the window at an aligned offset, promoting it to
    /// most-recently-used on a hit.
    pub fn get(&mut self, aligned: u64) -> Option<&Window> {
        self.entries.get(&aligned)
    }

    /// Inserts a window, evicting and dropping the least-recently-used
    /// entry first when the cache is full. Any previous window at the same
    /// offset is dropped as well.
    pub fn insert(&mut self, window: Window) {
        let aligned = window.offset();
        // Drop a same-key window explicitly so `push` never reports it as
        // an eviction of a different offset.
        self.entries.pop(&aligned);
        if let Some((evicted_offset, _evicted)) = self.entries.push(aligned, window) {
            log::debug!("window cache evicted offset {evicted_offset}");
            // `_evicted` drops here, releasing the mapping before we return.
        }
    }

    /// Removes and drops the window at an aligned offset, if present.
    pub fn remove(&mut self, aligned: u64) {
        self.entries.pop(&aligned);
    }

    /// Drops every cached window.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached windows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no windows are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Cached offsets in most-recently-used-first order.
    pub fn offsets(&self) -> Vec<u64> {
        self.entries.iter().map(|(&offset, _)| offset).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(len: usize) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(0), 0);
        assert_eq!(align_down(1), 0);
        assert_eq!(align_down(4095), 0);
        assert_eq!(align_down(4096), 4096);
        assert_eq!(align_down(8191), 4096);
    }

    #[test]
    fn test_window_covers_and_bytes() {
        let tmp = fixture(8192);
        let file = tmp.reopen().unwrap();
        let window = Window::map(&file, 4096, 4096).unwrap();

        assert_eq!(window.offset(), 4096);
        assert_eq!(window.len(), 4096);
        assert!(window.covers(4096, 10));
        assert!(window.covers(8000, 192));
        assert!(!window.covers(0, 10));
        assert!(!window.covers(8000, 193));

        // data[i] = i % 251, and 4096 % 251 == 80.
        assert_eq!(window.bytes(4096, 3), &[80, 81, 82]);
    }

    #[test]
    fn test_cache_eviction_order() {
        let tmp = fixture(3 * 4096);
        let file = tmp.reopen().unwrap();
        let mut cache = WindowCache::new(2);

        for offset in [0, 4096, 8192] {
            cache.insert(Window::map(&file, offset, 4096).unwrap());
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.offsets(), vec![8192, 4096]);
        assert!(cache.get(0).is_none());
    }

    #[test]
    fn test_cache_hit_promotes() {
        let tmp = fixture(3 * 4096);
        let file = tmp.reopen().unwrap();
        let mut cache = WindowCache::new(2);

        cache.insert(Window::map(&file, 0, 4096).unwrap());
        cache.insert(Window::map(&file, 4096, 4096).unwrap());
        // Touch the LRU entry, then insert a third window: the untouched
        // one must be the eviction victim.
        assert!(cache.get(0).is_some());
        cache.insert(Window::map(&file, 8192, 4096).unwrap());

        assert_eq!(cache.offsets(), vec![8192, 0]);
    }

    #[test]
    fn test_cache_replaces_same_offset() {
        let tmp = fixture(2 * 4096);
        let file = tmp.reopen().unwrap();
        let mut cache = WindowCache::new(2);

        cache.insert(Window::map(&file, 0, 4096).unwrap());
        cache.insert(Window::map(&file, 0, 8192).unwrap());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0).unwrap().len(), 8192);
    }

    #[test]
    fn test_cache_clear() {
        let tmp = fixture(4096);
        let file = tmp.reopen().unwrap();
        let mut cache = WindowCache::new(4);
        cache.insert(Window::map(&file, 0, 4096).unwrap());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 4);
    }
}
