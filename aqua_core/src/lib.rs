//! AquaEdit file engine - the core that turns an on-disk byte stream into
//! a navigable, editable, line-addressed document view.
//!
//! This crate contains the windowed file reader, line index, edit overlay,
//! undo/redo history, composite text buffer and search engine, without any
//! dependency on windowing or rendering systems. Resident memory stays
//! bounded by the window cache no matter how large the open file is.

pub mod buffer;
pub mod config;
pub mod encoding;
pub mod error;
pub mod file_manager;
pub mod history;
pub mod line_index;
pub mod overlay;
pub mod search;
pub mod task;
pub mod windows;

pub use buffer::{BufferSnapshot, DocumentEvent, TextBuffer};
pub use config::EngineConfig;
pub use encoding::Encoding;
pub use error::{EngineError, EngineResult};
pub use file_manager::{FileManager, WindowInfo};
pub use history::{History, RecordedEdit};
pub use line_index::LineIndex;
pub use overlay::{EditOverlay, Patch};
pub use search::{search, SearchHit, SearchQuery, SearchStream};
pub use task::{CancelToken, ProgressSink};
pub use windows::{DEFAULT_WINDOW_LEN, PAGE_SIZE};
