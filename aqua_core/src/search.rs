//! Asynchronous line-streaming search over a buffer snapshot.
//!
//! The engine walks lines in ascending order on a spawned task and streams
//! hits over a bounded channel. Hit values own their line text, so the
//! consumer never holds references into the overlay or the window cache.

use regex::RegexBuilder;
use tokio::sync::mpsc;

use crate::buffer::BufferSnapshot;
use crate::error::{EngineError, EngineResult};
use crate::task::CancelToken;

/// Lines scanned between cooperative yields.
const YIELD_EVERY_LINES: usize = 1000;

/// In-flight hits the producer may buffer before it backpressures.
const HIT_CHANNEL_CAPACITY: usize = 256;

/// What to look for and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Literal text or regex pattern.
    pub term: String,
    /// Exact-case matching when true, case-folded otherwise.
    pub case_sensitive: bool,
    /// Interpret `term` as a regular expression.
    pub use_regex: bool,
}

impl SearchQuery {
    /// A case-sensitive literal query.
    pub fn literal(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            case_sensitive: true,
            use_regex: false,
        }
    }

    /// A regex query.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            term: pattern.into(),
            case_sensitive: true,
            use_regex: true,
        }
    }

    /// Switches case sensitivity.
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }
}

/// One match, with enough captured context to render it without touching
/// the buffer again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Line the match is on.
    pub line_index: usize,
    /// Match start within the line, in characters.
    pub char_index: usize,
    /// Match length in characters.
    pub length: usize,
    /// The full line text at the time of the match.
    pub line_text: String,
}

/// Pull side of a running search. Dropping the stream stops the producer
/// at its next send.
#[derive(Debug)]
pub struct SearchStream {
    rx: mpsc::Receiver<EngineResult<SearchHit>>,
}

impl SearchStream {
    /// Next hit, an error that ended the search, or `None` when the
    /// stream is exhausted.
    pub async fn next(&mut self) -> Option<EngineResult<SearchHit>> {
        self.rx.recv().await
    }

    /// Drains the stream into a vector, stopping at the first error.
    pub async fn collect_hits(&mut self) -> EngineResult<Vec<SearchHit>> {
        let mut hits = Vec::new();
        while let Some(item) = self.next().await {
            hits.push(item?);
        }
        Ok(hits)
    }
}

/// Starts a search over `snapshot` and returns the hit stream. Invalid
/// regex patterns surface as `BadPattern` on the first poll; cancellation
/// ends the stream with `Cancelled`.
pub fn search(snapshot: BufferSnapshot, query: SearchQuery, cancel: CancelToken) -> SearchStream {
    let (tx, rx) = mpsc::channel(HIT_CHANNEL_CAPACITY);
    tokio::spawn(run_search(snapshot, query, cancel, tx));
    SearchStream { rx }
}

async fn run_search(
    snapshot: BufferSnapshot,
    query: SearchQuery,
    cancel: CancelToken,
    tx: mpsc::Sender<EngineResult<SearchHit>>,
) {
    let matcher = match Matcher::compile(&query) {
        Ok(matcher) => matcher,
        Err(err) => {
            let _ = tx.send(Err(err)).await;
            return;
        }
    };

    let count = snapshot.line_count();
    for line_index in 0..count {
        if cancel.is_cancelled() {
            log::debug!("search cancelled at line {line_index}");
            let _ = tx.send(Err(EngineError::Cancelled)).await;
            return;
        }
        if line_index > 0 && line_index % YIELD_EVERY_LINES == 0 {
            tokio::task::yield_now().await;
        }

        let line = match snapshot.try_read_line(line_index) {
            Ok(line) => line,
            Err(err) => {
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        for hit in matcher.matches(line_index, &line) {
            if tx.send(Ok(hit)).await.is_err() {
                // Consumer went away; stop scanning.
                return;
            }
        }
    }
}

enum Matcher {
    Literal {
        needle: String,
        case_sensitive: bool,
    },
    Pattern(regex::Regex),
}

impl Matcher {
    fn compile(query: &SearchQuery) -> EngineResult<Self> {
        if query.use_regex {
            let regex = RegexBuilder::new(&query.term)
                .case_insensitive(!query.case_sensitive)
                .build()
                .map_err(|e| EngineError::BadPattern(e.to_string()))?;
            Ok(Matcher::Pattern(regex))
        } else {
            let needle = if query.case_sensitive {
                query.term.clone()
            } else {
                query.term.to_lowercase()
            };
            Ok(Matcher::Literal {
                needle,
                case_sensitive: query.case_sensitive,
            })
        }
    }

    fn matches(&self, line_index: usize, line: &str) -> Vec<SearchHit> {
        match self {
            Matcher::Literal {
                needle,
                case_sensitive,
            } => {
                if needle.is_empty() {
                    return Vec::new();
                }
                let haystack = if *case_sensitive {
                    line.to_string()
                } else {
                    line.to_lowercase()
                };
                let length = needle.chars().count();
                let mut hits = Vec::new();
                let mut from = 0;
                while let Some(found) = haystack[from..].find(needle.as_str()) {
                    let at = from + found;
                    hits.push(SearchHit {
                        line_index,
                        char_index: haystack[..at].chars().count(),
                        length,
                        line_text: line.to_string(),
                    });
                    // Advance past the whole match: hits never overlap.
                    from = at + needle.len();
                }
                hits
            }
            Matcher::Pattern(regex) => regex
                .find_iter(line)
                .map(|m| SearchHit {
                    line_index,
                    char_index: line[..m.start()].chars().count(),
                    length: line[m.start()..m.end()].chars().count(),
                    line_text: line.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;
    use crate::overlay::Patch;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // The buffer must stay alive alongside its snapshot: closing it (or
    // dropping it) closes the shared file manager under the snapshot.
    async fn snapshot_of(bytes: &[u8]) -> (NamedTempFile, TextBuffer, BufferSnapshot) {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        tmp.flush().unwrap();
        let mut buffer = TextBuffer::new();
        buffer
            .open(tmp.path(), None, &CancelToken::new())
            .await
            .unwrap();
        let snapshot = buffer.snapshot();
        (tmp, buffer, snapshot)
    }

    fn positions(hits: &[SearchHit]) -> Vec<(usize, usize, usize)> {
        hits.iter()
            .map(|h| (h.line_index, h.char_index, h.length))
            .collect()
    }

    #[tokio::test]
    async fn test_literal_search_in_order() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"foo bar\nbar foo\nfoo").await;
        let mut stream = search(
            snapshot,
            SearchQuery::literal("foo"),
            CancelToken::new(),
        );
        let hits = stream.collect_hits().await.unwrap();
        assert_eq!(positions(&hits), vec![(0, 0, 3), (1, 4, 3), (2, 0, 3)]);
        assert_eq!(hits[1].line_text, "bar foo");
    }

    #[tokio::test]
    async fn test_regex_search() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"foo bar\nbar foo\nfoo").await;
        let mut stream = search(snapshot, SearchQuery::regex("b.r"), CancelToken::new());
        let hits = stream.collect_hits().await.unwrap();
        assert_eq!(positions(&hits), vec![(0, 4, 3), (1, 0, 3)]);
    }

    #[tokio::test]
    async fn test_case_insensitive_literal() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"Hello HELLO hello").await;
        let mut stream = search(
            snapshot,
            SearchQuery::literal("hello").case_sensitive(false),
            CancelToken::new(),
        );
        let hits = stream.collect_hits().await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_matches_do_not_overlap() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"aaaa").await;
        let mut stream = search(snapshot, SearchQuery::literal("aa"), CancelToken::new());
        let hits = stream.collect_hits().await.unwrap();
        assert_eq!(positions(&hits), vec![(0, 0, 2), (0, 2, 2)]);
    }

    #[tokio::test]
    async fn test_bad_pattern_fails_first_poll() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"abc").await;
        let mut stream = search(snapshot, SearchQuery::regex("[unclosed"), CancelToken::new());
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(EngineError::BadPattern(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_search() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"x\ny\nz").await;
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut stream = search(snapshot, SearchQuery::literal("x"), cancel);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_term_finds_nothing() {
        let (_tmp, _buffer, snapshot) = snapshot_of(b"abc").await;
        let mut stream = search(snapshot, SearchQuery::literal(""), CancelToken::new());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_search_sees_pending_edits() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello\nworld").unwrap();
        tmp.flush().unwrap();

        let mut buffer = TextBuffer::new();
        buffer
            .open(tmp.path(), None, &CancelToken::new())
            .await
            .unwrap();
        buffer.record_edit(Patch::insert(5, " there"));

        let mut stream = search(
            buffer.snapshot(),
            SearchQuery::literal("there"),
            CancelToken::new(),
        );
        let hits = stream.collect_hits().await.unwrap();
        assert_eq!(positions(&hits), vec![(0, 6, 5)]);
    }

    #[tokio::test]
    async fn test_multibyte_char_indices() {
        let (_tmp, _buffer, snapshot) = snapshot_of("héllo héllo".as_bytes()).await;
        let mut stream = search(snapshot, SearchQuery::literal("llo"), CancelToken::new());
        let hits = stream.collect_hits().await.unwrap();
        // Char positions, not byte positions: 'é' counts once.
        assert_eq!(positions(&hits), vec![(0, 2, 3), (0, 8, 3)]);
    }
}
