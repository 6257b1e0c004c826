//! Byte-to-text decoding for line reads.

use serde::{Deserialize, Serialize};

/// The encodings the engine can decode line bytes with.
///
/// Saving always re-encodes as UTF-8 regardless of the read encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// UTF-8, decoded lossily: invalid sequences become U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1, each byte mapped to the matching code point.
    Latin1,
}

impl Encoding {
    /// Decodes a byte slice into owned text. Never fails; malformed input
    /// degrades to replacement characters rather than an error.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Human-readable name, e.g. for a status bar.
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }
}
