//! Glob matching over a session's read buffer.

use anyhow::{Context, Result};
use glob::Pattern;

/// Compiled `expect` pattern.
///
/// Patterns are unanchored at the start: `hello` matches anywhere in the
/// buffered output. The match consumes the buffer through the shortest
/// prefix that satisfies the pattern.
#[derive(Debug, Clone)]
pub struct ExpectPattern {
    source: String,
    compiled: Pattern,
}

impl ExpectPattern {
    pub fn new(source: &str) -> Result<Self> {
        let compiled = Pattern::new(&format!("*{source}"))
            .with_context(|| format!("compile expect pattern '{source}'"))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Return the byte length of the shortest buffer prefix that matches.
    pub fn find(&self, buffer: &[u8]) -> Option<usize> {
        self.find_from(buffer, 0)
    }

    /// Like [`find`](Self::find), but skip prefixes ending at or before `scanned`.
    ///
    /// A prefix that did not match keeps not matching as output is appended,
    /// so callers only need to search the bytes that arrived since.
    pub fn find_from(&self, buffer: &[u8], scanned: usize) -> Option<usize> {
        let text = String::from_utf8_lossy(buffer);
        // Lossy decoding shifts offsets; search everything and consume it all.
        let lossless = text.len() == buffer.len();
        let skip = if lossless { scanned } else { 0 };
        let end = text
            .char_indices()
            .map(|(idx, ch)| idx + ch.len_utf8())
            .filter(|&end| end > skip)
            .find(|&end| self.compiled.matches(&text[..end]))?;
        if lossless { Some(end) } else { Some(buffer.len()) }
    }
}
