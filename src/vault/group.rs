//! Dotted group paths.
//!
//! An entry's Group record stores its position in the folder tree as a
//! single string of segments joined by `.`. A dot inside a segment is
//! written as `\.`.
//!
//! Splitting treats a `.` as escaped whenever the character right before
//! it was a backslash; that backslash is then replaced by the dot. Joining
//! only escapes dots, so `B\.com` joins as `B\\.com` and splits back to
//! `B\.com`.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable path of group segments.
#[derive(Debug, Clone, Default)]
pub struct GroupPath {
    raw: String,
}

impl GroupPath {
    /// The empty (root) path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Join segments, escaping dots and skipping empty segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut raw = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() {
                continue;
            }
            if !raw.is_empty() {
                raw.push('.');
            }
            raw.push_str(&segment.replace('.', "\\."));
        }
        Self { raw }
    }

    /// Split the stored text back into segments.
    ///
    /// The empty path has a single empty segment.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut after_backslash = false;

        for ch in self.raw.chars() {
            if ch == '.' {
                if after_backslash {
                    current.pop();
                    current.push('.');
                } else {
                    segments.push(std::mem::take(&mut current));
                }
                after_backslash = false;
            } else {
                after_backslash = ch == '\\';
                current.push(ch);
            }
        }

        segments.push(current);
        segments
    }

    /// Path with `segment` added at the end. Empty segments are ignored.
    pub fn append(&self, segment: &str) -> GroupPath {
        if segment.is_empty() {
            return self.clone();
        }
        if self.raw.is_empty() {
            return Self::from_segments([segment]);
        }
        let mut segments = self.segments();
        segments.push(segment.to_string());
        Self::from_segments(segments)
    }

    /// Path without its last segment. At depth one or less this is the
    /// empty path.
    pub fn up(&self) -> GroupPath {
        let mut segments = self.segments();
        if segments.len() <= 1 {
            return Self::new();
        }
        segments.pop();
        Self::from_segments(segments)
    }

    /// Segment at `index`, or `None` when out of range.
    pub fn segment(&self, index: usize) -> Option<String> {
        self.segments().into_iter().nth(index)
    }

    /// Number of segments; the empty path has one.
    pub fn depth(&self) -> usize {
        self.segments().len()
    }

    /// Escaped text as stored in the Group record.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Interpret `raw` as already-escaped path text.
impl From<&str> for GroupPath {
    fn from(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

impl From<String> for GroupPath {
    fn from(raw: String) -> Self {
        Self { raw }
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// Paths compare case-insensitively, as group names do in the UI.
impl PartialEq for GroupPath {
    fn eq(&self, other: &Self) -> bool {
        self.raw.to_lowercase() == other.raw.to_lowercase()
    }
}

impl Eq for GroupPath {}

impl PartialEq<str> for GroupPath {
    fn eq(&self, other: &str) -> bool {
        self.raw.to_lowercase() == other.to_lowercase()
    }
}

impl PartialEq<&str> for GroupPath {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Hash for GroupPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.to_lowercase().hash(state);
    }
}
