use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Spans longer than this are guarded by a digest instead of a copy.
const DIGEST_THRESHOLD: usize = 1024;

/// A splice of one byte span of a document.
///
/// Structural operations (insert, replace, delete, import management) all
/// reduce to one or more of these, staged against a document's text inside
/// a write transaction. The splice only lands if the span still holds what
/// it held when the edit was planned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an Edit does nothing until applied"]
pub struct Edit {
    pub byte_start: usize,
    pub byte_end: usize,
    pub new_text: String,
    pub guard: Expected,
}

/// What a span must contain for an edit to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Text(String),
    Digest(u64),
}

impl Expected {
    pub fn of(span: &str) -> Self {
        if span.len() > DIGEST_THRESHOLD {
            Expected::Digest(xxh3_64(span.as_bytes()))
        } else {
            Expected::Text(span.to_owned())
        }
    }

    pub fn accepts(&self, span: &str) -> bool {
        match self {
            Expected::Text(text) => span == text,
            Expected::Digest(digest) => xxh3_64(span.as_bytes()) == *digest,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum EditError {
    #[error("document changed under edit at bytes {}..{}", .span.start, .span.end)]
    Stale { span: Range<usize>, found: String },

    #[error("span {}..{} lies outside a document of {len} bytes", .span.start, .span.end)]
    OutOfBounds { span: Range<usize>, len: usize },

    #[error("byte {0} is inside a UTF-8 character")]
    SplitsChar(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum EditResult {
    Applied { bytes_changed: usize },
    /// The span already holds the new text.
    AlreadyApplied,
}

impl Edit {
    /// Replace `range` of `source`, guarding on what is there now.
    pub fn replace(source: &str, range: Range<usize>, new_text: impl Into<String>) -> Self {
        let current = source.get(range.clone()).unwrap_or_default();
        Self {
            byte_start: range.start,
            byte_end: range.end,
            new_text: new_text.into(),
            guard: Expected::of(current),
        }
    }

    pub fn insert(offset: usize, new_text: impl Into<String>) -> Self {
        Self {
            byte_start: offset,
            byte_end: offset,
            new_text: new_text.into(),
            guard: Expected::Text(String::new()),
        }
    }

    pub fn delete(source: &str, range: Range<usize>) -> Self {
        Self::replace(source, range, "")
    }

    pub fn span(&self) -> Range<usize> {
        self.byte_start..self.byte_end
    }

    fn current<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(EditError::OutOfBounds {
                span: self.span(),
                len: text.len(),
            });
        }
        if let Some(offset) = [self.byte_start, self.byte_end]
            .into_iter()
            .find(|&at| !text.is_char_boundary(at))
        {
            return Err(EditError::SplitsChar(offset));
        }
        Ok(&text[self.span()])
    }

    /// Splice into `text`. A span that already reads as `new_text` is left
    /// alone and reported as [`EditResult::AlreadyApplied`].
    pub fn apply(&self, text: &mut String) -> Result<EditResult, EditError> {
        let current = self.current(text)?;
        if current == self.new_text {
            return Ok(EditResult::AlreadyApplied);
        }
        if !self.guard.accepts(current) {
            return Err(EditError::Stale {
                span: self.span(),
                found: current.to_owned(),
            });
        }

        text.replace_range(self.span(), &self.new_text);
        Ok(EditResult::Applied {
            bytes_changed: self.new_text.len(),
        })
    }
}

/// Write `content` to `path` through a sibling tempfile, fsync and rename,
/// creating parent directories as needed. The mtime is bumped afterwards so
/// Gradle and IDE watchers see the change even within one timestamp tick.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) => dir,
        None => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            ))
        }
    };
    fs::create_dir_all(dir)?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())
}
