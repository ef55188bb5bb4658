//! Line documents: the in-memory form every patch and registry edit works on.
//!
//! A [`Document`] is loaded whole, mutated through a [`StagedEdits`] list keyed
//! by original line index, and then either written back whole or dropped.
//! Scans never shift indices under themselves: they stage, and the staged list
//! is applied once the scan is over.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

const BOM: char = '\u{feff}';

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Utf8 { path: PathBuf },

    #[error("{path} changed on disk since it was loaded; refusing to overwrite")]
    ConcurrentModification { path: PathBuf },

    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),
}

/// Line terminator used when rendering a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Formatting facts captured at load time and reproduced on write.
///
/// `ending` is the terminator given to lines added after load; loaded lines
/// keep the one they were read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFormat {
    pub ending: LineEnding,
    pub trailing_newline: bool,
    pub bom: bool,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            ending: LineEnding::Lf,
            trailing_newline: true,
            bom: false,
        }
    }
}

/// Ordered, mutable sequence of text lines backing one file.
#[derive(Debug, Clone)]
pub struct Document {
    lines: Vec<String>,
    /// Terminator of each line, parallel to `lines`
    endings: Vec<LineEnding>,
    format: LineFormat,
    /// xxh3 of the bytes this document was parsed from
    fingerprint: u64,
}

impl Document {
    /// Parse text into lines, remembering terminator, final newline and BOM.
    pub fn parse(text: &str) -> Self {
        let fingerprint = xxh3_64(text.as_bytes());
        let (bom, body) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let ending = if body.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let trailing_newline = body.ends_with('\n');

        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for piece in body.split_inclusive('\n') {
            let (line, line_ending) = if let Some(line) = piece.strip_suffix("\r\n") {
                (line, LineEnding::CrLf)
            } else if let Some(line) = piece.strip_suffix('\n') {
                (line, LineEnding::Lf)
            } else {
                // unterminated last line; used only if text is appended after it
                (piece, ending)
            };
            lines.push(line.to_string());
            endings.push(line_ending);
        }

        Self {
            lines,
            endings,
            format: LineFormat {
                ending,
                trailing_newline,
                bom,
            },
            fingerprint,
        }
    }

    /// Build a document from lines with LF endings and a final newline.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let format = LineFormat::default();
        let mut document = Self {
            endings: vec![format.ending; lines.len()],
            lines,
            format,
            fingerprint: 0,
        };
        document.fingerprint = xxh3_64(document.render().as_bytes());
        document
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| DocumentError::Utf8 {
            path: path.to_path_buf(),
        })?;
        Ok(Self::parse(&text))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn format(&self) -> LineFormat {
        self.format
    }

    /// Insert lines so the first of them lands at `index` (clamped to the end).
    pub fn insert<I, S>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = index.min(self.lines.len());
        let tail = self.lines.split_off(index);
        let tail_endings = self.endings.split_off(index);
        for line in lines {
            self.lines.push(line.into());
            self.endings.push(self.format.ending);
        }
        self.lines.extend(tail);
        self.endings.extend(tail_endings);
    }

    /// Remove an inclusive line range; out-of-bounds parts are ignored.
    pub fn remove_range(&mut self, range: RangeInclusive<usize>) {
        let start = (*range.start()).min(self.lines.len());
        let end = range.end().saturating_add(1).min(self.lines.len());
        if start < end {
            self.lines.drain(start..end);
            self.endings.drain(start..end);
        }
    }

    /// Apply a staged edit list built against this document's current lines.
    pub fn apply(&mut self, staged: StagedEdits) {
        if staged.is_empty() {
            return;
        }

        let StagedEdits {
            mut replacements,
            deletions,
            mut insertions,
        } = staged;

        let added: usize = insertions.values().map(Vec::len).sum();
        let fresh = self.format.ending;
        let old = std::mem::take(&mut self.lines);
        let old_endings = std::mem::take(&mut self.endings);
        let mut lines = Vec::with_capacity(old.len() + added);
        let mut endings = Vec::with_capacity(old.len() + added);

        for (index, (line, ending)) in old.into_iter().zip(old_endings).enumerate() {
            if let Some(inserted) = insertions.remove(&index) {
                endings.extend(std::iter::repeat(fresh).take(inserted.len()));
                lines.extend(inserted);
            }
            if deletions.contains(&index) {
                continue;
            }
            lines.push(replacements.remove(&index).unwrap_or(line));
            endings.push(ending);
        }

        // Anything keyed at or past the old end is appended.
        for (_, inserted) in insertions {
            endings.extend(std::iter::repeat(fresh).take(inserted.len()));
            lines.extend(inserted);
        }

        self.lines = lines;
        self.endings = endings;
    }

    /// Render back to text with the captured formatting.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.format.bom {
            out.push(BOM);
        }
        let last = self.lines.len().saturating_sub(1);
        for (index, (line, ending)) in self.lines.iter().zip(&self.endings).enumerate() {
            out.push_str(line);
            if index < last || self.format.trailing_newline {
                out.push_str(ending.as_str());
            }
        }
        out
    }

    /// Write back only if the file on disk is still the one this document was
    /// loaded from.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let current = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if xxh3_64(&current) != self.fingerprint {
            return Err(DocumentError::ConcurrentModification {
                path: path.to_path_buf(),
            });
        }
        self.write_to(path)
    }

    /// Unconditional atomic write, then mtime bump so build tools notice.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let io = |source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };

        atomic_write(path, self.render().as_bytes())?;

        let now = filetime::FileTime::now();
        filetime::set_file_mtime(path, now).map_err(io)?;
        Ok(())
    }
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), DocumentError> {
    let io = |source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Err(DocumentError::NoParent(path.to_path_buf())),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io)?;
    temp.write_all(content).map_err(io)?;
    temp.as_file().sync_all().map_err(io)?;
    temp.persist(path).map_err(|e| io(e.error))?;

    Ok(())
}

/// Pending line edits keyed by original line index.
///
/// Inserts keyed at `i` land before original line `i` (`i == len` appends);
/// several inserts at one key keep staging order. A staged replacement is
/// visible to later reads through [`StagedEdits::read`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedEdits {
    replacements: BTreeMap<usize, String>,
    deletions: BTreeSet<usize>,
    insertions: BTreeMap<usize, Vec<String>>,
}

impl StagedEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, index: usize, text: impl Into<String>) {
        self.replacements.insert(index, text.into());
    }

    pub fn delete(&mut self, index: usize) {
        self.deletions.insert(index);
    }

    pub fn delete_range(&mut self, range: RangeInclusive<usize>) {
        self.deletions.extend(range);
    }

    pub fn insert_before<I, S>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines = lines.into_iter().map(Into::into).peekable();
        if lines.peek().is_none() {
            return;
        }
        self.insertions.entry(index).or_default().extend(lines);
    }

    pub fn insert_after<I, S>(&mut self, index: usize, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_before(index + 1, lines);
    }

    pub fn is_deleted(&self, index: usize) -> bool {
        self.deletions.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.deletions.is_empty() && self.insertions.is_empty()
    }

    /// Current text of a line: its staged replacement, else the original.
    pub fn read<'a>(&'a self, document: &'a Document, index: usize) -> Option<&'a str> {
        match self.replacements.get(&index) {
            Some(text) => Some(text.as_str()),
            None => document.line(index),
        }
    }

    /// Whether applying these edits would change the document at all.
    pub fn changes(&self, document: &Document) -> bool {
        !self.deletions.is_empty()
            || !self.insertions.is_empty()
            || self
                .replacements
                .iter()
                .any(|(index, text)| document.line(*index) != Some(text.as_str()))
    }
}
