//! Line sources.
//!
//! Inference walks its input twice: once for the separator sample and once for
//! the full statistics pass. A [`LineSource`] is therefore a factory: every call
//! to [`LineSource::open`] yields a fresh [`LineReader`] positioned at the first
//! line. Readers release their underlying handle when dropped.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::io_utils;

pub trait LineSource {
    fn open(&self) -> Result<LineReader>;

    /// Label used in logs and reports.
    fn describe(&self) -> String;
}

/// Sequential reader yielding lines without their terminators.
pub struct LineReader {
    inner: Box<dyn BufRead>,
    buffer: String,
    line_number: usize,
}

impl LineReader {
    pub fn new(inner: Box<dyn BufRead>) -> Self {
        Self {
            inner,
            buffer: String::new(),
            line_number: 0,
        }
    }

    /// Hand the decoded stream to a record parser. Lines already read stay consumed.
    pub fn into_inner(self) -> Box<dyn BufRead> {
        self.inner
    }

    /// Number of lines handed out so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        let read = self
            .inner
            .read_line(&mut self.buffer)
            .with_context(|| format!("Reading line {}", self.line_number + 1))?;
        if read == 0 {
            return Ok(None);
        }
        if self.buffer.ends_with('\n') {
            self.buffer.pop();
            if self.buffer.ends_with('\r') {
                self.buffer.pop();
            }
        }
        self.line_number += 1;
        Ok(Some(std::mem::take(&mut self.buffer)))
    }
}

impl Iterator for LineReader {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

/// A file on disk decoded with a fixed encoding; a byte order mark wins over
/// the configured encoding.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    encoding: &'static Encoding,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, encoding: &'static Encoding) -> Self {
        Self {
            path: path.into(),
            encoding,
        }
    }
}

impl LineSource for FileSource {
    fn open(&self) -> Result<LineReader> {
        let file = File::open(&self.path)
            .with_context(|| format!("Opening input file {:?}", self.path))?;
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(self.encoding))
            .bom_override(true)
            .build(file);
        Ok(LineReader::new(Box::new(BufReader::new(decoder))))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory text; every `open` replays it from the start.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    text: Arc<str>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn from_lines<S: AsRef<str>>(label: impl Into<String>, lines: &[S]) -> Self {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        Self::new(label, text)
    }

    /// Buffer an entire reader so it can be replayed.
    pub fn from_reader<R: Read>(
        label: impl Into<String>,
        mut reader: R,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .context("Buffering input stream")?;
        let (text, _, _) = encoding.decode(&bytes);
        Ok(Self::new(label, text.as_ref()))
    }
}

impl LineSource for MemorySource {
    fn open(&self) -> Result<LineReader> {
        let cursor = Cursor::new(ArcText(Arc::clone(&self.text)));
        Ok(LineReader::new(Box::new(cursor)))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

struct ArcText(Arc<str>);

impl AsRef<[u8]> for ArcText {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Resolve a CLI input path; `-` buffers stdin.
pub fn open_input(path: &Path, encoding: Option<&'static Encoding>) -> Result<Box<dyn LineSource>> {
    let encoding = encoding.unwrap_or(UTF_8);
    if io_utils::is_dash(path) {
        let source = MemorySource::from_reader("stdin", io::stdin().lock(), encoding)?;
        return Ok(Box::new(source));
    }
    Ok(Box::new(FileSource::new(path, encoding)))
}
