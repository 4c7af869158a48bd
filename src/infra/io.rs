use anyhow::{Context, Result};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use crate::core::range::Range;
use crate::infra::line_index::NewlineIndex;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl FileContent {
    /// Decode as UTF-8, replacing invalid sequences instead of failing
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            FileContent::Mapped(mmap) => String::from_utf8_lossy(mmap),
            FileContent::Buffered(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the mapping is read-only and dropped before the file is rewritten
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        Ok(FileContent::Buffered(content))
    }
}

/// Read a whole source file as an owned string
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(read_file_smart(path)?.text().into_owned())
}

/// Text of `range` inside the file at `path`
pub fn read_range<P: AsRef<Path>>(path: P, range: &Range) -> Result<String> {
    let path = path.as_ref();
    let content = read_file_smart(path)?;
    let text = content.text();
    let idx = NewlineIndex::build(text.as_bytes());
    Ok(idx.slice(&text, range).to_owned())
}
