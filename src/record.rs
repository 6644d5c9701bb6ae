use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use miette::{Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Value};
use tempfile::NamedTempFile;

/// One video to republish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub url: String,
    pub uploaded: bool,

    /// Keys we do not know about, kept as-is when saving
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoEntry {
    #[cfg(test)]
    pub fn new(url: impl Into<String>, uploaded: bool) -> Self {
        Self {
            url: url.into(),
            uploaded,
            extra: Map::new(),
        }
    }
}

/// Content of the record file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub videos: Vec<VideoEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    #[cfg(test)]
    pub fn new(videos: Vec<VideoEntry>) -> Self {
        Self {
            videos,
            extra: Map::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.videos.iter().filter(|v| !v.uploaded).count()
    }
}

/// The JSON file listing the videos and whether they have been uploaded.
///
/// There is no locking: only one process must use a given record file.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole record file.
    ///
    /// A missing or malformed file is an error.
    pub fn load(&self) -> Result<Record> {
        let file = File::open(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not open record file {}", self.path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not parse record file {}", self.path.display()))
    }

    /// Overwrite the record file with the given record.
    ///
    /// The data is written to a sibling temporary file which then replaces
    /// the record, so a crash never leaves a half-written record behind.
    pub fn save(&self, record: &Record) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .into_diagnostic()
            .wrap_err("Could not create temporary record file")?;

        // Same layout as a 4-space indented JSON dump
        let mut ser =
            serde_json::Serializer::with_formatter(&mut tmp, PrettyFormatter::with_indent(b"    "));
        record
            .serialize(&mut ser)
            .into_diagnostic()
            .wrap_err("Could not serialize record")?;
        tmp.flush().into_diagnostic()?;

        tmp.persist(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not replace record file {}", self.path.display()))?;
        Ok(())
    }
}
