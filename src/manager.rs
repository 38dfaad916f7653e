//! Loading many logs at once, grouped by the `#path` they declare.
//!
//! A directory is walked recursively. Files whose name does not end in a
//! supported extension are ignored, and files whose header does not load are
//! skipped with a warning. The rest are grouped by `#path`; a group whose
//! files disagree on their field layout is reported once per odd file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::iter;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::row::{Row, Rows};
use crate::source::{self, LineSource};
use crate::spec::LogSpec;
use crate::stats::FieldStats;

/// File extensions, after the first `.`, picked up when scanning.
///
/// Rotated names such as `conn.00:00:00-01:00:00.log.gz` match by suffix.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["log", "log.gz", "log.bz2"];

/// A per-row predicate; rows for which it returns false are dropped.
pub type RowFilter = Box<dyn Fn(&Row) -> bool>;

type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// True if the file name carries one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    match source::extension(path) {
        Some(ext) => SUPPORTED_EXTENSIONS
            .iter()
            .any(|supported| ext == *supported || ext.ends_with(&format!(".{}", supported))),
        None => false,
    }
}

/// One loaded log file.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    spec: LogSpec,
}

impl LogFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spec(&self) -> &LogSpec {
        &self.spec
    }

    /// Open the file again and iterate its rows from the start.
    pub fn rows(&self) -> Result<Rows<'_, LineSource>> {
        self.spec.open(&self.path)
    }
}

fn file_rows(file: &LogFile) -> RowIter<'_> {
    match file.rows() {
        Ok(rows) => Box::new(rows),
        Err(err) => Box::new(iter::once(Err(err))),
    }
}

/// Every loaded file that declares the same `#path`.
pub struct LogGroup {
    path: String,
    files: Vec<LogFile>,
    sampling: f64,
    filter: Option<RowFilter>,
}

impl LogGroup {
    fn new(path: String, sampling: f64) -> Self {
        Self {
            path,
            files: Vec::new(),
            sampling,
            filter: None,
        }
    }

    /// The shared `#path`, e.g. `conn`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Files in load order; never empty.
    pub fn files(&self) -> &[LogFile] {
        &self.files
    }

    /// True when every file has the same field layout.
    pub fn is_consistent(&self) -> bool {
        let mut ids = self.files.iter().map(|f| f.spec.id());
        match ids.next() {
            Some(first) => ids.all(|id| id == first),
            None => true,
        }
    }

    /// Drop rows for which `filter` returns false. Sampling happens first.
    pub fn set_filter<F>(&mut self, filter: F)
    where
        F: Fn(&Row) -> bool + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    fn keep(&self, row: &Result<Row>) -> bool {
        let Ok(row) = row else {
            return true;
        };
        if self.sampling < 1.0 && rand::random::<f64>() >= self.sampling {
            return false;
        }
        self.filter.as_ref().map_or(true, |filter| filter(row))
    }

    /// Rows of every file in turn, sampled and filtered.
    ///
    /// Row errors are passed through untouched; a file that can no longer
    /// be opened contributes a single error.
    pub fn entries(&self) -> impl Iterator<Item = Result<Row>> + '_ {
        self.files
            .iter()
            .flat_map(file_rows)
            .filter(move |row| self.keep(row))
    }

    /// Accumulate every field over the entries of the group.
    ///
    /// Accumulators are seeded from the first file. Files with a different
    /// layout are skipped, as are rows that fail to decode.
    pub fn accumulate(&self) -> Result<FieldStats> {
        let first = &self.files[0].spec;
        let layout = first.id();
        let mut stats = first.accumulators();

        for file in &self.files {
            if file.spec.id() != layout {
                warn!("{}: layout differs from {}, not accumulated", file.path.display(), first.origin());
                continue;
            }
            for row in file_rows(file).filter(|row| self.keep(row)) {
                match row {
                    Ok(row) => stats.accumulate_row(&row),
                    Err(err) if err.is_row_error() => warn!("skipping row: {}", err),
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(stats)
    }
}

/// Loads log files and directories and groups them by `#path`.
///
/// # Examples
///
/// ```no_run
/// use brolog::LogManager;
///
/// let mut manager = LogManager::new().sampling(0.1);
/// manager.load("/var/log/bro")?;
/// println!("{}", manager.summary());
///
/// if let Some(conn) = manager.get_mut("conn") {
///     conn.set_filter(|row| row.get("proto").and_then(|v| v.as_str()) == Some("tcp"));
///     println!("{} sampled tcp rows", conn.entries().filter_map(Result::ok).count());
/// }
/// # Ok::<(), brolog::Error>(())
/// ```
pub struct LogManager {
    sampling: f64,
    groups: BTreeMap<String, LogGroup>,
    seen: HashSet<PathBuf>,
    scanned: usize,
    loaded: usize,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            sampling: 1.0,
            groups: BTreeMap::new(),
            seen: HashSet::new(),
            scanned: 0,
            loaded: 0,
        }
    }

    /// Keep each row with probability `rate`, clamped to `0.0..=1.0`.
    ///
    /// Applies to groups created by later calls to [`LogManager::load`].
    pub fn sampling(mut self, rate: f64) -> Self {
        self.sampling = rate.clamp(0.0, 1.0);
        self
    }

    /// Load a file, or every supported file below a directory.
    ///
    /// Returns how many files were added. Paths already loaded are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `path` does not exist. Individual files that
    /// fail to load are skipped, not reported as errors.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;

        let candidates: Vec<PathBuf> = if metadata.is_dir() {
            WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!("{}", err);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect()
        } else {
            vec![path.to_path_buf()]
        };

        let mut added = 0;
        for candidate in candidates {
            if !is_supported(&candidate) {
                debug!("ignoring {}", candidate.display());
                continue;
            }
            if !self.seen.insert(candidate.clone()) {
                continue;
            }
            self.scanned += 1;

            match LogSpec::load(&candidate) {
                Ok(spec) => {
                    self.insert(LogFile { path: candidate, spec });
                    self.loaded += 1;
                    added += 1;
                }
                Err(err) => warn!("skipping {}", err),
            }
        }
        Ok(added)
    }

    fn insert(&mut self, file: LogFile) {
        let sampling = self.sampling;
        let key = file.spec.path().to_string();
        let group = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| LogGroup::new(key, sampling));

        if let Some(first) = group.files.first() {
            if first.spec.id() != file.spec.id() {
                warn!(
                    "multiple layouts for #path {}: {} differs from {}",
                    group.path,
                    file.path.display(),
                    first.path.display()
                );
            }
        }
        group.files.push(file);
    }

    pub fn get(&self, path: &str) -> Option<&LogGroup> {
        self.groups.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut LogGroup> {
        self.groups.get_mut(path)
    }

    /// Groups ordered by `#path`.
    pub fn groups(&self) -> impl Iterator<Item = &LogGroup> {
        self.groups.values()
    }

    /// Every entry of every group.
    pub fn entries(&self) -> impl Iterator<Item = Result<Row>> + '_ {
        self.groups.values().flat_map(LogGroup::entries)
    }

    /// Supported files examined so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Files whose header loaded.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// Number of distinct `#path`s.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "found {} log files, loaded {}, {} unique paths",
            self.scanned,
            self.loaded,
            self.groups.len()
        )
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("conn.log")));
        assert!(is_supported(Path::new("logs/dns.log.gz")));
        assert!(is_supported(Path::new("http.log.bz2")));
        assert!(is_supported(Path::new("conn.00:00:00-01:00:00.log.gz")));
        assert!(!is_supported(Path::new("conn.log.zip")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("catalog")));
    }

    #[test]
    fn test_sampling_is_clamped() {
        assert_eq!(LogManager::new().sampling(2.0).sampling, 1.0);
        assert_eq!(LogManager::new().sampling(-1.0).sampling, 0.0);
    }

    #[test]
    fn test_missing_path() {
        let err = LogManager::new().load("/nonexistent/bro").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
