//! Directory-backed statement inbox
//!
//! A mail fetcher (or the user) drops statement files into a directory; the
//! inbox hands their bytes to the import pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::result::Result;
use crate::ports::{StatementFile, StatementSource};

const STATEMENT_EXTENSIONS: [&str; 3] = ["ofx", "qfx", "csv"];

pub struct DirectoryInbox {
    dir: PathBuf,
}

impl DirectoryInbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_statement(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| STATEMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn modified_on(path: &Path) -> Option<NaiveDate> {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(DateTime::<Utc>::from(modified).date_naive())
    }
}

impl StatementSource for DirectoryInbox {
    fn name(&self) -> &str {
        "inbox"
    }

    /// Statement files sorted by name; `since` filters on modification date
    fn fetch(&self, since: Option<NaiveDate>) -> Result<Vec<StatementFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && Self::is_statement(p))
            .filter(|p| match since {
                Some(since) => Self::modified_on(p).map(|d| d >= since).unwrap_or(true),
                None => true,
            })
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = std::fs::read(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(StatementFile { name, bytes });
        }
        tracing::debug!(dir = %self.dir.display(), files = files.len(), "fetched inbox statements");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_statement_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.ofx"), "<OFX></OFX>").unwrap();
        std::fs::write(dir.path().join("a.CSV"), "Date,Amount\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::create_dir(dir.path().join("archive.ofx")).unwrap();

        let inbox = DirectoryInbox::new(dir.path());
        let files = inbox.fetch(None).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.CSV", "b.ofx"]);
        assert_eq!(files[1].bytes, b"<OFX></OFX>");
    }

    #[test]
    fn test_since_filter_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("today.ofx"), "<OFX></OFX>").unwrap();
        let inbox = DirectoryInbox::new(dir.path());

        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        assert!(inbox.fetch(Some(tomorrow)).unwrap().is_empty());

        let missing = DirectoryInbox::new(dir.path().join("nope"));
        assert!(missing.fetch(None).unwrap().is_empty());
    }
}
