//! Statement source port
//!
//! Supplies raw statement buffers fetched by an external collaborator (for
//! example a mail fetcher saving attachments). The import pipeline itself
//! performs no network I/O.

use chrono::NaiveDate;

use crate::domain::result::Result;

/// One raw statement buffer
#[derive(Debug, Clone)]
pub struct StatementFile {
    /// Origin of the buffer (file name, attachment name)
    pub name: String,
    pub bytes: Vec<u8>,
}

pub trait StatementSource: Send + Sync {
    /// Source name for logs (e.g., "inbox")
    fn name(&self) -> &str;

    /// Buffers received on or after `since`, or all of them when `None`
    fn fetch(&self, since: Option<NaiveDate>) -> Result<Vec<StatementFile>>;
}
