//! Import service - statement parsing, deduplication and confirmation
//!
//! parse -> candidates -> merge against the ledger -> preview -> confirm.
//! Confirmation hands candidates one by one to the ledger service; a failing
//! candidate is recorded and the rest continue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::adapters::csv::{detect_columns, CsvParser};
use crate::adapters::ofx::OfxParser;
use crate::config::{Config, ImportProfile};
use crate::domain::result::{Error, Result};
use crate::domain::{
    ImportCandidate, ImportFailure, ImportPreview, ImportSummary, OwnerId, ParsedStatement,
    StatementFormat, TransactionDraft, TransactionFilter,
};
use crate::ports::{Clock, LedgerStore, StatementSource};
use crate::services::LedgerService;

/// Per-call import options
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Skip format detection
    pub format: Option<StatementFormat>,
    /// Saved CSV profile name
    pub profile: Option<String>,
}

/// Result of importing every buffer a statement source supplied
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SourceImport {
    pub source: String,
    pub files: usize,
    pub summary: ImportSummary,
    /// Files that could not be parsed; `index` is the file position
    pub file_errors: Vec<ImportFailure>,
}

pub struct ImportService<S: LedgerStore> {
    store: Arc<S>,
    ledger: Arc<LedgerService<S>>,
    clock: Arc<dyn Clock>,
    dedup_window_days: u32,
    fallback_description: String,
    profiles: HashMap<String, ImportProfile>,
}

impl<S: LedgerStore> ImportService<S> {
    pub fn new(store: Arc<S>, ledger: Arc<LedgerService<S>>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            ledger,
            clock,
            dedup_window_days: config.dedup_window_days,
            fallback_description: config.fallback_description.clone(),
            profiles: config.import_profiles.clone(),
        }
    }

    /// Parse a raw buffer. Structural problems fail the whole statement.
    pub fn parse(&self, bytes: &[u8], options: &ImportOptions) -> Result<(StatementFormat, ParsedStatement)> {
        let format = options.format.unwrap_or_else(|| StatementFormat::detect(bytes));
        let parsed = match format {
            StatementFormat::Ofx => OfxParser::new(self.fallback_description.as_str()).parse(bytes)?,
            StatementFormat::Csv => self.csv_parser(bytes, options.profile.as_deref())?.parse(bytes)?,
        };
        Ok((format, parsed))
    }

    fn csv_parser(&self, bytes: &[u8], profile: Option<&str>) -> Result<CsvParser> {
        let fallback = self.fallback_description.as_str();
        if let Some(name) = profile {
            let profile = self
                .profiles
                .get(name)
                .ok_or_else(|| Error::Config(format!("unknown import profile '{}'", name)))?;
            return Ok(CsvParser::from_profile(profile, fallback));
        }
        let profile = ImportProfile {
            column_mappings: detect_columns(bytes)?.into_mappings().unwrap_or_default(),
            ..Default::default()
        };
        Ok(CsvParser::from_profile(&profile, fallback))
    }

    /// Drop candidates whose signature already exists on the account within
    /// the incoming date range padded by the dedup window. Order is preserved.
    /// Returns the survivors and the number dropped.
    pub fn merge(
        &self,
        owner: &OwnerId,
        account_id: Uuid,
        candidates: Vec<ImportCandidate>,
    ) -> Result<(Vec<ImportCandidate>, usize)> {
        let (Some(first), Some(last)) = (
            candidates.iter().map(|c| c.date).min(),
            candidates.iter().map(|c| c.date).max(),
        ) else {
            return Ok((candidates, 0));
        };

        let window = Days::new(u64::from(self.dedup_window_days));
        let from = first.checked_sub_days(window).unwrap_or(NaiveDate::MIN);
        let to = last.checked_add_days(window).unwrap_or(NaiveDate::MAX);

        let existing: HashSet<String> = self
            .store
            .transactions(owner, &TransactionFilter::for_account(account_id).between(from, to))?
            .iter()
            .map(|t| t.signature())
            .collect();

        let total = candidates.len();
        let fresh: Vec<_> = candidates
            .into_iter()
            .filter(|c| !existing.contains(&c.signature))
            .collect();
        let duplicates = total - fresh.len();
        Ok((fresh, duplicates))
    }

    /// Dry run: everything up to confirmation, no writes
    pub fn preview(
        &self,
        owner: &OwnerId,
        account_id: Uuid,
        bytes: &[u8],
        options: &ImportOptions,
    ) -> Result<ImportPreview> {
        if self.store.account(owner, account_id)?.is_none() {
            return Err(Error::not_found(format!("account {}", account_id)));
        }
        let (format, parsed) = self.parse(bytes, options)?;
        let candidates = parsed
            .lines
            .into_iter()
            .map(|line| ImportCandidate::from_line(account_id, line))
            .collect();
        let (candidates, duplicates) = self.merge(owner, account_id, candidates)?;

        Ok(ImportPreview {
            format,
            candidates,
            duplicates,
            skipped_rows: parsed.skipped_rows,
        })
    }

    /// Create each candidate through the ledger, sequentially. Failures are
    /// recorded with their index and do not stop the batch.
    pub fn confirm(&self, owner: &OwnerId, candidates: &[ImportCandidate]) -> ImportSummary {
        self.confirm_with_progress(owner, candidates, |_| {})
    }

    /// [`confirm`](Self::confirm), calling `on_progress` after each candidate
    pub fn confirm_with_progress(
        &self,
        owner: &OwnerId,
        candidates: &[ImportCandidate],
        mut on_progress: impl FnMut(usize),
    ) -> ImportSummary {
        let batch_id = self.clock.now().format("import_%Y%m%d_%H%M%S").to_string();
        let mut summary = ImportSummary {
            batch_id: batch_id.clone(),
            ..Default::default()
        };

        for (index, candidate) in candidates.iter().enumerate() {
            let mut draft = TransactionDraft::new(
                candidate.account_id,
                candidate.amount,
                candidate.transaction_type,
                candidate.date,
                candidate.description.clone(),
            );
            draft.import_fingerprint = Some(candidate.fingerprint());
            draft.import_batch_id = Some(batch_id.clone());

            match self.ledger.create(owner, draft) {
                Ok(created) => {
                    summary.imported += 1;
                    summary.transaction_ids.extend(created.iter().map(|t| t.id));
                }
                Err(e) => {
                    tracing::warn!(index, code = e.code(), "import candidate rejected");
                    summary.failed += 1;
                    summary.errors.push(ImportFailure {
                        index,
                        message: e.to_string(),
                    });
                }
            }
            on_progress(index + 1);
        }

        tracing::debug!(
            batch = %summary.batch_id,
            imported = summary.imported,
            failed = summary.failed,
            "import batch confirmed"
        );
        summary
    }

    /// Preview and confirm in one go
    pub fn import(
        &self,
        owner: &OwnerId,
        account_id: Uuid,
        bytes: &[u8],
        options: &ImportOptions,
    ) -> Result<ImportSummary> {
        let preview = self.preview(owner, account_id, bytes, options)?;
        let mut summary = self.confirm(owner, &preview.candidates);
        summary.duplicates = preview.duplicates;
        summary.skipped_rows = preview.skipped_rows;
        Ok(summary)
    }

    /// Import every buffer a source supplies into one account. A buffer that
    /// fails to parse is reported and the next one is processed.
    pub fn import_from_source(
        &self,
        owner: &OwnerId,
        account_id: Uuid,
        source: &dyn StatementSource,
        since: Option<NaiveDate>,
    ) -> Result<SourceImport> {
        if self.store.account(owner, account_id)?.is_none() {
            return Err(Error::not_found(format!("account {}", account_id)));
        }
        let files = source.fetch(since)?;
        let mut report = SourceImport {
            source: source.name().to_string(),
            files: files.len(),
            ..Default::default()
        };

        for (index, file) in files.iter().enumerate() {
            match self.import(owner, account_id, &file.bytes, &ImportOptions::default()) {
                Ok(summary) => {
                    if report.summary.batch_id.is_empty() {
                        report.summary.batch_id = summary.batch_id.clone();
                    }
                    report.summary.absorb(summary);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), index, code = e.code(), "statement skipped");
                    report.file_errors.push(ImportFailure {
                        index,
                        message: format!("{}: {}", file.name, e),
                    });
                }
            }
        }
        Ok(report)
    }
}
