use crate::core::reader;
use crate::core::{PACING_DELAY_MS, PACING_THRESHOLD};
use crate::domain::model::{
    CancelToken, ImportOutcome, ImportReport, ImportStatus, ModuleProfile, Record, Resolution,
    SkippedRecord,
};
use crate::domain::ports::{ImportSink, ProgressSink, RelationResolver};
use crate::utils::error::{PipelineError, Result};
use crate::utils::logger::TracingProgress;
use crate::utils::validation;
use std::sync::Arc;
use std::time::Duration;

/// Batches above this size are rejected outright.
pub const MAX_IMPORT_ROWS: usize = 1000;

/// Relation resolution owns the 0–40% slice of the progress bar; the
/// remainder belongs to submission.
const RESOLUTION_PROGRESS_CEILING: u8 = 40;

/// 匯入管線：解析 → 驗證 → 關聯解析 → 送出，單一循序非同步任務
pub struct Importer {
    profile: ModuleProfile,
    sink: Arc<dyn ImportSink>,
    resolver: Option<Arc<dyn RelationResolver>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    pacing: bool,
}

impl Importer {
    pub fn new(profile: ModuleProfile, sink: Arc<dyn ImportSink>) -> Self {
        Self {
            profile,
            sink,
            resolver: None,
            progress: Arc::new(TracingProgress),
            cancel: CancelToken::new(),
            pacing: false,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn RelationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Small sleeps during resolution so a progress indicator stays
    /// visible on small batches. Cosmetic only.
    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn run(&self, file_name: &str, text: &str) -> Result<ImportReport> {
        validation::ensure_csv_file(file_name)?;
        self.progress.update("parsing", 0);

        let records = reader::parse(text, &self.profile)?;
        if records.is_empty() {
            return Err(PipelineError::PreconditionError {
                message: "file contains no data rows".to_string(),
            });
        }
        if records.len() > MAX_IMPORT_ROWS {
            return Err(PipelineError::PreconditionError {
                message: format!(
                    "file has {} rows; the limit per import is {}",
                    records.len(),
                    MAX_IMPORT_ROWS
                ),
            });
        }

        tracing::info!("📄 {}: parsed {} rows", self.profile.name, records.len());

        // 驗證：失敗的列收集錯誤並排除，全數失敗則整批終止
        let total = records.len();
        let mut row_errors = Vec::new();
        let mut survivors: Vec<(usize, Record)> = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let errors = self.validate_record(&record, index);
            if errors.is_empty() {
                survivors.push((index, record));
            } else {
                for error in errors {
                    // 顯示行號 = 索引 + 2（標題列 + 1-based）
                    row_errors.push(format!("Line {}: {}", index + 2, error));
                }
            }
        }

        if survivors.is_empty() {
            return Err(PipelineError::ValidationError {
                message: format!(
                    "all {} rows failed validation: {}",
                    total,
                    row_errors.join("; ")
                ),
            });
        }

        let (resolved, skipped) = self.resolve_relations(survivors).await?;

        if resolved.is_empty() {
            tracing::warn!(
                "⏭️ {}: every surviving row was skipped during relation resolution",
                self.profile.name
            );
            return Ok(ImportReport {
                status: ImportStatus::Failed,
                message: "no records left to submit after relation resolution".to_string(),
                imported: 0,
                submitted: 0,
                row_errors,
                skipped,
                sink_errors: Vec::new(),
                retryable: true,
            });
        }

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        self.progress.update("submitting", RESOLUTION_PROGRESS_CEILING);
        let submitted = resolved.len();

        let outcome = match self.sink.submit(resolved).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("❌ {}: submission failed: {}", self.profile.name, e);
                return Ok(ImportReport {
                    status: ImportStatus::Failed,
                    message: e.to_string(),
                    imported: 0,
                    submitted,
                    row_errors,
                    skipped,
                    sink_errors: Vec::new(),
                    retryable: true,
                });
            }
        };

        self.progress.update("completed", 100);
        Ok(self.classify(outcome, submitted, row_errors, skipped))
    }

    fn validate_record(&self, record: &Record, index: usize) -> Vec<String> {
        match &self.profile.validate {
            Some(validate) => validate(record, index),
            None => validation::required_errors(&self.profile.import_columns, record),
        }
    }

    /// 逐筆解析關聯欄位；解析不了的記錄跳過，不中斷整批
    async fn resolve_relations(
        &self,
        survivors: Vec<(usize, Record)>,
    ) -> Result<(Vec<Record>, Vec<SkippedRecord>)> {
        let Some(resolver) = &self.resolver else {
            self.progress.update("resolving", RESOLUTION_PROGRESS_CEILING);
            return Ok((survivors.into_iter().map(|(_, r)| r).collect(), Vec::new()));
        };

        let total = survivors.len();
        let mut resolved = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (position, (index, mut record)) in survivors.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let mut skip: Option<SkippedRecord> = None;

            for field in record.relation_keys() {
                let Some(text) = record.get_str(&field).map(str::to_string) else {
                    continue;
                };

                match self.resolve_one(resolver.as_ref(), &field, &text).await {
                    Resolution::Resolved(id) => {
                        record
                            .data
                            .insert(field.clone(), serde_json::Value::Number(id.into()));
                    }
                    Resolution::Skipped(reason) => {
                        skip = Some(SkippedRecord {
                            line: index + 2,
                            field: field.clone(),
                            value: text,
                            reason,
                        });
                        break;
                    }
                }
            }

            match skip {
                Some(entry) => {
                    tracing::warn!(
                        "⏭️ {}: line {} skipped ({} '{}': {})",
                        self.profile.name,
                        entry.line,
                        entry.field,
                        entry.value,
                        entry.reason
                    );
                    skipped.push(entry);
                }
                None => resolved.push(record),
            }

            let percent = ((position + 1) * RESOLUTION_PROGRESS_CEILING as usize / total) as u8;
            self.progress.update("resolving", percent);

            if self.pacing && total <= PACING_THRESHOLD {
                tokio::time::sleep(Duration::from_millis(PACING_DELAY_MS)).await;
            }
        }

        Ok((resolved, skipped))
    }

    async fn resolve_one(
        &self,
        resolver: &dyn RelationResolver,
        field: &str,
        text: &str,
    ) -> Resolution {
        match resolver.resolve_id(field, text).await {
            Ok(Some(id)) => Resolution::Resolved(id),
            Ok(None) => {
                if resolver.can_create(field) {
                    match resolver.create(field, text).await {
                        Ok(id) => Resolution::Resolved(id),
                        Err(e) => Resolution::Skipped(format!("creation failed: {}", e)),
                    }
                } else {
                    Resolution::Skipped("no match found".to_string())
                }
            }
            Err(e) => Resolution::Skipped(format!("lookup failed: {}", e)),
        }
    }

    fn classify(
        &self,
        outcome: ImportOutcome,
        submitted: usize,
        row_errors: Vec<String>,
        skipped: Vec<SkippedRecord>,
    ) -> ImportReport {
        let sink_errors = outcome.errors;

        let (status, message, retryable) = if !outcome.success {
            (ImportStatus::Failed, outcome.message, true)
        } else if outcome.imported == 0 {
            let message = if outcome.message.is_empty() {
                "no records were imported (possibly all duplicates)".to_string()
            } else {
                outcome.message
            };
            (ImportStatus::CompletedWithWarnings, message, false)
        } else if !sink_errors.is_empty() || !row_errors.is_empty() || !skipped.is_empty() {
            (ImportStatus::CompletedWithWarnings, outcome.message, false)
        } else {
            (ImportStatus::Completed, outcome.message, false)
        };

        match status {
            ImportStatus::Failed => {
                tracing::error!("❌ {}: import failed: {}", self.profile.name, message)
            }
            _ => tracing::info!(
                "✅ {}: imported {} of {} submitted",
                self.profile.name,
                outcome.imported,
                submitted
            ),
        }

        ImportReport {
            status,
            message,
            imported: outcome.imported,
            submitted,
            row_errors,
            skipped,
            sink_errors,
            retryable,
        }
    }
}
