use crate::core::format;
use crate::core::{PACING_DELAY_MS, PACING_THRESHOLD};
use crate::domain::model::{
    is_internal_field, CancelToken, ColumnSpec, ExportReport, ExportScope, ModuleProfile, Record,
};
use crate::domain::ports::{ProgressSink, RelationResolver, Storage};
use crate::utils::error::{PipelineError, Result};
use crate::utils::logger::TracingProgress;
use std::sync::Arc;
use std::time::Duration;

/// Label resolution owns the 0–90% slice of the progress bar.
const LABEL_PROGRESS_CEILING: u8 = 90;

/// 匯出管線：選取子集 → 關聯標籤解析 → 格式化 → 序列化 → 交付存儲
pub struct Exporter<S: Storage> {
    profile: ModuleProfile,
    storage: S,
    resolver: Option<Arc<dyn RelationResolver>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    pacing: bool,
}

impl<S: Storage> Exporter<S> {
    pub fn new(profile: ModuleProfile, storage: S) -> Self {
        Self {
            profile,
            storage,
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

    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn run(&self, records: Vec<Record>, scope: ExportScope) -> Result<ExportReport> {
        let subset: Vec<Record> = match &scope {
            ExportScope::Selected(ids) => records
                .into_iter()
                .filter(|r| r.get_i64("id").map(|id| ids.contains(&id)).unwrap_or(false))
                .collect(),
            _ => records,
        };

        if subset.is_empty() {
            return Err(PipelineError::PreconditionError {
                message: "there are no records to export".to_string(),
            });
        }

        let columns: Vec<&ColumnSpec> = self
            .profile
            .export_columns
            .iter()
            .filter(|c| !is_internal_field(&c.key))
            .collect();
        if columns.is_empty() {
            return Err(PipelineError::ConfigError {
                message: format!("profile '{}' has no exportable columns", self.profile.name),
            });
        }

        self.progress.update("resolving", 0);
        let resolved = self.resolve_labels(subset).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns.iter().map(|c| c.label.as_str()))?;
        for record in &resolved {
            let row: Vec<String> = columns
                .iter()
                .map(|column| match record.get(&column.key) {
                    Some(value) => format::format_value(&self.profile, &column.key, value),
                    None => String::new(),
                })
                .collect();
            writer.write_record(&row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::Processing {
                message: format!("CSV buffer error: {}", e),
            })?;

        let file_name = format!(
            "{}_{}_{}.csv",
            self.profile.name,
            scope.token(),
            chrono::Local::now().format("%d-%m-%Y")
        );
        self.storage.write_file(&file_name, &bytes).await?;

        self.progress.update("completed", 100);
        tracing::info!(
            "📁 {}: exported {} records to {}",
            self.profile.name,
            resolved.len(),
            file_name
        );

        Ok(ExportReport {
            exported: resolved.len(),
            file_name,
        })
    }

    /// 關聯欄位的數字代號換成顯示文字；查不到就保留原值
    async fn resolve_labels(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let Some(resolver) = &self.resolver else {
            self.progress.update("resolving", LABEL_PROGRESS_CEILING);
            return Ok(records);
        };

        let total = records.len();
        let mut out = Vec::with_capacity(total);

        for (position, mut record) in records.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            for field in record.relation_keys() {
                let Some(id) = record.get_i64(&field) else {
                    continue;
                };

                match resolver.resolve_label(&field, id).await {
                    Ok(label) => {
                        record
                            .data
                            .insert(field.clone(), serde_json::Value::String(label));
                    }
                    Err(e) => {
                        tracing::debug!("label lookup failed for {}={}: {}", field, id, e);
                    }
                }
            }

            out.push(record);

            let percent = ((position + 1) * LABEL_PROGRESS_CEILING as usize / total) as u8;
            self.progress.update("resolving", percent);

            if self.pacing && total <= PACING_THRESHOLD {
                tokio::time::sleep(Duration::from_millis(PACING_DELAY_MS)).await;
            }
        }

        Ok(out)
    }
}
