use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    /// Keys treated as references to another entity, sorted for a
    /// deterministic resolution order.
    pub fn relation_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .keys()
            .filter(|k| is_relation_field(k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

/// Convention: `id_`-prefixed keys point at another entity. `id_usuario`
/// is the record owner, not a reference the pipelines touch.
pub fn is_relation_field(key: &str) -> bool {
    key.starts_with("id_") && key != "id_usuario"
}

/// Internal/owner identifiers never appear in exported files.
pub fn is_internal_field(key: &str) -> bool {
    key == "id" || key == "id_usuario"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
}

impl ColumnSpec {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

pub type HeaderMapFn = Box<dyn Fn(&str) -> String + Send + Sync>;
pub type ValidateFn = Box<dyn Fn(&Record, usize) -> Vec<String> + Send + Sync>;
pub type RenderFn = Box<dyn Fn(&str, &serde_json::Value) -> Option<String> + Send + Sync>;

/// Per-module configuration handed to both pipelines: column layout plus
/// the optional strategy overrides (header mapping, validation, rendering).
pub struct ModuleProfile {
    pub name: String,
    pub import_columns: Vec<ColumnSpec>,
    pub export_columns: Vec<ColumnSpec>,
    pub header_map: Option<HeaderMapFn>,
    pub validate: Option<ValidateFn>,
    pub render: Option<RenderFn>,
    pub active_label: String,
    pub inactive_label: String,
}

impl ModuleProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            import_columns: Vec::new(),
            export_columns: Vec::new(),
            header_map: None,
            validate: None,
            render: None,
            active_label: "Ativo".to_string(),
            inactive_label: "Inativo".to_string(),
        }
    }

    pub fn with_import_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.import_columns = columns;
        self
    }

    pub fn with_export_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.export_columns = columns;
        self
    }

    pub fn with_header_map(mut self, f: HeaderMapFn) -> Self {
        self.header_map = Some(f);
        self
    }

    pub fn with_validator(mut self, f: ValidateFn) -> Self {
        self.validate = Some(f);
        self
    }

    pub fn with_render(mut self, f: RenderFn) -> Self {
        self.render = Some(f);
        self
    }

    pub fn with_status_labels(mut self, active: &str, inactive: &str) -> Self {
        self.active_label = active.to_string();
        self.inactive_label = inactive.to_string();
        self
    }
}

impl std::fmt::Debug for ModuleProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleProfile")
            .field("name", &self.name)
            .field("import_columns", &self.import_columns.len())
            .field("export_columns", &self.export_columns.len())
            .field("header_map", &self.header_map.is_some())
            .field("validate", &self.validate.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Batch result reported by an import sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub imported: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
}

/// One record dropped during relation resolution. Skips are a policy, not
/// an error: the rest of the batch keeps going, but the drop is never
/// silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub line: usize,
    pub field: String,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub message: String,
    pub imported: usize,
    pub submitted: usize,
    pub row_errors: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
    pub sink_errors: Vec<String>,
    /// The caller may keep its file selection and retry when set.
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(i64),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Current,
    Selected(Vec<i64>),
    All,
}

impl ExportScope {
    pub fn token(&self) -> &'static str {
        match self {
            ExportScope::Current => "current",
            ExportScope::Selected(_) => "selected",
            ExportScope::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub exported: usize,
    pub file_name: String,
}

/// Cooperative cancellation flag polled by the pipelines between records.
/// In-flight collaborator calls are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
