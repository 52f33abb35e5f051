pub mod exporter;
pub mod format;
pub mod importer;
pub mod reader;

pub use crate::domain::model::{
    ExportReport, ExportScope, ImportOutcome, ImportReport, ImportStatus, ModuleProfile, Record,
};
pub use crate::domain::ports::{ImportSink, ProgressSink, RelationResolver, Storage};
pub use crate::utils::error::Result;

/// 小批次（≤50 筆）才加入節奏延遲，讓進度條可見
pub(crate) const PACING_THRESHOLD: usize = 50;
pub(crate) const PACING_DELAY_MS: u64 = 25;
