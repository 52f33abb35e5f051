pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::profiles::ProfilesConfig;

pub use adapters::{LocalStorage, RestCatalog, RestImportSink};
pub use core::{exporter::Exporter, importer::Importer};
pub use domain::model::{
    CancelToken, ColumnSpec, ExportReport, ExportScope, ImportOutcome, ImportReport, ImportStatus,
    ModuleProfile, Record, Resolution, SkippedRecord,
};
pub use domain::ports::{ImportSink, ProgressSink, RelationResolver, Storage};
pub use utils::error::{PipelineError, Result};
