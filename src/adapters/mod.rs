// Adapters layer: concrete implementations for external systems (storage, http).

pub mod local;
pub mod rest;

pub use local::LocalStorage;
pub use rest::{RestCatalog, RestImportSink};
