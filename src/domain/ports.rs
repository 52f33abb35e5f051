use crate::domain::model::{ImportOutcome, Record};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Resolves relation fields between their textual and numeric forms.
/// `create` is only attempted when `can_create` allows it for the field.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    async fn resolve_id(&self, field: &str, text: &str) -> Result<Option<i64>>;

    fn can_create(&self, _field: &str) -> bool {
        false
    }

    async fn create(&self, field: &str, _text: &str) -> Result<i64> {
        Err(PipelineError::Processing {
            message: format!("creation not supported for '{}'", field),
        })
    }

    async fn resolve_label(&self, field: &str, id: i64) -> Result<String>;
}

#[async_trait]
pub trait ImportSink: Send + Sync {
    async fn submit(&self, records: Vec<Record>) -> Result<ImportOutcome>;
}

/// Receives monotonic progress updates from a running pipeline.
pub trait ProgressSink: Send + Sync {
    fn update(&self, stage: &str, percent: u8);
}
