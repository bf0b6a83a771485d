use async_trait::async_trait;

use crate::error::Result;

/// A periodic collection job, run by the scheduler or on demand over HTTP.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn run(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}
