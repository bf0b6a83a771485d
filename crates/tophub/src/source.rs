use async_trait::async_trait;
use common::Result;

use crate::models::TopHubNode;
use crate::registry::HotListSpec;

/// Where the items of one hot list come from.
#[async_trait]
pub trait HotListSource: Send + Sync {
    async fn fetch(&self, spec: &HotListSpec) -> Result<TopHubNode>;
    fn name(&self) -> &'static str;
}
