use async_trait::async_trait;
use common::{Error, Result};
use reqwest::Client;
use tracing::info;

use crate::models::{TopHubNode, TopHubResponse};
use crate::registry::HotListSpec;
use crate::source::HotListSource;

#[derive(Clone)]
pub struct TopHubApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TopHubApi {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn get_node(&self, hash_id: &str) -> Result<TopHubResponse> {
        let url = format!("{}/nodes/{}", self.base_url, hash_id);
        info!("Fetching hot list node: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "TopHub API error: {}",
                response.status().as_u16()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl HotListSource for TopHubApi {
    async fn fetch(&self, spec: &HotListSpec) -> Result<TopHubNode> {
        let response = self.get_node(spec.hash_id).await?;
        if response.error || response.status != 200 {
            return Err(Error::Api(format!(
                "TopHub API reported failure for {} (status {})",
                spec.hash_id, response.status
            )));
        }
        Ok(response.data)
    }

    fn name(&self) -> &'static str {
        "TopHub"
    }
}
