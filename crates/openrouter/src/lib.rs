pub mod fetch;
pub mod models;
pub mod page;
pub mod prompt;
pub mod reply;

use std::time::Duration;

use anyhow::anyhow;
use common::config::OpenRouterConfig;
use common::{Error, Result};
use reqwest::Client;
use time::OffsetDateTime;
use tracing::{info, warn};

pub use fetch::PageFetcher;
pub use models::{
    ChatMessage, ChatRequest, ChatResponse, Language, PageSummary, RewriteOptions, RewriteOutput,
    RewriteType, Tone, UrlMetadata, Usage,
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible chat completion client pointed at OpenRouter.
#[derive(Clone)]
pub struct OpenRouterClient {
    http_client: Client,
    pages: PageFetcher,
    base_url: String,
    api_key: Option<String>,
    model: String,
    site_url: String,
    app_title: String,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            pages: PageFetcher::new(config.page_fetch.clone(), USER_AGENT),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            site_url: config.site_url.clone(),
            app_title: config.app_title.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config(anyhow!("OPENROUTER_API_KEY must be set")))?;
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_title)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "OpenRouter API error ({}): {}",
                status.as_u16(),
                text
            )));
        }

        Ok(response.json().await?)
    }

    /// Rewrites an article with the prompt template selected by `options`.
    pub async fn rewrite_content(
        &self,
        title: &str,
        content: &str,
        options: &RewriteOptions,
    ) -> Result<RewriteOutput> {
        self.try_rewrite(title, content, options)
            .await
            .map_err(|e| Error::Api(format!("AI改写失败: {e}")))
    }

    async fn try_rewrite(
        &self,
        title: &str,
        content: &str,
        options: &RewriteOptions,
    ) -> Result<RewriteOutput> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompt::rewrite_system_prompt(options)),
                ChatMessage::user(prompt::rewrite_user_prompt(title, content, options)),
            ],
            temperature: 0.7,
            max_tokens: 4000,
            response_format: Some(models::ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };

        let response = self.chat(&request).await?;
        let reply = response
            .first_content()
            .ok_or_else(|| Error::Api("No response from AI".to_string()))?;
        let usage = response.usage.unwrap_or_default();

        reply::parse_rewrite_reply(reply, title, content, usage)
    }

    /// Fetches a public page and summarizes its markup.
    pub async fn fetch_page(&self, url: &str) -> Result<PageSummary> {
        let html = self.pages.fetch_html(url).await?;
        Ok(page::summarize_html(&html))
    }

    /// Metadata for a manually submitted link. Gaps fall back to placeholder
    /// values; only when neither the page nor the model answered is it an
    /// error.
    pub async fn extract_url_metadata(&self, url: &str) -> Result<UrlMetadata> {
        let page = match self.fetch_page(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!("Could not fetch {} for metadata: {}", url, e);
                None
            }
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompt::METADATA_SYSTEM_PROMPT),
                ChatMessage::user(prompt::metadata_user_prompt(url, page.as_ref())),
            ],
            temperature: 0.1,
            max_tokens: 500,
            response_format: None,
        };

        let reply = match self.chat(&request).await {
            Ok(response) => response.first_content().map(str::to_string),
            Err(e) => {
                if page.is_none() {
                    return Err(Error::Api(format!("metadata extraction failed for {url}: {e}")));
                }
                warn!("Metadata extraction failed for {}: {}", url, e);
                None
            }
        };

        if reply.is_none() {
            info!("Using page data and fallbacks for {}", url);
        }

        Ok(UrlMetadata::from_sources(
            reply.as_deref(),
            page.as_ref(),
            OffsetDateTime::now_utc(),
        ))
    }
}
