use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewriteType {
    #[default]
    Standard,
    Creative,
    Concise,
    Expand,
    Seo,
}

impl RewriteType {
    /// Unknown values are treated as a standard rewrite.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "creative" => Self::Creative,
            "concise" => Self::Concise,
            "expand" => Self::Expand,
            "seo" => Self::Seo,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Creative => "creative",
            Self::Concise => "concise",
            Self::Expand => "expand",
            Self::Seo => "seo",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Formal,
    Casual,
    Professional,
    Friendly,
    Authoritative,
}

impl Tone {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "formal" => Self::Formal,
            "casual" => Self::Casual,
            "professional" => Self::Professional,
            "friendly" => Self::Friendly,
            "authoritative" => Self::Authoritative,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Authoritative => "authoritative",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Language {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "en")]
    En,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteOptions {
    pub rewrite_type: RewriteType,
    pub tone: Tone,
    pub target_audience: Option<String>,
    pub keywords: Vec<String>,
    pub max_length: Option<u32>,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewriteOutput {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub word_count: usize,
    pub keywords: Vec<String>,
    pub quality_score: f64,
    #[serde(skip)]
    pub usage: Usage,
}

/// Article metadata guessed for a manually submitted link.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlMetadata {
    pub title: String,
    pub summary: String,
    pub author: String,
    pub publish_time: String,
    pub category: String,
    pub read_count: String,
    pub popularity_score: i64,
    pub source: String,
}

/// Title, description and leading text scraped from a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
}
