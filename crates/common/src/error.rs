use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Supabase request failed ({status}): {message}")]
    Supabase { status: u16, message: String },

    #[error("Page fetch refused: {0}")]
    PageFetch(String),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },
}

impl Error {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
