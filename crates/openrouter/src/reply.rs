use common::{Error, Result};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::{PageSummary, RewriteOutput, UrlMetadata, Usage};

const DEFAULT_QUALITY_SCORE: f64 = 0.8;

/// The outermost `{...}` span of a reply, tolerating code fences and prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Strings and numbers both render as text; readers report counts either way.
fn loose_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_i64(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_rewrite_reply(
    reply: &str,
    original_title: &str,
    original_content: &str,
    usage: Usage,
) -> Result<RewriteOutput> {
    let json = extract_json_object(reply)
        .ok_or_else(|| Error::Parse("rewrite reply contains no JSON object".to_string()))?;
    let value: Value = serde_json::from_str(json)?;

    let title = non_empty_str(&value, "title").unwrap_or(original_title).to_string();
    let content = non_empty_str(&value, "content")
        .unwrap_or(original_content)
        .to_string();
    let summary = non_empty_str(&value, "summary").unwrap_or_default().to_string();
    let keywords = value
        .get("keywords")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let quality_score = value
        .get("quality_score")
        .and_then(Value::as_f64)
        .filter(|score| *score > 0.0)
        .unwrap_or(DEFAULT_QUALITY_SCORE);

    Ok(RewriteOutput {
        word_count: content.chars().count(),
        title,
        content,
        summary,
        keywords,
        quality_score,
        usage,
    })
}

impl UrlMetadata {
    /// Values used when nothing could be learned about a link.
    pub fn fallback(now: OffsetDateTime) -> Self {
        Self {
            title: "未知标题".to_string(),
            summary: "无法获取摘要".to_string(),
            author: "未知作者".to_string(),
            publish_time: now.format(&Rfc3339).unwrap_or_default(),
            category: "其他".to_string(),
            read_count: "0".to_string(),
            popularity_score: 0,
            source: "人工添加".to_string(),
        }
    }

    /// Fills the fallback from scraped page data, then from an LLM reply.
    pub fn from_sources(reply: Option<&str>, page: Option<&PageSummary>, now: OffsetDateTime) -> Self {
        let mut metadata = Self::fallback(now);

        if let Some(page) = page {
            if let Some(title) = &page.title {
                metadata.title = title.clone();
            }
            if let Some(description) = &page.description {
                metadata.summary = description.clone();
            }
        }

        let parsed = reply
            .and_then(extract_json_object)
            .and_then(|json| serde_json::from_str::<Value>(json).ok());
        let Some(value) = parsed else {
            return metadata;
        };

        if let Some(v) = non_empty_str(&value, "title") {
            metadata.title = v.to_string();
        }
        if let Some(v) = non_empty_str(&value, "summary") {
            metadata.summary = v.to_string();
        }
        if let Some(v) = non_empty_str(&value, "author") {
            metadata.author = v.to_string();
        }
        if let Some(v) = non_empty_str(&value, "publishTime") {
            metadata.publish_time = v.to_string();
        }
        if let Some(v) = non_empty_str(&value, "category") {
            metadata.category = v.to_string();
        }
        if let Some(v) = loose_string(&value, "readCount") {
            metadata.read_count = v;
        }
        if let Some(v) = loose_i64(&value, "popularityScore") {
            metadata.popularity_score = v;
        }
        if let Some(v) = non_empty_str(&value, "source") {
            metadata.source = v.to_string();
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn finds_json_inside_fences() {
        let reply = "```json\n{\"title\": \"x\"}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"title\": \"x\"}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn rewrite_reply_applies_fallbacks() {
        let reply = r#"{"title": "", "summary": "摘要", "keywords": ["AI", 3]}"#;
        let output = parse_rewrite_reply(reply, "原标题", "原文内容", Usage::default()).unwrap();

        assert_eq!(output.title, "原标题");
        assert_eq!(output.content, "原文内容");
        assert_eq!(output.summary, "摘要");
        assert_eq!(output.keywords, vec!["AI".to_string()]);
        assert_eq!(output.quality_score, 0.8);
        assert_eq!(output.word_count, 4);
    }

    #[test]
    fn rewrite_reply_keeps_model_values() {
        let reply = r#"{"title": "新标题", "content": "新的内容", "summary": "s", "keywords": [], "quality_score": 0.93}"#;
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
        };
        let output = parse_rewrite_reply(reply, "t", "c", usage).unwrap();
        assert_eq!(output.title, "新标题");
        assert_eq!(output.word_count, 4);
        assert_eq!(output.quality_score, 0.93);
        assert_eq!(output.usage.total_tokens, 30);
    }

    #[test]
    fn rewrite_reply_without_json_is_an_error() {
        assert!(parse_rewrite_reply("sorry", "t", "c", Usage::default()).is_err());
        assert!(parse_rewrite_reply("{not json}", "t", "c", Usage::default()).is_err());
    }

    #[test]
    fn metadata_defaults_then_page_then_reply() {
        let now = datetime!(2024-01-15 08:00 UTC);

        let fallback = UrlMetadata::from_sources(None, None, now);
        assert_eq!(fallback.title, "未知标题");
        assert_eq!(fallback.publish_time, "2024-01-15T08:00:00Z");
        assert_eq!(fallback.source, "人工添加");

        let page = PageSummary {
            title: Some("页面标题".into()),
            description: Some("页面描述".into()),
            text: String::new(),
        };
        let from_page = UrlMetadata::from_sources(Some("garbled"), Some(&page), now);
        assert_eq!(from_page.title, "页面标题");
        assert_eq!(from_page.summary, "页面描述");

        let reply = r#"Here you go: {"title": "AI标题", "author": "张三", "readCount": 1200, "popularityScore": "88", "category": "科技"}"#;
        let merged = UrlMetadata::from_sources(Some(reply), Some(&page), now);
        assert_eq!(merged.title, "AI标题");
        assert_eq!(merged.summary, "页面描述");
        assert_eq!(merged.author, "张三");
        assert_eq!(merged.read_count, "1200");
        assert_eq!(merged.popularity_score, 88);
        assert_eq!(merged.category, "科技");
    }
}
