use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tophub::HOT_LISTS;

const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 100;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidQuery {
    #[error("请输入搜索关键词")]
    Empty,
    #[error("搜索关键词至少2个字符")]
    TooShort,
    #[error("搜索关键词不能超过100个字符")]
    TooLong,
}

/// A free-text query split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub keywords: Vec<String>,
    pub exact_phrases: Vec<String>,
    /// Platform keywords such as `少数派`, as typed.
    pub platforms: Vec<String>,
}

fn phrase_regex() -> &'static Regex {
    static PHRASE: OnceLock<Regex> = OnceLock::new();
    PHRASE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid phrase regex"))
}

/// Lowercased, whitespace-separated keywords.
pub fn split_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Splits quoted phrases, platform names and plain keywords.
pub fn parse_search_query(query: &str) -> ParsedQuery {
    let exact_phrases = phrase_regex()
        .captures_iter(query)
        .map(|c| c[1].to_string())
        .collect();
    let remaining = phrase_regex().replace_all(query, "");

    let mut parsed = ParsedQuery {
        exact_phrases,
        ..Default::default()
    };
    for keyword in split_keywords(&remaining) {
        let platform = HOT_LISTS
            .iter()
            .map(|spec| spec.keyword)
            .find(|p| keyword.contains(&p.to_lowercase()));
        match platform {
            Some(p) => parsed.platforms.push(p.to_string()),
            None => parsed.keywords.push(keyword),
        }
    }
    parsed
}

/// Wraps every case-insensitive keyword occurrence in a `<mark>` tag.
pub fn highlight_text(text: &str, query: &str) -> String {
    let mut keywords = split_keywords(query);
    if keywords.is_empty() {
        return text.to_string();
    }
    // Longest first so overlapping keywords prefer the fuller match.
    keywords.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    let pattern = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&format!("({pattern})"))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re
            .replace_all(text, r#"<mark class="bg-yellow-200 px-1 rounded">$1</mark>"#)
            .into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Sum of matched keyword lengths; a match at the very start counts double.
pub fn calculate_match_score(text: &str, keywords: &[String]) -> usize {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .filter_map(|keyword| {
            let keyword = keyword.to_lowercase();
            lower.find(&keyword).map(|index| {
                let weight = if index == 0 { 2 } else { 1 };
                keyword.chars().count() * weight
            })
        })
        .sum()
}

pub fn format_search_stats(count: i64, query: &str) -> String {
    let keywords: Vec<&str> = query.split_whitespace().collect();
    match keywords.len() {
        0 => format!("找到 {count} 条结果"),
        1 => format!("找到 {count} 条包含“{}”的结果", query.trim()),
        n => format!("找到 {count} 条包含 {n} 个关键词的结果"),
    }
}

pub fn generate_search_suggestions(query: &str, history: &[String]) -> Vec<String> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    history
        .iter()
        .filter(|item| item.to_lowercase().contains(&needle))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

pub fn validate_search_query(query: &str) -> Result<(), InvalidQuery> {
    if query.trim().is_empty() {
        return Err(InvalidQuery::Empty);
    }
    let chars = query.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Err(InvalidQuery::TooShort);
    }
    if chars > MAX_QUERY_CHARS {
        return Err(InvalidQuery::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_phrases_platforms_and_keywords() {
        let parsed = parse_search_query(r#"AI "大模型 应用" 少数派 Rust"#);
        assert_eq!(parsed.exact_phrases, vec!["大模型 应用"]);
        assert_eq!(parsed.platforms, vec!["少数派"]);
        assert_eq!(parsed.keywords, vec!["ai", "rust"]);
    }

    #[test]
    fn platform_match_is_substring() {
        let parsed = parse_search_query("36氪快讯");
        assert_eq!(parsed.platforms, vec!["36氪"]);
        assert!(parsed.keywords.is_empty());
    }

    #[test]
    fn highlights_case_insensitively() {
        assert_eq!(
            highlight_text("Rust and rust", "RUST"),
            r#"<mark class="bg-yellow-200 px-1 rounded">Rust</mark> and <mark class="bg-yellow-200 px-1 rounded">rust</mark>"#
        );
        assert_eq!(highlight_text("a.b", "."), r#"a<mark class="bg-yellow-200 px-1 rounded">.</mark>b"#);
        assert_eq!(highlight_text("unchanged", "   "), "unchanged");
    }

    #[test]
    fn scores_leading_matches_double() {
        let keywords = vec!["ai".to_string(), "模型".to_string(), "none".to_string()];
        assert_eq!(calculate_match_score("AI大模型", &keywords), 2 * 2 + 2);
        assert_eq!(calculate_match_score("anything", &[]), 0);
    }

    #[test]
    fn formats_stats() {
        assert_eq!(format_search_stats(3, ""), "找到 3 条结果");
        assert_eq!(format_search_stats(3, "AI"), "找到 3 条包含“AI”的结果");
        assert_eq!(format_search_stats(3, "AI 大模型"), "找到 3 条包含 2 个关键词的结果");
    }

    #[test]
    fn suggests_from_history() {
        let history: Vec<String> = (0..8).map(|i| format!("AI topic {i}")).collect();
        let suggestions = generate_search_suggestions("ai", &history);
        assert_eq!(suggestions.len(), 5);
        assert!(generate_search_suggestions(" ", &history).is_empty());
    }

    #[test]
    fn validates_length() {
        assert_eq!(validate_search_query(" "), Err(InvalidQuery::Empty));
        assert_eq!(validate_search_query("a"), Err(InvalidQuery::TooShort));
        assert_eq!(validate_search_query(&"字".repeat(101)), Err(InvalidQuery::TooLong));
        assert_eq!(validate_search_query("大模型"), Ok(()));
        assert_eq!(InvalidQuery::TooLong.to_string(), "搜索关键词不能超过100个字符");
    }
}
