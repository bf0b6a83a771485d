use scraper::{Html, Selector};

use crate::models::PageSummary;

const EXCERPT_CHARS: usize = 2000;

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|e| e.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Pulls the title, description and a text excerpt out of an HTML page.
pub fn summarize_html(html: &str) -> PageSummary {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#).or_else(|| {
        let sel = selector("title")?;
        document
            .select(&sel)
            .map(|e| e.text().collect::<String>().trim().to_string())
            .find(|t| !t.is_empty())
    });

    let description = meta_content(&document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(&document, r#"meta[property="og:description"]"#));

    let text = selector("p")
        .map(|sel| {
            document
                .select(&sel)
                .map(|p| p.text().collect::<String>())
                .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    PageSummary {
        title,
        description,
        text: text.chars().take(EXCERPT_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_description_and_text() {
        let html = r#"<html><head>
            <title> Fallback title </title>
            <meta property="og:title" content="OG 标题">
            <meta name="description" content="页面描述">
        </head><body>
            <p>第一段   文字</p><p></p><p>第二段</p>
            <script>var x = 1;</script>
        </body></html>"#;

        let page = summarize_html(html);
        assert_eq!(page.title.as_deref(), Some("OG 标题"));
        assert_eq!(page.description.as_deref(), Some("页面描述"));
        assert_eq!(page.text, "第一段 文字\n第二段");
    }

    #[test]
    fn falls_back_to_title_tag() {
        let page = summarize_html("<html><head><title>Plain</title></head><body></body></html>");
        assert_eq!(page.title.as_deref(), Some("Plain"));
        assert!(page.description.is_none());
        assert!(page.text.is_empty());
    }

    #[test]
    fn truncates_long_text() {
        let body = "字".repeat(5000);
        let page = summarize_html(&format!("<p>{body}</p>"));
        assert_eq!(page.text.chars().count(), 2000);
    }
}
