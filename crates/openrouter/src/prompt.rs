use crate::models::{Language, PageSummary, RewriteOptions, RewriteType, Tone};

const REWRITE_BASE_PROMPT: &str = "你是一个专业的内容改写专家，擅长将现有内容改写成高质量、原创性强的文章。

要求：
1. 保持原意但用全新的表达方式
2. 提高内容质量和可读性
3. 确保原创性，避免抄袭
4. 根据指定的类型和语调进行调整
5. 输出JSON格式：{\"title\": \"新标题\", \"content\": \"改写后的内容\", \"summary\": \"摘要\", \"keywords\": [\"关键词1\", \"关键词2\"], \"quality_score\": 0.9}";

pub const METADATA_SYSTEM_PROMPT: &str =
    "你是一个专业的内容分析助手。请分析网页内容并提取标题、摘要、作者、发布时间等关键信息。返回JSON格式数据。";

const METADATA_REPLY_SHAPE: &str = r#"{
  "title": "文章标题",
  "summary": "文章摘要（100字以内）",
  "author": "作者名称",
  "publishTime": "发布时间（ISO格式）",
  "category": "文章分类",
  "readCount": "阅读数（如果有）",
  "popularityScore": 0,
  "source": "来源平台",
  "success": true
}"#;

fn language_line(language: Language) -> &'static str {
    match language {
        Language::ZhCn => "语言：简体中文",
        Language::ZhTw => "语言：繁体中文",
        Language::En => "语言：English",
    }
}

pub fn tone_line(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "语调：客观中性，事实陈述",
        Tone::Formal => "语调：正式专业，适合商务场景",
        Tone::Casual => "语调：轻松随意，口语化表达",
        Tone::Professional => "语调：专业权威，有说服力",
        Tone::Friendly => "语调：友善亲切，易于理解",
        Tone::Authoritative => "语调：权威可信，专家视角",
    }
}

pub fn type_line(rewrite_type: RewriteType) -> &'static str {
    match rewrite_type {
        RewriteType::Standard => "改写类型：标准改写，保持原意但重新组织语言",
        RewriteType::Creative => "改写类型：创意改写，增加新的角度和观点",
        RewriteType::Concise => "改写类型：简洁版本，去除冗余信息",
        RewriteType::Expand => "改写类型：扩展版本，增加深度和细节",
        RewriteType::Seo => "改写类型：SEO优化，融入关键词，提高搜索排名",
    }
}

pub fn rewrite_system_prompt(options: &RewriteOptions) -> String {
    let audience = options
        .target_audience
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .map(|a| format!("目标受众：{a}"))
        .unwrap_or_default();

    format!(
        "{}\n\n{}\n{}\n{}\n{}",
        REWRITE_BASE_PROMPT,
        language_line(options.language),
        tone_line(options.tone),
        type_line(options.rewrite_type),
        audience
    )
}

pub fn rewrite_user_prompt(title: &str, content: &str, options: &RewriteOptions) -> String {
    let mut prompt = format!("请改写以下内容：\n\n标题：{title}\n\n内容：{content}");

    if !options.keywords.is_empty() {
        prompt.push_str(&format!("\n\n关键词要求：{}", options.keywords.join(", ")));
    }

    if let Some(max_length) = options.max_length {
        prompt.push_str(&format!("\n\n字数要求：{max_length}字以内"));
    }

    prompt
}

pub fn metadata_user_prompt(url: &str, page: Option<&PageSummary>) -> String {
    let mut prompt = format!("请分析这个URL的内容并提取以下信息：\nURL: {url}\n");

    if let Some(page) = page {
        if let Some(title) = &page.title {
            prompt.push_str(&format!("\n页面标题：{title}"));
        }
        if let Some(description) = &page.description {
            prompt.push_str(&format!("\n页面描述：{description}"));
        }
        if !page.text.is_empty() {
            prompt.push_str(&format!("\n页面正文节选：\n{}\n", page.text));
        }
    }

    prompt.push_str(&format!("\n请返回JSON格式：\n{METADATA_REPLY_SHAPE}"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_reflects_options() {
        let options = RewriteOptions {
            rewrite_type: RewriteType::Seo,
            tone: Tone::Casual,
            target_audience: Some("大学生".into()),
            language: Language::En,
            ..Default::default()
        };
        let prompt = rewrite_system_prompt(&options);

        assert!(prompt.starts_with("你是一个专业的内容改写专家"));
        assert!(prompt.contains("\"quality_score\": 0.9"));
        assert!(prompt.contains("语言：English"));
        assert!(prompt.contains("语调：轻松随意"));
        assert!(prompt.contains("改写类型：SEO优化"));
        assert!(prompt.ends_with("目标受众：大学生"));
    }

    #[test]
    fn user_prompt_adds_optional_lines() {
        let plain = rewrite_user_prompt("标题", "正文", &RewriteOptions::default());
        assert_eq!(plain, "请改写以下内容：\n\n标题：标题\n\n内容：正文");

        let options = RewriteOptions {
            keywords: vec!["AI".into(), "大模型".into()],
            max_length: Some(800),
            ..Default::default()
        };
        let prompt = rewrite_user_prompt("标题", "正文", &options);
        assert!(prompt.contains("关键词要求：AI, 大模型"));
        assert!(prompt.ends_with("字数要求：800字以内"));
    }

    #[test]
    fn metadata_prompt_includes_page_excerpt() {
        let page = PageSummary {
            title: Some("页面".into()),
            description: None,
            text: "第一段".into(),
        };
        let prompt = metadata_user_prompt("https://example.com/a", Some(&page));
        assert!(prompt.contains("URL: https://example.com/a"));
        assert!(prompt.contains("页面标题：页面"));
        assert!(!prompt.contains("页面描述"));
        assert!(prompt.contains("第一段"));
        assert!(prompt.contains("\"popularityScore\": 0"));
    }
}
