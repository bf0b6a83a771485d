use async_trait::async_trait;
use common::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{TopHubItem, TopHubNode};
use crate::registry::HotListSpec;
use crate::source::HotListSource;

const ITEMS_PER_LIST: usize = 20;
const URL_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const TECH_TITLES: &[&str] = &[
    "AI大模型的最新突破与应用前景",
    "量子计算技术发展现状分析",
    "5G网络建设的挑战与机遇",
    "区块链技术在金融领域的创新应用",
    "元宇宙概念下的虚拟现实技术",
    "开源软件的商业化探索之路",
    "云原生架构的设计与实践",
];

const LIFE_TITLES: &[&str] = &[
    "健康饮食的科学搭配指南",
    "城市生活中的环保实践方法",
    "家居装修的流行趋势解析",
    "亲子教育的现代理念探讨",
    "旅行摄影的技巧与心得分享",
];

const CAREER_TITLES: &[&str] = &[
    "远程办公时代的职业发展策略",
    "团队管理中的沟通艺术",
    "数字化转型对职场的影响",
    "职业规划的关键节点把握",
    "工作与生活平衡的实现方法",
];

const FINANCE_TITLES: &[&str] = &[
    "全球经济形势下的投资策略",
    "数字货币市场的风险与机遇",
    "房地产市场的发展趋势分析",
    "企业财务管理的创新模式",
    "个人理财规划的实用建议",
];

const VENTURE_TITLES: &[&str] = &[
    "独角兽企业的成长路径分析",
    "风险投资市场的新趋势解读",
    "创业公司的融资策略与技巧",
    "科技创新驱动的商业模式变革",
    "新兴行业的投资机会与风险",
    "企业数字化转型的投资价值",
];

fn title_pool(category: &str) -> &'static [&'static str] {
    match category {
        "生活" => LIFE_TITLES,
        "职场" => CAREER_TITLES,
        "财经" => FINANCE_TITLES,
        "创投" => VENTURE_TITLES,
        _ => TECH_TITLES,
    }
}

/// Builds a plausible node for `spec` without calling any remote API.
pub fn generate<R: Rng + ?Sized>(spec: &HotListSpec, rng: &mut R) -> TopHubNode {
    let pool = title_pool(spec.category);
    let items = (0..ITEMS_PER_LIST)
        .map(|index| {
            let topic = pool.choose(rng).copied().unwrap_or(TECH_TITLES[0]);
            let slug: String = (0..6)
                .map(|_| URL_ALPHABET[rng.gen_range(0..URL_ALPHABET.len())] as char)
                .collect();
            TopHubItem {
                title: format!("{}热门文章 {}: {}", spec.category, index + 1, topic),
                description: format!(
                    "这是一篇关于{}的热门文章摘要，内容涵盖了最新的行业动态和深度分析...",
                    spec.category
                ),
                thumbnail: format!(
                    "https://picsum.photos/200/120?random={}_{}",
                    spec.hash_id, index
                ),
                url: format!("https://mp.weixin.qq.com/s/{slug}"),
                extra: format!("{} 万热度", rng.gen_range(100..600)),
            }
        })
        .collect();

    TopHubNode {
        hashid: spec.hash_id.to_string(),
        name: spec.name.to_string(),
        display: "热榜".to_string(),
        domain: "weixin.qq.com".to_string(),
        logo: "https://res.wx.qq.com/a/wx_fed/assets/res/OTE0YTAw.png".to_string(),
        items,
    }
}

/// Stand-in source used when no hot list API key is configured or the live
/// API is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSource;

#[async_trait]
impl HotListSource for PlaceholderSource {
    async fn fetch(&self, spec: &HotListSpec) -> Result<TopHubNode> {
        let node = {
            let mut rng = rand::thread_rng();
            generate(spec, &mut rng)
        };
        Ok(node)
    }

    fn name(&self) -> &'static str {
        "placeholder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::popularity_score;
    use crate::registry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generates_twenty_items_for_category() {
        let spec = registry::find("KGoRGRDvl6").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let node = generate(spec, &mut rng);

        assert_eq!(node.hashid, "KGoRGRDvl6");
        assert_eq!(node.name, "微信财经24小时热文榜");
        assert_eq!(node.items.len(), 20);
        for (i, item) in node.items.iter().enumerate() {
            assert!(item.title.starts_with(&format!("财经热门文章 {}: ", i + 1)));
            assert!(FINANCE_TITLES.iter().any(|t| item.title.ends_with(t)));
            assert!(item.url.starts_with("https://mp.weixin.qq.com/s/"));
            let score = popularity_score(&item.extra);
            assert!((100..600).contains(&score), "score {score}");
        }
    }

    #[test]
    fn unknown_category_uses_tech_titles() {
        assert_eq!(title_pool("其他"), TECH_TITLES);
    }

    #[tokio::test]
    async fn source_never_fails() {
        let spec = registry::find("Y2KeDGQdNP").unwrap();
        let node = PlaceholderSource.fetch(spec).await.unwrap();
        assert_eq!(node.items.len(), 20);
    }
}
