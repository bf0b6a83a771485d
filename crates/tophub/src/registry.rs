/// One hot list the service knows how to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotListSpec {
    pub hash_id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub platform: &'static str,
    /// Short name users type into search to restrict results to this list.
    pub keyword: &'static str,
}

pub const HOT_LISTS: [HotListSpec; 6] = [
    HotListSpec {
        hash_id: "5PdMaaadmg",
        name: "微信科技24小时热文榜",
        category: "科技",
        platform: "微信",
        keyword: "微信科技",
    },
    HotListSpec {
        hash_id: "nBe0xxje37",
        name: "微信生活24小时热文榜",
        category: "生活",
        platform: "微信",
        keyword: "微信生活",
    },
    HotListSpec {
        hash_id: "DOvn33ydEB",
        name: "微信职场24小时热文榜",
        category: "职场",
        platform: "微信",
        keyword: "微信职场",
    },
    HotListSpec {
        hash_id: "KGoRGRDvl6",
        name: "微信财经24小时热文榜",
        category: "财经",
        platform: "微信",
        keyword: "微信财经",
    },
    HotListSpec {
        hash_id: "Y2KeDGQdNP",
        name: "少数派热门文章",
        category: "科技",
        platform: "少数派",
        keyword: "少数派",
    },
    HotListSpec {
        hash_id: "Q1Vd5Ko85R",
        name: "36氪热门文章",
        category: "创投",
        platform: "36氪",
        keyword: "36氪",
    },
];

/// Source label stored on materials saved from unknown lists.
pub const UNKNOWN_SOURCE: &str = "热榜内容";

pub fn find(hash_id: &str) -> Option<&'static HotListSpec> {
    HOT_LISTS.iter().find(|spec| spec.hash_id == hash_id)
}

pub fn source_name(hash_id: &str) -> &'static str {
    find(hash_id).map(|spec| spec.name).unwrap_or(UNKNOWN_SOURCE)
}

pub fn find_by_keyword(keyword: &str) -> Option<&'static HotListSpec> {
    HOT_LISTS.iter().find(|spec| spec.keyword == keyword)
}
