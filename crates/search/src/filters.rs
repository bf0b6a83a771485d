use common::supabase_client::ilike_condition;
use common::{PageRequest, Query};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, Time};
use tophub::registry;
use tophub::storage::HOT_LIST_ITEMS_TABLE;

use crate::text::parse_search_query;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Popularity,
    Time,
    Platform,
}

impl SortBy {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("time") => Self::Time,
            Some("platform") => Self::Platform,
            _ => Self::Popularity,
        }
    }

    /// Column and direction handed to the datastore.
    pub fn order(&self) -> (&'static str, bool) {
        match self {
            Self::Popularity => ("extra", false),
            Self::Time => ("collected_at", false),
            Self::Platform => ("hot_list_hashid", true),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("today") => Self::Today,
            Some("week") => Self::Week,
            Some("month") => Self::Month,
            _ => Self::All,
        }
    }

    /// Earliest `collected_at` admitted by this range.
    pub fn cutoff(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Self::All => None,
            Self::Today => Some(now.replace_time(Time::MIDNIGHT)),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(one_month_earlier(now)),
        }
    }
}

fn one_month_earlier(now: OffsetDateTime) -> OffsetDateTime {
    let (year, month) = match now.month() {
        Month::January => (now.year() - 1, Month::December),
        m => (now.year(), m.previous()),
    };
    let day = now.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day)
        .map(|date| now.replace_date(date))
        .unwrap_or(now - Duration::days(30))
}

/// Raw query-string state as sent by the hot list search screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub sort_by: Option<String>,
    pub platforms: Option<String>,
    pub date_range: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub query: String,
    pub sort: SortBy,
    /// Hash ids selected explicitly.
    pub platforms: Vec<String>,
    pub date_range: DateRange,
    pub page: PageRequest,
}

impl From<SearchParams> for SearchFilters {
    fn from(params: SearchParams) -> Self {
        let platforms = params
            .platforms
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            query: params.q.unwrap_or_default(),
            sort: SortBy::parse_or_default(params.sort_by.as_deref()),
            platforms,
            date_range: DateRange::parse_or_default(params.date_range.as_deref()),
            page: PageRequest::parse(params.page.as_deref(), params.limit.as_deref()),
        }
    }
}

/// Text terms matched against titles and descriptions, plus the platforms
/// the query restricts to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerms {
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
    pub platforms: Vec<String>,
}

impl SearchTerms {
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let parsed = parse_search_query(&filters.query);

        let mut platforms = filters.platforms.clone();
        for keyword in &parsed.platforms {
            if let Some(spec) = registry::find_by_keyword(keyword) {
                if !platforms.iter().any(|p| p == spec.hash_id) {
                    platforms.push(spec.hash_id.to_string());
                }
            }
        }

        Self {
            keywords: parsed.keywords,
            phrases: parsed.exact_phrases,
            platforms,
        }
    }

    /// Keywords and phrases together, for scoring.
    pub fn all_text_terms(&self) -> Vec<String> {
        self.keywords
            .iter()
            .chain(self.phrases.iter())
            .cloned()
            .collect()
    }
}

/// Translates search state into datastore predicates over `hot_list_items`.
pub fn build_query(filters: &SearchFilters, terms: &SearchTerms, now: OffsetDateTime) -> Query {
    let mut query = Query::from(HOT_LIST_ITEMS_TABLE).select("*, hot_lists(name, hashid, category)");

    let conditions: Vec<String> = terms
        .keywords
        .iter()
        .chain(terms.phrases.iter())
        .flat_map(|term| {
            let pattern = format!("%{term}%");
            [
                ilike_condition("title", &pattern),
                ilike_condition("description", &pattern),
            ]
        })
        .collect();
    query = query.or(conditions);

    if !terms.platforms.is_empty() {
        query = query.in_list("hot_list_hashid", &terms.platforms);
    }

    if let Some(cutoff) = filters.date_range.cutoff(now) {
        if let Ok(stamp) = cutoff.format(&Rfc3339) {
            query = query.gte("collected_at", stamp);
        }
    }

    let (column, ascending) = filters.sort.order();
    query
        .order(column, ascending)
        .range(filters.page.offset(), filters.page.range_end())
}
