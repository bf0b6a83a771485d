use serde::{Deserialize, Serialize};

/// Maximum rows per page
const MAX_LIMIT: u32 = 100;

/// Default rows per page
const DEFAULT_LIMIT: u32 = 20;

/// A 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Page is clamped to at least 1, limit to 1..=100.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Lenient parse of raw query-string values; unparsable input falls
    /// back to the defaults.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page.and_then(|p| p.trim().parse().ok()).unwrap_or(1);
        let limit = limit
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_LIMIT);
        Self::new(page, limit)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Last row index, inclusive.
    pub fn range_end(&self) -> u64 {
        self.offset() + u64::from(self.limit) - 1
    }

    pub fn info(&self, total: i64) -> PageInfo {
        let total = total.max(0);
        let limit = i64::from(self.limit);
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}
