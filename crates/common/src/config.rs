use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// API key value the hot list service documents for its unauthenticated demo.
pub const DEMO_TOPHUB_KEY: &str = "demo_key";

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub rest_url: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct TopHubConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub fetch_delay: Duration,
}

impl TopHubConfig {
    /// Live API calls are only made when a real key is configured.
    pub fn live_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty() && *key != DEMO_TOPHUB_KEY)
    }
}

impl Default for TopHubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tophubdata.com".to_string(),
            api_key: None,
            fetch_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub site_url: String,
    pub app_title: String,
    /// Whole-request limit for chat completions.
    pub request_timeout: Duration,
    pub page_fetch: PageFetchConfig,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "anthropic/claude-3-sonnet-20240229".to_string(),
            site_url: "http://localhost:3000".to_string(),
            app_title: "WeChat CMS - AI Content Rewriter".to_string(),
            request_timeout: Duration::from_secs(120),
            page_fetch: PageFetchConfig::default(),
        }
    }
}

/// Limits for fetching user-submitted pages.
#[derive(Debug, Clone)]
pub struct PageFetchConfig {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub max_redirects: usize,
    /// Allows loopback, private and link-local targets. Off outside tests
    /// and local development.
    pub allow_private_hosts: bool,
}

impl Default for PageFetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_bytes: 2 * 1024 * 1024,
            max_redirects: 3,
            allow_private_hosts: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub batch_size: usize,
    pub task_delay: Duration,
    pub purge_after_days: i64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            task_delay: Duration::from_millis(1000),
            purge_after_days: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub hotlist_cron: String,
    pub rewrite_cron: String,
    pub purge_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hotlist_cron: "0 0 * * * *".to_string(),
            rewrite_cron: "0 * * * * *".to_string(),
            purge_cron: "0 30 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase: SupabaseConfig,
    pub tophub: TopHubConfig,
    pub openrouter: OpenRouterConfig,
    pub rewrite: RewriteConfig,
    pub scheduler: SchedulerConfig,
    pub cron_secret: Option<String>,
    pub server_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        let supabase_url = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .context("SUPABASE_URL must be set")?;
        let supabase_key = first(&[
            "SUPABASE_SERVICE_ROLE_KEY",
            "SUPABASE_ANON_KEY",
            "NEXT_PUBLIC_SUPABASE_ANON_KEY",
        ])
        .context("SUPABASE_SERVICE_ROLE_KEY must be set")?;

        let rest_url = format!("{}/rest/v1", supabase_url.trim_end_matches('/'));

        let tophub_defaults = TopHubConfig::default();
        let tophub = TopHubConfig {
            base_url: first(&["TOPHUB_BASE_URL"]).unwrap_or(tophub_defaults.base_url),
            api_key: first(&["TOPHUB_API_KEY"]),
            fetch_delay: Duration::from_millis(parse_or(
                lookup("HOTLIST_FETCH_DELAY_MS"),
                1000,
            )),
        };

        let openrouter_defaults = OpenRouterConfig::default();
        let openrouter = OpenRouterConfig {
            base_url: first(&["OPENROUTER_BASE_URL"]).unwrap_or(openrouter_defaults.base_url),
            api_key: first(&["OPENROUTER_API_KEY", "NEXT_PUBLIC_OPENROUTER_API_KEY"]),
            model: first(&["OPENROUTER_MODEL"]).unwrap_or(openrouter_defaults.model),
            site_url: first(&["SITE_URL", "NEXT_PUBLIC_SITE_URL"])
                .unwrap_or(openrouter_defaults.site_url),
            app_title: openrouter_defaults.app_title,
            request_timeout: Duration::from_secs(parse_or(
                lookup("OPENROUTER_TIMEOUT_SECS"),
                openrouter_defaults.request_timeout.as_secs(),
            )),
            page_fetch: PageFetchConfig {
                timeout: Duration::from_millis(parse_or(lookup("PAGE_FETCH_TIMEOUT_MS"), 10_000)),
                max_bytes: parse_or(
                    lookup("PAGE_FETCH_MAX_BYTES"),
                    openrouter_defaults.page_fetch.max_bytes,
                ),
                max_redirects: openrouter_defaults.page_fetch.max_redirects,
                allow_private_hosts: flag(lookup("PAGE_FETCH_ALLOW_PRIVATE")),
            },
        };

        let rewrite = RewriteConfig {
            batch_size: parse_or(lookup("REWRITE_BATCH_SIZE"), 10),
            task_delay: Duration::from_millis(parse_or(lookup("REWRITE_TASK_DELAY_MS"), 1000)),
            purge_after_days: parse_or(lookup("REWRITE_PURGE_AFTER_DAYS"), 7),
        };

        let scheduler_defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            enabled: flag(lookup("SCHEDULER_ENABLED")),
            hotlist_cron: first(&["HOTLIST_CRON"]).unwrap_or(scheduler_defaults.hotlist_cron),
            rewrite_cron: first(&["REWRITE_CRON"]).unwrap_or(scheduler_defaults.rewrite_cron),
            purge_cron: first(&["PURGE_CRON"]).unwrap_or(scheduler_defaults.purge_cron),
        };

        let server_addr = match first(&["SERVER_ADDR"]) {
            Some(addr) => addr
                .parse()
                .with_context(|| format!("SERVER_ADDR is not a socket address: {addr}"))?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        Ok(Config {
            supabase: SupabaseConfig {
                url: supabase_url,
                rest_url,
                key: supabase_key,
            },
            tophub,
            openrouter,
            rewrite,
            scheduler,
            cron_secret: first(&["CRON_SECRET_KEY"]),
            server_addr,
        })
    }
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
