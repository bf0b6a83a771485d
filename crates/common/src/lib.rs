pub mod config;
pub mod crawler;
pub mod error;
pub mod pagination;
pub mod serde_util;
pub mod supabase_client;

pub use config::Config;
pub use crawler::Crawler;
pub use error::{Error, Result};
pub use pagination::{PageInfo, PageRequest};
pub use supabase_client::{Query, SupabaseClient};
