use std::fmt::Display;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};

/// A PostgREST read/write target: one table plus its filter, order and range
/// parameters, rendered in the query-string form PostgREST expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = compact_select(columns);
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{value}"))
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("gte.{value}"))
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("lt.{value}"))
    }

    pub fn in_list<I, S>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = values
            .into_iter()
            .map(|v| quote_value(v.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({list})"))
    }

    /// Adds a disjunction group. Separate `or` calls are ANDed together.
    pub fn or<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined = conditions
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .join(",");
        if !joined.is_empty() {
            self.filters.push(("or".to_string(), format!("({joined})")));
        }
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    /// Inclusive row range, as in `Range: from-to`.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn filter(mut self, column: &str, expression: String) -> Self {
        self.filters.push((column.to_string(), expression));
        self
    }

    /// Query-string pairs for this query.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            params.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Filter pairs only, for writes that must not carry select/order/range.
    fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.clone()
    }
}

/// An `ilike` alternative for use inside [`Query::or`].
pub fn ilike_condition(column: &str, pattern: &str) -> String {
    format!("{column}.ilike.{}", quote_value(pattern))
}

/// Quotes a value for PostgREST list syntax (`in.(...)`, `or=(...)`) when it
/// carries reserved characters.
pub fn quote_value(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace());
    if !reserved {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn compact_select(columns: &str) -> String {
    columns.split_whitespace().collect::<Vec<_>>().join("")
}

/// Total row count from a `Content-Range` header such as `0-19/57` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<i64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    rest_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(rest_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &SupabaseConfig) -> Self {
        Self::new(&config.rest_url, &config.key)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.rest_url, table.trim_start_matches('/'));
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        debug!("Supabase select from {}", query.table());
        let response = self
            .request(Method::GET, query.table())
            .query(&query.params())
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Rows plus the exact total count across all pages.
    pub async fn select_with_count<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<(Vec<T>, i64)> {
        let response = self
            .request(Method::GET, query.table())
            .header("Prefer", "count=exact")
            .query(&query.params())
            .send()
            .await?;
        let response = check(response).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<T> = response.json().await?;
        let total = total.unwrap_or(rows.len() as i64);
        Ok((rows, total))
    }

    pub async fn select_single<T: DeserializeOwned>(&self, query: &Query) -> Result<Option<T>> {
        let rows = self.select(&query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one row and returns the stored representation.
    pub async fn insert<B, R>(&self, table: &str, row: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let response = check(response).await?;
        let rows: Vec<R> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Api(format!("insert into {table} returned no rows")))
    }

    pub async fn upsert<B>(&self, table: &str, rows: &B, on_conflict: &str) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", on_conflict)])
            .json(rows)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn update<B>(&self, query: &Query, patch: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .request(Method::PATCH, query.table())
            .header("Prefer", "return=minimal")
            .query(&query.filter_params())
            .json(patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Patches the matching rows and returns them as stored. An empty result
    /// means no row matched the filters.
    pub async fn update_returning<B, R>(&self, query: &Query, patch: &B) -> Result<Vec<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::PATCH, query.table())
            .header("Prefer", "return=representation")
            .query(&query.filter_params())
            .json(patch)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, query: &Query) -> Result<()> {
        let response = self
            .request(Method::DELETE, query.table())
            .header("Prefer", "return=minimal")
            .query(&query.filter_params())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    warn!("Supabase request rejected ({}): {}", status, message);
    Err(Error::Supabase { status, message })
}
