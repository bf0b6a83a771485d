//! Guarded HTTP fetches of user-submitted pages.
//!
//! Every hop is resolved up front and refused when any address is loopback,
//! private, link-local or otherwise non-public. The connection is then pinned
//! to the checked address so a second DNS answer cannot swap it. Redirects are
//! followed by hand so each target goes through the same check.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use common::config::PageFetchConfig;
use common::{Error, Result};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use tokio::net::lookup_host;
use tokio::time::timeout;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PageFetcher {
    config: PageFetchConfig,
    user_agent: String,
}

impl PageFetcher {
    pub fn new(config: PageFetchConfig, user_agent: &str) -> Self {
        Self {
            config,
            user_agent: user_agent.to_string(),
        }
    }

    /// Body of `url` as text, within the configured deadline and size limit.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        timeout(self.config.timeout, self.follow(url))
            .await
            .map_err(|_| {
                Error::PageFetch(format!(
                    "timed out after {}ms fetching {url}",
                    self.config.timeout.as_millis()
                ))
            })?
    }

    async fn follow(&self, url: &str) -> Result<String> {
        let mut current =
            Url::parse(url).map_err(|e| Error::Parse(format!("invalid URL {url}: {e}")))?;

        for _ in 0..=self.config.max_redirects {
            let addr = self.resolve(&current).await?;
            let response = self.client_for(&current, addr)?.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        Error::PageFetch(format!("redirect without location from {current}"))
                    })?;
                current = current
                    .join(location)
                    .map_err(|e| Error::Parse(format!("bad redirect target {location}: {e}")))?;
                debug!("Following redirect to {}", current);
                continue;
            }

            if !status.is_success() {
                return Err(Error::Api(format!(
                    "page fetch failed ({}) for {}",
                    status.as_u16(),
                    current
                )));
            }

            return self.read_limited(response).await;
        }

        Err(Error::PageFetch(format!("too many redirects fetching {url}")))
    }

    async fn resolve(&self, url: &Url) -> Result<SocketAddr> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::PageFetch(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::PageFetch(format!("no host in {url}")))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = match bare.parse::<IpAddr>() {
            Ok(ip) => vec![SocketAddr::new(ip, port)],
            Err(_) => lookup_host((bare, port))
                .await
                .map_err(|e| Error::PageFetch(format!("dns lookup failed for {host}: {e}")))?
                .collect(),
        };

        if !self.config.allow_private_hosts {
            if let Some(addr) = addrs.iter().find(|a| is_non_public(a.ip())) {
                return Err(Error::PageFetch(format!(
                    "{host} resolves to non-public address {}",
                    addr.ip()
                )));
            }
        }

        addrs
            .first()
            .copied()
            .ok_or_else(|| Error::PageFetch(format!("dns lookup returned nothing for {host}")))
    }

    fn client_for(&self, url: &Url, addr: SocketAddr) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(Policy::none())
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(host) = url.host_str() {
            if host.parse::<IpAddr>().is_err() && !host.starts_with('[') {
                builder = builder.resolve(host, addr);
            }
        }

        Ok(builder.build()?)
    }

    async fn read_limited(&self, mut response: Response) -> Result<String> {
        let max_bytes = self.config.max_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > max_bytes as u64)
        {
            return Err(too_large(max_bytes));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > max_bytes {
                return Err(too_large(max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn too_large(max_bytes: usize) -> Error {
    Error::PageFetch(format!("response exceeds {max_bytes} bytes"))
}

/// Loopback, private, link-local, shared, unspecified and broadcast ranges.
pub fn is_non_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (b & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_non_public(IpAddr::V4(v4)))
        }
    }
}
