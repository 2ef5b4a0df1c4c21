use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};

/// Persisted-query integrity hashes registered with the upstream API.
/// These only change when the site redeploys its GraphQL operations.
pub const LIST_QUERY_HASH: &str =
    "f34b27afebc725b2bb62b62f9757e1740beaf2dc162f4194e29ba5a608b3cb41";
pub const COUNT_QUERY_HASH: &str =
    "9869b12c312f3c3ca3f7de0ced1f6fcb355781db43f49b4d8b3e278c13490ae6";
pub const DETAIL_QUERY_HASH: &str =
    "0b96ba66315ed1a9e29f46018744ff8311996007dd6397a073cf59c755596f84";

pub struct Config {
    pub endpoint: String,
    pub site_base: String,
    pub referer: String,
    pub user_agent: String,
    /// Opaque search filter forwarded verbatim to count and listing queries.
    pub filter: Map<String, Value>,
    pub page_size: u64,
    pub max_workers: usize,
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub proxy_url: Option<String>,
    pub fetch_details: bool,
    /// The upstream endpoint stops serving past ~47 pages; cap the plan there.
    pub max_pages: Option<u64>,
    pub output_pattern: String,
    pub list_hash: String,
    pub count_hash: String,
    pub detail_hash: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let proxy_url = var_opt("PROXY_URL");
        let request_timeout_secs =
            resolve_timeout(parse_opt("REQUEST_TIMEOUT_SECS")?, proxy_url.is_some());

        Ok(Self {
            endpoint: var_or("BINA_GRAPHQL_URL", "https://bina.az/graphql"),
            site_base: var_or("BINA_BASE_URL", "https://bina.az"),
            referer: var_or("BINA_REFERER", "https://bina.az/"),
            user_agent: var_or("USER_AGENT", "Mozilla/5.0 (compatible; BinaHarvester/1.0)"),
            filter: parse_filter(&var_or("FILTER_JSON", "{}"))?,
            page_size: parse_or("PAGE_SIZE", 24)?,
            max_workers: parse_or("MAX_WORKERS", 10)?,
            page_delay_ms: parse_or("PAGE_DELAY_MS", 200)?,
            request_timeout_secs,
            proxy_url,
            fetch_details: parse_or("FETCH_DETAILS", true)?,
            max_pages: parse_opt("MAX_PAGES")?,
            output_pattern: var_or("OUTPUT_FILE", "bina_listings_{date}.csv"),
            list_hash: var_or("LIST_QUERY_HASH", LIST_QUERY_HASH),
            count_hash: var_or("COUNT_QUERY_HASH", COUNT_QUERY_HASH),
            detail_hash: var_or("DETAIL_QUERY_HASH", DETAIL_QUERY_HASH),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match var_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}

fn parse_opt<T: FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match var_opt(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(None),
    }
}

fn parse_filter(raw: &str) -> anyhow::Result<Map<String, Value>> {
    serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("FILTER_JSON is not a JSON object: {e}"))
}

/// Proxied requests get a wider deadline unless one was set explicitly.
fn resolve_timeout(explicit: Option<u64>, behind_proxy: bool) -> u64 {
    match explicit {
        Some(secs) => secs,
        None if behind_proxy => 45,
        None => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_scalars_and_booleans() {
        let filter =
            parse_filter(r#"{"cityId": "1", "categoryId": "1", "leased": false}"#).unwrap();
        assert_eq!(filter.get("cityId").unwrap(), "1");
        assert_eq!(filter.get("leased").unwrap(), false);
    }

    #[test]
    fn filter_rejects_non_objects() {
        assert!(parse_filter("[1, 2]").is_err());
        assert!(parse_filter("not json").is_err());
    }

    #[test]
    fn empty_filter_is_valid() {
        assert!(parse_filter("{}").unwrap().is_empty());
    }

    #[test]
    fn timeout_widens_behind_proxy() {
        assert_eq!(resolve_timeout(None, false), 30);
        assert_eq!(resolve_timeout(None, true), 45);
        assert_eq!(resolve_timeout(Some(10), true), 10);
    }
}
