use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use url::Url;

use crate::db::kv::{self, keys, KeyValueStore};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const FALLBACK_API_BASE: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub allowlist: BTreeSet<String>,
    pub blocklist: BTreeSet<String>,
}

impl Settings {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let api_base_url = read_api_base(store).await?;
        let allowlist = read_domains(store, keys::ALLOWLIST_DOMAINS).await?;
        let blocklist = read_domains(store, keys::BLOCKLIST_DOMAINS).await?;
        Ok(Self {
            api_base_url,
            allowlist: allowlist.into_iter().collect(),
            blocklist: blocklist.into_iter().collect(),
        })
    }
}

pub async fn read_api_base(store: &dyn KeyValueStore) -> Result<String> {
    let stored: Option<String> = kv::get_json(store, keys::API_BASE_URL).await?;
    Ok(normalize_api_base(stored.as_deref().unwrap_or_default()))
}

pub async fn write_api_base(store: &dyn KeyValueStore, raw: &str) -> Result<String> {
    let normalized = normalize_api_base(raw);
    kv::set_json(store, keys::API_BASE_URL, &normalized).await?;
    Ok(normalized)
}

pub async fn read_domains(store: &dyn KeyValueStore, key: &str) -> Result<Vec<String>> {
    let stored: Option<Vec<String>> = kv::get_json(store, key).await?;
    Ok(normalize_domains(stored.unwrap_or_default()))
}

pub async fn write_domains<I, S>(store: &dyn KeyValueStore, key: &str, domains: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized = normalize_domains(domains);
    kv::set_json(store, key, &normalized).await?;
    Ok(normalized)
}

pub fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_BASE.to_string();
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => trimmed.to_string(),
        _ => {
            tracing::warn!(
                target: "config",
                value = trimmed,
                fallback = DEFAULT_API_BASE,
                "malformed api base url; using default"
            );
            DEFAULT_API_BASE.to_string()
        }
    }
}

pub fn normalize_domains<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    domains
        .into_iter()
        .map(|domain| domain.as_ref().trim().to_lowercase())
        .filter(|domain| !domain.is_empty() && seen.insert(domain.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::MemoryStore;

    #[test]
    fn api_base_normalization() {
        assert_eq!(normalize_api_base(""), DEFAULT_API_BASE);
        assert_eq!(normalize_api_base("  http://localhost:5000/ "), FALLBACK_API_BASE);
        assert_eq!(normalize_api_base("not a url"), DEFAULT_API_BASE);
        assert_eq!(normalize_api_base("ftp://files.example"), DEFAULT_API_BASE);
        assert_eq!(
            normalize_api_base("https://phish.example/api"),
            "https://phish.example/api"
        );
    }

    #[test]
    fn domains_are_lowercased_and_unique() {
        let domains = normalize_domains([" Evil.com", "evil.com", "", "Good.COM ", "  "]);
        assert_eq!(domains, vec!["evil.com", "good.com"]);
    }

    #[tokio::test]
    async fn load_reads_fresh_values_each_time() {
        let store = MemoryStore::default();
        let settings = Settings::load(&store).await.unwrap();
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE);
        assert!(settings.allowlist.is_empty());

        write_domains(&store, keys::BLOCKLIST_DOMAINS, ["EVIL.com"]).await.unwrap();
        write_api_base(&store, "http://localhost:5000").await.unwrap();

        let settings = Settings::load(&store).await.unwrap();
        assert!(settings.blocklist.contains("evil.com"));
        assert_eq!(settings.api_base_url, FALLBACK_API_BASE);
    }

    #[tokio::test]
    async fn malformed_stored_values_are_normalized_on_read() {
        let store = MemoryStore::default();
        store.insert(keys::API_BASE_URL, json!("::::"));
        store.insert(keys::ALLOWLIST_DOMAINS, json!(["Good.com", "good.com"]));

        let settings = Settings::load(&store).await.unwrap();
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE);
        assert_eq!(settings.allowlist.len(), 1);
    }
}
