//! Web search providers
//!
//! Tavily, Brave and SerpAPI behind one `SearchProvider` trait, plus the
//! query and domain rules the aggregator applies to their results.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::ResearchError;
use crate::config::SearchSettings;

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The retrieval capability: query in, ranked snippets out
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ResearchError>;
}

/// API credentials for a search provider
#[derive(Debug, Clone)]
pub struct SearchCredentials {
    /// API provider: "tavily", "brave", "serpapi"
    pub provider: String,
    /// API key
    pub api_key: String,
}

impl SearchCredentials {
    /// Environment variable holding the key for a provider
    fn env_var(provider: &str) -> Option<&'static str> {
        match provider {
            "tavily" => Some("TAVILY_API_KEY"),
            "brave" => Some("BRAVE_API_KEY"),
            "serpapi" => Some("SERPAPI_KEY"),
            _ => None,
        }
    }

    /// First provider with a key in the environment (Tavily, Brave, SerpAPI)
    pub fn from_env() -> Option<Self> {
        ["tavily", "brave", "serpapi"]
            .into_iter()
            .find_map(|p| Self::for_provider(p).ok().flatten())
    }

    /// Credentials for a named provider; `Ok(None)` when its key is not set
    pub fn for_provider(provider: &str) -> Result<Option<Self>, ResearchError> {
        let var = Self::env_var(provider).ok_or_else(|| ResearchError::UnknownProvider(provider.to_string()))?;
        Ok(std::env::var(var).ok().map(|api_key| Self {
            provider: provider.to_string(),
            api_key,
        }))
    }
}

/// Build the configured search provider
///
/// A missing API key yields `DisabledSearch`, whose every query fails softly.
/// Only an unknown provider name is an error.
pub fn create_search_provider(
    settings: &SearchSettings,
    timeout: Duration,
) -> Result<Arc<dyn SearchProvider>, ResearchError> {
    debug!(provider = %settings.provider, "create_search_provider: called");
    let credentials = match settings.provider.as_str() {
        "none" => None,
        "auto" => SearchCredentials::from_env(),
        other => SearchCredentials::for_provider(other)?,
    };

    let Some(credentials) = credentials else {
        if settings.provider != "none" {
            warn!(provider = %settings.provider, "No search API key found, web search disabled");
        }
        return Ok(Arc::new(DisabledSearch));
    };

    let http = Client::builder().timeout(timeout).build()?;
    let provider: Arc<dyn SearchProvider> = match credentials.provider.as_str() {
        "tavily" => Arc::new(TavilySearch::new(http, credentials.api_key)),
        "brave" => Arc::new(BraveSearch::new(http, credentials.api_key)),
        "serpapi" => Arc::new(SerpApiSearch::new(http, credentials.api_key)),
        other => return Err(ResearchError::UnknownProvider(other.to_string())),
    };
    Ok(provider)
}

/// Search provider used when no API is configured
pub struct DisabledSearch;

#[async_trait]
impl SearchProvider for DisabledSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        Err(ResearchError::SearchNotConfigured)
    }
}

/// Search using Tavily API
pub struct TavilySearch {
    http: Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        debug!(%query, max_results, "TavilySearch::search: called");
        let url = "https://api.tavily.com/search";
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic"
        });

        let response = self.http.post(url).json(&body).send().await?;
        let result = read_json(response, url).await?;

        Ok(collect_hits(&result["results"], "url", "content", max_results))
    }
}

/// Search using Brave Search API
pub struct BraveSearch {
    http: Client,
    api_key: String,
}

impl BraveSearch {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        debug!(%query, max_results, "BraveSearch::search: called");
        let url = "https://api.search.brave.com/res/v1/web/search";
        let count = max_results.to_string();
        let response = self
            .http
            .get(url)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await?;
        let result = read_json(response, url).await?;

        Ok(collect_hits(&result["web"]["results"], "url", "description", max_results))
    }
}

/// Search using SerpAPI
pub struct SerpApiSearch {
    http: Client,
    api_key: String,
}

impl SerpApiSearch {
    pub fn new(http: Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        debug!(%query, max_results, "SerpApiSearch::search: called");
        let url = "https://serpapi.com/search";
        let num = max_results.to_string();
        let response = self
            .http
            .get(url)
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
                ("engine", "google"),
            ])
            .send()
            .await?;
        let result = read_json(response, url).await?;

        Ok(collect_hits(&result["organic_results"], "link", "snippet", max_results))
    }
}

/// Fail on non-2xx, otherwise parse the body as JSON
async fn read_json(response: reqwest::Response, url: &str) -> Result<Value, ResearchError> {
    if !response.status().is_success() {
        return Err(ResearchError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    response.json().await.map_err(|e| ResearchError::Parse(e.to_string()))
}

/// Map a provider's result array onto `SearchHit`s
///
/// Entries without a URL are dropped.
fn collect_hits(results: &Value, url_key: &str, snippet_key: &str, max_results: usize) -> Vec<SearchHit> {
    results
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|r| {
                    let url = r[url_key].as_str().filter(|u| !u.is_empty())?;
                    Some(SearchHit {
                        title: r["title"].as_str().unwrap_or("(no title)").to_string(),
                        url: url.to_string(),
                        snippet: r[snippet_key].as_str().unwrap_or("").to_string(),
                    })
                })
                .take(max_results)
                .collect()
        })
        .unwrap_or_default()
}

/// Diversified queries for one package: API reference, tutorial, deprecations
pub fn build_queries(package: &str, max_queries: usize) -> Vec<String> {
    [
        format!("{} python API reference documentation", package),
        format!("{} python tutorial examples", package),
        format!("{} deprecated features migration guide", package),
    ]
    .into_iter()
    .take(max_queries)
    .collect()
}

/// Whether the URL's host is one of the trusted domains or a subdomain of one
pub fn is_trusted(url: &str, trusted_domains: &[String]) -> bool {
    let Some(host) = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    else {
        return false;
    };

    trusted_domains.iter().any(|domain| {
        let domain = domain.to_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    })
}
