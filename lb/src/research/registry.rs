//! Package registry lookups (PyPI JSON API)

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ResearchError;

/// Metadata for one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub version: String,
    pub summary: String,
    pub homepage: Option<String>,
    pub docs_url: Option<String>,
    pub project_urls: BTreeMap<String, String>,
}

/// The package-metadata capability
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Look up a package; `Ok(None)` when the registry does not know it
    async fn lookup(&self, name: &str) -> Result<Option<PackageInfo>, ResearchError>;
}

/// Registry backed by the PyPI JSON API (`GET {base}/{name}/json`)
pub struct PypiRegistry {
    http: Client,
    base_url: String,
}

impl PypiRegistry {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, ResearchError> {
        debug!(%base_url, ?timeout, "PypiRegistry::new: called");
        let http = Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PackageRegistry for PypiRegistry {
    async fn lookup(&self, name: &str) -> Result<Option<PackageInfo>, ResearchError> {
        let url = format!("{}/{}/json", self.base_url, name);
        debug!(%url, "PypiRegistry::lookup: called");

        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(%name, "PypiRegistry::lookup: package not found");
                Ok(None)
            }
            status if status.is_success() => {
                let body: PypiResponse = response.json().await.map_err(|e| ResearchError::Parse(e.to_string()))?;
                Ok(Some(body.info.into()))
            }
            status => Err(ResearchError::Status {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PypiResponse {
    info: PypiInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PypiInfo {
    version: Option<String>,
    summary: Option<String>,
    home_page: Option<String>,
    docs_url: Option<String>,
    project_urls: Option<BTreeMap<String, String>>,
}

impl From<PypiInfo> for PackageInfo {
    fn from(info: PypiInfo) -> Self {
        let project_urls = info.project_urls.unwrap_or_default();
        let homepage = non_empty(info.home_page);

        // docs_url, then a "Documentation"-style project URL, then the homepage
        let docs_url = non_empty(info.docs_url)
            .or_else(|| {
                project_urls
                    .iter()
                    .find(|(key, url)| key.to_lowercase().contains("doc") && !url.trim().is_empty())
                    .map(|(_, url)| url.clone())
            })
            .or_else(|| homepage.clone());

        Self {
            version: info.version.unwrap_or_default(),
            summary: info.summary.unwrap_or_default(),
            homepage,
            docs_url,
            project_urls,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PackageInfo {
        let response: PypiResponse = serde_json::from_str(json).unwrap();
        response.info.into()
    }

    #[test]
    fn test_docs_url_preferred() {
        let info = parse(
            r#"{"info": {"version": "2.1.0", "summary": "Arrays", "home_page": "https://numpy.org",
                "docs_url": "https://numpy.org/doc", "project_urls": {"Documentation": "https://other"}}}"#,
        );
        assert_eq!(info.version, "2.1.0");
        assert_eq!(info.summary, "Arrays");
        assert_eq!(info.docs_url.as_deref(), Some("https://numpy.org/doc"));
    }

    #[test]
    fn test_docs_url_from_project_urls() {
        let info = parse(
            r#"{"info": {"version": "2.2.3", "docs_url": null, "home_page": "",
                "project_urls": {"Homepage": "https://pandas.pydata.org", "Documentation": "https://pandas.pydata.org/docs/"}}}"#,
        );
        assert_eq!(info.docs_url.as_deref(), Some("https://pandas.pydata.org/docs/"));
        assert!(info.homepage.is_none());
        assert_eq!(info.project_urls.len(), 2);
    }

    #[test]
    fn test_docs_url_falls_back_to_homepage() {
        let info = parse(r#"{"info": {"version": "1.0", "home_page": "https://example.org", "project_urls": null}}"#);
        assert_eq!(info.docs_url.as_deref(), Some("https://example.org"));
        assert!(info.project_urls.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let info = parse(r#"{"info": {}}"#);
        assert_eq!(info, PackageInfo::default());
    }

    #[test]
    fn test_new_trims_base_url() {
        let registry = PypiRegistry::new("https://pypi.org/pypi/", Duration::from_secs(1), "test").unwrap();
        assert_eq!(registry.base_url, "https://pypi.org/pypi");
    }
}
