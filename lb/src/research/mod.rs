//! Research Aggregator
//!
//! Turns an approved topic into a bounded, best-effort bundle of evidence:
//! package metadata, trusted search snippets and code examples pulled from
//! documentation pages. Every external call is bounded by a timeout and any
//! single failure only shrinks the bundle; the aggregator never fails the
//! workflow.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

mod context;
mod error;
mod extract;
mod fetch;
mod registry;
mod search;

pub use context::{research_context, truncate_chars};
pub use error::ResearchError;
pub use extract::{
    FALLBACK_PACKAGE, KNOWN_PACKAGES, extract_package_names, fallback_package_names, first_token_fallback,
    match_known_packages, normalize_package_list,
};
pub use fetch::{HttpFetcher, PageExtract, PageFetcher, extract_page};
pub use registry::{PackageInfo, PackageRegistry, PypiRegistry};
pub use search::{
    BraveSearch, DisabledSearch, SearchCredentials, SearchHit, SearchProvider, SerpApiSearch, TavilySearch,
    build_queries, create_search_provider, is_trusted,
};

use crate::config::{Config, ResearchConfig};
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::workflow::WorkflowState;

/// One trusted search hit, attributed to the package it was found for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub package: String,
}

/// Everything one research pass produced
#[derive(Debug, Clone, Default)]
struct ResearchBundle {
    package_names: Vec<String>,
    package_info: BTreeMap<String, PackageInfo>,
    research_results: Vec<ResearchResult>,
    doc_content: String,
}

/// Gathers external evidence for the generation step
#[derive(Clone)]
pub struct ResearchAggregator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    search: Arc<dyn SearchProvider>,
    registry: Arc<dyn PackageRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    config: ResearchConfig,
}

impl ResearchAggregator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        search: Arc<dyn SearchProvider>,
        registry: Arc<dyn PackageRegistry>,
        fetcher: Arc<dyn PageFetcher>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            llm,
            prompts,
            search,
            registry,
            fetcher,
            config,
        }
    }

    /// Build the aggregator with the HTTP-backed collaborators named in the config
    pub fn from_config(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        config: &Config,
    ) -> Result<Self, ResearchError> {
        debug!("ResearchAggregator::from_config: called");
        let research = &config.research;
        let timeout = research.request_timeout();

        let search = create_search_provider(&config.search, timeout)?;
        let registry = Arc::new(PypiRegistry::new(&research.registry_url, timeout, &research.user_agent)?);
        let fetcher = Arc::new(HttpFetcher::new(timeout, &research.user_agent)?);

        Ok(Self::new(llm, prompts, search, registry, fetcher, research.clone()))
    }

    /// Run research for an approved state
    ///
    /// Unapproved states pass through untouched. If the pass aborts, the four
    /// research fields are reset to empty and the workflow carries on.
    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(approved = state.approved, "ResearchAggregator::run: called");
        if !state.approved {
            debug!("ResearchAggregator::run: not approved, skipping");
            return state;
        }

        info!(topic = %state.topic, "Researching packages for topic");
        let this = self.clone();
        let topic = state.topic.clone();
        let outcome = tokio::spawn(async move { this.collect(&topic).await })
            .await
            .map_err(|e| ResearchError::Aborted(e.to_string()));

        let bundle = match outcome {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "Research failed, continuing without research context");
                ResearchBundle::default()
            }
        };

        info!(
            packages = ?bundle.package_names,
            results = bundle.research_results.len(),
            doc_chars = bundle.doc_content.len(),
            "Research complete"
        );

        state.package_names = bundle.package_names;
        state.package_info = bundle.package_info;
        state.research_results = bundle.research_results;
        state.doc_content = bundle.doc_content;
        state
    }

    async fn collect(&self, topic: &str) -> ResearchBundle {
        debug!(%topic, "ResearchAggregator::collect: called");
        let mut bundle = ResearchBundle {
            package_names: self.package_names(topic).await,
            ..ResearchBundle::default()
        };

        for name in &bundle.package_names {
            match self.bounded("registry lookup", name, self.registry.lookup(name)).await {
                Some(Some(info)) => {
                    bundle.package_info.insert(name.clone(), info);
                }
                Some(None) => debug!(%name, "ResearchAggregator::collect: not in registry"),
                None => {}
            }
        }

        for name in &bundle.package_names {
            for query in build_queries(name, self.config.max_queries_per_package) {
                let Some(hits) = self
                    .bounded("search", &query, self.search.search(&query, self.config.results_per_query))
                    .await
                else {
                    continue;
                };

                let before = bundle.research_results.len();
                bundle.research_results.extend(
                    hits.into_iter()
                        .filter(|hit| is_trusted(&hit.url, &self.config.trusted_domains))
                        .map(|hit| ResearchResult {
                            title: hit.title,
                            url: hit.url,
                            snippet: hit.snippet,
                            package: name.clone(),
                        }),
                );
                debug!(%query, kept = bundle.research_results.len() - before, "ResearchAggregator::collect: search hits");
            }
        }

        for name in &bundle.package_names {
            let content = self.package_docs(name, &bundle).await;
            if !content.is_empty() {
                if !bundle.doc_content.is_empty() {
                    bundle.doc_content.push('\n');
                }
                bundle.doc_content.push_str(&content);
            }
        }

        bundle
    }

    /// Extraction ladder, bounded like every other call
    async fn package_names(&self, topic: &str) -> Vec<String> {
        let max = self.config.max_packages;
        let extraction = extract_package_names(&self.llm, &self.prompts, topic, max);

        let mut names = match tokio::time::timeout(self.config.request_timeout(), extraction).await {
            Ok(names) => names,
            Err(_) => {
                warn!("Package extraction timed out, using keyword fallback");
                fallback_package_names(topic, max)
            }
        };
        names.truncate(max.max(1));
        names
    }

    /// Code examples for one package: docs URL first, search results if too thin
    async fn package_docs(&self, name: &str, bundle: &ResearchBundle) -> String {
        debug!(%name, "ResearchAggregator::package_docs: called");
        let mut content = String::new();

        let docs_url = bundle.package_info.get(name).and_then(|info| info.docs_url.clone());
        if let Some(url) = &docs_url {
            self.fetch_into(url, &mut content).await;
        }

        if content.chars().count() >= self.config.min_doc_content_chars {
            return content;
        }

        debug!(%name, chars = content.chars().count(), "ResearchAggregator::package_docs: docs too thin, trying search results");
        let mut fallback_urls: Vec<&str> = Vec::new();
        for result in bundle.research_results.iter().filter(|r| r.package == name) {
            if Some(result.url.as_str()) != docs_url.as_deref() && !fallback_urls.contains(&result.url.as_str()) {
                fallback_urls.push(&result.url);
            }
        }

        for url in fallback_urls.into_iter().take(self.config.max_fallback_pages) {
            self.fetch_into(url, &mut content).await;
            if content.chars().count() >= self.config.min_doc_content_chars {
                break;
            }
        }

        content
    }

    async fn fetch_into(&self, url: &str, content: &mut String) {
        let Some(html) = self.bounded("page fetch", url, self.fetcher.fetch(url)).await else {
            return;
        };

        let extract = extract_page(&html, self.config.max_code_blocks_per_page);
        if extract.is_empty() {
            debug!(%url, "ResearchAggregator::fetch_into: nothing extracted");
            return;
        }
        content.push_str(&extract.render(url));
    }

    /// Await one external call under the request timeout; failures become `None`
    async fn bounded<T, F>(&self, what: &str, target: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, ResearchError>>,
    {
        let timeout = self.config.request_timeout();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ResearchError::Timeout(timeout)),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%what, %target, error = %e, "Research call failed, skipping");
                None
            }
        }
    }
}
