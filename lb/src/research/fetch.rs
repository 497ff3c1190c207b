//! Documentation page fetching and code-example extraction

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::ResearchError;
use super::context::truncate_chars;

/// Largest page body accepted
const MAX_BODY_BYTES: usize = 1_000_000;

/// `<code>` elements shorter than this are inline identifiers, not examples
const MIN_INLINE_CODE_CHARS: usize = 40;

const MAX_IMPORTS_PER_PAGE: usize = 10;
const MAX_DEPRECATIONS_PER_PAGE: usize = 5;
const MAX_DEPRECATION_CHARS: usize = 200;

static IMPORT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:>>>\s*)?((?:from\s+[A-Za-z_][\w.]*\s+import\s+[\w.*, ()]+)|(?:import\s+[A-Za-z_][\w.]*(?:\s+as\s+\w+)?(?:\s*,\s*[A-Za-z_][\w.]*)*))\s*$").ok()
});

/// The page-fetch capability
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body; non-2xx statuses are errors
    async fn fetch(&self, url: &str) -> Result<String, ResearchError>;
}

/// Fetches pages over HTTP with a timeout and identifying User-Agent
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ResearchError> {
        debug!(?timeout, %user_agent, "HttpFetcher::new: called");
        let http = Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        debug!(%url, "HttpFetcher::fetch: called");
        if !url.starts_with("http://") && !url.starts_with("https://") {
            debug!("HttpFetcher::fetch: invalid URL protocol");
            return Err(ResearchError::InvalidUrl(url.to_string()));
        }

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "HttpFetcher::fetch: HTTP error status");
            return Err(ResearchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_BODY_BYTES
        {
            debug!(len, "HttpFetcher::fetch: declared length too large");
            return Err(ResearchError::TooLarge(len as usize));
        }

        let body = response.text().await?;
        if body.len() > MAX_BODY_BYTES {
            debug!(body_len = body.len(), "HttpFetcher::fetch: response too large");
            return Err(ResearchError::TooLarge(body.len()));
        }

        debug!(body_len = body.len(), "HttpFetcher::fetch: response body read");
        Ok(body)
    }
}

/// What one documentation page contributed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    pub code_blocks: Vec<String>,
    pub imports: Vec<String>,
    pub deprecations: Vec<String>,
}

impl PageExtract {
    pub fn is_empty(&self) -> bool {
        self.code_blocks.is_empty() && self.imports.is_empty() && self.deprecations.is_empty()
    }

    /// Render as a `### Source:` section for the aggregated doc content
    pub fn render(&self, url: &str) -> String {
        let mut out = format!("### Source: {}\n", url);

        if !self.imports.is_empty() {
            out.push_str("\nImports:\n");
            for import in &self.imports {
                out.push_str(import);
                out.push('\n');
            }
        }

        if !self.deprecations.is_empty() {
            out.push_str("\nDeprecation notes:\n");
            for note in &self.deprecations {
                out.push_str(&format!("- {}\n", note));
            }
        }

        for block in &self.code_blocks {
            out.push_str(&format!("\n```python\n{}\n```\n", block));
        }

        out
    }
}

/// Pull code examples, import statements and deprecation notes out of an HTML page
pub fn extract_page(html: &str, max_code_blocks: usize) -> PageExtract {
    debug!(html_len = html.len(), max_code_blocks, "extract_page: called");
    let document = Html::parse_document(html);

    let mut code_blocks = dedup(select_texts(&document, "pre"));
    if code_blocks.is_empty() {
        debug!("extract_page: no <pre> blocks, trying <code>");
        code_blocks = dedup(
            select_texts(&document, "code")
                .into_iter()
                .filter(|c| c.chars().count() >= MIN_INLINE_CODE_CHARS || c.contains('\n'))
                .collect(),
        );
    }
    code_blocks.truncate(max_code_blocks);

    let text = html2md::rewrite_html(html, false);

    let imports = dedup(
        code_blocks
            .iter()
            .flat_map(|block| block.lines())
            .chain(text.lines())
            .filter_map(import_statement)
            .collect(),
    )
    .into_iter()
    .take(MAX_IMPORTS_PER_PAGE)
    .collect();

    let deprecations = dedup(
        text.lines()
            .map(|line| line.trim().trim_start_matches(['#', '*', '-', '>', ' ']))
            .filter(|line| line.to_lowercase().contains("deprecat"))
            .map(|line| truncate_chars(line, MAX_DEPRECATION_CHARS))
            .collect(),
    )
    .into_iter()
    .take(MAX_DEPRECATIONS_PER_PAGE)
    .collect();

    PageExtract {
        code_blocks,
        imports,
        deprecations,
    }
}

/// Trimmed, non-empty text of every element matching `css`
fn select_texts(document: &Html, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        debug!(%css, "select_texts: invalid selector");
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// The import statement on a line, if any
fn import_statement(line: &str) -> Option<String> {
    let re = IMPORT_RE.as_ref()?;
    let line = line.trim().trim_matches('`');
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
