//! Package-name extraction from a lesson topic
//!
//! Three tiers, each used only when the one before yields nothing:
//! 1. Few-shot completion (`extract-packages` prompt)
//! 2. Keyword match against `KNOWN_PACKAGES`
//! 3. First token of the topic, or `"python"` for an empty topic

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::llm::{LlmClient, complete_text};
use crate::prompts::{PromptLoader, SYSTEM_PROMPT};

/// Sentinel package for an empty topic
pub const FALLBACK_PACKAGE: &str = "python";

const EXTRACT_MAX_TOKENS: u32 = 100;

/// Topic keyword to PyPI package name
pub const KNOWN_PACKAGES: &[(&str, &str)] = &[
    ("numpy", "numpy"),
    ("pandas", "pandas"),
    ("matplotlib", "matplotlib"),
    ("seaborn", "seaborn"),
    ("plotly", "plotly"),
    ("scipy", "scipy"),
    ("sklearn", "scikit-learn"),
    ("scikit-learn", "scikit-learn"),
    ("tensorflow", "tensorflow"),
    ("keras", "keras"),
    ("pytorch", "torch"),
    ("torch", "torch"),
    ("transformers", "transformers"),
    ("requests", "requests"),
    ("httpx", "httpx"),
    ("flask", "flask"),
    ("django", "django"),
    ("fastapi", "fastapi"),
    ("pydantic", "pydantic"),
    ("sqlalchemy", "sqlalchemy"),
    ("beautifulsoup", "beautifulsoup4"),
    ("bs4", "beautifulsoup4"),
    ("scrapy", "scrapy"),
    ("pytest", "pytest"),
    ("asyncio", "asyncio"),
    ("polars", "polars"),
    ("opencv", "opencv-python"),
    ("cv2", "opencv-python"),
    ("pillow", "pillow"),
    ("pil", "pillow"),
    ("nltk", "nltk"),
    ("spacy", "spacy"),
    ("streamlit", "streamlit"),
    ("jupyter", "jupyter"),
];

/// Derive the packages a topic is about; never returns an empty list
pub async fn extract_package_names(
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptLoader,
    topic: &str,
    max_packages: usize,
) -> Vec<String> {
    debug!(%topic, max_packages, "extract_package_names: called");

    match ask_model(llm, prompts, topic, max_packages).await {
        Ok(names) if !names.is_empty() => {
            debug!(?names, "extract_package_names: model answered");
            return names;
        }
        Ok(_) => debug!("extract_package_names: model answer had no package names"),
        Err(e) => warn!(error = %e, "Package extraction failed, using keyword fallback"),
    }

    fallback_package_names(topic, max_packages)
}

/// Tiers two and three of the ladder, without the model
pub fn fallback_package_names(topic: &str, max_packages: usize) -> Vec<String> {
    let known = match_known_packages(topic, max_packages);
    if !known.is_empty() {
        debug!(?known, "fallback_package_names: keyword match");
        return known;
    }

    let fallback = first_token_fallback(topic);
    debug!(%fallback, "fallback_package_names: first-token fallback");
    vec![fallback]
}

async fn ask_model(
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptLoader,
    topic: &str,
    max_packages: usize,
) -> eyre::Result<Vec<String>> {
    let prompt = prompts.render("extract-packages", &json!({"topic": topic, "max_packages": max_packages}))?;
    let text = complete_text(llm, SYSTEM_PROMPT, &prompt, EXTRACT_MAX_TOKENS).await?;
    Ok(normalize_package_list(&text, max_packages))
}

/// Single words a chatty answer uses that are never package names
const NOT_PACKAGES: &[&str] = &["and", "or", "the", "none", "package", "packages", "n/a"];

/// Turn a free-form model answer into clean, unique package names
///
/// Entries are comma, semicolon or newline separated. An entry that still
/// holds several words after dropping any `label:` prefix is prose and skipped.
pub fn normalize_package_list(text: &str, max_packages: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for entry in text.split([',', ';', '\n']) {
        let entry = entry.rsplit(':').next().unwrap_or(entry);
        let entry = entry
            .trim()
            .trim_start_matches(|c: char| matches!(c, '-' | '*' | '.' | ')') || c.is_ascii_digit() || c.is_whitespace())
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`') || c.is_whitespace());

        if entry.is_empty() || entry.contains(char::is_whitespace) {
            continue;
        }

        let lowered = entry.to_lowercase();
        if NOT_PACKAGES.contains(&lowered.as_str()) {
            continue;
        }

        let name: String = lowered
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();
        let name = name.trim_matches(|c: char| matches!(c, '.' | '_' | '-'));
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }

        names.push(name.to_string());
        if names.len() >= max_packages {
            break;
        }
    }

    names
}

/// Known packages whose keywords appear in the topic, in topic order
pub fn match_known_packages(topic: &str, max_packages: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    let words = topic
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase);

    for word in words {
        if let Some((_, package)) = KNOWN_PACKAGES.iter().find(|(keyword, _)| *keyword == word)
            && !names.iter().any(|n| n == package)
        {
            names.push(package.to_string());
            if names.len() >= max_packages {
                break;
            }
        }
    }

    names
}

/// First whitespace-delimited token of the topic, or `"python"`
pub fn first_token_fallback(topic: &str) -> String {
    topic
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_else(|| FALLBACK_PACKAGE.to_string())
}
