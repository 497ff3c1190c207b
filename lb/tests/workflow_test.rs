//! End-to-end workflow tests
//!
//! Every external capability is replaced by an in-file stub.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lessonbuilder::config::ResearchConfig;
use lessonbuilder::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use lessonbuilder::notebook::{CellKind, GeneratedCells, NotebookGenerator, NotebookWriter, read_notebook};
use lessonbuilder::prompts::PromptLoader;
use lessonbuilder::research::{
    PackageInfo, PackageRegistry, PageFetcher, ResearchAggregator, ResearchError, SearchHit, SearchProvider,
};
use lessonbuilder::workflow::{Planner, ScriptedInput, Workflow, WorkflowState};
use tempfile::TempDir;

// =============================================================================
// Stub collaborators
// =============================================================================

const OUTLINE: &str = "1. What is an ndarray\n2. Creating arrays\n3. Vectorized math";
const CELLS: &str = r###"```json
[
  {"cell_type": "markdown", "source": "# Intro to NumPy"},
  {"cell_type": "code", "source": "import numpy as np\nnp.arange(5)"},
  {"cell_type": "markdown", "source": "## Summary"}
]
```"###;

/// Answers by recognizing which prompt template it was sent
struct StubLlm {
    cells: String,
    prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    fn new(cells: &str) -> Arc<Self> {
        Arc::new(Self {
            cells: cells.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn generate_prompt(&self) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|p| p.starts_with("Create the cells"))
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.messages[0].content.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        let text = if prompt.starts_with("Suggest a short topic") {
            "Intro to NumPy".to_string()
        } else if prompt.starts_with("Create a concise lesson outline") {
            OUTLINE.to_string()
        } else if prompt.starts_with("Revise the lesson outline") {
            format!("{}\n4. Broadcasting", OUTLINE)
        } else if prompt.starts_with("Identify the Python packages") {
            "numpy".to_string()
        } else if prompt.starts_with("Create the cells") {
            self.cells.clone()
        } else {
            return Err(LlmError::InvalidResponse(format!("unexpected prompt: {}", prompt)));
        };
        Ok(CompletionResponse::text(text))
    }
}

struct EmptySearch;

#[async_trait]
impl SearchProvider for EmptySearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        Ok(vec![])
    }
}

struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        Err(ResearchError::Status {
            status: 500,
            url: "https://search.invalid".to_string(),
        })
    }
}

struct FixedSearch;

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ResearchError> {
        Ok(vec![SearchHit {
            title: format!("Result for {}", query),
            url: "https://numpy.org/doc/stable/user/absolute_beginners.html".to_string(),
            snippet: "NumPy is the fundamental package for scientific computing".to_string(),
        }])
    }
}

struct StubRegistry(BTreeMap<String, PackageInfo>);

#[async_trait]
impl PackageRegistry for StubRegistry {
    async fn lookup(&self, name: &str) -> Result<Option<PackageInfo>, ResearchError> {
        Ok(self.0.get(name).cloned())
    }
}

struct StubFetcher(BTreeMap<String, String>);

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        self.0.get(url).cloned().ok_or(ResearchError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

fn empty_registry() -> StubRegistry {
    StubRegistry(BTreeMap::new())
}

fn empty_fetcher() -> StubFetcher {
    StubFetcher(BTreeMap::new())
}

fn build_workflow(
    llm: Arc<StubLlm>,
    search: Arc<dyn SearchProvider>,
    registry: StubRegistry,
    fetcher: StubFetcher,
    dir: &Path,
) -> Workflow {
    let prompts = Arc::new(PromptLoader::embedded_only());
    let research = ResearchAggregator::new(
        llm.clone(),
        prompts.clone(),
        search,
        Arc::new(registry),
        Arc::new(fetcher),
        ResearchConfig::default(),
    );

    Workflow::new(
        Planner::new(llm.clone(), prompts.clone(), 1024),
        Some(research),
        NotebookGenerator::new(llm, prompts, ResearchConfig::default(), 4096),
        NotebookWriter::new(dir),
    )
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_intro_to_numpy_end_to_end() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);
    let workflow = build_workflow(llm.clone(), Arc::new(EmptySearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["approve"]);

    let state = workflow
        .run(WorkflowState::new("Intro to NumPy"), &mut input)
        .await
        .expect("workflow should finish");

    assert!(state.approved);
    assert_eq!(state.outline, OUTLINE);
    assert!(!state.cells.is_empty());
    assert_eq!(state.package_names, vec!["numpy"]);

    let path = state.notebook_file.expect("notebook should be written");
    assert_eq!(path, temp.path().join("Intro_to_NumPy.ipynb"));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("ipynb"));

    let notebook = read_notebook(&path).expect("notebook should parse");
    assert_eq!(notebook.cells.len(), 3);
    assert_eq!(notebook.cells[1].kind(), CellKind::Code);
    assert_eq!(notebook.cells[1].language(), "python");
    assert_eq!(notebook.cells[1].source(), ["import numpy as np\n", "np.arange(5)"]);
}

#[tokio::test]
async fn test_throwing_search_still_generates() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);
    let workflow = build_workflow(llm.clone(), Arc::new(FailingSearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["a"]);

    let state = workflow
        .run(WorkflowState::new("Intro to NumPy"), &mut input)
        .await
        .expect("workflow should finish");

    assert!(state.research_results.is_empty());
    assert_eq!(state.doc_content, "");
    assert!(matches!(&state.cells, GeneratedCells::Parsed(cells) if cells.len() == 3));
    assert!(state.notebook_file.is_some());
    assert!(llm.generate_prompt().is_some());
}

#[tokio::test]
async fn test_research_reaches_generation_prompt() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);

    let mut known = BTreeMap::new();
    known.insert(
        "numpy".to_string(),
        PackageInfo {
            version: "2.1.0".to_string(),
            summary: "Fundamental package for array computing in Python".to_string(),
            docs_url: Some("https://numpy.org/doc".to_string()),
            ..PackageInfo::default()
        },
    );
    let mut pages = BTreeMap::new();
    pages.insert(
        "https://numpy.org/doc".to_string(),
        "<html><body><pre>import numpy as np\nnp.zeros((2, 3))</pre></body></html>".to_string(),
    );

    let workflow = build_workflow(
        llm.clone(),
        Arc::new(FixedSearch),
        StubRegistry(known),
        StubFetcher(pages),
        temp.path(),
    );
    let mut input = ScriptedInput::new(["y"]);

    let state = workflow
        .run(WorkflowState::new("Intro to NumPy"), &mut input)
        .await
        .expect("workflow should finish");

    assert_eq!(state.package_info["numpy"].version, "2.1.0");
    assert_eq!(state.research_results.len(), 3);
    assert!(state.doc_content.contains("np.zeros((2, 3))"));

    let prompt = llm.generate_prompt().expect("generation prompt");
    assert!(prompt.contains("numpy 2.1.0"));
    assert!(prompt.contains("np.zeros((2, 3))"));
}

#[tokio::test]
async fn test_revise_loop_then_approve() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);
    let workflow = build_workflow(llm.clone(), Arc::new(EmptySearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["huh?", "r", "", "Cover broadcasting too", "a"]);

    let state = workflow
        .run(WorkflowState::new("Intro to NumPy"), &mut input)
        .await
        .expect("workflow should finish");

    assert!(state.approved);
    assert!(state.outline.ends_with("4. Broadcasting"));
    assert!(state.feedback.is_empty());
    assert!(!state.needs_feedback);
    assert!(
        llm.prompts()
            .iter()
            .any(|p| p.starts_with("Revise") && p.contains("Cover broadcasting too"))
    );
    assert!(state.notebook_file.is_some());
}

#[tokio::test]
async fn test_quit_produces_no_artifact() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);
    let workflow = build_workflow(llm.clone(), Arc::new(EmptySearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["quit"]);

    let state = workflow
        .run(WorkflowState::new("Intro to NumPy"), &mut input)
        .await
        .expect("workflow should finish");

    assert!(!state.approved);
    assert!(!state.needs_feedback);
    assert!(state.package_names.is_empty());
    assert!(state.cells.is_empty());
    assert!(state.notebook_file.is_none());
    assert!(llm.generate_prompt().is_none());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unparsable_generation_writes_fallback() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new("I'd be happy to help! Here is a lesson about NumPy arrays...");
    let workflow = build_workflow(llm.clone(), Arc::new(EmptySearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["a"]);

    let state = workflow
        .run(WorkflowState::new("Intro: NumPy/Pandas!"), &mut input)
        .await
        .expect("workflow should finish");

    assert!(matches!(state.cells, GeneratedCells::Unparsed { .. }));
    let path = state.notebook_file.expect("fallback notebook should be written");
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Intro_NumPy_Pandas.ipynb"));

    let notebook = read_notebook(&path).expect("notebook should parse");
    assert_eq!(notebook.cells.len(), 3);
    assert!(notebook.cells.iter().all(|c| c.kind() == CellKind::Markdown));
    assert!(notebook.cells[0].text().contains("Intro: NumPy/Pandas!"));
    assert!(notebook.cells[2].text().contains("happy to help"));
}

#[tokio::test]
async fn test_missing_topic_is_clarified() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let llm = StubLlm::new(CELLS);
    let workflow = build_workflow(llm.clone(), Arc::new(EmptySearch), empty_registry(), empty_fetcher(), temp.path());
    let mut input = ScriptedInput::new(["a"]);

    let state = workflow
        .run(WorkflowState::default(), &mut input)
        .await
        .expect("workflow should finish");

    assert_eq!(state.topic, "Intro to NumPy");
    assert!(input.shown()[0].contains("Intro to NumPy"));
    assert!(state.notebook_file.is_some());
}
