//! Host-facing tool registry.
//!
//! The agent runtime that drives the conversation owns the tool-calling
//! loop; this crate only publishes what it can do and runs one call at a
//! time. Each tool has a name, a description and a JSON Schema for its
//! arguments, and [`ToolRegistry::execute`] always answers with a string:
//! the tool's own `SUCCESS: …` / result text, or `ERROR: …`.
//!
//! | Tool | Arguments |
//! |------|-----------|
//! | `search_icmje_policy` | `query` |
//! | `reconstruct_and_generate_pdf` | `content` |
//! | `extract_images_from_local` | `filename` |
//! | `save_ui_file_to_local` | `filename` |
//! | `save_attached_images_to_local` | none |

use crate::attachments::{save_attached_images_to_local, save_ui_file_to_local, ToolContext};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::pipeline::classify::{FigureClassifier, VisionClassifier};
use crate::pipeline::extract::extract_images_from_local;
use crate::progress::ProgressCallback;
use crate::provider::resolve_classifier_provider;
use crate::reconstruct::reconstruct_and_generate_pdf;
use crate::retrieval::{search_icmje_policy, PolicyRetriever, VertexRagRetriever};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: serde_json::Value,
}

/// Shared state every tool reads from.
pub struct ToolEnv {
    pub workspace: Workspace,
    pub classifier: Option<Arc<dyn FigureClassifier>>,
    pub retriever: Option<Arc<dyn PolicyRetriever>>,
    pub pdfium_lib_dir: Option<PathBuf>,
    pub progress: Option<ProgressCallback>,
}

impl ToolEnv {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            classifier: None,
            retriever: None,
            pdfium_lib_dir: None,
            progress: None,
        }
    }

    /// Open the workspace and wire up whatever the configuration allows.
    ///
    /// A missing provider or corpus is not fatal here: the tools that need
    /// them report the problem when called.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let mut env = Self::new(Workspace::open(&config.workspace_root)?);
        env.pdfium_lib_dir = config.pdfium_lib_dir.clone();
        env.progress = config.progress_callback.clone();

        match resolve_classifier_provider(config) {
            Ok(provider) => env.classifier = Some(Arc::new(VisionClassifier::new(provider))),
            Err(e) => warn!("Figure classifier unavailable: {}", e),
        }
        match VertexRagRetriever::from_config(config) {
            Ok(retriever) => env.retriever = Some(Arc::new(retriever)),
            Err(e) => warn!("Policy retrieval unavailable: {}", e),
        }
        Ok(env)
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FigureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn PolicyRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn classifier(&self) -> Result<&dyn FigureClassifier, AgentError> {
        self.classifier
            .as_deref()
            .ok_or_else(|| AgentError::ProviderNotConfigured {
                provider: "vision".to_string(),
                hint: "No vision model is configured for figure classification.".to_string(),
            })
    }

    fn retriever(&self) -> Result<&dyn PolicyRetriever, AgentError> {
        self.retriever.as_deref().ok_or_else(|| {
            AgentError::RetrievalNotConfigured("no RAG corpus is configured".to_string())
        })
    }
}

/// One callable tool.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn call(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<String, AgentError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T, AgentError> {
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidToolArguments {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}

fn single_string_schema(field: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description }
        },
        "required": [field]
    })
}

// ── Tools ────────────────────────────────────────────────────────────────────

struct SearchPolicyTool(Arc<ToolEnv>);

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[async_trait]
impl AgentTool for SearchPolicyTool {
    fn name(&self) -> &str {
        "search_icmje_policy"
    }

    fn description(&self) -> &str {
        "Search the ICMJE Recommendations for the rules that apply to a question: authorship, ethics, AI disclosure, trial registration, reporting standards. Returns policy excerpts with their sources."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        single_string_schema("query", "What to look up in the ICMJE policy")
    }

    async fn call(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> Result<String, AgentError> {
        let args: QueryArgs = parse_args(self.name(), arguments)?;
        search_icmje_policy(self.0.retriever()?, &args.query).await
    }
}

struct ReconstructTool(Arc<ToolEnv>);

#[derive(Deserialize)]
struct ContentArgs {
    content: String,
}

#[async_trait]
impl AgentTool for ReconstructTool {
    fn name(&self) -> &str {
        "reconstruct_and_generate_pdf"
    }

    fn description(&self) -> &str {
        "Generate a PDF from the reconstructed manuscript text. Figures are inserted at [[INSERT_IMAGE: <file>]] tags or after their 'Figure N:' captions. Returns the path of the PDF."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        single_string_schema("content", "The full reconstructed manuscript text")
    }

    async fn call(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<String, AgentError> {
        let args: ContentArgs = parse_args(self.name(), arguments)?;
        reconstruct_and_generate_pdf(
            &args.content,
            ctx,
            &self.0.workspace,
            self.0.pdfium_lib_dir.as_deref(),
        )
        .await
    }
}

struct ExtractImagesTool(Arc<ToolEnv>);

#[derive(Deserialize)]
struct FilenameArgs {
    filename: String,
}

#[async_trait]
impl AgentTool for ExtractImagesTool {
    fn name(&self) -> &str {
        "extract_images_from_local"
    }

    fn description(&self) -> &str {
        "Extract the scientific figures from a PDF already saved with save_ui_file_to_local. Publisher logos and other artifacts are discarded."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        single_string_schema("filename", "Name of the saved PDF, e.g. manuscript.pdf")
    }

    async fn call(&self, arguments: serde_json::Value, _ctx: &ToolContext) -> Result<String, AgentError> {
        let args: FilenameArgs = parse_args(self.name(), arguments)?;
        let env = &self.0;
        extract_images_from_local(
            &args.filename,
            &env.workspace,
            env.classifier()?,
            env.pdfium_lib_dir.as_deref(),
            env.progress.as_ref(),
        )
        .await
    }
}

struct SaveFileTool(Arc<ToolEnv>);

#[async_trait]
impl AgentTool for SaveFileTool {
    fn name(&self) -> &str {
        "save_ui_file_to_local"
    }

    fn description(&self) -> &str {
        "Save a file attached to the user's message so the other tools can read it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        single_string_schema("filename", "Display name of the attachment")
    }

    async fn call(&self, arguments: serde_json::Value, ctx: &ToolContext) -> Result<String, AgentError> {
        let args: FilenameArgs = parse_args(self.name(), arguments)?;
        save_ui_file_to_local(&args.filename, ctx, &self.0.workspace)
    }
}

struct SaveImagesTool(Arc<ToolEnv>);

#[async_trait]
impl AgentTool for SaveImagesTool {
    fn name(&self) -> &str {
        "save_attached_images_to_local"
    }

    fn description(&self) -> &str {
        "Save every image attached to the user's message as a manuscript figure, numbered in order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _arguments: serde_json::Value, ctx: &ToolContext) -> Result<String, AgentError> {
        save_attached_images_to_local(ctx, &self.0.workspace)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// The tools this agent exposes, in a stable order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn AgentTool>>,
}

impl ToolRegistry {
    /// Register every built-in tool over `env`.
    pub fn new(env: ToolEnv) -> Self {
        let env = Arc::new(env);
        Self {
            tools: vec![
                Box::new(SearchPolicyTool(Arc::clone(&env))),
                Box::new(ReconstructTool(Arc::clone(&env))),
                Box::new(ExtractImagesTool(Arc::clone(&env))),
                Box::new(SaveFileTool(Arc::clone(&env))),
                Box::new(SaveImagesTool(env)),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn AgentTool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Run one tool call. Never fails: errors come back as `ERROR: …`.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value, ctx: &ToolContext) -> String {
        let result = match self.get(name) {
            Some(tool) => tool.call(arguments, ctx).await,
            None => Err(AgentError::UnknownTool(name.to_string())),
        };
        match result {
            Ok(output) => {
                info!(tool = name, "Tool call succeeded");
                output
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                format!("ERROR: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{InlineData, Part, UserContent};
    use crate::retrieval::PolicyContext;

    struct Canned;

    #[async_trait]
    impl PolicyRetriever for Canned {
        async fn retrieve(&self, query: &str) -> Result<Vec<PolicyContext>, AgentError> {
            Ok(vec![PolicyContext {
                source_uri: "gs://icmje/recs.pdf".into(),
                text: format!("policy for {query}"),
            }])
        }
    }

    struct NeverFigure;

    #[async_trait]
    impl FigureClassifier for NeverFigure {
        async fn is_scientific_figure(&self, _png: &[u8]) -> Result<bool, AgentError> {
            Ok(false)
        }
    }

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        let env = ToolEnv::new(Workspace::open(dir).unwrap())
            .with_retriever(Arc::new(Canned))
            .with_classifier(Arc::new(NeverFigure));
        ToolRegistry::new(env)
    }

    fn ctx_with(name: &str, mime: &str) -> ToolContext {
        ToolContext::new(Some(UserContent::new(vec![
            Part::Text("please review".into()),
            Part::InlineData(InlineData::new(name, mime, b"%PDF-1.4 body".to_vec())),
        ])))
    }

    #[test]
    fn exposes_five_tools_with_object_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert_eq!(
            reg.names(),
            vec![
                "search_icmje_policy",
                "reconstruct_and_generate_pdf",
                "extract_images_from_local",
                "save_ui_file_to_local",
                "save_attached_images_to_local",
            ]
        );
        for def in reg.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = registry(dir.path())
            .execute("delete_everything", serde_json::json!({}), &ToolContext::default())
            .await;
        assert_eq!(out, "ERROR: unknown tool 'delete_everything'");
    }

    #[tokio::test]
    async fn bad_arguments_are_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = registry(dir.path())
            .execute("search_icmje_policy", serde_json::json!({"q": 1}), &ToolContext::default())
            .await;
        assert!(out.starts_with("ERROR: invalid arguments for 'search_icmje_policy'"), "{out}");
    }

    #[tokio::test]
    async fn search_returns_formatted_policy() {
        let dir = tempfile::tempdir().unwrap();
        let out = registry(dir.path())
            .execute(
                "search_icmje_policy",
                serde_json::json!({"query": "authorship"}),
                &ToolContext::default(),
            )
            .await;
        assert_eq!(out, "\n[ICMJE SOURCE: gs://icmje/recs.pdf]\npolicy for authorship\n");
    }

    #[tokio::test]
    async fn search_without_retriever_is_an_error_string() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ToolRegistry::new(ToolEnv::new(Workspace::open(dir.path()).unwrap()));
        let out = reg
            .execute("search_icmje_policy", serde_json::json!({"query": "x"}), &ToolContext::default())
            .await;
        assert!(out.starts_with("ERROR: Policy retrieval is not configured"), "{out}");
    }

    #[tokio::test]
    async fn save_file_writes_into_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let out = reg
            .execute(
                "save_ui_file_to_local",
                serde_json::json!({"filename": "paper.pdf"}),
                &ctx_with("paper.pdf", "application/pdf"),
            )
            .await;
        assert!(out.starts_with("SUCCESS: File 'paper.pdf' saved locally"), "{out}");
        assert!(dir.path().join("inputs/paper.pdf").exists());
    }

    #[tokio::test]
    async fn extract_before_save_asks_for_sync() {
        let dir = tempfile::tempdir().unwrap();
        let out = registry(dir.path())
            .execute(
                "extract_images_from_local",
                serde_json::json!({"filename": "paper.pdf"}),
                &ToolContext::default(),
            )
            .await;
        assert!(out.contains("Run 'save_ui_file_to_local' first"), "{out}");
    }

    #[tokio::test]
    async fn save_images_with_nothing_attached() {
        let dir = tempfile::tempdir().unwrap();
        let out = registry(dir.path())
            .execute("save_attached_images_to_local", serde_json::json!({}), &ToolContext::default())
            .await;
        assert_eq!(out, "No attached images found.");
    }
}
