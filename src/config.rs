//! Configuration for the compliance agent and its tools.
//!
//! Every knob lives in [`AgentConfig`], built through
//! [`AgentConfigBuilder`] so callers set only what they care about.

use crate::error::AgentError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used for review and classification when nothing else is set.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration shared by the review session and the tool functions.
///
/// # Example
/// ```rust
/// use icmje_agent::AgentConfig;
///
/// let config = AgentConfig::builder()
///     .workspace_root("/tmp/icmje")
///     .model("gemini-2.0-flash")
///     .rag_corpus("projects/p/locations/us-central1/ragCorpora/123")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AgentConfig {
    /// Parent directory of `inputs/`, `temp_figures/` and `outputs/`. Default: `./workspace`.
    pub workspace_root: PathBuf,

    /// Review model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Model used by the figure classifier. If None, falls back to `model`.
    pub vision_model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for review turns. Default: 0.2.
    ///
    /// The classifier always runs at 0 regardless of this value.
    pub temperature: f32,

    /// Maximum tokens the model may generate per review turn. Default: 8192.
    ///
    /// A reconstructed manuscript is returned in a single reply, so this has
    /// to cover a full paper.
    pub max_tokens: usize,

    /// Full Vertex AI RAG corpus resource name,
    /// `projects/<project>/locations/<location>/ragCorpora/<id>`.
    pub rag_corpus: Option<String>,

    /// Contexts returned per policy query. Default: 5.
    pub retrieval_top_k: u32,

    /// Vector distance cut-off for policy contexts. Default: 0.6.
    pub vector_distance_threshold: f64,

    /// HTTP timeout for the retrieval call in seconds. Default: 60.
    pub retrieval_timeout_secs: u64,

    /// Directory containing the pdfium shared library. If None, the system library is used.
    pub pdfium_lib_dir: Option<PathBuf>,

    /// Longest edge of a rasterised review page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Custom instruction prompt. If None, uses the built-in compliance prompt.
    pub system_prompt: Option<String>,

    /// Receives figure-extraction events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspace"),
            model: None,
            vision_model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            rag_corpus: None,
            retrieval_top_k: 5,
            vector_distance_threshold: 0.6,
            retrieval_timeout_secs: 60,
            pdfium_lib_dir: None,
            max_rendered_pixels: 2000,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("workspace_root", &self.workspace_root)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("rag_corpus", &self.rag_corpus)
            .field("retrieval_top_k", &self.retrieval_top_k)
            .field("vector_distance_threshold", &self.vector_distance_threshold)
            .field("pdfium_lib_dir", &self.pdfium_lib_dir)
            .finish()
    }
}

impl AgentConfig {
    /// Create a new builder for `AgentConfig`.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: Self::default(),
        }
    }

    /// The review model id, falling back to [`DEFAULT_MODEL`].
    pub fn review_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The classifier model id, falling back to the review model.
    pub fn classifier_model(&self) -> &str {
        self.vision_model
            .as_deref()
            .unwrap_or_else(|| self.review_model())
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn rag_corpus(mut self, corpus: impl Into<String>) -> Self {
        self.config.rag_corpus = Some(corpus.into());
        self
    }

    pub fn retrieval_top_k(mut self, k: u32) -> Self {
        self.config.retrieval_top_k = k;
        self
    }

    pub fn vector_distance_threshold(mut self, threshold: f64) -> Self {
        self.config.vector_distance_threshold = threshold;
        self
    }

    pub fn retrieval_timeout_secs(mut self, secs: u64) -> Self {
        self.config.retrieval_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let c = &self.config;
        if c.retrieval_top_k == 0 {
            return Err(AgentError::InvalidConfig(
                "retrieval top-k must be ≥ 1".into(),
            ));
        }
        if !(c.vector_distance_threshold > 0.0 && c.vector_distance_threshold <= 1.0) {
            return Err(AgentError::InvalidConfig(format!(
                "vector distance threshold must be in (0, 1], got {}",
                c.vector_distance_threshold
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retrieval_settings() {
        let c = AgentConfig::default();
        assert_eq!(c.retrieval_top_k, 5);
        assert!((c.vector_distance_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(c.review_model(), DEFAULT_MODEL);
        assert_eq!(c.classifier_model(), DEFAULT_MODEL);
    }

    #[test]
    fn classifier_model_falls_back_to_review_model() {
        let c = AgentConfig::builder().model("gpt-4.1").build().unwrap();
        assert_eq!(c.classifier_model(), "gpt-4.1");

        let c = AgentConfig::builder()
            .model("gpt-4.1")
            .vision_model("gpt-4.1-nano")
            .build()
            .unwrap();
        assert_eq!(c.classifier_model(), "gpt-4.1-nano");
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = AgentConfig::builder().retrieval_top_k(0).build().unwrap_err();
        assert!(matches!(err, AgentError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(AgentConfig::builder()
            .vector_distance_threshold(0.0)
            .build()
            .is_err());
        assert!(AgentConfig::builder()
            .vector_distance_threshold(1.5)
            .build()
            .is_err());
    }

    #[test]
    fn clamps_temperature_and_pixel_cap() {
        let c = AgentConfig::builder().max_rendered_pixels(10).build().unwrap();
        assert_eq!(c.max_rendered_pixels, 100);
        let c = AgentConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
