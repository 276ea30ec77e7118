//! ICMJE policy retrieval against a Vertex AI RAG corpus.
//!
//! One `retrieveContexts` call per query. The corpus resource name
//! determines the regional endpoint:
//!
//! ```text
//! projects/<p>/locations/<l>/ragCorpora/<id>
//!   → POST https://<l>-aiplatform.googleapis.com/v1/projects/<p>/locations/<l>:retrieveContexts
//! ```
//!
//! Authentication is a bearer token read from the environment on every call
//! (`VERTEX_ACCESS_TOKEN`, then `GOOGLE_OAUTH_ACCESS_TOKEN`), so a token
//! refreshed by `gcloud auth print-access-token` is picked up without a
//! restart.

use crate::config::AgentConfig;
use crate::error::AgentError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned when the corpus has nothing under the distance threshold.
pub const NO_POLICY_FOUND: &str = "No specific ICMJE policy found in RAG.";

/// Environment variables consulted for the bearer token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["VERTEX_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

/// Environment variable holding the corpus name when the config has none.
pub const CORPUS_ENV_VAR: &str = "RAG_CORPUS";

/// One retrieved policy excerpt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyContext {
    pub source_uri: String,
    pub text: String,
}

/// Anything that can answer a policy query with ranked excerpts.
#[async_trait]
pub trait PolicyRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<PolicyContext>, AgentError>;
}

/// Query the policy corpus and render the excerpts for the model.
pub async fn search_icmje_policy(
    retriever: &dyn PolicyRetriever,
    query: &str,
) -> Result<String, AgentError> {
    let contexts = retriever.retrieve(query).await?;
    info!("Policy search returned {} context(s)", contexts.len());
    Ok(format_contexts(&contexts))
}

/// Render excerpts as `\n[ICMJE SOURCE: uri]\ntext\n` blocks.
pub fn format_contexts(contexts: &[PolicyContext]) -> String {
    if contexts.is_empty() {
        return NO_POLICY_FOUND.to_string();
    }
    contexts
        .iter()
        .map(|c| format!("\n[ICMJE SOURCE: {}]\n{}\n", c.source_uri, c.text))
        .collect()
}

// ── Corpus name ──────────────────────────────────────────────────────────────

/// The parts of a `projects/<p>/locations/<l>/ragCorpora/<id>` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRef {
    pub project: String,
    pub location: String,
    pub corpus_id: String,
}

impl CorpusRef {
    pub fn parse(name: &str) -> Result<Self, AgentError> {
        let parts: Vec<&str> = name.trim().trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "ragCorpora", id]
                if !project.is_empty() && !location.is_empty() && !id.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    corpus_id: id.to_string(),
                })
            }
            _ => Err(AgentError::RetrievalNotConfigured(format!(
                "expected projects/<project>/locations/<location>/ragCorpora/<id>, got '{}'",
                name
            ))),
        }
    }

    /// The full resource name.
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/ragCorpora/{}",
            self.project, self.location, self.corpus_id
        )
    }

    /// The regional `retrieveContexts` URL.
    pub fn endpoint(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}:retrieveContexts",
            loc = self.location,
            proj = self.project
        )
    }
}

// ── Vertex AI client ─────────────────────────────────────────────────────────

/// Retriever backed by the Vertex AI RAG Engine REST API.
pub struct VertexRagRetriever {
    corpus: CorpusRef,
    top_k: u32,
    vector_distance_threshold: f64,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl VertexRagRetriever {
    pub fn new(
        corpus: CorpusRef,
        top_k: u32,
        vector_distance_threshold: f64,
        timeout_secs: u64,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::RetrievalFailed(format!("HTTP client: {}", e)))?;
        Ok(Self {
            corpus,
            top_k,
            vector_distance_threshold,
            access_token: None,
            client,
        })
    }

    /// Build from the agent configuration, falling back to `RAG_CORPUS`.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let name = match &config.rag_corpus {
            Some(name) => name.clone(),
            None => std::env::var(CORPUS_ENV_VAR).map_err(|_| {
                AgentError::RetrievalNotConfigured(format!(
                    "set --rag-corpus or {}",
                    CORPUS_ENV_VAR
                ))
            })?,
        };
        Self::new(
            CorpusRef::parse(&name)?,
            config.retrieval_top_k,
            config.vector_distance_threshold,
            config.retrieval_timeout_secs,
        )
    }

    /// Use a fixed token instead of reading the environment.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn corpus(&self) -> &CorpusRef {
        &self.corpus
    }

    /// JSON body of a `retrieveContexts` request.
    pub fn request_body(&self, query: &str) -> serde_json::Value {
        serde_json::json!({
            "vertex_rag_store": {
                "rag_resources": [
                    { "rag_corpus": self.corpus.resource_name() }
                ]
            },
            "query": {
                "text": query,
                "rag_retrieval_config": {
                    "top_k": self.top_k,
                    "filter": {
                        "vector_distance_threshold": self.vector_distance_threshold
                    }
                }
            }
        })
    }

    fn token(&self) -> Result<String, AgentError> {
        if let Some(ref t) = self.access_token {
            return Ok(t.clone());
        }
        TOKEN_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| {
                AgentError::RetrievalNotConfigured(format!(
                    "no access token; set {} (e.g. from `gcloud auth print-access-token`)",
                    TOKEN_ENV_VARS[0]
                ))
            })
    }
}

#[async_trait]
impl PolicyRetriever for VertexRagRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<PolicyContext>, AgentError> {
        let token = self.token()?;
        let url = self.corpus.endpoint();
        debug!(corpus = %self.corpus.resource_name(), top_k = self.top_k, "Sending retrieveContexts");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| AgentError::RetrievalFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Retrieval endpoint returned error");
            return Err(AgentError::RetrievalFailed(format!("HTTP {}: {}", status, body)));
        }

        let body: RetrieveContextsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::RetrievalFailed(format!("unreadable response: {}", e)))?;
        Ok(body.into_contexts())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RetrieveContextsResponse {
    #[serde(default)]
    contexts: Option<ContextList>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextList {
    #[serde(default)]
    contexts: Vec<ApiContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiContext {
    #[serde(default)]
    source_uri: String,
    #[serde(default)]
    text: String,
}

impl RetrieveContextsResponse {
    fn into_contexts(self) -> Vec<PolicyContext> {
        self.contexts
            .map(|list| list.contexts)
            .unwrap_or_default()
            .into_iter()
            .map(|c| PolicyContext {
                source_uri: c.source_uri,
                text: c.text,
            })
            .collect()
    }
}
