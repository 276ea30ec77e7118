//! A compliance review conversation.
//!
//! Each call to [`ReviewSession::turn`] is one delegation to the model:
//!
//! ```text
//! user message (text + attachments)
//!   │
//!   ├─ 1. Save   attached PDFs → inputs/
//!   ├─ 2. Pages  rasterise each PDF page (pdfium) → PNG ImageData
//!   ├─ 3. Policy retrieve ICMJE excerpts for the message text
//!   ├─ 4. Chat   system prompt + policy + history + this message → reply
//!   └─ 5. Record message and reply join the history
//! ```
//!
//! The model does not call tools from here. Follow-up actions (figure
//! extraction, PDF generation) are run by the host through
//! [`crate::tools::ToolRegistry`].

use crate::attachments::{save_ui_file_to_local, ToolContext};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::pipeline::encode::{encode_page, png_image_data};
use crate::pipeline::pages::render_pages;
use crate::prompts::{policy_context, ROOT_INSTRUCTION_PROMPT};
use crate::provider::resolve_review_provider;
use crate::retrieval::{search_icmje_policy, PolicyRetriever, VertexRagRetriever};
use crate::workspace::Workspace;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Query used for policy retrieval when the message has no text.
const DEFAULT_POLICY_QUERY: &str = "ICMJE manuscript requirements";

/// What one review turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub reply: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Page renders and images sent with this turn.
    pub images_sent: usize,
    /// Whether policy excerpts were included.
    pub policy_included: bool,
    pub duration_ms: u64,
}

/// Conversation state for a compliance review.
pub struct ReviewSession {
    config: AgentConfig,
    provider: Arc<dyn LLMProvider>,
    retriever: Option<Arc<dyn PolicyRetriever>>,
    workspace: Workspace,
    history: Vec<ChatMessage>,
    last_reply: Option<String>,
}

impl ReviewSession {
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn LLMProvider>,
        retriever: Option<Arc<dyn PolicyRetriever>>,
    ) -> Result<Self, AgentError> {
        let workspace = Workspace::open(&config.workspace_root)?;
        Ok(Self {
            config,
            provider,
            retriever,
            workspace,
            history: Vec::new(),
            last_reply: None,
        })
    }

    /// Resolve the provider and retriever from `config`.
    ///
    /// Retrieval is optional: without a corpus the reviewer runs on its
    /// instruction prompt alone.
    pub fn from_config(config: AgentConfig) -> Result<Self, AgentError> {
        let provider = resolve_review_provider(&config)?;
        let retriever: Option<Arc<dyn PolicyRetriever>> =
            match VertexRagRetriever::from_config(&config) {
                Ok(r) => Some(Arc::new(r)),
                Err(e) => {
                    warn!("Reviewing without policy retrieval: {}", e);
                    None
                }
            };
        Self::new(config, provider, retriever)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The model's most recent reply.
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// Run one review turn on the user's message.
    pub async fn turn(&mut self, ctx: &ToolContext) -> Result<TurnOutput, AgentError> {
        let start = Instant::now();
        let content = ctx.user_content.as_ref().ok_or(AgentError::NoUserContent)?;
        let text = content.text();
        if text.trim().is_empty() && content.attachments().next().is_none() {
            return Err(AgentError::NoUserContent);
        }

        let images = self.collect_images(ctx).await?;
        let policy = self.retrieve_policy(&text).await;

        let user_message = if images.is_empty() {
            ChatMessage::user(&text)
        } else {
            ChatMessage::user_with_images(&text, images.clone())
        };

        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(ROOT_INSTRUCTION_PROMPT);
        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.extend(self.history.iter().cloned());
        if let Some(ref excerpts) = policy {
            messages.push(ChatMessage::system(policy_context(excerpts)));
        }
        messages.push(user_message.clone());

        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| AgentError::LlmApiError {
                message: e.to_string(),
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Review turn: {} input tokens, {} output tokens, {}ms",
            response.prompt_tokens, response.completion_tokens, duration_ms
        );

        self.history.push(user_message);
        self.history.push(ChatMessage::assistant(&response.content));
        self.last_reply = Some(response.content.clone());

        Ok(TurnOutput {
            reply: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            images_sent: images.len(),
            policy_included: policy.is_some(),
            duration_ms,
        })
    }

    /// Save PDFs and turn every attachment into images for the model.
    async fn collect_images(&self, ctx: &ToolContext) -> Result<Vec<ImageData>, AgentError> {
        let mut images = Vec::new();
        let Some(content) = ctx.user_content.as_ref() else {
            return Ok(images);
        };

        for attachment in content.attachments() {
            if attachment.is_pdf() {
                let status = save_ui_file_to_local(&attachment.display_name, ctx, &self.workspace)?;
                debug!("{}", status);

                let pages = render_pages(
                    attachment.data.clone(),
                    self.config.max_rendered_pixels,
                    self.config.pdfium_lib_dir.as_deref(),
                )
                .await?;
                info!(
                    "Attached '{}' as {} page image(s)",
                    attachment.display_name,
                    pages.len()
                );
                for (page, img) in &pages {
                    let data = encode_page(img).map_err(|e| AgentError::RasterisationFailed {
                        page: *page,
                        detail: format!("Image encoding failed: {}", e),
                    })?;
                    images.push(data);
                }
            } else if attachment.is_image() {
                images.push(image_data_for(&attachment.mime_type, &attachment.data));
            } else {
                warn!(
                    "Attachment '{}' ({}) is not a PDF or image, not sent",
                    attachment.display_name, attachment.mime_type
                );
            }
        }

        Ok(images)
    }

    /// Policy excerpts for `text`, or `None` when retrieval is off or fails.
    async fn retrieve_policy(&self, text: &str) -> Option<String> {
        let retriever = self.retriever.as_deref()?;
        let query = if text.trim().is_empty() {
            DEFAULT_POLICY_QUERY
        } else {
            text
        };
        match search_icmje_policy(retriever, query).await {
            Ok(excerpts) => Some(excerpts),
            Err(e) => {
                warn!("Policy retrieval failed, continuing without it: {}", e);
                None
            }
        }
    }
}

/// Wrap an attached image in its own mime type; PNG goes through the shared
/// encoder so it gets the same detail hint as page renders.
fn image_data_for(mime_type: &str, bytes: &[u8]) -> ImageData {
    if mime_type == "image/png" {
        png_image_data(bytes)
    } else {
        ImageData::new(STANDARD.encode(bytes), mime_type).with_detail("high")
    }
}
