//! Vision classification of embedded PDF images.
//!
//! Journal PDFs embed logos, banners, icons and licence badges next to the
//! real figures. One vision call per image sorts them apart. The call is a
//! single delegation: no retry, and a failure aborts the extraction.

use crate::error::AgentError;
use crate::pipeline::encode::png_image_data;
use crate::prompts::{FIGURE_LABEL, VISION_CLASSIFY_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::info;

/// Decides whether an image is a scientific figure worth keeping.
#[async_trait]
pub trait FigureClassifier: Send + Sync {
    /// `png` is the image encoded as PNG.
    async fn is_scientific_figure(&self, png: &[u8]) -> Result<bool, AgentError>;
}

/// [`FigureClassifier`] backed by a vision-capable LLM provider.
pub struct VisionClassifier {
    provider: Arc<dyn LLMProvider>,
}

impl VisionClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl FigureClassifier for VisionClassifier {
    async fn is_scientific_figure(&self, png: &[u8]) -> Result<bool, AgentError> {
        classify_image_with_vision(&self.provider, png).await
    }
}

/// Ask the vision model for a one-word verdict on `png`.
pub async fn classify_image_with_vision(
    provider: &Arc<dyn LLMProvider>,
    png: &[u8],
) -> Result<bool, AgentError> {
    let messages = vec![ChatMessage::user_with_images(
        VISION_CLASSIFY_PROMPT,
        vec![png_image_data(png)],
    )];
    let options = CompletionOptions {
        temperature: Some(0.0),
        ..Default::default()
    };

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| AgentError::LlmApiError {
            message: e.to_string(),
        })?;

    let verdict = parse_verdict(&response.content);
    info!("Vision result: {}", response.content.trim().to_uppercase());
    Ok(verdict)
}

/// Only an exact `SCIENTIFIC_FIGURE` (any case, surrounding whitespace
/// ignored) counts as a figure.
pub fn parse_verdict(reply: &str) -> bool {
    reply.trim().to_uppercase() == FIGURE_LABEL
}
