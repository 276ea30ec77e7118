//! LLM provider resolution for the reviewer and the figure classifier.

use crate::config::AgentConfig;
use crate::error::AgentError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Environment pair that pins provider and model for every run.
pub const PROVIDER_ENV_VAR: &str = "EDGEQUAKE_LLM_PROVIDER";
pub const MODEL_ENV_VAR: &str = "EDGEQUAKE_MODEL";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AgentError> {
    debug!("Creating provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AgentError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider for `model`, from most to least specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. whatever [`ProviderFactory::from_env`] detects from API keys
fn resolve_for_model(config: &AgentConfig, model: &str) -> Result<Arc<dyn LLMProvider>, AgentError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var(PROVIDER_ENV_VAR),
        std::env::var(MODEL_ENV_VAR),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    // Gemini is the default model family; prefer it when its key is present.
    if std::env::var("GEMINI_API_KEY").map(|k| !k.is_empty()).unwrap_or(false) {
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AgentError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Provider for compliance review turns.
pub fn resolve_review_provider(config: &AgentConfig) -> Result<Arc<dyn LLMProvider>, AgentError> {
    resolve_for_model(config, config.review_model())
}

/// Provider for figure classification.
pub fn resolve_classifier_provider(
    config: &AgentConfig,
) -> Result<Arc<dyn LLMProvider>, AgentError> {
    resolve_for_model(config, config.classifier_model())
}
