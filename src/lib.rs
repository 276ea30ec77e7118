//! # icmje-agent
//!
//! Tool functions and a review session for an ICMJE manuscript compliance
//! agent.
//!
//! A language model reviews a manuscript against the ICMJE Recommendations.
//! This crate gives it the hands it needs: saving chat attachments, pulling
//! scientific figures out of a PDF, putting the figures back after their
//! captions and laying the reconstructed manuscript out as a PDF, plus a
//! lookup into the ICMJE policy corpus.
//!
//! ## Workspace
//!
//! ```text
//! workspace/
//!  ├─ inputs/         attachments saved from the chat
//!  ├─ temp_figures/   figure1.png, figure2.png, … (extracted or attached)
//!  └─ outputs/        reconstructed_<id>.pdf
//! ```
//!
//! ## Tools
//!
//! | Tool | What it does |
//! |------|--------------|
//! | `save_ui_file_to_local` | attachment → `inputs/` |
//! | `extract_images_from_local` | PDF images → vision classifier → `temp_figures/` |
//! | `save_attached_images_to_local` | attached images → `temp_figures/` |
//! | `reconstruct_and_generate_pdf` | text + figures → `outputs/*.pdf` |
//! | `search_icmje_policy` | Vertex AI RAG → policy excerpts |
//!
//! Every tool answers with a string (`SUCCESS: …` or `ERROR: …`); see
//! [`ToolRegistry`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use icmje_agent::{AgentConfig, ToolContext, ToolEnv, ToolRegistry, UserContent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::builder().workspace_root("./workspace").build()?;
//!     let tools = ToolRegistry::new(ToolEnv::from_config(&config)?);
//!
//!     let message = UserContent::from_paths(Some("Please review"), &["paper.pdf"])?;
//!     let ctx = ToolContext::new(Some(message));
//!
//!     let saved = tools
//!         .execute("save_ui_file_to_local", serde_json::json!({"filename": "paper.pdf"}), &ctx)
//!         .await;
//!     println!("{saved}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `icmje-agent` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod attachments;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod reconstruct;
pub mod retrieval;
pub mod review;
pub mod tools;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use attachments::{
    has_manual_images, is_pdf_uploaded, save_attached_images_to_local, save_ui_file_to_local,
    InlineData, Part, ToolContext, UserContent,
};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use error::AgentError;
pub use pipeline::classify::{FigureClassifier, VisionClassifier};
pub use pipeline::extract::extract_images_from_local;
pub use pipeline::figures::{inject_figure_tags, normalize_figures, sanitize_text_for_pdf};
pub use pipeline::pdf::generate_reconstructed_pdf_local;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconstruct::{reconstruct_and_generate_pdf, ReconstructionMode};
pub use retrieval::{search_icmje_policy, PolicyContext, PolicyRetriever, VertexRagRetriever};
pub use review::{ReviewSession, TurnOutput};
pub use tools::{AgentTool, ToolDefinition, ToolEnv, ToolRegistry};
pub use workspace::Workspace;
