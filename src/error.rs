//! Error types for the icmje-agent library.
//!
//! The library API returns [`AgentError`] for every failure. Tool entry
//! points never let it escape: the registry turns each `Result` into a plain
//! string (`SUCCESS: …` / `ERROR: …`) because the model on the other side of
//! a tool call can only read text. See [`crate::tools::ToolRegistry`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the icmje-agent library.
#[derive(Debug, Error)]
pub enum AgentError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The PDF has not been saved to the inputs folder yet.
    #[error("File '{filename}' is not synchronised yet. Run 'save_ui_file_to_local' first.")]
    NotSynchronised { filename: String },

    /// The user message carries no content at all.
    #[error("No content found in the user message")]
    NoUserContent,

    /// No inline attachment matched (and there was nothing to fall back to).
    #[error("File '{filename}' was not found in the message")]
    AttachmentNotFound { filename: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// An embedded image could not be decoded or re-encoded.
    #[error("Image extraction failed on page {page}: {detail}")]
    ImageExtractionFailed { page: usize, detail: String },

    /// pdfium-render refused to build or save the output document.
    #[error("PDF generation failed: {0}")]
    PdfWriteFailed(String),

    /// Page rasterisation failed while preparing a manuscript for review.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// No RAG corpus was configured, or its resource name is malformed.
    #[error("Policy retrieval is not configured: {0}")]
    RetrievalNotConfigured(String),

    /// The retrieval endpoint failed or returned an unreadable body.
    #[error("Policy retrieval failed: {0}")]
    RetrievalFailed(String),

    // ── Tool errors ───────────────────────────────────────────────────────
    /// The host asked for a tool that is not registered.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Tool arguments did not match the declared schema.
    #[error("invalid arguments for '{tool}': {detail}")]
    InvalidToolArguments { tool: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, read or write a workspace file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory holding libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Shorthand for wrapping an `io::Error` with the path it concerns.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgentError::Io {
            path: path.into(),
            source,
        }
    }
}
