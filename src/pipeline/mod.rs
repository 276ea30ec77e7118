//! Pipeline stages behind the agent's tools.
//!
//! Each submodule implements one step. The text stages are pure functions;
//! the pdfium stages run on `spawn_blocking` threads because pdfium is not
//! async-safe.
//!
//! ## Data Flow
//!
//! ```text
//! extraction:      input ──▶ extract (pdfium) ──▶ classify (VLM) ──▶ temp_figures/
//! reconstruction:  text ──▶ figures (regex) ──▶ layout ──▶ pdf (pdfium) ──▶ outputs/
//! review:          input ──▶ pages (pdfium) ──▶ encode ──▶ review model
//! ```
//!
//! 1. [`input`]    — load a path or URL as an attachment, validate PDF magic
//! 2. [`extract`]  — pull embedded images out of a saved PDF
//! 3. [`classify`] — one vision call per image: figure or publisher artefact
//! 4. [`figures`]  — caption de-duplication, tag injection, sanitising
//! 5. [`layout`]   — place text lines and images on A4 pages
//! 6. [`pdf`]      — replay a layout into a pdfium document and save it
//! 7. [`pages`]    — rasterise manuscript pages for the review model
//! 8. [`encode`]   — PNG + base64 for multimodal requests

pub mod classify;
pub mod encode;
pub mod extract;
pub mod figures;
pub mod input;
pub mod layout;
pub mod pages;
pub mod pdf;

use crate::error::AgentError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Bind to pdfium, either from `lib_dir` or from the system library path.
///
/// Called inside blocking tasks: each task owns its own `Pdfium` handle.
pub(crate) fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, AgentError> {
    let bindings = match lib_dir {
        Some(dir) => {
            let dir = dir.to_string_lossy().to_string();
            debug!("Binding pdfium from {}", dir);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AgentError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
