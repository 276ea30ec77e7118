//! The `reconstruct_and_generate_pdf` tool: reconstructed text → PDF.
//!
//! ```text
//! text + message
//!   │
//!   ├─ 1. Bootstrap  save attached images as temp_figures/figure<N>.png
//!   ├─ 2. Mode       Pdf (manuscript attached) or Manual (images only / none)
//!   ├─ 3. Captions   drop duplicate "Figure …" lines
//!   ├─ 4. Tags       Manual mode: place [[INSERT_IMAGE: …]] after captions
//!   └─ 5. Assemble   layout + pdfium → outputs/reconstructed_<id>.pdf
//! ```
//!
//! In Pdf mode the figures come from an earlier `extract_images_from_local`
//! call and the model is expected to have written the tags itself.

use crate::attachments::{has_manual_images, is_pdf_uploaded, save_attached_images_to_local, ToolContext};
use crate::error::AgentError;
use crate::pipeline::figures::{inject_figure_tags, normalize_figures};
use crate::pipeline::pdf::generate_reconstructed_pdf_local;
use crate::workspace::Workspace;
use std::path::Path;
use tracing::{debug, info};

/// Where the figures for a reconstruction come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionMode {
    /// A manuscript PDF is attached; figures were extracted from it.
    Pdf,
    /// No PDF; figures are the images attached to the message, if any.
    Manual,
}

impl ReconstructionMode {
    pub fn detect(ctx: &ToolContext) -> Self {
        if is_pdf_uploaded(ctx) {
            Self::Pdf
        } else {
            Self::Manual
        }
    }
}

/// Steps 1–4: everything before the PDF writer.
///
/// Returns the mode and the text that will be laid out.
pub fn prepare_reconstruction(
    content: &str,
    ctx: &ToolContext,
    ws: &Workspace,
) -> Result<(ReconstructionMode, String), AgentError> {
    if has_manual_images(ctx) {
        let status = save_attached_images_to_local(ctx, ws)?;
        debug!("Bootstrap: {}", status);
    }

    let mode = ReconstructionMode::detect(ctx);
    info!("Reconstruction mode: {:?}", mode);

    let mut text = normalize_figures(content);
    if mode == ReconstructionMode::Manual {
        let names = ws.figure_names()?;
        if !names.is_empty() {
            text = inject_figure_tags(&text, &names);
        }
    }

    Ok((mode, text))
}

/// Build `outputs/reconstructed_<id>.pdf` from reconstructed manuscript text.
pub async fn reconstruct_and_generate_pdf(
    content: &str,
    ctx: &ToolContext,
    ws: &Workspace,
    pdfium_lib_dir: Option<&Path>,
) -> Result<String, AgentError> {
    let (_, text) = prepare_reconstruction(content, ctx, ws)?;
    generate_reconstructed_pdf_local(&text, ws, pdfium_lib_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{InlineData, Part, UserContent, PDF_MIME};

    fn ctx(parts: Vec<Part>) -> ToolContext {
        ToolContext::new(Some(UserContent::new(parts)))
    }

    fn png() -> Part {
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::new(3, 3));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Part::InlineData(InlineData::new("scan.png", "image/png", buf))
    }

    fn pdf() -> Part {
        Part::InlineData(InlineData::new("paper.pdf", PDF_MIME, b"%PDF-1.7".to_vec()))
    }

    #[test]
    fn mode_follows_pdf_attachment() {
        assert_eq!(ReconstructionMode::detect(&ctx(vec![pdf()])), ReconstructionMode::Pdf);
        assert_eq!(ReconstructionMode::detect(&ctx(vec![png()])), ReconstructionMode::Manual);
        assert_eq!(ReconstructionMode::detect(&ToolContext::default()), ReconstructionMode::Manual);
    }

    #[test]
    fn manual_mode_saves_images_and_tags_captions() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let text = "Methods.\nFigure 1: Consort diagram.\nFigure 1: Consort diagram.\n\nResults.";

        let (mode, out) = prepare_reconstruction(text, &ctx(vec![png()]), &ws).unwrap();

        assert_eq!(mode, ReconstructionMode::Manual);
        assert!(ws.figure_path("figure1.png").exists());
        assert_eq!(
            out,
            "Methods.\nFigure 1: Consort diagram.\n\n[[INSERT_IMAGE: figure1.png]]\n\nResults."
        );
    }

    #[test]
    fn pdf_mode_leaves_tags_to_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        std::fs::write(ws.figure_path("figure1.png"), b"x").unwrap();
        let text = "Figure 1: Flow.\nFigure 1: Flow.";

        let (mode, out) = prepare_reconstruction(text, &ctx(vec![pdf()]), &ws).unwrap();

        assert_eq!(mode, ReconstructionMode::Pdf);
        assert_eq!(out, "Figure 1: Flow.");
    }

    #[test]
    fn manual_mode_without_figures_only_normalises() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let (_, out) = prepare_reconstruction("Plain text.", &ToolContext::default(), &ws).unwrap();
        assert_eq!(out, "Plain text.");
    }
}
