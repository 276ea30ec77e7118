//! PDF assembly: manuscript text with figure tags → `outputs/*.pdf`.
//!
//! The text is split on figure tags, each text run is sanitised and forced
//! into Latin-1 (standard Helvetica has no other glyphs), the runs are laid
//! out by [`crate::pipeline::layout`], and the layout is replayed into a new
//! pdfium document on a blocking thread.

use crate::error::AgentError;
use crate::pipeline::bind_pdfium;
use crate::pipeline::figures::{sanitize_text_for_pdf, split_runs, to_latin1_lossy, Run};
use crate::pipeline::layout::{
    layout_document, DocumentLayout, Placed, FONT_SIZE, LINE_HEIGHT, PAGE_HEIGHT,
};
use crate::workspace::{safe_file_name, Workspace};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Render `content` to `outputs/reconstructed_<id>.pdf`.
///
/// Figures are read from `temp_figures/`; tags naming a file that does not
/// exist are skipped.
pub async fn generate_reconstructed_pdf_local(
    content: &str,
    ws: &Workspace,
    pdfium_lib_dir: Option<&Path>,
) -> Result<String, AgentError> {
    let runs = prepare_runs(content);
    let layout = layout_document(&runs, |name| figure_dimensions(&ws.figure_path(name)));
    for name in &layout.missing_images {
        warn!("Figure '{}' not found in {}, skipped", name, ws.figures_dir().display());
    }
    info!(
        "Laid out {} run(s) on {} page(s)",
        runs.len(),
        layout.pages.len()
    );

    let out_path = ws.next_output_path();
    let figures_dir = ws.figures_dir().to_path_buf();
    let lib_dir: Option<PathBuf> = pdfium_lib_dir.map(Path::to_path_buf);
    let target = out_path.clone();

    tokio::task::spawn_blocking(move || {
        write_pdf_blocking(&layout, &figures_dir, &target, lib_dir.as_deref())
    })
    .await
    .map_err(|e| AgentError::Internal(format!("PDF task panicked: {}", e)))??;

    info!("PDF written to {}", out_path.display());
    Ok(format!(
        "SUCCESS: PDF saved locally at: {}",
        out_path.display()
    ))
}

/// Pixel size of a figure file, format sniffed from its content.
pub fn figure_dimensions(path: &Path) -> Option<(u32, u32)> {
    image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .ok()?
        .into_dimensions()
        .ok()
}

fn read_figure(path: &Path) -> Result<image::DynamicImage, image::ImageError> {
    image::ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Split on figure tags and clean each text run for the PDF writer.
pub fn prepare_runs(content: &str) -> Vec<Run> {
    split_runs(content)
        .into_iter()
        .filter_map(|run| match run {
            Run::Text(text) => {
                let clean = to_latin1_lossy(&sanitize_text_for_pdf(&text));
                (!clean.is_empty()).then_some(Run::Text(clean))
            }
            image => Some(image),
        })
        .collect()
}

fn write_pdf_blocking(
    layout: &DocumentLayout,
    figures_dir: &Path,
    out_path: &Path,
    pdfium_lib_dir: Option<&Path>,
) -> Result<(), AgentError> {
    let pdfium = bind_pdfium(pdfium_lib_dir)?;
    let mut document = pdfium.create_new_pdf().map_err(pdf_error)?;
    let font = document.fonts_mut().helvetica();
    // Baseline sits mid-line, nudged down by 30% of the font size.
    let baseline_offset = 0.5 * LINE_HEIGHT + 0.3 * FONT_SIZE;

    for (page_idx, page_layout) in layout.pages.iter().enumerate() {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(pdf_error)?;

        for item in &page_layout.items {
            match item {
                Placed::Text { x, y, text } => {
                    page.objects_mut()
                        .create_text_object(
                            PdfPoints::new(*x),
                            PdfPoints::new(PAGE_HEIGHT - (y + baseline_offset)),
                            text,
                            font,
                            PdfPoints::new(FONT_SIZE),
                        )
                        .map_err(pdf_error)?;
                }
                Placed::Image {
                    name,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let path = figures_dir.join(safe_file_name(name));
                    let img = read_figure(&path).map_err(|e| {
                        AgentError::PdfWriteFailed(format!("cannot read {}: {}", path.display(), e))
                    })?;
                    page.objects_mut()
                        .create_image_object(
                            PdfPoints::new(*x),
                            PdfPoints::new(PAGE_HEIGHT - (y + height)),
                            &img,
                            Some(PdfPoints::new(*width)),
                            Some(PdfPoints::new(*height)),
                        )
                        .map_err(pdf_error)?;
                }
            }
        }
        debug!("Page {}: {} item(s)", page_idx + 1, page_layout.items.len());
    }

    document.save_to_file(out_path).map_err(pdf_error)?;
    Ok(())
}

fn pdf_error(e: PdfiumError) -> AgentError {
    AgentError::PdfWriteFailed(format!("{:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_runs_cleans_text_and_keeps_images() {
        let content = "Intro – text\u{00AD}\n\n\n\nMore[[INSERT_IMAGE: figure1.png]]\u{000C}\n";
        assert_eq!(
            prepare_runs(content),
            vec![
                Run::Text("Intro ? text\n\nMore".into()),
                Run::Image("figure1.png".into()),
            ]
        );
    }

    #[test]
    fn figure_dimensions_ignore_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure1.png");
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(40, 20));
        img.save_with_format(&path, image::ImageFormat::Jpeg).unwrap();

        assert_eq!(figure_dimensions(&path), Some((40, 20)));
        assert_eq!(read_figure(&path).unwrap().width(), 40);
        assert_eq!(figure_dimensions(&dir.path().join("figure2.png")), None);
    }

    #[test]
    fn prepare_runs_drops_runs_that_sanitise_to_nothing() {
        let content = "\u{2028}\u{2029}[[INSERT_IMAGE: figure1.png]]";
        assert_eq!(prepare_runs(content), vec![Run::Image("figure1.png".into())]);
    }
}
