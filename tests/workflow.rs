//! Offline integration tests: attachments, workspace and tool dispatch.
//!
//! Nothing here binds pdfium or calls a model; classifiers and retrievers
//! are stubs. PDF rendering is covered by `tests/e2e.rs`.

use async_trait::async_trait;
use icmje_agent::pipeline::layout::{layout_document, Placed};
use icmje_agent::pipeline::pdf::{figure_dimensions, prepare_runs};
use icmje_agent::reconstruct::{prepare_reconstruction, ReconstructionMode};
use icmje_agent::retrieval::PolicyContext;
use icmje_agent::{
    AgentError, FigureClassifier, InlineData, Part, PolicyRetriever, ToolContext, ToolEnv,
    ToolRegistry, UserContent, Workspace,
};
use std::sync::Arc;

// ── Stubs ────────────────────────────────────────────────────────────────────

struct KeepAll;

#[async_trait]
impl FigureClassifier for KeepAll {
    async fn is_scientific_figure(&self, _png: &[u8]) -> Result<bool, AgentError> {
        Ok(true)
    }
}

struct Offline;

#[async_trait]
impl PolicyRetriever for Offline {
    async fn retrieve(&self, _query: &str) -> Result<Vec<PolicyContext>, AgentError> {
        Err(AgentError::RetrievalFailed("HTTP 503: unavailable".into()))
    }
}

fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        4,
        3,
        image::Rgba([10, 20, 30, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn message(parts: Vec<Part>) -> ToolContext {
    ToolContext::new(Some(UserContent::new(parts)))
}

fn image_part(name: &str) -> Part {
    Part::InlineData(InlineData::new(name, "image/png", png_bytes()))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn attachments_from_disk_land_in_the_workspace() {
    let src = tempfile::tempdir().unwrap();
    let pdf = src.path().join("Manuscript Final.pdf");
    std::fs::write(&pdf, b"%PDF-1.7\n%%EOF").unwrap();
    let fig = src.path().join("consort.png");
    std::fs::write(&fig, png_bytes()).unwrap();

    let content = UserContent::from_paths(Some("review please"), &[&pdf, &fig]).unwrap();
    assert_eq!(content.text(), "review please");
    assert_eq!(content.attachments().count(), 2);

    let ws_dir = tempfile::tempdir().unwrap();
    let ws = Workspace::open(ws_dir.path()).unwrap();
    let ctx = ToolContext::new(Some(content));

    let saved = icmje_agent::save_ui_file_to_local("Manuscript Final.pdf", &ctx, &ws).unwrap();
    assert!(saved.contains("'Manuscript Final.pdf'"), "{saved}");
    assert!(ws.input_path("Manuscript Final.pdf").exists());

    // A partial name matches, and the file is stored under the requested name.
    icmje_agent::save_ui_file_to_local("Final.pdf", &ctx, &ws).unwrap();
    assert!(ws.input_path("Final.pdf").exists());

    let images = icmje_agent::save_attached_images_to_local(&ctx, &ws).unwrap();
    assert_eq!(images, "SUCCESS: 1 manual images saved.");
    assert_eq!(ws.figure_names().unwrap(), vec!["figure1.png"]);
}

#[test]
fn manual_reconstruction_places_every_attached_figure() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::open(dir.path()).unwrap();
    let ctx = message(vec![
        Part::Text("reconstruct".into()),
        image_part("a.png"),
        image_part("b.png"),
    ]);
    let text = "\
Title

Figure 1: Enrolment.
Participants screened and randomised.

Figure 2: Outcomes.

Discussion.";

    let (mode, out) = prepare_reconstruction(text, &ctx, &ws).unwrap();

    assert_eq!(mode, ReconstructionMode::Manual);
    let first = out.find("[[INSERT_IMAGE: figure1.png]]").expect("figure 1 tagged");
    let second = out.find("[[INSERT_IMAGE: figure2.png]]").expect("figure 2 tagged");
    assert!(out.find("Participants screened").unwrap() < first);
    assert!(first < out.find("Figure 2: Outcomes.").unwrap());
    assert!(second < out.find("Discussion.").unwrap());
}

#[test]
fn jpeg_attachments_reach_the_page_layout() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::open(dir.path()).unwrap();
    let jpeg = {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            40,
            20,
            image::Rgb([200, 80, 30]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    };
    let ctx = message(vec![
        Part::Text("reconstruct".into()),
        Part::InlineData(InlineData::new("chart.jpg", "image/jpeg", jpeg)),
    ]);

    let (_, text) = prepare_reconstruction("Figure 1: A chart.\n\nEnd.", &ctx, &ws).unwrap();
    assert!(text.contains("[[INSERT_IMAGE: figure1.png]]"), "{text}");

    let runs = prepare_runs(&text);
    let layout = layout_document(&runs, |name| figure_dimensions(&ws.figure_path(name)));

    assert!(layout.missing_images.is_empty(), "{:?}", layout.missing_images);
    let placed = layout
        .pages
        .iter()
        .flat_map(|p| &p.items)
        .filter(|item| matches!(item, Placed::Image { name, .. } if name == "figure1.png"))
        .count();
    assert_eq!(placed, 1);
}

#[test]
fn tool_calls_always_return_text() {
    let dir = tempfile::tempdir().unwrap();
    let env = ToolEnv::new(Workspace::open(dir.path()).unwrap())
        .with_classifier(Arc::new(KeepAll))
        .with_retriever(Arc::new(Offline));
    let registry = ToolRegistry::new(env);
    let ctx = message(vec![image_part("fig.png")]);

    let out = tokio_test::block_on(registry.execute(
        "search_icmje_policy",
        serde_json::json!({"query": "conflicts of interest"}),
        &ctx,
    ));
    assert_eq!(out, "ERROR: Policy retrieval failed: HTTP 503: unavailable");

    let out = tokio_test::block_on(registry.execute(
        "save_attached_images_to_local",
        serde_json::json!({}),
        &ctx,
    ));
    assert_eq!(out, "SUCCESS: 1 manual images saved.");

    let out = tokio_test::block_on(registry.execute(
        "save_ui_file_to_local",
        serde_json::json!({"filename": "missing.pdf"}),
        &ToolContext::default(),
    ));
    assert_eq!(out, "ERROR: No content found in the user message");
}

#[tokio::test]
async fn extraction_refuses_files_that_are_not_pdfs() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::open(dir.path()).unwrap();
    std::fs::write(ws.input_path("notes.pdf"), b"just text").unwrap();

    let err = icmje_agent::extract_images_from_local("notes.pdf", &ws, &KeepAll, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::NotAPdf { .. }), "{err}");
}

#[test]
fn tool_definitions_serialise_for_a_host() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::new(ToolEnv::new(Workspace::open(dir.path()).unwrap()));
    let json = serde_json::to_value(registry.definitions()).unwrap();
    let tools = json.as_array().unwrap();
    assert_eq!(tools.len(), 5);
    let extract = tools
        .iter()
        .find(|t| t["name"] == "extract_images_from_local")
        .unwrap();
    assert_eq!(extract["parameters"]["required"][0], "filename");
}
