//! The user's chat message as tools see it, and the tools that persist
//! its attachments to the workspace.
//!
//! A host chat UI delivers attachments inline with the message. Tools never
//! receive file paths from the model directly; they receive a
//! [`ToolContext`] holding the current [`UserContent`] and pick the parts
//! they need from it.

use crate::error::AgentError;
use crate::pipeline::encode::to_png_bytes;
use crate::workspace::{safe_file_name, Workspace};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

pub const PDF_MIME: &str = "application/pdf";

/// One attachment carried inline in a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    /// File name shown in the chat UI.
    pub display_name: String,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl InlineData {
    pub fn new(display_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            display_name: display_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME
    }
}

/// A single part of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

impl Part {
    pub fn inline_data(&self) -> Option<&InlineData> {
        match self {
            Part::InlineData(d) => Some(d),
            Part::Text(_) => None,
        }
    }
}

/// The parts of the user's current message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContent {
    pub parts: Vec<Part>,
}

impl UserContent {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Build a message from optional text plus local files.
    ///
    /// The mime type of each file is derived from its extension.
    pub fn from_paths<P: AsRef<Path>>(text: Option<&str>, paths: &[P]) -> Result<Self, AgentError> {
        let mut parts = Vec::with_capacity(paths.len() + 1);
        if let Some(text) = text {
            if !text.trim().is_empty() {
                parts.push(Part::Text(text.to_string()));
            }
        }
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(AgentError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let data = std::fs::read(path).map_err(|e| AgentError::io(path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            parts.push(Part::InlineData(InlineData::new(
                name,
                mime_type_for(path),
                data,
            )));
        }
        Ok(Self { parts })
    }

    /// Iterate over the inline attachments in message order.
    pub fn attachments(&self) -> impl Iterator<Item = &InlineData> {
        self.parts.iter().filter_map(Part::inline_data)
    }

    /// Concatenated text parts, separated by blank lines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// What a tool can see of the conversation when it is invoked.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub user_content: Option<UserContent>,
}

impl ToolContext {
    pub fn new(user_content: Option<UserContent>) -> Self {
        Self { user_content }
    }

    fn attachments(&self) -> impl Iterator<Item = &InlineData> {
        self.user_content
            .iter()
            .flat_map(|content| content.attachments())
    }
}

/// Guess a mime type from a file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MIME,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Save the attachment named `filename` into `inputs/`.
///
/// Matching is lenient because the model often passes a name that differs
/// slightly from the UI's display name: an exact match wins, then a display
/// name containing `filename`, then the first attachment of any kind (whose
/// own display name is adopted).
pub fn save_ui_file_to_local(
    filename: &str,
    ctx: &ToolContext,
    ws: &Workspace,
) -> Result<String, AgentError> {
    let content = match &ctx.user_content {
        Some(c) if !c.parts.is_empty() => c,
        _ => return Err(AgentError::NoUserContent),
    };

    let found = content
        .attachments()
        .find(|d| d.display_name == filename || d.display_name.contains(filename))
        .map(|d| (d, filename.to_string()))
        .or_else(|| {
            content
                .attachments()
                .next()
                .map(|d| (d, d.display_name.clone()))
        });

    let Some((data, name)) = found else {
        return Err(AgentError::AttachmentNotFound {
            filename: filename.to_string(),
        });
    };

    let name = safe_file_name(&name);
    let path = ws.input_path(&name);
    std::fs::write(&path, &data.data).map_err(|e| AgentError::io(&path, e))?;
    info!("Saved attachment '{}' ({} bytes)", name, data.data.len());

    Ok(format!(
        "SUCCESS: File '{}' saved locally at {}",
        name,
        path.display()
    ))
}

/// `true` when the message carries at least one image attachment.
pub fn has_manual_images(ctx: &ToolContext) -> bool {
    ctx.attachments().any(InlineData::is_image)
}

/// `true` when the message carries a PDF attachment.
pub fn is_pdf_uploaded(ctx: &ToolContext) -> bool {
    ctx.attachments().any(InlineData::is_pdf)
}

/// Save every image attachment as `temp_figures/figure<N>.png`, N from 1.
///
/// Attachments are decoded by content and re-encoded as PNG, so a JPEG or
/// WebP lands under its `.png` name as a real PNG. Bytes that do not decode
/// as an image are skipped and do not take a number. Existing files with
/// the same names are overwritten; other figures are left in place.
pub fn save_attached_images_to_local(
    ctx: &ToolContext,
    ws: &Workspace,
) -> Result<String, AgentError> {
    let content = match &ctx.user_content {
        Some(c) if !c.parts.is_empty() => c,
        _ => return Ok("No attached images found.".to_string()),
    };
    debug!("User content parts: {}", content.parts.len());

    let mut count = 0usize;
    for data in content.attachments().filter(|d| d.is_image()) {
        let img = match image::load_from_memory(&data.data) {
            Ok(img) => img,
            Err(e) => {
                warn!("Attachment '{}' is not a readable image, skipped: {}", data.display_name, e);
                continue;
            }
        };
        let png = to_png_bytes(&img).map_err(|e| {
            AgentError::Internal(format!("PNG encoding of '{}' failed: {}", data.display_name, e))
        })?;

        count += 1;
        let path = ws.figure_path(&format!("figure{count}.png"));
        std::fs::write(&path, &png).map_err(|e| AgentError::io(&path, e))?;
        debug!("Saved '{}' ({}) as {}", data.display_name, data.mime_type, path.display());
    }

    info!("Saved {} manual image(s)", count);
    Ok(format!("SUCCESS: {count} manual images saved."))
}

/// Serialise attachment bytes as base64 so a `UserContent` can travel as JSON.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
