//! The three local directories tools use to hand files to each other.
//!
//! ```text
//! <root>/inputs/         PDFs saved from chat attachments
//! <root>/temp_figures/   figureN.png, extracted or attached
//! <root>/outputs/        reconstructed_xxxx.pdf
//! ```
//!
//! Nothing is cleaned up after a request; `temp_figures/` is only emptied
//! when a new extraction starts.

use crate::error::AgentError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const INPUT_DIR: &str = "inputs";
pub const FIGURE_DIR: &str = "temp_figures";
pub const OUTPUT_DIR: &str = "outputs";

/// Handle on the interchange directories under one root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    inputs: PathBuf,
    figures: PathBuf,
    outputs: PathBuf,
}

impl Workspace {
    /// Open the workspace at `root`, creating the three directories if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AgentError> {
        let root = root.as_ref().to_path_buf();
        let ws = Self {
            inputs: root.join(INPUT_DIR),
            figures: root.join(FIGURE_DIR),
            outputs: root.join(OUTPUT_DIR),
            root,
        };
        for dir in [&ws.inputs, &ws.figures, &ws.outputs] {
            std::fs::create_dir_all(dir).map_err(|e| AgentError::io(dir, e))?;
        }
        debug!("Workspace ready at {}", ws.root.display());
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inputs_dir(&self) -> &Path {
        &self.inputs
    }

    pub fn figures_dir(&self) -> &Path {
        &self.figures
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs
    }

    /// Path of a saved input file.
    pub fn input_path(&self, filename: &str) -> PathBuf {
        self.inputs.join(safe_file_name(filename))
    }

    /// Path of a figure image.
    pub fn figure_path(&self, name: &str) -> PathBuf {
        self.figures.join(safe_file_name(name))
    }

    /// Remove every file in `temp_figures/`.
    pub fn clear_figures(&self) -> Result<usize, AgentError> {
        let mut removed = 0;
        let entries =
            std::fs::read_dir(&self.figures).map_err(|e| AgentError::io(&self.figures, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| AgentError::io(&self.figures, e))?;
            let path = entry.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| AgentError::io(&path, e))?;
                removed += 1;
            }
        }
        debug!("Cleared {} old figure(s)", removed);
        Ok(removed)
    }

    /// File names in `temp_figures/`, sorted lexicographically.
    ///
    /// Lexicographic order means `figure10.png` sorts before `figure2.png`;
    /// tag injection numbers figures by this order.
    pub fn figure_names(&self) -> Result<Vec<String>, AgentError> {
        let entries =
            std::fs::read_dir(&self.figures).map_err(|e| AgentError::io(&self.figures, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AgentError::io(&self.figures, e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// A fresh output path: `outputs/reconstructed_<4 hex>.pdf`.
    pub fn next_output_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.outputs.join(format!("reconstructed_{}.pdf", &id[..4]))
    }
}

/// Reduce an attachment or figure name to its final path component.
///
/// Display names come from the chat client and the model; neither may
/// address a file outside the workspace directory they are joined to.
pub fn safe_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match last {
        "" | "." | ".." => "attachment".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_all_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path().join("ws")).unwrap();
        assert!(ws.inputs_dir().is_dir());
        assert!(ws.figures_dir().is_dir());
        assert!(ws.outputs_dir().is_dir());
        // idempotent
        Workspace::open(ws.root()).unwrap();
    }

    #[test]
    fn figure_names_are_sorted_and_clear_removes_them() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        for name in ["figure2.png", "figure10.png", "figure1.png"] {
            std::fs::write(ws.figure_path(name), b"x").unwrap();
        }
        assert_eq!(
            ws.figure_names().unwrap(),
            vec!["figure1.png", "figure10.png", "figure2.png"]
        );
        assert_eq!(ws.clear_figures().unwrap(), 3);
        assert!(ws.figure_names().unwrap().is_empty());
    }

    #[test]
    fn output_path_has_short_hex_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::open(tmp.path()).unwrap();
        let path = ws.next_output_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("reconstructed_"), "got {name}");
        assert!(name.ends_with(".pdf"));
        let id = &name["reconstructed_".len()..name.len() - 4];
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(path.parent().unwrap(), ws.outputs_dir());
    }

    #[test]
    fn safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("paper.pdf"), "paper.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\Users\\a\\paper.pdf"), "paper.pdf");
        assert_eq!(safe_file_name(".."), "attachment");
        assert_eq!(safe_file_name(""), "attachment");
    }
}
