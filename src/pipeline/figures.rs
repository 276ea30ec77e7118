//! Text transforms on a reconstructed manuscript before it is laid out.
//!
//! Figures travel through the text as placeholders:
//!
//! ```text
//! Figure 2: Kaplan–Meier survival by arm.
//!
//! [[INSERT_IMAGE: figure2.png]]
//! ```
//!
//! The rules here keep that convention intact: a caption never appears
//! twice, a tag is placed right after its caption block, and every tag ends
//! up alone in its own paragraph so the layout can split on it.

use once_cell::sync::Lazy;
use regex::Regex;

/// The literal prefix of a figure placeholder.
pub const TAG_PREFIX: &str = "[[INSERT_IMAGE:";

/// Build the placeholder for an image file name.
pub fn figure_tag(name: &str) -> String {
    format!("[[INSERT_IMAGE: {name}]]")
}

/// A piece of the manuscript: a block of text or a figure to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text(String),
    Image(String),
}

// ── Caption de-duplication ───────────────────────────────────────────────────

/// Drop repeated caption lines.
///
/// A line whose trimmed form starts with `Figure ` is removed when the exact
/// same line already appeared earlier. Everything else is kept verbatim.
pub fn normalize_figures(content: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut output = Vec::new();

    for line in content.lines() {
        if line.trim().starts_with("Figure ") {
            if seen.contains(&line) {
                continue;
            }
            seen.push(line);
        }
        output.push(line);
    }

    output.join("\n")
}

// ── Tag injection ────────────────────────────────────────────────────────────

static RE_CAPTION_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^figure \d:").unwrap());

/// Place one tag per figure file, after the caption that names it.
///
/// `names` is the sorted content of `temp_figures/`; the i-th name (from 1)
/// belongs to `Figure i:`. The caption block is the caption line plus the
/// non-empty lines that follow it, up to the next `Figure <digit>:` line.
/// A figure with no caption in the text is appended at the end. A tag that
/// already appears in the text is left alone.
pub fn inject_figure_tags(content: &str, names: &[String]) -> String {
    let mut content = content.to_string();

    for (i, name) in names.iter().enumerate() {
        let tag = figure_tag(name);
        if content.contains(&tag) {
            continue;
        }

        match find_caption_block(&content, i + 1) {
            Some(end) => content.insert_str(end, &format!("\n\n{tag}")),
            None => {
                content.push_str("\n\n");
                content.push_str(&tag);
                content.push('\n');
            }
        }
    }

    content
}

/// Byte offset just past the caption block of `Figure <number>:`, if any.
fn find_caption_block(content: &str, number: usize) -> Option<usize> {
    let caption = Regex::new(&format!(r"(?i)Figure {number}:[^\n]+")).ok()?;
    let first = caption.find(content)?;

    let mut end = first.end();
    while content[end..].starts_with('\n') {
        let line_start = end + 1;
        let line_end = content[line_start..]
            .find('\n')
            .map(|off| line_start + off)
            .unwrap_or(content.len());
        let line = &content[line_start..line_end];
        if line.is_empty() || RE_CAPTION_START.is_match(line) {
            break;
        }
        end = line_end;
    }

    Some(end)
}

// ── Sanitising ───────────────────────────────────────────────────────────────

/// Characters that break the PDF text writer or render as garbage.
const PDF_BREAKING_CHARS: [char; 4] = [
    '\u{000C}', // form feed
    '\u{00AD}', // soft hyphen
    '\u{2028}', // line separator
    '\u{2029}', // paragraph separator
];

static RE_TAG_WITH_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[\[INSERT_IMAGE:\s*(.*?)\]\]\s*").unwrap());

static RE_EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Prepare text for the PDF writer.
///
/// 1. Remove form feeds, soft hyphens and Unicode line/paragraph separators
/// 2. Put every figure tag in its own paragraph
/// 3. Collapse runs of 3+ newlines to a single blank line
/// 4. Trim
pub fn sanitize_text_for_pdf(content: &str) -> String {
    let s: String = content
        .chars()
        .filter(|c| !PDF_BREAKING_CHARS.contains(c))
        .collect();
    let s = RE_TAG_WITH_SPACE.replace_all(&s, "\n\n[[INSERT_IMAGE: ${1}]]\n\n");
    let s = RE_EXCESS_NEWLINES.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Replace every character outside Latin-1 with `?`.
///
/// The standard Helvetica font only covers Latin-1; anything else would be
/// written as mojibake.
pub fn to_latin1_lossy(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

// ── Splitting ────────────────────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[INSERT_IMAGE:.*?\]\]").unwrap());

/// Split content into text and image runs, in order.
///
/// Runs are trimmed and empty ones dropped. The image name is whatever sits
/// between the tag's colon and closing brackets, trimmed.
pub fn split_runs(content: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut last = 0;

    for m in RE_TAG.find_iter(content) {
        push_text(&mut runs, &content[last..m.start()]);
        let name = m
            .as_str()
            .trim_start_matches(TAG_PREFIX)
            .trim_end_matches("]]")
            .trim();
        if !name.is_empty() {
            runs.push(Run::Image(name.to_string()));
        }
        last = m.end();
    }
    push_text(&mut runs, &content[last..]);

    runs
}

fn push_text(runs: &mut Vec<Run>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        runs.push(Run::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_caption_lines_are_dropped() {
        let input = "Results\nFigure 1: Flow chart.\nText\nFigure 1: Flow chart.\nFigure 2: Survival.";
        assert_eq!(
            normalize_figures(input),
            "Results\nFigure 1: Flow chart.\nText\nFigure 2: Survival."
        );
    }

    #[test]
    fn caption_dedup_matches_exact_lines_only() {
        // Indented repeat is a different line, and non-caption repeats stay.
        let input = "Figure 1: A\n  Figure 1: A\nsame\nsame";
        assert_eq!(normalize_figures(input), input);
    }

    #[test]
    fn tag_goes_after_caption_block() {
        let input = "Intro text.\n\nFigure 1: Study flow.\nContinued caption line.\n\nDiscussion.";
        let out = inject_figure_tags(input, &names(&["figure1.png"]));
        assert_eq!(
            out,
            "Intro text.\n\nFigure 1: Study flow.\nContinued caption line.\n\n[[INSERT_IMAGE: figure1.png]]\n\nDiscussion."
        );
    }

    #[test]
    fn caption_block_stops_at_next_caption() {
        let input = "Figure 1: First.\nFigure 2: Second.";
        let out = inject_figure_tags(input, &names(&["figure1.png", "figure2.png"]));
        assert_eq!(
            out,
            "Figure 1: First.\n\n[[INSERT_IMAGE: figure1.png]]\nFigure 2: Second.\n\n[[INSERT_IMAGE: figure2.png]]"
        );
    }

    #[test]
    fn caption_match_is_case_insensitive() {
        let out = inject_figure_tags("FIGURE 1: loud caption", &names(&["figure1.png"]));
        assert_eq!(out, "FIGURE 1: loud caption\n\n[[INSERT_IMAGE: figure1.png]]");
    }

    #[test]
    fn uncaptioned_figure_is_appended() {
        let out = inject_figure_tags("No captions here.", &names(&["figure1.png"]));
        assert_eq!(out, "No captions here.\n\n[[INSERT_IMAGE: figure1.png]]\n");
    }

    #[test]
    fn figure_ten_does_not_claim_figure_one_caption() {
        let input = "Figure 10: Late figure.";
        let out = inject_figure_tags(input, &names(&["figure1.png"]));
        assert!(out.starts_with("Figure 10: Late figure.\n\n[[INSERT_IMAGE: figure1.png]]\n"));
    }

    #[test]
    fn existing_tag_is_not_duplicated() {
        let input = "Figure 1: Flow.\n\n[[INSERT_IMAGE: figure1.png]]\n\nMore.";
        let out = inject_figure_tags(input, &names(&["figure1.png"]));
        assert_eq!(out, input);
        assert_eq!(out.matches("[[INSERT_IMAGE: figure1.png]]").count(), 1);
    }

    #[test]
    fn tag_placed_elsewhere_is_neither_moved_nor_appended() {
        let input = "[[INSERT_IMAGE: figure1.png]]\n\nIntro.\n\nResults without captions.";
        let out = inject_figure_tags(input, &names(&["figure1.png"]));
        assert_eq!(out, input);
        assert_eq!(inject_figure_tags(&out, &names(&["figure1.png"])), input);
    }

    #[test]
    fn sanitize_strips_breaking_chars_and_isolates_tags() {
        let input = "co\u{00AD}operation\u{000C} text[[INSERT_IMAGE:figure1.png]]after\n\n\n\nend\u{2028}";
        let out = sanitize_text_for_pdf(input);
        assert_eq!(
            out,
            "cooperation text\n\n[[INSERT_IMAGE: figure1.png]]\n\nafter\n\nend"
        );
    }

    #[test]
    fn latin1_lossy_replaces_wide_chars() {
        assert_eq!(to_latin1_lossy("café – 5 µg ≥ 3"), "café ? 5 µg ? 3");
    }

    #[test]
    fn split_runs_alternates_text_and_images() {
        let input = "Intro\n\n[[INSERT_IMAGE: figure1.png]]\n\n  \n[[INSERT_IMAGE:figure2.png ]]Tail";
        assert_eq!(
            split_runs(input),
            vec![
                Run::Text("Intro".into()),
                Run::Image("figure1.png".into()),
                Run::Image("figure2.png".into()),
                Run::Text("Tail".into()),
            ]
        );
    }

    #[test]
    fn split_runs_on_plain_text() {
        assert_eq!(split_runs("  only text  "), vec![Run::Text("only text".into())]);
        assert!(split_runs("   ").is_empty());
    }
}
