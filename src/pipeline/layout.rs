//! Page layout for the reconstructed manuscript.
//!
//! Pure geometry: given text and image runs, decide what goes on which A4
//! page and where. The pdfium writer in [`crate::pipeline::pdf`] only
//! replays the result, so everything about line breaking and page breaking
//! is testable without a PDF engine.
//!
//! Coordinates are PDF points measured from the **top-left** corner of the
//! page; the writer flips them to pdfium's bottom-left origin.

use crate::pipeline::figures::Run;

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 10.0 * MM;
/// Content may not extend below `PAGE_HEIGHT - BOTTOM_BREAK`.
pub const BOTTOM_BREAK: f32 = 20.0 * MM;
pub const FONT_SIZE: f32 = 11.0;
pub const LINE_HEIGHT: f32 = 7.0 * MM;
/// Horizontal padding inside the text cell, on each side.
pub const CELL_PADDING: f32 = 1.0 * MM;
const GAP_BEFORE_IMAGE: f32 = 5.0 * MM;
const GAP_AFTER_IMAGE: f32 = 10.0 * MM;

/// Width available between the left and right margins.
pub fn usable_width() -> f32 {
    PAGE_WIDTH - 2.0 * MARGIN
}

fn printable_height() -> f32 {
    PAGE_HEIGHT - MARGIN - BOTTOM_BREAK
}

/// Something placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    /// One line of text; `y` is the top of its line box.
    Text { x: f32, y: f32, text: String },
    /// A figure scaled to `width` × `height`; `y` is its top edge.
    Image {
        name: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub items: Vec<Placed>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
    /// Image runs that were dropped because the file does not exist.
    pub missing_images: Vec<String>,
}

/// Vertical cursor over a growing list of pages.
struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: MARGIN,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y + height > PAGE_HEIGHT - BOTTOM_BREAK && self.y > MARGIN {
            self.pages.push(PageLayout::default());
            self.y = MARGIN;
        }
    }

    fn place(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }
}

/// Lay out `runs` top to bottom across as many pages as needed.
///
/// `image_size` returns the pixel dimensions of a figure, or `None` when the
/// file is missing; missing figures are skipped and reported.
pub fn layout_document<F>(runs: &[Run], image_size: F) -> DocumentLayout
where
    F: Fn(&str) -> Option<(u32, u32)>,
{
    let mut cursor = Cursor::new();
    let mut missing_images = Vec::new();

    for run in runs {
        match run {
            Run::Text(text) => {
                let max_width = usable_width() - 2.0 * CELL_PADDING;
                for line in wrap_text(text, max_width, FONT_SIZE) {
                    cursor.ensure_room(LINE_HEIGHT);
                    if !line.is_empty() {
                        let y = cursor.y;
                        cursor.place(Placed::Text {
                            x: MARGIN + CELL_PADDING,
                            y,
                            text: line,
                        });
                    }
                    cursor.y += LINE_HEIGHT;
                }
            }
            Run::Image(name) => {
                let Some((px_w, px_h)) = image_size(name).filter(|(w, h)| *w > 0 && *h > 0)
                else {
                    missing_images.push(name.clone());
                    continue;
                };
                let (width, height) = fit_image(px_w, px_h);

                cursor.y += GAP_BEFORE_IMAGE;
                cursor.ensure_room(height);
                let y = cursor.y;
                cursor.place(Placed::Image {
                    name: name.clone(),
                    x: MARGIN,
                    y,
                    width,
                    height,
                });
                cursor.y += height + GAP_AFTER_IMAGE;
            }
        }
    }

    DocumentLayout {
        pages: cursor.pages,
        missing_images,
    }
}

/// Scale an image to the usable width, shrinking further if it would be
/// taller than a page's printable area.
fn fit_image(px_w: u32, px_h: u32) -> (f32, f32) {
    let aspect = px_h as f32 / px_w as f32;
    let width = usable_width();
    let height = width * aspect;
    if height > printable_height() {
        let height = printable_height();
        (height / aspect, height)
    } else {
        (width, height)
    }
}

// ── Line breaking ────────────────────────────────────────────────────────────

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :;<=>?@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [\]^_`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {|}~
];

/// Width of `text` in points at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(|c| char_width(c, font_size)).sum()
}

fn char_width(c: char, font_size: f32) -> f32 {
    let code = c as u32;
    let units = if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        556
    };
    units as f32 * font_size / 1000.0
}

/// Break `text` into lines no wider than `max_width`.
///
/// Newlines always break; a blank source line yields an empty output line.
/// Words are separated by single spaces; a word wider than a whole line is
/// split between characters.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let space = char_width(' ', font_size);
    let mut lines = Vec::new();

    for source_line in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0f32;

        for word in source_line.split_whitespace() {
            let word_width = text_width(word, font_size);

            if !current.is_empty() && current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }
            for c in word.chars() {
                let w = char_width(c, font_size);
                if !current.is_empty() && current_width + w > max_width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                current.push(c);
                current_width += w;
            }
        }

        lines.push(current);
    }

    lines
}
