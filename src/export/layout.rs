//! Fixed-page layout for the exported report package.
//!
//! Layout is computed independently of the PDF backend: it produces pages of
//! positioned items measured in millimetres from the top edge. The renderer
//! only translates coordinates and draws.

use serde::Serialize;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 20.0;

pub const TITLE_PT: f32 = 24.0;
pub const SUBTITLE_PT: f32 = 12.0;
pub const NOTE_PT: f32 = 10.0;
pub const HEADING_PT: f32 = 18.0;
pub const BODY_PT: f32 = 10.0;
pub const LINE_HEIGHT_MM: f32 = 5.0;

/// Courier advance width in em.
const MONO_ADVANCE_EM: f32 = 0.6;
const MM_PER_PT: f32 = 0.352_778;

pub const DOCUMENT_TITLE: &str = "Incident Report Package";

/// Body characters that fit between the margins.
pub fn chars_per_line() -> usize {
    let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    (usable / (MONO_ADVANCE_EM * BODY_PT * MM_PER_PT)).floor() as usize
}

/// Lowest baseline a body line may sit on.
pub fn bottom_limit_mm() -> f32 {
    PAGE_HEIGHT_MM - MARGIN_MM
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Item {
    /// Centered document title.
    Title(String),
    /// Centered secondary line (date).
    Subtitle(String),
    /// Left-aligned small print on the title page.
    Note(String),
    SectionHeading(String),
    /// Horizontal rule across the usable width.
    Rule,
    /// One monospaced body line.
    Line(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placed {
    /// Baseline distance from the top edge.
    pub y_mm: f32,
    pub item: Item,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Placed>,
}

impl Page {
    #[cfg(test)]
    fn lines(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|placed| match &placed.item {
            Item::Line(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

/// One format's sanitized text with its label.
#[derive(Debug, Clone)]
pub struct Section {
    pub label: String,
    pub body: String,
}

// ═══════════════════════════════════════════════════════════
// Layout
// ═══════════════════════════════════════════════════════════

struct Cursor {
    pages: Vec<Page>,
    y: f32,
}

impl Cursor {
    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = MARGIN_MM;
    }

    fn place(&mut self, item: Item) {
        if self.pages.is_empty() {
            self.new_page();
        }
        let y_mm = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.items.push(Placed { y_mm, item });
        }
    }

    fn advance(&mut self, mm: f32) {
        self.y += mm;
    }
}

/// Title page, then one section per entry starting on a fresh page.
pub fn layout(export_date: &str, sections: &[Section]) -> Document {
    let width = chars_per_line();
    let mut cursor = Cursor {
        pages: Vec::new(),
        y: MARGIN_MM,
    };

    cursor.new_page();
    cursor.place(Item::Title(DOCUMENT_TITLE.to_string()));
    cursor.advance(15.0);
    cursor.place(Item::Subtitle(export_date.to_string()));
    cursor.advance(15.0);
    cursor.place(Item::Note("Included reports:".to_string()));
    for section in sections {
        cursor.advance(LINE_HEIGHT_MM);
        cursor.place(Item::Note(format!("  - {}", section.label)));
    }

    for section in sections {
        cursor.new_page();
        cursor.place(Item::SectionHeading(section.label.clone()));
        cursor.advance(10.0);
        cursor.place(Item::Rule);
        cursor.advance(10.0);

        for line in section.body.split('\n').flat_map(|line| wrap_line(line, width)) {
            if cursor.y > bottom_limit_mm() {
                cursor.new_page();
            }
            if !line.is_empty() {
                cursor.place(Item::Line(line));
            }
            cursor.advance(LINE_HEIGHT_MM);
        }
    }

    Document {
        title: DOCUMENT_TITLE.to_string(),
        pages: cursor.pages,
    }
}

/// Break one line to at most `width` characters, preferring the last space in
/// range. Words longer than `width` are split. Interior spacing is preserved.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= width {
        return vec![line.to_string()];
    }

    let mut out = Vec::new();
    let mut rest: &[char] = &chars;
    while rest.len() > width {
        let window = &rest[..=width];
        match window.iter().rposition(|c| *c == ' ').filter(|pos| *pos > 0) {
            Some(space) => {
                out.push(rest[..space].iter().collect::<String>().trim_end().to_string());
                rest = &rest[space + 1..];
            }
            None => {
                out.push(rest[..width].iter().collect());
                rest = &rest[width..];
            }
        }
    }
    out.push(rest.iter().collect());
    out
}
