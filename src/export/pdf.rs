//! PDF rendering of a laid-out [`Document`] via `printpdf` builtin fonts.

use std::io::BufWriter;

use printpdf::*;

use super::layout::{
    Document, Item, Page, BODY_PT, HEADING_PT, MARGIN_MM, NOTE_PT, PAGE_HEIGHT_MM, PAGE_WIDTH_MM,
    SUBTITLE_PT, TITLE_PT,
};
use super::ExportError;

/// Approximate Helvetica advance width in em, for centering.
const HELVETICA_ADVANCE_EM: f32 = 0.55;
const MM_PER_PT: f32 = 0.352_778;

const NAVY: (f32, f32, f32) = (15.0 / 255.0, 52.0 / 255.0, 96.0 / 255.0);
const GREY: (f32, f32, f32) = (102.0 / 255.0, 102.0 / 255.0, 102.0 / 255.0);
const BODY_GREY: (f32, f32, f32) = (51.0 / 255.0, 51.0 / 255.0, 51.0 / 255.0);

struct Fonts {
    heading: IndirectFontRef,
    text: IndirectFontRef,
    body: IndirectFontRef,
}

/// Render every page and return the PDF bytes.
pub fn render(document: &Document) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        &document.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = Fonts {
        heading: builtin_font(&doc, BuiltinFont::HelveticaBold)?,
        text: builtin_font(&doc, BuiltinFont::Helvetica)?,
        body: builtin_font(&doc, BuiltinFont::Courier)?,
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_ref, layer_ref) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_ref).get_layer(layer_ref)
        };
        draw_page(&layer, page, &fonts);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Render(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Render(format!("PDF buffer error: {e}")))
}

fn builtin_font(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef, ExportError> {
    doc.add_builtin_font(font)
        .map_err(|e| ExportError::Render(format!("PDF font error: {e}")))
}

fn draw_page(layer: &PdfLayerReference, page: &Page, fonts: &Fonts) {
    for placed in &page.items {
        // Layout measures from the top edge; PDF from the bottom.
        let y = Mm(PAGE_HEIGHT_MM - placed.y_mm);
        match &placed.item {
            Item::Title(text) => {
                layer.set_fill_color(rgb(NAVY));
                layer.use_text(text, TITLE_PT, centered_x(text, TITLE_PT), y, &fonts.heading);
            }
            Item::Subtitle(text) => {
                layer.set_fill_color(rgb(GREY));
                layer.use_text(text, SUBTITLE_PT, centered_x(text, SUBTITLE_PT), y, &fonts.text);
            }
            Item::Note(text) => {
                layer.set_fill_color(rgb(GREY));
                layer.use_text(text, NOTE_PT, Mm(MARGIN_MM), y, &fonts.text);
            }
            Item::SectionHeading(text) => {
                layer.set_fill_color(rgb(NAVY));
                layer.use_text(text, HEADING_PT, Mm(MARGIN_MM), y, &fonts.heading);
            }
            Item::Rule => {
                layer.set_outline_color(rgb(NAVY));
                layer.set_outline_thickness(1.4);
                layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(MARGIN_MM), y), false),
                        (Point::new(Mm(PAGE_WIDTH_MM - MARGIN_MM), y), false),
                    ],
                    is_closed: false,
                });
            }
            Item::Line(text) => {
                layer.set_fill_color(rgb(BODY_GREY));
                layer.use_text(text, BODY_PT, Mm(MARGIN_MM), y, &fonts.body);
            }
        }
    }
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn centered_x(text: &str, size_pt: f32) -> Mm {
    let width = text.chars().count() as f32 * HELVETICA_ADVANCE_EM * size_pt * MM_PER_PT;
    Mm(((PAGE_WIDTH_MM - width) / 2.0).max(MARGIN_MM))
}
