use std::{fs::File, io::BufReader, path::Path};

use chrono::{DateTime, Local};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use thiserror::Error;

use crate::schema::ShoppingListEntry;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 8.0;
const TABLE_TOP: f32 = PAGE_HEIGHT - 45.0;
const TABLE_BOTTOM: f32 = 25.0;

const COLUMNS: [f32; 3] = [MARGIN, 130.0, 160.0];
const HEADERS: [&str; 3] = ["Ingredient", "Amount", "Unit"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to load font {path}: {source}")]
    Font {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to render document: {0}")]
    Pdf(#[from] printpdf::Error),
}

struct Writer {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl Writer {
    fn new(font_path: Option<&Path>) -> Result<Self, ExportError> {
        let (doc, page, layer) =
            PdfDocument::new("Shopping list", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");

        let font = match font_path {
            Some(path) => {
                let file = File::open(path).map_err(|source| ExportError::Font {
                    path: path.display().to_string(),
                    source,
                })?;
                doc.add_external_font(BufReader::new(file))?
            }
            None => doc.add_builtin_font(BuiltinFont::Helvetica)?,
        };
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            font,
            layer,
            y: TABLE_TOP,
            pages: 1,
        })
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.font);
    }

    fn rule(&self, y: f32) {
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
            ],
            is_closed: false,
        };
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(line);
    }

    fn header_row(&mut self) {
        for (x, header) in COLUMNS.iter().zip(HEADERS) {
            self.text(header, 12.0, *x, self.y);
        }
        self.rule(self.y - 2.0);
        self.y -= ROW_HEIGHT + 2.0;
    }

    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        self.header_row();
    }

    fn row(&mut self, entry: &ShoppingListEntry) {
        if self.y < TABLE_BOTTOM {
            self.new_page();
        }
        self.text(&entry.name, 11.0, COLUMNS[0], self.y);
        self.text(&entry.amount.to_string(), 11.0, COLUMNS[1], self.y);
        self.text(&entry.measurement_unit, 11.0, COLUMNS[2], self.y);
        self.y -= ROW_HEIGHT;
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        self.rule(TABLE_BOTTOM - 5.0);
        self.text("Foodgram", 9.0, MARGIN, TABLE_BOTTOM - 11.0);
        Ok(self.doc.save_to_bytes()?)
    }
}

/// Renders the aggregated shopping list as a PDF document.
pub fn render_shopping_list(
    first_name: &str,
    entries: &[ShoppingListEntry],
    generated_at: DateTime<Local>,
    font_path: Option<&Path>,
) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(font_path)?;

    writer.text(
        &format!("Shopping list for {first_name}"),
        18.0,
        MARGIN,
        PAGE_HEIGHT - MARGIN - 5.0,
    );
    writer.text(
        &format!("Generated {}", generated_at.format("%d.%m.%Y %H:%M")),
        10.0,
        MARGIN,
        PAGE_HEIGHT - MARGIN - 13.0,
    );

    writer.header_row();
    for entry in entries {
        writer.row(entry);
    }

    writer.finish()
}
