use async_trait::async_trait;
use printpdf::*;
use tracing::debug;

use super::{DocumentError, DocumentLayout, DocumentRenderer, ITEM_COLUMNS};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 15.0;
const TOP_Y: f32 = 280.0;
const BOTTOM_Y: f32 = 20.0;
const ROW_H: f32 = 6.0;
// Column x-offsets from the left margin; the last entry is the table's right edge.
const COLUMN_X: [f32; 6] = [0.0, 30.0, 110.0, 135.0, 155.0, 180.0];

/// A4 renderer on built-in Helvetica. Runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, layout: DocumentLayout) -> Result<Vec<u8>, DocumentError> {
        tokio::task::spawn_blocking(move || render_pdf(&layout))
            .await
            .map_err(|e| DocumentError::Task(e.to_string()))?
    }
}

fn render_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, DocumentError> {
    let (doc, page1, layer1) = PdfDocument::new(&layout.title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| DocumentError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| DocumentError::Render(e.to_string()))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = TOP_Y;
    let mut pages = 1;

    let draw_text = |layer: &PdfLayerReference, x: f32, y: f32, size: f32, font: &IndirectFontRef, txt: &str| {
        layer.begin_text_section();
        layer.set_font(font, size);
        layer.set_text_cursor(Mm(x), Mm(y));
        layer.write_text(txt, font);
        layer.end_text_section();
    };

    let draw_rule = |layer: &PdfLayerReference, y: f32| {
        let line = Line::from_iter(vec![
            (Point::new(Mm(MARGIN_X), Mm(y)), false),
            (Point::new(Mm(MARGIN_X + COLUMN_X[5]), Mm(y)), false),
        ]);
        layer.add_line(line);
    };

    for (i, line) in layout.letterhead.iter().enumerate() {
        let (font, size) = if i == 0 { (&bold, 14.0) } else { (&regular, 10.0) };
        draw_text(&layer, MARGIN_X, y, size, font, line);
        y -= ROW_H;
    }
    y -= 4.0;

    draw_text(&layer, MARGIN_X, y, 12.0, &bold, &layout.title);
    y -= ROW_H + 1.0;
    for line in &layout.details {
        draw_text(&layer, MARGIN_X, y, 10.0, &regular, line);
        y -= ROW_H;
    }
    y -= 4.0;

    let draw_header = |layer: &PdfLayerReference, y: f32| {
        for (col, title) in ITEM_COLUMNS.iter().enumerate() {
            draw_text(layer, MARGIN_X + COLUMN_X[col] + 1.0, y, 10.0, &bold, title);
        }
        draw_rule(layer, y - 2.0);
    };

    draw_header(&layer, y);
    y -= ROW_H + 1.0;

    for row in &layout.rows {
        if y < BOTTOM_Y {
            let (page, page_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Items");
            layer = doc.get_page(page).get_layer(page_layer);
            pages += 1;
            y = TOP_Y;
            draw_header(&layer, y);
            y -= ROW_H + 1.0;
        }
        let cells = [
            &row.code,
            &row.description,
            &row.price,
            &row.quantity,
            &row.credit,
        ];
        for (col, cell) in cells.iter().enumerate() {
            draw_text(&layer, MARGIN_X + COLUMN_X[col] + 1.0, y, 9.0, &regular, cell);
        }
        y -= ROW_H;
    }

    if y < BOTTOM_Y + 2.0 * ROW_H {
        let (page, page_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Totals");
        layer = doc.get_page(page).get_layer(page_layer);
        pages += 1;
        y = TOP_Y;
    }

    draw_rule(&layer, y + ROW_H - 2.0);
    draw_text(&layer, MARGIN_X + 1.0, y - 1.0, 11.0, &bold, &layout.total_label);
    draw_text(&layer, MARGIN_X + COLUMN_X[4] + 1.0, y - 1.0, 11.0, &bold, &layout.total);
    y -= ROW_H + 6.0;

    if let Some(notes) = &layout.notes {
        if y < BOTTOM_Y + 2.0 * ROW_H {
            let (page, page_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Notes");
            layer = doc.get_page(page).get_layer(page_layer);
            pages += 1;
            y = TOP_Y;
        }
        draw_text(&layer, MARGIN_X, y, 11.0, &bold, "Additional Notes / Follow-up:");
        y -= ROW_H;
        for line in notes.lines() {
            if y < BOTTOM_Y {
                let (page, page_layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Notes");
                layer = doc.get_page(page).get_layer(page_layer);
                pages += 1;
                y = TOP_Y;
            }
            draw_text(&layer, MARGIN_X, y, 10.0, &regular, line);
            y -= 5.0;
        }
    }

    debug!(file = %layout.file_name, rows = layout.rows.len(), pages, "document rendered");
    doc.save_to_bytes()
        .map_err(|e| DocumentError::Render(e.to_string()))
}
