//! Paginated ECG documents on A4 landscape pages.

use super::ExportError;
use crate::plot::{decimate_points, Color, Figure, Series};
use crate::signal::EcgSignal;
use printpdf::{
    BuiltinFont, Color as PdfColor, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference,
    Point, Rgb,
};
use std::{fs::File, io::BufWriter, path::Path};

const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN: f32 = 15.0;
/// Paper speed (mm per second) and gain (mm per mV).
const MM_PER_S: f32 = 25.0;
const MM_PER_MV: f32 = 10.0;
const LEADS_PER_PAGE: usize = 6;
const GRID_COLOR: Color = Color(0xF4B6B6);
const INK: Color = Color(0x000000);

/// Extra page appended after the leads: analysis panels plus text notes.
pub struct AnalysisPage<'a> {
    pub title: String,
    pub panels: &'a [Figure],
    pub notes: Vec<String>,
}

/// Write `signal` as a PDF with `leads` printed in order, six strips per page.
/// `number` is the 1-based index of the signal in its batch.
pub fn write_signal_pdf(
    signal: &EcgSignal,
    leads: &[&str],
    path: &Path,
    number: usize,
    analysis: Option<&AnalysisPage<'_>>,
) -> Result<(), ExportError> {
    if let Some(missing) = leads.iter().find(|name| signal.lead_index(name).is_none()) {
        return Err(ExportError::MissingLead(missing.to_string()));
    }
    let title = format!("ECG-{number}");
    let (doc, first_page, first_layer) =
        PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "Leads 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    let chunks: Vec<&[&str]> = leads.chunks(LEADS_PER_PAGE).collect();
    let pages = chunks.len() + usize::from(analysis.is_some());
    for (page_no, chunk) in chunks.iter().enumerate() {
        let layer = if page_no == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) =
                doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Leads {}", page_no + 1));
            doc.get_page(page).get_layer(layer)
        };
        let sheet = Sheet::new(layer, &font);
        sheet.header(
            &title,
            &format!(
                "{} - {} mm/sec, 1 mV/{} mm - {:.0} s @ {:.0} Hz",
                signal.ecg_type, MM_PER_S, MM_PER_MV, signal.duration(), signal.fs
            ),
            page_no + 1,
            pages,
        );
        for (row, name) in chunk.iter().enumerate() {
            sheet.lead_strip(signal, name, row);
        }
    }

    if let Some(page) = analysis {
        let (page_ref, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Analysis");
        let sheet = Sheet::new(doc.get_page(page_ref).get_layer(layer), &font);
        sheet.header(&page.title, "Lead I analysis", pages, pages);
        sheet.analysis(page);
    }

    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(())
}

struct Sheet<'a> {
    layer: PdfLayerReference,
    font: &'a IndirectFontRef,
}

impl<'a> Sheet<'a> {
    fn new(layer: PdfLayerReference, font: &'a IndirectFontRef) -> Self {
        Self { layer, font }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), self.font);
    }

    fn polyline(&self, points: &[(f32, f32)], color: Color, width: f32, closed: bool) {
        if points.len() < 2 {
            return;
        }
        let (r, g, b) = color.unit_rgb();
        self.layer
            .set_outline_color(PdfColor::Rgb(Rgb::new(r, g, b, None)));
        self.layer.set_outline_thickness(width);
        self.layer.add_line(Line {
            points: points
                .iter()
                .map(|(x, y)| (Point::new(Mm(*x), Mm(*y)), false))
                .collect(),
            is_closed: closed,
        });
    }

    fn header(&self, title: &str, subtitle: &str, page: usize, pages: usize) {
        self.text(title, 16.0, MARGIN, PAGE_H - MARGIN);
        self.text(subtitle, 9.0, MARGIN, PAGE_H - MARGIN - 6.0);
        self.text(
            &format!("Page {page} of {pages}"),
            8.0,
            PAGE_W - MARGIN - 22.0,
            PAGE_H - MARGIN,
        );
    }

    /// One lead on a 5 mm grid, left-aligned at the margin.
    fn lead_strip(&self, signal: &EcgSignal, name: &str, row: usize) {
        let strip_h = (PAGE_H - 2.0 * MARGIN - 15.0) / LEADS_PER_PAGE as f32;
        let top = PAGE_H - MARGIN - 12.0 - row as f32 * strip_h;
        let bottom = top - strip_h;
        let baseline = bottom + strip_h / 2.0;
        let left = MARGIN + 12.0;
        let width = (signal.duration() as f32 * MM_PER_S).min(PAGE_W - MARGIN - left);

        let mut x = left;
        while x <= left + width + 0.01 {
            self.polyline(&[(x, bottom), (x, top)], GRID_COLOR, 0.1, false);
            x += 5.0;
        }
        let mut y = bottom;
        while y <= top + 0.01 {
            self.polyline(&[(left, y), (left + width, y)], GRID_COLOR, 0.1, false);
            y += 5.0;
        }
        self.text(name, 9.0, MARGIN, baseline);

        let Some(ts) = signal.lead_index(name).and_then(|idx| signal.lead_mv(idx)) else {
            return;
        };
        let raw: Vec<[f64; 2]> = ts
            .data
            .iter()
            .enumerate()
            .map(|(i, mv)| [i as f64 / ts.fs, *mv])
            .collect();
        let half = strip_h / 2.0;
        let trace: Vec<(f32, f32)> = decimate_points(&raw, 1500)
            .iter()
            .map(|p| {
                let px = left + p[0] as f32 * MM_PER_S;
                let py = baseline + (p[1] as f32 * MM_PER_MV).clamp(-half, half);
                (px, py)
            })
            .filter(|(px, _)| *px <= left + width)
            .collect();
        self.polyline(&trace, INK, 0.25, false);
    }

    fn analysis(&self, page: &AnalysisPage<'_>) {
        let notes_h = 8.0 + 5.0 * page.notes.len() as f32;
        let area_top = PAGE_H - MARGIN - 14.0;
        let area_bottom = MARGIN + notes_h;
        let count = page.panels.len().max(1) as f32;
        let panel_h = (area_top - area_bottom) / count;
        for (i, figure) in page.panels.iter().enumerate() {
            let top = area_top - i as f32 * panel_h;
            self.panel(figure, MARGIN + 10.0, top - panel_h + 6.0, PAGE_W - MARGIN, top);
        }
        for (i, note) in page.notes.iter().enumerate() {
            self.text(note, 9.0, MARGIN, MARGIN + notes_h - 6.0 - 5.0 * i as f32);
        }
    }

    fn panel(&self, figure: &Figure, x0: f32, y0: f32, x1: f32, y1: f32) {
        let plot_top = y1 - 6.0;
        if let Some(title) = &figure.title {
            self.text(title, 9.0, x0, y1 - 3.0);
        }
        self.polyline(
            &[(x0, y0), (x1, y0), (x1, plot_top), (x0, plot_top)],
            INK,
            0.2,
            true,
        );
        let (xmin, xmax, ymin, ymax) = figure.bounds();
        let project = |p: &[f64; 2]| {
            let fx = ((p[0] - xmin) / (xmax - xmin)) as f32;
            let fy = ((p[1] - ymin) / (ymax - ymin)) as f32;
            (x0 + fx * (x1 - x0), y0 + fy * (plot_top - y0))
        };
        if let Some(label) = &figure.y.label {
            self.text(&format!("{label} [{ymin:.1}, {ymax:.1}]"), 7.0, x0 - 10.0, y0 - 4.0);
        }
        for series in &figure.series {
            match series {
                Series::Line(line) => {
                    let pts: Vec<(f32, f32)> = line.points.iter().map(&project).collect();
                    self.polyline(&pts, line.style.color, 0.25, false);
                }
                Series::Markers(markers) => {
                    let r = 0.6;
                    for (px, py) in markers.points.iter().map(&project) {
                        let square = [
                            (px - r, py - r),
                            (px + r, py - r),
                            (px + r, py + r),
                            (px - r, py + r),
                        ];
                        self.polyline(&square, markers.color, 0.3, true);
                    }
                }
            }
        }
    }
}
