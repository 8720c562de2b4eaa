use crate::canvas::{Canvas, Document};
use crate::error::AlbumError;
use crate::font::FontTable;
use crate::model::{
    AlbumDocument, AlbumPage, Border, FormattedText, PageItem, RowAlign, RowStyle, Stamp,
    StampRow, StampStyle,
};
use crate::report::ReportSink;
use crate::types::{Margins, Pt, Rect, Size};

/// Gap between a stamp frame and the first text row below it, and between
/// the two text rows, in points.
const BELOW_TEXT_GAP_FIRST: f32 = 2.0;
const BELOW_TEXT_GAP_SECOND: f32 = 1.0;

/// Walk the parsed album page by page and record drawing commands. The
/// mandatory settings are checked up front; each missing one is reported
/// separately and nothing is rendered if any is absent.
pub fn generate(
    album: &AlbumDocument,
    fonts: &FontTable,
    sink: &mut dyn ReportSink,
) -> Result<Document, AlbumError> {
    let size = album.size();
    let margins_odd = album.margins(true);
    let margins_even = album.margins(false);
    let spacing = album.spacing();

    if size.is_none() {
        sink.error("Page size not defined.");
    }
    if margins_odd.is_none() {
        sink.error("Page margins not set.");
    }
    if spacing.is_none() {
        sink.error("Page spacing not set.");
    }
    let (Some(size), Some(margins_odd), Some(margins_even), Some(default_spacing)) =
        (size, margins_odd, margins_even, spacing)
    else {
        return Err(AlbumError::PageSetupIncomplete);
    };

    let engine = Engine {
        album,
        fonts,
        size,
        default_spacing,
    };

    let mut canvas = Canvas::new(size);
    for (index, page) in album.pages().iter().enumerate() {
        let odd = (index + 1) % 2 != 0;
        let margins = if odd { margins_odd } else { margins_even };
        engine.draw_page(&mut canvas, page, margins);
        canvas.show_page();
    }
    Ok(canvas.finish())
}

struct Engine<'a> {
    album: &'a AlbumDocument,
    fonts: &'a FontTable,
    size: Size,
    default_spacing: (Pt, Pt),
}

impl Engine<'_> {
    fn draw_page(&self, canvas: &mut Canvas, page: &AlbumPage, margins: Margins) {
        let (hspacing, vspacing) = page.spacing_override().unwrap_or(self.default_spacing);

        let mut ypos = self.draw_frame_and_title(canvas, margins, vspacing);
        let (xpos, draw_width) = self.horizontal_draw_area(margins, hspacing);

        for item in page.items() {
            // Items that start below the page bottom are dropped, without
            // a report and without spilling onto a new page.
            if !ypos.is_positive() {
                continue;
            }
            ypos = match item {
                PageItem::Text(text) => {
                    self.draw_text_item(canvas, text, xpos, ypos, draw_width, vspacing)
                }
                PageItem::Row(row) => {
                    self.draw_stamp_row(canvas, row, xpos, ypos, draw_width, hspacing, vspacing)
                }
            };
        }
    }

    /// Horizontal start and width of the item drawing area. Border inset
    /// terms apply only when a border was defined.
    fn horizontal_draw_area(&self, margins: Margins, hspacing: Pt) -> (Pt, Pt) {
        let (border_inset, inner_width) = match self.album.border() {
            Some(border) => (border.spacing, border.inner),
            None => (Pt::ZERO, Pt::ZERO),
        };
        let left = margins.left + border_inset + inner_width + hspacing;
        let right = self.size.width - margins.right - border_inset - inner_width - hspacing;
        (left, right - left)
    }

    fn border_rect(&self, margins: Margins, border: Border, inner: bool) -> Rect {
        if inner {
            Rect {
                x: margins.left + border.spacing,
                y: margins.bottom + border.spacing,
                width: self.size.width
                    - margins.left
                    - margins.right
                    - border.spacing * 2
                    - border.inner / 2,
                height: self.size.height
                    - margins.bottom
                    - margins.top
                    - border.spacing * 2
                    - border.inner / 2,
            }
        } else {
            Rect {
                x: margins.left,
                y: margins.bottom,
                width: self.size.width - margins.left - margins.right,
                height: self.size.height - margins.bottom - margins.top,
            }
        }
    }

    /// Borders and the album title. Returns the cursor for the first item.
    fn draw_frame_and_title(&self, canvas: &mut Canvas, margins: Margins, vspacing: Pt) -> Pt {
        if let Some(border) = self.album.border() {
            if border.outer.is_positive() {
                let rect = self.border_rect(margins, border, false);
                canvas.set_line_width(border.outer);
                canvas.stroke_rect(rect.x, rect.y, rect.width, rect.height);
            }
            if border.inner.is_positive() {
                let rect = self.border_rect(margins, border, true);
                canvas.set_line_width(border.inner);
                canvas.stroke_rect(rect.x, rect.y, rect.width, rect.height);
            }
        }

        let mut ypos = self.size.height - margins.top;

        if let Some(title) = self.album.title() {
            canvas.set_font(title.font, title.size);
            let centre =
                margins.left + (self.size.width - margins.left - margins.right) / 2;
            // The gap above the title always uses the album default, so the
            // title sits at the same height on every page regardless of
            // per-page spacing overrides.
            ypos -= self.default_spacing.1;
            for line in &title.lines {
                ypos -= title.size;
                let width = self.fonts.measure(title.font, title.size, line);
                canvas.draw_text(
                    centre - width / 2,
                    ypos,
                    self.fonts.encode(title.font, line),
                );
            }
            ypos -= vspacing;
        }

        ypos
    }

    fn draw_text_item(
        &self,
        canvas: &mut Canvas,
        text: &FormattedText,
        xpos: Pt,
        mut ypos: Pt,
        draw_width: Pt,
        vspacing: Pt,
    ) -> Pt {
        canvas.set_font(text.font, text.size);

        for line in &text.lines {
            ypos -= text.size;
            if text.centred {
                if ypos.is_positive() {
                    self.draw_centred_line(canvas, text, line, xpos, ypos, draw_width);
                }
            } else if ypos.is_positive() {
                ypos = self.draw_wrapped_line(canvas, text, line, xpos, ypos, draw_width);
            }
        }

        ypos - vspacing
    }

    /// Centred text is shrunk one trailing character at a time until it
    /// fits; if nothing is left, nothing is drawn.
    fn draw_centred_line(
        &self,
        canvas: &mut Canvas,
        text: &FormattedText,
        line: &str,
        xpos: Pt,
        ypos: Pt,
        draw_width: Pt,
    ) {
        let mut line = line.to_string();
        let mut width = self.fonts.measure(text.font, text.size, &line);
        while width > draw_width && !line.is_empty() {
            line.pop();
            width = self.fonts.measure(text.font, text.size, &line);
        }
        if width.is_positive() && !line.is_empty() {
            canvas.draw_text(
                xpos + (draw_width - width) / 2,
                ypos,
                self.fonts.encode(text.font, &line),
            );
        }
    }

    /// Word wrap: trim trailing characters until the piece fits, back up to
    /// the previous whitespace boundary, emit, and continue with the rest.
    /// A single word wider than the draw area is truncated mid-word rather
    /// than dropped.
    fn draw_wrapped_line(
        &self,
        canvas: &mut Canvas,
        text: &FormattedText,
        line: &str,
        xpos: Pt,
        mut ypos: Pt,
        draw_width: Pt,
    ) -> Pt {
        let mut remainder = line.to_string();

        while ypos.is_positive() && !remainder.is_empty() {
            let mut piece = remainder.clone();
            let mut width = self.fonts.measure(text.font, text.size, &piece);
            let mut shortened = false;
            while width > draw_width && !piece.is_empty() {
                piece.pop();
                width = self.fonts.measure(text.font, text.size, &piece);
                shortened = true;
            }

            if shortened {
                let fitted = piece.clone();
                while !piece.is_empty() && !piece.ends_with(|c: char| c.is_whitespace()) {
                    piece.pop();
                }
                if piece.is_empty() {
                    piece = fitted;
                }
            }

            canvas.draw_text(xpos, ypos, self.fonts.encode(text.font, &piece));

            if piece.len() < remainder.len() {
                remainder = remainder[piece.len()..].to_string();
                ypos -= text.size;
            } else {
                remainder.clear();
            }
            while remainder.starts_with(|c: char| c.is_whitespace()) {
                remainder.remove(0);
            }
        }

        ypos
    }

    fn draw_stamp_row(
        &self,
        canvas: &mut Canvas,
        row: &StampRow,
        xpos: Pt,
        ypos: Pt,
        draw_width: Pt,
        hspacing: Pt,
        vspacing: Pt,
    ) -> Pt {
        let count = row.stamps().len() as i32;
        let total_width: Pt = row.stamps().iter().map(|stamp| stamp.width).sum();

        let mut stamp_space = hspacing;
        let mut sxpos = xpos;

        if count < 2 {
            if row.style != RowStyle::Justify {
                sxpos = xpos + draw_width / 2 - total_width / 2;
            }
        } else {
            let mut treat_as_justify = false;

            if row.style == RowStyle::Equal {
                // The spacing margins either side of the draw area count as
                // extra slots for an equally spaced row.
                let left = xpos - hspacing;
                let right = xpos + draw_width + hspacing;
                let span = right - left;
                if total_width < span {
                    stamp_space = (span - total_width) / (count + 1);
                } else {
                    stamp_space = hspacing;
                }
                if stamp_space < hspacing {
                    treat_as_justify = true;
                } else {
                    sxpos = left + stamp_space;
                }
            }

            if row.style == RowStyle::Justify || treat_as_justify {
                sxpos = xpos;
                if total_width < draw_width {
                    stamp_space = (draw_width - total_width) / (count - 1);
                } else {
                    stamp_space = hspacing;
                }
            }

            if row.style == RowStyle::Fixed {
                stamp_space = row.spacing;
                let row_width = total_width + stamp_space * (count - 1);
                if row_width < draw_width {
                    sxpos = xpos + (draw_width - row_width) / 2;
                } else {
                    sxpos = xpos;
                }
            }
        }

        canvas.set_font(row.font, row.size);

        let mut row_height = Pt::ZERO;
        for stamp in row.stamps() {
            // Only stamps whose left edge is still on the page are drawn;
            // a skipped stamp also stops the cursor from advancing.
            if sxpos < xpos + self.size.width && ypos.is_positive() {
                let height = self.draw_stamp(canvas, row, stamp, sxpos, ypos);
                row_height = row_height.max(height);
                sxpos = sxpos + stamp.width + stamp_space;
            }
        }

        if row_height.is_positive() {
            ypos - row_height - vspacing
        } else {
            ypos
        }
    }

    /// Draw one stamp and its text slots; returns the consumed height
    /// including below-frame text and the vertical alignment offset.
    fn draw_stamp(&self, canvas: &mut Canvas, row: &StampRow, stamp: &Stamp, xpos: Pt, ypos: Pt) -> Pt {
        let voffset = match row.align {
            RowAlign::Top => Pt::ZERO,
            RowAlign::Middle => (row.max_stamp_height() - stamp.height) / 2,
            RowAlign::Bottom => row.max_stamp_height() - stamp.height,
        };
        let width = stamp.width;
        let height = stamp.height;
        let top = ypos - voffset;
        let bottom = ypos - height - voffset;

        canvas.set_line_width(row.line_width);

        match stamp.style {
            StampStyle::Blank | StampStyle::Block | StampStyle::BlockExtended => {
                canvas.stroke_rect(xpos, bottom, width, height);
            }
            StampStyle::Triangle => {
                canvas.stroke_line(xpos, bottom, xpos + width / 2, top);
                canvas.stroke_line(xpos + width / 2, top, xpos + width, bottom);
                canvas.stroke_line(xpos + width, bottom, xpos, bottom);
            }
            StampStyle::TriangleInverted => {
                canvas.stroke_line(xpos, top, xpos + width / 2, bottom);
                canvas.stroke_line(xpos + width / 2, bottom, xpos + width, top);
                canvas.stroke_line(xpos + width, top, xpos, top);
            }
            StampStyle::Diamond => {
                let middle = ypos - height / 2 - voffset;
                canvas.stroke_line(xpos + width / 2, top, xpos, middle);
                canvas.stroke_line(xpos, middle, xpos + width / 2, bottom);
                canvas.stroke_line(xpos + width / 2, bottom, xpos + width, middle);
                canvas.stroke_line(xpos + width, middle, xpos + width / 2, top);
            }
        }

        let mut stamp_height = height;
        let mut text_height = Pt::ZERO;

        if stamp.style != StampStyle::Blank {
            let inner_rows = (0..3).filter(|&i| !stamp.text(i).is_empty()).count() as i32;
            let mut text_y = ypos - (height - row.size * inner_rows) / 2 - row.size;
            for i in 0..3 {
                let line = stamp.text(i);
                if line.is_empty() {
                    continue;
                }
                let line_width = self.fonts.measure(row.font, row.size, line);
                canvas.draw_text(
                    xpos + (width - line_width) / 2,
                    text_y - voffset,
                    self.fonts.encode(row.font, line),
                );
                text_y -= row.size;
            }

            for i in 3..6 {
                let line = stamp.text(i);
                if line.is_empty() {
                    continue;
                }
                text_height = row.size + Pt::from_f32(BELOW_TEXT_GAP_FIRST);
                let line_width = self.fonts.measure(row.font, row.size, line);
                let text_x = match i {
                    3 => xpos,
                    4 => xpos + (width - line_width) / 2,
                    _ => xpos + width - line_width,
                };
                canvas.draw_text(
                    text_x,
                    ypos - stamp_height - text_height - voffset,
                    self.fonts.encode(row.font, line),
                );
            }

            stamp_height += text_height;
            text_height = Pt::ZERO;

            for i in 6..9 {
                let line = stamp.text(i);
                if line.is_empty() {
                    continue;
                }
                text_height = row.size + Pt::from_f32(BELOW_TEXT_GAP_SECOND);
                let line_width = self.fonts.measure(row.font, row.size, line);
                let text_x = match i {
                    6 => xpos,
                    7 => xpos + (width - line_width) / 2,
                    _ => xpos + width - line_width,
                };
                canvas.draw_text(
                    text_x,
                    ypos - stamp_height - text_height - voffset,
                    self.fonts.encode(row.font, line),
                );
            }
        }

        stamp_height + text_height + voffset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::report::ReportLog;

    fn fonts() -> FontTable {
        FontTable::new(&[])
    }

    fn courier(fonts: &FontTable) -> crate::font::FontId {
        fonts.resolve("CN").expect("builtin courier")
    }

    /// Album with an exercised setup: A4, 20mm margins all around, spacing
    /// (5, 5) mm, no border.
    fn base_album() -> AlbumDocument {
        let mut album = AlbumDocument::new();
        album.set_page_size(210.0, 297.0);
        album.set_margins(20.0, 20.0, 20.0, 20.0, true);
        album.set_spacing(5.0, 5.0);
        album
    }

    fn texts(page: &crate::canvas::Page) -> Vec<(Pt, Pt, String)> {
        page.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawText { x, y, bytes } => Some((
                    *x,
                    *y,
                    bytes.iter().map(|&b| b as char).collect::<String>(),
                )),
                _ => None,
            })
            .collect()
    }

    fn rects(page: &crate::canvas::Page) -> Vec<(Pt, Pt, Pt, Pt)> {
        page.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::StrokeRect {
                    x,
                    y,
                    width,
                    height,
                } => Some((*x, *y, *width, *height)),
                _ => None,
            })
            .collect()
    }

    fn assert_close(a: Pt, b: Pt) {
        let delta = (a.to_milli_i64() - b.to_milli_i64()).abs();
        assert!(delta <= 2, "expected {:?} ~ {:?}", a, b);
    }

    #[test]
    fn missing_settings_are_each_reported_and_abort() {
        let mut album = AlbumDocument::new();
        album.set_page_size(210.0, 297.0);
        let fonts = fonts();
        let mut log = ReportLog::new();
        let result = generate(&album, &fonts, &mut log);
        assert!(matches!(result, Err(AlbumError::PageSetupIncomplete)));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].message(), "Page margins not set.");
        assert_eq!(log.entries()[1].message(), "Page spacing not set.");
    }

    #[test]
    fn page_count_matches_started_pages() {
        let mut album = base_album();
        album.start_page(None);
        album.start_page(None);
        album.start_page(None);
        let fonts = fonts();
        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        assert_eq!(doc.pages.len(), 3);
    }

    #[test]
    fn even_page_margins_shift_the_draw_area() {
        let mut album = base_album();
        album.set_margins(30.0, 10.0, 20.0, 20.0, false);
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.add_page_text(font, Pt::from_f32(10.0), "x", false);
        album.start_page(None);
        album.add_page_text(font, Pt::from_f32(10.0), "x", false);

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let odd_x = texts(&doc.pages[0])[0].0;
        let even_x = texts(&doc.pages[1])[0].0;
        // Odd pages keep the 20mm left margin, even pages get 30mm.
        assert_close(even_x - odd_x, Pt::from_mm(10.0));
    }

    #[test]
    fn title_row_is_fixed_even_under_page_spacing_overrides() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.set_title(font, Pt::from_f32(14.0), "My Album");
        album.start_page(None);
        album.start_page(Some((5.0, 40.0)));

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let first = &texts(&doc.pages[0])[0];
        let second = &texts(&doc.pages[1])[0];
        assert_eq!(first.1, second.1);
        assert_eq!(first.2, "My Album");
    }

    #[test]
    fn centred_text_shrinks_to_fit_and_vanishes_at_zero_width() {
        let mut album = base_album();
        // 210mm wide, margins 100mm each side, 5mm spacing: draw width 0.
        album.set_margins(100.0, 100.0, 20.0, 20.0, true);
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.add_page_text(font, Pt::from_f32(10.0), "invisible", true);

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        assert!(texts(&doc.pages[0]).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn word_wrap_breaks_at_whitespace_only() {
        let mut album = base_album();
        // Draw width: 210 - 2*95 - 2*5 = 10mm = 28.3pt -> 4 Courier chars at 10pt.
        album.set_margins(95.0, 95.0, 20.0, 20.0, true);
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.add_page_text(font, Pt::from_f32(10.0), "ab cd ef", false);

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let drawn = texts(&doc.pages[0]);
        let pieces: Vec<&str> = drawn.iter().map(|(_, _, s)| s.as_str()).collect();
        assert_eq!(pieces, vec!["ab ", "cd ", "ef"]);
        // Each line advances the cursor by the font size.
        assert_eq!(drawn[0].1 - drawn[1].1, Pt::from_f32(10.0));
        assert_eq!(drawn[1].1 - drawn[2].1, Pt::from_f32(10.0));
    }

    #[test]
    fn overlong_word_is_truncated_per_line_not_dropped() {
        let mut album = base_album();
        album.set_margins(95.0, 95.0, 20.0, 20.0, true);
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.add_page_text(
            font,
            Pt::from_f32(10.0),
            "supercalifragilisticexpialidocious",
            false,
        );

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let drawn = texts(&doc.pages[0]);
        // Four 10pt Courier chars fit into the 10mm draw area per line.
        assert!(drawn.len() > 1);
        assert_eq!(drawn[0].2, "supe");
        assert_eq!(drawn[1].2, "rcal");
        let joined: String = drawn.iter().map(|(_, _, s)| s.as_str()).collect();
        assert!("supercalifragilisticexpialidocious".starts_with(&joined));
    }

    #[test]
    fn fixed_row_centres_as_a_block() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Fixed, 5.0);
        album.add_stamp(StampStyle::Blank, 20.0, 20.0, Default::default());
        album.add_stamp(StampStyle::Blank, 20.0, 20.0, Default::default());

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let rects = rects(&doc.pages[0]);
        assert_eq!(rects.len(), 2);

        // Block of 20 + 5 + 20 mm centred inside the draw area.
        let xpos = Pt::from_mm(20.0) + Pt::from_mm(5.0);
        let draw_width = Pt::from_mm(210.0 - 2.0 * 20.0 - 2.0 * 5.0);
        let expected = xpos + (draw_width - Pt::from_mm(45.0)) / 2;
        assert_close(rects[0].0, expected);
        assert_close(rects[1].0 - (rects[0].0 + rects[0].2), Pt::from_mm(5.0));
    }

    #[test]
    fn equal_row_falls_back_to_justify_when_too_tight() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        // Draw width 160mm; span with margins 170mm; three 52mm stamps
        // leave 14mm over four gaps = 3.5mm < 5mm spacing, so justify.
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Equal, 0.0);
        for _ in 0..3 {
            album.add_stamp(StampStyle::Blank, 52.0, 20.0, Default::default());
        }

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let rects = rects(&doc.pages[0]);
        assert_eq!(rects.len(), 3);

        let xpos = Pt::from_mm(25.0);
        let draw_width = Pt::from_mm(160.0);
        // Justified: first stamp flush left, last stamp flush right.
        assert_close(rects[0].0, xpos);
        assert_close(rects[2].0 + rects[2].2, xpos + draw_width);
    }

    #[test]
    fn equal_row_with_room_distributes_evenly() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        // Two 40mm stamps in a 170mm span: 90mm over three gaps = 30mm.
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Equal, 0.0);
        album.add_stamp(StampStyle::Blank, 40.0, 20.0, Default::default());
        album.add_stamp(StampStyle::Blank, 40.0, 20.0, Default::default());

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let rects = rects(&doc.pages[0]);
        let gap = rects[1].0 - (rects[0].0 + rects[0].2);
        assert_close(gap, Pt::from_mm(30.0));
        assert_close(rects[0].0, Pt::from_mm(25.0) - Pt::from_mm(5.0) + Pt::from_mm(30.0));
    }

    #[test]
    fn single_stamp_is_centred_except_for_justify() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Equal, 0.0);
        album.add_stamp(StampStyle::Blank, 30.0, 20.0, Default::default());
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Justify, 0.0);
        album.add_stamp(StampStyle::Blank, 30.0, 20.0, Default::default());

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let rects = rects(&doc.pages[0]);
        let xpos = Pt::from_mm(25.0);
        let draw_width = Pt::from_mm(160.0);
        assert_close(rects[0].0, xpos + draw_width / 2 - Pt::from_mm(15.0));
        assert_close(rects[1].0, xpos);
    }

    #[test]
    fn row_alignment_offsets_shorter_stamps() {
        for (align, factor) in [(RowAlign::Top, 0), (RowAlign::Middle, 1), (RowAlign::Bottom, 2)] {
            let mut album = base_album();
            let fonts = fonts();
            let font = courier(&fonts);
            album.set_row_alignment(align);
            album.start_page(None);
            album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Fixed, 5.0);
            album.add_stamp(StampStyle::Blank, 20.0, 40.0, Default::default());
            album.add_stamp(StampStyle::Blank, 20.0, 20.0, Default::default());

            let mut log = ReportLog::new();
            let doc = generate(&album, &fonts, &mut log).expect("generates");
            let rects = rects(&doc.pages[0]);
            // The shorter stamp's top edge drops by half the height delta
            // per alignment step (0, 10mm, 20mm).
            let tall_top = rects[0].1 + rects[0].3;
            let short_top = rects[1].1 + rects[1].3;
            assert_close(tall_top - short_top, Pt::from_mm(10.0) * factor);
        }
    }

    #[test]
    fn items_below_the_page_bottom_are_silently_skipped() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        // 98mm-tall rows: the first three still start above the page
        // bottom, the fourth starts below it and is dropped.
        for _ in 0..4 {
            album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Fixed, 5.0);
            album.add_stamp(StampStyle::Blank, 40.0, 98.0, Default::default());
        }

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        assert_eq!(rects(&doc.pages[0]).len(), 3);
        assert!(log.is_empty());
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn stamp_text_slots_place_inside_and_below() {
        let mut album = base_album();
        let fonts = fonts();
        let font = courier(&fonts);
        album.start_page(None);
        album.start_row(font, Pt::from_f32(10.0), 0.5, RowStyle::Fixed, 5.0);
        let mut text: [String; 9] = Default::default();
        text[0] = "IN".to_string();
        text[3] = "L".to_string();
        text[5] = "R".to_string();
        text[7] = "C2".to_string();
        album.add_stamp(StampStyle::Block, 40.0, 30.0, text);

        let mut log = ReportLog::new();
        let doc = generate(&album, &fonts, &mut log).expect("generates");
        let drawn = texts(&doc.pages[0]);
        assert_eq!(drawn.len(), 4);
        let (rect_x, rect_y, rect_w, _) = rects(&doc.pages[0])[0];

        let inside = &drawn[0];
        assert_eq!(inside.2, "IN");
        assert!(inside.1 > rect_y);
        // Inside text is horizontally centred within the frame.
        assert_close(
            inside.0 - rect_x,
            (rect_x + rect_w) - (inside.0 + Pt::from_f32(12.0)),
        );

        let left = &drawn[1];
        assert_eq!(left.2, "L");
        assert_eq!(left.0, rect_x);
        assert!(left.1 < rect_y);

        let right = &drawn[2];
        assert_eq!(right.2, "R");
        assert_close(right.0, rect_x + rect_w - Pt::from_f32(6.0));

        // Second below-row sits under the first one.
        let second = &drawn[3];
        assert_eq!(second.2, "C2");
        assert!(second.1 < left.1);
    }
}
