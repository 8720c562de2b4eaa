use crate::font::FontId;
use crate::types::{Margins, Pt, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    /// Equal gaps either side of every stamp, margins included.
    Equal,
    /// First stamp flush left, last stamp flush right.
    Justify,
    /// Constant configured gap, row centred as a block.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampStyle {
    Blank,
    Block,
    BlockExtended,
    Triangle,
    TriangleInverted,
    Diamond,
}

/// Multi-line text with its font binding. Escape sequences have been
/// substituted and `\n` split into lines by the time this exists.
#[derive(Debug, Clone)]
pub struct FormattedText {
    pub font: FontId,
    pub size: Pt,
    pub centred: bool,
    pub lines: Vec<String>,
}

impl FormattedText {
    pub fn new(font: FontId, size: Pt, text: &str, centred: bool) -> Self {
        Self {
            font,
            size,
            centred,
            lines: split_escaped_lines(text),
        }
    }
}

/// Substitute escapes and split on `\n`. `\\` and `\"` keep the escaped
/// character, any other escaped character is kept bare, a trailing lone
/// backslash is dropped. Trailing whitespace is stripped per line.
fn split_escaped_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            if c == 'n' {
                while buf.ends_with(|c: char| c.is_whitespace()) {
                    buf.pop();
                }
                lines.push(std::mem::take(&mut buf));
            } else {
                buf.push(c);
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            buf.push(c);
        }
    }

    while buf.ends_with(|c: char| c.is_whitespace()) {
        buf.pop();
    }
    lines.push(buf);
    lines
}

/// Up to nine text slots: 0-2 inside the frame, 3-5 the first row below it
/// (left/centre/right), 6-8 the second row below (left/centre/right).
#[derive(Debug, Clone)]
pub struct Stamp {
    pub style: StampStyle,
    pub width: Pt,
    pub height: Pt,
    text: [String; 9],
}

impl Stamp {
    pub fn text(&self, index: usize) -> &str {
        self.text.get(index).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct StampRow {
    pub font: FontId,
    pub size: Pt,
    pub line_width: Pt,
    pub style: RowStyle,
    pub spacing: Pt,
    pub align: RowAlign,
    max_stamp_height: Pt,
    stamps: Vec<Stamp>,
}

impl StampRow {
    fn new(
        font: FontId,
        size: Pt,
        line_width_mm: f64,
        style: RowStyle,
        spacing_mm: f64,
        align: RowAlign,
    ) -> Self {
        Self {
            font,
            size,
            line_width: Pt::from_mm(line_width_mm),
            style,
            spacing: Pt::from_mm(spacing_mm),
            align,
            max_stamp_height: Pt::ZERO,
            stamps: Vec::new(),
        }
    }

    fn add_stamp(&mut self, style: StampStyle, width_mm: f64, height_mm: f64, text: [String; 9]) {
        let width = Pt::from_mm(width_mm);
        let height = Pt::from_mm(height_mm);
        self.max_stamp_height = self.max_stamp_height.max(height);
        self.stamps.push(Stamp {
            style,
            width,
            height,
            text,
        });
    }

    pub fn stamps(&self) -> &[Stamp] {
        &self.stamps
    }

    /// Height of the tallest stamp frame in the row, maintained on insert.
    pub fn max_stamp_height(&self) -> Pt {
        self.max_stamp_height
    }
}

#[derive(Debug, Clone)]
pub enum PageItem {
    Text(FormattedText),
    Row(StampRow),
}

#[derive(Debug, Clone, Default)]
pub struct AlbumPage {
    spacing_override: Option<(Pt, Pt)>,
    items: Vec<PageItem>,
    active_row: Option<usize>,
}

impl AlbumPage {
    pub fn spacing_override(&self) -> Option<(Pt, Pt)> {
        self.spacing_override
    }

    pub fn items(&self) -> &[PageItem] {
        &self.items
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Border {
    pub outer: Pt,
    pub inner: Pt,
    pub spacing: Pt,
}

/// Parsed album: page setup plus the ordered pages. Mutated only through the
/// builder operations below, then read by the layout engine.
#[derive(Debug, Default)]
pub struct AlbumDocument {
    size: Option<Size>,
    margins_odd: Option<Margins>,
    margins_even: Option<Margins>,
    border: Option<Border>,
    spacing: Option<(Pt, Pt)>,
    row_align: Option<RowAlign>,
    title: Option<FormattedText>,
    pages: Vec<AlbumPage>,
}

impl AlbumDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page_size(&mut self, width_mm: f64, height_mm: f64) {
        self.size = Some(Size::from_mm(width_mm, height_mm));
    }

    /// Odd margins are the defaults for both parities; even margins only
    /// diverge when set separately (and are clobbered by a later odd set).
    pub fn set_margins(&mut self, left: f64, right: f64, top: f64, bottom: f64, odd: bool) {
        let margins = Margins::from_mm(left, right, top, bottom);
        if odd {
            self.margins_odd = Some(margins);
            self.margins_even = Some(margins);
        } else {
            self.margins_even = Some(margins);
        }
    }

    pub fn set_border(&mut self, outer_mm: f64, inner_mm: f64, spacing_mm: f64) {
        self.border = Some(Border {
            outer: Pt::from_mm(outer_mm),
            inner: Pt::from_mm(inner_mm),
            spacing: Pt::from_mm(spacing_mm),
        });
    }

    pub fn set_spacing(&mut self, horizontal_mm: f64, vertical_mm: f64) {
        self.spacing = Some((Pt::from_mm(horizontal_mm), Pt::from_mm(vertical_mm)));
    }

    pub fn set_title(&mut self, font: FontId, size: Pt, text: &str) {
        self.title = Some(FormattedText::new(font, size, text, true));
    }

    pub fn set_row_alignment(&mut self, align: RowAlign) {
        self.row_align = Some(align);
    }

    pub fn has_page(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn has_row(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|page| page.active_row.is_some())
    }

    /// A new page always becomes the active one. The spacing override only
    /// takes effect when both values are non-negative.
    pub fn start_page(&mut self, spacing_override_mm: Option<(f64, f64)>) {
        let spacing_override = spacing_override_mm
            .filter(|(h, v)| *h >= 0.0 && *v >= 0.0)
            .map(|(h, v)| (Pt::from_mm(h), Pt::from_mm(v)));
        self.pages.push(AlbumPage {
            spacing_override,
            ..AlbumPage::default()
        });
    }

    pub fn add_page_text(&mut self, font: FontId, size: Pt, text: &str, centred: bool) {
        if let Some(page) = self.pages.last_mut() {
            page.items
                .push(PageItem::Text(FormattedText::new(font, size, text, centred)));
        }
    }

    pub fn start_row(
        &mut self,
        font: FontId,
        size: Pt,
        line_width_mm: f64,
        style: RowStyle,
        spacing_mm: f64,
    ) {
        let align = self.row_align.unwrap_or(RowAlign::Top);
        if let Some(page) = self.pages.last_mut() {
            page.items.push(PageItem::Row(StampRow::new(
                font,
                size,
                line_width_mm,
                style,
                spacing_mm,
                align,
            )));
            page.active_row = Some(page.items.len() - 1);
        }
    }

    pub fn add_stamp(&mut self, style: StampStyle, width_mm: f64, height_mm: f64, text: [String; 9]) {
        if let Some(page) = self.pages.last_mut() {
            if let Some(index) = page.active_row {
                if let Some(PageItem::Row(row)) = page.items.get_mut(index) {
                    row.add_stamp(style, width_mm, height_mm, text);
                }
            }
        }
    }

    pub fn size(&self) -> Option<Size> {
        self.size
    }

    pub fn margins(&self, odd: bool) -> Option<Margins> {
        if odd { self.margins_odd } else { self.margins_even }
    }

    pub fn margins_set(&self) -> bool {
        self.margins_odd.is_some()
    }

    pub fn border(&self) -> Option<Border> {
        self.border
    }

    pub fn spacing(&self) -> Option<(Pt, Pt)> {
        self.spacing
    }

    pub fn title(&self) -> Option<&FormattedText> {
        self.title.as_ref()
    }

    pub fn pages(&self) -> &[AlbumPage] {
        &self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font() -> FontId {
        FontId(0)
    }

    #[test]
    fn escaped_newlines_split_and_trim() {
        let text = FormattedText::new(font(), Pt::from_f32(10.0), "one  \\ntwo \\\\ \\\"q\\\"", false);
        assert_eq!(text.lines, vec!["one", "two \\ \"q\""]);
    }

    #[test]
    fn lone_trailing_backslash_is_dropped() {
        let text = FormattedText::new(font(), Pt::from_f32(10.0), "abc\\", false);
        assert_eq!(text.lines, vec!["abc"]);
    }

    #[test]
    fn even_margins_track_odd_until_overridden() {
        let mut album = AlbumDocument::new();
        album.set_margins(20.0, 15.0, 10.0, 10.0, true);
        assert_eq!(album.margins(false), album.margins(true));
        album.set_margins(15.0, 20.0, 10.0, 10.0, false);
        assert_ne!(album.margins(false), album.margins(true));
        // A later odd set clobbers the even override again.
        album.set_margins(20.0, 15.0, 10.0, 10.0, true);
        assert_eq!(album.margins(false), album.margins(true));
    }

    #[test]
    fn spacing_override_requires_both_values() {
        let mut album = AlbumDocument::new();
        album.start_page(Some((-1.0, 5.0)));
        album.start_page(Some((4.0, 5.0)));
        assert_eq!(album.pages()[0].spacing_override(), None);
        assert_eq!(
            album.pages()[1].spacing_override(),
            Some((Pt::from_mm(4.0), Pt::from_mm(5.0)))
        );
    }

    #[test]
    fn new_row_supersedes_previous_active_row() {
        let mut album = AlbumDocument::new();
        album.start_page(None);
        album.start_row(font(), Pt::from_f32(10.0), 0.2, RowStyle::Equal, 0.0);
        album.add_stamp(StampStyle::Block, 30.0, 40.0, Default::default());
        album.start_row(font(), Pt::from_f32(10.0), 0.2, RowStyle::Justify, 0.0);
        album.add_stamp(StampStyle::Block, 20.0, 25.0, Default::default());

        let items = album.pages()[0].items();
        assert_eq!(items.len(), 2);
        let (first, second) = match (&items[0], &items[1]) {
            (PageItem::Row(a), PageItem::Row(b)) => (a, b),
            _ => panic!("expected two rows"),
        };
        assert_eq!(first.stamps().len(), 1);
        assert_eq!(second.stamps().len(), 1);
        assert_eq!(second.max_stamp_height(), Pt::from_mm(25.0));
    }

    #[test]
    fn stamps_without_a_row_are_ignored() {
        let mut album = AlbumDocument::new();
        album.start_page(None);
        album.add_stamp(StampStyle::Block, 30.0, 40.0, Default::default());
        assert!(album.pages()[0].items().is_empty());
    }
}
