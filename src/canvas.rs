use crate::font::FontId;
use crate::types::{Pt, Size};

/// Drawing primitives handed to the output backend. Coordinates are PDF
/// native: origin at the bottom-left corner of the page, y growing upwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetLineWidth(Pt),
    SetFont {
        font: FontId,
        size: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    /// Text already encoded to the byte encoding of the current font.
    DrawText {
        x: Pt,
        y: Pt,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GraphicsState {
    line_width: Pt,
    font: Option<(FontId, Pt)>,
}

impl GraphicsState {
    fn fresh() -> Self {
        Self {
            line_width: Pt::from_f32(1.0),
            font: None,
        }
    }
}

/// Records commands for one page at a time. Redundant state changes are
/// dropped here so the emitted content streams stay small.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state: GraphicsState::fresh(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, font: FontId, size: Pt) {
        if self.state.font == Some((font, size)) {
            return;
        }
        self.state.font = Some((font, size));
        self.current.commands.push(Command::SetFont { font, size });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_line(&mut self, x0: Pt, y0: Pt, x1: Pt, y1: Pt) {
        self.current.commands.push(Command::MoveTo { x: x0, y: y0 });
        self.current.commands.push(Command::LineTo { x: x1, y: y1 });
        self.current.commands.push(Command::Stroke);
    }

    pub fn draw_text(&mut self, x: Pt, y: Pt, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.current.commands.push(Command::DrawText { x, y, bytes });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state = GraphicsState::fresh();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}
