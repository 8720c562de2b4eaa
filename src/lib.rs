mod canvas;
mod encoding;
mod error;
mod font;
mod layout;
mod model;
mod parse;
mod pdf;
mod report;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use encoding::CodePage;
pub use error::AlbumError;
pub use font::{FontId, FontTable, MAX_USER_FONTS};
pub use layout::generate;
pub use model::{
    AlbumDocument, AlbumPage, Border, FormattedText, PageItem, RowAlign, RowStyle, Stamp,
    StampRow, StampStyle,
};
pub use parse::Parser;
pub use pdf::document_to_pdf;
pub use report::{ReportEntry, ReportLog, ReportSink};
pub use types::{Margins, Pt, Rect, Size};

use std::path::{Path, PathBuf};

/// Album rendering engine: command text in, paginated PDF out. One engine
/// can render any number of albums; every render starts from a fresh
/// document and font table, so nothing leaks between runs.
pub struct AlbumPress {
    font_dirs: Vec<PathBuf>,
}

#[derive(Clone, Default)]
pub struct AlbumPressBuilder {
    font_dirs: Vec<PathBuf>,
}

impl AlbumPressBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to scan for TrueType files when the album defines
    /// its own fonts.
    pub fn font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn build(self) -> AlbumPress {
        AlbumPress {
            font_dirs: self.font_dirs,
        }
    }
}

impl AlbumPress {
    pub fn builder() -> AlbumPressBuilder {
        AlbumPressBuilder::new()
    }

    /// Parse the album source and render it to PDF bytes. Per-line problems
    /// go to the sink and their commands are skipped; the remaining document
    /// still renders. Only an incomplete page setup or a write failure
    /// aborts with an error, and then nothing is produced.
    pub fn render(&self, source: &str, sink: &mut dyn ReportSink) -> Result<Vec<u8>, AlbumError> {
        let mut album = AlbumDocument::new();
        let mut fonts = FontTable::new(&self.font_dirs);
        let clean = Parser::new(&mut album, &mut fonts, sink).parse(source);
        if !clean {
            log::debug!("album source parsed with reported errors");
        }
        let document = layout::generate(&album, &fonts, sink)?;
        pdf::document_to_pdf(&document, &fonts)
    }

    pub fn render_to_file(
        &self,
        source: &str,
        path: impl AsRef<Path>,
        sink: &mut dyn ReportSink,
    ) -> Result<(), AlbumError> {
        let bytes = self.render(source, sink)?;
        let path = path.as_ref();
        std::fs::write(path, &bytes).map_err(|err| {
            sink.error(&format!("Unable to write to file {}.", path.display()));
            AlbumError::Io(err)
        })?;
        Ok(())
    }
}
