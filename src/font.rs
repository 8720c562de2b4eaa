use crate::encoding::CodePage;
use crate::types::Pt;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle into the session's [`FontTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontId(pub(crate) usize);

/// At most this many user-defined fonts per album.
pub const MAX_USER_FONTS: usize = 12;

/// Built-in identifiers and the base-14 faces they name. These resolve
/// without any font file on disk.
const BUILTIN_FONTS: [(&str, &str); 12] = [
    ("CN", "Courier"),
    ("CB", "Courier-Bold"),
    ("CI", "Courier-Oblique"),
    ("CS", "Courier-BoldOblique"),
    ("TN", "Times-Roman"),
    ("TB", "Times-Bold"),
    ("TI", "Times-Italic"),
    ("TS", "Times-BoldItalic"),
    ("HN", "Helvetica"),
    ("HB", "Helvetica-Bold"),
    ("HI", "Helvetica-Oblique"),
    ("HS", "Helvetica-BoldOblique"),
];

#[derive(Debug, Clone, Copy)]
pub(crate) enum FontKind {
    Base14 { postscript: &'static str },
    TrueType { file: usize },
}

#[derive(Debug)]
pub(crate) struct FontEntry {
    identifier: String,
    pub(crate) kind: FontKind,
    pub(crate) encoding: CodePage,
    widths: ByteWidths,
}

impl FontEntry {
    pub(crate) fn width_units(&self, byte: u8) -> u16 {
        self.widths.for_byte(byte)
    }
}

/// Advance widths per encoded byte, in 1/1000 em.
#[derive(Debug)]
enum ByteWidths {
    Monospace(u16),
    Ascii {
        table: &'static [u16; 95],
        fallback: u16,
    },
    Table(Box<[u16; 256]>),
}

impl ByteWidths {
    fn for_byte(&self, byte: u8) -> u16 {
        match self {
            ByteWidths::Monospace(width) => *width,
            ByteWidths::Ascii { table, fallback } => {
                if (0x20..=0x7E).contains(&byte) {
                    table[(byte - 0x20) as usize]
                } else {
                    *fallback
                }
            }
            ByteWidths::Table(table) => table[byte as usize],
        }
    }
}

/// Descriptor metrics for an embedded font, scaled to 1/1000 em.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FaceMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) is_fixed_pitch: bool,
}

/// A parsed font file, loaded once per session no matter how many
/// identifiers bind to it.
#[derive(Debug)]
pub(crate) struct LoadedFontFile {
    pub(crate) path: PathBuf,
    pub(crate) data: Vec<u8>,
    pub(crate) postscript_name: String,
    pub(crate) metrics: FaceMetrics,
}

#[derive(Debug, Clone)]
struct CatalogFace {
    family: String,
    full_name: String,
    path: PathBuf,
}

/// Discovered font files. Population scans the configured directories once;
/// repeat calls are no-ops, so the scan order of define commands does not
/// matter.
#[derive(Debug, Default)]
pub(crate) struct FontCatalog {
    dirs: Vec<PathBuf>,
    faces: Vec<CatalogFace>,
    populated: bool,
}

impl FontCatalog {
    fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            faces: Vec::new(),
            populated: false,
        }
    }

    fn populate(&mut self) {
        if self.populated {
            return;
        }
        self.populated = true;
        let dirs = std::mem::take(&mut self.dirs);
        for dir in &dirs {
            self.scan_dir(dir);
        }
        self.dirs = dirs;
        log::debug!("font catalog: {} usable face(s)", self.faces.len());
    }

    fn scan_dir(&mut self, dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else {
            log::warn!("font catalog: cannot read directory {}", dir.display());
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|v| v.to_str()) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();
            if ext != "ttf" && ext != "otf" {
                continue;
            }
            let Ok(data) = fs::read(&path) else {
                log::warn!("font catalog: cannot read {}", path.display());
                continue;
            };
            let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
                log::warn!("font catalog: not a usable font file: {}", path.display());
                continue;
            };
            let (family, full_name, _postscript) = face_names(&face, &path);
            self.faces.push(CatalogFace {
                family,
                full_name,
                path,
            });
        }
    }

    fn find(&self, name: &str) -> Option<&CatalogFace> {
        let wanted = normalize_name(name);
        self.faces.iter().find(|face| {
            normalize_name(&face.full_name) == wanted || normalize_name(&face.family) == wanted
        })
    }
}

/// Identifier to font mapping for one album session. Twelve built-ins are
/// always present; user fonts are appended by `ALBUM_DEFINE_FONT`.
#[derive(Debug)]
pub struct FontTable {
    entries: Vec<FontEntry>,
    files: Vec<LoadedFontFile>,
    catalog: FontCatalog,
}

impl FontTable {
    pub fn new(font_dirs: &[PathBuf]) -> Self {
        let entries = BUILTIN_FONTS
            .iter()
            .map(|(identifier, postscript)| FontEntry {
                identifier: (*identifier).to_string(),
                kind: FontKind::Base14 { postscript },
                encoding: CodePage::Cp1252,
                widths: base14_widths(postscript),
            })
            .collect();
        Self {
            entries,
            files: Vec::new(),
            catalog: FontCatalog::new(font_dirs.to_vec()),
        }
    }

    /// Idempotent scan of the configured font directories.
    pub(crate) fn populate_catalog(&mut self) {
        self.catalog.populate();
    }

    /// Case-insensitive identifier lookup.
    pub fn resolve(&self, identifier: &str) -> Option<FontId> {
        let wanted = identifier.to_ascii_uppercase();
        self.entries
            .iter()
            .position(|entry| entry.identifier == wanted)
            .map(FontId)
    }

    /// Register a user font. The caller has already validated the identifier
    /// length and the encoding id; errors come back as display-ready
    /// messages for the report sink.
    pub(crate) fn define_user_font(
        &mut self,
        identifier: &str,
        face_name: &str,
        encoding: CodePage,
    ) -> Result<FontId, String> {
        let identifier = identifier.to_ascii_uppercase();
        if self
            .entries
            .iter()
            .any(|entry| entry.identifier == identifier)
        {
            return Err(format!("Duplicate definition of font {}.", identifier));
        }
        if self.entries.len() - BUILTIN_FONTS.len() >= MAX_USER_FONTS {
            return Err(format!(
                "Exceeded the maximum number of {} user fonts.",
                MAX_USER_FONTS
            ));
        }

        let Some(face) = self.catalog.find(face_name) else {
            return Err(format!(
                "No TrueType font file containing font \"{}\" was found.",
                face_name
            ));
        };
        let path = face.path.clone();

        let file_index = match self.files.iter().position(|file| file.path == path) {
            Some(index) => index,
            None => {
                let file = load_font_file(&path)?;
                self.files.push(file);
                self.files.len() - 1
            }
        };

        let widths = truetype_byte_widths(&self.files[file_index], encoding);
        self.entries.push(FontEntry {
            identifier,
            kind: FontKind::TrueType { file: file_index },
            encoding,
            widths,
        });
        Ok(FontId(self.entries.len() - 1))
    }

    pub(crate) fn entry(&self, font: FontId) -> &FontEntry {
        &self.entries[font.0]
    }

    pub(crate) fn file(&self, index: usize) -> &LoadedFontFile {
        &self.files[index]
    }

    pub fn encoding(&self, font: FontId) -> CodePage {
        self.entry(font).encoding
    }

    /// Narrow text to the font's code page.
    pub(crate) fn encode(&self, font: FontId, text: &str) -> Vec<u8> {
        self.entry(font).encoding.encode(text)
    }

    /// Width of `text` at `size`, measured on the encoded bytes.
    pub(crate) fn measure(&self, font: FontId, size: Pt, text: &str) -> Pt {
        let entry = self.entry(font);
        let mut units: i64 = 0;
        for c in text.chars() {
            let byte = entry.encoding.encode_char(c).unwrap_or(b'?');
            units += entry.width_units(byte) as i64;
        }
        let units = units.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        size.mul_ratio(units, 1000)
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn load_font_file(path: &Path) -> Result<LoadedFontFile, String> {
    let data = fs::read(path)
        .map_err(|err| format!("Failed to read font file {}: {}.", path.display(), err))?;
    let face = ttf_parser::Face::parse(&data, 0)
        .map_err(|_| format!("Failed to load TrueType font file {}.", path.display()))?;
    let (_family, _full, postscript) = face_names(&face, path);
    let metrics = face_metrics(&face);
    drop(face);
    Ok(LoadedFontFile {
        path: path.to_path_buf(),
        data,
        postscript_name: postscript,
        metrics,
    })
}

fn face_metrics(face: &ttf_parser::Face<'_>) -> FaceMetrics {
    let units_per_em = face.units_per_em().max(1);
    let scale = 1000.0 / units_per_em as f32;
    let scale_i16 = |value: i16| -> i16 {
        let scaled = (value as f32 * scale).round();
        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    };
    let ascent = scale_i16(face.ascender());
    let bbox = face.global_bounding_box();
    FaceMetrics {
        ascent,
        descent: scale_i16(face.descender()),
        cap_height: face.capital_height().map(scale_i16).unwrap_or(ascent),
        italic_angle: face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0),
        bbox: (
            scale_i16(bbox.x_min),
            scale_i16(bbox.y_min),
            scale_i16(bbox.x_max),
            scale_i16(bbox.y_max),
        ),
        is_fixed_pitch: face.is_monospaced(),
    }
}

/// Family, full, and PostScript names from the name table, with the file
/// stem as fallback for fonts with unusable name records.
fn face_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, String, String) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full_name = None;
    let mut postscript = None;
    for entry in face.names() {
        let Some(value) = entry.to_string() else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match entry.name_id {
            name_id::FAMILY => family.get_or_insert(value),
            name_id::FULL_NAME => full_name.get_or_insert(value),
            name_id::POST_SCRIPT_NAME => postscript.get_or_insert(value),
            _ => continue,
        };
    }
    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .unwrap_or("Font")
        .to_string();
    let family = family.unwrap_or_else(|| stem.clone());
    let full_name = full_name.unwrap_or_else(|| family.clone());
    let postscript = postscript
        .unwrap_or_else(|| full_name.replace(char::is_whitespace, ""));
    (family, full_name, postscript)
}

/// Per-byte advances for a TrueType entry: each encoded byte decodes through
/// the code page, maps to a glyph via the cmap, and takes that glyph's
/// advance scaled to 1/1000 em. Unmapped bytes get width 0.
fn truetype_byte_widths(file: &LoadedFontFile, encoding: CodePage) -> ByteWidths {
    let mut table = Box::new([0u16; 256]);
    if let Ok(face) = ttf_parser::Face::parse(&file.data, 0) {
        let units_per_em = face.units_per_em().max(1) as u32;
        for byte in 0x20..=0xFFu16 {
            let byte = byte as u8;
            let Some(c) = encoding.decode(byte) else {
                continue;
            };
            let Some(glyph) = face.glyph_index(c) else {
                continue;
            };
            let Some(advance) = face.glyph_hor_advance(glyph) else {
                continue;
            };
            let scaled = (advance as u32 * 1000 + units_per_em / 2) / units_per_em;
            table[byte as usize] = scaled.min(u16::MAX as u32) as u16;
        }
    }
    ByteWidths::Table(table)
}

fn base14_widths(postscript: &str) -> ByteWidths {
    match postscript {
        "Courier" | "Courier-Bold" | "Courier-Oblique" | "Courier-BoldOblique" => {
            ByteWidths::Monospace(600)
        }
        "Helvetica" | "Helvetica-Oblique" => ByteWidths::Ascii {
            table: &HELVETICA_WIDTHS,
            fallback: 556,
        },
        "Helvetica-Bold" | "Helvetica-BoldOblique" => ByteWidths::Ascii {
            table: &HELVETICA_BOLD_WIDTHS,
            fallback: 556,
        },
        "Times-Roman" | "Times-Italic" => ByteWidths::Ascii {
            table: &TIMES_ROMAN_WIDTHS,
            fallback: 500,
        },
        _ => ByteWidths::Ascii {
            table: &TIMES_BOLD_WIDTHS,
            fallback: 500,
        },
    }
}

// Standard AFM advances for the printable ASCII range (0x20..=0x7E), in
// 1/1000 em. Oblique cuts share the upright tables. Bytes outside the range
// fall back to a family average; the built-ins are never embedded, so only
// measurement uses these.

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FontTable {
        FontTable::new(&[])
    }

    #[test]
    fn builtins_resolve_case_insensitively() {
        let fonts = table();
        let upper = fonts.resolve("TN").expect("TN resolves");
        let lower = fonts.resolve("tn").expect("tn resolves");
        assert_eq!(upper, lower);
        assert!(matches!(
            fonts.entry(upper).kind,
            FontKind::Base14 {
                postscript: "Times-Roman"
            }
        ));
        assert!(fonts.resolve("XX").is_none());
    }

    #[test]
    fn builtins_encode_as_latin1() {
        let fonts = table();
        let times = fonts.resolve("TN").unwrap();
        assert_eq!(fonts.encoding(times), CodePage::Cp1252);
        assert_eq!(fonts.encode(times, "café"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn courier_measures_as_strict_monospace() {
        let fonts = table();
        let courier = fonts.resolve("CN").unwrap();
        let size = Pt::from_f32(10.0);
        // 600/1000 em per char at 10pt = 6pt per char.
        assert_eq!(fonts.measure(courier, size, "mm"), Pt::from_f32(12.0));
        assert_eq!(fonts.measure(courier, size, "iiii"), Pt::from_f32(24.0));
    }

    #[test]
    fn helvetica_is_wider_than_its_narrow_glyphs() {
        let fonts = table();
        let helvetica = fonts.resolve("HN").unwrap();
        let size = Pt::from_f32(10.0);
        let wide = fonts.measure(helvetica, size, "W");
        let narrow = fonts.measure(helvetica, size, "i");
        assert!(wide > narrow);
        assert_eq!(narrow, Pt::from_f32(2.22));
    }

    #[test]
    fn duplicate_user_identifier_is_rejected() {
        let mut fonts = table();
        fonts.catalog.populated = true;
        fonts.catalog.faces.push(CatalogFace {
            family: "Fake Sans".to_string(),
            full_name: "Fake Sans Regular".to_string(),
            path: PathBuf::from("fake.ttf"),
        });
        // Duplicate of a built-in id is caught before any file access.
        let err = fonts
            .define_user_font("tn", "Fake Sans", CodePage::Cp1252)
            .unwrap_err();
        assert!(err.contains("Duplicate definition"));
    }

    #[test]
    fn unknown_face_name_reports_not_found() {
        let mut fonts = table();
        fonts.populate_catalog();
        let err = fonts
            .define_user_font("XY", "No Such Face", CodePage::Cp1252)
            .unwrap_err();
        assert!(err.contains("No Such Face"));
    }
}
