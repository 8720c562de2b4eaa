use crate::canvas::{Command, Document};
use crate::error::AlbumError;
use crate::font::{FontId, FontKind, FontTable, LoadedFontFile};
use crate::encoding::CodePage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::BTreeSet;

/// Serialize a laid-out document to PDF bytes. Fonts referenced by the
/// command stream become page resources: built-ins as plain Type1 dicts,
/// user fonts embedded with their full TrueType program.
pub fn document_to_pdf(document: &Document, fonts: &FontTable) -> Result<Vec<u8>, AlbumError> {
    let mut pdf = LoDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut font_resources = Dictionary::new();
    for font in collect_used_fonts(document) {
        let object_id = font_object(&mut pdf, fonts, font);
        font_resources.set(resource_name(font), object_id);
    }
    let resources_id = pdf.add_object(dictionary! {
        "Font" => Object::Dictionary(font_resources),
    });

    let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = page_content(page)?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(document.page_size.width.to_f32()),
                Object::Real(document.page_size.height.to_f32()),
            ],
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Creator" => Object::string_literal(format!("albumpress v{}", env!("CARGO_PKG_VERSION"))),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);

    pdf.compress();
    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|err| AlbumError::PdfWrite(err.to_string()))?;
    Ok(bytes)
}

fn collect_used_fonts(document: &Document) -> BTreeSet<FontId> {
    let mut used = BTreeSet::new();
    for page in &document.pages {
        for command in &page.commands {
            if let Command::SetFont { font, .. } = command {
                used.insert(*font);
            }
        }
    }
    used
}

fn resource_name(font: FontId) -> Vec<u8> {
    format!("F{}", font.0).into_bytes()
}

/// Translate one page of canvas commands into a content stream. Text is
/// wrapped in its own text object per string, with the current font restated
/// there, which keeps the graphics state handling trivial.
fn page_content(page: &crate::canvas::Page) -> Result<Vec<u8>, AlbumError> {
    let mut operations = Vec::with_capacity(page.commands.len() * 2);
    let mut current_font: Option<(FontId, f32)> = None;

    for command in &page.commands {
        match command {
            Command::SetLineWidth(width) => {
                operations.push(Operation::new("w", vec![Object::Real(width.to_f32())]));
            }
            Command::SetFont { font, size } => {
                current_font = Some((*font, size.to_f32()));
            }
            Command::StrokeRect {
                x,
                y,
                width,
                height,
            } => {
                operations.push(Operation::new(
                    "re",
                    vec![
                        Object::Real(x.to_f32()),
                        Object::Real(y.to_f32()),
                        Object::Real(width.to_f32()),
                        Object::Real(height.to_f32()),
                    ],
                ));
                operations.push(Operation::new("S", vec![]));
            }
            Command::MoveTo { x, y } => {
                operations.push(Operation::new(
                    "m",
                    vec![Object::Real(x.to_f32()), Object::Real(y.to_f32())],
                ));
            }
            Command::LineTo { x, y } => {
                operations.push(Operation::new(
                    "l",
                    vec![Object::Real(x.to_f32()), Object::Real(y.to_f32())],
                ));
            }
            Command::Stroke => operations.push(Operation::new("S", vec![])),
            Command::DrawText { x, y, bytes } => {
                let Some((font, size)) = current_font else {
                    // A draw without a font set never leaves the layout
                    // engine; skip rather than emit an invalid stream.
                    continue;
                };
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![
                        Object::Name(resource_name(font)),
                        Object::Real(size),
                    ],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Real(x.to_f32()), Object::Real(y.to_f32())],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(bytes.clone(), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
        }
    }

    Content { operations }
        .encode()
        .map_err(|err| AlbumError::PdfWrite(err.to_string()))
}

fn font_object(pdf: &mut LoDocument, fonts: &FontTable, font: FontId) -> ObjectId {
    let entry = fonts.entry(font);
    match entry.kind {
        FontKind::Base14 { postscript } => pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => postscript,
            "Encoding" => "WinAnsiEncoding",
        }),
        FontKind::TrueType { file } => {
            truetype_font_object(pdf, fonts, font, fonts.file(file))
        }
    }
}

/// Embedded simple TrueType font: full program in FontFile2, widths for the
/// byte range 32..=255, and a Differences encoding naming the code-page
/// glyphs for anything other than Latin 1.
fn truetype_font_object(
    pdf: &mut LoDocument,
    fonts: &FontTable,
    font: FontId,
    file: &LoadedFontFile,
) -> ObjectId {
    let entry = fonts.entry(font);
    let metrics = file.metrics;

    let program_id = pdf.add_object(Stream::new(
        dictionary! { "Length1" => file.data.len() as i64 },
        file.data.clone(),
    ));

    // Nonsymbolic, plus fixed pitch when the face says so.
    let flags = 32 | if metrics.is_fixed_pitch { 1 } else { 0 };
    let base_font = file.postscript_name.as_str();
    let descriptor_id = pdf.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base_font,
        "Flags" => flags as i64,
        "FontBBox" => vec![
            Object::Integer(metrics.bbox.0 as i64),
            Object::Integer(metrics.bbox.1 as i64),
            Object::Integer(metrics.bbox.2 as i64),
            Object::Integer(metrics.bbox.3 as i64),
        ],
        "ItalicAngle" => metrics.italic_angle as i64,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => 80,
        "FontFile2" => program_id,
    });

    let widths: Vec<Object> = (32..=255u16)
        .map(|byte| Object::Integer(entry.width_units(byte as u8) as i64))
        .collect();

    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => base_font,
        "FirstChar" => 32,
        "LastChar" => 255,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
    };
    match entry.encoding {
        CodePage::Cp1252 => dict.set("Encoding", "WinAnsiEncoding"),
        code_page => {
            let encoding_id = pdf.add_object(differences_encoding(code_page));
            dict.set("Encoding", encoding_id);
        }
    }
    pdf.add_object(dict)
}

/// Encoding dictionary for a non-Latin-1 code page. High codes are named
/// with uniXXXX glyph names derived from the code-page table; unassigned
/// slots map to .notdef.
fn differences_encoding(code_page: CodePage) -> Dictionary {
    let mut differences: Vec<Object> = Vec::with_capacity(129);
    differences.push(Object::Integer(128));
    for byte in 0x80..=0xFFu16 {
        let name = match code_page.decode(byte as u8) {
            Some(c) => format!("uni{:04X}", c as u32).into_bytes(),
            None => b".notdef".to_vec(),
        };
        differences.push(Object::Name(name));
    }
    dictionary! {
        "Type" => "Encoding",
        "BaseEncoding" => "WinAnsiEncoding",
        "Differences" => differences,
    }
}
