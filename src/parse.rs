use crate::encoding::CodePage;
use crate::font::{FontId, FontTable};
use crate::model::{AlbumDocument, RowAlign, RowStyle, StampStyle};
use crate::report::ReportSink;
use crate::types::Pt;

/// Album source parser. Walks the source line by line, folds continuations,
/// and drives the document builder. Every recoverable problem is reported
/// with its line number and the offending command is skipped; parsing always
/// runs to the end of the source.
pub struct Parser<'a> {
    album: &'a mut AlbumDocument,
    fonts: &'a mut FontTable,
    sink: &'a mut dyn ReportSink,
    current_line: u32,
    clean: bool,
}

impl<'a> Parser<'a> {
    pub fn new(
        album: &'a mut AlbumDocument,
        fonts: &'a mut FontTable,
        sink: &'a mut dyn ReportSink,
    ) -> Self {
        Self {
            album,
            fonts,
            sink,
            current_line: 0,
            clean: true,
        }
    }

    /// Returns true when the whole source parsed without reported errors.
    pub fn parse(mut self, source: &str) -> bool {
        let mut lines = source.lines();
        let mut line_no = 0u32;

        while let Some(raw) = lines.next() {
            line_no += 1;
            let mut line = clean_line(raw);
            if line.is_empty() {
                continue;
            }

            // A trailing `"\` splices the next line in, which must resume
            // the quoted string with a leading `"`.
            let mut bad_continuation = false;
            while line.ends_with("\"\\") {
                let Some(next) = lines.next() else {
                    bad_continuation = true;
                    break;
                };
                line_no += 1;
                let cont = clean_line(next);
                if let Some(rest) = cont.strip_prefix('"') {
                    line.truncate(line.len() - 2);
                    line.push_str(rest);
                } else {
                    bad_continuation = true;
                    break;
                }
            }

            self.current_line = line_no;
            if bad_continuation {
                self.report("Bad line continuation.");
                continue;
            }

            if let Some((cmnd, parms)) = self.split_line(&line) {
                self.process_command(&cmnd, parms);
            }
        }
        self.clean
    }

    fn report(&mut self, message: &str) {
        self.sink.line_error(self.current_line, message);
        self.clean = false;
    }

    fn report_for(&mut self, cmnd: &str, message: &str) {
        let text = format!("{} command - {}", cmnd, message);
        self.sink.line_error(self.current_line, &text);
        self.clean = false;
    }

    /// Split a cleaned line into the command keyword and the text between
    /// its parentheses.
    fn split_line(&mut self, line: &str) -> Option<(String, String)> {
        let chars: Vec<char> = line.chars().collect();
        let mut in_string = false;
        let mut prev = '\0';
        let mut cmnd: String = line.to_string();
        let mut parms: Vec<char> = Vec::new();
        let mut found_params = false;

        for i in 0..chars.len() {
            let c = chars[i];
            if c == '"' && !in_string {
                in_string = true;
            } else if c == '"' && in_string {
                if prev != '\\' {
                    in_string = false;
                }
            } else if (c == ' ' || c == '(') && !in_string {
                cmnd = chars[..i].iter().collect();
                found_params = true;

                let mut open = i;
                if c == ' ' {
                    if i + 1 < chars.len() && chars[i + 1] == '(' {
                        open = i + 1;
                    } else {
                        self.report_for(&cmnd, "Parameters require an opening parenthesis.");
                        return None;
                    }
                }
                parms = chars[open + 1..].to_vec();
                break;
            }
            prev = c;
        }

        if found_params {
            let mut in_string = false;
            let mut prev = '\0';
            let mut close = None;
            for (i, &c) in parms.iter().enumerate() {
                if c == '"' && !in_string {
                    in_string = true;
                } else if c == '"' && in_string {
                    if prev != '\\' {
                        in_string = false;
                    }
                } else if c == ')' && !in_string {
                    close = Some(i);
                    break;
                }
                prev = c;
            }
            match close {
                Some(i) => parms.truncate(i),
                None => {
                    self.report_for(&cmnd, "Parameters require a closing parenthesis.");
                    return None;
                }
            }
        }

        let parms: String = parms.into_iter().collect();
        Some((cmnd.trim().to_string(), parms.trim().to_string()))
    }

    fn process_command(&mut self, cmnd: &str, mut parms: String) {
        let keyword = cmnd.to_uppercase();
        match keyword.as_str() {
            "ALBUM_PAGES_SIZE" => {
                if let Some(vals) = self.parse_floats(&keyword, &mut parms, 2, true) {
                    self.album.set_page_size(vals[0], vals[1]);
                }
            }
            "ALBUM_PAGES_MARGINS" | "ALBUM_PAGES_MARGINSE" => {
                if let Some(vals) = self.parse_floats(&keyword, &mut parms, 4, true) {
                    let odd = keyword == "ALBUM_PAGES_MARGINS";
                    self.album
                        .set_margins(vals[0], vals[1], vals[2], vals[3], odd);
                }
            }
            "ALBUM_PAGES_BORDER" => {
                if let Some(vals) = self.parse_floats(&keyword, &mut parms, 3, true) {
                    self.album.set_border(vals[0], vals[1], vals[2]);
                }
            }
            "ALBUM_PAGES_SPACING" => {
                if let Some(vals) = self.parse_floats(&keyword, &mut parms, 2, true) {
                    self.album.set_spacing(vals[0], vals[1]);
                }
            }
            "ALBUM_PAGES_TITLE" => {
                if let Some((font, size)) = self.parse_font_ref(&keyword, &mut parms) {
                    if let Some(text) = self.parse_text_field(&keyword, &mut parms) {
                        self.album.set_title(font, size, &text);
                    }
                }
            }
            "ALBUM_DEFINE_FONT" => self.process_define_font(&keyword, parms),
            "PAGE_START" => {
                if self.check_blank_parameters(&keyword, &parms) {
                    self.album.start_page(None);
                }
            }
            "PAGE_START_VAR" => {
                if let Some(vals) = self.parse_floats(&keyword, &mut parms, 2, true) {
                    self.album.start_page(Some((vals[0], vals[1])));
                }
            }
            "PAGE_TEXT" | "PAGE_TEXT_CENTRE" => {
                if let Some((font, size)) = self.parse_font_ref(&keyword, &mut parms) {
                    if let Some(text) = self.parse_text_field(&keyword, &mut parms) {
                        if self.check_page_started(&keyword) {
                            let centred = keyword == "PAGE_TEXT_CENTRE";
                            self.album.add_page_text(font, size, &text, centred);
                        }
                    }
                }
            }
            "ROW_ALIGN_TOP" | "ROW_ALIGN_MIDDLE" | "ROW_ALIGN_BOTTOM" => {
                if self.check_blank_parameters(&keyword, &parms) {
                    let align = match keyword.as_str() {
                        "ROW_ALIGN_TOP" => RowAlign::Top,
                        "ROW_ALIGN_MIDDLE" => RowAlign::Middle,
                        _ => RowAlign::Bottom,
                    };
                    self.album.set_row_alignment(align);
                }
            }
            "ROW_START_ES" | "ROW_START_JS" | "ROW_START_FS" => {
                self.process_row_start(&keyword, parms)
            }
            "STAMP_ADD" | "STAMP_ADDX" | "STAMP_ADD_BLANK" | "STAMP_ADD_TRIANGLE"
            | "STAMP_ADD_TRIANGLE_INV" | "STAMP_ADD_DIAMOND" => {
                self.process_stamp_add(&keyword, parms)
            }
            _ => self.report("Unrecognised command."),
        }
    }

    fn process_define_font(&mut self, cmnd: &str, mut parms: String) {
        let font_id = extract_field(&mut parms, true);
        let Some(font_name) = self.parse_text_field(cmnd, &mut parms) else {
            return;
        };
        let encoding_id = extract_field(&mut parms, false);

        if font_id.is_empty() || font_name.is_empty() {
            self.report_for(cmnd, "Incorrect number or format of parameters.");
            return;
        }
        let id_len = font_id.chars().count();
        if !(2..=8).contains(&id_len) {
            self.report_for(cmnd, "User defined font identifiers must be 2 to 8 chars long.");
            return;
        }

        let encoding = if encoding_id.is_empty() {
            CodePage::default()
        } else {
            match CodePage::from_id(&encoding_id) {
                Some(encoding) => encoding,
                None => {
                    let message =
                        format!("Specified encoding {} is not supported.", encoding_id);
                    self.report_for(cmnd, &message);
                    return;
                }
            }
        };

        // The first definition pays for the directory scan; later ones reuse
        // the populated catalog.
        self.fonts.populate_catalog();

        if let Err(message) = self.fonts.define_user_font(&font_id, &font_name, encoding) {
            self.report_for(cmnd, &message);
        }
    }

    fn process_row_start(&mut self, cmnd: &str, mut parms: String) {
        let style = match cmnd {
            "ROW_START_JS" => RowStyle::Justify,
            "ROW_START_FS" => RowStyle::Fixed,
            _ => RowStyle::Equal,
        };
        let Some((font, size)) = self.parse_font_ref(cmnd, &mut parms) else {
            return;
        };
        let Some(line_width) = self.parse_floats(cmnd, &mut parms, 1, true) else {
            return;
        };
        let spacing = if style == RowStyle::Fixed {
            match self.parse_floats(cmnd, &mut parms, 1, true) {
                Some(vals) => vals[0],
                None => return,
            }
        } else {
            0.0
        };
        if self.check_page_started(cmnd) {
            self.album
                .start_row(font, size, line_width[0], style, spacing);
        }
    }

    fn process_stamp_add(&mut self, cmnd: &str, mut parms: String) {
        if !self.check_row_started(cmnd) {
            return;
        }
        let Some(size) = self.parse_floats(cmnd, &mut parms, 2, true) else {
            return;
        };

        let mut text: [String; 9] = Default::default();
        if cmnd != "STAMP_ADD_BLANK" {
            // Every framed stamp carries six text slots; the extended form
            // adds a second row of three below the frame.
            let slots = if cmnd == "STAMP_ADDX" { 9 } else { 6 };
            for slot in text.iter_mut().take(slots) {
                match self.parse_text_field(cmnd, &mut parms) {
                    Some(value) => *slot = value,
                    None => return,
                }
            }
        }
        for slot in text.iter_mut() {
            *slot = unescape_stamp_text(slot);
        }

        let style = match cmnd {
            "STAMP_ADD" => StampStyle::Block,
            "STAMP_ADDX" => StampStyle::BlockExtended,
            "STAMP_ADD_TRIANGLE" => StampStyle::Triangle,
            "STAMP_ADD_TRIANGLE_INV" => StampStyle::TriangleInverted,
            "STAMP_ADD_DIAMOND" => StampStyle::Diamond,
            _ => StampStyle::Blank,
        };
        self.album.add_stamp(style, size[0], size[1], text);
    }

    fn check_blank_parameters(&mut self, cmnd: &str, parms: &str) -> bool {
        if parms.is_empty() {
            true
        } else {
            self.report_for(cmnd, "Does not require parameters.");
            false
        }
    }

    fn check_page_started(&mut self, cmnd: &str) -> bool {
        if self.album.has_page() {
            true
        } else {
            self.report_for(cmnd, "Attempting to add to a page before a page has been started.");
            false
        }
    }

    fn check_row_started(&mut self, cmnd: &str) -> bool {
        if self.album.has_row() {
            true
        } else {
            self.report_for(
                cmnd,
                "Attempting to add a stamp before a stamp row has been started.",
            );
            false
        }
    }

    /// Extract `count` float fields. Fewer fields, or a field that does not
    /// parse as a number, is one "number or format" error.
    fn parse_floats(
        &mut self,
        cmnd: &str,
        parms: &mut String,
        count: usize,
        display_err: bool,
    ) -> Option<Vec<f64>> {
        let mut vals = Vec::with_capacity(count);
        for _ in 0..count {
            if parms.is_empty() {
                break;
            }
            let field = extract_field(parms, false);
            match field.parse::<f64>() {
                Ok(value) => vals.push(value),
                Err(_) => break,
            }
        }
        if vals.len() == count {
            Some(vals)
        } else {
            if display_err {
                self.report_for(cmnd, "Incorrect number or format of parameters.");
            }
            None
        }
    }

    /// Extract one quoted field, returning it without the quotes. Escapes
    /// are substituted later, by whoever consumes the text.
    fn parse_text_field(&mut self, cmnd: &str, parms: &mut String) -> Option<String> {
        let field = extract_field(parms, false);
        if field.chars().count() > 1 && field.starts_with('"') && field.ends_with('"') {
            Some(field[1..field.len() - 1].to_string())
        } else {
            self.report_for(cmnd, "Quoted text expected.");
            None
        }
    }

    /// A font reference is two fields: an identifier known to the font
    /// table, then a positive point size.
    fn parse_font_ref(&mut self, cmnd: &str, parms: &mut String) -> Option<(FontId, Pt)> {
        let field = extract_field(parms, false);
        if field.is_empty() {
            self.report_for(cmnd, "No font provided.");
            return None;
        }
        let Some(font) = self.fonts.resolve(&field) else {
            let message = format!("Specified font \"{}\" not found.", field);
            self.report_for(cmnd, &message);
            return None;
        };
        match self.parse_floats(cmnd, parms, 1, false) {
            Some(vals) if vals[0] > 0.0 => Some((font, Pt::from_f32(vals[0] as f32))),
            _ => {
                self.report_for(cmnd, "Font size not specified.");
                None
            }
        }
    }
}

/// Trim, strip `#` comments outside quotes, and collapse runs of blanks
/// outside quotes to a single space. Quote tracking treats a quote preceded
/// by a backslash as escaped.
fn clean_line(raw: &str) -> String {
    let mut line: String = raw.trim().to_string();

    let mut in_string = false;
    let mut prev = '\0';
    let mut cut = None;
    for (i, c) in line.char_indices() {
        if c == '"' && !in_string {
            in_string = true;
        } else if c == '"' && in_string {
            if prev != '\\' {
                in_string = false;
            }
        } else if c == '#' && !in_string {
            cut = Some(i);
            break;
        }
        prev = c;
    }
    if let Some(i) = cut {
        line.truncate(i);
    }

    let trimmed = line.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut in_string = false;
    let mut prev = '\0';
    let mut in_blank = false;
    for c in trimmed.chars() {
        if c == '"' && !in_string {
            in_string = true;
        } else if c == '"' && in_string && prev != '\\' {
            in_string = false;
        }
        if (c == ' ' || c == '\t') && !in_string {
            if !in_blank {
                in_blank = true;
                out.push(' ');
            }
        } else {
            in_blank = false;
            out.push(c);
        }
        prev = c;
    }
    out
}

/// First space-delimited field (quote-aware); the remainder stays in
/// `parms` without its leading delimiter.
fn extract_field(parms: &mut String, to_upper: bool) -> String {
    let chars: Vec<char> = parms.chars().collect();
    let mut in_string = false;
    let mut prev = '\0';
    let mut split = None;
    for (i, &c) in chars.iter().enumerate() {
        if c == '"' && !in_string {
            in_string = true;
        } else if c == '"' && in_string {
            if prev != '\\' {
                in_string = false;
            }
        } else if c == ' ' && !in_string {
            split = Some(i);
            break;
        }
        prev = c;
    }

    let (field, rest): (String, String) = match split {
        Some(i) => (
            chars[..i].iter().collect(),
            chars[i + 1..].iter().collect(),
        ),
        None => (chars.iter().collect(), String::new()),
    };
    *parms = rest;
    if to_upper { field.to_uppercase() } else { field }
}

/// Escape substitution for stamp text slots: `\x` keeps `x` (covering `\"`
/// and `\\`), a lone trailing backslash is dropped. No line splitting.
fn unescape_stamp_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageItem;
    use crate::report::{ReportEntry, ReportLog};

    fn parse_source(source: &str) -> (AlbumDocument, FontTable, ReportLog, bool) {
        let mut album = AlbumDocument::new();
        let mut fonts = FontTable::new(&[]);
        let mut log = ReportLog::new();
        let clean = Parser::new(&mut album, &mut fonts, &mut log).parse(source);
        (album, fonts, log, clean)
    }

    #[test]
    fn clean_line_strips_comments_outside_quotes_only() {
        assert_eq!(clean_line("  PAGE_START   # trailing"), "PAGE_START");
        assert_eq!(
            clean_line("PAGE_TEXT (TN 10 \"a # b\") # real comment"),
            "PAGE_TEXT (TN 10 \"a # b\")"
        );
        assert_eq!(clean_line("\t A  \t B \"x   y\" "), "A B \"x   y\"");
        assert_eq!(clean_line("# whole line"), "");
    }

    #[test]
    fn extract_field_is_quote_aware() {
        let mut parms = "\"two words\" 42".to_string();
        assert_eq!(extract_field(&mut parms, false), "\"two words\"");
        assert_eq!(parms, "42");
        assert_eq!(extract_field(&mut parms, false), "42");
        assert_eq!(parms, "");
    }

    #[test]
    fn page_count_matches_page_start_commands() {
        let (album, _, log, clean) = parse_source(
            "ALBUM_PAGES_SIZE (210 297)\nPAGE_START\nPAGE_START\nPAGE_START_VAR (4 5)\n",
        );
        assert!(clean, "unexpected errors: {:?}", log.entries());
        assert_eq!(album.pages().len(), 3);
    }

    #[test]
    fn unknown_commands_are_skipped_and_parsing_continues() {
        let (album, _, log, clean) = parse_source("NO_SUCH_COMMAND (1 2)\nPAGE_START\n");
        assert!(!clean);
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.entries()[0],
            ReportEntry::Line {
                line: 1,
                message: "Unrecognised command.".to_string()
            }
        );
        assert_eq!(album.pages().len(), 1);
    }

    #[test]
    fn missing_parenthesis_is_a_line_error() {
        let (_, _, log, clean) = parse_source("ALBUM_PAGES_SIZE 210 297\n");
        assert!(!clean);
        assert!(log.entries()[0].message().contains("opening parenthesis"));

        let (_, _, log, _) = parse_source("ALBUM_PAGES_SIZE (210 297\n");
        assert!(log.entries()[0].message().contains("closing parenthesis"));
    }

    #[test]
    fn float_format_errors_are_reported() {
        let (album, _, log, clean) = parse_source("ALBUM_PAGES_SIZE (210 wide)\n");
        assert!(!clean);
        assert!(log.entries()[0].message().contains("number or format"));
        assert!(album.size().is_none());
    }

    #[test]
    fn continuation_joins_quoted_text() {
        let source = "ALBUM_PAGES_SIZE (210 297)\nPAGE_START\nPAGE_TEXT (TN 10 \"first \"\\\n\"second\")\n";
        let (album, _, log, clean) = parse_source(source);
        assert!(clean, "unexpected errors: {:?}", log.entries());
        let items = album.pages()[0].items();
        let PageItem::Text(text) = &items[0] else {
            panic!("expected a text item");
        };
        assert_eq!(text.lines, vec!["first second"]);
    }

    #[test]
    fn bad_continuation_drops_the_whole_logical_line() {
        let source = "PAGE_START\nPAGE_TEXT (TN 10 \"first \"\\\nnot-a-quote)\nPAGE_START\n";
        let (album, _, log, clean) = parse_source(source);
        assert!(!clean);
        assert_eq!(
            log.entries()[0],
            ReportEntry::Line {
                line: 3,
                message: "Bad line continuation.".to_string()
            }
        );
        // The spliced command is gone but parsing carried on.
        assert_eq!(album.pages().len(), 2);
        assert!(album.pages()[0].items().is_empty());
    }

    #[test]
    fn row_requires_a_page_and_stamp_requires_a_row() {
        let (album, _, log, _) = parse_source(
            "ROW_START_ES (TN 10 0.5)\nPAGE_START\nSTAMP_ADD_BLANK (20 25)\nROW_START_ES (TN 10 0.5)\nSTAMP_ADD_BLANK (20 25)\n",
        );
        assert_eq!(log.len(), 2);
        assert!(log.entries()[0].message().contains("before a page"));
        assert!(log.entries()[1].message().contains("before a stamp row"));
        let items = album.pages()[0].items();
        assert_eq!(items.len(), 1);
        let PageItem::Row(row) = &items[0] else {
            panic!("expected a row");
        };
        assert_eq!(row.stamps().len(), 1);
    }

    #[test]
    fn page_start_rejects_parameters() {
        let (album, _, log, clean) = parse_source("PAGE_START (3)\n");
        assert!(!clean);
        assert!(log.entries()[0].message().contains("Does not require"));
        assert!(!album.has_page());
    }

    #[test]
    fn fixed_row_needs_its_spacing_parameter() {
        let (_, _, log, clean) = parse_source("PAGE_START\nROW_START_FS (TN 10 0.5)\n");
        assert!(!clean);
        assert!(log.entries()[0].message().contains("number or format"));
    }

    #[test]
    fn font_reference_errors_name_the_problem() {
        let (_, _, log, _) = parse_source("ALBUM_PAGES_TITLE (ZZ 14 \"t\")\n");
        assert!(log.entries()[0].message().contains("\"ZZ\" not found"));

        let (_, _, log, _) = parse_source("ALBUM_PAGES_TITLE (TN 0 \"t\")\n");
        assert!(log.entries()[0].message().contains("Font size not specified"));
    }

    #[test]
    fn define_font_validates_identifier_length() {
        let (_, _, log, _) = parse_source("ALBUM_DEFINE_FONT (X \"Face\")\n");
        assert!(log.entries()[0].message().contains("2 to 8 chars"));

        let (_, _, log, _) = parse_source("ALBUM_DEFINE_FONT (TOOLONGID \"Face\")\n");
        assert!(log.entries()[0].message().contains("2 to 8 chars"));
    }

    #[test]
    fn define_font_rejects_unknown_encodings() {
        let (_, _, log, _) = parse_source("ALBUM_DEFINE_FONT (XY \"Face\" CP866)\n");
        assert!(log.entries()[0].message().contains("CP866 is not supported"));
    }

    #[test]
    fn stamp_text_keeps_escaped_quotes() {
        let (album, _, log, clean) = parse_source(
            "PAGE_START\nROW_START_ES (TN 10 0.5)\nSTAMP_ADD (20 25 \"5\\\"\" \"\" \"\" \"a\" \"b\" \"c\")\n",
        );
        assert!(clean, "unexpected errors: {:?}", log.entries());
        let PageItem::Row(row) = &album.pages()[0].items()[0] else {
            panic!("expected a row");
        };
        let stamp = &row.stamps()[0];
        assert_eq!(stamp.text(0), "5\"");
        assert_eq!(stamp.text(3), "a");
        assert_eq!(stamp.text(8), "");
    }

    #[test]
    fn stamp_addx_takes_nine_text_slots() {
        let (album, _, _, clean) = parse_source(
            "PAGE_START\nROW_START_FS (TN 10 0.5 4)\nSTAMP_ADDX (20 25 \"1\" \"2\" \"3\" \"4\" \"5\" \"6\" \"7\" \"8\" \"9\")\n",
        );
        assert!(clean);
        let PageItem::Row(row) = &album.pages()[0].items()[0] else {
            panic!("expected a row");
        };
        assert_eq!(row.stamps()[0].text(8), "9");
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let (album, _, log, clean) = parse_source("page_start\nPage_Text (tn 10 \"x\")\n");
        assert!(clean, "unexpected errors: {:?}", log.entries());
        assert_eq!(album.pages()[0].items().len(), 1);
    }
}
