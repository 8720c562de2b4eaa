/// Destination for parse and generation diagnostics. Line-scoped messages come
/// from the parser; unscoped messages from generation. Reporting never aborts
/// anything by itself; control flow is carried by return values.
pub trait ReportSink {
    fn line_error(&mut self, line: u32, message: &str);
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    Line { line: u32, message: String },
    General { message: String },
}

impl ReportEntry {
    pub fn message(&self) -> &str {
        match self {
            ReportEntry::Line { message, .. } => message,
            ReportEntry::General { message } => message,
        }
    }
}

/// Collecting sink. Entries are kept in report order and mirrored to the
/// `log` facade so embedders with a logger see them without wiring anything.
#[derive(Debug, Default)]
pub struct ReportLog {
    entries: Vec<ReportEntry>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl ReportSink for ReportLog {
    fn line_error(&mut self, line: u32, message: &str) {
        log::warn!("line {}: {}", line, message);
        self.entries.push(ReportEntry::Line {
            line,
            message: message.to_string(),
        });
    }

    fn error(&mut self, message: &str) {
        log::error!("{}", message);
        self.entries.push(ReportEntry::General {
            message: message.to_string(),
        });
    }
}
