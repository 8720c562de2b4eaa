use std::fmt;

#[derive(Debug)]
pub enum AlbumError {
    /// Mandatory page setup (size, margins, spacing) was incomplete at
    /// generation time. The individual missing settings have already been
    /// reported through the sink.
    PageSetupIncomplete,
    /// A registered font could not be used while drawing.
    Font(String),
    PdfWrite(String),
    Io(std::io::Error),
}

impl fmt::Display for AlbumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlbumError::PageSetupIncomplete => {
                write!(f, "mandatory page setup is incomplete")
            }
            AlbumError::Font(message) => write!(f, "font error: {}", message),
            AlbumError::PdfWrite(message) => write!(f, "pdf write error: {}", message),
            AlbumError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for AlbumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlbumError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AlbumError {
    fn from(value: std::io::Error) -> Self {
        AlbumError::Io(value)
    }
}
