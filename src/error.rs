use std::fmt;

#[derive(Debug)]
pub enum PlateFillError {
    /// The render request does not contain a string for a field the
    /// placement table requires. The whole render is rejected.
    MissingField(String),
    /// Broken setup: out-of-range page index, empty placement table,
    /// builder misuse. Not recoverable at render time.
    InvalidConfiguration(String),
    Template(String),
    Image(String),
    Asset(String),
    Io(std::io::Error),
}

impl fmt::Display for PlateFillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlateFillError::MissingField(field) => {
                write!(f, "render request is missing field: {}", field)
            }
            PlateFillError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PlateFillError::Template(message) => write!(f, "template error: {}", message),
            PlateFillError::Image(message) => write!(f, "image error: {}", message),
            PlateFillError::Asset(message) => write!(f, "asset error: {}", message),
            PlateFillError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PlateFillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlateFillError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlateFillError {
    fn from(value: std::io::Error) -> Self {
        PlateFillError::Io(value)
    }
}

pub(crate) fn pdf_err(err: lopdf::Error) -> PlateFillError {
    PlateFillError::Template(format!("pdf error: {err}"))
}
