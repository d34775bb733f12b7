use std::path::PathBuf;

/// All errors that can occur while reading QUBE products.
#[derive(Debug)]
pub enum Error {
    /// The referenced data or label file does not exist.
    FileNotFound(PathBuf),
    /// The file exists but does not carry the expected format signature.
    InvalidFormat(&'static str),
    /// A required label keyword was not found.
    MissingKey(&'static str),
    /// A label value is present but could not be interpreted.
    InvalidValue(&'static str),
    /// A timestamp did not match the expected day-of-year pattern.
    MalformedTimestamp(String),
    /// The declared axis order is not one of the supported permutations.
    UnsupportedAxisOrder(String),
    /// CORE_ITEM_BYTES is not 2 or 4.
    UnsupportedItemSize(u32),
    /// A line-oriented label ended without its END/FIN sentinel.
    TruncatedLabel,
    /// A computed read would run past the end of the file.
    Bounds { needed: usize, available: usize },
    /// An index (band, wavelength, sample, line) is outside the cube.
    OutOfRange(&'static str),
    /// A catalog entry name collision or missing entry.
    Catalog(String),
    /// An I/O error from the standard library.
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            Error::InvalidFormat(what) => write!(f, "invalid file format: {what}"),
            Error::MissingKey(key) => write!(f, "missing required label key: {key}"),
            Error::InvalidValue(key) => write!(f, "invalid label value for {key}"),
            Error::MalformedTimestamp(t) => write!(f, "malformed timestamp: {t}"),
            Error::UnsupportedAxisOrder(order) => {
                write!(f, "unsupported AXIS_NAME order: {order}")
            }
            Error::UnsupportedItemSize(n) => {
                write!(f, "unsupported CORE_ITEM_BYTES value: {n}")
            }
            Error::TruncatedLabel => write!(f, "label ended without END/FIN sentinel"),
            Error::Bounds { needed, available } => {
                write!(f, "read of {needed} bytes exceeds {available} available")
            }
            Error::OutOfRange(what) => write!(f, "index out of range: {what}"),
            Error::Catalog(msg) => write!(f, "catalog error: {msg}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
