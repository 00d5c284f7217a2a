//! A custom LSML error and result type

use core::fmt;
use core::result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A custom LSML error
pub enum Error {
    /// The document's arena is exhausted; the buffer supplied at
    /// construction is the hard upper bound and is never grown
    OutOfMemory,
    /// The error logger callback requested that the parse stop
    ParseAborted,
    /// No section, key or index matched the lookup
    NotFound,
    /// The handle does not belong to this document
    InvalidData,
    /// A name was empty where a non-empty name is required
    InvalidKey,
    /// The section handle is not resident in this document's arena
    InvalidSection,
    /// The section exists but is not of the requested kind
    SectionType,
    /// The bytes do not parse as the requested value type
    ValueFormat,
    /// The value parsed but had to be clamped to the type's range
    ValueRange,
    /// A quoted or escaped string ran into the end of its line
    MissingEndQuote,
    /// An escape sequence in a backtick string could not be decoded
    TextInvalidEscape,
    /// A non-comment line appeared before the first section header
    TextOutsideSection,
    /// Non-whitespace bytes followed a closing quote
    TextAfterEndQuote,
    /// Non-whitespace bytes followed a closing section delimiter
    TextAfterSectionHeader,
    /// A section header was not closed before the end of its line
    SectionHeaderUnclosed,
    /// A section header carried an empty name
    SectionNameEmpty,
    /// A section with this name already exists in the document
    SectionNameReused,
    /// The key already exists in this table section
    TableKeyReused,
    /// A table entry line carried no `=` separator
    TableEntryMissingEquals,
}

impl Error {
    /// Whether the parser recovers from this error at the next line.
    ///
    /// [Error::OutOfMemory] and [Error::ParseAborted] terminate a parse;
    /// every other parse-time error is delivered to the logger and the
    /// parser resumes at the following line.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::OutOfMemory | Error::ParseAborted)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(fmt, "Document arena is out of memory"),
            Error::ParseAborted => write!(fmt, "Parse aborted by the error logger"),
            Error::NotFound => write!(fmt, "Not found"),
            Error::InvalidData => write!(fmt, "Handle does not belong to this document"),
            Error::InvalidKey => write!(fmt, "Empty name"),
            Error::InvalidSection => write!(fmt, "Invalid section handle"),
            Error::SectionType => write!(fmt, "Section is not of the requested kind"),
            Error::ValueFormat => write!(fmt, "Value does not parse as the requested type"),
            Error::ValueRange => write!(fmt, "Value out of range for the requested type"),
            Error::MissingEndQuote => write!(fmt, "String is missing its end quote"),
            Error::TextInvalidEscape => write!(fmt, "Invalid escape sequence"),
            Error::TextOutsideSection => write!(fmt, "Text outside of any section"),
            Error::TextAfterEndQuote => write!(fmt, "Text after end quote"),
            Error::TextAfterSectionHeader => write!(fmt, "Text after section header"),
            Error::SectionHeaderUnclosed => write!(fmt, "Section header is not closed"),
            Error::SectionNameEmpty => write!(fmt, "Section name is empty"),
            Error::SectionNameReused => write!(fmt, "Section name is already in use"),
            Error::TableKeyReused => write!(fmt, "Table key is already in use"),
            Error::TableEntryMissingEquals => write!(fmt, "Table entry is missing '='"),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
