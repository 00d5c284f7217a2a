//! Parsing options
//!
//! This module provides the option record a parse call consumes: a
//! section budget, a section filter and an error logger. The parser is
//! always permissive — malformed lines are reported and skipped — so
//! the logger is where a caller observes (and may veto) that recovery.

use core::ops::ControlFlow;

use crate::document::SectionKind;
use crate::error::Error;

/// Decides whether a section about to be created should be kept.
/// Returning `false` skips the section and its entries silently.
pub type SectionFilter<'cb> = &'cb mut dyn FnMut(&[u8], SectionKind) -> bool;

/// Receives every recovered parse error with the line it was detected
/// on. Returning `ControlFlow::Break(())` aborts the parse with
/// [Error::ParseAborted].
pub type ErrorLogger<'cb> = &'cb mut dyn FnMut(Error, u32) -> ControlFlow<()>;

/// Options for one parse call.
pub struct ParseOptions<'cb> {
    /// Stop after this many sections have been created by this call;
    /// 0 means unlimited.
    pub max_sections: usize,
    /// Optional veto over section creation.
    pub section_filter: Option<SectionFilter<'cb>>,
    /// Optional sink for recovered parse errors.
    pub error_logger: Option<ErrorLogger<'cb>>,
}

impl<'cb> Default for ParseOptions<'cb> {
    fn default() -> Self {
        ParseOptions {
            max_sections: 0,
            section_filter: None,
            error_logger: None,
        }
    }
}

impl<'cb> ParseOptions<'cb> {
    /// Create new ParseOptions with default settings
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the section budget for this call
    pub fn with_max_sections(mut self, max_sections: usize) -> Self {
        self.max_sections = max_sections;
        self
    }

    /// Set the section filter
    pub fn with_section_filter(mut self, filter: SectionFilter<'cb>) -> Self {
        self.section_filter = Some(filter);
        self
    }

    /// Set the error logger
    pub fn with_error_logger(mut self, logger: ErrorLogger<'cb>) -> Self {
        self.error_logger = Some(logger);
        self
    }
}
