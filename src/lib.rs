//! # lsml
//!
//! A resilient, arena-backed engine for LSML ("Listed Sections Markup
//! Language"), a line-oriented configuration format that crosses the
//! readability of INI with CSV rows:
//!
//! ```text
//! # a table section
//! {server}
//! host = example.com
//! port = 8080
//!
//! # an array section, rows of comma-separated values
//! [limits]
//! 10, 20, 30
//! 40, 50
//! ```
//!
//! Three things set the engine apart from a hashmap-of-strings:
//!
//! - **It never aborts on a malformed line.** Every syntax error is
//!   reported through a logger callback with its line number and the
//!   parser resumes at the next line, so a damaged document still
//!   yields everything that could be recovered.
//! - **Everything lives in one caller-supplied buffer.** Sections,
//!   hashmaps, rows and every unique string are bump-allocated from a
//!   single arena; the buffer is the hard memory bound and nothing a
//!   document hands out is ever invalidated by later growth.
//! - **Values are typed at read time.** The document stores text; the
//!   [value] interpreters turn a stored slice into integers of any
//!   width (with `0x`/`0o`/`0b` prefixes and float fallback), floats,
//!   strict booleans, or `{}`/`[]` section references, clamping on
//!   range instead of failing.
//!
//! ```
//! use lsml::{Document, SectionKind};
//!
//! let mut doc = Document::with_capacity(16 * 1024)?;
//! doc.parse_bytes(b"{server}\nport = 0x1F90\n[limits]\n10, 20\n")?;
//!
//! let server = doc.section(Some(SectionKind::Table), b"server")?;
//! let port = doc.table_get(server, b"port")?;
//! assert_eq!(lsml::value::to_u16(doc.resolve(port))?.get(), 8080);
//!
//! let limits = doc.section(Some(SectionKind::Array), b"limits")?;
//! assert_eq!(doc.array_size_2d(limits, true)?, (1, 2));
//! # Ok::<(), lsml::Error>(())
//! ```
//!
//! # Feature flags
//!
//! - `std` (default): the [std::io::Read] byte-source adapter, the
//!   text [writer] and `std::error::Error`. Without it the crate is
//!   `no_std` + `alloc`.
//! - `cli`: the `lsmldump` inspection binary.
//! - `load_factor_100` / `load_factor_200`: raise the hashmaps'
//!   growth threshold from the default 0.8 to 1.0 or 2.0 entries per
//!   bucket.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod options;
pub mod reader;
pub mod strtab;
pub mod value;
#[cfg(feature = "std")]
pub mod writer;

mod arena;
mod array;
mod document;
mod map;
mod parser;

pub use crate::document::{
    Array2dItems, ArrayItems, Document, SectionId, SectionKind, Sections, TableEntries,
};
pub use crate::error::{Error, Result};
pub use crate::options::ParseOptions;
#[cfg(feature = "std")]
pub use crate::reader::IoSource;
pub use crate::reader::{ByteSource, SliceSource};
pub use crate::strtab::Atom;
pub use crate::value::Num;
