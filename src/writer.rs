//! Serialization of a document back to LSML text.
//!
//! The writer picks the cheapest string flavor that survives a
//! re-parse: bare text where the bytes carry no delimiter, brace or
//! edge whitespace, a quoted string where they do, and a backtick
//! string with escapes once control bytes, quotes or invalid UTF-8
//! appear. Writing a document and parsing the output reproduces the
//! same sections, entries and rows.

use std::io::{self, Write};

use crate::document::{Document, SectionId, SectionKind};

#[derive(PartialEq)]
enum Flavor {
    Bare,
    Quoted(u8),
    Escaped,
}

fn is_bare_safe(byte: u8) -> bool {
    // Printable, and not a byte that means something somewhere: a
    // comment or delimiter mid-line, or a header brace in column 0.
    !byte.is_ascii_control()
        && !matches!(
            byte,
            b'#' | b'=' | b',' | b'"' | b'\'' | b'`' | b'{' | b'}' | b'[' | b']'
        )
}

fn flavor(bytes: &[u8]) -> Flavor {
    if bytes.iter().any(|&b| {
        (b.is_ascii_control() && b != b'\t') || matches!(b, b'"' | b'\'' | b'`')
    }) || core::str::from_utf8(bytes).is_err()
    {
        return Flavor::Escaped;
    }
    let edge_space = bytes.first().map_or(false, |b| b.is_ascii_whitespace())
        || bytes.last().map_or(false, |b| b.is_ascii_whitespace());
    if bytes.is_empty() || edge_space || bytes.iter().any(|&b| !is_bare_safe(b)) {
        Flavor::Quoted(b'"')
    } else {
        Flavor::Bare
    }
}

fn write_string<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    match flavor(bytes) {
        Flavor::Bare => w.write_all(bytes),
        Flavor::Quoted(quote) => {
            w.write_all(&[quote])?;
            w.write_all(bytes)?;
            w.write_all(&[quote])
        }
        Flavor::Escaped => {
            w.write_all(b"`")?;
            for &byte in bytes {
                match byte {
                    b'\\' => w.write_all(b"\\\\")?,
                    b'`' => w.write_all(b"\\`")?,
                    b'\n' => w.write_all(b"\\n")?,
                    b'\r' => w.write_all(b"\\r")?,
                    b'\t' => w.write_all(b"\\t")?,
                    _ if byte.is_ascii_control() || !byte.is_ascii() => {
                        write!(w, "\\x{:02X}", byte)?
                    }
                    _ => w.write_all(&[byte])?,
                }
            }
            w.write_all(b"`")
        }
    }
}

fn write_section<W: Write>(
    doc: &Document,
    w: &mut W,
    id: SectionId,
    kind: SectionKind,
) -> io::Result<()> {
    let name = doc.section_name(id).unwrap_or(b"");
    match kind {
        SectionKind::Table => {
            w.write_all(b"{")?;
            write_string(w, name)?;
            w.write_all(b"}\n")?;
            if let Ok(entries) = doc.table_entries(id) {
                for (key, value) in entries {
                    write_string(w, doc.resolve(key))?;
                    w.write_all(b" = ")?;
                    write_string(w, doc.resolve(value))?;
                    w.write_all(b"\n")?;
                }
            }
        }
        SectionKind::Array => {
            w.write_all(b"[")?;
            write_string(w, name)?;
            w.write_all(b"]\n")?;
            if let Ok(items) = doc.array_items_2d(id) {
                let mut row = 0;
                let mut open = false;
                for ((r, c), value) in items {
                    if open && r != row {
                        w.write_all(b"\n")?;
                    }
                    if c > 0 {
                        w.write_all(b", ")?;
                    }
                    write_string(w, doc.resolve(value))?;
                    row = r;
                    open = true;
                }
                if open {
                    w.write_all(b"\n")?;
                }
            }
        }
    }
    Ok(())
}

/// Writes the whole document as LSML text.
pub fn write_document<W: Write>(doc: &Document, w: &mut W) -> io::Result<()> {
    let mut first = true;
    for (id, kind) in doc.sections() {
        if !first {
            w.write_all(b"\n")?;
        }
        first = false;
        write_section(doc, w, id, kind)?;
    }
    Ok(())
}

/// The document as LSML text in a fresh buffer.
pub fn to_vec(doc: &Document) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_document(doc, &mut out);
    out
}
