//! The in-memory LSML document: an arena, an interned string table and
//! a section store.
//!
//! A [Document] owns a single byte buffer supplied at construction;
//! every section, table entry, array value and interned string lives
//! inside it. Handles ([Atom], [SectionId]) are arena offsets: nothing
//! a document hands out is invalidated by later pushes or by hashmap
//! growth, only by [Document::clear].
//!
//! ```
//! let mut doc = lsml::Document::with_capacity(4096)?;
//! doc.parse_bytes(b"{greeting}\nhello = world\n")?;
//! let table = doc.section(Some(lsml::SectionKind::Table), b"greeting")?;
//! let value = doc.table_get(table, b"hello")?;
//! assert_eq!(doc.resolve(value), b"world");
//! # Ok::<(), lsml::Error>(())
//! ```

use alloc::vec::Vec;

use crate::arena::Arena;
use crate::array;
use crate::error::{Error, Result};
use crate::map;
use crate::options::ParseOptions;
use crate::parser::Parser;
use crate::reader::{ByteSource, SliceSource};
use crate::strtab::{self, Atom};

/// What flavor of container a section is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// An unordered key/value table.
    Table,
    /// An ordered value array with row structure.
    Array,
}

/// Section node layout: `{next, name, kind}` then a 24-byte state
/// block (a 12-byte map header for tables, the array state for arrays).
const SECT_KIND: u32 = 8;
const SECT_STATE: u32 = 12;
const SECT_NODE_SIZE: usize = 36;

const KIND_TABLE: u32 = 1;
const KIND_ARRAY: u32 = 2;

/// A handle to a section of a [Document].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub(crate) u32);

/// An LSML document.
pub struct Document {
    pub(crate) arena: Arena,
    /// Map header offset: section name -> section node.
    pub(crate) sections: u32,
    /// Map header offset: content bytes -> interned record.
    pub(crate) strings: u32,
}

impl Document {
    /// Builds a document over `buffer`, which is the hard allocation
    /// bound for everything the document will ever hold.
    pub fn new(buffer: Vec<u8>) -> Result<Document> {
        if buffer.len() > u32::MAX as usize {
            return Err(Error::InvalidData);
        }
        let mut arena = Arena::new(buffer);
        let sections = map::init(&mut arena)?;
        let strings = map::init(&mut arena)?;
        Ok(Document {
            arena,
            sections,
            strings,
        })
    }

    /// Builds a document over a fresh zeroed buffer of `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> Result<Document> {
        Document::new(alloc::vec![0; bytes])
    }

    /// Drops every section and string, recycling the buffer. All
    /// previously returned handles and iterators are invalidated.
    pub fn clear(&mut self) {
        self.arena.reset();
        // The two map headers are the first allocations of a fresh
        // arena, so re-running init lands them at the same offsets.
        let sections = map::init(&mut self.arena);
        let strings = map::init(&mut self.arena);
        debug_assert!(sections.is_ok() && strings.is_ok());
        if let (Ok(sections), Ok(strings)) = (sections, strings) {
            self.sections = sections;
            self.strings = strings;
        }
    }

    /// Bytes of the buffer currently in use.
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Total buffer size.
    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Interns `bytes`, returning the unique handle for that content.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<Atom> {
        strtab::intern(&mut self.arena, self.strings, bytes)
    }

    /// The content of an interned string. A handle that does not
    /// belong to this document resolves to the empty slice.
    pub fn resolve(&self, atom: Atom) -> &[u8] {
        self.try_resolve(atom).unwrap_or(b"")
    }

    /// The content of an interned string, or [Error::InvalidData] for a
    /// handle this document never handed out.
    pub fn try_resolve(&self, atom: Atom) -> Result<&[u8]> {
        let cursor = u64::from(self.arena.cursor());
        if atom.0 % 4 != 0
            || !self.arena.owns(atom.0)
            || u64::from(atom.0) + u64::from(strtab::REC_HDR) > cursor
        {
            return Err(Error::InvalidData);
        }
        let end = u64::from(atom.0)
            + u64::from(strtab::REC_HDR)
            + u64::from(strtab::record_len(&self.arena, atom));
        if end > cursor {
            return Err(Error::InvalidData);
        }
        Ok(strtab::record_bytes(&self.arena, atom))
    }

    /// The content of an interned string as UTF-8 text, when it is.
    pub fn resolve_str(&self, atom: Atom) -> Option<&str> {
        core::str::from_utf8(self.resolve(atom)).ok()
    }

    /// Looks a section up by name. A `kind` filter of `None` accepts
    /// either flavor; a specific filter fails [Error::SectionType] when
    /// the name resolves to the other one.
    pub fn section(&self, kind: Option<SectionKind>, name: &[u8]) -> Result<SectionId> {
        if name.is_empty() {
            return Err(Error::InvalidKey);
        }
        let hash = strtab::hash_bytes(name);
        let node = map::find_bytes(&self.arena, self.sections, hash, name).ok_or(Error::NotFound)?;
        let id = SectionId(node);
        match kind {
            Some(want) if want != self.kind_of(node) => Err(Error::SectionType),
            _ => Ok(id),
        }
    }

    /// Creates an empty section. The name must be unique and non-empty.
    pub fn add_section(&mut self, kind: SectionKind, name: &[u8]) -> Result<SectionId> {
        if name.is_empty() {
            return Err(Error::InvalidKey);
        }
        let atom = self.intern(name)?;
        self.add_section_with(kind, atom)
    }

    /// Section creation over an already-interned name; shared with the
    /// parser, which holds an [Atom] by the time it creates one.
    pub(crate) fn add_section_with(&mut self, kind: SectionKind, name: Atom) -> Result<SectionId> {
        let (node, created) = map::insert(&mut self.arena, self.sections, name, SECT_NODE_SIZE)?;
        if !created {
            return Err(Error::SectionNameReused);
        }
        let tag = match kind {
            SectionKind::Table => KIND_TABLE,
            SectionKind::Array => KIND_ARRAY,
        };
        self.arena.set_u32(node + SECT_KIND, tag);
        log::debug!(
            "created {:?} section {:?}",
            kind,
            core::str::from_utf8(self.resolve(name)).unwrap_or("<binary>")
        );
        Ok(SectionId(node))
    }

    fn kind_of(&self, node: u32) -> SectionKind {
        if self.arena.u32_at(node + SECT_KIND) == KIND_ARRAY {
            SectionKind::Array
        } else {
            SectionKind::Table
        }
    }

    /// Validates a handle: it must point at a section node resident in
    /// this document's arena.
    fn check_section(&self, id: SectionId) -> Result<()> {
        let last = id
            .0
            .checked_add(SECT_NODE_SIZE as u32 - 1)
            .ok_or(Error::InvalidSection)?;
        if id.0 % 4 != 0 || !self.arena.owns(id.0) || !self.arena.owns(last) {
            return Err(Error::InvalidSection);
        }
        match self.arena.u32_at(id.0 + SECT_KIND) {
            KIND_TABLE | KIND_ARRAY => Ok(()),
            _ => Err(Error::InvalidSection),
        }
    }

    pub fn section_kind(&self, id: SectionId) -> Result<SectionKind> {
        self.check_section(id)?;
        Ok(self.kind_of(id.0))
    }

    pub fn section_name(&self, id: SectionId) -> Result<&[u8]> {
        self.check_section(id)?;
        self.try_resolve(map::node_key(&self.arena, id.0))
    }

    /// Iterates every section in bucket order; section ordering is not
    /// defined.
    pub fn sections(&self) -> Sections<'_> {
        Sections {
            doc: self,
            walk: map::Walk::new(&self.arena, self.sections),
        }
    }

    fn table_header(&self, id: SectionId) -> Result<u32> {
        self.check_section(id)?;
        if self.kind_of(id.0) != SectionKind::Table {
            return Err(Error::SectionType);
        }
        Ok(id.0 + SECT_STATE)
    }

    fn array_state(&self, id: SectionId) -> Result<u32> {
        self.check_section(id)?;
        if self.kind_of(id.0) != SectionKind::Array {
            return Err(Error::SectionType);
        }
        Ok(id.0 + SECT_STATE)
    }

    /// The value stored under `key`, which may be empty: an empty key
    /// is an ordinary (if eccentric) table key.
    pub fn table_get(&self, id: SectionId, key: &[u8]) -> Result<Atom> {
        let header = self.table_header(id)?;
        let hash = strtab::hash_bytes(key);
        let node = map::find_bytes(&self.arena, header, hash, key).ok_or(Error::NotFound)?;
        Ok(Atom(self.arena.u32_at(node + map::NODE_HDR)))
    }

    /// Inserts `key = value`; at most one entry per key ever exists.
    pub fn table_add(&mut self, id: SectionId, key: &[u8], value: &[u8]) -> Result<()> {
        let header = self.table_header(id)?;
        let key = strtab::intern(&mut self.arena, self.strings, key)?;
        let value = strtab::intern(&mut self.arena, self.strings, value)?;
        self.table_add_with(header, key, value)
    }

    pub(crate) fn table_add_with(&mut self, header: u32, key: Atom, value: Atom) -> Result<()> {
        let (node, created) = map::insert(&mut self.arena, header, key, map::NODE_HDR as usize + 4)?;
        if !created {
            return Err(Error::TableKeyReused);
        }
        self.arena.set_u32(node + map::NODE_HDR, value.0);
        Ok(())
    }

    /// Whether a table already holds `key`; parser-side duplicate probe.
    pub(crate) fn table_contains(&self, header: u32, key: Atom) -> bool {
        map::find_key(&self.arena, header, key).is_some()
    }

    pub(crate) fn table_header_unchecked(&self, id: SectionId) -> u32 {
        id.0 + SECT_STATE
    }

    pub fn table_len(&self, id: SectionId) -> Result<usize> {
        let header = self.table_header(id)?;
        Ok(map::len(&self.arena, header) as usize)
    }

    /// Iterates a table's `(key, value)` pairs in bucket order.
    pub fn table_entries(&self, id: SectionId) -> Result<TableEntries<'_>> {
        let header = self.table_header(id)?;
        Ok(TableEntries {
            doc: self,
            walk: map::Walk::new(&self.arena, header),
        })
    }

    /// Appends `value`; `new_row` starts a fresh row unless the array
    /// is still empty (row 0 starts implicitly).
    pub fn array_push(&mut self, id: SectionId, value: &[u8], new_row: bool) -> Result<()> {
        let state = self.array_state(id)?;
        let value = strtab::intern(&mut self.arena, self.strings, value)?;
        array::push(&mut self.arena, state, value, new_row)
    }

    pub(crate) fn array_push_with(&mut self, state: u32, value: Atom, new_row: bool) -> Result<()> {
        array::push(&mut self.arena, state, value, new_row)
    }

    pub(crate) fn array_state_unchecked(&self, id: SectionId) -> u32 {
        id.0 + SECT_STATE
    }

    pub fn array_len(&self, id: SectionId) -> Result<usize> {
        let state = self.array_state(id)?;
        Ok(array::len(&self.arena, state))
    }

    pub fn array_get(&self, id: SectionId, index: usize) -> Result<Atom> {
        let state = self.array_state(id)?;
        array::get(&self.arena, state, index).ok_or(Error::NotFound)
    }

    /// Reads through the row structure: `row` selects a row start, and
    /// `col` must fall before the next row's start.
    pub fn array_get_2d(&self, id: SectionId, row: usize, col: usize) -> Result<Atom> {
        let state = self.array_state(id)?;
        array::get_2d(&self.arena, state, row, col).ok_or(Error::NotFound)
    }

    /// `(rows, cols)`: the widest row when `jagged`, else the narrowest.
    pub fn array_size_2d(&self, id: SectionId, jagged: bool) -> Result<(usize, usize)> {
        let state = self.array_state(id)?;
        Ok(array::size_2d(&self.arena, state, jagged))
    }

    /// Iterates an array's values in push order.
    pub fn array_items(&self, id: SectionId) -> Result<ArrayItems<'_>> {
        let state = self.array_state(id)?;
        Ok(ArrayItems {
            doc: self,
            chunk: array::head_chunk(&self.arena, state),
            slot: 0,
            remaining: array::len(&self.arena, state),
        })
    }

    /// Iterates an array's values annotated with their `(row, col)`
    /// position.
    pub fn array_items_2d(&self, id: SectionId) -> Result<Array2dItems<'_>> {
        let state = self.array_state(id)?;
        Ok(Array2dItems {
            items: self.array_items(id)?,
            next_record: array::row_head(&self.arena, state),
            index: 0,
            row: 0,
            col: 0,
        })
    }

    /// Streams LSML text out of `source` into this document. Malformed
    /// lines are reported through the options' logger and skipped; only
    /// [Error::OutOfMemory] and [Error::ParseAborted] end the parse
    /// early.
    pub fn parse<S: ByteSource>(&mut self, source: S, options: ParseOptions<'_>) -> Result<()> {
        Parser::new(self, source, options).run()
    }

    /// Parses an in-memory buffer with default options.
    pub fn parse_bytes(&mut self, text: &[u8]) -> Result<()> {
        self.parse(SliceSource::new(text), ParseOptions::default())
    }
}

/// Iterator over a document's sections. Borrows the document; single
/// pass; never invalidated by pushes (only by [Document::clear]).
pub struct Sections<'doc> {
    doc: &'doc Document,
    walk: map::Walk,
}

impl<'doc> Iterator for Sections<'doc> {
    type Item = (SectionId, SectionKind);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.walk.next(&self.doc.arena)?;
        Some((SectionId(node), self.doc.kind_of(node)))
    }
}

/// Iterator over a table's `(key, value)` pairs.
pub struct TableEntries<'doc> {
    doc: &'doc Document,
    walk: map::Walk,
}

impl<'doc> Iterator for TableEntries<'doc> {
    type Item = (Atom, Atom);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.walk.next(&self.doc.arena)?;
        let key = map::node_key(&self.doc.arena, node);
        let value = Atom(self.doc.arena.u32_at(node + map::NODE_HDR));
        Some((key, value))
    }
}

/// Iterator over an array's values in push order.
pub struct ArrayItems<'doc> {
    doc: &'doc Document,
    chunk: u32,
    slot: u32,
    remaining: usize,
}

impl<'doc> Iterator for ArrayItems<'doc> {
    type Item = Atom;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.chunk == 0 {
            return None;
        }
        if self.slot == array::CHUNK_LEN {
            self.chunk = self.doc.arena.u32_at(self.chunk);
            self.slot = 0;
        }
        let value = Atom(self.doc.arena.u32_at(self.chunk + 4 + 4 * self.slot));
        self.slot += 1;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Iterator over an array's values with `(row, col)` annotations. The
/// column resets to 0 at every recorded row start.
pub struct Array2dItems<'doc> {
    items: ArrayItems<'doc>,
    next_record: u32,
    index: u32,
    row: u32,
    col: u32,
}

impl<'doc> Iterator for Array2dItems<'doc> {
    type Item = ((usize, usize), Atom);

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.items.next()?;
        let arena = &self.items.doc.arena;
        if self.next_record != 0 && arena.u32_at(self.next_record + 4) == self.index {
            self.row += 1;
            self.col = 0;
            self.next_record = arena.u32_at(self.next_record);
        }
        let at = (self.row as usize, self.col as usize);
        self.index += 1;
        self.col += 1;
        Some((at, value))
    }
}
