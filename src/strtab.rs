//! An arena-interned string table.
//! Every unique byte sequence in a document is stored exactly once.
//!
//! A record is `{hash: u32, len: u32}` followed by `len` content bytes
//! and a NUL. The NUL is a storage convention for byte-oriented
//! consumers and is not part of the logical length. [Atom] is the
//! handle to a record; because interning is total, two atoms are equal
//! iff their contents are equal byte-for-byte, which is what makes key
//! comparison in the hashed containers a single integer compare.

use core::hash::Hasher;

use rustc_hash::FxHasher;

use crate::arena::Arena;
use crate::error::Result;
use crate::map;

/// Record header size: cached hash + length, ahead of the content.
pub(crate) const REC_HDR: u32 = 8;

/// A handle to an interned string.
///
/// Atoms are only meaningful with the [Document](crate::Document) that
/// produced them; resolve one with [Document::resolve](crate::Document::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub(crate) u32);

/// The cached 32-bit hash every record carries.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish() as u32
}

pub(crate) fn record_hash(arena: &Arena, atom: Atom) -> u32 {
    arena.u32_at(atom.0)
}

pub(crate) fn record_len(arena: &Arena, atom: Atom) -> u32 {
    arena.u32_at(atom.0 + 4)
}

pub(crate) fn record_bytes(arena: &Arena, atom: Atom) -> &[u8] {
    arena.bytes(atom.0 + REC_HDR, record_len(arena, atom) as usize)
}

/// Interns `bytes` against the map at `strings`, copying them into a
/// fresh record unless an equal record already exists.
pub(crate) fn intern(arena: &mut Arena, strings: u32, bytes: &[u8]) -> Result<Atom> {
    let hash = hash_bytes(bytes);
    if let Some(node) = map::find_bytes(arena, strings, hash, bytes) {
        return Ok(map::node_key(arena, node));
    }
    let mark = arena.cursor();
    let rec = arena.alloc(REC_HDR as usize + bytes.len() + 1, 4)?;
    arena.set_u32(rec, hash);
    arena.set_u32(rec + 4, bytes.len() as u32);
    arena.copy_in(rec + REC_HDR, bytes);
    // The NUL terminator is already in place: alloc zeroes.
    if let Err(err) = map::insert(arena, strings, Atom(rec), map::NODE_HDR as usize) {
        arena.set_cursor(mark);
        return Err(err);
    }
    Ok(Atom(rec))
}

/// Adopts a string the parser already materialized at the arena tail:
/// `start` is the record offset (header space reserved), the content
/// and its NUL sit behind it, and the cursor is at the content's end.
/// A duplicate is discarded by rolling the cursor back to `mark`, the
/// cursor value observed before the record was started.
pub(crate) fn intern_scratch(
    arena: &mut Arena,
    strings: u32,
    mark: u32,
    start: u32,
    len: usize,
) -> Result<Atom> {
    let hash = hash_bytes(arena.bytes(start + REC_HDR, len));
    if let Some(node) = {
        let bytes = arena.bytes(start + REC_HDR, len);
        map::find_bytes(arena, strings, hash, bytes)
    } {
        let existing = map::node_key(arena, node);
        arena.set_cursor(mark);
        return Ok(existing);
    }
    arena.set_u32(start, hash);
    arena.set_u32(start + 4, len as u32);
    if let Err(err) = map::insert(arena, strings, Atom(start), map::NODE_HDR as usize) {
        arena.set_cursor(mark);
        return Err(err);
    }
    Ok(Atom(start))
}

/// An in-progress scratch string at the arena tail.
///
/// The parser decodes into one of these byte by byte, then either
/// commits it through [Scratch::finish] or abandons it through
/// [Scratch::discard], which is the only legal backwards move of the
/// arena cursor.
pub(crate) struct Scratch {
    mark: u32,
    start: u32,
    len: usize,
}

impl Scratch {
    pub(crate) fn begin(arena: &mut Arena) -> Result<Scratch> {
        let mark = arena.cursor();
        let start = arena.alloc(REC_HDR as usize, 4)?;
        Ok(Scratch { mark, start, len: 0 })
    }

    pub(crate) fn push(&mut self, arena: &mut Arena, byte: u8) -> Result<()> {
        let off = arena.alloc(1, 1)?;
        arena.set_byte(off, byte);
        self.len += 1;
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn bytes<'a>(&self, arena: &'a Arena) -> &'a [u8] {
        arena.bytes(self.start + REC_HDR, self.len)
    }

    /// Drops trailing spaces, tabs and carriage returns, giving the
    /// bytes back to the arena.
    pub(crate) fn trim_trailing_whitespace(&mut self, arena: &mut Arena) {
        while self.len > 0 {
            let last = arena.byte_at(self.start + REC_HDR + self.len as u32 - 1);
            if !matches!(last, b' ' | b'\t' | b'\r') {
                break;
            }
            self.len -= 1;
            arena.set_cursor(self.start + REC_HDR + self.len as u32);
        }
    }

    /// NUL-terminates and interns the scratch bytes; a duplicate rolls
    /// the whole scratch region back.
    pub(crate) fn finish(self, arena: &mut Arena, strings: u32) -> Result<Atom> {
        if let Err(err) = arena.alloc(1, 1) {
            arena.set_cursor(self.mark);
            return Err(err);
        }
        intern_scratch(arena, strings, self.mark, self.start, self.len)
    }

    pub(crate) fn discard(self, arena: &mut Arena) {
        arena.set_cursor(self.mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> (Arena, u32) {
        let mut arena = Arena::new(alloc::vec![0; 1 << 16]);
        let strings = map::init(&mut arena).unwrap();
        (arena, strings)
    }

    #[test]
    fn interning_is_idempotent() {
        let (mut arena, strings) = arena();
        let a = intern(&mut arena, strings, b"printf").unwrap();
        let b = intern(&mut arena, strings, b"printf").unwrap();
        assert_eq!(a, b);
        let c = intern(&mut arena, strings, b"memmove").unwrap();
        assert_ne!(a, c);
        assert_eq!(record_bytes(&arena, a), b"printf");
        assert_eq!(record_bytes(&arena, c), b"memmove");
    }

    #[test]
    fn records_are_nul_terminated() {
        let (mut arena, strings) = arena();
        let a = intern(&mut arena, strings, b"busta").unwrap();
        assert_eq!(record_len(&arena, a), 5);
        assert_eq!(arena.byte_at(a.0 + REC_HDR + 5), 0);
    }

    #[test]
    fn scratch_duplicate_is_discarded() {
        let (mut arena, strings) = arena();
        let first = intern(&mut arena, strings, b"dup").unwrap();
        let before = arena.cursor();
        let mut scratch = Scratch::begin(&mut arena).unwrap();
        for &b in b"dup" {
            scratch.push(&mut arena, b).unwrap();
        }
        let again = scratch.finish(&mut arena, strings).unwrap();
        assert_eq!(first, again);
        assert_eq!(arena.cursor(), before);
    }

    #[test]
    fn scratch_trim() {
        let (mut arena, strings) = arena();
        let mut scratch = Scratch::begin(&mut arena).unwrap();
        for &b in b"value \t\r" {
            scratch.push(&mut arena, b).unwrap();
        }
        scratch.trim_trailing_whitespace(&mut arena);
        let atom = scratch.finish(&mut arena, strings).unwrap();
        assert_eq!(record_bytes(&arena, atom), b"value");
    }

    #[test]
    fn empty_string_interns_once() {
        let (mut arena, strings) = arena();
        let a = intern(&mut arena, strings, b"").unwrap();
        let scratch = Scratch::begin(&mut arena).unwrap();
        let b = scratch.finish(&mut arena, strings).unwrap();
        assert_eq!(a, b);
    }
}
