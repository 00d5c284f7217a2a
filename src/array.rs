//! The chunked value array behind array sections.
//!
//! Values live in fixed-size chunks linked head to tail; rows are
//! tracked by a separate linked list of 1D start offsets. Row 0 starts
//! implicitly at 0, so the list only records rows that begin after at
//! least one value was pushed. Everything is append-only.

use crate::arena::Arena;
use crate::error::Result;
use crate::strtab::Atom;

/// Value slots per chunk.
pub(crate) const CHUNK_LEN: u32 = 16;

/// Chunk layout: `{next: u32, slots: [u32; CHUNK_LEN]}`.
const CHUNK_SIZE: usize = 4 + 4 * CHUNK_LEN as usize;

/// Array state field offsets, relative to the 24-byte state block that
/// a section node embeds: `{head, tail, len, row_head, row_tail,
/// row_records}`.
const ARR_HEAD: u32 = 0;
const ARR_TAIL: u32 = 4;
const ARR_LEN: u32 = 8;
const ARR_ROW_HEAD: u32 = 12;
const ARR_ROW_TAIL: u32 = 16;
const ARR_ROW_RECS: u32 = 20;

pub(crate) fn len(arena: &Arena, arr: u32) -> usize {
    arena.u32_at(arr + ARR_LEN) as usize
}

/// Offset of the first value chunk; 0 while the array is empty.
pub(crate) fn head_chunk(arena: &Arena, arr: u32) -> u32 {
    arena.u32_at(arr + ARR_HEAD)
}

/// Offset of the first row record; 0 while only row 0 exists.
pub(crate) fn row_head(arena: &Arena, arr: u32) -> u32 {
    arena.u32_at(arr + ARR_ROW_HEAD)
}

/// Appends `value`. When `new_row` is set and the array is non-empty, a
/// row record for the value's 1D position is linked in first.
pub(crate) fn push(arena: &mut Arena, arr: u32, value: Atom, new_row: bool) -> Result<()> {
    let count = arena.u32_at(arr + ARR_LEN);
    let mut tail = arena.u32_at(arr + ARR_TAIL);
    // Make sure a slot exists before linking anything else in, so a
    // failed allocation leaves the array consistent.
    if count % CHUNK_LEN == 0 {
        let chunk = arena.alloc(CHUNK_SIZE, 4)?;
        if tail == 0 {
            arena.set_u32(arr + ARR_HEAD, chunk);
        } else {
            arena.set_u32(tail, chunk);
        }
        arena.set_u32(arr + ARR_TAIL, chunk);
        tail = chunk;
    }
    if new_row && count > 0 {
        let record = arena.alloc(8, 4)?;
        arena.set_u32(record + 4, count);
        let row_tail = arena.u32_at(arr + ARR_ROW_TAIL);
        if row_tail == 0 {
            arena.set_u32(arr + ARR_ROW_HEAD, record);
        } else {
            arena.set_u32(row_tail, record);
        }
        arena.set_u32(arr + ARR_ROW_TAIL, record);
        arena.set_u32(arr + ARR_ROW_RECS, arena.u32_at(arr + ARR_ROW_RECS) + 1);
    }
    arena.set_u32(tail + 4 + 4 * (count % CHUNK_LEN), value.0);
    arena.set_u32(arr + ARR_LEN, count + 1);
    Ok(())
}

pub(crate) fn get(arena: &Arena, arr: u32, index: usize) -> Option<Atom> {
    if index >= len(arena, arr) {
        return None;
    }
    let index = index as u32;
    let mut chunk = arena.u32_at(arr + ARR_HEAD);
    for _ in 0..index / CHUNK_LEN {
        chunk = arena.u32_at(chunk);
    }
    Some(Atom(arena.u32_at(chunk + 4 + 4 * (index % CHUNK_LEN))))
}

/// 1D start offset of `row`, or None past the last row.
fn row_start(arena: &Arena, arr: u32, row: usize) -> Option<u32> {
    if row == 0 {
        return Some(0);
    }
    let mut record = arena.u32_at(arr + ARR_ROW_HEAD);
    for _ in 1..row {
        if record == 0 {
            return None;
        }
        record = arena.u32_at(record);
    }
    if record == 0 {
        None
    } else {
        Some(arena.u32_at(record + 4))
    }
}

pub(crate) fn rows(arena: &Arena, arr: u32) -> usize {
    if len(arena, arr) == 0 {
        0
    } else {
        arena.u32_at(arr + ARR_ROW_RECS) as usize + 1
    }
}

pub(crate) fn get_2d(arena: &Arena, arr: u32, row: usize, col: usize) -> Option<Atom> {
    let total = len(arena, arr) as u32;
    if total == 0 {
        return None;
    }
    let start = row_start(arena, arr, row)?;
    let end = row_start(arena, arr, row + 1).unwrap_or(total);
    let index = start.checked_add(u32::try_from(col).ok()?)?;
    if index >= end {
        return None;
    }
    get(arena, arr, index as usize)
}

/// (rows, columns) where columns is the widest row when `jagged`, the
/// narrowest otherwise.
pub(crate) fn size_2d(arena: &Arena, arr: u32, jagged: bool) -> (usize, usize) {
    let total = len(arena, arr) as u32;
    if total == 0 {
        return (0, 0);
    }
    let nrows = rows(arena, arr);
    let mut cols: Option<u32> = None;
    let mut start = 0u32;
    let mut record = arena.u32_at(arr + ARR_ROW_HEAD);
    loop {
        let end = if record == 0 {
            total
        } else {
            arena.u32_at(record + 4)
        };
        let width = end - start;
        cols = Some(match cols {
            None => width,
            Some(prev) if jagged => prev.max(width),
            Some(prev) => prev.min(width),
        });
        if record == 0 {
            break;
        }
        start = end;
        record = arena.u32_at(record);
    }
    (nrows, cols.unwrap_or(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;
    use crate::strtab;

    fn fixture(values: &[(&[u8], bool)]) -> (Arena, u32) {
        let mut arena = Arena::new(alloc::vec![0; 1 << 16]);
        let strings = map::init(&mut arena).unwrap();
        let arr = arena.alloc(24, 4).unwrap();
        for &(value, new_row) in values {
            let atom = strtab::intern(&mut arena, strings, value).unwrap();
            push(&mut arena, arr, atom, new_row).unwrap();
        }
        (arena, arr)
    }

    fn text<'a>(arena: &'a Arena, atom: Atom) -> &'a [u8] {
        strtab::record_bytes(arena, atom)
    }

    #[test]
    fn push_and_get_across_chunks() {
        let values: alloc::vec::Vec<alloc::string::String> =
            (0..40).map(|i| alloc::format!("v{}", i)).collect();
        let items: alloc::vec::Vec<(&[u8], bool)> =
            values.iter().map(|v| (v.as_bytes(), false)).collect();
        let (arena, arr) = fixture(&items);
        assert_eq!(len(&arena, arr), 40);
        assert_eq!(text(&arena, get(&arena, arr, 0).unwrap()), b"v0");
        assert_eq!(text(&arena, get(&arena, arr, 17).unwrap()), b"v17");
        assert_eq!(text(&arena, get(&arena, arr, 39).unwrap()), b"v39");
        assert!(get(&arena, arr, 40).is_none());
    }

    #[test]
    fn jagged_rows() {
        // 1,2,3 / 4,5 / 6
        let (arena, arr) = fixture(&[
            (b"1", true),
            (b"2", false),
            (b"3", false),
            (b"4", true),
            (b"5", false),
            (b"6", true),
        ]);
        assert_eq!(text(&arena, get(&arena, arr, 4).unwrap()), b"5");
        assert_eq!(text(&arena, get_2d(&arena, arr, 2, 0).unwrap()), b"6");
        assert!(get_2d(&arena, arr, 1, 2).is_none());
        assert!(get_2d(&arena, arr, 3, 0).is_none());
        assert_eq!(size_2d(&arena, arr, true), (3, 3));
        assert_eq!(size_2d(&arena, arr, false), (3, 1));
    }

    #[test]
    fn first_row_is_implicit() {
        // A leading new_row on an empty array records nothing.
        let (arena, arr) = fixture(&[(b"only", true)]);
        assert_eq!(rows(&arena, arr), 1);
        assert_eq!(size_2d(&arena, arr, true), (1, 1));
        assert_eq!(size_2d(&arena, arr, false), (1, 1));
    }

    #[test]
    fn empty_array() {
        let (arena, arr) = fixture(&[]);
        assert_eq!(rows(&arena, arr), 0);
        assert_eq!(size_2d(&arena, arr, true), (0, 0));
        assert!(get_2d(&arena, arr, 0, 0).is_none());
    }
}
