//! The chunked open-hashing map substrate.
//!
//! A map is a 12-byte header `{first_chunk, nchunks, len}` plus a singly
//! linked list of fixed-size bucket chunks, all arena-resident. Each
//! bucket holds the head of a collision chain; nodes are caller-sized
//! but always begin `{next, key}` where `key` is an interned-string
//! handle. Growth appends bucket chunks (doubling) and relocates nodes
//! by relinking only, so a node's offset never changes for the lifetime
//! of the document.

use crate::arena::Arena;
use crate::error::Result;
use crate::strtab::{self, Atom};

/// Buckets per chunk. Power of two, so the chunk walk divides cheaply.
pub(crate) const CHUNK_LEN: u32 = 16;

/// Chunk layout: `{next: u32, buckets: [u32; CHUNK_LEN]}`.
const CHUNK_SIZE: usize = 4 + 4 * CHUNK_LEN as usize;

/// Node layout prefix: `{next: u32, key: u32}`. Payload follows.
pub(crate) const NODE_HDR: u32 = 8;

/// Load factor numerator/denominator selected at compile time; growth
/// triggers once `len > buckets * NUM / DEN`.
#[cfg(feature = "load_factor_200")]
const LOAD: (u64, u64) = (2, 1);
#[cfg(all(feature = "load_factor_100", not(feature = "load_factor_200")))]
const LOAD: (u64, u64) = (1, 1);
#[cfg(not(any(feature = "load_factor_100", feature = "load_factor_200")))]
const LOAD: (u64, u64) = (4, 5);

/// Header field offsets.
const HDR_FIRST: u32 = 0;
const HDR_NCHUNKS: u32 = 4;
const HDR_LEN: u32 = 8;

/// Allocates an empty map header.
pub(crate) fn init(arena: &mut Arena) -> Result<u32> {
    arena.alloc(12, 4)
}

pub(crate) fn len(arena: &Arena, hdr: u32) -> u32 {
    arena.u32_at(hdr + HDR_LEN)
}

pub(crate) fn node_key(arena: &Arena, node: u32) -> Atom {
    Atom(arena.u32_at(node + 4))
}

fn bucket_count(arena: &Arena, hdr: u32) -> u32 {
    arena.u32_at(hdr + HDR_NCHUNKS) * CHUNK_LEN
}

/// Offset of the bucket slot itself (the u32 holding the chain head).
fn bucket_slot(arena: &Arena, hdr: u32, index: u32) -> u32 {
    let mut chunk = arena.u32_at(hdr + HDR_FIRST);
    for _ in 0..index / CHUNK_LEN {
        chunk = arena.u32_at(chunk);
    }
    chunk + 4 + 4 * (index % CHUNK_LEN)
}

/// Identity lookup: the key is interned, so equality is handle equality.
pub(crate) fn find_key(arena: &Arena, hdr: u32, key: Atom) -> Option<u32> {
    if arena.u32_at(hdr + HDR_NCHUNKS) == 0 {
        return None;
    }
    let index = strtab::record_hash(arena, key) % bucket_count(arena, hdr);
    let mut node = arena.u32_at(bucket_slot(arena, hdr, index));
    while node != 0 {
        if arena.u32_at(node + 4) == key.0 {
            return Some(node);
        }
        node = arena.u32_at(node);
    }
    None
}

/// Byte lookup, used when the caller does not hold an interned handle
/// yet: compares the cached hash, then length, then content.
pub(crate) fn find_bytes(arena: &Arena, hdr: u32, hash: u32, bytes: &[u8]) -> Option<u32> {
    if arena.u32_at(hdr + HDR_NCHUNKS) == 0 {
        return None;
    }
    let index = hash % bucket_count(arena, hdr);
    let mut node = arena.u32_at(bucket_slot(arena, hdr, index));
    while node != 0 {
        let key = node_key(arena, node);
        if strtab::record_hash(arena, key) == hash
            && strtab::record_len(arena, key) as usize == bytes.len()
            && strtab::record_bytes(arena, key) == bytes
        {
            return Some(node);
        }
        node = arena.u32_at(node);
    }
    None
}

/// Returns the node for `key`, creating a zeroed node of `node_size`
/// bytes at the chain tail when absent. The flag reports creation.
pub(crate) fn insert(
    arena: &mut Arena,
    hdr: u32,
    key: Atom,
    node_size: usize,
) -> Result<(u32, bool)> {
    let mark = arena.cursor();
    let first_insert = arena.u32_at(hdr + HDR_NCHUNKS) == 0;
    if first_insert {
        let chunk = arena.alloc(CHUNK_SIZE, 4)?;
        arena.set_u32(hdr + HDR_FIRST, chunk);
        arena.set_u32(hdr + HDR_NCHUNKS, 1);
    }
    let index = strtab::record_hash(arena, key) % bucket_count(arena, hdr);
    let mut slot = bucket_slot(arena, hdr, index);
    let mut node = arena.u32_at(slot);
    while node != 0 {
        if arena.u32_at(node + 4) == key.0 {
            return Ok((node, false));
        }
        slot = node;
        node = arena.u32_at(node);
    }
    let node = match arena.alloc(node_size, 4) {
        Ok(node) => node,
        Err(err) => {
            // Unwind a bucket chunk created on this call, so callers
            // rolling their own cursor marks back cannot strand it.
            if first_insert {
                arena.set_u32(hdr + HDR_FIRST, 0);
                arena.set_u32(hdr + HDR_NCHUNKS, 0);
                arena.set_cursor(mark);
            }
            return Err(err);
        }
    };
    arena.set_u32(node + 4, key.0);
    arena.set_u32(slot, node);
    arena.set_u32(hdr + HDR_LEN, len(arena, hdr) + 1);
    grow_if_needed(arena, hdr);
    Ok((node, true))
}

/// Doubles the bucket array once the load factor is exceeded.
///
/// New chunks are appended to the chunk list; only the original buckets
/// are walked, and a node whose index changed is unlinked and appended
/// to its new chain. Node offsets never change. If the chunk
/// allocation fails the cursor is rolled back and the map stays on its
/// old layout; the next insert retries.
fn grow_if_needed(arena: &mut Arena, hdr: u32) {
    let nchunks = arena.u32_at(hdr + HDR_NCHUNKS);
    let buckets = nchunks * CHUNK_LEN;
    if len(arena, hdr) as u64 * LOAD.1 <= buckets as u64 * LOAD.0 {
        return;
    }
    let mark = arena.cursor();
    let mut fresh = 0u32;
    let mut fresh_tail = 0u32;
    for _ in 0..nchunks {
        let chunk = match arena.alloc(CHUNK_SIZE, 4) {
            Ok(chunk) => chunk,
            Err(_) => {
                arena.set_cursor(mark);
                log::debug!("map growth deferred: arena exhausted");
                return;
            }
        };
        if fresh == 0 {
            fresh = chunk;
        } else {
            arena.set_u32(fresh_tail, chunk);
        }
        fresh_tail = chunk;
    }
    // All chunks are in hand; link them in and commit the new size.
    let mut tail = arena.u32_at(hdr + HDR_FIRST);
    while arena.u32_at(tail) != 0 {
        tail = arena.u32_at(tail);
    }
    arena.set_u32(tail, fresh);
    arena.set_u32(hdr + HDR_NCHUNKS, nchunks * 2);
    let new_buckets = buckets * 2;
    for index in 0..buckets {
        let mut slot = bucket_slot(arena, hdr, index);
        let mut node = arena.u32_at(slot);
        while node != 0 {
            let next = arena.u32_at(node);
            let hash = strtab::record_hash(arena, node_key(arena, node));
            let target = hash % new_buckets;
            if target == index {
                slot = node;
            } else {
                // target == index + buckets, which lives in a fresh
                // chunk, so the relocation is never revisited.
                arena.set_u32(slot, next);
                arena.set_u32(node, 0);
                let mut end = bucket_slot(arena, hdr, target);
                while arena.u32_at(end) != 0 {
                    end = arena.u32_at(end);
                }
                arena.set_u32(end, node);
            }
            node = next;
        }
    }
}

/// External cursor over every node of a map, in bucket order. Created
/// in its zero state; single use.
#[derive(Clone, Copy)]
pub(crate) struct Walk {
    chunk: u32,
    slot: u32,
    node: u32,
}

impl Walk {
    pub(crate) fn new(arena: &Arena, hdr: u32) -> Walk {
        Walk {
            chunk: arena.u32_at(hdr + HDR_FIRST),
            slot: 0,
            node: 0,
        }
    }

    pub(crate) fn next(&mut self, arena: &Arena) -> Option<u32> {
        loop {
            if self.node != 0 {
                let node = self.node;
                self.node = arena.u32_at(node);
                return Some(node);
            }
            if self.chunk == 0 {
                return None;
            }
            if self.slot == CHUNK_LEN {
                self.chunk = arena.u32_at(self.chunk);
                self.slot = 0;
                continue;
            }
            self.node = arena.u32_at(self.chunk + 4 + 4 * self.slot);
            self.slot += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;

    fn arena() -> (Arena, u32, u32) {
        let mut arena = Arena::new(alloc::vec![0; 1 << 20]);
        let strings = init(&mut arena).unwrap();
        let map = init(&mut arena).unwrap();
        (arena, strings, map)
    }

    #[test]
    fn insert_then_find() {
        let (mut arena, strings, map) = arena();
        let key = strtab::intern(&mut arena, strings, b"alpha").unwrap();
        let (node, created) = insert(&mut arena, map, key, NODE_HDR as usize + 4).unwrap();
        assert!(created);
        let (again, created) = insert(&mut arena, map, key, NODE_HDR as usize + 4).unwrap();
        assert!(!created);
        assert_eq!(node, again);
        assert_eq!(find_key(&arena, map, key), Some(node));
        assert_eq!(len(&arena, map), 1);
    }

    #[test]
    fn growth_doubles_and_keeps_nodes() {
        let (mut arena, strings, map) = arena();
        let mut nodes = Vec::new();
        for i in 0..200usize {
            let name = format!("key-{}", i);
            let key = strtab::intern(&mut arena, strings, name.as_bytes()).unwrap();
            let (node, created) = insert(&mut arena, map, key, NODE_HDR as usize).unwrap();
            assert!(created);
            nodes.push((key, node));
        }
        // Doubling only: the chunk count is a power of two.
        let nchunks = arena.u32_at(map + HDR_NCHUNKS);
        assert!(nchunks.is_power_of_two());
        assert!(nchunks * CHUNK_LEN >= 200 * LOAD.1 as u32 / LOAD.0 as u32);
        // Every node kept its identity and is still reachable.
        for (key, node) in nodes {
            assert_eq!(find_key(&arena, map, key), Some(node));
        }
        assert_eq!(len(&arena, map), 200);
    }

    #[test]
    fn growth_count_matches_threshold_crossings() {
        let (mut arena, strings, map) = arena();
        let mut doublings = 0;
        let mut last = 1u32;
        for i in 0..500usize {
            let name = format!("k{}", i);
            let key = strtab::intern(&mut arena, strings, name.as_bytes()).unwrap();
            insert(&mut arena, map, key, NODE_HDR as usize).unwrap();
            let nchunks = arena.u32_at(map + HDR_NCHUNKS);
            if nchunks != last {
                assert_eq!(nchunks, last * 2);
                // The doubling fires exactly when the load factor was
                // exceeded by this insert.
                let n = len(&arena, map) as u64;
                let old_buckets = (last * CHUNK_LEN) as u64;
                assert!(n * LOAD.1 > old_buckets * LOAD.0);
                assert!((n - 1) * LOAD.1 <= old_buckets * LOAD.0);
                last = nchunks;
                doublings += 1;
            }
        }
        assert!(doublings >= 2);
    }

    #[test]
    fn walk_visits_every_node_once() {
        let (mut arena, strings, map) = arena();
        let mut expected = Vec::new();
        for i in 0..64usize {
            let key = strtab::intern(&mut arena, strings, format!("w{}", i).as_bytes()).unwrap();
            let (node, _) = insert(&mut arena, map, key, NODE_HDR as usize).unwrap();
            expected.push(node);
        }
        let mut walk = Walk::new(&arena, map);
        let mut seen = Vec::new();
        while let Some(node) = walk.next(&arena) {
            seen.push(node);
        }
        seen.sort_unstable();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
