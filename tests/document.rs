//! Store API properties: interning identity, handle stability,
//! lookup/insert laws, clearing.

use lsml::{Document, Error, SectionKind};

fn fresh() -> Document {
    Document::with_capacity(1 << 16).unwrap()
}

#[test]
fn interning_is_idempotent() {
    let mut doc = fresh();
    let a = doc.intern(b"hello").unwrap();
    let b = doc.intern(b"hello").unwrap();
    assert_eq!(a, b);
    let c = doc.intern(b"world").unwrap();
    assert_ne!(a, c);
    assert_eq!(doc.resolve(a), b"hello");
    assert_eq!(doc.resolve_str(c), Some("world"));
}

#[test]
fn strings_shared_across_containers_are_one_record() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    let a = doc.add_section(SectionKind::Array, b"a").unwrap();
    doc.table_add(t, b"k", b"shared").unwrap();
    doc.array_push(a, b"shared", true).unwrap();
    let from_table = doc.table_get(t, b"k").unwrap();
    let from_array = doc.array_get(a, 0).unwrap();
    assert_eq!(from_table, from_array);
}

#[test]
fn resolved_slices_stay_put_across_growth() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    doc.table_add(t, b"anchor", b"steady").unwrap();
    let atom = doc.table_get(t, b"anchor").unwrap();
    let before = doc.resolve(atom).as_ptr();
    // Enough inserts to force several hashmap growths.
    for i in 0..300 {
        let key = format!("key-{}", i);
        doc.table_add(t, key.as_bytes(), b"x").unwrap();
    }
    assert_eq!(doc.resolve(atom).as_ptr(), before);
    assert_eq!(doc.resolve(atom), b"steady");
    assert_eq!(doc.table_get(t, b"anchor").unwrap(), atom);
    // Every insert is still reachable after the growths.
    for i in 0..300 {
        let key = format!("key-{}", i);
        assert!(doc.table_get(t, key.as_bytes()).is_ok());
    }
    assert_eq!(doc.table_len(t).unwrap(), 301);
}

#[test]
fn table_lookup_laws() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    assert_eq!(doc.table_get(t, b"k"), Err(Error::NotFound));
    doc.table_add(t, b"k", b"v").unwrap();
    assert_eq!(doc.resolve(doc.table_get(t, b"k").unwrap()), b"v");
    // A second add is rejected and the original survives.
    assert_eq!(doc.table_add(t, b"k", b"other"), Err(Error::TableKeyReused));
    assert_eq!(doc.resolve(doc.table_get(t, b"k").unwrap()), b"v");
}

#[test]
fn section_lookup_laws() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"cfg").unwrap();
    assert_eq!(doc.section(None, b"cfg").unwrap(), t);
    assert_eq!(doc.section(Some(SectionKind::Table), b"cfg").unwrap(), t);
    assert_eq!(
        doc.section(Some(SectionKind::Array), b"cfg"),
        Err(Error::SectionType)
    );
    assert_eq!(doc.section_kind(t).unwrap(), SectionKind::Table);
    assert_eq!(doc.section_name(t).unwrap(), b"cfg");
    assert_eq!(
        doc.add_section(SectionKind::Array, b"cfg"),
        Err(Error::SectionNameReused)
    );
    assert_eq!(doc.section(None, b"missing"), Err(Error::NotFound));
    assert_eq!(doc.section(None, b""), Err(Error::InvalidKey));
    assert_eq!(doc.add_section(SectionKind::Table, b""), Err(Error::InvalidKey));
}

#[test]
fn wrong_kind_is_rejected_everywhere() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    let a = doc.add_section(SectionKind::Array, b"a").unwrap();
    assert_eq!(doc.array_push(t, b"x", true), Err(Error::SectionType));
    assert_eq!(doc.table_add(a, b"k", b"v"), Err(Error::SectionType));
    assert_eq!(doc.array_len(t), Err(Error::SectionType));
    assert_eq!(doc.table_len(a), Err(Error::SectionType));
}

#[test]
fn foreign_handles_are_rejected() {
    let mut other = fresh();
    let foreign = other.add_section(SectionKind::Table, b"t").unwrap();
    let foreign_atom = other.intern(b"text").unwrap();

    let doc = fresh();
    assert_eq!(doc.section_kind(foreign), Err(Error::InvalidSection));
    assert_eq!(doc.table_len(foreign), Err(Error::InvalidSection));
    assert_eq!(doc.try_resolve(foreign_atom), Err(Error::InvalidData));
    assert_eq!(doc.resolve(foreign_atom), b"");
}

#[test]
fn single_element_array_sizes() {
    let mut doc = fresh();
    let a = doc.add_section(SectionKind::Array, b"a").unwrap();
    doc.array_push(a, b"only", true).unwrap();
    assert_eq!(doc.array_size_2d(a, true).unwrap(), (1, 1));
    assert_eq!(doc.array_size_2d(a, false).unwrap(), (1, 1));
    assert_eq!(doc.resolve(doc.array_get_2d(a, 0, 0).unwrap()), b"only");
}

#[test]
fn array_iteration_matches_push_order() {
    let mut doc = fresh();
    let a = doc.add_section(SectionKind::Array, b"a").unwrap();
    let values: Vec<String> = (0..50).map(|i| format!("item{}", i)).collect();
    for (i, value) in values.iter().enumerate() {
        doc.array_push(a, value.as_bytes(), i % 7 == 0).unwrap();
    }
    assert_eq!(doc.array_len(a).unwrap(), 50);
    let seen: Vec<String> = doc
        .array_items(a)
        .unwrap()
        .map(|atom| String::from_utf8_lossy(doc.resolve(atom)).into_owned())
        .collect();
    assert_eq!(seen, values);
    // 2D annotations: col resets at every row start, rows never
    // decrease, and the flattened order is unchanged.
    let mut last_row = 0;
    let mut expect_col = 0;
    let mut index = 0;
    for ((row, col), atom) in doc.array_items_2d(a).unwrap() {
        if row != last_row {
            assert_eq!(row, last_row + 1);
            last_row = row;
            expect_col = 0;
        }
        assert_eq!(col, expect_col);
        expect_col += 1;
        assert_eq!(doc.resolve(atom), values[index].as_bytes());
        index += 1;
    }
    assert_eq!(index, 50);
    assert_eq!(last_row + 1, doc.array_size_2d(a, true).unwrap().0);
}

#[test]
fn sections_iteration_sees_everything() {
    let mut doc = fresh();
    for i in 0..40 {
        let name = format!("s{}", i);
        let kind = if i % 2 == 0 {
            SectionKind::Table
        } else {
            SectionKind::Array
        };
        doc.add_section(kind, name.as_bytes()).unwrap();
    }
    let mut names: Vec<(String, SectionKind)> = doc
        .sections()
        .map(|(id, kind)| {
            (
                String::from_utf8_lossy(doc.section_name(id).unwrap()).into_owned(),
                kind,
            )
        })
        .collect();
    assert_eq!(names.len(), 40);
    names.sort_by(|a, b| a.0.cmp(&b.0));
    names.dedup_by(|a, b| a.0 == b.0);
    assert_eq!(names.len(), 40);
    assert!(names.contains(&("s0".to_string(), SectionKind::Table)));
    assert!(names.contains(&("s1".to_string(), SectionKind::Array)));
}

#[test]
fn clear_recycles_the_buffer() {
    let mut doc = fresh();
    let baseline = doc.arena_used();
    doc.parse_bytes(b"{t}\nk=v\n").unwrap();
    assert!(doc.arena_used() > baseline);
    doc.clear();
    assert_eq!(doc.arena_used(), baseline);
    assert_eq!(doc.sections().count(), 0);
    // The document is fully usable again, including reusing names.
    doc.parse_bytes(b"{t}\nk=w\n").unwrap();
    let t = doc.section(None, b"t").unwrap();
    assert_eq!(doc.resolve(doc.table_get(t, b"k").unwrap()), b"w");
}

#[test]
fn out_of_memory_leaves_the_document_usable() {
    let mut doc = Document::with_capacity(512).unwrap();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    let mut failed = false;
    for i in 0..100 {
        let key = format!("key-number-{}", i);
        match doc.table_add(t, key.as_bytes(), b"some value text") {
            Ok(()) => {}
            Err(Error::OutOfMemory) => {
                failed = true;
                break;
            }
            Err(err) => panic!("unexpected error: {}", err),
        }
    }
    assert!(failed);
    // Whatever landed before the failure is still readable.
    assert!(doc.table_len(t).unwrap() >= 1);
    assert_eq!(doc.resolve(doc.table_get(t, b"key-number-0").unwrap()), b"some value text");
}

#[test]
fn empty_keys_via_the_api() {
    let mut doc = fresh();
    let t = doc.add_section(SectionKind::Table, b"t").unwrap();
    doc.table_add(t, b"", b"v").unwrap();
    assert_eq!(doc.resolve(doc.table_get(t, b"").unwrap()), b"v");
    assert_eq!(doc.table_add(t, b"", b"w"), Err(Error::TableKeyReused));
}
