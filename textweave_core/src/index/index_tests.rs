use super::*;

use crate::index::motion::CountKind;
use crate::opt::StoreOptions;
use crate::res::TheTextError;
use crate::seg::Gravity;
use crate::store::TextStore;
use crate::test::log::init as test_log_init;

fn make_store(text: &str) -> TextStore {
  let mut store = TextStore::new(StoreOptions::default());
  store.insert_at(
    Position::start_of(store_first(&store)),
    text,
  );
  store
}

fn store_first(store: &TextStore) -> crate::btree::LineId {
  store.parse_index(0, "1.0").unwrap().line
}

#[test]
fn format_parse_roundtrip1() {
  // L5: format(parse(s)) on a normalised "L.C" index returns s.
  test_log_init();
  let store = make_store("abc\ndef\nghi");
  for s in ["1.0", "1.2", "2.3", "3.1", "4.0"] {
    let pos = store.parse_index(0, s).unwrap();
    assert_eq!(store.format_index(pos), s);
  }
}

#[test]
fn parse_end1() {
  let store = make_store("abc\ndef\nghi");
  let end = store.parse_index(0, "end").unwrap();
  assert_eq!(store.format_index(end), "4.0");
  // "end" may be abbreviated.
  let end2 = store.parse_index(0, "e").unwrap();
  assert_eq!(end, end2);
}

#[test]
fn parse_clamps1() {
  let store = make_store("abc\ndef\nghi");
  assert_eq!(
    store.format_index(store.parse_index(0, "99.0").unwrap()),
    "4.0"
  );
  assert_eq!(
    store.format_index(store.parse_index(0, "1.99").unwrap()),
    "1.3"
  );
  assert_eq!(
    store.format_index(store.parse_index(0, "1.end").unwrap()),
    "1.3"
  );
}

#[test]
fn parse_modifiers1() {
  test_log_init();
  let store = make_store("abc\ndef\nghi");
  let cases = [
    ("1.0 +4 chars", "2.0"),
    ("1.0+4c", "2.0"),
    ("2.0 -1 chars", "1.3"),
    ("1.1 +1 lines", "2.1"),
    ("3.1 -5 lines", "1.1"),
    ("2.1 linestart", "2.0"),
    ("2.1 lineend", "2.3"),
    ("1.1 wordend", "1.3"),
    ("1.2 wordstart", "1.0"),
    ("1.0 +2 chars +1 lines -1 chars", "2.1"),
  ];
  for (input, expect) in cases {
    let pos = store.parse_index(0, input).unwrap();
    assert_eq!(store.format_index(pos), expect, "index {input:?}");
  }
}

#[test]
fn parse_errors1() {
  let mut store = make_store("abc\ndef");
  assert!(matches!(
    store.parse_index(0, "bogus"),
    Err(TheTextError::BadIndex(_))
  ));
  assert!(matches!(
    store.parse_index(0, "1.x"),
    Err(TheTextError::BadIndex(_))
  ));
  assert!(matches!(
    store.parse_index(0, "1.0 +2 parsecs"),
    Err(TheTextError::BadIndex(_))
  ));
  store.tag_create("t9");
  assert!(matches!(
    store.parse_index(0, "t9.first"),
    Err(TheTextError::NoSuchRange(_))
  ));
}

#[test]
fn parse_tag_first_last1() {
  let mut store = make_store("abc\ndef\nghi");
  store.tag_add("t", "1.1", "2.2").unwrap();
  assert_eq!(
    store.format_index(store.parse_index(0, "t.first").unwrap()),
    "1.1"
  );
  assert_eq!(
    store.format_index(store.parse_index(0, "t.last").unwrap()),
    "2.2"
  );
  assert_eq!(
    store.format_index(store.parse_index(0, "t.first +1c").unwrap()),
    "1.2"
  );
}

#[test]
fn parse_marks1() {
  let mut store = make_store("abc\ndef");
  store.mark_set("m1", "2.1", Gravity::Right).unwrap();
  assert_eq!(
    store.format_index(store.parse_index(0, "m1").unwrap()),
    "2.1"
  );
  assert_eq!(
    store.format_index(store.parse_index(0, "m1 +1c").unwrap()),
    "2.2"
  );
  // Names containing sign characters resolve as whole strings.
  store.mark_set("a+b", "1.1", Gravity::Left).unwrap();
  assert_eq!(
    store.format_index(store.parse_index(0, "a+b").unwrap()),
    "1.1"
  );
}

#[test]
fn cacheable1() {
  let mut store = make_store("abc\ndef");
  let (_, cached) = store.parse_index_cached(0, "2.1").unwrap();
  assert!(cached.is_some());
  let (_, cached) = store.parse_index_cached(0, "end").unwrap();
  assert!(cached.is_some());
  store.mark_set("m1", "1.1", Gravity::Right).unwrap();
  let (_, cached) = store.parse_index_cached(0, "m1").unwrap();
  assert!(cached.is_none());

  // A cached position re-resolves after an edit made it stale.
  let (_, cached) = store.parse_index_cached(0, "2.1").unwrap();
  let mut cached = cached.unwrap();
  store.insert("1.0", "xy\n").unwrap();
  assert!(!cached.is_fresh(&store.tree));
  let pos = store.refresh_cached(0, &mut cached).unwrap();
  assert_eq!(store.format_index(pos), "3.1");
}

#[test]
fn count_additive1() {
  // L3: counts over adjacent ranges add up.
  let store = make_store("abc\ndef\nghi");
  let i1 = store.parse_index(0, "1.0").unwrap();
  let i2 = store.parse_index(0, "2.1").unwrap();
  let i3 = store.parse_index(0, "3.2").unwrap();
  for kind in [CountKind::Chars, CountKind::Indices] {
    let a = store.count_chars(i1, i2, kind);
    let b = store.count_chars(i2, i3, kind);
    let c = store.count_chars(i1, i3, kind);
    assert_eq!(a + b, c);
  }
}

#[test]
fn forward_backward_roundtrip1() {
  // L4: forward then backward returns to the start when nothing is
  // elided.
  let store = make_store("abc\ndef\nghi");
  let start = store.parse_index(0, "1.1").unwrap();
  for n in [1, 3, 5, 7] {
    let there = store.forward_chars(start, n, CountKind::Chars);
    let back = store.backward_chars(there, n, CountKind::Chars);
    assert_eq!(back, start, "n = {n}");
  }
}

#[test]
fn forward_saturates1() {
  let store = make_store("abc");
  let start = store.parse_index(0, "1.0").unwrap();
  let there = store.forward_chars(start, 1000, CountKind::Indices);
  assert_eq!(store.format_index(there), "2.0");
  let back = store.backward_chars(start, 1000, CountKind::Indices);
  assert_eq!(store.format_index(back), "1.0");
}

#[test]
fn multibyte_boundaries1() {
  test_log_init();
  let store = make_store("héllo");
  let start = store.parse_index(0, "1.0").unwrap();
  let one = store.forward_chars(start, 1, CountKind::Chars);
  assert_eq!(one.byte, 1);
  let two = store.forward_chars(start, 2, CountKind::Chars);
  // é is two bytes.
  assert_eq!(two.byte, 3);
  assert_eq!(store.format_index(two), "1.2");
  // Byte motion rounds forward off a split code point.
  let mid = store.forward_bytes(start, 2);
  assert_eq!(mid.byte, 3);
}

#[test]
fn embedded_count_as_indices_not_chars1() {
  let mut store = make_store("abcd");
  store.window_create("1.2", "w1", 30, 20).unwrap();
  let i1 = store.parse_index(0, "1.0").unwrap();
  let end = store.parse_index(0, "1.end").unwrap();
  assert_eq!(store.count_chars(i1, end, CountKind::Chars), 4);
  assert_eq!(store.count_chars(i1, end, CountKind::Indices), 5);
  // The embedded object is an index base of its own.
  assert_eq!(
    store.format_index(store.parse_index(0, "w1").unwrap()),
    "1.2"
  );
}
