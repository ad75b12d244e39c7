use super::*;

use crate::btree::{Anchors, BTree};
use crate::index::Position;
use crate::tag::apply::apply;
use crate::tag::search::{ReverseTagWalker, TagWalker};
use crate::test::log::init as test_log_init;

fn make_tree(text: &str) -> (BTree, TagSet) {
  let mut tree = BTree::new();
  let mut tags = TagSet::new();
  let mut anchors = Anchors::new();
  let first = tree.first_line();
  tree.insert(&mut tags, &mut anchors, Position::start_of(first), text);
  (tree, tags)
}

fn pos(tree: &BTree, lno: usize, byte: usize) -> Position {
  Position::new(tree.find_line(lno), byte)
}

#[test]
fn priorities_dense1() {
  let mut tags = TagSet::new();
  let a = tags.ensure("a");
  let b = tags.ensure("b");
  let c = tags.ensure("c");
  assert_eq!(tags.get(a).priority, 0);
  assert_eq!(tags.get(b).priority, 1);
  assert_eq!(tags.get(c).priority, 2);

  tags.raise(a, None);
  assert_eq!(tags.by_priority(), &[b, c, a]);
  assert_eq!(tags.get(b).priority, 0);
  assert_eq!(tags.get(a).priority, 2);

  tags.lower(a, Some(c));
  assert_eq!(tags.by_priority(), &[b, a, c]);

  tags.remove(b);
  assert_eq!(tags.by_priority(), &[a, c]);
  assert_eq!(tags.get(a).priority, 0);
  assert_eq!(tags.get(c).priority, 1);
}

#[test]
fn lazy_create_and_lookup1() {
  let mut tags = TagSet::new();
  assert!(tags.lookup("x").is_none());
  assert!(matches!(
    tags.require("x"),
    Err(crate::res::TheTextError::UnknownTag(_))
  ));
  let x = tags.ensure("x");
  assert_eq!(tags.ensure("x"), x);
  assert_eq!(tags.require("x").unwrap(), x);
}

#[test]
fn apply_and_parity1() {
  test_log_init();
  let (mut tree, mut tags) = make_tree("hello world");
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 0, 2), pos(&tree, 0, 7));
  let changed = apply(&mut tree, &mut tags, t, p0, p1, true);
  assert!(changed);
  assert_eq!(tags.get(t).toggle_count, 2);
  tree.check(&tags);

  assert!(!tree.char_tagged(pos(&tree, 0, 1), t));
  assert!(tree.char_tagged(pos(&tree, 0, 2), t));
  assert!(tree.char_tagged(pos(&tree, 0, 6), t));
  assert!(!tree.char_tagged(pos(&tree, 0, 7), t));
  assert_eq!(tree.tags_at(&tags, pos(&tree, 0, 4)), vec![t]);
}

#[test]
fn overlapping_add_leaves_two_toggles1() {
  // Applying twice with overlap may not leave four toggles behind.
  test_log_init();
  let (mut tree, mut tags) = make_tree("hello world");
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 0, 0), pos(&tree, 0, 5));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  let (p0, p1) = (pos(&tree, 0, 3), pos(&tree, 0, 8));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  assert_eq!(tags.get(t).toggle_count, 2);
  tree.check(&tags);
  assert!(tree.char_tagged(pos(&tree, 0, 0), t));
  assert!(tree.char_tagged(pos(&tree, 0, 7), t));
  assert!(!tree.char_tagged(pos(&tree, 0, 8), t));
}

#[test]
fn adjacent_ranges_merge1() {
  let (mut tree, mut tags) = make_tree("hello world");
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 0, 0), pos(&tree, 0, 3));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  let (p0, p1) = (pos(&tree, 0, 3), pos(&tree, 0, 6));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  // The off toggle at 3 annihilated with the new on toggle there.
  assert_eq!(tags.get(t).toggle_count, 2);
  tree.check(&tags);
}

#[test]
fn add_then_remove_restores1() {
  // L2: tag_add then tag_remove over the same range is a no-op.
  let (mut tree, mut tags) = make_tree("abc\ndef\nghi");
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 0, 1), pos(&tree, 2, 2));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  assert_eq!(tags.get(t).toggle_count, 2);
  let (p0, p1) = (pos(&tree, 0, 1), pos(&tree, 2, 2));
  apply(&mut tree, &mut tags, t, p0, p1, false);
  assert_eq!(tags.get(t).toggle_count, 0);
  assert!(tags.get(t).root.is_none());
  for byte in 0..3 {
    assert!(!tree.char_tagged(pos(&tree, 0, byte), t));
    assert!(!tree.char_tagged(pos(&tree, 2, byte), t));
  }
  tree.check(&tags);
}

#[test]
fn walker_forward_and_reverse1() {
  test_log_init();
  let mut text = String::new();
  for i in 0..200 {
    text.push_str(&format!("line {i}\n"));
  }
  let (mut tree, mut tags) = make_tree(&text);
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 50, 0), pos(&tree, 50, 4));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  let (p0, p1) = (pos(&tree, 150, 1), pos(&tree, 150, 5));
  apply(
    &mut tree,
    &mut tags,
    t,
    p0,
    p1,
    true,
  );
  tree.check(&tags);

  let first = Position::start_of(tree.first_line());
  let end = Position::start_of(tree.last_line());
  let mut w = TagWalker::new(&tree, &tags, first, end, Some(t));
  let mut hits = Vec::new();
  while let Some(h) = w.next() {
    hits.push((tree.line_no(h.pos.line), h.pos.byte, h.on));
  }
  assert_eq!(
    hits,
    vec![(50, 0, true), (50, 4, false), (150, 1, true), (150, 5, false)]
  );

  let mut w = ReverseTagWalker::new(&tree, &tags, end, first, Some(t));
  let mut rhits = Vec::new();
  while let Some(h) = w.next() {
    rhits.push((tree.line_no(h.pos.line), h.pos.byte, h.on));
  }
  hits.reverse();
  assert_eq!(rhits, hits);
}

#[test]
fn walker_range_bounds1() {
  let (mut tree, mut tags) = make_tree("abcdefgh");
  let t = tags.ensure("t");
  let (p0, p1) = (pos(&tree, 0, 2), pos(&tree, 0, 6));
  apply(&mut tree, &mut tags, t, p0, p1, true);

  // A toggle exactly at the range start is not reported; one exactly at
  // the end is.
  let mut w =
    TagWalker::new(&tree, &tags, pos(&tree, 0, 2), pos(&tree, 0, 6), Some(t));
  let hit = w.next().unwrap();
  assert_eq!((hit.pos.byte, hit.on), (6, false));
  assert!(w.next().is_none());
}

#[test]
fn walker_all_tags1() {
  let (mut tree, mut tags) = make_tree("abcdef");
  let a = tags.ensure("a");
  let b = tags.ensure("b");
  let (p0, p1) = (pos(&tree, 0, 1), pos(&tree, 0, 3));
  apply(&mut tree, &mut tags, a, p0, p1, true);
  let (p0, p1) = (pos(&tree, 0, 2), pos(&tree, 0, 5));
  apply(&mut tree, &mut tags, b, p0, p1, true);

  let first = Position::start_of(tree.first_line());
  let end = Position::start_of(tree.last_line());
  let mut w = TagWalker::new(&tree, &tags, first, end, None);
  let mut hits = Vec::new();
  while let Some(h) = w.next() {
    hits.push((h.pos.byte, h.tag, h.on));
  }
  assert_eq!(
    hits,
    vec![(1, a, true), (2, b, true), (3, a, false), (5, b, false)]
  );
}

#[test]
fn tag_root_tracks_toggles1() {
  test_log_init();
  let mut text = String::new();
  for i in 0..300 {
    text.push_str(&format!("{i}\n"));
  }
  let (mut tree, mut tags) = make_tree(&text);
  let t = tags.ensure("t");
  // All toggles on one line: the root settles on a deep node.
  let (p0, p1) = (pos(&tree, 40, 0), pos(&tree, 40, 1));
  apply(&mut tree, &mut tags, t, p0, p1, true);
  let deep_root = tags.get(t).root.unwrap();
  assert_eq!(tree.node(deep_root).level(), 0);
  tree.check(&tags);

  // Adding a far-away range forces the root upwards.
  let (p0, p1) = (pos(&tree, 280, 0), pos(&tree, 280, 1));
  apply(
    &mut tree,
    &mut tags,
    t,
    p0,
    p1,
    true,
  );
  let high_root = tags.get(t).root.unwrap();
  assert!(tree.node(high_root).level() > 0);
  tree.check(&tags);

  // Removing it pushes the root back down.
  let (p0, p1) = (pos(&tree, 280, 0), pos(&tree, 280, 1));
  apply(
    &mut tree,
    &mut tags,
    t,
    p0,
    p1,
    false,
  );
  let low_root = tags.get(t).root.unwrap();
  assert_eq!(tree.node(low_root).level(), 0);
  tree.check(&tags);
}
