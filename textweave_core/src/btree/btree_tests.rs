use super::*;

use crate::index::Position;
use crate::seg::Gravity;
use crate::tag::TagSet;
use crate::test::log::init as test_log_init;

fn make_tree() -> (BTree, TagSet, Anchors) {
  (BTree::new(), TagSet::new(), Anchors::new())
}

fn pos(tree: &BTree, lno: usize, byte: usize) -> Position {
  Position::new(tree.find_line(lno), byte)
}

fn contents(tree: &BTree) -> String {
  let first = Position::start_of(tree.first_line());
  let end = Position::start_of(tree.last_line());
  let mut s = tree.get_text(first, end);
  s.push('\n');
  s
}

#[test]
fn new_tree1() {
  test_log_init();
  let (tree, tags, _) = make_tree();
  assert_eq!(tree.line_count(), 2);
  assert_eq!(contents(&tree), "\n\n");
  tree.check(&tags);
}

#[test]
fn insert1() {
  test_log_init();
  let (mut tree, mut tags, mut anchors) = make_tree();
  let outcome =
    tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "abc\ndef\nghi");
  assert_eq!(outcome.from_line_no, 0);
  assert_eq!(outcome.added_lines, 2);
  assert_eq!(tree.line_count(), 4);
  assert_eq!(contents(&tree), "abc\ndef\nghi\n\n");
  tree.check(&tags);
}

#[test]
fn insert_epoch_bumps1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  let e0 = tree.state_epoch();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "x");
  assert!(tree.state_epoch() > e0);
}

#[test]
fn insert_mid_line1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "hello");
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 2), "XY");
  assert_eq!(contents(&tree), "heXYllo\n\n");
  // Adjacent character segments must have been merged again.
  assert_eq!(tree.line_segs(tree.first_line()).len(), 1);
  tree.check(&tags);
}

#[test]
fn insert_many_lines_rebalances1() {
  test_log_init();
  let (mut tree, mut tags, mut anchors) = make_tree();
  let mut text = String::new();
  for i in 0..200 {
    text.push_str(&format!("line {i}\n"));
  }
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), &text);
  assert_eq!(tree.line_count(), 202);
  assert!(tree.node(tree.root()).level() > 0);
  tree.check(&tags);

  // Positional queries agree with sequential walking.
  for no in [0, 1, 57, 121, 199, 201] {
    let line = tree.find_line(no);
    assert_eq!(tree.line_no(line), no);
  }
  let mut cur = Some(tree.first_line());
  let mut count = 0;
  while let Some(line) = cur {
    count += 1;
    cur = tree.next_line(line);
  }
  assert_eq!(count, 202);
}

#[test]
fn delete_within_line1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "hello world");
  tree.delete(&mut tags, &mut anchors, pos(&tree, 0, 5), pos(&tree, 0, 11));
  assert_eq!(contents(&tree), "hello\n\n");
  tree.check(&tags);
}

#[test]
fn delete_joins_lines1() {
  test_log_init();
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "abc\ndef\nghi");
  let outcome =
    tree.delete(&mut tags, &mut anchors, pos(&tree, 0, 3), pos(&tree, 1, 0));
  assert_eq!(outcome.removed_lines, 1);
  assert_eq!(tree.line_count(), 3);
  assert_eq!(contents(&tree), "abcdef\nghi\n\n");
  tree.check(&tags);
}

#[test]
fn delete_multi_line_range1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  let mut text = String::new();
  for i in 0..100 {
    text.push_str(&format!("line number {i}\n"));
  }
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), &text);
  tree.delete(&mut tags, &mut anchors, pos(&tree, 3, 0), pos(&tree, 97, 0));
  assert_eq!(tree.line_count(), 100 + 2 - 94);
  tree.check(&tags);
  assert!(contents(&tree).starts_with("line number 0\n"));
  assert!(contents(&tree).contains("line number 97\n"));
  assert!(!contents(&tree).contains("line number 50\n"));
}

#[test]
fn insert_then_delete_restores_bytes1() {
  // L1: insert(i, s); delete(i, i + len(s)) restores the prior content.
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "base\ntext");
  let before = contents(&tree);
  let at = pos(&tree, 0, 2);
  tree.insert(&mut tags, &mut anchors, at, "one\ntwo\nthree");
  assert_ne!(contents(&tree), before);
  let from = pos(&tree, 0, 2);
  let to = pos(&tree, 2, 5);
  tree.delete(&mut tags, &mut anchors, from, to);
  assert_eq!(contents(&tree), before);
  tree.check(&tags);
}

#[test]
fn mark_survives_range_delete1() {
  test_log_init();
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "abcdef");
  // Place a mark at byte 4, then delete [1, 5) across it.
  let ins = tree.split_at(pos(&tree, 0, 4));
  let line = tree.find_line(0);
  tree
    .line_mut(line)
    .segs
    .insert(ins, crate::seg::Segment::mark("m1", Gravity::Right));
  anchors.set_mark_line("m1", line);

  tree.delete(&mut tags, &mut anchors, pos(&tree, 0, 1), pos(&tree, 0, 5));
  assert_eq!(contents(&tree), "af\n\n");
  assert_eq!(anchors.mark_line("m1"), Some(line));
  // The mark relocated to the surviving start of the range.
  let mut byte = 0;
  let mut found = None;
  for seg in tree.line_segs(line) {
    if seg.as_mark().is_some() {
      found = Some(byte);
    }
    byte += seg.size;
  }
  assert_eq!(found, Some(1));
  tree.check(&tags);
}

#[test]
fn embedded_objects_die_on_delete1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "abcd");
  let ins = tree.split_at(pos(&tree, 0, 2));
  let line = tree.find_line(0);
  tree.line_mut(line).segs.insert(
    ins,
    crate::seg::Segment::window(crate::seg::EmbWindow {
      name: "w1".into(),
      width: 10,
      height: 10,
    }),
  );
  anchors.set_embed_line("w1", line);
  assert_eq!(tree.line(line).byte_len(), 6);

  tree.delete(&mut tags, &mut anchors, pos(&tree, 0, 1), pos(&tree, 0, 4));
  assert_eq!(anchors.embed_line("w1"), None);
  assert_eq!(contents(&tree), "ad\n\n");
  tree.check(&tags);
}

#[test]
fn pixels1() {
  test_log_init();
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "a\nb\nc");
  let slot = tree.add_viewer_slot(10, None, None);
  assert_eq!(slot, 0);
  // Three usable lines at the default height, dummy at zero.
  assert_eq!(tree.total_pixels(slot), 30);
  let l2 = tree.find_line(1);
  assert_eq!(tree.pixels_to(slot, l2), 10);

  tree.adjust_pixel_height(slot, l2, 25, 0);
  assert_eq!(tree.total_pixels(slot), 45);
  assert_eq!(tree.pixels_to(slot, tree.find_line(2)), 35);

  let (line, rem) = tree.find_pixel_line(slot, 12);
  assert_eq!(line, l2);
  assert_eq!(rem, 2);
  let (line, _) = tree.find_pixel_line(slot, 0);
  assert_eq!(line, tree.find_line(0));
  tree.check(&tags);
}

#[test]
fn viewer_slots_backfill1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "a\nb");
  let s0 = tree.add_viewer_slot(10, None, None);
  let s1 = tree.add_viewer_slot(20, None, None);
  assert_eq!((s0, s1), (0, 1));
  assert_eq!(tree.total_pixels(0), 20);
  assert_eq!(tree.total_pixels(1), 40);
  let displaced = tree.remove_viewer_slot(0);
  assert_eq!(displaced, 1);
  assert_eq!(tree.pixel_refs(), 1);
  // Slot 1 backfilled into 0.
  assert_eq!(tree.total_pixels(0), 40);
  tree.check(&tags);
}

#[test]
fn new_lines_inherit_heights_with_stale_epoch1() {
  let (mut tree, mut tags, mut anchors) = make_tree();
  let slot = tree.add_viewer_slot(10, None, None);
  let first = tree.first_line();
  tree.adjust_pixel_height(slot, first, 40, 0);
  tree.set_line_pixel_epoch(slot, first, 7);
  tree.insert(&mut tags, &mut anchors, pos(&tree, 0, 0), "x\ny\nz");
  // Every newly created line starts from the split line's height, marked
  // stale.
  for no in 1..=2 {
    let px = tree.line_pixel(slot, tree.find_line(no));
    assert_eq!(px.height, 40);
    assert_eq!(px.epoch, 0);
  }
  tree.check(&tags);
}
