//! Applying and clearing a tag over a byte range.

use crate::btree::BTree;
use crate::index::Position;
use crate::prelude::*;
use crate::seg::Segment;
use crate::tag::search::TagWalker;
use crate::tag::{TagId, TagSet};

// Insert a boundary toggle at `pos`. It enters ancestor summaries when the
// line is cleaned up.
fn link_toggle(tree: &mut BTree, pos: Position, tag: TagId, on: bool) {
  let ins = tree.split_at(pos);
  let seg = if on {
    Segment::toggle_on(tag)
  } else {
    Segment::toggle_off(tag)
  };
  tree.line_mut(pos.line).segs.insert(ins, seg);
}

/// Add (or clear) `tag` over `[i1, i2)`: fix the boundary state at `i1`,
/// sweep away every interior transition, fix the state at `i2`, then clean
/// up the affected lines (which may annihilate adjacent opposite toggles).
/// Returns whether anything changed.
pub fn apply(
  tree: &mut BTree,
  tags: &mut TagSet,
  tag: TagId,
  i1: Position,
  i2: Position,
  add: bool,
) -> bool {
  let old_state = tree.char_tagged(i1, tag);
  let mut any_changes = false;
  let mut affected: HashSet<crate::btree::LineId> = HashSet::new();
  affected.insert(i1.line);
  affected.insert(i2.line);

  if add != old_state {
    link_toggle(tree, i1, tag, add);
    any_changes = true;
  }

  // Unlink every transition strictly inside the range (and exactly at the
  // end position). Each removal may move the tag's root, so the walk
  // restarts from scratch after every hit.
  let mut state = old_state;
  loop {
    let hit = {
      let mut walker = TagWalker::new(tree, tags, i1, i2, Some(tag));
      walker.next()
    };
    let Some(hit) = hit else {
      break;
    };
    any_changes = true;
    state = !state;
    affected.insert(hit.pos.line);
    let seg = tree.line_mut(hit.pos.line).segs.remove(hit.seg_idx);
    let (toggle, _) = seg.as_toggle().unwrap();
    if toggle.in_node_counts {
      let parent = tree.line(hit.pos.line).parent;
      tree.change_node_toggle_count(tags, parent, tag, -1);
    }
  }

  if add != state {
    link_toggle(tree, i2, tag, add);
    any_changes = true;
  }

  if any_changes {
    for line in affected {
      if tree.contains_line(line) {
        tree.cleanup_line(tags, line);
      }
    }
    tree.bump_epoch();
  }
  any_changes
}
