//! Per-node toggle summaries and the tag subtree-root cache.
//!
//! Every node stores `{tag → toggle count}` for its subtree, except that a
//! tag holding all of its toggles under one node (its root) keeps no entry
//! on that node or above it. Range queries for a tag can therefore skip
//! any subtree without an entry, and parity walks cost O(log N).

use crate::btree::{BTree, Children, NodeId};
use crate::index::Position;
use crate::prelude::*;
use crate::tag::{TagId, TagSet};

impl BTree {
  /// Adjust the toggle count for `tag` in `node` and every ancestor up to
  /// the tag's root, migrating the root up or down as needed.
  pub(crate) fn change_node_toggle_count(
    &mut self,
    tags: &mut TagSet,
    node: NodeId,
    tag_id: TagId,
    delta: i32,
  ) {
    let (toggle_count, root) = {
      let t = tags.get_mut(tag_id);
      t.toggle_count = (t.toggle_count as i64 + delta as i64) as u32;
      (t.toggle_count, t.root)
    };

    let mut root_id = match root {
      Some(r) => r,
      None => {
        tags.get_mut(tag_id).root = Some(node);
        return;
      }
    };

    // Note the level of the existing root so we can detect when it must be
    // pushed up because a summary entry would appear at its own level.
    let mut root_level = self.node(root_id).level;

    let mut cur = node;
    while cur != root_id {
      if self.node(cur).summary.contains_key(&tag_id) {
        let n = self.node_mut(cur);
        let cnt = n.summary.get_mut(&tag_id).unwrap();
        let newv = (*cnt as i64 + delta as i64) as u32;
        if newv > 0 && newv < toggle_count {
          *cnt = newv;
        } else {
          debug_assert_eq!(newv, 0, "bad toggle count in node summary");
          n.summary.remove(&tag_id);
        }
      } else {
        if root_level == self.node(cur).level {
          // The old root sits at this node's level but isn't this node.
          // Push the root up one level, materializing its count as a
          // summary entry on the old root.
          let old_count = (toggle_count as i64 - delta as i64) as u32;
          self.node_mut(root_id).summary.insert(tag_id, old_count);
          root_id = self.node(root_id).parent.unwrap();
          root_level = self.node(root_id).level;
        }
        debug_assert!(delta > 0, "new summary entry from a decrement");
        self.node_mut(cur).summary.insert(tag_id, delta as u32);
      }
      cur = self.node(cur).parent.unwrap();
    }

    if delta >= 0 {
      tags.get_mut(tag_id).root = Some(root_id);
      return;
    }
    if toggle_count == 0 {
      tags.get_mut(tag_id).root = None;
      return;
    }

    // After a decrement a single child may account for all remaining
    // toggles; push the root down as far as that holds.
    loop {
      if self.node(root_id).level == 0 {
        break;
      }
      let children = self.node(root_id).children.nodes().clone();
      let mut moved = false;
      let mut valid = false;
      for child in children {
        if let Some(cnt) = self.node(child).summary.get(&tag_id).copied() {
          if cnt == toggle_count {
            self.node_mut(child).summary.remove(&tag_id);
            root_id = child;
            moved = true;
          } else {
            valid = true;
          }
          break;
        }
      }
      if !moved || valid {
        break;
      }
    }
    tags.get_mut(tag_id).root = Some(root_id);
  }

  /// Whether the character at `pos` carries `tag`: the parity of toggles
  /// at or before the position, found by scanning this line, then earlier
  /// sibling lines, then climbing with summary counts.
  pub fn char_tagged(&self, pos: Position, tag: TagId) -> bool {
    let mut last: Option<bool> = None;
    let mut cum = 0;
    for seg in self.line_segs(pos.line) {
      if cum + seg.size > pos.byte {
        break;
      }
      if let Some((t, on)) = seg.as_toggle() {
        if t.tag == tag {
          last = Some(on);
        }
      }
      cum += seg.size;
    }
    if let Some(on) = last {
      return on;
    }

    let leaf = self.line(pos.line).parent;
    for sibling in self.node(leaf).children.lines() {
      if *sibling == pos.line {
        break;
      }
      for seg in self.line_segs(*sibling) {
        if let Some((t, on)) = seg.as_toggle() {
          if t.tag == tag {
            last = Some(on);
          }
        }
      }
    }
    if let Some(on) = last {
      return on;
    }

    let mut toggles: u32 = 0;
    let mut node = leaf;
    while let Some(parent) = self.node(node).parent {
      for sibling in self.node(parent).children.nodes() {
        if *sibling == node {
          break;
        }
        if let Some(cnt) = self.node(*sibling).summary.get(&tag) {
          toggles += *cnt;
        }
      }
      node = parent;
    }
    toggles & 1 == 1
  }

  /// All tags active at `pos`, in ascending priority order.
  pub fn tags_at(&self, tags: &TagSet, pos: Position) -> Vec<TagId> {
    let mut counts: HashMap<TagId, u32> = HashMap::new();

    let mut cum = 0;
    for seg in self.line_segs(pos.line) {
      if cum + seg.size > pos.byte {
        break;
      }
      if let Some((t, _)) = seg.as_toggle() {
        *counts.entry(t.tag).or_insert(0) += 1;
      }
      cum += seg.size;
    }

    let leaf = self.line(pos.line).parent;
    for sibling in self.node(leaf).children.lines() {
      if *sibling == pos.line {
        break;
      }
      for seg in self.line_segs(*sibling) {
        if let Some((t, _)) = seg.as_toggle() {
          *counts.entry(t.tag).or_insert(0) += 1;
        }
      }
    }

    let mut node = leaf;
    while let Some(parent) = self.node(node).parent {
      for sibling in self.node(parent).children.nodes() {
        if *sibling == node {
          break;
        }
        for (tag, cnt) in self.node(*sibling).summary.iter() {
          *counts.entry(*tag).or_insert(0) += *cnt;
        }
      }
      node = parent;
    }

    let mut active: Vec<TagId> = counts
      .into_iter()
      .filter(|(_, c)| c & 1 == 1)
      .map(|(t, _)| t)
      .collect();
    active.sort_by_key(|t| tags.get(*t).priority);
    active
  }

  /// First toggle of `tag` in the tree (either kind), as a position.
  pub fn find_tag_start(
    &self,
    tags: &TagSet,
    tag: TagId,
  ) -> Option<Position> {
    let mut node = tags.get(tag).root?;
    // Descend to the leftmost subtree containing a toggle.
    loop {
      match &self.node(node).children {
        Children::Nodes(children) => {
          let mut found = None;
          for child in children {
            if self.node(*child).summary.contains_key(&tag) {
              found = Some(*child);
              break;
            }
          }
          node = found?;
        }
        Children::Lines(lines) => {
          for line in lines {
            let mut byte = 0;
            for seg in self.line_segs(*line) {
              if let Some((t, _)) = seg.as_toggle() {
                if t.tag == tag {
                  return Some(Position {
                    line: *line,
                    byte,
                  });
                }
              }
              byte += seg.size;
            }
          }
          return None;
        }
      }
    }
  }

  /// Last toggle of `tag` in the tree (either kind), as a position.
  pub fn find_tag_end(&self, tags: &TagSet, tag: TagId) -> Option<Position> {
    let mut node = tags.get(tag).root?;
    loop {
      match &self.node(node).children {
        Children::Nodes(children) => {
          let mut found = None;
          for child in children.iter().rev() {
            if self.node(*child).summary.contains_key(&tag) {
              found = Some(*child);
              break;
            }
          }
          node = found?;
        }
        Children::Lines(lines) => {
          let mut best: Option<Position> = None;
          for line in lines {
            let mut byte = 0;
            for seg in self.line_segs(*line) {
              if let Some((t, _)) = seg.as_toggle() {
                if t.tag == tag {
                  best = Some(Position {
                    line: *line,
                    byte,
                  });
                }
              }
              byte += seg.size;
            }
          }
          return best;
        }
      }
    }
  }
}
