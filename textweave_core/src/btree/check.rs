//! Whole-tree consistency checks.
//!
//! Debug-build validation of the structural invariants: child-count
//! bounds, counter agreement between parents and children, segment
//! ordering rules, toggle summaries and per-tag root caches. Tests call
//! [`BTree::check`] after every mutation; it is never meant to fire in
//! production.

use crate::btree::{BTree, Children, MAX_CHILDREN, MIN_CHILDREN, NodeId};
use crate::prelude::*;
use crate::seg::SegBody;
use crate::tag::{TagId, TagSet};

use smallvec::SmallVec;

impl BTree {
  /// Walk the whole tree and panic on any violated invariant.
  pub fn check(&self, tags: &TagSet) {
    let root = self.root();
    assert!(
      self.node(root).parent.is_none(),
      "root node has a parent"
    );
    match &self.node(root).children {
      Children::Lines(lines) => {
        assert!(!lines.is_empty(), "root leaf has no lines");
      }
      Children::Nodes(nodes) => {
        assert!(
          nodes.len() >= 2,
          "interior root has fewer than 2 children"
        );
      }
    }
    self.check_node(root);

    for id in tags.all_ids() {
      let tag = tags.get(id);
      assert_eq!(
        tag.toggle_count % 2,
        0,
        "tag {:?} has an odd toggle count",
        tag.name()
      );
      let total = self.count_toggles(self.root(), id);
      assert_eq!(
        total,
        tag.toggle_count,
        "tag {:?} toggle count disagrees with the tree",
        tag.name()
      );
      match tag.root {
        None => {
          assert_eq!(
            tag.toggle_count,
            0,
            "tag {:?} has toggles but no root",
            tag.name()
          );
        }
        Some(r) => {
          assert!(
            tag.toggle_count > 0,
            "tag {:?} has a root but no toggles",
            tag.name()
          );
          assert!(
            !self.node(r).summary.contains_key(&id),
            "tag {:?} root node carries summary info",
            tag.name()
          );
          let inside = self.count_toggles(r, id);
          assert_eq!(
            inside,
            tag.toggle_count,
            "tag {:?} root subtree misses toggles",
            tag.name()
          );
        }
      }
    }

    assert!(self.line_count() >= 2, "fewer than 2 lines in tree");

    // The dummy trailing line: optional trailing off-toggles and marks,
    // then a lone newline segment; zero cached heights everywhere.
    let last = self.last_line();
    let segs = self.line_segs(last);
    let mut i = 0;
    while i < segs.len() {
      match &segs[i].body {
        SegBody::ToggleOff(_) | SegBody::Mark(_) => i += 1,
        _ => break,
      }
    }
    assert_eq!(i, segs.len() - 1, "dummy line has bogus segments");
    assert_eq!(
      segs[i].as_chars(),
      Some("\n"),
      "dummy line isn't a lone newline"
    );
    for px in &self.line(last).pixels {
      assert_eq!(px.height, 0, "dummy line has a pixel height");
    }
  }

  fn check_node(&self, node_id: NodeId) {
    let node = self.node(node_id);
    if node.parent.is_some() {
      assert!(
        node.children.len() >= MIN_CHILDREN
          && node.children.len() <= MAX_CHILDREN,
        "node child count {} out of bounds",
        node.children.len()
      );
    }

    let mut num_lines = 0usize;
    let mut num_pixels: SmallVec<[usize; 2]> =
      smallvec::smallvec![0; self.pixel_refs()];
    let mut summary: HashMap<TagId, u32> = HashMap::new();

    match &node.children {
      Children::Lines(lines) => {
        assert_eq!(node.level, 0, "leaf node at non-zero level");
        for line_id in lines {
          let line = self.line(*line_id);
          assert_eq!(line.parent, node_id, "line parent link is stale");
          assert_eq!(
            line.pixels.len(),
            self.pixel_refs(),
            "line pixel slots out of step with viewer count"
          );
          num_lines += 1;
          for (r, px) in line.pixels.iter().enumerate() {
            num_pixels[r] += px.height;
          }
          assert!(!line.segs.is_empty(), "line with no segments");
          for (i, seg) in line.segs.iter().enumerate() {
            seg.check(i == line.segs.len() - 1);
            if i > 0 {
              assert!(
                !(seg.is_chars() && line.segs[i - 1].is_chars()),
                "adjacent character segments weren't merged"
              );
            }
            if let Some((t, _)) = seg.as_toggle() {
              if t.in_node_counts {
                *summary.entry(t.tag).or_insert(0) += 1;
              }
            }
          }
        }
      }
      Children::Nodes(nodes) => {
        assert!(node.level > 0, "interior node at level 0");
        for child_id in nodes {
          let child = self.node(*child_id);
          assert_eq!(
            child.parent,
            Some(node_id),
            "child parent link is stale"
          );
          assert_eq!(
            child.level + 1,
            node.level,
            "child level out of step"
          );
          num_lines += child.num_lines;
          for r in 0..self.pixel_refs() {
            num_pixels[r] += child.num_pixels[r];
          }
          for (tag, cnt) in child.summary.iter() {
            *summary.entry(*tag).or_insert(0) += *cnt;
          }
          self.check_node(*child_id);
        }
      }
    }

    assert_eq!(node.num_lines, num_lines, "numLines disagrees with children");
    for r in 0..self.pixel_refs() {
      assert_eq!(
        node.num_pixels[r], num_pixels[r],
        "numPixels disagrees with children"
      );
    }
    for (tag, cnt) in node.summary.iter() {
      assert_eq!(
        summary.get(tag),
        Some(cnt),
        "summary entry disagrees with children"
      );
    }
  }

  // Toggles of `tag` anywhere under `node_id`.
  fn count_toggles(&self, node_id: NodeId, tag: TagId) -> u32 {
    let mut count = 0;
    match &self.node(node_id).children {
      Children::Lines(lines) => {
        for line in lines {
          for seg in self.line_segs(*line) {
            if let SegBody::ToggleOn(t) | SegBody::ToggleOff(t) = &seg.body {
              if t.tag == tag {
                count += 1;
              }
            }
          }
        }
      }
      Children::Nodes(nodes) => {
        for child in nodes {
          count += self.count_toggles(*child, tag);
        }
      }
    }
    count
  }
}
