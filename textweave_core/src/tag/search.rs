//! Ordered iteration over toggle transitions of one tag (or all tags).
//!
//! A forward walk over `[i1, i2)` yields toggles at byte positions in
//! `(i1, i2]` (a toggle sitting exactly at the range start belongs to the
//! state already in force there); a reverse walk yields `[i2, i1)` in
//! decreasing order. Single-tag walks stay inside the tag's root subtree
//! and skip sibling subtrees whose summary carries no entry for the tag.
//!
//! Walkers borrow the tree: they are not valid across structural edits.
//! Mutating sweeps take one hit, drop the walker, edit, and start again.

use crate::btree::{BTree, Children, LineId};
use crate::index::{Position, compare};
use crate::tag::{TagId, TagSet};

use std::cmp::Ordering;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// One toggle transition found by a walker.
pub struct ToggleHit {
  pub pos: Position,
  /// Index of the toggle segment within its line at the time of the walk.
  pub seg_idx: usize,
  pub tag: TagId,
  pub on: bool,
}

#[derive(Debug)]
/// Forward toggle walker.
pub struct TagWalker<'a> {
  tree: &'a BTree,
  tags: &'a TagSet,
  tag: Option<TagId>,
  line: LineId,
  line_no: usize,
  seg_idx: usize,
  byte: usize,
  to: Position,
  to_line_no: usize,
  done: bool,
}

impl<'a> TagWalker<'a> {
  pub fn new(
    tree: &'a BTree,
    tags: &'a TagSet,
    from: Position,
    to: Position,
    tag: Option<TagId>,
  ) -> Self {
    let mut w = Self {
      tree,
      tags,
      tag,
      line: from.line,
      line_no: 0,
      seg_idx: 0,
      byte: 0,
      to,
      to_line_no: 0,
      done: false,
    };

    if let Some(t) = tag {
      let Some(p0) = tree.find_tag_start(tags, t) else {
        w.done = true;
        return w;
      };
      if compare(tree, from, p0) == Ordering::Less {
        // The range starts before the tag's first toggle: begin right at
        // that toggle so it is reported.
        if compare(tree, p0, to) == Ordering::Greater {
          w.done = true;
          return w;
        }
        w.line = p0.line;
        w.line_no = tree.line_no(p0.line);
        w.to_line_no = tree.line_no(to.line);
        return w;
      }
    }

    if compare(tree, from, to) != Ordering::Less {
      w.done = true;
      return w;
    }
    w.line_no = tree.line_no(from.line);
    w.to_line_no = tree.line_no(to.line);

    // Start scanning at the sized segment containing the start position;
    // zero-size segments sitting exactly there stay unreported.
    let segs = tree.line_segs(from.line);
    let mut cum = 0;
    let mut idx = segs.len();
    for (i, s) in segs.iter().enumerate() {
      if s.size > 0 && cum + s.size > from.byte {
        idx = i;
        break;
      }
      cum += s.size;
    }
    w.seg_idx = idx;
    w.byte = cum;
    w
  }

  pub fn next(&mut self) -> Option<ToggleHit> {
    if self.done {
      return None;
    }
    loop {
      let segs = self.tree.line_segs(self.line);
      while self.seg_idx < segs.len() {
        let s = &segs[self.seg_idx];
        if self.line_no == self.to_line_no
          && (self.byte > self.to.byte
            || (s.size > 0 && self.byte + s.size > self.to.byte))
        {
          self.done = true;
          return None;
        }
        if let Some((t, on)) = s.as_toggle() {
          if self.tag.is_none_or(|want| want == t.tag) {
            let hit = ToggleHit {
              pos: Position::new(self.line, self.byte),
              seg_idx: self.seg_idx,
              tag: t.tag,
              on,
            };
            self.seg_idx += 1;
            return Some(hit);
          }
        }
        self.byte += s.size;
        self.seg_idx += 1;
      }
      if !self.advance_line() {
        self.done = true;
        return None;
      }
    }
  }

  // Move the cursor to the start of the next line holding a relevant
  // toggle, skipping whole subtrees via node summaries for single-tag
  // walks.
  fn advance_line(&mut self) -> bool {
    if self.line_no >= self.to_line_no {
      return false;
    }
    let leaf = self.tree.line(self.line).parent;
    let lines = self.tree.node(leaf).children.lines();
    let at = lines.iter().position(|l| *l == self.line).unwrap();
    if at + 1 < lines.len() {
      self.line = lines[at + 1];
      self.line_no += 1;
      self.seg_idx = 0;
      self.byte = 0;
      return true;
    }

    let mut next_no = self.line_no + 1;
    let mut node = leaf;
    loop {
      if let Some(t) = self.tag {
        if self.tags.get(t).root == Some(node) {
          return false;
        }
      }
      let parent = match self.tree.node(node).parent {
        Some(p) => p,
        None => return false,
      };
      let siblings = self.tree.node(parent).children.nodes();
      let at = siblings.iter().position(|n| *n == node).unwrap();
      for sib in &siblings[at + 1..] {
        let relevant = match self.tag {
          Some(t) => self.tree.node(*sib).summary.contains_key(&t),
          None => true,
        };
        if !relevant {
          next_no += self.tree.node(*sib).num_lines;
          if next_no > self.to_line_no {
            return false;
          }
          continue;
        }
        // Descend to the first relevant line of this subtree.
        let mut down = *sib;
        loop {
          match &self.tree.node(down).children {
            Children::Nodes(children) => {
              let mut chosen = None;
              for child in children {
                let child_relevant = match self.tag {
                  Some(t) => {
                    self.tree.node(*child).summary.contains_key(&t)
                  }
                  None => true,
                };
                if child_relevant {
                  chosen = Some(*child);
                  break;
                }
                next_no += self.tree.node(*child).num_lines;
              }
              down = chosen.expect("tag summary info out of step");
            }
            Children::Lines(children) => {
              if next_no > self.to_line_no {
                return false;
              }
              self.line = children[0];
              self.line_no = next_no;
              self.seg_idx = 0;
              self.byte = 0;
              return true;
            }
          }
        }
      }
      node = parent;
    }
  }
}

#[derive(Debug)]
/// Reverse toggle walker: yields hits in decreasing position order.
pub struct ReverseTagWalker<'a> {
  tree: &'a BTree,
  tags: &'a TagSet,
  tag: Option<TagId>,
  line: LineId,
  line_no: usize,
  // Exclusive segment-index bound within the current line, tightened after
  // every hit so each scan returns the previous toggle.
  upper_seg: Option<usize>,
  from: Position,
  from_line_no: usize,
  to: Position,
  to_line_no: usize,
  done: bool,
}

impl<'a> ReverseTagWalker<'a> {
  pub fn new(
    tree: &'a BTree,
    tags: &'a TagSet,
    from: Position,
    to: Position,
    tag: Option<TagId>,
  ) -> Self {
    let mut w = Self {
      tree,
      tags,
      tag,
      line: from.line,
      line_no: 0,
      upper_seg: None,
      from,
      from_line_no: 0,
      to,
      to_line_no: 0,
      done: false,
    };

    if compare(tree, from, to) != Ordering::Greater {
      w.done = true;
      return w;
    }
    w.from_line_no = tree.line_no(from.line);
    w.to_line_no = tree.line_no(to.line);
    w.line_no = w.from_line_no;

    if let Some(t) = tag {
      let Some(p_end) = tree.find_tag_end(tags, t) else {
        w.done = true;
        return w;
      };
      if compare(tree, from, p_end) == Ordering::Greater {
        // The walk starts past the tag's last toggle: begin on its line so
        // that toggle is reported first.
        let no = tree.line_no(p_end.line);
        if no < w.to_line_no {
          w.done = true;
          return w;
        }
        w.line = p_end.line;
        w.line_no = no;
      }
    }
    w
  }

  pub fn next(&mut self) -> Option<ToggleHit> {
    if self.done {
      return None;
    }
    loop {
      let segs = self.tree.line_segs(self.line);
      let bound = self.upper_seg.unwrap_or(segs.len());
      let mut byte = 0;
      let mut found: Option<ToggleHit> = None;
      for (i, s) in segs.iter().enumerate().take(bound) {
        let eligible = (self.line_no != self.from_line_no
          || byte < self.from.byte)
          && (self.line_no != self.to_line_no || byte >= self.to.byte);
        if eligible {
          if let Some((t, on)) = s.as_toggle() {
            if self.tag.is_none_or(|want| want == t.tag) {
              found = Some(ToggleHit {
                pos: Position::new(self.line, byte),
                seg_idx: i,
                tag: t.tag,
                on,
              });
            }
          }
        }
        byte += s.size;
      }
      if let Some(hit) = found {
        self.upper_seg = Some(hit.seg_idx);
        return Some(hit);
      }
      if !self.retreat_line() {
        self.done = true;
        return None;
      }
    }
  }

  // Move to the nearest earlier line that can hold a relevant toggle.
  fn retreat_line(&mut self) -> bool {
    if self.line_no == 0 || self.line_no - 1 < self.to_line_no {
      return false;
    }
    let leaf = self.tree.line(self.line).parent;
    let lines = self.tree.node(leaf).children.lines();
    let at = lines.iter().position(|l| *l == self.line).unwrap();
    if at > 0 {
      self.line = lines[at - 1];
      self.line_no -= 1;
      self.upper_seg = None;
      return true;
    }

    let mut prev_no = self.line_no;
    let mut node = leaf;
    loop {
      if let Some(t) = self.tag {
        if self.tags.get(t).root == Some(node) {
          return false;
        }
      }
      let parent = match self.tree.node(node).parent {
        Some(p) => p,
        None => return false,
      };
      let siblings = self.tree.node(parent).children.nodes();
      let at = siblings.iter().position(|n| *n == node).unwrap();
      for sib in siblings[..at].iter().rev() {
        let relevant = match self.tag {
          Some(t) => self.tree.node(*sib).summary.contains_key(&t),
          None => true,
        };
        if !relevant {
          prev_no -= self.tree.node(*sib).num_lines;
          if prev_no <= self.to_line_no {
            return false;
          }
          continue;
        }
        // Descend to the last relevant line of this subtree.
        let mut down = *sib;
        loop {
          match &self.tree.node(down).children {
            Children::Nodes(children) => {
              let mut chosen = None;
              for child in children.iter().rev() {
                let child_relevant = match self.tag {
                  Some(t) => {
                    self.tree.node(*child).summary.contains_key(&t)
                  }
                  None => true,
                };
                if child_relevant {
                  chosen = Some(*child);
                  break;
                }
                prev_no -= self.tree.node(*child).num_lines;
              }
              down = chosen.expect("tag summary info out of step");
            }
            Children::Lines(children) => {
              let no = prev_no - 1;
              if no < self.to_line_no {
                return false;
              }
              self.line = *children.last().unwrap();
              self.line_no = no;
              self.upper_seg = None;
              return true;
            }
          }
        }
      }
      node = parent;
    }
  }
}
