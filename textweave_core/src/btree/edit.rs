//! Structural edits: insert, delete, split, cleanup, rebalance.

use crate::btree::{
  Anchors, BTree, Children, Line, LineId, LinePixel, MAX_CHILDREN,
  MIN_CHILDREN, Node, NodeId, next_line_id, next_node_id,
};
use crate::index::Position;
use crate::seg::{Gravity, SegBody, Segment};
use crate::tag::TagSet;

use litemap::LiteMap;
use smallvec::{SmallVec, smallvec};
use tracing::trace;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// What an insertion did, for metric invalidation.
pub struct InsertOutcome {
  pub from_line_no: usize,
  pub added_lines: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// What a deletion did, for metric invalidation.
pub struct DeleteOutcome {
  pub from_line_no: usize,
  pub removed_lines: usize,
}

impl BTree {
  /// Make sure a segment boundary exists exactly at `pos` and return the
  /// index where new segments are inserted: after every zero-size
  /// left-gravity segment at that offset, before the first right-gravity
  /// one.
  pub(crate) fn split_at(&mut self, pos: Position) -> usize {
    let line = self.line_mut(pos.line);
    let mut count = pos.byte;
    let mut i = 0;
    while i < line.segs.len() {
      let size = line.segs[i].size;
      if size > count {
        if count == 0 {
          return i;
        }
        let (a, b) = line.segs[i].split(count);
        line.segs[i] = a;
        line.segs.insert(i + 1, b);
        return i + 1;
      } else if size == 0
        && count == 0
        && line.segs[i].gravity() == Gravity::Right
      {
        return i;
      }
      count -= size;
      i += 1;
    }
    debug_assert_eq!(count, 0, "position past the end of its line");
    line.segs.len()
  }

  // The index `split_at` would return once the boundary exists.
  fn boundary_index(&self, line: LineId, byte: usize) -> usize {
    let segs = &self.line(line).segs;
    let mut count = byte;
    for (i, seg) in segs.iter().enumerate() {
      if seg.size > count {
        debug_assert_eq!(count, 0, "no segment boundary at byte offset");
        return i;
      } else if seg.size == 0 && count == 0 && seg.gravity() == Gravity::Right
      {
        return i;
      }
      count -= seg.size;
    }
    segs.len()
  }

  /// Give every segment of a modified line a chance to fold with its
  /// neighbours, repeating until a fixed point: adjacent character runs
  /// merge, an off-toggle meeting an on-toggle of the same tag across
  /// zero-size segments annihilates with it, and surviving toggles are
  /// re-counted into ancestor summaries.
  pub(crate) fn cleanup_line(&mut self, tags: &mut TagSet, line_id: LineId) {
    let parent = self.line(line_id).parent;
    let mut segs = std::mem::take(&mut self.line_mut(line_id).segs);

    loop {
      let mut changed = false;
      let mut i = 0;
      while i < segs.len() {
        if segs[i].is_chars()
          && i + 1 < segs.len()
          && segs[i + 1].is_chars()
        {
          let merged = segs[i].merge_chars(&segs[i + 1]).unwrap();
          segs[i] = merged;
          segs.remove(i + 1);
          changed = true;
          continue;
        }

        if let SegBody::ToggleOff(t_off) = &segs[i].body {
          let t_off = *t_off;
          let mut cancel = None;
          let mut j = i + 1;
          while j < segs.len() && segs[j].size == 0 {
            if let SegBody::ToggleOn(t_on) = &segs[j].body {
              if t_on.tag == t_off.tag {
                cancel = Some((j, *t_on));
                break;
              }
            }
            j += 1;
          }
          if let Some((j, t_on)) = cancel {
            let counts =
              t_off.in_node_counts as i32 + t_on.in_node_counts as i32;
            if counts != 0 {
              self.change_node_toggle_count(tags, parent, t_off.tag, -counts);
            }
            segs.remove(j);
            segs.remove(i);
            changed = true;
            continue;
          }
        }

        if let Some((t, _)) = segs[i].as_toggle() {
          if !t.in_node_counts {
            self.change_node_toggle_count(tags, parent, t.tag, 1);
            segs[i].as_toggle_mut().unwrap().in_node_counts = true;
          }
        }
        i += 1;
      }
      if !changed {
        break;
      }
    }

    self.line_mut(line_id).segs = segs;
  }

  /// Insert `s` at `pos`. Newlines in `s` create new logical lines, moving
  /// the tail of the insertion line onto the last one. New lines inherit
  /// the insertion line's cached pixel heights with a stale epoch.
  pub fn insert(
    &mut self,
    tags: &mut TagSet,
    anchors: &mut Anchors,
    pos: Position,
    s: &str,
  ) -> InsertOutcome {
    self.bump_epoch();
    let from_line_no = self.line_no(pos.line);
    let mut ins = self.split_at(pos);
    let mut cur_line = pos.line;
    let mut added = 0usize;
    let pixel_refs = self.pixel_refs();
    let mut pixel_change: SmallVec<[isize; 2]> = smallvec![0; pixel_refs];

    let mut rest = s;
    let mut link_at: Option<usize> = None;
    while !rest.is_empty() {
      let (chunk, remainder) = match rest.find('\n') {
        Some(i) => (&rest[..=i], &rest[i + 1..]),
        None => (rest, ""),
      };
      self
        .line_mut(cur_line)
        .segs
        .insert(ins, Segment::chars(chunk));
      ins += 1;
      if !chunk.ends_with('\n') {
        break;
      }

      // The chunk ended with a newline: start a new logical line and move
      // the remainder of the current line onto it.
      let tail: Vec<Segment> = self.line_mut(cur_line).segs.split_off(ins);
      let new_id = next_line_id();
      let parent = self.line(cur_line).parent;
      let mut pixels: SmallVec<[LinePixel; 2]> = SmallVec::new();
      for r in 0..pixel_refs {
        let h = self.line(cur_line).pixels[r].height;
        pixels.push(LinePixel {
          height: h,
          epoch: 0,
        });
        pixel_change[r] += h as isize;
      }
      self.insert_line(
        new_id,
        Line {
          parent,
          segs: tail,
          pixels,
        },
      );
      let lines = self.node_mut(parent).children.lines_mut();
      let at = match link_at {
        Some(at) => at + 1,
        None => lines.iter().position(|l| *l == cur_line).unwrap() + 1,
      };
      lines.insert(at, new_id);
      link_at = Some(at);

      cur_line = new_id;
      ins = 0;
      added += 1;
      rest = remainder;
    }

    // Named segments may have moved onto new lines; re-book them.
    if added > 0 {
      let mut l = pos.line;
      loop {
        anchors.rebook(l, &self.line(l).segs);
        if l == cur_line {
          break;
        }
        l = self.next_line(l).unwrap();
      }
    }

    self.cleanup_line(tags, pos.line);
    if cur_line != pos.line {
      self.cleanup_line(tags, cur_line);
    }

    if added > 0 || pixel_change.iter().any(|d| *d != 0) {
      let mut node = Some(self.line(cur_line).parent);
      while let Some(id) = node {
        let n = self.node_mut(id);
        n.num_lines += added;
        for r in 0..pixel_refs {
          n.num_pixels[r] =
            (n.num_pixels[r] as isize + pixel_change[r]) as usize;
        }
        node = n.parent;
      }
    }

    let leaf = self.line(cur_line).parent;
    if self.node(leaf).children.len() > MAX_CHILDREN {
      self.rebalance(tags, leaf);
    }

    trace!(
      "inserted {} bytes at line {from_line_no}, {added} new lines",
      s.len()
    );
    InsertOutcome {
      from_line_no,
      added_lines: added,
    }
  }

  /// Delete `[p1, p2)`. The caller guarantees `p1 < p2` and that the final
  /// newline of the tree is outside the range. Segments that refuse to die
  /// (marks, toggles) relocate to the surviving start position; lines left
  /// without content are unlinked and the endpoints' ancestors rebalanced.
  pub fn delete(
    &mut self,
    tags: &mut TagSet,
    anchors: &mut Anchors,
    p1: Position,
    p2: Position,
  ) -> DeleteOutcome {
    self.bump_epoch();
    let from_line_no = self.line_no(p1.line);

    // Split at the far end first; the start split could otherwise shift
    // the end boundary.
    self.split_at(p2);
    self.split_at(p1);
    let first_idx = self.boundary_index(p1.line, p1.byte);
    let mut cursor = first_idx;
    let mut removed_lines = 0usize;

    if p1.line == p2.line {
      let last_idx = self.boundary_index(p2.line, p2.byte);
      let removed: Vec<Segment> = self
        .line_mut(p1.line)
        .segs
        .drain(first_idx..last_idx)
        .collect();
      self.process_deleted(tags, anchors, p1.line, p1.line, removed, &mut cursor);
    } else {
      let removed: Vec<Segment> =
        self.line_mut(p1.line).segs.drain(first_idx..).collect();
      self.process_deleted(tags, anchors, p1.line, p1.line, removed, &mut cursor);

      let mut mid = Vec::new();
      let mut l = self.next_line(p1.line).unwrap();
      while l != p2.line {
        mid.push(l);
        l = self.next_line(l).unwrap();
      }
      for line in mid {
        let segs = std::mem::take(&mut self.line_mut(line).segs);
        self.process_deleted(tags, anchors, line, p1.line, segs, &mut cursor);
        self.unlink_line(line);
        removed_lines += 1;
      }

      let last_idx = self.boundary_index(p2.line, p2.byte);
      let removed: Vec<Segment> =
        self.line_mut(p2.line).segs.drain(..last_idx).collect();
      self.process_deleted(tags, anchors, p2.line, p1.line, removed, &mut cursor);

      // Join the lines: the remaining tail of the end line migrates to the
      // start line, toggles dropping their old ancestors' counts first.
      let mut tail = std::mem::take(&mut self.line_mut(p2.line).segs);
      let l2_parent = self.line(p2.line).parent;
      for seg in tail.iter_mut() {
        let Some(t) = seg.as_toggle_mut() else {
          continue;
        };
        if !t.in_node_counts {
          continue;
        }
        t.in_node_counts = false;
        let tag = t.tag;
        self.change_node_toggle_count(tags, l2_parent, tag, -1);
      }
      self.line_mut(p1.line).segs.extend(tail);
      let reb = self.unlink_line(p2.line);
      removed_lines += 1;
      self.rebalance(tags, reb);
    }

    self.cleanup_line(tags, p1.line);
    anchors.rebook(p1.line, &self.line(p1.line).segs);
    let leaf = self.line(p1.line).parent;
    self.rebalance(tags, leaf);

    trace!("deleted range at line {from_line_no}, {removed_lines} lines gone");
    DeleteOutcome {
      from_line_no,
      removed_lines,
    }
  }

  // Run the delete hook over segments cut out of `ctx_line`. Character
  // runs die; embedded objects die and leave the name book; toggles drop
  // their ancestor counts and survive; marks survive. Survivors relink at
  // `cursor` in `dest_line`, left-gravity ones advancing it.
  fn process_deleted(
    &mut self,
    tags: &mut TagSet,
    anchors: &mut Anchors,
    ctx_line: LineId,
    dest_line: LineId,
    segs: Vec<Segment>,
    cursor: &mut usize,
  ) {
    let ctx_parent = self.line(ctx_line).parent;
    for mut seg in segs {
      let survives = match &mut seg.body {
        SegBody::Chars(_) => false,
        SegBody::ToggleOn(t) | SegBody::ToggleOff(t) => {
          if t.in_node_counts {
            t.in_node_counts = false;
            let tag = t.tag;
            self.change_node_toggle_count(tags, ctx_parent, tag, -1);
          }
          true
        }
        SegBody::Mark(m) => {
          anchors.set_mark_line(&m.name, dest_line);
          true
        }
        SegBody::Window(w) => {
          anchors.remove_embed(&w.name);
          false
        }
        SegBody::Image(im) => {
          anchors.remove_embed(&im.name);
          false
        }
      };
      if survives {
        let grav = seg.gravity();
        self.line_mut(dest_line).segs.insert(*cursor, seg);
        if grav == Gravity::Left {
          *cursor += 1;
        }
      }
    }
  }

  // Remove a line from its leaf, walking ancestor totals down and
  // cascading away nodes left without children. Returns the deepest
  // surviving ancestor.
  fn unlink_line(&mut self, line_id: LineId) -> NodeId {
    let parent = self.line(line_id).parent;
    let heights: SmallVec<[usize; 2]> = self
      .line(line_id)
      .pixels
      .iter()
      .map(|p| p.height)
      .collect();

    let mut node = Some(parent);
    while let Some(id) = node {
      let n = self.node_mut(id);
      n.num_lines -= 1;
      for (r, h) in heights.iter().enumerate() {
        n.num_pixels[r] -= h;
      }
      node = n.parent;
    }

    {
      let lines = self.node_mut(parent).children.lines_mut();
      let at = lines.iter().position(|l| *l == line_id).unwrap();
      lines.remove(at);
    }
    self.remove_line(line_id);

    let mut cur = parent;
    while self.node(cur).children.is_empty() {
      let Some(p) = self.node(cur).parent else {
        break;
      };
      let siblings = self.node_mut(p).children.nodes_mut();
      let i = siblings.iter().position(|n| *n == cur).unwrap();
      siblings.remove(i);
      self.remove_node(cur);
      cur = p;
    }
    cur
  }

  /// Walk from `node_id` to the root, splitting overfull nodes and
  /// merging or redistributing underfull ones.
  pub(crate) fn rebalance(&mut self, tags: &mut TagSet, node_id: NodeId) {
    let mut cur = Some(node_id);
    while let Some(id) = cur {
      let mut nid = id;

      if self.node(nid).children.len() > MAX_CHILDREN {
        loop {
          if self.node(nid).parent.is_none() {
            // Splitting the root: grow a new root above it first.
            let new_root = next_node_id();
            let level = self.node(nid).level + 1;
            let num_lines = self.node(nid).num_lines;
            let num_pixels = self.node(nid).num_pixels.clone();
            self.insert_node(
              new_root,
              Node {
                parent: None,
                level,
                children: Children::Nodes(vec![nid]),
                num_lines,
                num_pixels,
                summary: LiteMap::new(),
              },
            );
            self.node_mut(nid).parent = Some(new_root);
            self.set_root(new_root);
          }

          // Split off all but the first MIN_CHILDREN into a new sibling.
          let parent = self.node(nid).parent.unwrap();
          let level = self.node(nid).level;
          let new_id = next_node_id();
          let moved = match &mut self.node_mut(nid).children {
            Children::Lines(v) => Children::Lines(v.split_off(MIN_CHILDREN)),
            Children::Nodes(v) => Children::Nodes(v.split_off(MIN_CHILDREN)),
          };
          let pixel_refs = self.pixel_refs();
          self.insert_node(
            new_id,
            Node {
              parent: Some(parent),
              level,
              children: moved,
              num_lines: 0,
              num_pixels: smallvec![0; pixel_refs],
              summary: LiteMap::new(),
            },
          );
          {
            let siblings = self.node_mut(parent).children.nodes_mut();
            let at = siblings.iter().position(|n| *n == nid).unwrap();
            siblings.insert(at + 1, new_id);
          }
          self.recompute_counts(tags, nid);
          nid = new_id;
          if self.node(nid).children.len() <= MAX_CHILDREN {
            self.recompute_counts(tags, nid);
            break;
          }
        }
      }

      while self.node(nid).children.len() < MIN_CHILDREN {
        let parent = match self.node(nid).parent {
          None => {
            // The root may run short, but a root holding one interior
            // child collapses onto that child.
            if self.node(nid).children.len() == 1 && self.node(nid).level > 0
            {
              let child = self.node(nid).children.nodes()[0];
              self.node_mut(child).parent = None;
              self.set_root(child);
              for tag_id in tags.all_ids() {
                if tags.get(tag_id).root == Some(nid) {
                  tags.get_mut(tag_id).root = Some(child);
                }
              }
              self.remove_node(nid);
            }
            return;
          }
          Some(p) => p,
        };

        if self.node(parent).children.len() < 2 {
          self.rebalance(tags, parent);
          continue;
        }

        // Pair with a neighbour sibling, arranging for `left` to be the
        // earlier of the two.
        let siblings = self.node(parent).children.nodes().clone();
        let at = siblings.iter().position(|n| *n == nid).unwrap();
        let (left, right) = if at + 1 < siblings.len() {
          (nid, siblings[at + 1])
        } else {
          (siblings[at - 1], nid)
        };

        let right_children = match &mut self.node_mut(right).children {
          Children::Lines(v) => Children::Lines(std::mem::take(v)),
          Children::Nodes(v) => Children::Nodes(std::mem::take(v)),
        };
        let total = self.node(left).children.len() + right_children.len();

        if total <= MAX_CHILDREN {
          // Merge the pair into `left`.
          match right_children {
            Children::Lines(mut w) => {
              self.node_mut(left).children.lines_mut().append(&mut w);
            }
            Children::Nodes(mut w) => {
              self.node_mut(left).children.nodes_mut().append(&mut w);
            }
          }
          self.recompute_counts(tags, left);
          {
            let siblings = self.node_mut(parent).children.nodes_mut();
            let i = siblings.iter().position(|n| *n == right).unwrap();
            siblings.remove(i);
          }
          self.remove_node(right);
          nid = left;
          continue;
        }

        // Redistribute evenly, the midpoint becoming the new boundary.
        let keep = total / 2;
        match right_children {
          Children::Lines(mut w) => {
            let back = {
              let v = self.node_mut(left).children.lines_mut();
              v.append(&mut w);
              v.split_off(keep)
            };
            *self.node_mut(right).children.lines_mut() = back;
          }
          Children::Nodes(mut w) => {
            let back = {
              let v = self.node_mut(left).children.nodes_mut();
              v.append(&mut w);
              v.split_off(keep)
            };
            *self.node_mut(right).children.nodes_mut() = back;
          }
        }
        self.recompute_counts(tags, left);
        self.recompute_counts(tags, right);
        nid = left;
      }

      cur = self.node(nid).parent;
    }
  }

  /// Rebuild a node's child count, line count, pixel totals and tag
  /// summary from its children, re-pointing their parent links, and adjust
  /// the root cache of every affected tag.
  pub(crate) fn recompute_counts(&mut self, tags: &mut TagSet, node_id: NodeId) {
    let pixel_refs = self.pixel_refs();
    let mut num_lines = 0usize;
    let mut num_pixels: SmallVec<[usize; 2]> = smallvec![0; pixel_refs];
    let mut summary: LiteMap<crate::tag::TagId, u32> = LiteMap::new();

    let children = self.node(node_id).children.clone();
    match &children {
      Children::Lines(lines) => {
        for line in lines {
          num_lines += 1;
          let l = self.line_mut(*line);
          l.parent = node_id;
          for (r, px) in l.pixels.iter().enumerate() {
            num_pixels[r] += px.height;
          }
          for seg in &l.segs {
            if let Some((t, _)) = seg.as_toggle() {
              if t.in_node_counts {
                match summary.get_mut(&t.tag) {
                  Some(c) => *c += 1,
                  None => {
                    summary.insert(t.tag, 1);
                  }
                }
              }
            }
          }
        }
      }
      Children::Nodes(nodes) => {
        for child in nodes {
          self.node_mut(*child).parent = Some(node_id);
          let c = self.node(*child);
          num_lines += c.num_lines;
          for r in 0..pixel_refs {
            num_pixels[r] += c.num_pixels[r];
          }
          for (tag, cnt) in c.summary.iter() {
            let (tag, cnt) = (*tag, *cnt);
            match summary.get_mut(&tag) {
              Some(acc) => *acc += cnt,
              None => {
                summary.insert(tag, cnt);
              }
            }
          }
        }
      }
    }

    // Entries with every toggle of their tag pull the tag root down here;
    // partial entries sitting at the old root's level push it up a level.
    let node_level = self.node(node_id).level;
    let node_parent = self.node(node_id).parent;
    let mut pruned: LiteMap<crate::tag::TagId, u32> = LiteMap::new();
    for (tag_id, cnt) in summary.iter() {
      let (tag_id, cnt) = (*tag_id, *cnt);
      let total = tags.get(tag_id).toggle_count;
      if cnt > 0 && cnt < total {
        let root = tags.get(tag_id).root.unwrap();
        if node_level == self.node(root).level {
          tags.get_mut(tag_id).root = node_parent;
        }
        pruned.insert(tag_id, cnt);
      } else if cnt == total && total > 0 {
        tags.get_mut(tag_id).root = Some(node_id);
      }
    }

    let n = self.node_mut(node_id);
    n.num_lines = num_lines;
    n.num_pixels = num_pixels;
    n.summary = pruned;
  }
}
