//! B-tree of logical lines.
//!
//! The tree is a sequence container: leaves own ordered lists of logical
//! lines, interior nodes own ordered lists of child nodes. Every node keeps
//! subtree totals (line count, per-viewer pixel count, per-tag toggle
//! count) so positional queries cost O(log N), and every structural
//! mutation keeps those totals exact.
//!
//! The tree always carries a dummy trailing line holding a single `"\n"`.
//! It is never displayed, its pixel height stays zero, and it makes
//! end-of-text indices representable without a special case.

use crate::prelude::*;
use crate::seg::{SegBody, Segment};
use crate::tag::TagId;

use litemap::LiteMap;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicI32, Ordering};

pub mod anchors;
pub mod check;
pub mod edit;
pub mod summary;

#[cfg(test)]
mod btree_tests;

pub use anchors::Anchors;

/// Node handle.
pub type NodeId = i32;

/// Line handle. Stable across edits for as long as the line survives.
pub type LineId = i32;

/// Minimum children per non-root node.
pub const MIN_CHILDREN: usize = 6;

/// Maximum children per node, twice [`MIN_CHILDREN`].
pub const MAX_CHILDREN: usize = 2 * MIN_CHILDREN;

/// Next unique node id.
pub(crate) fn next_node_id() -> NodeId {
  static VALUE: AtomicI32 = AtomicI32::new(100001);
  VALUE.fetch_add(1, Ordering::Relaxed)
}

/// Next unique line id.
pub(crate) fn next_line_id() -> LineId {
  static VALUE: AtomicI32 = AtomicI32::new(1);
  VALUE.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// Cached pixel height of one logical line for one viewer slot, together
/// with the invalidation epoch at which it was computed.
pub struct LinePixel {
  pub height: usize,
  pub epoch: u32,
}

#[derive(Debug, Clone)]
/// A logical line: an ordered list of segments ending in a `Chars` segment
/// whose text ends with `'\n'`, plus one cached pixel height per viewer.
pub struct Line {
  pub(crate) parent: NodeId,
  pub(crate) segs: Vec<Segment>,
  pub(crate) pixels: SmallVec<[LinePixel; 2]>,
}

impl Line {
  /// Total byte length, including the trailing newline.
  pub fn byte_len(&self) -> usize {
    self.segs.iter().map(|s| s.size).sum()
  }

  pub fn segs(&self) -> &[Segment] {
    &self.segs
  }
}

#[derive(Debug, Clone)]
/// Ordered children of one node: lines at level 0, nodes above.
pub enum Children {
  Lines(Vec<LineId>),
  Nodes(Vec<NodeId>),
}

impl Children {
  pub fn len(&self) -> usize {
    match self {
      Children::Lines(v) => v.len(),
      Children::Nodes(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn lines(&self) -> &Vec<LineId> {
    match self {
      Children::Lines(v) => v,
      Children::Nodes(_) => unreachable!("interior node has no line children"),
    }
  }

  pub fn lines_mut(&mut self) -> &mut Vec<LineId> {
    match self {
      Children::Lines(v) => v,
      Children::Nodes(_) => unreachable!("interior node has no line children"),
    }
  }

  pub fn nodes(&self) -> &Vec<NodeId> {
    match self {
      Children::Nodes(v) => v,
      Children::Lines(_) => unreachable!("leaf node has no node children"),
    }
  }

  pub fn nodes_mut(&mut self) -> &mut Vec<NodeId> {
    match self {
      Children::Nodes(v) => v,
      Children::Lines(_) => unreachable!("leaf node has no node children"),
    }
  }
}

#[derive(Debug, Clone)]
/// Interior or leaf node with subtree totals.
pub struct Node {
  pub(crate) parent: Option<NodeId>,
  /// 0 for leaves, parent level is child level + 1.
  pub(crate) level: usize,
  pub(crate) children: Children,
  /// Subtree total line count.
  pub(crate) num_lines: usize,
  /// Subtree total pixel count per viewer slot.
  pub(crate) num_pixels: SmallVec<[usize; 2]>,
  /// Sparse per-tag toggle counts for the subtree. A tag whose root is this
  /// node or an ancestor has no entry here.
  pub(crate) summary: LiteMap<TagId, u32>,
}

impl Node {
  fn new_leaf(parent: Option<NodeId>, pixel_refs: usize) -> Self {
    Self {
      parent,
      level: 0,
      children: Children::Lines(Vec::new()),
      num_lines: 0,
      num_pixels: smallvec::smallvec![0; pixel_refs],
      summary: LiteMap::new(),
    }
  }

  pub fn level(&self) -> usize {
    self.level
  }

  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  pub fn children(&self) -> &Children {
    &self.children
  }

  pub fn num_lines(&self) -> usize {
    self.num_lines
  }

  pub fn summary(&self) -> &LiteMap<TagId, u32> {
    &self.summary
  }
}

#[derive(Debug)]
/// The B-tree itself: root node, node/line storage, viewer pixel slots and
/// the structural state epoch.
pub struct BTree {
  root: NodeId,
  nodes: HashMap<NodeId, Node>,
  lines: HashMap<LineId, Line>,
  pixel_refs: usize,
  state_epoch: u64,
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl BTree {
  /// Create a tree holding two empty lines: one usable line with a lone
  /// newline, and the dummy trailing line.
  pub fn new() -> Self {
    let root_id = next_node_id();
    let first = next_line_id();
    let dummy = next_line_id();

    let mut nodes = HashMap::new();
    let mut root = Node::new_leaf(None, 0);
    root.children = Children::Lines(vec![first, dummy]);
    root.num_lines = 2;
    nodes.insert(root_id, root);

    let mut lines = HashMap::new();
    for id in [first, dummy] {
      lines.insert(
        id,
        Line {
          parent: root_id,
          segs: vec![Segment::chars("\n")],
          pixels: SmallVec::new(),
        },
      );
    }

    Self {
      root: root_id,
      nodes,
      lines,
      pixel_refs: 0,
      state_epoch: 0,
    }
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub(crate) fn set_root(&mut self, id: NodeId) {
    self.root = id;
  }

  pub fn state_epoch(&self) -> u64 {
    self.state_epoch
  }

  pub(crate) fn bump_epoch(&mut self) {
    self.state_epoch += 1;
  }

  pub fn pixel_refs(&self) -> usize {
    self.pixel_refs
  }

  // Storage accessors {

  pub fn node(&self, id: NodeId) -> &Node {
    self.nodes.get(&id).unwrap()
  }

  pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
    self.nodes.get_mut(&id).unwrap()
  }

  pub(crate) fn insert_node(&mut self, id: NodeId, node: Node) {
    self.nodes.insert(id, node);
  }

  pub(crate) fn remove_node(&mut self, id: NodeId) -> Node {
    self.nodes.remove(&id).unwrap()
  }

  pub fn line(&self, id: LineId) -> &Line {
    self.lines.get(&id).unwrap()
  }

  pub fn contains_line(&self, id: LineId) -> bool {
    self.lines.contains_key(&id)
  }

  pub(crate) fn line_mut(&mut self, id: LineId) -> &mut Line {
    self.lines.get_mut(&id).unwrap()
  }

  pub(crate) fn insert_line(&mut self, id: LineId, line: Line) {
    self.lines.insert(id, line);
  }

  pub(crate) fn remove_line(&mut self, id: LineId) -> Line {
    self.lines.remove(&id).unwrap()
  }

  pub fn line_segs(&self, id: LineId) -> &[Segment] {
    &self.line(id).segs
  }

  // Storage accessors }

  // Navigation {

  /// First logical line of the tree.
  pub fn first_line(&self) -> LineId {
    let mut node = self.root;
    loop {
      match &self.node(node).children {
        Children::Lines(lines) => return *lines.first().unwrap(),
        Children::Nodes(nodes) => node = *nodes.first().unwrap(),
      }
    }
  }

  /// The dummy trailing line.
  pub fn last_line(&self) -> LineId {
    let mut node = self.root;
    loop {
      match &self.node(node).children {
        Children::Lines(lines) => return *lines.last().unwrap(),
        Children::Nodes(nodes) => node = *nodes.last().unwrap(),
      }
    }
  }

  /// The line after `line`, or `None` past the dummy trailing line.
  pub fn next_line(&self, line: LineId) -> Option<LineId> {
    let leaf = self.line(line).parent;
    let lines = self.node(leaf).children.lines();
    let idx = lines.iter().position(|l| *l == line).unwrap();
    if idx + 1 < lines.len() {
      return Some(lines[idx + 1]);
    }
    // Climb until a following sibling subtree exists, then descend to its
    // first line.
    let mut node = leaf;
    loop {
      let parent = self.node(node).parent?;
      let siblings = self.node(parent).children.nodes();
      let at = siblings.iter().position(|n| *n == node).unwrap();
      if at + 1 < siblings.len() {
        let mut down = siblings[at + 1];
        loop {
          match &self.node(down).children {
            Children::Lines(lines) => return Some(*lines.first().unwrap()),
            Children::Nodes(nodes) => down = *nodes.first().unwrap(),
          }
        }
      }
      node = parent;
    }
  }

  /// The line before `line`, or `None` at the first line.
  pub fn prev_line(&self, line: LineId) -> Option<LineId> {
    let leaf = self.line(line).parent;
    let lines = self.node(leaf).children.lines();
    let idx = lines.iter().position(|l| *l == line).unwrap();
    if idx > 0 {
      return Some(lines[idx - 1]);
    }
    let mut node = leaf;
    loop {
      let parent = self.node(node).parent?;
      let siblings = self.node(parent).children.nodes();
      let at = siblings.iter().position(|n| *n == node).unwrap();
      if at > 0 {
        let mut down = siblings[at - 1];
        loop {
          match &self.node(down).children {
            Children::Lines(lines) => return Some(*lines.last().unwrap()),
            Children::Nodes(nodes) => down = *nodes.last().unwrap(),
          }
        }
      }
      node = parent;
    }
  }

  /// Total line count, dummy trailing line included.
  pub fn line_count(&self) -> usize {
    self.node(self.root).num_lines
  }

  /// 0-based number of `line`, climbing to the root and summing the lines
  /// in earlier siblings at each step.
  pub fn line_no(&self, line: LineId) -> usize {
    let leaf = self.line(line).parent;
    let lines = self.node(leaf).children.lines();
    let mut no = lines.iter().position(|l| *l == line).unwrap();
    let mut node = leaf;
    while let Some(parent) = self.node(node).parent {
      for sibling in self.node(parent).children.nodes() {
        if *sibling == node {
          break;
        }
        no += self.node(*sibling).num_lines;
      }
      node = parent;
    }
    no
  }

  /// Line with 0-based number `no`, descending from the root by subtree
  /// line counts. Out-of-range numbers clamp to the dummy trailing line.
  pub fn find_line(&self, no: usize) -> LineId {
    let total = self.line_count();
    let mut remain = no.min(total - 1);
    let mut node = self.root;
    loop {
      match &self.node(node).children {
        Children::Lines(lines) => return lines[remain],
        Children::Nodes(nodes) => {
          for child in nodes {
            let n = self.node(*child).num_lines;
            if remain < n {
              node = *child;
              break;
            }
            remain -= n;
          }
        }
      }
    }
  }

  // Navigation }

  // Pixels {

  /// Cached pixel record of `line` for a viewer slot.
  pub fn line_pixel(&self, slot: usize, line: LineId) -> LinePixel {
    self.line(line).pixels[slot]
  }

  pub(crate) fn set_line_pixel_epoch(
    &mut self,
    slot: usize,
    line: LineId,
    epoch: u32,
  ) {
    self.line_mut(line).pixels[slot].epoch = epoch;
  }

  /// Total pixel height of the tree for a viewer slot.
  pub fn total_pixels(&self, slot: usize) -> usize {
    self.node(self.root).num_pixels[slot]
  }

  /// Pixel count above the top of `line` for a viewer slot.
  pub fn pixels_to(&self, slot: usize, line: LineId) -> usize {
    let leaf = self.line(line).parent;
    let mut pixels = 0;
    for sibling in self.node(leaf).children.lines() {
      if *sibling == line {
        break;
      }
      pixels += self.line(*sibling).pixels[slot].height;
    }
    let mut node = leaf;
    while let Some(parent) = self.node(node).parent {
      for sibling in self.node(parent).children.nodes() {
        if *sibling == node {
          break;
        }
        pixels += self.node(*sibling).num_pixels[slot];
      }
      node = parent;
    }
    pixels
  }

  /// Line containing vertical pixel `y` for a viewer slot, plus the pixel
  /// offset within that line. Past-the-end pixels clamp to the last line
  /// with a non-zero height (or the first line of an empty tree).
  pub fn find_pixel_line(&self, slot: usize, y: usize) -> (LineId, usize) {
    let total = self.total_pixels(slot);
    let mut remain = if total == 0 {
      0
    } else {
      y.min(total.saturating_sub(1))
    };
    let mut node = self.root;
    loop {
      match &self.node(node).children {
        Children::Lines(lines) => {
          for (i, line) in lines.iter().enumerate() {
            let h = self.line(*line).pixels[slot].height;
            if remain < h || i == lines.len() - 1 {
              return (*line, remain.min(h.saturating_sub(1)));
            }
            remain -= h;
          }
          unreachable!("leaf node with no lines");
        }
        Children::Nodes(nodes) => {
          let last = nodes.len() - 1;
          for (i, child) in nodes.iter().enumerate() {
            let n = self.node(*child).num_pixels[slot];
            if remain < n || i == last {
              node = *child;
              break;
            }
            remain -= n;
          }
        }
      }
    }
  }

  /// Write a freshly computed pixel height for `line`, walking ancestor
  /// totals. Any logical lines merged into this one (elided newlines) have
  /// their heights zeroed.
  pub fn adjust_pixel_height(
    &mut self,
    slot: usize,
    line: LineId,
    new_height: usize,
    merged_logical_lines: usize,
  ) {
    let old = self.line(line).pixels[slot].height;
    let delta = new_height as isize - old as isize;
    if delta != 0 {
      let mut node = Some(self.line(line).parent);
      while let Some(id) = node {
        let n = self.node_mut(id);
        n.num_pixels[slot] = (n.num_pixels[slot] as isize + delta) as usize;
        node = n.parent;
      }
      self.line_mut(line).pixels[slot].height = new_height;
    }

    let mut merged = merged_logical_lines;
    let mut cur = line;
    while merged > 0 {
      match self.next_line(cur) {
        Some(next) => {
          self.adjust_pixel_height(slot, next, 0, 0);
          cur = next;
        }
        None => break,
      }
      merged -= 1;
    }
  }

  /// Register a viewer pixel slot with a default per-line height. Lines
  /// outside `[start_no, end_no)` (and always the dummy trailing line) get
  /// zero height. Returns the new slot index.
  pub fn add_viewer_slot(
    &mut self,
    default_height: usize,
    start_no: Option<usize>,
    end_no: Option<usize>,
  ) -> usize {
    let slot = self.pixel_refs;
    let total = self.line_count();
    let lo = start_no.unwrap_or(0);
    let hi = end_no.unwrap_or(total - 1).min(total - 1);

    let mut no = 0;
    let mut cur = Some(self.first_line());
    while let Some(line) = cur {
      let height = if no >= lo && no < hi {
        default_height
      } else {
        0
      };
      self
        .line_mut(line)
        .pixels
        .push(LinePixel { height, epoch: 0 });
      cur = self.next_line(line);
      no += 1;
    }

    self.fill_node_pixels(self.root, slot);
    self.pixel_refs += 1;
    slot
  }

  // Recompute one slot's subtree pixel total, bottom-up.
  fn fill_node_pixels(&mut self, node: NodeId, slot: usize) -> usize {
    let children = self.node(node).children.clone();
    let sum = match children {
      Children::Lines(lines) => lines
        .iter()
        .map(|l| self.line(*l).pixels[slot].height)
        .sum(),
      Children::Nodes(nodes) => nodes
        .iter()
        .map(|n| self.fill_node_pixels(*n, slot))
        .sum(),
    };
    let n = self.node_mut(node);
    debug_assert_eq!(n.num_pixels.len(), slot);
    n.num_pixels.push(sum);
    sum
  }

  /// Release a viewer pixel slot. The freed position is back-filled with
  /// the last slot; returns the index of the displaced slot so the caller
  /// can rewrite that viewer's reference.
  pub fn remove_viewer_slot(&mut self, slot: usize) -> usize {
    for line in self.lines.values_mut() {
      line.pixels.swap_remove(slot);
    }
    for node in self.nodes.values_mut() {
      node.num_pixels.swap_remove(slot);
    }
    self.pixel_refs -= 1;
    self.pixel_refs
  }

  // Pixels }

  // Text {

  /// Extract the plain text between two byte positions, end exclusive.
  /// Only character segments contribute; marks, toggles and embedded
  /// objects are skipped.
  pub fn get_text(
    &self,
    start: crate::index::Position,
    end: crate::index::Position,
  ) -> String {
    let mut out = String::new();
    let mut line = start.line;
    let mut byte = start.byte;
    loop {
      let stop = if line == end.line {
        end.byte
      } else {
        self.line(line).byte_len()
      };
      let mut at = 0;
      for seg in &self.line(line).segs {
        if at >= stop {
          break;
        }
        if let SegBody::Chars(s) = &seg.body {
          let from = byte.saturating_sub(at).min(seg.size);
          let to = (stop - at).min(seg.size);
          if from < to {
            out.push_str(&s[from..to]);
          }
        }
        at += seg.size;
      }
      if line == end.line {
        break;
      }
      byte = 0;
      match self.next_line(line) {
        Some(next) => line = next,
        None => break,
      }
    }
    out
  }

  // Text }
}
