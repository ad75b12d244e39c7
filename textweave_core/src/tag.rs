//! Named tags: priority order, display attributes, event bindings.
//!
//! Tags themselves live in the B-tree as paired toggle segments; this
//! module owns the per-tag records (priority, global toggle count, the
//! subtree-root cache) and the name registry.

use crate::btree::NodeId;
use crate::prelude::*;

use compact_str::CompactString;
use itertools::Itertools;
use std::sync::atomic::{AtomicI32, Ordering};

pub mod apply;
pub mod attrs;
pub mod search;

#[cfg(test)]
mod tag_tests;

pub use attrs::TagAttrs;

/// Tag handle.
pub type TagId = i32;

/// Next unique tag id.
pub fn next_tag_id() -> TagId {
  static VALUE: AtomicI32 = AtomicI32::new(1);
  VALUE.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
/// One event binding attached to a tag.
pub struct TagBinding {
  pub event: CompactString,
  pub command: CompactString,
}

#[derive(Debug, Clone)]
/// Per-tag record.
pub struct Tag {
  id: TagId,
  name: CompactString,
  /// Position in the dense priority order `0..n`; higher wins.
  pub priority: usize,
  /// Total number of toggle segments for this tag in the tree. Always even
  /// once an edit completes.
  pub toggle_count: u32,
  /// Deepest node whose subtree contains every toggle of this tag. `None`
  /// iff `toggle_count == 0`.
  pub root: Option<NodeId>,
  pub attrs: TagAttrs,
  pub bindings: Vec<TagBinding>,
}

impl Tag {
  pub fn id(&self) -> TagId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

#[derive(Debug, Default)]
/// The tag registry for one store: name lookup plus the dense priority
/// order. Tags are created lazily on first reference.
pub struct TagSet {
  by_name: HashMap<CompactString, TagId>,
  tags: HashMap<TagId, Tag>,
  // Tag ids ordered by priority; `order[p].priority == p`.
  order: Vec<TagId>,
}

impl TagSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Lookup an existing tag by name.
  pub fn lookup(&self, name: &str) -> Option<TagId> {
    self.by_name.get(name).copied()
  }

  /// Lookup by name, surfacing [`TheTextError::UnknownTag`] when absent.
  pub fn require(&self, name: &str) -> TheResult<TagId> {
    self
      .lookup(name)
      .ok_or_else(|| TheTextError::UnknownTag(name.into()))
  }

  /// Lookup a tag by name, creating it at the highest priority when it
  /// doesn't exist yet.
  pub fn ensure(&mut self, name: &str) -> TagId {
    if let Some(id) = self.by_name.get(name) {
      return *id;
    }
    let id = next_tag_id();
    let tag = Tag {
      id,
      name: name.into(),
      priority: self.order.len(),
      toggle_count: 0,
      root: None,
      attrs: TagAttrs::default(),
      bindings: Vec::new(),
    };
    self.by_name.insert(name.into(), id);
    self.tags.insert(id, tag);
    self.order.push(id);
    id
  }

  pub fn get(&self, id: TagId) -> &Tag {
    self.tags.get(&id).unwrap()
  }

  pub fn get_mut(&mut self, id: TagId) -> &mut Tag {
    self.tags.get_mut(&id).unwrap()
  }

  pub fn try_get(&self, id: TagId) -> Option<&Tag> {
    self.tags.get(&id)
  }

  /// Remove a tag record. The caller is responsible for having removed its
  /// toggles from the tree first.
  pub fn remove(&mut self, id: TagId) {
    if let Some(tag) = self.tags.remove(&id) {
      self.by_name.remove(tag.name());
      let p = tag.priority;
      self.order.remove(p);
      for (i, other) in self.order.iter().enumerate().skip(p) {
        self.tags.get_mut(other).unwrap().priority = i;
      }
    }
  }

  /// Tag ids in ascending priority order.
  pub fn by_priority(&self) -> &[TagId] {
    &self.order
  }

  /// All tag names, sorted.
  pub fn names(&self) -> Vec<CompactString> {
    self.by_name.keys().cloned().sorted().collect()
  }

  /// All tag ids, unordered.
  pub fn all_ids(&self) -> Vec<TagId> {
    self.tags.keys().copied().collect()
  }

  /// Move a tag to a new priority, shifting the tags in between by one to
  /// keep the order dense.
  pub fn set_priority(&mut self, id: TagId, new_priority: usize) {
    let old = self.get(id).priority;
    let new_priority = new_priority.min(self.order.len().saturating_sub(1));
    if old == new_priority {
      return;
    }
    self.order.remove(old);
    self.order.insert(new_priority, id);
    let lo = old.min(new_priority);
    for (i, other) in self.order.iter().enumerate().skip(lo) {
      self.tags.get_mut(other).unwrap().priority = i;
    }
  }

  /// Raise a tag: just above `above`, or to the top when `above` is
  /// `None`.
  pub fn raise(&mut self, id: TagId, above: Option<TagId>) {
    let target = match above {
      Some(other) => {
        let p = self.get(other).priority;
        if self.get(id).priority <= p { p } else { p + 1 }
      }
      None => self.order.len() - 1,
    };
    self.set_priority(id, target);
  }

  /// Lower a tag: just below `below`, or to the bottom when `below` is
  /// `None`.
  pub fn lower(&mut self, id: TagId, below: Option<TagId>) {
    let target = match below {
      Some(other) => {
        let p = self.get(other).priority;
        if self.get(id).priority <= p {
          p.saturating_sub(1)
        } else {
          p
        }
      }
      None => 0,
    };
    self.set_priority(id, target);
  }
}
