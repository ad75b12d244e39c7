//! The text store facade: tree lifecycle, edits, tags, marks, embedded
//! objects, index resolution and the cooperative scheduler driving the
//! async height updater.

use crate::btree::edit::{DeleteOutcome, InsertOutcome};
use crate::btree::{Anchors, BTree, LineId};
use crate::defaults;
use crate::index::motion::{self, CountKind};
use crate::index::parse::{self, IndexHost};
use crate::index::{self, CachedPosition, Position};
use crate::layout::{self, LayoutCtx, StyleTable};
use crate::metrics::{self, InvalidateKind, MetricState};
use crate::opt::{StoreOptions, ViewOptions};
use crate::prelude::*;
use crate::sched::{Scheduler, TaskKind};
use crate::seg::{EmbImage, EmbWindow, Gravity, Segment};
use crate::tag::{TagAttrs, TagBinding, TagId, TagSet, apply};
use crate::view::View;

use compact_str::CompactString;
use std::cell::RefCell;
use std::cmp::Ordering;

#[cfg(test)]
mod store_tests;

/// Viewer handle: the pixel-slot index inside the tree. Removing a viewer
/// back-fills its slot with the last one, whose handle changes to the
/// freed value.
pub type ViewerId = usize;

/// One-shot callback run when a viewer reaches the in-sync state.
pub type AfterSyncHook = Box<dyn FnOnce() -> AnyResult<()>>;

/// Callback invoked for tag-binding triggers: `(event_spec, tag names)`.
pub type EventDispatcher = Box<dyn FnMut(&str, &[CompactString])>;

#[derive(Debug, Clone, PartialEq)]
/// Notifications collected for the embedding host.
pub enum StoreEvent {
  /// The viewer's cached layout caught up with (or fell behind) the tree.
  ViewSync { viewer: ViewerId, in_sync: bool },
  /// Fresh scroll fractions from the 200 ms reporter.
  ScrollFractions {
    viewer: ViewerId,
    x: (f64, f64),
    y: (f64, f64),
  },
}

/// Per-viewer state: options, async metric window, viewport.
pub struct Viewer {
  pub(crate) opts: ViewOptions,
  pub(crate) metrics: MetricState,
  pub(crate) view: View,
  pub(crate) start_line: Option<LineId>,
  pub(crate) end_line: Option<LineId>,
  pub(crate) after_sync: Vec<AfterSyncHook>,
}

/// A persistent in-memory text store with tag-range tracking, cached
/// per-viewer pixel heights and display-line layout.
pub struct TextStore {
  pub(crate) opts: StoreOptions,
  pub(crate) tree: BTree,
  pub(crate) tags: TagSet,
  pub(crate) anchors: Anchors,
  pub(crate) styles: RefCell<StyleTable>,
  pub(crate) viewers: Vec<Viewer>,
  pub(crate) sched: Scheduler,
  pub(crate) events: Vec<StoreEvent>,
  pub(crate) bg_errors: Vec<TheTextError>,
  pub(crate) dispatcher: Option<EventDispatcher>,
  pub(crate) destroyed: bool,
}

impl Default for TextStore {
  fn default() -> Self {
    Self::new(StoreOptions::default())
  }
}

impl TextStore {
  // Lifecycle {

  pub fn new(opts: StoreOptions) -> Self {
    let mut store = Self {
      opts,
      tree: BTree::new(),
      tags: TagSet::new(),
      anchors: Anchors::new(),
      styles: RefCell::new(StyleTable::new()),
      viewers: Vec::new(),
      sched: Scheduler::new(),
      events: Vec::new(),
      bg_errors: Vec::new(),
      dispatcher: None,
      destroyed: false,
    };
    // The selection tag exists from birth on every store.
    store.tags.ensure("sel");
    store
  }

  /// Register a viewer observing the whole text.
  pub fn add_viewer(&mut self, opts: ViewOptions) -> ViewerId {
    self.add_viewer_restricted(opts, None, None)
  }

  /// Register a viewer restricted to lines `[start_no, end_no)`.
  pub fn add_viewer_restricted(
    &mut self,
    opts: ViewOptions,
    start_no: Option<usize>,
    end_no: Option<usize>,
  ) -> ViewerId {
    let slot = self.tree.add_viewer_slot(
      opts.default_line_height(),
      start_no,
      end_no,
    );
    let start_line = start_no.map(|n| self.tree.find_line(n));
    let end_line = end_no.map(|n| self.tree.find_line(n));
    let top = Position::start_of(
      start_line.unwrap_or_else(|| self.tree.first_line()),
    );
    self.viewers.push(Viewer {
      opts,
      metrics: MetricState::default(),
      view: View::new(top),
      start_line,
      end_line,
      after_sync: Vec::new(),
    });
    debug_assert_eq!(slot, self.viewers.len() - 1);
    self.invalidate_metrics(slot, None, 0, InvalidateKind::Simple);
    slot
  }

  /// Drop a viewer. Removing the last one destroys the store.
  pub fn remove_viewer(&mut self, viewer: ViewerId) {
    if viewer >= self.viewers.len() {
      return;
    }
    self.sched.cancel_viewer(viewer);
    let displaced = self.tree.remove_viewer_slot(viewer);
    self.viewers.swap_remove(viewer);
    if displaced != viewer {
      self.sched.retarget_viewer(displaced, viewer);
    }
    if self.viewers.is_empty() {
      self.destroy();
    }
  }

  /// Tear the store down: every pending task and after-sync hook is
  /// cancelled and discarded.
  pub fn destroy(&mut self) {
    self.destroyed = true;
    for v in self.viewers.iter_mut() {
      v.after_sync.clear();
    }
    while self.sched.pop_ready().is_some() {}
    for viewer in 0..self.viewers.len() {
      self.sched.cancel_viewer(viewer);
    }
  }

  pub fn destroyed(&self) -> bool {
    self.destroyed
  }

  pub fn options(&self) -> &StoreOptions {
    &self.opts
  }

  pub fn viewer_options(&self, viewer: ViewerId) -> &ViewOptions {
    &self.viewers[viewer].opts
  }

  pub fn set_viewer_size(
    &mut self,
    viewer: ViewerId,
    width: usize,
    height: usize,
  ) {
    let v = &mut self.viewers[viewer];
    v.opts.set_width(width);
    v.opts.set_height(height);
    self.invalidate_metrics(viewer, None, 0, InvalidateKind::Simple);
  }

  /// Current structural state epoch; bumped by every edit.
  pub fn state_epoch(&self) -> u64 {
    self.tree.state_epoch()
  }

  /// Total line count, dummy trailing line included.
  pub fn line_count(&self) -> usize {
    self.tree.line_count()
  }

  /// Total cached pixel height for a viewer.
  pub fn total_pixels(&self, viewer: ViewerId) -> usize {
    self.tree.total_pixels(viewer)
  }

  pub fn set_event_dispatcher(&mut self, dispatcher: EventDispatcher) {
    self.dispatcher = Some(dispatcher);
  }

  // Lifecycle }

  // Edits {

  // Positions handed to edits are clamped into the editable range: never
  // on the dummy trailing line, never past a line's newline, always on a
  // code-point boundary.
  fn clamp_to_content(&self, pos: Position) -> Position {
    let last = self.tree.last_line();
    let pos = if pos.line == last {
      let prev = self.tree.prev_line(last).unwrap();
      Position::new(prev, self.tree.line(prev).byte_len() - 1)
    } else {
      let len = self.tree.line(pos.line).byte_len();
      Position::new(pos.line, pos.byte.min(len - 1))
    };
    index::round_to_boundary(&self.tree, pos)
  }

  /// Insert `text` at a resolved position.
  pub fn insert_at(&mut self, pos: Position, text: &str) {
    if text.is_empty() {
      return;
    }
    let pos = self.clamp_to_content(pos);
    let InsertOutcome {
      from_line_no,
      added_lines,
    } = self
      .tree
      .insert(&mut self.tags, &mut self.anchors, pos, text);
    for viewer in 0..self.viewers.len() {
      self.invalidate_metrics(
        viewer,
        Some(from_line_no),
        added_lines,
        InvalidateKind::Insert,
      );
    }
    self.schedule_scroll_reports();
  }

  /// Insert at a symbolic index, resolved against viewer 0.
  pub fn insert(&mut self, index: &str, text: &str) -> TheResult<()> {
    let pos = self.parse_index(0, index)?;
    self.insert_at(pos, text);
    Ok(())
  }

  /// Delete the range between two resolved positions (order-normalised,
  /// clamped so the final newline survives).
  pub fn delete_range(&mut self, i1: Position, i2: Position) {
    let mut p1 = self.clamp_to_content(i1);
    let mut p2 = self.clamp_to_content(i2);
    if index::compare(&self.tree, p1, p2) == Ordering::Greater {
      std::mem::swap(&mut p1, &mut p2);
    }
    if p1 == p2 {
      return;
    }

    // Viewer range anchors living on doomed lines move to the survivor.
    let no1 = self.tree.line_no(p1.line);
    let no2 = self.tree.line_no(p2.line);
    if no2 > no1 {
      for v in self.viewers.iter_mut() {
        for anchor in [&mut v.start_line, &mut v.end_line] {
          if let Some(line) = *anchor {
            let no = self.tree.line_no(line);
            if no > no1 && no <= no2 {
              *anchor = Some(p1.line);
            }
          }
        }
        if v.view.top.line != p1.line {
          let no = self.tree.line_no(v.view.top.line);
          if no > no1 && no <= no2 {
            v.view.top = Position::start_of(p1.line);
          }
        }
      }
    }

    let DeleteOutcome {
      from_line_no,
      removed_lines,
    } = self
      .tree
      .delete(&mut self.tags, &mut self.anchors, p1, p2);
    for v in self.viewers.iter_mut() {
      if v.view.top.line == p1.line {
        v.view.top.byte =
          v.view.top.byte.min(self.tree.line(p1.line).byte_len() - 1);
      }
    }
    for viewer in 0..self.viewers.len() {
      self.invalidate_metrics(
        viewer,
        Some(from_line_no),
        removed_lines,
        InvalidateKind::Delete,
      );
    }
    self.schedule_scroll_reports();
  }

  /// Delete between two symbolic indices.
  pub fn delete(&mut self, index1: &str, index2: &str) -> TheResult<()> {
    let p1 = self.parse_index(0, index1)?;
    let p2 = self.parse_index(0, index2)?;
    self.delete_range(p1, p2);
    Ok(())
  }

  /// The text between two positions, tags and embedded objects elided.
  pub fn get_string_at(&self, i1: Position, i2: Position) -> String {
    let mut p1 = i1;
    let mut p2 = i2;
    if index::compare(&self.tree, p1, p2) == Ordering::Greater {
      std::mem::swap(&mut p1, &mut p2);
    }
    self.tree.get_text(p1, p2)
  }

  pub fn get_string(
    &self,
    index1: &str,
    index2: &str,
  ) -> TheResult<String> {
    let p1 = self.parse_index(0, index1)?;
    let p2 = self.parse_index(0, index2)?;
    Ok(self.get_string_at(p1, p2))
  }

  // Edits }

  // Tags {

  pub fn tag_create(&mut self, name: &str) -> TagId {
    self.tags.ensure(name)
  }

  pub fn tag_configure(&mut self, name: &str, attrs: TagAttrs) {
    let id = self.tags.ensure(name);
    let geometry = {
      let tag = self.tags.get_mut(id);
      let geometry =
        attrs.affects_geometry() || tag.attrs.affects_geometry();
      tag.attrs = attrs;
      geometry
    };
    if geometry {
      self.invalidate_all_viewers();
    }
  }

  pub fn tag_attrs(&self, name: &str) -> TheResult<&TagAttrs> {
    let id = self.tags.require(name)?;
    Ok(&self.tags.get(id).attrs)
  }

  fn tag_apply(&mut self, name: &str, i1: &str, i2: &str, add: bool) -> TheResult<()> {
    let p1 = self.parse_index(0, i1)?;
    let p2 = self.parse_index(0, i2)?;
    self.tag_apply_at(name, p1, p2, add);
    Ok(())
  }

  /// Apply or clear a tag over `[i1, i2)` at resolved positions.
  pub fn tag_apply_at(
    &mut self,
    name: &str,
    i1: Position,
    i2: Position,
    add: bool,
  ) {
    let id = self.tags.ensure(name);
    let mut p1 = i1;
    let mut p2 = i2;
    if index::compare(&self.tree, p1, p2) == Ordering::Greater {
      std::mem::swap(&mut p1, &mut p2);
    }
    if p1 == p2 {
      return;
    }
    let changed = apply::apply(&mut self.tree, &mut self.tags, id, p1, p2, add);
    if changed && self.tags.get(id).attrs.affects_geometry() {
      let from = self.tree.line_no(p1.line);
      let to = self.tree.line_no(p2.line);
      for viewer in 0..self.viewers.len() {
        self.invalidate_metrics(
          viewer,
          Some(from),
          to - from,
          InvalidateKind::Simple,
        );
      }
    }
  }

  pub fn tag_add(&mut self, name: &str, i1: &str, i2: &str) -> TheResult<()> {
    self.tag_apply(name, i1, i2, true)
  }

  pub fn tag_remove(
    &mut self,
    name: &str,
    i1: &str,
    i2: &str,
  ) -> TheResult<()> {
    self.tag_apply(name, i1, i2, false)
  }

  /// Delete a tag outright: all of its toggles leave the tree.
  pub fn tag_delete(&mut self, name: &str) -> TheResult<()> {
    let id = self.tags.require(name)?;
    let first = Position::start_of(self.tree.first_line());
    let end = Position::start_of(self.tree.last_line());
    let geometry = self.tags.get(id).attrs.affects_geometry();
    apply::apply(&mut self.tree, &mut self.tags, id, first, end, false);
    self.tags.remove(id);
    if geometry {
      self.invalidate_all_viewers();
    }
    Ok(())
  }

  /// Names of the tags active at an index, lowest priority first.
  pub fn tags_at(&self, index: &str) -> TheResult<Vec<CompactString>> {
    let pos = self.parse_index(0, index)?;
    Ok(
      self
        .tree
        .tags_at(&self.tags, pos)
        .into_iter()
        .map(|id| CompactString::from(self.tags.get(id).name()))
        .collect(),
    )
  }

  // All ranges of `tag` as resolved positions.
  fn ranges_of(&self, id: TagId) -> Vec<(Position, Position)> {
    let first = Position::start_of(self.tree.first_line());
    let end = Position::start_of(self.tree.last_line());
    let mut out = Vec::new();
    let mut state = self.tree.char_tagged(first, id);
    let mut open = state.then_some(first);
    let mut walker = crate::tag::search::TagWalker::new(
      &self.tree,
      &self.tags,
      first,
      end,
      Some(id),
    );
    while let Some(hit) = walker.next() {
      state = !state;
      if state {
        open = Some(hit.pos);
      } else if let Some(s) = open.take() {
        out.push((s, hit.pos));
      }
    }
    if let Some(s) = open {
      out.push((s, end));
    }
    out
  }

  /// All `(start, end)` ranges of a tag, in index-string form.
  pub fn tag_ranges(
    &self,
    name: &str,
  ) -> TheResult<Vec<(String, String)>> {
    let id = self.tags.require(name)?;
    Ok(
      self
        .ranges_of(id)
        .into_iter()
        .map(|(s, e)| {
          (index::format(&self.tree, s), index::format(&self.tree, e))
        })
        .collect(),
    )
  }

  /// First range of the tag starting at or after `from` and before `to`.
  pub fn tag_nextrange(
    &self,
    name: &str,
    from: &str,
    to: Option<&str>,
  ) -> TheResult<Option<(String, String)>> {
    let id = self.tags.require(name)?;
    let from = self.parse_index(0, from)?;
    let to = match to {
      Some(s) => self.parse_index(0, s)?,
      None => Position::start_of(self.tree.last_line()),
    };
    for (s, e) in self.ranges_of(id) {
      if index::compare(&self.tree, s, from) != Ordering::Less
        && index::compare(&self.tree, s, to) == Ordering::Less
      {
        return Ok(Some((
          index::format(&self.tree, s),
          index::format(&self.tree, e),
        )));
      }
    }
    Ok(None)
  }

  /// Latest range of the tag starting strictly before `from` (and at or
  /// after `to` when given).
  pub fn tag_prevrange(
    &self,
    name: &str,
    from: &str,
    to: Option<&str>,
  ) -> TheResult<Option<(String, String)>> {
    let id = self.tags.require(name)?;
    let from = self.parse_index(0, from)?;
    let to = match to {
      Some(s) => Some(self.parse_index(0, s)?),
      None => None,
    };
    let mut best = None;
    for (s, e) in self.ranges_of(id) {
      if index::compare(&self.tree, s, from) == Ordering::Less
        && to.is_none_or(|t| {
          index::compare(&self.tree, s, t) != Ordering::Less
        })
      {
        best = Some((s, e));
      }
    }
    Ok(best.map(|(s, e)| {
      (index::format(&self.tree, s), index::format(&self.tree, e))
    }))
  }

  pub fn tag_raise(
    &mut self,
    name: &str,
    above: Option<&str>,
  ) -> TheResult<()> {
    let id = self.tags.require(name)?;
    let above = match above {
      Some(n) => Some(self.tags.require(n)?),
      None => None,
    };
    self.tags.raise(id, above);
    if self.tags.get(id).attrs.affects_geometry() {
      self.invalidate_all_viewers();
    }
    Ok(())
  }

  pub fn tag_lower(
    &mut self,
    name: &str,
    below: Option<&str>,
  ) -> TheResult<()> {
    let id = self.tags.require(name)?;
    let below = match below {
      Some(n) => Some(self.tags.require(n)?),
      None => None,
    };
    self.tags.lower(id, below);
    if self.tags.get(id).attrs.affects_geometry() {
      self.invalidate_all_viewers();
    }
    Ok(())
  }

  /// Attach an event binding to a tag.
  pub fn tag_bind(&mut self, name: &str, event: &str, command: &str) {
    let id = self.tags.ensure(name);
    let tag = self.tags.get_mut(id);
    if let Some(b) = tag.bindings.iter_mut().find(|b| b.event == event) {
      b.command = command.into();
      return;
    }
    tag.bindings.push(TagBinding {
      event: event.into(),
      command: command.into(),
    });
  }

  pub fn tag_bindings(&self, name: &str) -> TheResult<Vec<TagBinding>> {
    let id = self.tags.require(name)?;
    Ok(self.tags.get(id).bindings.clone())
  }

  /// Fire tag bindings for an event at a viewport pixel: the dispatcher
  /// receives the event and the names of bound tags under the pixel.
  pub fn dispatch_pixel_event(
    &mut self,
    viewer: ViewerId,
    x: i64,
    y: i64,
    event: &str,
  ) {
    if self.destroyed {
      return;
    }
    let (pos, _) = self.pixel_to_index(viewer, x, y);
    let hit: Vec<CompactString> = self
      .tree
      .tags_at(&self.tags, pos)
      .into_iter()
      .filter(|id| {
        self
          .tags
          .get(*id)
          .bindings
          .iter()
          .any(|b| b.event == event)
      })
      .map(|id| CompactString::from(self.tags.get(id).name()))
      .collect();
    if hit.is_empty() {
      return;
    }
    if let Some(dispatcher) = self.dispatcher.as_mut() {
      dispatcher(event, &hit);
    }
  }

  // Tags }

  // Marks {

  /// Place (or move) a named mark.
  pub fn mark_set(
    &mut self,
    name: &str,
    index: &str,
    gravity: Gravity,
  ) -> TheResult<()> {
    let pos = self.parse_index(0, index)?;
    self.mark_unset(name);
    let ins = self.tree.split_at(pos);
    self
      .tree
      .line_mut(pos.line)
      .segs
      .insert(ins, Segment::mark(name, gravity));
    self.anchors.set_mark_line(name, pos.line);
    Ok(())
  }

  /// Remove a mark; unknown names are ignored.
  pub fn mark_unset(&mut self, name: &str) {
    let Some(line) = self.anchors.remove_mark(name) else {
      return;
    };
    let segs = &mut self.tree.line_mut(line).segs;
    if let Some(at) = segs
      .iter()
      .position(|s| s.as_mark().is_some_and(|m| m.name == name))
    {
      segs.remove(at);
    }
  }

  /// Position of a mark.
  pub fn mark_pos(&self, name: &str) -> Option<Position> {
    let line = self.anchors.mark_line(name)?;
    let mut byte = 0;
    for seg in self.tree.line_segs(line) {
      if seg.as_mark().is_some_and(|m| m.name == name) {
        return Some(Position::new(line, byte));
      }
      byte += seg.size;
    }
    None
  }

  pub fn mark_gravity(&self, name: &str) -> Option<Gravity> {
    let line = self.anchors.mark_line(name)?;
    self
      .tree
      .line_segs(line)
      .iter()
      .find_map(|s| s.as_mark().filter(|m| m.name == name))
      .map(|m| m.gravity)
  }

  pub fn mark_names(&self) -> Vec<CompactString> {
    self.anchors.mark_names()
  }

  /// Name of the first mark at or after `index`.
  pub fn mark_next(&self, index: &str) -> TheResult<Option<CompactString>> {
    let pos = self.parse_index(0, index)?;
    let mut line = Some(pos.line);
    let mut from = pos.byte;
    while let Some(l) = line {
      let mut byte = 0;
      for seg in self.tree.line_segs(l) {
        if byte >= from {
          if let Some(m) = seg.as_mark() {
            return Ok(Some(m.name.clone()));
          }
        }
        byte += seg.size;
      }
      line = self.tree.next_line(l);
      from = 0;
    }
    Ok(None)
  }

  /// Name of the last mark strictly before `index`.
  pub fn mark_prev(&self, index: &str) -> TheResult<Option<CompactString>> {
    let pos = self.parse_index(0, index)?;
    let mut line = Some(pos.line);
    let mut bound = pos.byte;
    while let Some(l) = line {
      let mut byte = 0;
      let mut found = None;
      for seg in self.tree.line_segs(l) {
        if byte < bound {
          if let Some(m) = seg.as_mark() {
            found = Some(m.name.clone());
          }
        }
        byte += seg.size;
      }
      if found.is_some() {
        return Ok(found);
      }
      line = self.tree.prev_line(l);
      bound = usize::MAX;
    }
    Ok(None)
  }

  // Marks }

  // Embedded objects {

  /// Embed a named window placeholder at an index.
  pub fn window_create(
    &mut self,
    index: &str,
    name: &str,
    width: usize,
    height: usize,
  ) -> TheResult<()> {
    let pos = self.parse_index(0, index)?;
    let seg = Segment::window(EmbWindow {
      name: name.into(),
      width,
      height,
    });
    self.embed_at(pos, name, seg);
    Ok(())
  }

  /// Embed a named image placeholder at an index.
  pub fn image_create(
    &mut self,
    index: &str,
    name: &str,
    width: usize,
    height: usize,
  ) -> TheResult<()> {
    let pos = self.parse_index(0, index)?;
    let seg = Segment::image(EmbImage {
      name: name.into(),
      width,
      height,
    });
    self.embed_at(pos, name, seg);
    Ok(())
  }

  fn embed_at(&mut self, pos: Position, name: &str, seg: Segment) {
    let pos = self.clamp_to_content(pos);
    let ins = self.tree.split_at(pos);
    self.tree.line_mut(pos.line).segs.insert(ins, seg);
    self.anchors.set_embed_line(name, pos.line);
    self.tree.bump_epoch();
    let no = self.tree.line_no(pos.line);
    for viewer in 0..self.viewers.len() {
      self.invalidate_metrics(viewer, Some(no), 0, InvalidateKind::Simple);
    }
  }

  /// Position of an embedded object.
  pub fn embed_pos(&self, name: &str) -> Option<Position> {
    let line = self.anchors.embed_line(name)?;
    let mut byte = 0;
    for seg in self.tree.line_segs(line) {
      if seg.embed_name() == Some(name) {
        return Some(Position::new(line, byte));
      }
      byte += seg.size;
    }
    None
  }

  // Embedded objects }

  // Indices {

  /// Resolve a symbolic index against a viewer's display state.
  pub fn parse_index(
    &self,
    viewer: ViewerId,
    s: &str,
  ) -> TheResult<Position> {
    parse::parse(&ViewerHost {
      store: self,
      viewer,
    },
    s)
    .map(|(pos, _)| pos)
  }

  /// Resolve an index and report whether it is cacheable; cacheable
  /// results carry the epoch they were resolved at.
  pub fn parse_index_cached(
    &self,
    viewer: ViewerId,
    s: &str,
  ) -> TheResult<(Position, Option<CachedPosition>)> {
    let (pos, cacheable) = parse::parse(
      &ViewerHost {
        store: self,
        viewer,
      },
      s,
    )?;
    let cached = cacheable.then(|| CachedPosition {
      pos,
      epoch: self.tree.state_epoch(),
      source: s.into(),
    });
    Ok((pos, cached))
  }

  /// Re-resolve a cached position if the tree moved underneath it.
  pub fn refresh_cached(
    &self,
    viewer: ViewerId,
    cached: &mut CachedPosition,
  ) -> TheResult<Position> {
    if !cached.is_fresh(&self.tree) {
      let (pos, _) = parse::parse(
        &ViewerHost {
          store: self,
          viewer,
        },
        &cached.source,
      )?;
      cached.pos = pos;
      cached.epoch = self.tree.state_epoch();
    }
    Ok(cached.pos)
  }

  /// Bit-exact `"L.C"` form of a position.
  pub fn format_index(&self, pos: Position) -> String {
    index::format(&self.tree, pos)
  }

  pub fn compare(&self, a: Position, b: Position) -> Ordering {
    index::compare(&self.tree, a, b)
  }

  fn elide_pred(&self) -> impl Fn(Position) -> bool + '_ {
    |p| layout::is_elided(&self.tree, &self.tags, p)
  }

  pub fn forward_chars(
    &self,
    pos: Position,
    n: usize,
    kind: CountKind,
  ) -> Position {
    motion::forward_chars(&self.tree, pos, n, kind, &self.elide_pred())
  }

  pub fn backward_chars(
    &self,
    pos: Position,
    n: usize,
    kind: CountKind,
  ) -> Position {
    motion::backward_chars(&self.tree, pos, n, kind, &self.elide_pred())
  }

  pub fn forward_bytes(&self, pos: Position, n: usize) -> Position {
    motion::forward_bytes(&self.tree, pos, n)
  }

  pub fn backward_bytes(&self, pos: Position, n: usize) -> Position {
    motion::backward_bytes(&self.tree, pos, n)
  }

  /// Count motion units in `[i1, i2)`.
  pub fn count_chars(
    &self,
    i1: Position,
    i2: Position,
    kind: CountKind,
  ) -> usize {
    motion::count(&self.tree, i1, i2, kind, &self.elide_pred())
  }

  pub fn count_bytes(&self, i1: Position, i2: Position) -> usize {
    motion::count_bytes(&self.tree, i1, i2)
  }

  /// Whether the character at `index` is hidden by elision.
  pub fn is_elided(&self, index: &str) -> TheResult<bool> {
    let pos = self.parse_index(0, index)?;
    Ok(layout::is_elided(&self.tree, &self.tags, pos))
  }

  // Indices }

  // Scheduler {

  /// Move virtual time forward and run everything that becomes ready.
  pub fn advance(&mut self, ms: u64) {
    self.sched.advance(ms);
    self.run_ready();
  }

  /// Run all currently-ready tasks.
  pub fn run_ready(&mut self) {
    while let Some(task) = self.sched.pop_ready() {
      self.run_task(task);
    }
  }

  /// Drive virtual time until no tasks remain.
  pub fn run_until_quiescent(&mut self) {
    let mut guard = 0usize;
    loop {
      self.run_ready();
      match self.sched.next_due() {
        Some(due) => {
          let now = self.sched.now();
          self.sched.advance(due.saturating_sub(now).max(1));
        }
        None => break,
      }
      guard += 1;
      assert!(guard < 1_000_000, "scheduler failed to quiesce");
    }
  }

  fn run_task(&mut self, task: TaskKind) {
    if self.destroyed {
      return;
    }
    match task {
      TaskKind::MetricTick { viewer } => self.metric_tick(viewer),
      TaskKind::ScrollReport { viewer } => self.scroll_report(viewer),
    }
  }

  /// Drain collected notifications.
  pub fn take_events(&mut self) -> Vec<StoreEvent> {
    std::mem::take(&mut self.events)
  }

  /// Drain background errors from after-sync hooks.
  pub fn take_background_errors(&mut self) -> Vec<TheTextError> {
    std::mem::take(&mut self.bg_errors)
  }

  /// Whether a viewer's cached heights have caught up with the tree.
  pub fn in_sync(&self, viewer: ViewerId) -> bool {
    self.viewers[viewer].metrics.in_sync
  }

  /// Run `hook` once the viewer next reaches the in-sync state (or now,
  /// when it already is in sync).
  pub fn after_sync(&mut self, viewer: ViewerId, hook: AfterSyncHook) {
    if self.destroyed {
      return;
    }
    if self.viewers[viewer].metrics.in_sync {
      if let Err(e) = hook() {
        self
          .bg_errors
          .push(TheTextError::AfterSyncFailed(format!("{e:#}").into()));
      }
      return;
    }
    self.viewers[viewer].after_sync.push(hook);
  }

  pub(crate) fn invalidate_metrics(
    &mut self,
    viewer: ViewerId,
    line_no: Option<usize>,
    count: usize,
    kind: InvalidateKind,
  ) {
    let v = &mut self.viewers[viewer];
    metrics::invalidate(
      &mut self.tree,
      viewer,
      &mut v.metrics,
      line_no,
      count,
      kind,
    );
    if !v.metrics.timer_armed {
      v.metrics.timer_armed = true;
      self.sched.schedule_timed(
        defaults::metrics::TICK_MS,
        TaskKind::MetricTick { viewer },
      );
    }
    if v.metrics.in_sync {
      v.metrics.in_sync = false;
      self.events.push(StoreEvent::ViewSync {
        viewer,
        in_sync: false,
      });
    }
  }

  fn invalidate_all_viewers(&mut self) {
    for viewer in 0..self.viewers.len() {
      self.invalidate_metrics(viewer, None, 0, InvalidateKind::Simple);
    }
  }

  fn metric_tick(&mut self, viewer: ViewerId) {
    let v = &mut self.viewers[viewer];
    let width = v.opts.width();
    let range = match (v.start_line, v.end_line) {
      (None, None) => None,
      (start, end) => {
        let lo = start.map(|l| self.tree.line_no(l)).unwrap_or(0);
        let hi = end
          .map(|l| self.tree.line_no(l))
          .unwrap_or(self.tree.line_count() - 1);
        Some((lo, hi))
      }
    };
    let finished = metrics::update_line_metrics(
      &mut self.tree,
      &self.tags,
      &self.opts,
      &mut self.styles.borrow_mut(),
      width,
      viewer,
      &mut v.metrics,
      range,
      Some(defaults::metrics::TICK_QUANTUM),
    );

    if finished && self.viewers[viewer].metrics.partial.is_none() {
      self.viewers[viewer].metrics.timer_armed = false;
      let hooks = std::mem::take(&mut self.viewers[viewer].after_sync);
      for hook in hooks {
        if self.destroyed {
          break;
        }
        if let Err(e) = hook() {
          self
            .bg_errors
            .push(TheTextError::AfterSyncFailed(format!("{e:#}").into()));
        }
      }
      if !self.viewers[viewer].metrics.in_sync {
        self.viewers[viewer].metrics.in_sync = true;
        self.events.push(StoreEvent::ViewSync {
          viewer,
          in_sync: true,
        });
      }
    } else {
      self.sched.schedule_timed(
        defaults::metrics::TICK_MS,
        TaskKind::MetricTick { viewer },
      );
    }
  }

  pub(crate) fn schedule_scroll_reports(&mut self) {
    for viewer in 0..self.viewers.len() {
      let v = &mut self.viewers[viewer];
      if !v.view.report_pending {
        v.view.report_pending = true;
        self.sched.schedule_timed(
          defaults::metrics::SCROLL_REPORT_MS,
          TaskKind::ScrollReport { viewer },
        );
      }
    }
  }

  fn scroll_report(&mut self, viewer: ViewerId) {
    self.viewers[viewer].view.report_pending = false;
    let x = self.xview_fractions(viewer);
    let y = self.yview_fractions(viewer);
    let v = &mut self.viewers[viewer];
    if v.view.last_x != Some(x) || v.view.last_y != Some(y) {
      v.view.last_x = Some(x);
      v.view.last_y = Some(y);
      self.events.push(StoreEvent::ScrollFractions { viewer, x, y });
    }
  }

  // Scheduler }

  pub(crate) fn layout_ctx(&self, viewer: ViewerId) -> LayoutCtx<'_> {
    LayoutCtx {
      tree: &self.tree,
      tags: &self.tags,
      opts: &self.opts,
      width: self.viewers[viewer].opts.width(),
    }
  }

  /// Full-tree consistency check (tests and debugging).
  pub fn check(&self) {
    self.tree.check(&self.tags);
  }
}

// Index-parser host bound to one viewer.
struct ViewerHost<'a> {
  store: &'a TextStore,
  viewer: ViewerId,
}

impl IndexHost for ViewerHost<'_> {
  fn tree(&self) -> &BTree {
    &self.store.tree
  }

  fn lookup_mark(&self, name: &str) -> Option<Position> {
    self.store.mark_pos(name)
  }

  fn lookup_embed(&self, name: &str) -> Option<Position> {
    self.store.embed_pos(name)
  }

  fn lookup_tag(&self, name: &str) -> Option<TagId> {
    self.store.tags.lookup(name)
  }

  fn tag_first(&self, tag: TagId) -> Option<Position> {
    let first = Position::start_of(self.store.tree.first_line());
    if self.store.tree.char_tagged(first, tag) {
      return Some(first);
    }
    self.store.tree.find_tag_start(&self.store.tags, tag)
  }

  fn tag_last(&self, tag: TagId) -> Option<Position> {
    self.store.tree.find_tag_end(&self.store.tags, tag)
  }

  fn pixel_index(&self, x: i64, y: i64) -> Position {
    self.store.pixel_to_index(self.viewer, x, y).0
  }

  fn is_elided(&self, pos: Position) -> bool {
    layout::is_elided(&self.store.tree, &self.store.tags, pos)
  }

  fn display_line_bound(&self, pos: Position, end: bool) -> Position {
    let ctx = self.store.layout_ctx(self.viewer);
    layout::display_line_bound(
      &ctx,
      &mut self.store.styles.borrow_mut(),
      pos,
      end,
    )
  }

  fn move_display_lines(&self, pos: Position, n: i64) -> Position {
    let ctx = self.store.layout_ctx(self.viewer);
    layout::move_display_lines(
      &ctx,
      &mut self.store.styles.borrow_mut(),
      pos,
      n,
    )
  }
}
