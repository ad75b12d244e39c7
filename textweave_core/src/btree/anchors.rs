//! Name books for marks and embedded objects.
//!
//! Segments move between lines during edits; the books map each mark or
//! embedded-object name to the line currently holding its segment, and the
//! edit paths re-book every line whose segment list was restructured.

use crate::btree::LineId;
use crate::prelude::*;
use crate::seg::{SegBody, Segment};

use compact_str::CompactString;

#[derive(Debug, Default)]
pub struct Anchors {
  marks: HashMap<CompactString, LineId>,
  embeds: HashMap<CompactString, LineId>,
}

impl Anchors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn mark_line(&self, name: &str) -> Option<LineId> {
    self.marks.get(name).copied()
  }

  pub fn embed_line(&self, name: &str) -> Option<LineId> {
    self.embeds.get(name).copied()
  }

  pub fn set_mark_line(&mut self, name: &str, line: LineId) {
    self.marks.insert(name.into(), line);
  }

  pub fn set_embed_line(&mut self, name: &str, line: LineId) {
    self.embeds.insert(name.into(), line);
  }

  pub fn remove_mark(&mut self, name: &str) -> Option<LineId> {
    self.marks.remove(name)
  }

  pub fn remove_embed(&mut self, name: &str) -> Option<LineId> {
    self.embeds.remove(name)
  }

  pub fn mark_names(&self) -> Vec<CompactString> {
    self.marks.keys().cloned().collect()
  }

  /// Re-book every named segment found in `segs` as living on `line`.
  pub fn rebook(&mut self, line: LineId, segs: &[Segment]) {
    for seg in segs {
      match &seg.body {
        SegBody::Mark(m) => {
          self.marks.insert(m.name.clone(), line);
        }
        SegBody::Window(w) => {
          self.embeds.insert(w.name.clone(), line);
        }
        SegBody::Image(im) => {
          self.embeds.insert(im.name.clone(), line);
        }
        _ => {}
      }
    }
  }
}
