//! Typed segments, the unit of B-tree leaf data.
//!
//! A logical line is an ordered list of segments: character runs, zero-size
//! tag toggles and marks, and embedded objects of index-size one. Each kind
//! selects a behaviour set (split/cleanup/delete/line-change/layout/check);
//! the structural parts that must walk ancestor nodes live in
//! [`crate::btree`], keyed off the kind accessors here.

use crate::tag::TagId;

use compact_str::CompactString;

#[cfg(test)]
mod seg_tests;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The side a zero-size segment adheres to when an insertion happens at its
/// position: a left-gravity segment stays before the new text, a
/// right-gravity segment ends up after it.
pub enum Gravity {
  Left,
  Right,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Toggle payload: entry to or exit from a tagged range.
pub struct Toggle {
  pub tag: TagId,
  /// Whether this toggle is currently counted in ancestor node summaries.
  /// Cleared while a toggle is in flight during deletes and re-set by
  /// cleanup.
  pub in_node_counts: bool,
}

impl Toggle {
  pub fn new(tag: TagId) -> Self {
    Self {
      tag,
      in_node_counts: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Mark payload. The mark's position survives range deletion: its segment
/// refuses to die and relocates to the surviving endpoint.
pub struct MarkData {
  pub name: CompactString,
  pub gravity: Gravity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Embedded window payload: a named placeholder with fixed extents.
pub struct EmbWindow {
  pub name: CompactString,
  pub width: usize,
  pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Embedded image payload: a named placeholder with fixed extents.
pub struct EmbImage {
  pub name: CompactString,
  pub width: usize,
  pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegBody {
  /// A run of UTF-8 text. The last segment of every logical line is a
  /// `Chars` ending in `'\n'`.
  Chars(CompactString),
  ToggleOn(Toggle),
  ToggleOff(Toggle),
  Mark(MarkData),
  Window(EmbWindow),
  Image(EmbImage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One typed segment on a logical line.
pub struct Segment {
  /// Byte size: length of the text for `Chars`, 1 for embedded objects,
  /// 0 for toggles and marks.
  pub size: usize,
  pub body: SegBody,
}

impl Segment {
  pub fn chars(s: &str) -> Self {
    Self {
      size: s.len(),
      body: SegBody::Chars(CompactString::from(s)),
    }
  }

  pub fn toggle_on(tag: TagId) -> Self {
    Self {
      size: 0,
      body: SegBody::ToggleOn(Toggle::new(tag)),
    }
  }

  pub fn toggle_off(tag: TagId) -> Self {
    Self {
      size: 0,
      body: SegBody::ToggleOff(Toggle::new(tag)),
    }
  }

  pub fn mark(name: &str, gravity: Gravity) -> Self {
    Self {
      size: 0,
      body: SegBody::Mark(MarkData {
        name: name.into(),
        gravity,
      }),
    }
  }

  pub fn window(w: EmbWindow) -> Self {
    Self {
      size: 1,
      body: SegBody::Window(w),
    }
  }

  pub fn image(im: EmbImage) -> Self {
    Self {
      size: 1,
      body: SegBody::Image(im),
    }
  }

  pub fn gravity(&self) -> Gravity {
    match &self.body {
      SegBody::Chars(_) => Gravity::Right,
      SegBody::ToggleOn(_) => Gravity::Right,
      SegBody::ToggleOff(_) => Gravity::Left,
      SegBody::Mark(m) => m.gravity,
      SegBody::Window(_) => Gravity::Right,
      SegBody::Image(_) => Gravity::Right,
    }
  }

  pub fn is_chars(&self) -> bool {
    matches!(self.body, SegBody::Chars(_))
  }

  pub fn as_chars(&self) -> Option<&str> {
    match &self.body {
      SegBody::Chars(s) => Some(s.as_str()),
      _ => None,
    }
  }

  /// Toggle payload if this is a toggle segment, with the on/off flag.
  pub fn as_toggle(&self) -> Option<(Toggle, bool)> {
    match &self.body {
      SegBody::ToggleOn(t) => Some((*t, true)),
      SegBody::ToggleOff(t) => Some((*t, false)),
      _ => None,
    }
  }

  pub fn as_toggle_mut(&mut self) -> Option<&mut Toggle> {
    match &mut self.body {
      SegBody::ToggleOn(t) | SegBody::ToggleOff(t) => Some(t),
      _ => None,
    }
  }

  pub fn as_mark(&self) -> Option<&MarkData> {
    match &self.body {
      SegBody::Mark(m) => Some(m),
      _ => None,
    }
  }

  /// Name of the embedded object, if any.
  pub fn embed_name(&self) -> Option<&str> {
    match &self.body {
      SegBody::Window(w) => Some(w.name.as_str()),
      SegBody::Image(im) => Some(im.name.as_str()),
      _ => None,
    }
  }

  /// Number of index positions this segment occupies: one per code point
  /// for text, one for an embedded object, zero for marks and toggles.
  pub fn index_count(&self) -> usize {
    match &self.body {
      SegBody::Chars(s) => s.chars().count(),
      SegBody::Window(_) | SegBody::Image(_) => self.size,
      _ => 0,
    }
  }

  /// Number of user-visible characters (embedded objects excluded).
  pub fn char_count(&self) -> usize {
    match &self.body {
      SegBody::Chars(s) => s.chars().count(),
      _ => 0,
    }
  }

  /// Split a character segment at a byte offset strictly inside it. The
  /// offset must lie on a UTF-8 code-point boundary; zero-size kinds are
  /// never split.
  pub fn split(&self, at: usize) -> (Segment, Segment) {
    match &self.body {
      SegBody::Chars(s) => {
        debug_assert!(at > 0 && at < s.len());
        debug_assert!(s.is_char_boundary(at));
        (Segment::chars(&s[..at]), Segment::chars(&s[at..]))
      }
      _ => unreachable!("split of a non-character segment"),
    }
  }

  /// Fold this segment with the following one when they are compatible:
  /// two character runs merge into one. Returns the merged segment.
  pub fn merge_chars(&self, next: &Segment) -> Option<Segment> {
    match (&self.body, &next.body) {
      (SegBody::Chars(a), SegBody::Chars(b)) => {
        let mut s = a.clone();
        s.push_str(b);
        Some(Segment {
          size: s.len(),
          body: SegBody::Chars(s),
        })
      }
      _ => None,
    }
  }

  /// Debug-time consistency assertion for this segment.
  pub fn check(&self, is_last_in_line: bool) {
    match &self.body {
      SegBody::Chars(s) => {
        assert!(self.size > 0, "character segment has size <= 0");
        assert_eq!(self.size, s.len(), "character segment has wrong size");
        if is_last_in_line {
          assert!(
            s.ends_with('\n'),
            "line doesn't end with a newline segment"
          );
        } else {
          assert!(
            !s.contains('\n'),
            "newline in the middle of a logical line"
          );
        }
      }
      SegBody::ToggleOn(t) | SegBody::ToggleOff(t) => {
        assert_eq!(self.size, 0, "toggle segment has non-zero size");
        assert!(t.in_node_counts, "toggle counts not updated in nodes");
        assert!(!is_last_in_line, "toggle at end of line");
      }
      SegBody::Mark(_) => {
        assert_eq!(self.size, 0, "mark segment has non-zero size");
        assert!(!is_last_in_line, "mark at end of line");
      }
      SegBody::Window(_) | SegBody::Image(_) => {
        assert_eq!(self.size, 1, "embedded segment has size != 1");
        assert!(!is_last_in_line, "embedded object at end of line");
      }
    }
  }
}
