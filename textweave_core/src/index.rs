//! Byte positions within the tree and their symbolic string forms.
//!
//! A [`Position`] is a line handle plus a byte offset on that line, always
//! on a UTF-8 code-point boundary. Positions are value types: they stay
//! valid across tag and mark changes but are invalidated by structural
//! edits, so cacheable positions carry the state epoch they were resolved
//! at and re-parse from their string form when stale.

use crate::btree::{BTree, LineId};
use crate::seg::SegBody;

use compact_str::CompactString;
use std::cmp::Ordering;

pub mod motion;
pub mod parse;

#[cfg(test)]
mod index_tests;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// A byte boundary on a logical line.
pub struct Position {
  pub line: LineId,
  pub byte: usize,
}

impl Position {
  pub fn new(line: LineId, byte: usize) -> Self {
    Self { line, byte }
  }

  pub fn start_of(line: LineId) -> Self {
    Self { line, byte: 0 }
  }
}

/// Total order on positions within one tree.
pub fn compare(tree: &BTree, a: Position, b: Position) -> Ordering {
  if a.line == b.line {
    return a.byte.cmp(&b.byte);
  }
  tree.line_no(a.line).cmp(&tree.line_no(b.line))
}

/// Bit-exact string form `"L.C"`: 1-based line number, 0-based character
/// count within the line (code points for text, one per embedded object).
pub fn format(tree: &BTree, pos: Position) -> String {
  let lno = tree.line_no(pos.line) + 1;
  let mut char_idx = 0;
  let mut cum = 0;
  for seg in tree.line_segs(pos.line) {
    if cum >= pos.byte {
      break;
    }
    let take = (pos.byte - cum).min(seg.size);
    match &seg.body {
      SegBody::Chars(s) => {
        char_idx += s[..take].chars().count();
      }
      _ => {
        char_idx += take;
      }
    }
    cum += seg.size;
  }
  format!("{lno}.{char_idx}")
}

/// Position of character `char_idx` on 1-based line `lno`. Out-of-range
/// lines clamp to the closest valid line; a character count beyond the end
/// of the line clamps to its newline.
pub fn make_char_index(tree: &BTree, lno: i64, char_idx: i64) -> Position {
  let total = tree.line_count() as i64;
  let lno = lno.clamp(1, total);
  let line = tree.find_line((lno - 1) as usize);
  let line_len = tree.line(line).byte_len();

  let mut remain = char_idx.max(0) as usize;
  let mut byte = 0;
  for seg in tree.line_segs(line) {
    if remain == 0 {
      break;
    }
    match &seg.body {
      SegBody::Chars(s) => {
        for c in s.chars() {
          if remain == 0 {
            break;
          }
          byte += c.len_utf8();
          remain -= 1;
        }
      }
      _ => {
        let take = remain.min(seg.size);
        byte += take;
        remain -= take;
      }
    }
  }
  // Never point past the newline.
  Position::new(line, byte.min(line_len.saturating_sub(1)))
}

/// Round a byte offset forward to the next code-point boundary if it lands
/// inside a character.
pub fn round_to_boundary(tree: &BTree, pos: Position) -> Position {
  let mut cum = 0;
  for seg in tree.line_segs(pos.line) {
    if pos.byte < cum + seg.size {
      if let SegBody::Chars(s) = &seg.body {
        let mut at = pos.byte - cum;
        while at < s.len() && !s.is_char_boundary(at) {
          at += 1;
        }
        return Position::new(pos.line, cum + at);
      }
      return pos;
    }
    cum += seg.size;
  }
  pos
}

#[derive(Debug, Clone)]
/// A parsed position plus the epoch it was resolved at and its source
/// string, so it can be re-resolved after a structural edit.
pub struct CachedPosition {
  pub pos: Position,
  pub epoch: u64,
  pub source: CompactString,
}

impl CachedPosition {
  pub fn is_fresh(&self, tree: &BTree) -> bool {
    self.epoch == tree.state_epoch()
  }
}
