//! Position arithmetic: forward/backward by characters, indices, bytes and
//! lines, word and line boundaries, and range counting.
//!
//! "Indices" count every positional slot (one per code point, one per
//! embedded object); "chars" count only user-visible characters. The
//! display variants skip content hidden by elision; callers supply the
//! elision predicate so this module stays independent of layout state.

use crate::btree::{BTree, LineId};
use crate::index::Position;
use crate::seg::SegBody;

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// What a char-wise motion counts.
pub enum CountKind {
  Chars,
  Indices,
  DisplayChars,
  DisplayIndices,
}

impl CountKind {
  pub fn display(&self) -> bool {
    matches!(self, CountKind::DisplayChars | CountKind::DisplayIndices)
  }

  pub fn chars_only(&self) -> bool {
    matches!(self, CountKind::Chars | CountKind::DisplayChars)
  }
}

// One positional step on a line: the byte offset of a countable unit.
fn line_units(tree: &BTree, line: LineId) -> Vec<(usize, bool)> {
  // (byte offset, is_char) for each index position on the line.
  let mut units = Vec::new();
  let mut byte = 0;
  for seg in tree.line_segs(line) {
    match &seg.body {
      SegBody::Chars(s) => {
        for (i, _) in s.char_indices() {
          units.push((byte + i, true));
        }
      }
      SegBody::Window(_) | SegBody::Image(_) => {
        units.push((byte, false));
      }
      _ => {}
    }
    byte += seg.size;
  }
  units
}

/// Move `n` units forward. Saturates at the start of the dummy trailing
/// line (the end position).
pub fn forward_chars(
  tree: &BTree,
  pos: Position,
  n: usize,
  kind: CountKind,
  elided: &dyn Fn(Position) -> bool,
) -> Position {
  let last = tree.last_line();
  let mut line = pos.line;
  let mut byte = pos.byte;
  let mut remain = n;
  loop {
    for (at, is_char) in line_units(tree, line) {
      if at < byte {
        continue;
      }
      let here = Position::new(line, at);
      if remain == 0 {
        return here;
      }
      if (is_char || !kind.chars_only()) && !(kind.display() && elided(here))
      {
        remain -= 1;
      }
    }
    if line == last {
      return Position::start_of(last);
    }
    match tree.next_line(line) {
      Some(next) => {
        line = next;
        byte = 0;
      }
      None => return Position::start_of(last),
    }
  }
}

/// Move `n` units backward. Saturates at the first position of the tree.
pub fn backward_chars(
  tree: &BTree,
  pos: Position,
  n: usize,
  kind: CountKind,
  elided: &dyn Fn(Position) -> bool,
) -> Position {
  if n == 0 {
    return pos;
  }
  let mut line = pos.line;
  let mut bound = pos.byte;
  let mut remain = n;
  loop {
    let units = line_units(tree, line);
    for (at, is_char) in units.iter().rev().copied() {
      if at >= bound {
        continue;
      }
      let here = Position::new(line, at);
      let countable = (is_char || !kind.chars_only())
        && !(kind.display() && elided(here));
      if countable {
        remain -= 1;
        if remain == 0 {
          return here;
        }
      }
    }
    match tree.prev_line(line) {
      Some(prev) => {
        line = prev;
        bound = usize::MAX;
      }
      None => return Position::new(line, 0),
    }
  }
}

/// Count the units in `[i1, i2)`; `i1` must not be after `i2`.
pub fn count(
  tree: &BTree,
  i1: Position,
  i2: Position,
  kind: CountKind,
  elided: &dyn Fn(Position) -> bool,
) -> usize {
  let mut line = i1.line;
  let mut from = i1.byte;
  let mut total = 0;
  loop {
    let stop = if line == i2.line {
      i2.byte
    } else {
      usize::MAX
    };
    for (at, is_char) in line_units(tree, line) {
      if at < from || at >= stop {
        continue;
      }
      let here = Position::new(line, at);
      if (is_char || !kind.chars_only()) && !(kind.display() && elided(here))
      {
        total += 1;
      }
    }
    if line == i2.line {
      return total;
    }
    match tree.next_line(line) {
      Some(next) => {
        line = next;
        from = 0;
      }
      None => return total,
    }
  }
}

/// Move `n` bytes forward, clamped to the end position and rounded forward
/// off any split code point.
pub fn forward_bytes(tree: &BTree, pos: Position, n: usize) -> Position {
  let last = tree.last_line();
  let mut line = pos.line;
  let mut byte = pos.byte + n;
  loop {
    let len = tree.line(line).byte_len();
    if byte < len {
      return crate::index::round_to_boundary(tree, Position::new(line, byte));
    }
    if line == last {
      return Position::start_of(last);
    }
    byte -= len;
    line = tree.next_line(line).unwrap();
  }
}

/// Move `n` bytes backward, clamped to the first position.
pub fn backward_bytes(tree: &BTree, pos: Position, n: usize) -> Position {
  let mut line = pos.line;
  let mut byte = pos.byte as i64 - n as i64;
  loop {
    if byte >= 0 {
      return round_down(tree, Position::new(line, byte as usize));
    }
    match tree.prev_line(line) {
      Some(prev) => {
        line = prev;
        byte += tree.line(line).byte_len() as i64;
      }
      None => return Position::new(line, 0),
    }
  }
}

/// Number of bytes in `[i1, i2)`.
pub fn count_bytes(tree: &BTree, i1: Position, i2: Position) -> usize {
  let mut total = 0;
  let mut line = i1.line;
  let mut from = i1.byte;
  loop {
    if line == i2.line {
      return total + i2.byte.saturating_sub(from);
    }
    total += tree.line(line).byte_len() - from;
    from = 0;
    match tree.next_line(line) {
      Some(next) => line = next,
      None => return total,
    }
  }
}

// Round a byte offset down onto a code-point boundary.
fn round_down(tree: &BTree, pos: Position) -> Position {
  let mut cum = 0;
  for seg in tree.line_segs(pos.line) {
    if pos.byte < cum + seg.size {
      if let SegBody::Chars(s) = &seg.body {
        let mut at = pos.byte - cum;
        while at > 0 && !s.is_char_boundary(at) {
          at -= 1;
        }
        return Position::new(pos.line, cum + at);
      }
      return pos;
    }
    cum += seg.size;
  }
  pos
}

/// Start of the logical line holding `pos`.
pub fn line_start(pos: Position) -> Position {
  Position::start_of(pos.line)
}

/// Position of the newline ending the logical line holding `pos`.
pub fn line_end(tree: &BTree, pos: Position) -> Position {
  let len = tree.line(pos.line).byte_len();
  Position::new(pos.line, len.saturating_sub(1))
}

// Line text with embedded objects rendered as spaces, so byte offsets in
// the string equal byte offsets on the line.
fn line_text(tree: &BTree, line: LineId) -> String {
  let mut out = String::new();
  for seg in tree.line_segs(line) {
    match &seg.body {
      SegBody::Chars(s) => out.push_str(s),
      SegBody::Window(_) | SegBody::Image(_) => out.push(' '),
      _ => {}
    }
  }
  out
}

/// Start of the word containing `pos` (Unicode word boundaries; a
/// non-word character is its own word).
pub fn word_start(tree: &BTree, pos: Position) -> Position {
  let text = line_text(tree, pos.line);
  let mut start = 0;
  for (at, word) in text.split_word_bound_indices() {
    if at <= pos.byte && pos.byte < at + word.len() {
      start = at;
      break;
    }
  }
  Position::new(pos.line, start)
}

/// Position just past the word containing `pos`.
pub fn word_end(tree: &BTree, pos: Position) -> Position {
  let text = line_text(tree, pos.line);
  let line_len = tree.line(pos.line).byte_len();
  for (at, word) in text.split_word_bound_indices() {
    if at <= pos.byte && pos.byte < at + word.len() {
      return Position::new(pos.line, (at + word.len()).min(line_len - 1));
    }
  }
  line_end(tree, pos)
}
