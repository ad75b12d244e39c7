//! Parser for symbolic index strings.
//!
//! Grammar: `BASE (±COUNT UNIT | MODIFIER)*`. Bases: `"L.C"` (`C` may be
//! `end`), `@x,y`, `end`, `tag.first`/`tag.last`, a mark name, or an
//! embedded-object name. Modifiers: `±N chars|indices|lines` (optionally
//! qualified by `display` or `any`), `linestart`, `lineend`, `wordstart`,
//! `wordend` (the line/word keywords also accept the `display` qualifier).
//!
//! Mark, embedded-object and pixel bases are checked first so their names
//! may contain characters like `+` or spaces; the result is cacheable only
//! when the base was `L.C` or `end`.

use crate::btree::BTree;
use crate::index::motion::{self, CountKind};
use crate::index::{Position, make_char_index};
use crate::prelude::*;
use crate::tag::TagId;

/// Everything the parser needs from the store to resolve an index string
/// for one viewer.
pub trait IndexHost {
  fn tree(&self) -> &BTree;
  fn lookup_mark(&self, name: &str) -> Option<Position>;
  fn lookup_embed(&self, name: &str) -> Option<Position>;
  fn lookup_tag(&self, name: &str) -> Option<TagId>;
  /// First character of any range of the tag.
  fn tag_first(&self, tag: TagId) -> Option<Position>;
  /// Just past the last character of any range of the tag.
  fn tag_last(&self, tag: TagId) -> Option<Position>;
  /// Character under a viewport pixel.
  fn pixel_index(&self, x: i64, y: i64) -> Position;
  fn is_elided(&self, pos: Position) -> bool;
  /// Start (`end == false`) or end of the display line holding `pos`.
  fn display_line_bound(&self, pos: Position, end: bool) -> Position;
  /// Move by whole display lines, preserving the horizontal offset.
  fn move_display_lines(&self, pos: Position, n: i64) -> Position;
}

/// Parse `s` against `host`. Returns the position and whether the result
/// may be cached (re-resolvable purely from the tree).
pub fn parse(host: &dyn IndexHost, s: &str) -> TheResult<(Position, bool)> {
  let bad = || TheTextError::BadIndex(s.into());

  // A whole-string mark or embedded-object name wins outright, so names
  // containing "+1c" or spaces keep working.
  if let Some(pos) = host.lookup_mark(s) {
    return Ok((pos, false));
  }
  if let Some(pos) = host.lookup_embed(s) {
    return Ok((pos, false));
  }

  let (pos, rest, cacheable) = parse_base(host, s)?;
  let mut pos = pos;
  let mut rest = rest.trim_start();
  while !rest.is_empty() {
    rest = match rest.as_bytes()[0] {
      b'+' | b'-' => forw_back(host, rest, &mut pos).ok_or_else(bad)?,
      _ => start_end(host, rest, &mut pos).ok_or_else(bad)?,
    };
    rest = rest.trim_start();
  }
  Ok((pos, cacheable))
}

// Parse the base part, returning the remaining modifier text.
fn parse_base<'s>(
  host: &dyn IndexHost,
  s: &'s str,
) -> TheResult<(Position, &'s str, bool)> {
  let bad = || TheTextError::BadIndex(s.into());

  // "tag.first" / "tag.last", using the *last* dot so tag names may
  // contain dots.
  if let Some(dot) = s.rfind('.') {
    let (name, suffix) = (&s[..dot], &s[dot + 1..]);
    let want_last = if suffix.starts_with("first") {
      Some((false, dot + 6))
    } else if suffix.starts_with("last") {
      Some((true, dot + 5))
    } else {
      None
    };
    if let Some((want_last, end_of_base)) = want_last {
      if let Some(tag) = host.lookup_tag(name) {
        let found = if want_last {
          host.tag_last(tag)
        } else {
          host.tag_first(tag)
        };
        let pos =
          found.ok_or_else(|| TheTextError::NoSuchRange(name.into()))?;
        return Ok((pos, &s[end_of_base.min(s.len())..], false));
      }
    }
  }

  // "@x,y": character under a viewport pixel.
  if let Some(body) = s.strip_prefix('@') {
    let (x, rest) = scan_int(body).ok_or_else(bad)?;
    let rest = rest.strip_prefix(',').ok_or_else(bad)?;
    let (y, rest) = scan_int(rest).ok_or_else(bad)?;
    return Ok((host.pixel_index(x, y), rest, false));
  }

  // "L.C": line and character numbers.
  if s.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
    let (lno, rest) = scan_int(s).ok_or_else(bad)?;
    let rest = rest.strip_prefix('.').ok_or_else(bad)?;
    let (char_idx, rest) = if let Some(r) = rest.strip_prefix("end") {
      (i64::MAX, r)
    } else {
      scan_int(rest).ok_or_else(bad)?
    };
    let pos = make_char_index(host.tree(), lno, char_idx);
    return Ok((pos, rest, true));
  }

  // A bare word: "end" (abbreviatable), else a mark or embedded-object
  // name.
  let word_len = s
    .find(|c: char| c.is_whitespace() || c == '+' || c == '-')
    .unwrap_or(s.len());
  let (word, rest) = s.split_at(word_len);
  if !word.is_empty() && "end".starts_with(word) {
    let tree = host.tree();
    return Ok((Position::start_of(tree.last_line()), rest, true));
  }
  if let Some(pos) = host.lookup_mark(word) {
    return Ok((pos, rest, false));
  }
  if let Some(pos) = host.lookup_embed(word) {
    return Ok((pos, rest, false));
  }
  Err(bad())
}

// "+N unit" / "-N unit" with an optional display/any qualifier.
fn forw_back<'s>(
  host: &dyn IndexHost,
  s: &'s str,
  pos: &mut Position,
) -> Option<&'s str> {
  let tree = host.tree();
  let back = s.as_bytes()[0] == b'-';
  let (count, rest) = scan_int(s[1..].trim_start())?;
  let back = back ^ (count < 0);
  let count = count.unsigned_abs() as usize;
  let rest = rest.trim_start();

  let (word, rest) = scan_word(rest);
  let (qual, word, rest) = match qualifier(word) {
    Some((q, leftover)) => {
      if leftover.is_empty() {
        let (w, r) = scan_word(rest.trim_start());
        (q, w, r)
      } else {
        (q, leftover, rest)
      }
    }
    None => (Qualifier::None, word, rest),
  };
  if word.is_empty() {
    return None;
  }

  let elided = |p: Position| host.is_elided(p);
  if "chars".starts_with(word) {
    let kind = match qual {
      Qualifier::None => CountKind::Indices,
      Qualifier::Any => CountKind::Chars,
      Qualifier::Display => CountKind::DisplayChars,
    };
    *pos = if back {
      motion::backward_chars(tree, *pos, count, kind, &elided)
    } else {
      motion::forward_chars(tree, *pos, count, kind, &elided)
    };
    Some(rest)
  } else if "indices".starts_with(word) {
    let kind = match qual {
      Qualifier::Display => CountKind::DisplayIndices,
      _ => CountKind::Indices,
    };
    *pos = if back {
      motion::backward_chars(tree, *pos, count, kind, &elided)
    } else {
      motion::forward_chars(tree, *pos, count, kind, &elided)
    };
    Some(rest)
  } else if "lines".starts_with(word) {
    if qual == Qualifier::Display {
      let n = count as i64;
      *pos = host.move_display_lines(*pos, if back { -n } else { n });
    } else {
      let lno = tree.line_no(pos.line) as i64;
      let target = if back {
        (lno - count as i64).max(0)
      } else {
        lno + count as i64
      };
      let total = tree.line_count() as i64;
      let line = tree.find_line(target.min(total - 1) as usize);
      let len = tree.line(line).byte_len();
      let byte = pos.byte.min(len.saturating_sub(1));
      *pos = crate::index::round_to_boundary(tree, Position::new(line, byte));
    }
    Some(rest)
  } else {
    None
  }
}

// "linestart" / "lineend" / "wordstart" / "wordend", optionally preceded
// by the display qualifier.
fn start_end<'s>(
  host: &dyn IndexHost,
  s: &'s str,
  pos: &mut Position,
) -> Option<&'s str> {
  let tree = host.tree();
  let (word, rest) = scan_word(s);
  let (qual, word, rest) = match qualifier(word) {
    Some((q, leftover)) => {
      if leftover.is_empty() {
        let (w, r) = scan_word(rest.trim_start());
        (q, w, r)
      } else {
        (q, leftover, rest)
      }
    }
    None => (Qualifier::None, word, rest),
  };

  if word.len() >= 5 && "lineend".starts_with(word) {
    *pos = if qual == Qualifier::Display {
      host.display_line_bound(*pos, true)
    } else {
      motion::line_end(tree, *pos)
    };
    Some(rest)
  } else if word.len() >= 6 && "linestart".starts_with(word) {
    *pos = if qual == Qualifier::Display {
      host.display_line_bound(*pos, false)
    } else {
      motion::line_start(*pos)
    };
    Some(rest)
  } else if word.len() >= 5 && "wordend".starts_with(word) {
    *pos = motion::word_end(tree, *pos);
    Some(rest)
  } else if word.len() >= 6 && "wordstart".starts_with(word) {
    *pos = motion::word_start(tree, *pos);
    Some(rest)
  } else {
    None
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Qualifier {
  None,
  Display,
  Any,
}

// Recognise a display/any qualifier prefix of `word`. Returns the
// qualifier and whatever of the word followed it ("displaylineend" is
// allowed unabbreviated, "display lineend" abbreviated).
fn qualifier(word: &str) -> Option<(Qualifier, &str)> {
  if word.is_empty() {
    return None;
  }
  if word.starts_with('d') {
    let cut = word.len().min(7);
    if "display".starts_with(&word[..cut]) {
      return Some((Qualifier::Display, &word[cut..]));
    }
  }
  if word.starts_with('a') {
    let cut = word.len().min(3);
    if "any".starts_with(&word[..cut]) {
      return Some((Qualifier::Any, &word[cut..]));
    }
  }
  None
}

// A signed decimal integer prefix.
fn scan_int(s: &str) -> Option<(i64, &str)> {
  let bytes = s.as_bytes();
  let mut i = 0;
  if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
    i += 1;
  }
  let digits_from = i;
  while i < bytes.len() && bytes[i].is_ascii_digit() {
    i += 1;
  }
  if i == digits_from {
    return None;
  }
  s[..i].parse::<i64>().ok().map(|v| (v, &s[i..]))
}

// A word up to whitespace or a sign character.
fn scan_word(s: &str) -> (&str, &str) {
  let end = s
    .find(|c: char| c.is_whitespace() || c == '+' || c == '-')
    .unwrap_or(s.len());
  s.split_at(end)
}
