//! Display-line layout.
//!
//! Turns a starting index into one display line: a run of chunks laid out
//! left to right, honouring wrapping, tabs, justification and elision.
//! When an elided region swallows a newline the following logical line
//! merges into the same display line. Layout mutates nothing but the
//! style-table reference counts.

use crate::btree::{BTree, LineId};
use crate::index::motion;
use crate::index::{Position, compare};
use crate::opt::{
  JustifyOption, StoreOptions, TabAlignOption, TabArray, WrapOption,
};
use crate::prelude::*;
use crate::seg::SegBody;
use crate::tag::{TagId, TagSet};

use compact_str::CompactString;
use std::cmp::Ordering;

pub mod chunk;
pub mod style;

#[cfg(test)]
mod layout_tests;

pub use chunk::{Chunk, ChunkKind, char_cols, text_width};
pub use style::{Style, StyleTable, StyleValues};

#[derive(Debug, Copy, Clone)]
/// Everything layout reads: the tree, the tag registry, display defaults
/// and the wrap budget of the viewer being laid out.
pub struct LayoutCtx<'a> {
  pub tree: &'a BTree,
  pub tags: &'a TagSet,
  pub opts: &'a StoreOptions,
  /// Viewport pixel width.
  pub width: usize,
}

#[derive(Debug)]
/// One laid-out display line.
pub struct DisplayLine {
  pub start: Position,
  /// Bytes consumed, possibly spanning merged logical lines.
  pub byte_count: usize,
  pub height: usize,
  pub baseline: i64,
  pub space_above: i64,
  pub space_below: i64,
  /// Pixel extent of the laid-out chunks.
  pub length: i64,
  /// Extra logical lines folded into this display line by elided
  /// newlines.
  pub logical_lines_merged: usize,
  pub chunks: Vec<Chunk>,
}

impl DisplayLine {
  /// Release the style references held by the chunks.
  pub fn release(self, styles: &mut StyleTable) {
    for c in &self.chunks {
      styles.release(&c.style);
    }
  }
}

/// Whether the character at `pos` is hidden: the highest-priority tag
/// carrying an elide attribute decides.
pub fn is_elided(tree: &BTree, tags: &TagSet, pos: Position) -> bool {
  let active = tree.tags_at(tags, pos);
  for id in active.iter().rev() {
    if let Some(e) = tags.get(*id).attrs.elide {
      return e;
    }
  }
  false
}

// Elide state just after segment `seg_bound` of `line`: the state carried
// over the previous newline, updated by this line's earlier toggles. Byte
// offsets can't distinguish between several toggles at one position, so
// this works in segment indices.
fn elided_at_seg(ctx: &LayoutCtx, line: LineId, seg_bound: usize) -> bool {
  let mut parity: HashSet<TagId> = match ctx.tree.prev_line(line) {
    Some(prev) => {
      let len = ctx.tree.line(prev).byte_len();
      ctx
        .tree
        .tags_at(ctx.tags, Position::new(prev, len - 1))
        .into_iter()
        .collect()
    }
    None => HashSet::new(),
  };
  for seg in &ctx.tree.line_segs(line)[..seg_bound] {
    if let Some((t, _)) = seg.as_toggle() {
      if !parity.remove(&t.tag) {
        parity.insert(t.tag);
      }
    }
  }
  let mut best: Option<(usize, bool)> = None;
  for id in parity {
    let tag = ctx.tags.get(id);
    if let Some(e) = tag.attrs.elide {
      if best.is_none_or(|(p, _)| tag.priority > p) {
        best = Some((tag.priority, e));
      }
    }
  }
  best.is_some_and(|(_, e)| e)
}

fn style_at(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  pos: Position,
) -> Style {
  let active = ctx.tree.tags_at(ctx.tags, pos);
  let values = StyleValues::resolve(
    ctx.opts,
    active.iter().map(|id| ctx.tags.get(*id)),
  );
  styles.get(values)
}

// Locate the segment cursor for a byte offset: the first segment at that
// offset (zero-size segments included).
fn seek(tree: &BTree, line: LineId, byte: usize) -> (usize, usize) {
  let mut off = byte;
  for (i, seg) in tree.line_segs(line).iter().enumerate() {
    if off == 0 || off < seg.size {
      return (i, off);
    }
    off -= seg.size;
  }
  (tree.line_segs(line).len(), 0)
}

/// Lay out the display line starting at `start`, which must be a display
/// line boundary.
pub fn layout_display_line(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  start: Position,
) -> DisplayLine {
  let tree = ctx.tree;
  let mut dl = DisplayLine {
    start,
    byte_count: 0,
    height: 0,
    baseline: 0,
    space_above: 0,
    space_below: 0,
    length: 0,
    logical_lines_merged: 0,
    chunks: Vec::new(),
  };
  let paragraph_start = start.byte == 0;

  // A logical line elided from front to back yields one zero-height
  // display line covering all of its bytes; there may be thousands of
  // them, so skip chunking entirely.
  if paragraph_start && is_elided(tree, ctx.tags, start) {
    let segs = tree.line_segs(start.line);
    let mut elide = elided_at_seg(ctx, start.line, 0);
    let mut bytes = 0usize;
    let mut fully = true;
    for (i, seg) in segs.iter().enumerate() {
      if let Some((t, _)) = seg.as_toggle() {
        if ctx.tags.get(t.tag).attrs.elide.is_some() {
          elide = elided_at_seg(ctx, start.line, i + 1);
        }
      }
      if seg.size > 0 {
        if !elide {
          fully = false;
          break;
        }
        bytes += seg.size;
      }
    }
    if fully {
      dl.byte_count = bytes;
      return dl;
    }
  }

  let mut cur_line = start.line;
  let mut cur_byte = start.byte;
  let (mut seg_idx, mut seg_off) = seek(tree, cur_line, cur_byte);

  let mut no_chars_yet = true;
  let mut elide = false;
  let mut justify = ctx.opts.justify();
  let mut tabs = TabArray::default();
  let mut rmargin = 0usize;
  let mut wrap = ctx.opts.wrap();
  let mut x: i64 = 0;
  let mut max_x: Option<i64> = Some(ctx.width as i64);
  let mut tab_size: i64 = 0;
  let mut tab_stop: Option<usize> = None;
  let mut tab_chunk: Option<usize> = None;
  let mut break_chunk: Option<(usize, usize)> = None;
  let mut last_char_chunk: Option<usize> = None;
  let mut whole_line = false;
  let tab_interval = ctx.opts.tab_columns() * ctx.opts.font().char_width();

  loop {
    if seg_idx >= tree.line_segs(cur_line).len() {
      if elide {
        if let Some(next) = tree.next_line(cur_line) {
          // The newline was elided: the next logical line joins this
          // display line.
          dl.logical_lines_merged += 1;
          cur_line = next;
          cur_byte = 0;
          seg_idx = 0;
          seg_off = 0;
          continue;
        }
      }
      whole_line = true;
      break;
    }

    let seg = tree.line_segs(cur_line)[seg_idx].clone();

    // Extend an open invisible chunk across further elided content.
    if elide && dl.chunks.last().is_some_and(|c| c.is_elided()) {
      let remaining = seg.size - seg_off;
      if remaining > 0 {
        let idx = dl.chunks.len() - 1;
        let last = &mut dl.chunks[idx];
        last.num_bytes += remaining;
        last.break_index = last.num_bytes as i64;
        break_chunk = Some((idx, last.num_bytes));
        cur_byte += remaining;
      } else if let Some((t, _)) = seg.as_toggle() {
        if ctx.tags.get(t.tag).attrs.elide.is_some() {
          elide = elided_at_seg(ctx, cur_line, seg_idx + 1);
        }
      }
      seg_idx += 1;
      seg_off = 0;
      continue;
    }

    // Marks and toggles contribute nothing visible; an elide toggle can
    // flip the state.
    match &seg.body {
      SegBody::Mark(_) => {
        seg_idx += 1;
        seg_off = 0;
        continue;
      }
      SegBody::ToggleOn(t) | SegBody::ToggleOff(t) => {
        if ctx.tags.get(t.tag).attrs.elide.is_some() {
          elide = elided_at_seg(ctx, cur_line, seg_idx + 1);
        }
        seg_idx += 1;
        seg_off = 0;
        continue;
      }
      _ => {}
    }

    let pos_here = Position::new(cur_line, cur_byte);
    let style = style_at(ctx, styles, pos_here);
    elide = style.elide;

    // The first visible chunk pins the line-wide parameters.
    if !elide && no_chars_yet {
      tabs = style.tabs.clone();
      justify = style.justify;
      rmargin = style.rmargin;
      wrap = style.wrap;
      x = if paragraph_start {
        style.lmargin1 as i64
      } else {
        style.lmargin2 as i64
      };
      max_x = match wrap {
        WrapOption::None => None,
        _ => Some((ctx.width as i64 - rmargin as i64).max(x)),
      };
    }

    let mut max_bytes = seg.size - seg_off;
    let mut got_tab = false;
    if !elide && justify == JustifyOption::Left {
      if let Some(text) = seg.as_chars() {
        // Lay out only up to (and including) a tab; following chunks
        // wait for the tab stop.
        if let Some(tp) = text[seg_off..].find('\t') {
          max_bytes = tp + 1;
          got_tab = true;
        }
      }
    }

    if elide {
      let idx = dl.chunks.len();
      dl.chunks.push(Chunk {
        style,
        kind: ChunkKind::Elided,
        start: pos_here,
        x,
        width: 0,
        num_bytes: max_bytes,
        break_index: max_bytes as i64,
        min_ascent: 0,
        min_descent: 0,
        min_height: 0,
      });
      break_chunk = Some((idx, max_bytes));
      cur_byte += max_bytes;
      seg_off += max_bytes;
      if seg_off >= seg.size {
        seg_idx += 1;
        seg_off = 0;
      }
      continue;
    }

    let fitted = match &seg.body {
      SegBody::Chars(text) => {
        let slice = &text[seg_off..seg_off + max_bytes];
        let next_nonchar = next_sized_is_nonchar(tree, cur_line, seg_idx);
        layout_chars(
          &style,
          slice,
          pos_here,
          x,
          max_x,
          tab_size,
          no_chars_yet,
          wrap,
          next_nonchar,
        )
      }
      SegBody::Window(w) => layout_embed(
        &style,
        ChunkKind::Window {
          name: w.name.clone(),
        },
        w.width,
        w.height,
        pos_here,
        x,
        max_x,
        no_chars_yet,
      ),
      SegBody::Image(im) => layout_embed(
        &style,
        ChunkKind::Image {
          name: im.name.clone(),
        },
        im.width,
        im.height,
        pos_here,
        x,
        max_x,
        no_chars_yet,
      ),
      _ => unreachable!("zero-size segment reached chunk layout"),
    };

    let Some(chunk) = fitted else {
      // Nothing from this segment fits: the display line ends here.
      styles.release(&style);
      break;
    };
    let consumed = chunk.num_bytes;
    let idx = dl.chunks.len();
    if consumed > 0 {
      no_chars_yet = false;
      last_char_chunk = Some(idx);
    }
    x += chunk.width;
    if chunk.break_index > 0 {
      break_chunk = Some((idx, chunk.break_index as usize));
    }
    dl.chunks.push(chunk);
    if consumed != max_bytes {
      break;
    }

    if got_tab {
      if let (Some(stop), Some(tc)) = (tab_stop, tab_chunk) {
        adjust_for_tab(&mut dl.chunks, &tabs, stop, tc, tab_interval);
        let last = dl.chunks.last().unwrap();
        x = last.x + last.width;
      }
      tab_chunk = Some(idx);
      let next_stop = next_tab_stop(&tabs, tab_stop, x, tab_interval);
      tab_size =
        (tabs.stop_at(next_stop, tab_interval).pos as i64 - x).max(
          ctx.opts.font().char_width() as i64,
        );
      tab_stop = Some(next_stop);
      if let Some(mx) = max_x {
        if tab_size >= mx - x {
          cur_byte += consumed;
          break;
        }
      }
    }

    cur_byte += consumed;
    seg_off += consumed;
    if seg_off >= seg.size {
      seg_idx += 1;
      seg_off = 0;
    }
  }

  if dl.chunks.is_empty() {
    dl.byte_count = remaining_line_bytes(tree, start);
    return dl;
  }

  // Throw away everything after the last break candidate, re-fitting a
  // partially kept chunk.
  let (bidx, boff) = match break_chunk {
    Some(b) => b,
    None => match last_char_chunk {
      Some(i) => (i, dl.chunks[i].num_bytes),
      None => (dl.chunks.len() - 1, dl.chunks.last().unwrap().num_bytes),
    },
  };
  if bidx != dl.chunks.len() - 1 || boff != dl.chunks[bidx].num_bytes {
    for c in dl.chunks.drain(bidx + 1..).collect::<Vec<_>>() {
      styles.release(&c.style);
    }
    let c = &mut dl.chunks[bidx];
    if boff != c.num_bytes {
      if let ChunkKind::Text { text } = &mut c.kind {
        let keep = boff.min(text.len());
        let t2: CompactString = text[..keep].into();
        *text = t2;
      }
      c.num_bytes = boff;
      if let ChunkKind::Text { text } = &c.kind {
        c.width = text_width(&c.style.font, text);
      }
    }
    whole_line = false;
  }

  if let (Some(stop), Some(tc)) = (tab_stop, tab_chunk) {
    if tc < dl.chunks.len() {
      adjust_for_tab(&mut dl.chunks, &tabs, stop, tc, tab_interval);
    }
  }

  if no_chars_yet {
    dl.byte_count = dl.chunks.iter().map(|c| c.num_bytes).sum();
    if dl.byte_count == 0 {
      dl.byte_count = remaining_line_bytes(tree, start);
    }
    return dl;
  }

  // Justify, then fold chunk extents into the line geometry.
  let last = dl.chunks.last().unwrap();
  dl.length = last.x + last.width;
  let justify_max = match max_x {
    Some(mx) => mx,
    None => ctx.width as i64 - rmargin as i64,
  };
  let j_indent = match justify {
    JustifyOption::Left => 0,
    JustifyOption::Right => justify_max - dl.length,
    JustifyOption::Center => (justify_max - dl.length) / 2,
  };
  let mut ascent: i64 = 0;
  let mut descent: i64 = 0;
  let mut height: i64 = 0;
  for c in dl.chunks.iter_mut() {
    c.x += j_indent;
    dl.byte_count += c.num_bytes;
    ascent = ascent.max(c.min_ascent);
    descent = descent.max(c.min_descent);
    height = height.max(c.min_height);
  }
  if height < ascent + descent {
    height = ascent + descent;
    dl.baseline = ascent;
  } else {
    dl.baseline = ascent + (height - ascent - descent) / 2;
  }
  let first_style = dl.chunks[0].style.clone();
  dl.space_above = if paragraph_start {
    first_style.spacing_above as i64
  } else {
    (first_style.spacing_wrap - first_style.spacing_wrap / 2) as i64
  };
  dl.space_below = if whole_line {
    first_style.spacing_below as i64
  } else {
    (first_style.spacing_wrap / 2) as i64
  };
  height += dl.space_above + dl.space_below;
  dl.baseline += dl.space_above;
  dl.height = height.max(0) as usize;
  let last = dl.chunks.last().unwrap();
  dl.length = last.x + last.width;
  dl
}

// Bytes from `start` to the end of its logical line.
fn remaining_line_bytes(tree: &BTree, start: Position) -> usize {
  tree.line(start.line).byte_len().saturating_sub(start.byte).max(1)
}

// Whether the next sized segment after `seg_idx` is a non-character one
// (word wrap may break before an embedded object).
fn next_sized_is_nonchar(tree: &BTree, line: LineId, seg_idx: usize) -> bool {
  for seg in &tree.line_segs(line)[seg_idx + 1..] {
    if seg.size != 0 {
      return !seg.is_chars();
    }
  }
  false
}

// Fit characters from `text` into the remaining budget.
#[allow(clippy::too_many_arguments)]
fn layout_chars(
  style: &Style,
  text: &str,
  start: Position,
  x: i64,
  max_x: Option<i64>,
  tab_size: i64,
  no_chars_yet: bool,
  wrap: WrapOption,
  next_is_nonchar_sized: bool,
) -> Option<Chunk> {
  let font = &style.font;
  let budget = max_x.map(|m| m - tab_size);

  let mut fit = 0usize;
  let mut next_x = x;
  for (i, c) in text.char_indices() {
    if c == '\n' {
      break;
    }
    let cw = (char_cols(c) * font.char_width()) as i64;
    if let Some(b) = budget {
      if next_x + cw > b {
        break;
      }
    }
    fit = i + c.len_utf8();
    next_x += cw;
  }

  if fit < text.len() {
    if fit == 0 && no_chars_yet && !text.starts_with('\n') {
      // The line can't even hold one character; force the first in
      // anyway.
      let c = text.chars().next().unwrap();
      fit = c.len_utf8();
      next_x = x + (char_cols(c) * font.char_width()) as i64;
    }
    // A space fits whenever at least one pixel is left; give it whatever
    // room remains.
    if let Some(b) = budget {
      if next_x < b
        && (text[fit..].starts_with(' ') || text[fit..].starts_with('\t'))
      {
        fit += 1;
        next_x = b;
      }
    }
    if wrap == WrapOption::Word {
      // Trailing spaces belong to this line so the next one doesn't open
      // with blanks.
      while text[fit..].starts_with(' ') {
        fit += 1;
      }
    }
    if text[fit..].starts_with('\n') {
      fit += 1;
    }
    if fit == 0 {
      return None;
    }
  }

  let kept = &text[..fit];
  let mut break_index: i64 = if wrap != WrapOption::Word {
    fit as i64
  } else {
    match kept.rfind([' ', '\t', '\n', '\x0b', '\x0c', '\r']) {
      Some(p) => (p + 1) as i64,
      None => -1,
    }
  };
  if wrap == WrapOption::Word
    && fit == text.len()
    && next_is_nonchar_sized
  {
    break_index = fit as i64;
  }

  Some(Chunk {
    style: style.clone(),
    kind: ChunkKind::Text { text: kept.into() },
    start,
    x,
    width: next_x - x,
    num_bytes: fit,
    break_index,
    min_ascent: font.ascent() as i64 + style.offset as i64,
    min_descent: font.descent() as i64 - style.offset as i64,
    min_height: 0,
  })
}

#[allow(clippy::too_many_arguments)]
fn layout_embed(
  style: &Style,
  kind: ChunkKind,
  width: usize,
  height: usize,
  start: Position,
  x: i64,
  max_x: Option<i64>,
  no_chars_yet: bool,
) -> Option<Chunk> {
  if !no_chars_yet {
    if let Some(mx) = max_x {
      if x + width as i64 > mx {
        return None;
      }
    }
  }
  Some(Chunk {
    style: style.clone(),
    kind,
    start,
    x,
    width: width as i64,
    num_bytes: 1,
    break_index: 1,
    min_ascent: height as i64,
    min_descent: 0,
    min_height: 0,
  })
}

// First tab stop index at or after `from` whose position lies right of
// `x`.
fn next_tab_stop(
  tabs: &TabArray,
  last_used: Option<usize>,
  x: i64,
  interval: usize,
) -> usize {
  let mut k = last_used.map_or(0, |t| t + 1);
  while (tabs.stop_at(k, interval).pos as i64) <= x {
    k += 1;
  }
  k
}

// Shift the chunks after a tab chunk so the text between this tab and the
// next lines up on the recorded stop.
fn adjust_for_tab(
  chunks: &mut [Chunk],
  tabs: &TabArray,
  stop_index: usize,
  tab_chunk: usize,
  interval: usize,
) {
  let first_after = tab_chunk + 1;
  if first_after >= chunks.len() {
    return;
  }
  let stop = tabs.stop_at(stop_index, interval);
  let cur_x = chunks[first_after].x;
  let w: i64 = chunks[first_after..].iter().map(|c| c.width).sum();
  let desired = match stop.align {
    TabAlignOption::Left => stop.pos as i64,
    TabAlignOption::Right => stop.pos as i64 - w,
    TabAlignOption::Center => stop.pos as i64 - w / 2,
    TabAlignOption::Numeric => {
      let mut dot: Option<i64> = None;
      let mut acc = 0i64;
      'scan: for c in &chunks[first_after..] {
        if let ChunkKind::Text { text } = &c.kind {
          for (i, ch) in text.char_indices() {
            if ch == '.' {
              dot = Some(acc + c.measure_to(i));
              break 'scan;
            }
          }
        }
        acc += c.width;
      }
      stop.pos as i64 - dot.unwrap_or(w)
    }
  };
  let shift = (desired - cur_x).max(0);
  if shift == 0 {
    return;
  }
  for c in &mut chunks[first_after..] {
    c.x += shift;
  }
  chunks[tab_chunk].width += shift;
}

// Display-line navigation helpers {

/// First logical line of the chain `line` belongs to: walk back across
/// predecessors whose newline is elided.
pub fn chain_start(tree: &BTree, tags: &TagSet, line: LineId) -> LineId {
  let mut l = line;
  while let Some(prev) = tree.prev_line(l) {
    let plen = tree.line(prev).byte_len();
    if is_elided(tree, tags, Position::new(prev, plen - 1)) {
      l = prev;
    } else {
      break;
    }
  }
  l
}

/// Start of the display line containing `pos`.
pub fn display_line_start(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  pos: Position,
) -> Position {
  let first = chain_start(ctx.tree, ctx.tags, pos.line);
  let mut cur = Position::start_of(first);
  loop {
    let dl = layout_display_line(ctx, styles, cur);
    let bytes = dl.byte_count.max(1);
    dl.release(styles);
    let next = motion::forward_bytes(ctx.tree, cur, bytes);
    if next == cur || compare(ctx.tree, pos, next) == Ordering::Less {
      return cur;
    }
    cur = next;
  }
}

/// Start or end (last index) of the display line containing `pos`.
pub fn display_line_bound(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  pos: Position,
  end: bool,
) -> Position {
  let start = display_line_start(ctx, styles, pos);
  if !end {
    return start;
  }
  let dl = layout_display_line(ctx, styles, start);
  let bytes = dl.byte_count.max(1);
  dl.release(styles);
  let next = motion::forward_bytes(ctx.tree, start, bytes);
  motion::backward_bytes(ctx.tree, next, 1)
}

/// Pixel x of `pos` within its display line `dl`.
pub fn dline_x_of(dl: &DisplayLine, tree: &BTree, pos: Position) -> i64 {
  let mut best: Option<&Chunk> = None;
  for c in &dl.chunks {
    if compare(tree, c.start, pos) != Ordering::Greater {
      best = Some(c);
    } else {
      break;
    }
  }
  match best {
    Some(c) => {
      let off = motion::count_bytes(tree, c.start, pos);
      c.x + c.measure_to(off)
    }
    None => dl.chunks.first().map(|c| c.x).unwrap_or(0),
  }
}

/// Index of the character at pixel `x` within display line `dl`.
pub fn dline_index_of_x(dl: &DisplayLine, tree: &BTree, x: i64) -> Position {
  for c in &dl.chunks {
    if c.is_elided() {
      continue;
    }
    if x < c.x + c.width {
      let byte = c.byte_at_x((x - c.x).max(0));
      return motion::forward_bytes(tree, c.start, byte);
    }
  }
  match dl.chunks.iter().rev().find(|c| !c.is_elided()) {
    Some(c) => {
      motion::forward_bytes(tree, c.start, c.num_bytes.saturating_sub(1))
    }
    None => dl.start,
  }
}

/// Total pixel height, merged-line count and display-line count of the
/// logical line starting at `line`.
pub fn logical_line_metrics(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  line: LineId,
) -> (usize, usize, usize) {
  let mut pos = Position::start_of(line);
  let mut height = 0usize;
  let mut merged = 0usize;
  let mut dlines = 0usize;
  loop {
    let dl = layout_display_line(ctx, styles, pos);
    height += dl.height;
    merged += dl.logical_lines_merged;
    dlines += 1;
    let bytes = dl.byte_count.max(1);
    dl.release(styles);
    let next = motion::forward_bytes(ctx.tree, pos, bytes);
    if next == pos || next.byte == 0 {
      break;
    }
    pos = next;
  }
  (height, merged, dlines)
}

/// Move `n` display lines from `pos`, preserving the horizontal pixel
/// offset within the line. Saturates at the first and last display lines.
pub fn move_display_lines(
  ctx: &LayoutCtx,
  styles: &mut StyleTable,
  pos: Position,
  n: i64,
) -> Position {
  let mut cur = display_line_start(ctx, styles, pos);
  let x_offset = {
    let dl = layout_display_line(ctx, styles, cur);
    let x = dline_x_of(&dl, ctx.tree, pos);
    dl.release(styles);
    x
  };

  let mut remain = n;
  while remain > 0 {
    let dl = layout_display_line(ctx, styles, cur);
    let bytes = dl.byte_count.max(1);
    dl.release(styles);
    let next = motion::forward_bytes(ctx.tree, cur, bytes);
    if next == cur {
      break;
    }
    cur = next;
    remain -= 1;
    if cur.line == ctx.tree.last_line() && cur.byte == 0 {
      break;
    }
  }
  while remain < 0 {
    if cur == Position::start_of(ctx.tree.first_line()) {
      break;
    }
    let back = motion::backward_bytes(ctx.tree, cur, 1);
    cur = display_line_start(ctx, styles, back);
    remain += 1;
  }

  let dl = layout_display_line(ctx, styles, cur);
  let found = dline_index_of_x(&dl, ctx.tree, x_offset);
  dl.release(styles);
  found
}

// Display-line navigation helpers }
