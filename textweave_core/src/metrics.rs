//! Asynchronous pixel-height maintenance.
//!
//! Every viewer keeps a window of logical lines whose cached pixel heights
//! may be stale. Edits move that window; a timer task repeatedly consumes
//! a small quantum of layout work until the window is drained, at which
//! point the viewer is "in sync" and a view-sync notification fires. A
//! very long wrapped line can be measured across several ticks through a
//! saved partial state.

use crate::btree::{BTree, LineId};
use crate::defaults;
use crate::index::Position;
use crate::index::motion;
use crate::layout::{self, LayoutCtx, StyleTable};

use tracing::trace;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Saved progress inside one long logical line.
pub struct PartialMetric {
  /// Tree state epoch the saved index belongs to; a mismatch discards the
  /// partial state.
  pub epoch: u64,
  /// First display line not yet measured.
  pub index: Position,
  /// Height accumulated so far.
  pub pixel_height: usize,
}

#[derive(Debug, Clone)]
/// Per-viewer async updater state.
pub struct MetricState {
  /// Next line the updater will examine; -1 restarts from the top.
  pub current_line: isize,
  /// One past the last line scheduled for examination; -1 means "resolve
  /// to the line count at the next tick".
  pub last_line: isize,
  /// Epoch a line's cached height must carry to be considered fresh.
  pub update_epoch: u32,
  pub partial: Option<PartialMetric>,
  /// Last sync state reported for the viewer.
  pub in_sync: bool,
  /// Whether the metric timer task is scheduled.
  pub timer_armed: bool,
}

impl Default for MetricState {
  fn default() -> Self {
    Self {
      current_line: 0,
      last_line: 0,
      update_epoch: 1,
      partial: None,
      in_sync: true,
      timer_armed: false,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// How a range invalidation came about; insertions and deletions shift the
/// pending window rather than just widening it.
pub enum InvalidateKind {
  Insert,
  Delete,
  Simple,
}

/// Mark `count` lines starting at `line_no` (or everything, when `line_no`
/// is `None`) as having stale heights for one viewer, adjusting the
/// updater window.
pub fn invalidate(
  tree: &mut BTree,
  slot: usize,
  state: &mut MetricState,
  line_no: Option<usize>,
  count: usize,
  kind: InvalidateKind,
) {
  match line_no {
    Some(from_no) => {
      // Zero the cached epoch of each line in the range.
      let mut cur: Option<LineId> = Some(tree.find_line(from_no));
      let mut remain = count + 1;
      while remain > 0 {
        match cur {
          Some(line) => {
            tree.set_line_pixel_epoch(slot, line, 0);
            cur = tree.next_line(line);
          }
          None => break,
        }
        remain -= 1;
      }

      let from = from_no as isize;
      let cnt = count as isize;
      if !state.timer_armed {
        state.current_line = from;
        let cnt = if kind == InvalidateKind::Delete { 0 } else { cnt };
        state.last_line = from + cnt + 1;
      } else {
        // Merge with the in-flight window, shifting it for structural
        // changes.
        let to = from + cnt + 1;
        match kind {
          InvalidateKind::Delete => {
            if to <= state.current_line {
              state.current_line = from;
              if state.last_line != -1 {
                state.last_line -= cnt;
              }
            } else if from <= state.current_line {
              state.current_line = from;
              if to <= state.last_line {
                state.last_line -= cnt;
              }
            } else if state.last_line != -1 {
              state.last_line = to;
            }
          }
          InvalidateKind::Insert => {
            if to <= state.current_line {
              state.current_line = from;
              if state.last_line != -1 {
                state.last_line += cnt;
              }
            } else if from <= state.current_line {
              state.current_line = from;
              if to <= state.last_line {
                state.last_line += cnt;
              }
              if to > state.last_line {
                state.last_line = to;
              }
            } else if state.last_line != -1 {
              state.last_line = to;
            }
          }
          InvalidateKind::Simple => {
            if from < state.current_line {
              state.current_line = from;
            }
            if state.last_line != -1 && to > state.last_line {
              state.last_line = to;
            }
          }
        }
      }
    }
    None => {
      // Everything is stale: bump the epoch instead of touching each
      // line. The scan restarts from the top even when a pass is already
      // in flight, and any partial measurement belongs to the old
      // geometry.
      state.update_epoch = state.update_epoch.wrapping_add(1);
      if state.update_epoch == 0 {
        state.update_epoch = 1;
      }
      state.partial = None;
      state.current_line = -1;
      state.last_line = -1;
    }
  }
}

/// Examine lines from the updater window, re-measuring stale ones, until
/// the window is drained or the work quantum runs out. Returns whether the
/// viewer's window is fully reconciled. `range` restricts the viewer to
/// `[lo, hi)` line numbers; lines outside it keep a zero height.
#[allow(clippy::too_many_arguments)]
pub fn update_line_metrics(
  tree: &mut BTree,
  ctx_tags: &crate::tag::TagSet,
  opts: &crate::opt::StoreOptions,
  styles: &mut StyleTable,
  width: usize,
  slot: usize,
  state: &mut MetricState,
  range: Option<(usize, usize)>,
  quantum: Option<usize>,
) -> bool {
  let total_usable = tree.line_count() - 1;
  if state.last_line == -1 {
    state.last_line = total_usable as isize;
  }

  let mut line_num = state.current_line;
  let mut skip_done_check = line_num == -1;
  if line_num == -1 {
    line_num = 0;
  }
  let mut count = 0usize;

  loop {
    if !skip_done_check
      && state.partial.is_none()
      && line_num == state.last_line
    {
      break;
    }
    skip_done_check = false;

    if (line_num as usize) < total_usable {
      let line = tree.find_line(line_num as usize);
      let outside = range.is_some_and(|(lo, hi)| {
        (line_num as usize) < lo || line_num as usize >= hi
      });
      if tree.line_pixel(slot, line).epoch != state.update_epoch {
        if outside {
          // Lines outside the viewer's restriction stay at zero height.
          tree.set_line_pixel_epoch(slot, line, state.update_epoch);
          tree.adjust_pixel_height(slot, line, 0, 0);
        } else {
          let (finished, display_lines) = update_one_line(
            tree,
            ctx_tags,
            opts,
            styles,
            width,
            slot,
            state,
            line,
            quantum.is_some(),
          );
          count += defaults::metrics::DLINE_COST * display_lines;
          if !finished {
            // Mid-way through a very long line; resume next tick.
            state.current_line = line_num;
            return false;
          }
        }
      }
    } else {
      // Never recompute the artificial last line.
      if state.last_line as usize >= total_usable {
        line_num = state.last_line;
        break;
      }
      line_num = 0;
      count += 1;
      if quantum.is_some_and(|q| count >= q) {
        break;
      }
      continue;
    }

    count += 1;
    if quantum.is_some_and(|q| count >= q) {
      line_num += 1;
      break;
    }
    line_num += 1;
  }

  state.current_line = line_num;
  let done = state.partial.is_none() && line_num >= state.last_line;
  trace!(
    "metric pass: slot {slot} at line {line_num}/{}, done {done}",
    state.last_line
  );
  done
}

// Re-measure one logical line (plus lines merged into it), writing the
// height through to the ancestor counters. With `partial_ok`, long lines
// yield after a batch of display lines and save their progress.
#[allow(clippy::too_many_arguments)]
fn update_one_line(
  tree: &mut BTree,
  tags: &crate::tag::TagSet,
  opts: &crate::opt::StoreOptions,
  styles: &mut StyleTable,
  width: usize,
  slot: usize,
  state: &mut MetricState,
  line: LineId,
  partial_ok: bool,
) -> (bool, usize) {
  let (mut idx, mut pixel_height) = match state.partial {
    Some(p)
      if p.epoch == tree.state_epoch() && p.index.line == line =>
    {
      (p.index, p.pixel_height)
    }
    _ => {
      state.partial = None;
      (Position::start_of(line), 0)
    }
  };

  // Measurement must start at a display-line boundary; when this line is
  // merged into an earlier one, that boundary lives on the earlier line.
  let (target_line, mut merged, display_lines, finished) = {
    let ctx = LayoutCtx {
      tree,
      tags,
      opts,
      width,
    };
    let start = layout::display_line_start(&ctx, styles, idx);
    idx = start;
    let target_line = idx.line;
    let mut merged = 0usize;
    let mut display_lines = 0usize;
    let finished;
    loop {
      let dl = layout::layout_display_line(&ctx, styles, idx);
      let h = dl.height;
      let bytes = dl.byte_count.max(1);
      merged += dl.logical_lines_merged;
      dl.release(styles);
      if h > 0 {
        pixel_height += h;
        display_lines += 1;
      }
      let next = motion::forward_bytes(tree, idx, bytes);
      if next == idx || next.byte == 0 {
        finished = true;
        break;
      }
      idx = next;
      if partial_ok
        && display_lines > defaults::metrics::MAX_PARTIAL_DLINES
        && merged == 0
      {
        finished = false;
        break;
      }
    }
    (target_line, merged, display_lines, finished)
  };

  if finished {
    state.partial = None;
    tree.set_line_pixel_epoch(slot, target_line, state.update_epoch);
    tree.adjust_pixel_height(slot, target_line, pixel_height, merged);
    let mut l = target_line;
    while merged > 0 {
      match tree.next_line(l) {
        Some(next) => {
          tree.set_line_pixel_epoch(slot, next, state.update_epoch);
          l = next;
        }
        None => break,
      }
      merged -= 1;
    }
  } else {
    tree.adjust_pixel_height(slot, target_line, pixel_height, 0);
    state.partial = Some(PartialMetric {
      epoch: tree.state_epoch(),
      index: idx,
      pixel_height,
    });
  }
  (finished, display_lines)
}
