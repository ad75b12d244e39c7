//! Viewport: top-of-view anchor, scroll state and coordinate mapping.
//!
//! Vertical positions mix two sources deliberately: whole-line offsets
//! come from the cached per-line pixel counters (kept honest by the async
//! updater), while positions inside one logical line are measured by
//! laying its display lines out on the spot.

use crate::index::motion;
use crate::index::{Position, compare};
use crate::layout::{self, DisplayLine};
use crate::prelude::*;
use crate::store::{TextStore, ViewerId};

use std::cmp::Ordering;

#[derive(Debug, Clone)]
/// Scroll state of one viewer.
pub struct View {
  /// Start index of the top display line.
  pub top: Position,
  /// Pixels of the top display line scrolled off above the viewport.
  pub pixel_offset: usize,
  /// Horizontal scroll offset in pixels.
  pub x_offset: i64,
  pub(crate) report_pending: bool,
  pub(crate) last_x: Option<(f64, f64)>,
  pub(crate) last_y: Option<(f64, f64)>,
}

impl View {
  pub fn new(top: Position) -> Self {
    Self {
      top,
      pixel_offset: 0,
      x_offset: 0,
      report_pending: false,
      last_x: None,
      last_y: None,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Units for `yview scroll` / `xview scroll`.
pub enum ScrollWhat {
  /// Display lines vertically, average character widths horizontally.
  Units,
  /// Viewport-sized steps.
  Pages,
  /// Raw pixels.
  Pixels,
}

impl TextStore {
  // Geometry helpers {

  // The display line containing `pos` plus the absolute pixel y of its
  // top edge. The caller releases the returned line's styles.
  pub(crate) fn dline_containing(
    &self,
    viewer: ViewerId,
    pos: Position,
  ) -> (DisplayLine, usize) {
    let ctx = self.layout_ctx(viewer);
    let chain = layout::chain_start(&self.tree, &self.tags, pos.line);
    let base = self.tree.pixels_to(viewer, chain);
    let mut acc = 0usize;
    let mut cur = Position::start_of(chain);
    loop {
      let dl = layout::layout_display_line(
        &ctx,
        &mut self.styles.borrow_mut(),
        cur,
      );
      let bytes = dl.byte_count.max(1);
      let next = motion::forward_bytes(&self.tree, cur, bytes);
      if next == cur || compare(&self.tree, pos, next) == Ordering::Less {
        return (dl, base + acc);
      }
      acc += dl.height;
      dl.release(&mut self.styles.borrow_mut());
      cur = next;
    }
  }

  // Absolute pixel y of the top of the display line containing `pos`.
  fn y_of_pos(&self, viewer: ViewerId, pos: Position) -> usize {
    let (dl, y) = self.dline_containing(viewer, pos);
    dl.release(&mut self.styles.borrow_mut());
    y
  }

  // Absolute pixel of the first visible row.
  fn top_pixel(&self, viewer: ViewerId) -> usize {
    let v = &self.viewers[viewer];
    self.y_of_pos(viewer, v.view.top) + v.view.pixel_offset
  }

  // Widest visible display line, for horizontal fractions.
  fn max_line_width(&self, viewer: ViewerId) -> i64 {
    let ctx = self.layout_ctx(viewer);
    let height = self.viewers[viewer].opts.height();
    let mut cur = self.viewers[viewer].view.top;
    let mut covered = 0usize;
    let mut max_w: i64 = 0;
    loop {
      let dl = layout::layout_display_line(
        &ctx,
        &mut self.styles.borrow_mut(),
        cur,
      );
      max_w = max_w.max(dl.length);
      covered += dl.height.max(1);
      let bytes = dl.byte_count.max(1);
      dl.release(&mut self.styles.borrow_mut());
      let next = motion::forward_bytes(&self.tree, cur, bytes);
      if next == cur || covered >= height {
        break;
      }
      if next.line == self.tree.last_line() && next.byte == 0 {
        break;
      }
      cur = next;
    }
    max_w.max(1)
  }

  // Geometry helpers }

  /// Number of non-empty display lines the whole text currently occupies.
  pub fn display_line_count(&self, viewer: ViewerId) -> usize {
    let ctx = self.layout_ctx(viewer);
    let last = self.tree.last_line();
    let mut cur = Position::start_of(self.tree.first_line());
    let mut count = 0;
    loop {
      if cur.line == last {
        break;
      }
      let dl = layout::layout_display_line(
        &ctx,
        &mut self.styles.borrow_mut(),
        cur,
      );
      if dl.height > 0 {
        count += 1;
      }
      let bytes = dl.byte_count.max(1);
      dl.release(&mut self.styles.borrow_mut());
      let next = motion::forward_bytes(&self.tree, cur, bytes);
      if next == cur {
        break;
      }
      cur = next;
    }
    count
  }

  // Scroll fractions {

  /// Vertical scroll fractions `(first, last)`. When the async updater is
  /// behind, the total under-reports and the fractions clamp to 1.
  pub fn yview_fractions(&self, viewer: ViewerId) -> (f64, f64) {
    let total = self.tree.total_pixels(viewer);
    if total == 0 {
      return (0.0, 1.0);
    }
    let top = self.top_pixel(viewer);
    let height = self.viewers[viewer].opts.height();
    let first = (top as f64 / total as f64).min(1.0);
    let last = ((top + height) as f64 / total as f64).min(1.0);
    (first, last)
  }

  /// Horizontal scroll fractions `(first, last)`.
  pub fn xview_fractions(&self, viewer: ViewerId) -> (f64, f64) {
    let width = self.viewers[viewer].opts.width() as i64;
    let max_w = self.max_line_width(viewer);
    if max_w <= width {
      return (0.0, 1.0);
    }
    let x = self.viewers[viewer].view.x_offset;
    let first = (x as f64 / max_w as f64).min(1.0);
    let last = (((x + width) as f64) / max_w as f64).min(1.0);
    (first, last)
  }

  // Scroll fractions }

  // Vertical scrolling {

  /// Make `pos` the top of the view.
  pub fn set_top(&mut self, viewer: ViewerId, pos: Position) {
    let start = {
      let ctx = self.layout_ctx(viewer);
      layout::display_line_start(&ctx, &mut self.styles.borrow_mut(), pos)
    };
    let v = &mut self.viewers[viewer].view;
    v.top = start;
    v.pixel_offset = 0;
    self.schedule_scroll_reports();
  }

  // Scroll so absolute pixel `pixel` is the first visible row.
  fn set_top_pixel(&mut self, viewer: ViewerId, pixel: usize) {
    let total = self.tree.total_pixels(viewer);
    let pixel = pixel.min(total.saturating_sub(1));
    let (line, rem) = self.tree.find_pixel_line(viewer, pixel);
    let (top, offset) = {
      let chain = layout::chain_start(&self.tree, &self.tags, line);
      let ctx = self.layout_ctx(viewer);
      let mut cur = Position::start_of(chain);
      let mut remain = rem;
      loop {
        let dl = layout::layout_display_line(
          &ctx,
          &mut self.styles.borrow_mut(),
          cur,
        );
        let h = dl.height;
        let bytes = dl.byte_count.max(1);
        dl.release(&mut self.styles.borrow_mut());
        let next = motion::forward_bytes(&self.tree, cur, bytes);
        if remain < h || next == cur || next.byte == 0 {
          break (cur, remain.min(h.saturating_sub(1)));
        }
        remain -= h;
        cur = next;
      }
    };
    let v = &mut self.viewers[viewer].view;
    v.top = top;
    v.pixel_offset = offset;
    self.schedule_scroll_reports();
  }

  /// `yview moveto f`: put the line containing `⌊f·totalPixels⌋` on top.
  pub fn yview_moveto(&mut self, viewer: ViewerId, fraction: f64) {
    let total = self.tree.total_pixels(viewer) as f64;
    let pixel = (fraction.clamp(0.0, 1.0) * total) as usize;
    self.set_top_pixel(viewer, pixel);
  }

  /// `yview scroll n what`.
  pub fn yview_scroll(&mut self, viewer: ViewerId, n: i64, what: ScrollWhat) {
    match what {
      ScrollWhat::Units => {
        let top = self.viewers[viewer].view.top;
        let start = {
          let ctx = self.layout_ctx(viewer);
          let new_top = layout::move_display_lines(
            &ctx,
            &mut self.styles.borrow_mut(),
            top,
            n,
          );
          layout::display_line_start(
            &ctx,
            &mut self.styles.borrow_mut(),
            new_top,
          )
        };
        let v = &mut self.viewers[viewer].view;
        v.top = start;
        v.pixel_offset = 0;
        self.schedule_scroll_reports();
      }
      ScrollWhat::Pages => {
        let page = self.viewers[viewer].opts.height() as i64;
        let target = self.top_pixel(viewer) as i64 + n * page;
        self.set_top_pixel(viewer, target.max(0) as usize);
      }
      ScrollWhat::Pixels => {
        let target = self.top_pixel(viewer) as i64 + n;
        self.set_top_pixel(viewer, target.max(0) as usize);
      }
    }
  }

  /// Scroll minimally so `pos` is visible; jump to centre it when it is
  /// far off screen.
  pub fn see_at(&mut self, viewer: ViewerId, pos: Position) {
    let (dl, dl_y) = self.dline_containing(viewer, pos);
    let dl_h = dl.height;
    let x_in_line = layout::dline_x_of(&dl, &self.tree, pos);
    dl.release(&mut self.styles.borrow_mut());

    let height = self.viewers[viewer].opts.height();
    let top = self.top_pixel(viewer);
    if dl_y < top {
      if top - dl_y > height {
        self.center_pixel(viewer, dl_y, dl_h);
      } else {
        self.set_top_pixel(viewer, dl_y);
      }
    } else if dl_y + dl_h > top + height {
      if dl_y + dl_h - (top + height) > height {
        self.center_pixel(viewer, dl_y, dl_h);
      } else {
        self.set_top_pixel(
          viewer,
          (dl_y + dl_h).saturating_sub(height),
        );
      }
    }

    // Bring the character inside horizontally as well.
    let width = self.viewers[viewer].opts.width() as i64;
    let v = &mut self.viewers[viewer].view;
    if x_in_line < v.x_offset || x_in_line >= v.x_offset + width {
      v.x_offset = (x_in_line - width / 2).max(0);
      self.schedule_scroll_reports();
    }
  }

  pub fn see(&mut self, viewer: ViewerId, index: &str) -> TheResult<()> {
    let pos = self.parse_index(viewer, index)?;
    self.see_at(viewer, pos);
    Ok(())
  }

  fn center_pixel(&mut self, viewer: ViewerId, y: usize, h: usize) {
    let height = self.viewers[viewer].opts.height();
    let lead = height.saturating_sub(h) / 2;
    self.set_top_pixel(viewer, y.saturating_sub(lead));
  }

  // Vertical scrolling }

  // Horizontal scrolling {

  pub fn xview_moveto(&mut self, viewer: ViewerId, fraction: f64) {
    let max_w = self.max_line_width(viewer);
    let v = &mut self.viewers[viewer].view;
    v.x_offset =
      ((fraction.clamp(0.0, 1.0) * max_w as f64) as i64).max(0);
    self.schedule_scroll_reports();
  }

  pub fn xview_scroll(&mut self, viewer: ViewerId, n: i64, what: ScrollWhat) {
    let char_width = self.opts.font().char_width() as i64;
    let width = self.viewers[viewer].opts.width() as i64;
    let delta = match what {
      ScrollWhat::Units => n * char_width,
      ScrollWhat::Pages => n * (width - 2 * char_width).max(char_width),
      ScrollWhat::Pixels => n,
    };
    let v = &mut self.viewers[viewer].view;
    v.x_offset = (v.x_offset + delta).max(0);
    self.schedule_scroll_reports();
  }

  // Horizontal scrolling }

  // Coordinate mapping {

  /// Index of the character under viewport pixel `(x, y)`. The flag is
  /// true when the pixel was outside the text area and the result is only
  /// the nearest index.
  pub fn pixel_to_index(
    &self,
    viewer: ViewerId,
    x: i64,
    y: i64,
  ) -> (Position, bool) {
    let height = self.viewers[viewer].opts.height() as i64;
    let width = self.viewers[viewer].opts.width() as i64;
    let mut nearby = false;

    let mut yy = y;
    if yy < 0 {
      yy = 0;
      nearby = true;
    }
    if yy >= height {
      yy = height - 1;
      nearby = true;
    }
    let mut xx = x;
    if xx < 0 {
      xx = 0;
      nearby = true;
    }
    if xx >= width {
      xx = width - 1;
      nearby = true;
    }

    let abs = self.top_pixel(viewer) + yy as usize;
    let (line, rem) = self.tree.find_pixel_line(viewer, abs);
    let chain = layout::chain_start(&self.tree, &self.tags, line);
    let ctx = self.layout_ctx(viewer);
    let mut cur = Position::start_of(chain);
    let mut remain = rem;
    loop {
      let dl = layout::layout_display_line(
        &ctx,
        &mut self.styles.borrow_mut(),
        cur,
      );
      let h = dl.height;
      let bytes = dl.byte_count.max(1);
      let next = motion::forward_bytes(&self.tree, cur, bytes);
      if remain < h.max(1) || next == cur || next.byte == 0 {
        let pos = layout::dline_index_of_x(
          &dl,
          &self.tree,
          xx + self.viewers[viewer].view.x_offset,
        );
        dl.release(&mut self.styles.borrow_mut());
        return (pos, nearby);
      }
      dl.release(&mut self.styles.borrow_mut());
      remain -= h;
      cur = next;
    }
  }

  /// Bounding box `(x, y, width, height)` of the character at `index`, in
  /// viewport coordinates; `None` when it is off screen.
  pub fn bbox(
    &self,
    viewer: ViewerId,
    index: &str,
  ) -> TheResult<Option<(i64, i64, i64, i64)>> {
    let pos = self.parse_index(viewer, index)?;
    let (dl, dl_y) = self.dline_containing(viewer, pos);
    let top = self.top_pixel(viewer);
    let height = self.viewers[viewer].opts.height();
    if dl_y + dl.height <= top || dl_y >= top + height {
      dl.release(&mut self.styles.borrow_mut());
      return Ok(None);
    }

    let mut found = None;
    for c in &dl.chunks {
      if c.is_elided() || c.num_bytes == 0 {
        continue;
      }
      let end = motion::forward_bytes(&self.tree, c.start, c.num_bytes);
      if compare(&self.tree, pos, c.start) != Ordering::Less
        && compare(&self.tree, pos, end) == Ordering::Less
      {
        let off = motion::count_bytes(&self.tree, c.start, pos);
        let (cx, cw) = c.char_bbox(off);
        found = Some((
          c.x + cx - self.viewers[viewer].view.x_offset,
          dl_y as i64 - top as i64,
          cw,
          dl.height as i64,
        ));
        break;
      }
    }
    dl.release(&mut self.styles.borrow_mut());
    Ok(found)
  }

  /// Geometry `(x, y, width, height, baseline)` of the display line
  /// holding `index`; `None` when it is off screen.
  pub fn dline_info(
    &self,
    viewer: ViewerId,
    index: &str,
  ) -> TheResult<Option<(i64, i64, i64, i64, i64)>> {
    let pos = self.parse_index(viewer, index)?;
    let (dl, dl_y) = self.dline_containing(viewer, pos);
    let top = self.top_pixel(viewer);
    let height = self.viewers[viewer].opts.height();
    let visible = dl_y + dl.height > top && dl_y < top + height;
    let info = visible.then(|| {
      let x0 = dl.chunks.first().map(|c| c.x).unwrap_or(0);
      (
        x0 - self.viewers[viewer].view.x_offset,
        dl_y as i64 - top as i64,
        dl.length,
        dl.height as i64,
        dl.baseline,
      )
    });
    dl.release(&mut self.styles.borrow_mut());
    Ok(info)
  }

  // Coordinate mapping }
}
