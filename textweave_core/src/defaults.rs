//! Default option values and engine constants.

pub mod font {
  /// Default per-column glyph advance, in pixels.
  pub const CHAR_WIDTH: usize = 8;
  /// Default font ascent, in pixels.
  pub const ASCENT: usize = 12;
  /// Default font descent, in pixels.
  pub const DESCENT: usize = 4;
}

pub mod opt {
  /// Default tab interval, in columns.
  pub const TAB_COLUMNS: usize = 8;
}

pub mod view {
  /// Default viewport width in pixels.
  pub const WIDTH: usize = 640;
  /// Default viewport height in pixels.
  pub const HEIGHT: usize = 480;
  /// Default cached height for lines the async updater hasn't visited.
  pub const LINE_HEIGHT: usize = super::font::ASCENT + super::font::DESCENT;
}

pub mod metrics {
  /// Work units consumed per updater tick.
  pub const TICK_QUANTUM: usize = 256;
  /// Work units charged per display line laid out.
  pub const DLINE_COST: usize = 8;
  /// Display lines of one long logical line per tick before yielding.
  pub const MAX_PARTIAL_DLINES: usize = 50;
  /// Updater timer period, in virtual milliseconds.
  pub const TICK_MS: u64 = 1;
  /// Scroll-fraction reporter period, in virtual milliseconds.
  pub const SCROLL_REPORT_MS: u64 = 200;
}
