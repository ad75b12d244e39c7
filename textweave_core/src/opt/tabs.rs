//! Tab stop options for display-line layout.

#[derive(
  Debug,
  Copy,
  Clone,
  PartialEq,
  Eq,
  Hash,
  strum_macros::Display,
  strum_macros::EnumString,
)]
/// How text after a tab aligns to the tab stop.
pub enum TabAlignOption {
  #[strum(serialize = "left")]
  /// Text starts at the stop.
  Left,

  #[strum(serialize = "right")]
  /// Text ends at the stop.
  Right,

  #[strum(serialize = "center")]
  /// Text is centred on the stop.
  Center,

  #[strum(serialize = "numeric")]
  /// The first decimal separator sits on the stop.
  Numeric,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// One explicit tab stop at a pixel position.
pub struct TabStop {
  pub pos: usize,
  pub align: TabAlignOption,
}

impl TabStop {
  pub fn new(pos: usize, align: TabAlignOption) -> Self {
    Self { pos, align }
  }

  pub fn left(pos: usize) -> Self {
    Self::new(pos, TabAlignOption::Left)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
/// An ordered array of explicit tab stops.
///
/// Past the last explicit stop, stops continue at the same interval as the
/// gap between the last two stops (or the default tab interval when fewer
/// than two are given).
pub struct TabArray {
  stops: Vec<TabStop>,
}

impl TabArray {
  pub fn new(stops: Vec<TabStop>) -> Self {
    Self { stops }
  }

  pub fn is_empty(&self) -> bool {
    self.stops.is_empty()
  }

  pub fn stops(&self) -> &[TabStop] {
    &self.stops
  }

  /// The stop governing tab number `index` (0-based), given the fallback
  /// interval in pixels used beyond the explicit stops.
  pub fn stop_at(&self, index: usize, default_interval: usize) -> TabStop {
    if index < self.stops.len() {
      return self.stops[index];
    }
    let interval = default_interval.max(1);
    match self.stops.len() {
      0 => TabStop::new((index + 1) * interval, TabAlignOption::Left),
      n => {
        let last = self.stops[n - 1];
        let gap = if n >= 2 {
          last.pos.saturating_sub(self.stops[n - 2].pos).max(1)
        } else {
          interval
        };
        TabStop::new(last.pos + (index + 1 - n) * gap, last.align)
      }
    }
  }
}
