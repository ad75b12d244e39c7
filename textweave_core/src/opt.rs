//! Global options for the text store and per-viewer options.

use crate::defaults;
use crate::prelude::*;

use compact_str::ToCompactString;

pub mod justify;
pub mod tabs;
pub mod wrap;

#[cfg(test)]
mod justify_tests;
#[cfg(test)]
mod wrap_tests;

pub use justify::JustifyOption;
pub use tabs::{TabAlignOption, TabArray, TabStop};
pub use wrap::WrapOption;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Monospace font metrics used by the measurer.
///
/// A real host swaps these for queried font metrics; the engine only needs
/// the per-column advance and the vertical extents.
pub struct FontSpec {
  char_width: usize,
  ascent: usize,
  descent: usize,
}

impl FontSpec {
  pub fn new(char_width: usize, ascent: usize, descent: usize) -> Self {
    Self {
      char_width,
      ascent,
      descent,
    }
  }

  pub fn char_width(&self) -> usize {
    self.char_width
  }

  pub fn ascent(&self) -> usize {
    self.ascent
  }

  pub fn descent(&self) -> usize {
    self.descent
  }

  /// Natural line height, ascent plus descent.
  pub fn line_height(&self) -> usize {
    self.ascent + self.descent
  }
}

impl Default for FontSpec {
  fn default() -> Self {
    Self {
      char_width: defaults::font::CHAR_WIDTH,
      ascent: defaults::font::ASCENT,
      descent: defaults::font::DESCENT,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Display options shared by every viewer of one store.
///
/// Tag attributes override these per range during style resolution.
pub struct StoreOptions {
  font: FontSpec,
  wrap: WrapOption,
  justify: JustifyOption,
  tab_columns: usize,
  spacing_above: usize,
  spacing_wrap: usize,
  spacing_below: usize,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self::builder().build()
  }
}

impl StoreOptions {
  pub fn builder() -> StoreOptionsBuilder {
    StoreOptionsBuilder::default()
  }

  pub fn font(&self) -> FontSpec {
    self.font
  }

  pub fn set_font(&mut self, value: FontSpec) {
    self.font = value;
  }

  pub fn wrap(&self) -> WrapOption {
    self.wrap
  }

  pub fn set_wrap(&mut self, value: WrapOption) {
    self.wrap = value;
  }

  pub fn justify(&self) -> JustifyOption {
    self.justify
  }

  pub fn set_justify(&mut self, value: JustifyOption) {
    self.justify = value;
  }

  pub fn tab_columns(&self) -> usize {
    self.tab_columns
  }

  /// Set the default tab interval in columns. Zero is rejected.
  pub fn set_tab_columns(&mut self, value: usize) -> TheResult<()> {
    if value == 0 {
      return Err(TheTextError::InvalidOption {
        name: "tab_columns".into(),
        value: value.to_compact_string(),
      });
    }
    self.tab_columns = value;
    Ok(())
  }

  /// Extra pixels above the first display line of a logical line.
  pub fn spacing_above(&self) -> usize {
    self.spacing_above
  }

  pub fn set_spacing_above(&mut self, value: usize) {
    self.spacing_above = value;
  }

  /// Extra pixels between wrapped display lines.
  pub fn spacing_wrap(&self) -> usize {
    self.spacing_wrap
  }

  pub fn set_spacing_wrap(&mut self, value: usize) {
    self.spacing_wrap = value;
  }

  /// Extra pixels below the last display line of a logical line.
  pub fn spacing_below(&self) -> usize {
    self.spacing_below
  }

  pub fn set_spacing_below(&mut self, value: usize) {
    self.spacing_below = value;
  }
}

#[derive(Debug, Clone)]
/// Global store options builder.
pub struct StoreOptionsBuilder {
  font: FontSpec,
  wrap: WrapOption,
  justify: JustifyOption,
  tab_columns: usize,
  spacing_above: usize,
  spacing_wrap: usize,
  spacing_below: usize,
}

impl StoreOptionsBuilder {
  pub fn font(&mut self, value: FontSpec) -> &mut Self {
    self.font = value;
    self
  }

  pub fn wrap(&mut self, value: WrapOption) -> &mut Self {
    self.wrap = value;
    self
  }

  pub fn justify(&mut self, value: JustifyOption) -> &mut Self {
    self.justify = value;
    self
  }

  pub fn tab_columns(&mut self, value: usize) -> &mut Self {
    self.tab_columns = value;
    self
  }

  pub fn spacing_above(&mut self, value: usize) -> &mut Self {
    self.spacing_above = value;
    self
  }

  pub fn spacing_wrap(&mut self, value: usize) -> &mut Self {
    self.spacing_wrap = value;
    self
  }

  pub fn spacing_below(&mut self, value: usize) -> &mut Self {
    self.spacing_below = value;
    self
  }

  pub fn build(&self) -> StoreOptions {
    StoreOptions {
      font: self.font,
      wrap: self.wrap,
      justify: self.justify,
      tab_columns: self.tab_columns,
      spacing_above: self.spacing_above,
      spacing_wrap: self.spacing_wrap,
      spacing_below: self.spacing_below,
    }
  }
}

impl Default for StoreOptionsBuilder {
  fn default() -> Self {
    StoreOptionsBuilder {
      font: FontSpec::default(),
      wrap: WrapOption::Char,
      justify: JustifyOption::Left,
      tab_columns: defaults::opt::TAB_COLUMNS,
      spacing_above: 0,
      spacing_wrap: 0,
      spacing_below: 0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-viewer options: the viewport geometry and the default line height
/// cached for lines the async updater hasn't laid out yet.
pub struct ViewOptions {
  width: usize,
  height: usize,
  default_line_height: usize,
}

impl Default for ViewOptions {
  fn default() -> Self {
    Self::builder().build()
  }
}

impl ViewOptions {
  pub fn builder() -> ViewOptionsBuilder {
    ViewOptionsBuilder::default()
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn set_width(&mut self, value: usize) {
    self.width = value;
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn set_height(&mut self, value: usize) {
    self.height = value;
  }

  pub fn default_line_height(&self) -> usize {
    self.default_line_height
  }
}

#[derive(Debug, Clone)]
/// Per-viewer options builder.
pub struct ViewOptionsBuilder {
  width: usize,
  height: usize,
  default_line_height: usize,
}

impl ViewOptionsBuilder {
  pub fn width(&mut self, value: usize) -> &mut Self {
    self.width = value;
    self
  }

  pub fn height(&mut self, value: usize) -> &mut Self {
    self.height = value;
    self
  }

  pub fn default_line_height(&mut self, value: usize) -> &mut Self {
    self.default_line_height = value;
    self
  }

  pub fn build(&self) -> ViewOptions {
    ViewOptions {
      width: self.width,
      height: self.height,
      default_line_height: self.default_line_height,
    }
  }
}

impl Default for ViewOptionsBuilder {
  fn default() -> Self {
    ViewOptionsBuilder {
      width: defaults::view::WIDTH,
      height: defaults::view::HEIGHT,
      default_line_height: defaults::view::LINE_HEIGHT,
    }
  }
}
