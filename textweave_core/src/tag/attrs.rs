//! Display attributes carried by a tag.
//!
//! Every field is optional: `None` means the tag doesn't override that
//! attribute, and style resolution falls through to the next tag in
//! priority order and finally to the store defaults.

use crate::opt::{FontSpec, JustifyOption, TabArray, WrapOption};

use compact_str::CompactString;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAttrs {
  pub foreground: Option<CompactString>,
  pub background: Option<CompactString>,
  pub font: Option<FontSpec>,
  pub elide: Option<bool>,
  pub wrap: Option<WrapOption>,
  pub justify: Option<JustifyOption>,
  /// Left margin of the first display line of a logical line.
  pub lmargin1: Option<usize>,
  /// Left margin of wrapped continuation display lines.
  pub lmargin2: Option<usize>,
  pub rmargin: Option<usize>,
  pub spacing_above: Option<usize>,
  pub spacing_wrap: Option<usize>,
  pub spacing_below: Option<usize>,
  /// Baseline offset in pixels, positive raises.
  pub offset: Option<isize>,
  pub underline: Option<bool>,
  pub overstrike: Option<bool>,
  pub tabs: Option<TabArray>,
}

impl TagAttrs {
  /// Whether changing to/from these attributes can alter geometry (and so
  /// must invalidate cached line heights), as opposed to colour-only
  /// changes.
  pub fn affects_geometry(&self) -> bool {
    self.font.is_some()
      || self.elide.is_some()
      || self.wrap.is_some()
      || self.justify.is_some()
      || self.lmargin1.is_some()
      || self.lmargin2.is_some()
      || self.rmargin.is_some()
      || self.spacing_above.is_some()
      || self.spacing_wrap.is_some()
      || self.spacing_below.is_some()
      || self.offset.is_some()
      || self.tabs.is_some()
  }
}
