//! Resolved display styles, hash-consed and reference counted.
//!
//! A style is the full set of display attributes in force at an index:
//! the store defaults overridden by every active tag in priority order.
//! Identical resolutions share one interned entry; layout takes a
//! reference per chunk and releases it when the display line dies, so the
//! table holds exactly the styles of live display lines.

use crate::opt::{FontSpec, JustifyOption, StoreOptions, TabArray, WrapOption};
use crate::prelude::*;
use crate::tag::{Tag, TagAttrs};

use compact_str::CompactString;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Fully resolved display attributes.
pub struct StyleValues {
  pub fg: Option<CompactString>,
  pub bg: Option<CompactString>,
  pub font: FontSpec,
  pub justify: JustifyOption,
  pub lmargin1: usize,
  pub lmargin2: usize,
  pub rmargin: usize,
  pub spacing_above: usize,
  pub spacing_wrap: usize,
  pub spacing_below: usize,
  pub offset: isize,
  pub underline: bool,
  pub overstrike: bool,
  pub tabs: TabArray,
  pub wrap: WrapOption,
  pub elide: bool,
}

impl StyleValues {
  /// The store defaults with no tag overrides.
  pub fn base(opts: &StoreOptions) -> Self {
    Self {
      fg: None,
      bg: None,
      font: opts.font(),
      justify: opts.justify(),
      lmargin1: 0,
      lmargin2: 0,
      rmargin: 0,
      spacing_above: opts.spacing_above(),
      spacing_wrap: opts.spacing_wrap(),
      spacing_below: opts.spacing_below(),
      offset: 0,
      underline: false,
      overstrike: false,
      tabs: TabArray::default(),
      wrap: opts.wrap(),
      elide: false,
    }
  }

  fn fold(&mut self, attrs: &TagAttrs) {
    if let Some(v) = &attrs.foreground {
      self.fg = Some(v.clone());
    }
    if let Some(v) = &attrs.background {
      self.bg = Some(v.clone());
    }
    if let Some(v) = attrs.font {
      self.font = v;
    }
    if let Some(v) = attrs.justify {
      self.justify = v;
    }
    if let Some(v) = attrs.lmargin1 {
      self.lmargin1 = v;
    }
    if let Some(v) = attrs.lmargin2 {
      self.lmargin2 = v;
    }
    if let Some(v) = attrs.rmargin {
      self.rmargin = v;
    }
    if let Some(v) = attrs.spacing_above {
      self.spacing_above = v;
    }
    if let Some(v) = attrs.spacing_wrap {
      self.spacing_wrap = v;
    }
    if let Some(v) = attrs.spacing_below {
      self.spacing_below = v;
    }
    if let Some(v) = attrs.offset {
      self.offset = v;
    }
    if let Some(v) = attrs.underline {
      self.underline = v;
    }
    if let Some(v) = attrs.overstrike {
      self.overstrike = v;
    }
    if let Some(v) = &attrs.tabs {
      self.tabs = v.clone();
    }
    if let Some(v) = attrs.wrap {
      self.wrap = v;
    }
    if let Some(v) = attrs.elide {
      self.elide = v;
    }
  }

  /// Resolve the style for a set of active tags, lowest priority first.
  pub fn resolve<'a, I>(opts: &StoreOptions, tags: I) -> Self
  where
    I: IntoIterator<Item = &'a Tag>,
  {
    let mut values = Self::base(opts);
    for tag in tags {
      values.fold(&tag.attrs);
    }
    values
  }
}

/// An interned style handle.
pub type Style = Rc<StyleValues>;

#[derive(Debug)]
struct StyleEntry {
  style: Style,
  refs: usize,
}

#[derive(Debug, Default)]
/// The shared style table for one store.
pub struct StyleTable {
  entries: HashMap<StyleValues, StyleEntry>,
}

impl StyleTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of distinct interned styles.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Intern `values`, taking a reference on the entry.
  pub fn get(&mut self, values: StyleValues) -> Style {
    if let Some(entry) = self.entries.get_mut(&values) {
      entry.refs += 1;
      return entry.style.clone();
    }
    let style: Style = Rc::new(values.clone());
    self.entries.insert(
      values,
      StyleEntry {
        style: style.clone(),
        refs: 1,
      },
    );
    style
  }

  /// Release one reference on `style`, dropping the entry at zero.
  pub fn release(&mut self, style: &Style) {
    let remove = match self.entries.get_mut(style.as_ref()) {
      Some(entry) => {
        entry.refs -= 1;
        entry.refs == 0
      }
      None => false,
    };
    if remove {
      self.entries.remove(style.as_ref());
    }
  }
}
