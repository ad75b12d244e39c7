//! The "wrap" option for display-line layout.

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
pub enum WrapOption {
  #[strum(serialize = "none")]
  /// Never wrap, horizontal scrolling required.
  None,

  #[strum(serialize = "char")]
  /// Break at any code-point boundary.
  Char,

  #[strum(serialize = "word")]
  /// Break only at word boundaries.
  Word,
}
