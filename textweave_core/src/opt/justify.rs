//! The "justify" option for display-line layout.

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
pub enum JustifyOption {
  #[strum(serialize = "left")]
  Left,

  #[strum(serialize = "center")]
  Center,

  #[strum(serialize = "right")]
  Right,
}
