//! Errors and results.

use compact_str::CompactString;

// anyhow {

/// [`anyhow::Error`]
pub type AnyError = anyhow::Error;

/// [`anyhow::Result`] with `T` if ok, [`AnyError`] if error.
pub type AnyResult<T> = anyhow::Result<T>;

// anyhow }

// thiserror {

/// All error codes surfaced by the text engine.
///
/// Edit operations never fail (out-of-range inputs are clamped); these
/// errors come from the index parser, tag lookups, option validation and
/// user callbacks run on sync notifications.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TheTextError {
  #[error("bad text index {0:?}")]
  BadIndex(CompactString),

  #[error("tag {0:?} isn't defined")]
  UnknownTag(CompactString),

  #[error("invalid value {value:?} for option {name:?}")]
  InvalidOption {
    name: CompactString,
    value: CompactString,
  },

  #[error("text doesn't contain any characters tagged with {0:?}")]
  NoSuchRange(CompactString),

  #[error("after-sync callback failed: {0}")]
  AfterSyncFailed(CompactString),
}

/// [`Result`] with `T` if ok, [`TheTextError`] if error.
pub type TheResult<T> = Result<T, TheTextError>;

// thiserror }
