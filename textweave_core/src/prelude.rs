//! Prelude.

// Re-export `coord`.
pub use crate::coord::*;
pub use crate::res::*;

// Re-export `ahash`;
pub use ahash::AHashMap as HashMap;
pub use ahash::AHashSet as HashSet;
pub use ahash::RandomState;

// Re-export `geo`;
pub use geo::{self, Point, Rect};
