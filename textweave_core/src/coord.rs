//! Pixel coordinate system.
//!
//! The text engine works in a screen-like coordinate system: the origin
//! `(0,0)` is the top-left corner of the viewport, the X-axis grows to the
//! right and the Y-axis grows downwards:
//!
//! ```text
//!   (0,0)------------------(width,0)--------X
//!     |                         |
//!     |  Viewport               |
//!     |                         |
//!     |                         |
//!   (0,height)-------------(width,height)
//!     |
//!     Y
//! ```
//!
//! All layout and viewport arithmetic below uses these conventions. Widths,
//! heights and scroll offsets are plain pixel counts.

use geo::Point;
use geo::Rect;

// Positions {

/// Position that uses [`isize`] as internal type.
pub type IPos = Point<isize>;

/// Position that uses [`usize`] as internal type.
pub type UPos = Point<usize>;

// Positions }

// Rectangles {

/// Rectangle that uses [`isize`] as internal type.
pub type IRect = Rect<isize>;

/// Rectangle that uses [`usize`] as internal type.
pub type URect = Rect<usize>;

// Rectangles }

// Size {

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
/// Generic rectangle size.
pub struct Size<
  T: Copy
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + std::fmt::Debug
    + num_traits::Num
    + num_traits::NumCast,
> {
  width: T,
  height: T,
}

impl<T> Size<T>
where
  T: Copy
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + std::fmt::Debug
    + num_traits::Num
    + num_traits::NumCast,
{
  /// Make size from width and height.
  pub fn new(width: T, height: T) -> Self {
    Size { width, height }
  }

  /// Get width.
  pub fn width(&self) -> T {
    self.width
  }

  /// Get height.
  pub fn height(&self) -> T {
    self.height
  }
}

impl<T> From<Rect<T>> for Size<T>
where
  T: Copy
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + std::fmt::Debug
    + num_traits::Num
    + num_traits::NumCast
    + geo::CoordNum,
{
  fn from(rect: Rect<T>) -> Size<T> {
    Size::new(rect.width(), rect.height())
  }
}

/// Size that uses [`usize`] as internal type.
pub type USize = Size<usize>;

/// Size that uses [`isize`] as internal type.
pub type ISize = Size<isize>;

// Size }
