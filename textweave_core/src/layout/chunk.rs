//! Display chunks: one contiguous run within a display line sharing a
//! style and a segment source.

use crate::index::Position;
use crate::layout::style::Style;

use compact_str::CompactString;
use unicode_width::UnicodeWidthChar;

/// Columns a character occupies under the monospace measurer. Tabs get a
/// single placeholder column until tab-stop adjustment moves the chunks
/// that follow them.
pub fn char_cols(c: char) -> usize {
  match c {
    '\n' => 0,
    '\t' => 1,
    _ => c.width().unwrap_or(0),
  }
}

/// Pixel width of `text` in `font` columns.
pub fn text_width(font: &crate::opt::FontSpec, text: &str) -> i64 {
  text
    .chars()
    .map(|c| (char_cols(c) * font.char_width()) as i64)
    .sum()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
  /// A run of visible text (possibly ending in a tab).
  Text { text: CompactString },
  /// Invisible bytes hidden by elision.
  Elided,
  Window { name: CompactString },
  Image { name: CompactString },
}

#[derive(Debug, Clone)]
pub struct Chunk {
  pub style: Style,
  pub kind: ChunkKind,
  /// Index of the first byte this chunk covers.
  pub start: Position,
  pub x: i64,
  pub width: i64,
  pub num_bytes: usize,
  /// Byte offset within the chunk after which a word break is allowed;
  /// -1 when the chunk offers no break point.
  pub break_index: i64,
  pub min_ascent: i64,
  pub min_descent: i64,
  pub min_height: i64,
}

impl Chunk {
  pub fn is_text(&self) -> bool {
    matches!(self.kind, ChunkKind::Text { .. })
  }

  pub fn is_elided(&self) -> bool {
    matches!(self.kind, ChunkKind::Elided)
  }

  /// Pixel offset from the chunk's left edge to byte `byte` within it.
  pub fn measure_to(&self, byte: usize) -> i64 {
    match &self.kind {
      ChunkKind::Text { text } => {
        let cut = byte.min(text.len());
        text_width(&self.style.font, &text[..cut])
      }
      ChunkKind::Elided => 0,
      ChunkKind::Window { .. } | ChunkKind::Image { .. } => {
        if byte == 0 { 0 } else { self.width }
      }
    }
  }

  /// Byte offset within the chunk of the character at pixel `x` from the
  /// chunk's left edge.
  pub fn byte_at_x(&self, x: i64) -> usize {
    match &self.kind {
      ChunkKind::Text { text } => {
        let mut acc = 0;
        for (i, c) in text.char_indices() {
          let w = text_width(&self.style.font, &text[i..i + c.len_utf8()]);
          if x < acc + w {
            return i;
          }
          acc += w;
        }
        text.len()
      }
      ChunkKind::Elided => 0,
      ChunkKind::Window { .. } | ChunkKind::Image { .. } => 0,
    }
  }

  /// Bounding box `(x_offset, width)` of the character starting at byte
  /// `byte` within the chunk.
  pub fn char_bbox(&self, byte: usize) -> (i64, i64) {
    match &self.kind {
      ChunkKind::Text { text } => {
        let at = byte.min(text.len());
        let x = text_width(&self.style.font, &text[..at]);
        let w = text[at..]
          .chars()
          .next()
          .map(|c| (char_cols(c) * self.style.font.char_width()) as i64)
          .unwrap_or(0);
        (x, w)
      }
      ChunkKind::Elided => (0, 0),
      ChunkKind::Window { .. } | ChunkKind::Image { .. } => (0, self.width),
    }
  }
}
