use super::*;

use crate::opt::{
  FontSpec, JustifyOption, StoreOptions, TabAlignOption, TabArray, TabStop,
  WrapOption,
};
use crate::store::TextStore;
use crate::tag::TagAttrs;
use crate::test::log::init as test_log_init;

// 10px per column, 12+4 = 16px line height, 100px wide viewport: ten
// columns per display line.
fn make_store(wrap: WrapOption, text: &str) -> TextStore {
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .wrap(wrap)
    .build();
  let mut store = TextStore::new(opts);
  store.add_viewer(
    crate::opt::ViewOptions::builder()
      .width(100)
      .height(160)
      .default_line_height(16)
      .build(),
  );
  store.insert("1.0", text).unwrap();
  store
}

fn layout_at(store: &TextStore, index: &str) -> DisplayLine {
  let pos = store.parse_index(0, index).unwrap();
  let ctx = store.layout_ctx(0);
  layout_display_line(&ctx, &mut store.styles.borrow_mut(), pos)
}

fn release(store: &TextStore, dl: DisplayLine) {
  dl.release(&mut store.styles.borrow_mut());
}

#[test]
fn single_line1() {
  test_log_init();
  let store = make_store(WrapOption::Char, "hello");
  let dl = layout_at(&store, "1.0");
  assert_eq!(dl.byte_count, 6);
  assert_eq!(dl.height, 16);
  assert_eq!(dl.baseline, 12);
  assert_eq!(dl.length, 50);
  assert_eq!(dl.logical_lines_merged, 0);
  release(&store, dl);
}

#[test]
fn char_wrap1() {
  let store = make_store(WrapOption::Char, "abcdefghijklmno");
  let dl = layout_at(&store, "1.0");
  // Ten columns fit; the line breaks mid-word.
  assert_eq!(dl.byte_count, 10);
  assert_eq!(dl.length, 100);
  release(&store, dl);
  let dl = layout_at(&store, "1.10");
  assert_eq!(dl.byte_count, 6);
  release(&store, dl);
  assert_eq!(store.display_line_count(0), 2);
}

#[test]
fn word_wrap_breaks_at_space1() {
  test_log_init();
  let store = make_store(WrapOption::Word, "hello world foo");
  let dl = layout_at(&store, "1.0");
  // The break lands after "hello ", the trailing space staying on this
  // line.
  assert_eq!(dl.byte_count, 6);
  release(&store, dl);
  let dl = layout_at(&store, "1.6");
  assert_eq!(dl.byte_count, 10);
  release(&store, dl);
}

#[test]
fn word_wrap_absorbs_trailing_spaces1() {
  let store = make_store(WrapOption::Word, "abcdefghij   klm");
  let dl = layout_at(&store, "1.0");
  // The ten fitting columns are followed by spaces, which are absorbed so
  // the continuation starts at "klm".
  assert_eq!(dl.byte_count, 13);
  release(&store, dl);
  let dl = layout_at(&store, "1.13");
  assert_eq!(dl.byte_count, 4);
  release(&store, dl);
}

#[test]
fn no_wrap1() {
  let store = make_store(WrapOption::None, "abcdefghijklmnopqrst");
  let dl = layout_at(&store, "1.0");
  assert_eq!(dl.byte_count, 21);
  assert_eq!(dl.length, 200);
  release(&store, dl);
  assert_eq!(store.display_line_count(0), 1);
}

#[test]
fn default_tab_stop1() {
  test_log_init();
  let store = make_store(WrapOption::None, "ab\tcd");
  let dl = layout_at(&store, "1.0");
  // Default stops sit every 8 columns = 80px; text after the tab starts
  // there.
  assert_eq!(dl.chunks.len(), 2);
  assert_eq!(dl.chunks[1].x, 80);
  assert_eq!(dl.length, 100);
  release(&store, dl);
}

#[test]
fn right_aligned_tab1() {
  let mut store = make_store(WrapOption::None, "ab\tcd\n");
  let mut attrs = TagAttrs::default();
  attrs.tabs = Some(TabArray::new(vec![TabStop::new(
    80,
    TabAlignOption::Right,
  )]));
  store.tag_configure("tt", attrs);
  store.tag_add("tt", "1.0", "2.0").unwrap();
  let dl = layout_at(&store, "1.0");
  // "cd" is 20px wide and ends on the 80px stop.
  assert_eq!(dl.chunks[1].x, 60);
  release(&store, dl);
}

#[test]
fn justify_right1() {
  let mut store = make_store(WrapOption::Char, "hi\n");
  let mut attrs = TagAttrs::default();
  attrs.justify = Some(JustifyOption::Right);
  store.tag_configure("r", attrs);
  store.tag_add("r", "1.0", "2.0").unwrap();
  let dl = layout_at(&store, "1.0");
  assert_eq!(dl.chunks[0].x, 80);
  assert_eq!(dl.length, 100);
  release(&store, dl);
}

#[test]
fn margins_and_spacing1() {
  let mut store = make_store(WrapOption::Char, "hi\n");
  let mut attrs = TagAttrs::default();
  attrs.lmargin1 = Some(30);
  attrs.spacing_above = Some(5);
  attrs.spacing_below = Some(3);
  store.tag_configure("m", attrs);
  store.tag_add("m", "1.0", "2.0").unwrap();
  let dl = layout_at(&store, "1.0");
  assert_eq!(dl.chunks[0].x, 30);
  assert_eq!(dl.space_above, 5);
  assert_eq!(dl.space_below, 3);
  assert_eq!(dl.height, 16 + 5 + 3);
  assert_eq!(dl.baseline, 12 + 5);
  release(&store, dl);
}

#[test]
fn fully_elided_line_has_zero_height1() {
  test_log_init();
  let mut store = make_store(WrapOption::Char, "abc\ndef\nghi");
  let mut attrs = TagAttrs::default();
  attrs.elide = Some(true);
  store.tag_configure("el", attrs);
  assert_eq!(store.display_line_count(0), 3);
  store.tag_add("el", "1.0", "2.0").unwrap();
  let dl = layout_at(&store, "1.0");
  assert_eq!(dl.height, 0);
  assert_eq!(dl.byte_count, 4);
  release(&store, dl);
  assert_eq!(store.display_line_count(0), 2);
}

#[test]
fn elided_newline_merges_lines1() {
  test_log_init();
  let mut store = make_store(WrapOption::Char, "abc\ndef\nghi");
  let mut attrs = TagAttrs::default();
  attrs.elide = Some(true);
  store.tag_configure("el", attrs);
  store.tag_add("el", "1.1", "2.0").unwrap();
  let dl = layout_at(&store, "1.0");
  // "a" is visible, "bc\n" hidden, and line 2 joins this display line.
  assert_eq!(dl.logical_lines_merged, 1);
  assert_eq!(dl.byte_count, 8);
  assert!(dl.chunks.iter().any(|c| c.is_elided()));
  release(&store, dl);
  assert_eq!(store.display_line_count(0), 2);
}

#[test]
fn style_table_drains1() {
  let store = make_store(WrapOption::Char, "plain text");
  assert!(store.styles.borrow().is_empty());
  let dl = layout_at(&store, "1.0");
  assert!(!store.styles.borrow().is_empty());
  release(&store, dl);
  assert!(store.styles.borrow().is_empty());
}

#[test]
fn style_resolution_priority1() {
  let mut store = make_store(WrapOption::Char, "x\n");
  let mut low = TagAttrs::default();
  low.foreground = Some("red".into());
  low.underline = Some(true);
  let mut high = TagAttrs::default();
  high.foreground = Some("blue".into());
  store.tag_configure("low", low);
  store.tag_configure("high", high);
  store.tag_add("low", "1.0", "1.1").unwrap();
  store.tag_add("high", "1.0", "1.1").unwrap();
  let dl = layout_at(&store, "1.0");
  // The higher-priority foreground wins; the lower underline survives.
  assert_eq!(dl.chunks[0].style.fg.as_deref(), Some("blue"));
  assert!(dl.chunks[0].style.underline);
  release(&store, dl);
}

#[test]
fn elide_flag_queries1() {
  let mut store = make_store(WrapOption::Char, "abc\ndef");
  let mut attrs = TagAttrs::default();
  attrs.elide = Some(true);
  store.tag_configure("el", attrs);
  store.tag_add("el", "1.1", "1.3").unwrap();
  assert!(!store.is_elided("1.0").unwrap());
  assert!(store.is_elided("1.1").unwrap());
  assert!(store.is_elided("1.2").unwrap());
  assert!(!store.is_elided("1.3").unwrap());
}
