use super::*;

use crate::opt::{FontSpec, StoreOptions, ViewOptions};
use crate::res::TheTextError;
use crate::test::log::init as test_log_init;

use std::cell::Cell;
use std::rc::Rc;

fn make_store() -> TextStore {
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .build();
  let mut store = TextStore::new(opts);
  store.add_viewer(
    ViewOptions::builder()
      .width(640)
      .height(480)
      .default_line_height(16)
      .build(),
  );
  store
}

fn sync_events(store: &mut TextStore) -> Vec<bool> {
  store
    .take_events()
    .into_iter()
    .filter_map(|e| match e {
      StoreEvent::ViewSync { in_sync, .. } => Some(in_sync),
      _ => None,
    })
    .collect()
}

#[test]
fn insert_across_lines1() {
  // Scenario 1: three text lines plus the dummy trailing line.
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abc\ndef\nghi").unwrap();
  store.check();
  assert_eq!(store.line_count(), 4);
  let end = store.parse_index(0, "end").unwrap();
  assert_eq!(store.format_index(end), "4.0");
  assert_eq!(
    store.get_string("1.0", "end-1c").unwrap(),
    "abc\ndef\nghi"
  );
  assert_eq!(store.get_string("1.0", "end").unwrap(), "abc\ndef\nghi\n");
}

#[test]
fn tag_range_and_priority1() {
  // Scenario 2.
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abc\ndef\nghi").unwrap();
  store.tag_create("t1");
  store.tag_create("t2");
  store.tag_add("t1", "1.0", "2.3").unwrap();
  store.tag_add("t2", "1.2", "3.0").unwrap();
  store.check();

  let names = store.tags_at("2.0").unwrap();
  assert_eq!(names, vec!["t1", "t2"]);
  assert_eq!(
    store.tag_ranges("t1").unwrap(),
    vec![("1.0".to_string(), "2.3".to_string())]
  );
  assert_eq!(
    store.tag_nextrange("t2", "1.0", None).unwrap(),
    Some(("1.2".to_string(), "3.0".to_string()))
  );
  assert_eq!(store.tag_nextrange("t1", "1.1", None).unwrap(), None);
  assert_eq!(
    store.tag_prevrange("t2", "2.0", None).unwrap(),
    Some(("1.2".to_string(), "3.0".to_string()))
  );
}

#[test]
fn deletion_joins_lines1() {
  // Scenario 3: deleting the newline joins the tagged coordinates.
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abc\ndef\nghi").unwrap();
  store.tag_add("t1", "1.0", "2.3").unwrap();
  store.tag_add("t2", "1.2", "3.0").unwrap();
  let epoch_before = store.state_epoch();

  store.delete("1.3", "2.0").unwrap();
  store.check();
  assert_eq!(store.line_count(), 3);
  assert_eq!(store.get_string("1.0", "1.end").unwrap(), "abcdef");
  assert!(store.state_epoch() > epoch_before);

  assert_eq!(
    store.tag_ranges("t1").unwrap(),
    vec![("1.0".to_string(), "1.6".to_string())]
  );
  assert_eq!(
    store.tag_ranges("t2").unwrap(),
    vec![("1.2".to_string(), "2.0".to_string())]
  );
}

#[test]
fn toggle_cancellation1() {
  // Scenario 6: overlapping adds leave exactly two toggles.
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abcdefgh").unwrap();
  store.tag_add("t1", "1.0", "1.5").unwrap();
  store.tag_add("t1", "1.3", "1.8").unwrap();
  store.check();
  let id = store.tags.require("t1").unwrap();
  assert_eq!(store.tags.get(id).toggle_count, 2);
  assert_eq!(
    store.tag_ranges("t1").unwrap(),
    vec![("1.0".to_string(), "1.8".to_string())]
  );
}

#[test]
fn tag_add_remove_restores1() {
  // L2 at the public surface.
  let mut store = make_store();
  store.insert("1.0", "abc\ndef").unwrap();
  store.tag_add("t", "1.1", "2.2").unwrap();
  store.tag_remove("t", "1.1", "2.2").unwrap();
  store.check();
  assert_eq!(store.tag_ranges("t").unwrap(), vec![]);
  assert_eq!(store.tags_at("1.2").unwrap(), Vec::<String>::new());
}

#[test]
fn tag_delete_drops_toggles1() {
  let mut store = make_store();
  store.insert("1.0", "abc\ndef").unwrap();
  store.tag_add("t", "1.1", "2.2").unwrap();
  store.tag_delete("t").unwrap();
  store.check();
  assert!(matches!(
    store.tag_ranges("t"),
    Err(TheTextError::UnknownTag(_))
  ));
}

#[test]
fn elision_merges_display_lines1() {
  // Scenario 4, with the elided range covering the newline so the lines
  // actually merge.
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abc\ndef\nghi").unwrap();
  let mut attrs = crate::tag::TagAttrs::default();
  attrs.elide = Some(true);
  store.tag_configure("t1", attrs);

  let before = store.display_line_count(0);
  store.tag_add("t1", "1.0", "2.0").unwrap();
  assert_eq!(store.display_line_count(0), before - 1);

  let moved = store.parse_index(0, "1.0 +1 display lines").unwrap();
  assert_eq!(store.format_index(moved), "2.0");
}

#[test]
fn async_sync_event_fires_once1() {
  // Scenario 5: a large insert leaves the viewer out of sync until the
  // updater drains, then exactly one ViewSync(true) fires.
  test_log_init();
  let mut store = make_store();
  let mut text = String::new();
  for i in 0..10_000 {
    text.push_str(&format!("line {i}\n"));
  }
  store.insert("1.0", &text).unwrap();

  assert!(!store.in_sync(0));
  let events = sync_events(&mut store);
  assert_eq!(events.iter().filter(|s| !**s).count(), 1);
  assert!(!events.contains(&true));

  store.run_until_quiescent();
  assert!(store.in_sync(0));
  let events = sync_events(&mut store);
  assert_eq!(events, vec![true]);

  // Every usable line now carries a fresh epoch and its analytic height.
  let total = store.total_pixels(0);
  assert_eq!(total, 10_001 * 16);
  let epoch = store.viewers[0].metrics.update_epoch;
  for no in 0..(store.line_count() - 1) {
    let line = store.tree.find_line(no);
    let px = store.tree.line_pixel(0, line);
    assert_eq!(px.epoch, epoch, "line {no} epoch");
    assert_eq!(px.height, 16, "line {no} height");
  }

  // The scroll fraction equals the analytical value.
  let (first, last) = store.yview_fractions(0);
  assert_eq!(first, 0.0);
  assert_eq!(last, 480.0 / (10_001.0 * 16.0));
}

#[test]
fn edits_during_async_are_picked_up1() {
  let mut store = make_store();
  let mut text = String::new();
  for i in 0..2_000 {
    text.push_str(&format!("line {i}\n"));
  }
  store.insert("1.0", &text).unwrap();
  // A couple of ticks, then another edit mid-flight.
  store.advance(1);
  store.advance(1);
  assert!(!store.in_sync(0));
  store.insert("1.0", "zero\n").unwrap();
  store.run_until_quiescent();
  assert!(store.in_sync(0));
  assert_eq!(store.total_pixels(0), 2_002 * 16);
  store.check();
}

#[test]
fn after_sync_hooks1() {
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "some\ntext").unwrap();

  let ran = Rc::new(Cell::new(false));
  let flag = ran.clone();
  store.after_sync(
    0,
    Box::new(move || {
      flag.set(true);
      Ok(())
    }),
  );
  store.after_sync(0, Box::new(|| Err(anyhow::anyhow!("boom"))));
  assert!(!ran.get());

  store.run_until_quiescent();
  assert!(ran.get());
  let errors = store.take_background_errors();
  assert_eq!(errors.len(), 1);
  assert!(matches!(errors[0], TheTextError::AfterSyncFailed(_)));

  // Already in sync: the hook runs immediately.
  let ran2 = Rc::new(Cell::new(false));
  let flag2 = ran2.clone();
  store.after_sync(
    0,
    Box::new(move || {
      flag2.set(true);
      Ok(())
    }),
  );
  assert!(ran2.get());
}

#[test]
fn partial_long_line_progress1() {
  // One logical line wrapping hundreds of times forces the partial-save
  // path; the cached height keeps growing between ticks.
  test_log_init();
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .build();
  let mut store = TextStore::new(opts);
  store.add_viewer(
    ViewOptions::builder()
      .width(100)
      .height(160)
      .default_line_height(16)
      .build(),
  );
  let long = "x".repeat(10 * 200);
  store.insert("1.0", &long).unwrap();

  store.advance(1);
  let mid = store.total_pixels(0);
  assert!(store.viewers[0].metrics.partial.is_some());
  store.run_until_quiescent();
  let done = store.total_pixels(0);
  assert!(done > mid);
  // 200 wrapped display lines of 16px each; the newline rides on the
  // last one.
  assert_eq!(done, 200 * 16);
  store.check();
}

#[test]
fn geometry_change_mid_pass_rescans1() {
  // A geometry-affecting tag change landing while a metric pass is in
  // flight must force a full re-scan, not an early in-sync report.
  test_log_init();
  let mut store = make_store();
  let mut text = String::new();
  for i in 0..2_000 {
    text.push_str(&format!("line {i}\n"));
  }
  store.insert("1.0", &text).unwrap();
  store.advance(1);
  assert!(!store.in_sync(0));

  let mut attrs = crate::tag::TagAttrs::default();
  attrs.elide = Some(true);
  store.tag_configure("el", attrs);
  store.tag_add("el", "1.0", "2.0").unwrap();
  store.take_events();

  store.run_until_quiescent();
  assert!(store.in_sync(0));
  let events = sync_events(&mut store);
  assert_eq!(events, vec![true]);

  // The first line is hidden now; every other line keeps its height, and
  // every cached record carries the fresh epoch.
  assert_eq!(store.total_pixels(0), 2_000 * 16);
  let epoch = store.viewers[0].metrics.update_epoch;
  for no in 0..(store.line_count() - 1) {
    let line = store.tree.find_line(no);
    assert_eq!(store.tree.line_pixel(0, line).epoch, epoch, "line {no}");
  }
  store.check();
}

#[test]
fn resize_mid_partial_remeasures1() {
  // Resizing while a long line is half measured discards the partial
  // progress; the height is remeasured under the new width.
  test_log_init();
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .build();
  let mut store = TextStore::new(opts);
  store.add_viewer(
    ViewOptions::builder()
      .width(100)
      .height(160)
      .default_line_height(16)
      .build(),
  );
  let long = "x".repeat(10 * 200);
  store.insert("1.0", &long).unwrap();
  store.advance(1);
  assert!(store.viewers[0].metrics.partial.is_some());

  store.set_viewer_size(0, 200, 160);
  assert!(store.viewers[0].metrics.partial.is_none());
  store.take_events();

  store.run_until_quiescent();
  let events = sync_events(&mut store);
  assert_eq!(events, vec![true]);
  // 2000 characters at 20 columns per display line.
  assert_eq!(store.total_pixels(0), 100 * 16);
  store.check();
}

#[test]
fn viewer_lifecycle_backfill1() {
  let mut store = make_store();
  store.insert("1.0", "a\nb\nc").unwrap();
  let v1 = store.add_viewer(
    ViewOptions::builder()
      .width(320)
      .height(240)
      .default_line_height(20)
      .build(),
  );
  assert_eq!(v1, 1);
  store.run_until_quiescent();
  let t0 = store.total_pixels(0);
  let t1 = store.total_pixels(1);
  assert_eq!(t0, 3 * 16);
  assert_eq!(t1, 3 * 16);

  store.remove_viewer(0);
  // The second viewer back-filled into slot 0.
  assert_eq!(store.viewers.len(), 1);
  assert_eq!(store.total_pixels(0), t1);
  assert_eq!(store.viewer_options(0).width(), 320);
  assert!(!store.destroyed());

  store.remove_viewer(0);
  assert!(store.destroyed());
}

#[test]
fn marks_move_with_edits1() {
  let mut store = make_store();
  store.insert("1.0", "abcdef").unwrap();
  store
    .mark_set("m1", "1.4", crate::seg::Gravity::Right)
    .unwrap();
  store.insert("1.0", "XY").unwrap();
  assert_eq!(
    store.format_index(store.mark_pos("m1").unwrap()),
    "1.6"
  );
  store.delete("1.2", "1.8").unwrap();
  // The mark refused deletion and relocated to the range start.
  assert_eq!(
    store.format_index(store.mark_pos("m1").unwrap()),
    "1.2"
  );
  assert_eq!(store.mark_gravity("m1"), Some(crate::seg::Gravity::Right));
  store.mark_unset("m1");
  assert!(store.mark_pos("m1").is_none());
  store.check();
}

#[test]
fn scroll_fractions_and_moveto1() {
  test_log_init();
  let mut store = make_store();
  let mut text = String::new();
  for i in 0..100 {
    text.push_str(&format!("line {i}\n"));
  }
  store.insert("1.0", &text).unwrap();
  store.run_until_quiescent();
  let total = store.total_pixels(0);
  assert_eq!(total, 101 * 16);

  let (first, last) = store.yview_fractions(0);
  assert_eq!(first, 0.0);
  assert_eq!(last, 480.0 / total as f64);

  store.yview_moveto(0, 0.5);
  let (first, _) = store.yview_fractions(0);
  // The top display line plus its sub-line pixel offset land exactly on
  // the requested pixel.
  assert_eq!(first, 0.5);

  store.yview_scroll(0, 2, crate::view::ScrollWhat::Units);
  let (first2, _) = store.yview_fractions(0);
  // Scrolling by units drops the sub-line offset and moves two display
  // lines down from the former top line.
  assert_eq!(first2, (52 * 16) as f64 / total as f64);

  store.yview_scroll(0, -1, crate::view::ScrollWhat::Pages);
  let (first3, _) = store.yview_fractions(0);
  assert!(first3 < first2);

  // Scroll reports fire on the timed lane.
  store.run_until_quiescent();
  let reported = store
    .take_events()
    .into_iter()
    .any(|e| matches!(e, StoreEvent::ScrollFractions { .. }));
  assert!(reported);
}

#[test]
fn see_centers_far_target1() {
  let mut store = make_store();
  let mut text = String::new();
  for i in 0..200 {
    text.push_str(&format!("line {i}\n"));
  }
  store.insert("1.0", &text).unwrap();
  store.run_until_quiescent();

  store.see(0, "100.0").unwrap();
  let (first, last) = store.yview_fractions(0);
  let total = store.total_pixels(0) as f64;
  let target = 99.0 * 16.0 / total;
  assert!(first < target && target < last);
}

#[test]
fn pixel_index_roundtrip1() {
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "abcdef\nghijkl\nmnopqr").unwrap();
  store.run_until_quiescent();

  let (pos, nearby) = store.pixel_to_index(0, 25, 20);
  assert!(!nearby);
  // 10px per column, 16px per line: (25, 20) is column 2 of line 2.
  assert_eq!(store.format_index(pos), "2.2");

  let (pos, nearby) = store.pixel_to_index(0, -5, -5);
  assert!(nearby);
  assert_eq!(store.format_index(pos), "1.0");

  let bbox = store.bbox(0, "2.2").unwrap().unwrap();
  assert_eq!(bbox, (20, 16, 10, 16));

  let info = store.dline_info(0, "2.0").unwrap().unwrap();
  assert_eq!(info, (0, 16, 60, 16, 12));
}

#[test]
fn display_line_bound_roundtrip1() {
  // "display lineend" followed by "display linestart" stays on the same
  // display line.
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .build();
  let mut store = TextStore::new(opts);
  store.add_viewer(
    ViewOptions::builder()
      .width(100)
      .height(160)
      .default_line_height(16)
      .build(),
  );
  store.insert("1.0", "abcdefghijklmno").unwrap();

  let e = store.parse_index(0, "1.2 display lineend").unwrap();
  let s = store
    .parse_index(0, &format!("{} display linestart", store.format_index(e)))
    .unwrap();
  assert_eq!(store.format_index(s), "1.0");

  let e2 = store.parse_index(0, "1.12 display lineend").unwrap();
  let s2 = store
    .parse_index(0, &format!("{} display linestart", store.format_index(e2)))
    .unwrap();
  assert_eq!(store.format_index(s2), "1.10");
}

#[test]
fn event_dispatch_for_tag_bindings1() {
  test_log_init();
  let mut store = make_store();
  store.insert("1.0", "clickable text").unwrap();
  store.tag_add("link", "1.0", "1.9").unwrap();
  store.tag_bind("link", "<Button-1>", "open-link");
  assert_eq!(store.tag_bindings("link").unwrap().len(), 1);

  let fired: Rc<Cell<usize>> = Rc::new(Cell::new(0));
  let counter = fired.clone();
  store.set_event_dispatcher(Box::new(move |event, tags| {
    assert_eq!(event, "<Button-1>");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0], "link");
    counter.set(counter.get() + 1);
  }));
  store.run_until_quiescent();

  store.dispatch_pixel_event(0, 15, 5, "<Button-1>");
  assert_eq!(fired.get(), 1);
  // Outside the tagged range nothing fires.
  store.dispatch_pixel_event(0, 135, 5, "<Button-1>");
  assert_eq!(fired.get(), 1);
}

#[test]
fn viewer_restriction_zeroes_outside1() {
  let opts = StoreOptions::builder()
    .font(FontSpec::new(10, 12, 4))
    .build();
  let mut store = TextStore::new(opts);
  store.insert_at(
    crate::index::Position::start_of(store.tree.first_line()),
    "a\nb\nc\nd\ne",
  );
  let v = store.add_viewer_restricted(
    ViewOptions::builder()
      .width(100)
      .height(160)
      .default_line_height(16)
      .build(),
    Some(1),
    Some(4),
  );
  // Only lines 1..4 carry the default height.
  assert_eq!(store.total_pixels(v), 3 * 16);
  store.check();

  // The async updater keeps the outside lines at zero.
  store.run_until_quiescent();
  assert_eq!(store.total_pixels(v), 3 * 16);
  let outside = store.tree.find_line(0);
  assert_eq!(store.tree.line_pixel(v, outside).height, 0);
  store.check();
}
