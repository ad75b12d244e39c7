use super::*;

#[test]
fn gravity1() {
  assert_eq!(Segment::chars("x").gravity(), Gravity::Right);
  assert_eq!(Segment::toggle_on(1).gravity(), Gravity::Right);
  assert_eq!(Segment::toggle_off(1).gravity(), Gravity::Left);
  assert_eq!(Segment::mark("a", Gravity::Left).gravity(), Gravity::Left);
  assert_eq!(Segment::mark("b", Gravity::Right).gravity(), Gravity::Right);
}

#[test]
fn split1() {
  let seg = Segment::chars("hello");
  let (a, b) = seg.split(2);
  assert_eq!(a.as_chars(), Some("he"));
  assert_eq!(b.as_chars(), Some("llo"));
  assert_eq!(a.size, 2);
  assert_eq!(b.size, 3);
}

#[test]
fn split_multibyte1() {
  // "héllo": é is two bytes, boundary after it is at 3.
  let seg = Segment::chars("héllo");
  let (a, b) = seg.split(3);
  assert_eq!(a.as_chars(), Some("hé"));
  assert_eq!(b.as_chars(), Some("llo"));
}

#[test]
fn merge_chars1() {
  let a = Segment::chars("foo");
  let b = Segment::chars("bar\n");
  let merged = a.merge_chars(&b).unwrap();
  assert_eq!(merged.as_chars(), Some("foobar\n"));
  assert_eq!(merged.size, 7);
  assert!(a.merge_chars(&Segment::toggle_on(1)).is_none());
}

#[test]
fn counts1() {
  assert_eq!(Segment::chars("héllo").index_count(), 5);
  assert_eq!(Segment::chars("héllo").char_count(), 5);
  let w = Segment::window(EmbWindow {
    name: "w1".into(),
    width: 30,
    height: 20,
  });
  assert_eq!(w.size, 1);
  assert_eq!(w.index_count(), 1);
  assert_eq!(w.char_count(), 0);
  assert_eq!(Segment::toggle_on(7).index_count(), 0);
}
