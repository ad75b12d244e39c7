use super::justify::*;

use std::str::FromStr;

#[test]
fn display1() {
  assert_eq!("left", JustifyOption::Left.to_string());
  assert_eq!("center", JustifyOption::Center.to_string());
  assert_eq!("right", JustifyOption::Right.to_string());
}

#[test]
fn from_str1() {
  assert_eq!(
    JustifyOption::from_str("right").unwrap(),
    JustifyOption::Right
  );
  assert!(JustifyOption::from_str("justified").is_err());
}
