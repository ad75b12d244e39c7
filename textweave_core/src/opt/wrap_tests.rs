use super::wrap::*;

use std::str::FromStr;

#[test]
fn display1() {
  assert_eq!("none", WrapOption::None.to_string());
  assert_eq!("char", WrapOption::Char.to_string());
  assert_eq!("word", WrapOption::Word.to_string());
}

#[test]
fn from_str1() {
  assert_eq!(WrapOption::from_str("word").unwrap(), WrapOption::Word);
  assert!(WrapOption::from_str("sentence").is_err());
}
