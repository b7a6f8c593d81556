//! Chart point parsing.
//!
//! Points arrive as a comma-separated list of base-10 numbers. Tokens that do
//! not parse to a finite number are excluded from the sequence rather than
//! coerced to zero, so one bad sample cannot pull a sparkline to the axis.

/// Result of parsing a points attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Points {
  pub values:   Vec<f64>,
  /// Non-empty tokens that were excluded.
  pub rejected: usize,
}

pub fn parse_points(raw: &str) -> Points {
  let mut points = Points::default();
  for token in raw.split(',').map(str::trim) {
    if token.is_empty() {
      continue;
    }
    match token.parse::<f64>() {
      Ok(value) if value.is_finite() => points.values.push(value),
      _ => points.rejected += 1,
    }
  }
  points
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_plain_list() {
    assert_eq!(parse_points("1,2,3").values, vec![1.0, 2.0, 3.0]);
    assert_eq!(parse_points(" 4 , 5.5,-6 ").values, vec![4.0, 5.5, -6.0]);
  }

  #[test]
  fn excludes_malformed_tokens() {
    let points = parse_points("1,x,3");
    assert_eq!(points.values, vec![1.0, 3.0]);
    assert_eq!(points.rejected, 1);
  }

  #[test]
  fn excludes_non_finite_values() {
    let points = parse_points("NaN,inf,-infinity,2");
    assert_eq!(points.values, vec![2.0]);
    assert_eq!(points.rejected, 3);
  }

  #[test]
  fn empty_tokens_are_skipped_silently() {
    assert_eq!(parse_points(""), Points::default());
    let points = parse_points("1,,2,");
    assert_eq!(points.values, vec![1.0, 2.0]);
    assert_eq!(points.rejected, 0);
  }

  quickcheck::quickcheck! {
    fn never_panics_and_only_keeps_finite(raw: String) -> bool {
      parse_points(&raw).values.iter().all(|value| value.is_finite())
    }

    fn integers_round_trip(values: Vec<i32>) -> bool {
      let raw = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
      let parsed = parse_points(&raw);
      parsed.rejected == 0
        && parsed.values == values.iter().map(|v| f64::from(*v)).collect::<Vec<_>>()
    }
  }
}
