//! Price text normalisation.

/// Turns listing text such as `"12 990 so'm"` or `"1.299,00 €"` into a number.
///
/// Everything except digits, `,` and `.` is dropped. When both separators
/// occur the last one is the decimal separator; a separator that repeats is
/// digit grouping; a single separator is decimal. Returns `0.0` when nothing
/// parseable remains, which callers treat as "no price".
pub fn normalize_price(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return 0.0;
    }

    let decimal_at = decimal_separator_position(&cleaned);

    let normalized: String = cleaned
        .char_indices()
        .filter_map(|(i, c)| match c {
            ',' | '.' if Some(i) == decimal_at => Some('.'),
            ',' | '.' => None,
            digit => Some(digit),
        })
        .collect();

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

fn decimal_separator_position(cleaned: &str) -> Option<usize> {
    let commas = cleaned.matches(',').count();
    let periods = cleaned.matches('.').count();

    match (commas, periods) {
        (0, 0) => None,
        (c, p) if c > 0 && p > 0 => cleaned.rfind(|ch: char| ch == ',' || ch == '.'),
        (1, 0) => cleaned.find(','),
        (0, 1) => cleaned.find('.'),
        // one kind, repeated: grouping only
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integer_with_currency() {
        assert_eq!(normalize_price("12 990 so'm"), 12990.0);
        assert_eq!(normalize_price("UZS 450000"), 450000.0);
    }

    #[test]
    fn test_period_decimal() {
        assert_eq!(normalize_price("$19.99"), 19.99);
    }

    #[test]
    fn test_comma_decimal() {
        assert_eq!(normalize_price("19,99 €"), 19.99);
    }

    #[test]
    fn test_mixed_separators() {
        assert_eq!(normalize_price("1,299.99"), 1299.99);
        assert_eq!(normalize_price("1.299,99 €"), 1299.99);
    }

    #[test]
    fn test_repeated_grouping_separator() {
        assert_eq!(normalize_price("1.234.567"), 1234567.0);
        assert_eq!(normalize_price("1,234,567 sum"), 1234567.0);
    }

    #[test]
    fn test_unparseable_yields_zero() {
        assert_eq!(normalize_price(""), 0.0);
        assert_eq!(normalize_price("Narx so'rang"), 0.0);
        assert_eq!(normalize_price(",."), 0.0);
    }
}
