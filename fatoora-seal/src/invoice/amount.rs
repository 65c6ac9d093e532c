//! Decimal text formatting for invoice amounts.

/// Formats `value` with exactly `precision` fraction digits, truncating
/// instead of rounding.
///
/// The digits come from the shortest decimal form that round-trips the
/// `f64`, so `1.005` keeps its written digits and becomes `"1.00"` rather
/// than picking up binary noise. A negative value that truncates to zero is
/// written without a sign. NaN and infinities are written as Rust displays
/// them.
///
/// # Examples
/// ```rust
/// use fatoora_seal::invoice::amount::to_fixed_no_rounding;
///
/// assert_eq!(to_fixed_no_rounding(231.159, 2), "231.15");
/// assert_eq!(to_fixed_no_rounding(30.1, 2), "30.10");
/// assert_eq!(to_fixed_no_rounding(-0.004, 2), "0.00");
/// ```
pub fn to_fixed_no_rounding(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let shortest = value.abs().to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));

    let mut out = String::with_capacity(int_part.len() + precision + 2);
    out.push_str(int_part);
    if precision > 0 {
        out.push('.');
        out.extend(frac_part.chars().chain(std::iter::repeat('0')).take(precision));
    }

    let is_zero = out.bytes().all(|b| matches!(b, b'0' | b'.'));
    if value.is_sign_negative() && !is_zero {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_fixed_no_rounding;

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(to_fixed_no_rounding(1.999, 2), "1.99");
        assert_eq!(to_fixed_no_rounding(1.005, 2), "1.00");
        assert_eq!(to_fixed_no_rounding(-2.678, 1), "-2.6");
    }

    #[test]
    fn pads_short_fractions() {
        assert_eq!(to_fixed_no_rounding(201.0, 2), "201.00");
        assert_eq!(to_fixed_no_rounding(0.5, 3), "0.500");
    }

    #[test]
    fn zero_precision_drops_fraction() {
        assert_eq!(to_fixed_no_rounding(15.99, 0), "15");
        assert_eq!(to_fixed_no_rounding(-0.9, 0), "0");
    }

    #[test]
    fn large_values_stay_positional() {
        assert_eq!(to_fixed_no_rounding(1e21, 2), "1000000000000000000000.00");
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert_eq!(to_fixed_no_rounding(f64::NAN, 2), "NaN");
        assert_eq!(to_fixed_no_rounding(f64::INFINITY, 2), "inf");
        assert_eq!(to_fixed_no_rounding(f64::NEG_INFINITY, 2), "-inf");
    }
}
