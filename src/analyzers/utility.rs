/// Rounds to one decimal place, the precision attendance percentages are
/// displayed with.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / total` as a percentage rounded to one decimal. Returns 0.0 for an
/// empty total.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}
