use chrono::NaiveDate;

/// Billable nights for a stay. A same-day range still bills one night.
pub fn nights(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// Total for `people` guests at `nightly_rate` each, rounded to cents.
pub fn quote(nightly_rate: f64, start: NaiveDate, end: NaiveDate, people: u32) -> f64 {
    let total = nightly_rate * nights(start, end) as f64 * f64::from(people);
    (total * 100.0).round() / 100.0
}

/// Decimal amount to minor currency units (cents for USD). `None` when the
/// result is not finite or does not fit in an `i64`.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    let minor = (amount * 100.0).round();
    if minor.is_finite() && minor >= i64::MIN as f64 && minor < i64::MAX as f64 {
        Some(minor as i64)
    } else {
        None
    }
}
