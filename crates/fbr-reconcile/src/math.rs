//! Pure deduction arithmetic. No IO.

/// Float noise below this is ignored before rounding need up, so
/// `8.000000000000002` containers is 8, not 9.
pub const CEIL_TOLERANCE: f64 = 1e-9;

/// Planned batch size from a display string such as `"200 people"`.
///
/// Takes the leading run of ASCII digits. Missing, zero, or overflowing
/// values degrade to 1.
pub fn parse_planned_servings(s: &str) -> i64 {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<i64>() {
        Ok(n) if n > 0 => n,
        _ => 1,
    }
}

/// Fraction of the planned batch that was actually served.
pub fn usage_ratio(distributed_meal_count: i64, planned_servings: i64) -> f64 {
    distributed_meal_count as f64 / planned_servings.max(1) as f64
}

/// Containers the served meals should have consumed: `ceil(expected * ratio)`.
///
/// Computed as `expected * distributed / planned` so exact ratios stay exact.
pub fn actual_quantity_needed(expected_quantity: f64, distributed_meal_count: i64, planned_servings: i64) -> i64 {
    if expected_quantity.is_nan() || expected_quantity <= 0.0 || distributed_meal_count <= 0 {
        return 0;
    }
    let raw = expected_quantity * distributed_meal_count as f64 / planned_servings.max(1) as f64;
    (raw - CEIL_TOLERANCE).ceil().max(0.0) as i64
}

/// Amount that can actually come out of stock. Never more than is on hand.
pub fn clamp_deduction(needed: i64, current_quantity: i64) -> i64 {
    needed.min(current_quantity).max(0)
}

/// Shortfall as a percentage of the recipe's expected quantity; 0 when the
/// expectation is 0.
pub fn variance_percentage(variance: i64, expected_quantity: f64) -> f64 {
    if expected_quantity == 0.0 {
        return 0.0;
    }
    variance as f64 / expected_quantity * 100.0
}
