//! Monetary rounding
//!
//! All amounts are rounded half away from zero to 2 decimal places at every
//! stage boundary, so re-deriving a total from a stored trace reproduces the
//! same cents.

/// Round to cents, half away from zero
///
/// The scaled value is nudged by a tiny epsilon before rounding so binary
/// representation error (1.005 is stored as 1.00499999...) doesn't flip a
/// half-cent down.
pub fn round_money(amount: f64) -> f64 {
    if !amount.is_finite() {
        return 0.0;
    }
    let scaled = amount * 100.0;
    let nudged = scaled + scaled.signum() * 1e-7;
    let rounded = nudged.round() / 100.0;
    // normalise -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Format an amount with two decimals for trace calculation strings
pub fn fmt_money(amount: f64) -> String {
    format!("{:.2}", round_money(amount))
}

/// Format a quantity without trailing zeros
pub fn fmt_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < 1e15 {
        format!("{}", quantity as i64)
    } else {
        let s = format!("{:.4}", quantity);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
