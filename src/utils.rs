use chrono::{Datelike, Duration, NaiveDate};

/// Significant digits kept, as with printf's `%g`.
const SIGNIFICANT_DIGITS: i32 = 6;

/// Format story points or hours for display, the way printf's `%g` does.
///
/// Six significant digits with trailing zeros dropped (`8`, `2.5`, `4.66667`).
/// Exponents below -4 or from 6 up switch to scientific notation
/// (`1.23457e+06`, `1e-07`).
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // Exponent after rounding to the kept digits.
    let precision = (SIGNIFICANT_DIGITS - 1) as usize;
    let scientific = format!("{n:.precision$e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.abs()
        );
    }

    let decimals = (SIGNIFICANT_DIGITS - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{n:.decimals$}")).to_string()
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// `Thu 2026-01-08`
pub fn format_day(date: NaiveDate) -> String {
    date.format("%a %Y-%m-%d").to_string()
}

/// The Monday-to-Sunday week containing `today`.
pub fn week_of(today: NaiveDate) -> Vec<NaiveDate> {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (0..7).map(|offset| monday + Duration::days(offset)).collect()
}
