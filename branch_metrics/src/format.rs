// Number formatting shared by every consumer of a report.
//
// Rates are converted to percentage scale here and nowhere else.
use num_format::{Locale, ToFormattedString};

use crate::config::{FieldValue, RateScale};

/// Integral values are written without decimals, other values with exactly
/// two.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// A rate in percentage scale with two decimals, without the `%` sign.
pub fn format_rate(value: f64, scale: RateScale) -> String {
    format!("{:.2}", scale.to_percent(value))
}

/// A rate with two decimals and the `%` sign, e.g. `"41.00%"`.
pub fn format_percent(value: f64, scale: RateScale) -> String {
    format!("{}%", format_rate(value, scale))
}

/// A count with thousands separators, e.g. `"1,234,567"`.
pub fn format_count(n: u64) -> String {
    n.to_formatted_string(&Locale::en)
}

/// How a field is written in a report table.
pub fn format_field(value: &FieldValue) -> String {
    match value {
        FieldValue::Blank => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Count(c) => c.to_string(),
        FieldValue::Rate { value, scale } => format_percent(*value, *scale),
    }
}
