//! Rounding and display rendering of results

use crate::model::DisplayFormat;
use crate::value::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest scale a [`Decimal`] can carry
const MAX_DECIMAL_SCALE: u32 = 28;

/// Rendering options for formatted results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Prefix for [`DisplayFormat::Currency`]
    pub currency_symbol: String,
    /// Group integer digits in threes with `,`
    pub thousands_separator: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            thousands_separator: true,
        }
    }
}

/// Round to `places` decimals, half away from zero
///
/// Goes through [`Decimal`] so `2.5` style midpoints are not skewed by binary
/// representation; values outside its range fall back to `f64` arithmetic.
pub fn round_half_away(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    to_decimal(value, places)
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| round_f64(value, places))
}

/// Render a formula result
///
/// Numbers are rounded and rendered per `format`; text is verbatim and errors
/// show their code.
pub fn format_value(
    value: &Value,
    places: u32,
    format: DisplayFormat,
    options: &FormatOptions,
) -> String {
    match value {
        Value::Number(n) => format_number(*n, places, format, options),
        Value::Text(s) => s.clone(),
        Value::Error(kind) => kind.code().to_string(),
    }
}

/// Render a field value: numbers in plain form
pub fn format_plain(value: &Value) -> String {
    value.to_string()
}

/// Render a number with exactly `places` decimals
pub fn format_number(
    value: f64,
    places: u32,
    format: DisplayFormat,
    options: &FormatOptions,
) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let text = match to_decimal(value, places) {
        Some(mut d) => {
            d.rescale(places.min(MAX_DECIMAL_SCALE));
            if d.is_zero() {
                d.set_sign_positive(true);
            }
            d.to_string()
        }
        None => {
            let places = places.min(MAX_DECIMAL_SCALE);
            format!("{:.*}", places as usize, round_f64(value, places))
        }
    };

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut out = String::with_capacity(text.len() + 8);
    if negative {
        out.push('-');
    }
    if format == DisplayFormat::Currency {
        out.push_str(&options.currency_symbol);
    }
    if options.thousands_separator {
        out.push_str(&group_thousands(int_part));
    } else {
        out.push_str(int_part);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    if format == DisplayFormat::Percentage {
        out.push('%');
    }
    out
}

fn to_decimal(value: f64, places: u32) -> Option<Decimal> {
    let d = Decimal::from_f64(value)?;
    Some(d.round_dp_with_strategy(
        places.min(MAX_DECIMAL_SCALE),
        RoundingStrategy::MidpointAwayFromZero,
    ))
}

fn round_f64(value: f64, places: u32) -> f64 {
    // f64::round is half away from zero
    let factor = 10_f64.powi(places.min(i32::MAX as u32) as i32);
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round() / factor
}

fn group_thousands(int_part: &str) -> String {
    let len = int_part.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in int_part.chars().enumerate() {
        let from_end = len - i;
        out.push(ch);
        if from_end > 1 && from_end % 3 == 1 {
            out.push(',');
        }
    }
    out
}
