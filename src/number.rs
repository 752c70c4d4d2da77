//! Conversion between Brazilian-formatted numbers ("1.234,56") and `f64`.

use serde_json::Value;
use thiserror::Error;

/// Why a localized number could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("empty numeric value")]
    Empty,
    #[error("not a number: {0:?}")]
    Invalid(String),
}

/// Parse a decimal-comma number, dropping `.` thousands separators.
///
/// `"1.234,56"` → `1234.56`, `"-7.206,16"` → `-7206.16`, `"1,108630"` → `1.10863`.
pub fn try_parse_local_number(input: &str) -> Result<f64, NumberError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NumberError::Empty);
    }

    let normalized = trimmed.replace('.', "").replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(NumberError::Invalid(trimmed.to_string())),
    }
}

/// Lenient variant: missing, blank and unparsable input all read as `0.0`.
pub fn parse_local_number(input: Option<&str>) -> f64 {
    input
        .and_then(|s| try_parse_local_number(s).ok())
        .unwrap_or(0.0)
}

/// Read a number from a JSON value that may already be numeric.
pub fn parse_json_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_local_number(Some(s)),
        _ => 0.0,
    }
}

/// Format with a fixed number of decimals, half-up rounding and a decimal comma.
///
/// No thousands grouping is applied. `None` and non-finite values render as zero.
pub fn format_local_number(value: Option<f64>, decimals: usize) -> String {
    let decimals = decimals.min(12);
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return render(false, 0, decimals);
    };

    let factor = 10u128.pow(decimals as u32);
    // The small bias keeps values like 1.005 (stored as 1.00499..) rounding up.
    let raw = value.abs() * factor as f64;
    if raw >= u128::MAX as f64 {
        return format!("{:.*}", decimals, value).replace('.', ",");
    }
    let scaled = (raw + 0.5 + 1e-7).floor() as u128;

    render(value < 0.0 && scaled != 0, scaled, decimals)
}

fn render(negative: bool, scaled: u128, decimals: usize) -> String {
    let factor = 10u128.pow(decimals as u32);
    let sign = if negative { "-" } else { "" };
    let integer = scaled / factor;
    if decimals == 0 {
        return format!("{sign}{integer}");
    }
    let fraction = scaled % factor;
    format!("{sign}{integer},{fraction:0width$}", width = decimals)
}

/// Shorthand for the two-decimal currency rendering used across invoices.
pub fn format_currency(value: f64) -> String {
    format_local_number(Some(value), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_brazilian_formats() {
        assert_eq!(try_parse_local_number("1.234,56"), Ok(1234.56));
        assert_eq!(try_parse_local_number("312,00"), Ok(312.0));
        assert_eq!(try_parse_local_number("-7.206,16"), Ok(-7206.16));
        assert_eq!(try_parse_local_number(" 1,108630 "), Ok(1.10863));
        assert_eq!(try_parse_local_number("42"), Ok(42.0));
    }

    #[test]
    fn test_parse_distinguishes_empty_from_invalid() {
        assert_eq!(try_parse_local_number(""), Err(NumberError::Empty));
        assert_eq!(try_parse_local_number("   "), Err(NumberError::Empty));
        assert_eq!(
            try_parse_local_number("R$ 10,00"),
            Err(NumberError::Invalid("R$ 10,00".to_string()))
        );
        assert!(try_parse_local_number("inf").is_err());
    }

    #[test]
    fn test_lenient_parse_never_fails() {
        assert_eq!(parse_local_number(None), 0.0);
        assert_eq!(parse_local_number(Some("")), 0.0);
        assert_eq!(parse_local_number(Some("abc")), 0.0);
        assert_eq!(parse_local_number(Some("1.000,00")), 1000.0);
    }

    #[test]
    fn test_parse_json_number() {
        assert_eq!(parse_json_number(&json!(12.5)), 12.5);
        assert_eq!(parse_json_number(&json!("12,50")), 12.5);
        assert_eq!(parse_json_number(&json!(null)), 0.0);
        assert_eq!(parse_json_number(&json!([1])), 0.0);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_local_number(Some(1234.5), 2), "1234,50");
        assert_eq!(format_local_number(Some(300.0), 2), "300,00");
        assert_eq!(format_local_number(Some(0.0), 2), "0,00");
        assert_eq!(format_local_number(Some(-507.75), 2), "-507,75");
        assert_eq!(format_local_number(Some(1.10863), 6), "1,108630");
        assert_eq!(format_local_number(Some(7.4), 0), "7");
    }

    #[test]
    fn test_format_rounds_half_up() {
        assert_eq!(format_local_number(Some(1.005), 2), "1,01");
        assert_eq!(format_local_number(Some(2.675), 2), "2,68");
        assert_eq!(format_local_number(Some(0.125), 2), "0,13");
        assert_eq!(format_local_number(Some(0.124), 2), "0,12");
    }

    #[test]
    fn test_format_missing_or_invalid_is_zero() {
        assert_eq!(format_local_number(None, 2), "0,00");
        assert_eq!(format_local_number(Some(f64::NAN), 2), "0,00");
        assert_eq!(format_local_number(Some(f64::INFINITY), 2), "0,00");
    }

    #[test]
    fn test_round_trip_two_decimal_values() {
        for x in [0.0, 0.01, 0.1, 1.0, 12.34, 99.99, 150.25, 1000.0, 7206.16, 123456.78] {
            let rendered = format_local_number(Some(x), 2);
            assert_eq!(parse_local_number(Some(&rendered)), x, "{rendered}");
        }
    }

    #[test]
    fn test_round_trip_values_beyond_integer_range() {
        for x in [1e40, 3.5e38, 1e300] {
            let rendered = format_local_number(Some(x), 2);
            assert!(rendered.ends_with(",00"), "{rendered}");
            assert_eq!(parse_local_number(Some(&rendered)), x, "{rendered}");
        }
        assert!(format_local_number(Some(-1e40), 2).starts_with("-1000000000000000030"));
    }

    #[test]
    fn test_round_trip_rounds_to_cents() {
        let rendered = format_local_number(Some(10.0 / 3.0), 2);
        assert_eq!(rendered, "3,33");
        assert_eq!(parse_local_number(Some(&rendered)), 3.33);
    }
}
