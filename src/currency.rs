//! Currency rounding and display formatting.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// Round `amount` to two decimal places.
///
/// All monetary amounts accepted by the engine are stored with at most
/// two-decimal precision.
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Format `number` as a currency string, e.g. `$1,234.50` or `-$0.99`.
pub fn format_currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    let mut formatted_string = if number < 0.0 {
        negative_fmt.fmt_string(number.abs())
    } else if number > 0.0 {
        positive_fmt.fmt_string(number)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        "$0.00".to_owned()
    };

    // numfmt omits the last trailing zero, so we must add it ourselves
    // For example, "12.30" is rendered as "12.3" so we append "0".
    if formatted_string.as_bytes()[formatted_string.len() - 3] != b'.' {
        formatted_string = format!("{formatted_string}0");
    }

    formatted_string
}

#[cfg(test)]
mod currency_tests {
    use super::{format_currency, round_to_cents};

    #[test]
    fn formats_zero() {
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn formats_thousands_separator() {
        assert_eq!(format_currency(12500.0), "$12,500.00");
    }

    #[test]
    fn formats_trailing_zero() {
        assert_eq!(format_currency(12.3), "$12.30");
    }

    #[test]
    fn formats_negative_amounts() {
        assert_eq!(format_currency(-0.99), "-$0.99");
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_to_cents(19.999), 20.0);
        assert_eq!(round_to_cents(19.994), 19.99);
        assert_eq!(round_to_cents(100.0), 100.0);
    }
}
