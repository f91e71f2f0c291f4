use anyhow::bail;

use std::{
    fmt::{Debug, Display},
    iter::Sum,
    ops::AddAssign,
    str::FromStr,
};

/// Represents an amount of money, in whatever currency the sales data uses.
///
/// The amount is stored internally as an integer number of cents, so that
/// grouped totals add up exactly, but the [`Display`] implementation formats
/// it with thousands separators to 2 decimal places.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Money(i64);

impl Money {
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Converts a floating-point amount to the nearest cent.
    ///
    /// Non-finite values count as zero.
    #[must_use]
    pub fn from_f64(amount: f64) -> Self {
        if amount.is_finite() {
            #[allow(clippy::cast_possible_truncation)]
            Self((amount * 100.0).round() as i64)
        } else {
            Self(0)
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns `self / other` as a fraction, or 0 when `other` is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self, other: Money) -> f64 {
        if other.0 == 0 {
            0.0
        } else {
            self.0 as f64 / other.0 as f64
        }
    }

    /// Divides the amount evenly by `count`, or returns zero when `count` is zero.
    #[must_use]
    pub fn per(self, count: usize) -> Money {
        match i64::try_from(count) {
            Ok(0) | Err(_) => Money(0),
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            Ok(n) => Money((self.0 as f64 / n as f64).round() as i64),
        }
    }

    /// Formats the amount prefixed with a currency symbol, for example
    /// `₦1,234.56` or `-$12.00`.
    #[must_use]
    pub fn display_with(self, symbol: &str) -> String {
        if self.0 < 0 {
            format!("-{symbol}{}", Money(-self.0))
        } else {
            format!("{symbol}{self}")
        }
    }
}

impl Debug for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        let text = format!(
            "{sign}{}.{:02}",
            group_thousands(cents / 100),
            cents % 100
        );
        f.pad(&text)
    }
}

pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn is_currency_symbol(c: char) -> bool {
    matches!(c, '$' | '¢' | '£' | '¤' | '¥' | '\u{20A0}'..='\u{20CF}')
}

impl FromStr for Money {
    type Err = anyhow::Error;

    /// Parses an amount, ignoring currency symbols, whitespace and `,`
    /// thousands separators. Anything else makes the amount invalid.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|&c| !(c.is_whitespace() || c == ',' || is_currency_symbol(c)))
            .collect();
        let amount: f64 = cleaned.parse()?;
        if !amount.is_finite() {
            bail!("amount out of range: {s}");
        }
        Ok(Self::from_f64(amount))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_fn_parses_plain_and_grouped_amounts() {
        assert_eq!(Money::from_str("261.96").unwrap(), Money::from_cents(26196));
        assert_eq!(Money::from_str("3,409.15").unwrap(), Money::from_cents(340_915));
        assert_eq!(Money::from_str("₦ 1,000").unwrap(), Money::from_cents(100_000));
        assert_eq!(Money::from_str("-12.5").unwrap(), Money::from_cents(-1250));
        assert_eq!(Money::from_str("0.125").unwrap(), Money::from_cents(13));
    }

    #[test]
    fn from_str_fn_rejects_text() {
        assert!(Money::from_str("n/a").is_err());
        assert!(Money::from_str("").is_err());
        assert!(Money::from_str("Box of 5").is_err());
        assert!(Money::from_str("(12.50)").is_err());
        assert!(Money::from_str("12.50 each").is_err());
        assert!(Money::from_str("inf").is_err());
    }

    #[test]
    fn from_str_fn_strips_symbols_and_sign() {
        assert_eq!(Money::from_str("-$1.50").unwrap(), Money::from_cents(-150));
        assert_eq!(Money::from_str("€ 2 000.50").unwrap(), Money::from_cents(200_050));
        assert_eq!(Money::from_str("£7").unwrap(), Money::from_cents(700));
    }

    #[test]
    fn display_fn_groups_thousands() {
        assert_eq!(Money::from_cents(123_456_789).to_string(), "1,234,567.89");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-100_000).to_string(), "-1,000.00");
        assert_eq!(format!("{:>10}", Money::from_cents(100)), "      1.00");
    }

    #[test]
    fn group_thousands_fn_groups_digits() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn display_with_fn_puts_symbol_after_sign() {
        assert_eq!(Money::from_cents(150).display_with("₦"), "₦1.50");
        assert_eq!(Money::from_cents(-150).display_with("$"), "-$1.50");
    }

    #[test]
    fn ratio_fn_is_zero_for_zero_denominator() {
        assert_eq!(Money::from_cents(10).ratio(Money::default()), 0.0);
        assert!((Money::from_cents(25).ratio(Money::from_cents(100)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn per_fn_divides_and_handles_zero_count() {
        assert_eq!(Money::from_cents(30_000).per(3), Money::from_cents(10_000));
        assert_eq!(Money::from_cents(30_000).per(0), Money::default());
    }

    #[test]
    fn sum_fn_adds_exactly() {
        let total: Money = [10, 20, 30].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(60));
    }
}
