//! Supported currencies and locale-free amount formatting

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// A currency the wallet can hold or display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Minor-unit digits shown when formatting
    pub decimals: u32,
}

pub const SUPPORTED_CURRENCIES: &[Currency] = &[
    Currency { code: "NGN", symbol: "₦", name: "Nigerian Naira", decimals: 2 },
    Currency { code: "GHS", symbol: "GH₵", name: "Ghanaian Cedi", decimals: 2 },
    Currency { code: "KES", symbol: "KSh", name: "Kenyan Shilling", decimals: 2 },
    Currency { code: "UGX", symbol: "USh", name: "Ugandan Shilling", decimals: 0 },
    Currency { code: "TZS", symbol: "TSh", name: "Tanzanian Shilling", decimals: 2 },
    Currency { code: "RWF", symbol: "FRw", name: "Rwandan Franc", decimals: 0 },
    Currency { code: "ZAR", symbol: "R", name: "South African Rand", decimals: 2 },
    Currency { code: "XOF", symbol: "CFA", name: "West African CFA Franc", decimals: 0 },
    Currency { code: "XAF", symbol: "FCFA", name: "Central African CFA Franc", decimals: 0 },
    Currency { code: "EGP", symbol: "E£", name: "Egyptian Pound", decimals: 2 },
    Currency { code: "MAD", symbol: "DH", name: "Moroccan Dirham", decimals: 2 },
    Currency { code: "USD", symbol: "$", name: "US Dollar", decimals: 2 },
    Currency { code: "EUR", symbol: "€", name: "Euro", decimals: 2 },
    Currency { code: "GBP", symbol: "£", name: "British Pound", decimals: 2 },
];

pub const DEFAULT_CURRENCY: &str = "NGN";

impl Currency {
    /// Look up a supported currency by ISO code (case-insensitive)
    pub fn find(code: &str) -> Option<&'static Currency> {
        let code = code.trim();
        SUPPORTED_CURRENCIES
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    pub fn is_supported(code: &str) -> bool {
        Self::find(code).is_some()
    }
}

/// Symbol and decimals for a code, falling back to the code itself
fn display_parts(code: &str) -> (String, u32) {
    match Currency::find(code) {
        Some(c) => (c.symbol.to_string(), c.decimals),
        None => (code.trim().to_uppercase(), 2),
    }
}

/// Lettered symbols read better with a space before the digits
fn prefix(symbol: &str) -> String {
    match symbol.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => format!("{} ", symbol),
        _ => symbol.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format `amount` as e.g. `₦1,234.50`, `-KSh 20.00`, `CFA 15,000`
pub fn format_amount(amount: Decimal, code: &str) -> String {
    let (symbol, decimals) = display_parts(code);
    let rounded = amount
        .abs()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let sign = if amount.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let mut out = format!("{}{}{}", sign, prefix(&symbol), group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Short form for dashboards: `₦1.2K`, `KSh 3.4M`
pub fn compact_amount(amount: Decimal, code: &str) -> String {
    let (symbol, _) = display_parts(code);
    let abs = amount.abs();
    let units = [
        (Decimal::from(1_000_000_000), "B"),
        (Decimal::from(1_000_000), "M"),
        (Decimal::from(1_000), "K"),
    ];

    let body = units
        .iter()
        .find(|(divisor, _)| abs >= *divisor)
        .map(|(divisor, suffix)| {
            let scaled = (abs / *divisor).round_dp_with_strategy(1, RoundingStrategy::ToZero);
            let text = format!("{:.1}", scaled);
            let text = text.strip_suffix(".0").unwrap_or(&text).to_string();
            format!("{}{}", text, suffix)
        })
        .unwrap_or_else(|| format!("{}", abs.round_dp(0)));

    let sign = if amount.is_sign_negative() && !abs.is_zero() { "-" } else { "" };
    format!("{}{}{}", sign, prefix(&symbol), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(Currency::find("ngn").map(|c| c.symbol), Some("₦"));
        assert!(Currency::find("XYZ").is_none());
        assert!(Currency::is_supported(" kes "));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(12345, 1), "NGN"), "₦1,234.50");
        assert_eq!(format_amount(Decimal::new(-12345, 1), "NGN"), "-₦1,234.50");
        assert_eq!(format_amount(Decimal::ZERO, "NGN"), "₦0.00");
        assert_eq!(format_amount(Decimal::from(999), "USD"), "$999.00");
        assert_eq!(format_amount(Decimal::from(1_000_000), "GHS"), "GH₵1,000,000.00");
    }

    #[test]
    fn test_format_zero_decimal_currencies() {
        assert_eq!(format_amount(Decimal::new(12345676, 1), "UGX"), "USh 1,234,568");
        assert_eq!(format_amount(Decimal::from(15000), "XOF"), "CFA 15,000");
        assert_eq!(format_amount(Decimal::new(-4, 1), "RWF"), "FRw 0");
    }

    #[test]
    fn test_format_unknown_currency() {
        assert_eq!(format_amount(Decimal::from(12), "abc"), "ABC 12.00");
    }

    #[test]
    fn test_compact_amount() {
        assert_eq!(compact_amount(Decimal::from(1_234), "NGN"), "₦1.2K");
        assert_eq!(compact_amount(Decimal::from(1_500_000), "KES"), "KSh 1.5M");
        assert_eq!(compact_amount(Decimal::from(2_000_000_000), "USD"), "$2B");
        assert_eq!(compact_amount(Decimal::from(999), "USD"), "$999");
        assert_eq!(compact_amount(Decimal::from(-45_000), "NGN"), "-₦45K");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1,234");
        assert_eq!(group_thousands("123456"), "123,456");
        assert_eq!(group_thousands("1234567"), "1,234,567");
    }
}
