// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₱";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceError {
    Empty,
    Negative,
    Invalid,
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("price is empty"),
            Self::Negative => f.write_str("price cannot be negative"),
            Self::Invalid => f.write_str("price is not a number"),
        }
    }
}

impl std::error::Error for PriceError {}

/// Parses a user-entered price into whole cents. Accepts an optional
/// leading `$` or `₱`, thousands separators, and at most two decimals.
pub fn parse_price_cents(input: &str) -> Result<i64, PriceError> {
    let clean = input.trim().replace(',', "");
    if clean.is_empty() {
        return Err(PriceError::Empty);
    }
    if clean.starts_with('-') {
        return Err(PriceError::Negative);
    }

    let clean = clean
        .strip_prefix('$')
        .or_else(|| clean.strip_prefix(DEFAULT_CURRENCY_SYMBOL))
        .unwrap_or(&clean);
    if clean.is_empty() {
        return Err(PriceError::Invalid);
    }

    let (whole_raw, frac_raw) = match clean.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (clean, None),
    };

    let whole = if whole_raw.is_empty() {
        if frac_raw.is_none() {
            return Err(PriceError::Invalid);
        }
        0
    } else {
        parse_digits(whole_raw)?
    };
    let frac = match frac_raw {
        None => 0,
        Some("") if whole_raw.is_empty() => return Err(PriceError::Invalid),
        Some("") => 0,
        Some(digits) if digits.len() > 2 => return Err(PriceError::Invalid),
        Some(digits) => {
            let value = parse_digits(digits)?;
            if digits.len() == 1 { value * 10 } else { value }
        }
    };

    whole
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(frac))
        .ok_or(PriceError::Invalid)
}

/// Fixed two decimals with the currency symbol prefixed, e.g. `₱12.50`.
pub fn format_price(cents: i64, symbol: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let absolute = cents.unsigned_abs();
    format!("{sign}{symbol}{}.{:02}", absolute / 100, absolute % 100)
}

/// Form pre-fill text: the same digits as [`format_price`] without a symbol.
pub fn format_price_input(cents: i64) -> String {
    format_price(cents, "")
}

fn parse_digits(raw: &str) -> Result<i64, PriceError> {
    if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(PriceError::Invalid);
    }
    raw.parse::<i64>().map_err(|_| PriceError::Invalid)
}
