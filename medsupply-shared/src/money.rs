//! Amounts are carried as integer cents everywhere; these helpers convert at
//! the edges (form input and rendered documents).

/// Largest amount a form may carry: $10,000,000.00
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount is not a number: {0}")]
    NotANumber(String),

    #[error("amount is negative: {0}")]
    Negative(String),

    #[error("amount is too large: {0}")]
    TooLarge(String),
}

/// Parse a form amount such as `"1650"`, `"1650.5"` or `"$1,650.00"` into cents.
///
/// Fractions beyond two places are rounded half-up.
pub fn parse_amount(input: &str) -> Result<i64, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let cleaned: String = trimmed
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| AmountError::NotANumber(input.to_string()))?;

    if !value.is_finite() {
        return Err(AmountError::NotANumber(input.to_string()));
    }
    if value < 0.0 {
        return Err(AmountError::Negative(input.to_string()));
    }

    let cents = (value * 100.0 + 0.5).floor();
    if cents > MAX_AMOUNT_CENTS as f64 {
        return Err(AmountError::TooLarge(input.to_string()));
    }
    Ok(cents as i64)
}

/// Render cents as `$1650.00` (no thousands separator, like the printed documents).
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
