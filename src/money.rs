// 💰 Money - integer cents, pt-BR entry and display formats
//
// Amounts live as i64 cents everywhere. Only the form input, the display
// string and the remote table's decimal column ever see major units.

use crate::error::ValidationError;

/// Minor currency units (centavos)
pub type Cents = i64;

/// Largest amount a single entry may carry: R$ 1.000.000.000,00
pub const MAX_AMOUNT_CENTS: Cents = 100_000_000_000;

/// Parse a pt-BR amount as typed into the form ("1.234,56", "299,00", "45")
///
/// Every `.` is a thousands separator, the first `,` is the decimal point.
pub fn parse_amount(input: &str) -> Result<Cents, ValidationError> {
    let normalized = input.replace('.', "").replacen(',', ".", 1);
    let trimmed = normalized.trim();

    let value: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidAmount(input.to_string()))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidAmount(input.to_string()));
    }

    let cents = (value * 100.0).round();
    if cents > MAX_AMOUNT_CENTS as f64 {
        return Err(ValidationError::InvalidAmount(input.to_string()));
    }

    Ok(cents as Cents)
}

/// Overflow-free sum; totals pin at the i64 bounds
pub fn sum_cents<I: IntoIterator<Item = Cents>>(amounts: I) -> Cents {
    amounts.into_iter().fold(0, Cents::saturating_add)
}

/// Render cents as Brazilian reais: `R$ 1.234,56`
pub fn format_brl(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let reais = abs / 100;
    let centavos = abs % 100;

    format!("{}R$ {},{:02}", sign, group_thousands(reais), centavos)
}

/// Axis label for charts: `0`, `12k`, `1k`
pub fn format_compact(cents: Cents) -> String {
    if cents == 0 {
        return "0".to_string();
    }
    let thousands = (cents as f64 / 100.0 / 1000.0).round() as i64;
    format!("{}k", thousands)
}

/// Decimal major units (remote `amount` column) to cents
pub fn cents_from_major(amount: f64) -> Cents {
    (amount * 100.0).round() as Cents
}

pub fn major_from_cents(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }

    out
}
