use crate::domain::rejection::Rejection;
use chrono::{Datelike, NaiveDate, Utc};

/// Card material supplied with a merchant payment.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
}

/// Stateless format check run before any store access.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardValidator;

impl CardValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, card: &CardDetails) -> Result<(), Rejection> {
        self.validate_at(card, Utc::now().date_naive())
    }

    /// Same as [`validate`](Self::validate) with an explicit "today" for the expiry check.
    pub fn validate_at(&self, card: &CardDetails, today: NaiveDate) -> Result<(), Rejection> {
        let number = normalize(&card.number);
        if !luhn(&number) {
            return Err(Rejection::InvalidCard);
        }
        match parse_expiry(&card.expiry) {
            // Valid through the last day of the expiry month.
            Some((year, month)) if (year, month) >= (today.year(), today.month()) => {}
            _ => return Err(Rejection::InvalidCard),
        }
        let cvv_ok = (3..=4).contains(&card.cvv.len()) && card.cvv.bytes().all(|b| b.is_ascii_digit());
        if !cvv_ok {
            return Err(Rejection::InvalidCard);
        }
        Ok(())
    }

    /// Keeps the last four digits, e.g. `****1111`.
    pub fn mask(&self, number: &str) -> String {
        let chars: Vec<char> = normalize(number).chars().collect();
        if chars.len() < 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

/// Keeps ASCII digits only; any separator is accepted.
fn normalize(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn luhn(number: &str) -> bool {
    if !(13..=19).contains(&number.len()) {
        return false;
    }
    let mut sum = 0;
    for (i, c) in number.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

fn parse_expiry(expiry: &str) -> Option<(i32, u32)> {
    let (month, year) = expiry.split_once('/')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(month) || !two_digits(year) {
        return None;
    }
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    (1..=12).contains(&month).then_some((2000 + year, month))
}
