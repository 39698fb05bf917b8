// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub const CNPJ_LEN: usize = 14;

const FIRST_DIGIT_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_DIGIT_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidLength,
    RepeatedDigits,
    CheckDigitMismatch,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength => f.write_str("CNPJ must have 14 digits"),
            Self::RepeatedDigits => f.write_str("CNPJ cannot repeat a single digit"),
            Self::CheckDigitMismatch => f.write_str("CNPJ check digits do not match"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn normalize_cnpj(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn validate_cnpj(raw: &str) -> ValidationResult<()> {
    let digits = normalize_cnpj(raw);
    if digits.len() != CNPJ_LEN {
        return Err(ValidationError::InvalidLength);
    }
    let bytes = digits.as_bytes();
    if bytes.iter().all(|byte| *byte == bytes[0]) {
        return Err(ValidationError::RepeatedDigits);
    }

    let (first, second) =
        cnpj_check_digits(&digits[..12]).ok_or(ValidationError::InvalidLength)?;
    if digit_at(bytes, 12) != first || digit_at(bytes, 13) != second {
        return Err(ValidationError::CheckDigitMismatch);
    }
    Ok(())
}

pub fn is_valid_cnpj(raw: &str) -> bool {
    validate_cnpj(raw).is_ok()
}

/// Computes both check digits for the first twelve digits of a CNPJ.
pub fn cnpj_check_digits(base: &str) -> Option<(u8, u8)> {
    let bytes = base.as_bytes();
    if bytes.len() != 12 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let first = check_digit(bytes, &FIRST_DIGIT_WEIGHTS);
    let mut extended = bytes.to_vec();
    extended.push(b'0' + first);
    let second = check_digit(&extended, &SECOND_DIGIT_WEIGHTS);
    Some((first, second))
}

pub fn format_cnpj(raw: &str) -> String {
    let digits = normalize_cnpj(raw);
    if digits.len() != CNPJ_LEN {
        return raw.to_owned();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}

pub fn format_reais(value: f64) -> String {
    let cents = if value.is_finite() {
        (value * 100.0).round() as i64
    } else {
        0
    };
    let (sign, cents) = normalize_sign(cents);
    let whole = cents / 100;
    let remainder = cents % 100;
    format!("{sign}R$ {},{:02}", dot_format(whole), remainder)
}

fn check_digit(digits: &[u8], weights: &[u32]) -> u8 {
    let sum: u32 = digits
        .iter()
        .zip(weights)
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { (11 - remainder) as u8 }
}

fn digit_at(bytes: &[u8], index: usize) -> u8 {
    bytes[index] - b'0'
}

fn dot_format(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push('.');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    if cents >= 0 {
        return ("", cents);
    }
    if cents == i64::MIN {
        ("-", i64::MAX)
    } else {
        ("-", -cents)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ValidationError, cnpj_check_digits, format_cnpj, format_reais, is_valid_cnpj,
        normalize_cnpj, validate_cnpj,
    };
    use std::collections::BTreeMap;

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_cnpj("11.222.333/0001-81"), "11222333000181");
        assert_eq!(normalize_cnpj(" abc "), "");
    }

    #[test]
    fn validate_accepts_known_good_identifiers() {
        for input in ["11222333000181", "11.222.333/0001-81", "12345678000195"] {
            assert_eq!(validate_cnpj(input), Ok(()), "input {input}");
        }
    }

    #[test]
    fn validate_reports_each_failure_kind() {
        let cases = BTreeMap::from([
            ("123", ValidationError::InvalidLength),
            ("", ValidationError::InvalidLength),
            ("11111111111111", ValidationError::RepeatedDigits),
            ("12345678000190", ValidationError::CheckDigitMismatch),
            ("11222333000182", ValidationError::CheckDigitMismatch),
        ]);
        for (input, expected) in cases {
            assert_eq!(validate_cnpj(input), Err(expected), "input {input}");
        }
        assert!(!is_valid_cnpj("12345678000190"));
    }

    #[test]
    fn check_digits_match_validation() {
        assert_eq!(cnpj_check_digits("112223330001"), Some((8, 1)));
        assert_eq!(cnpj_check_digits("123456780001"), Some((9, 5)));
        assert_eq!(cnpj_check_digits("12345"), None);
        assert_eq!(cnpj_check_digits("12345678000a"), None);
    }

    #[test]
    fn format_cnpj_masks_full_identifiers_only() {
        assert_eq!(format_cnpj("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_cnpj("123"), "123");
    }

    #[test]
    fn format_reais_uses_brazilian_separators() {
        assert_eq!(format_reais(4200.0), "R$ 4.200,00");
        assert_eq!(format_reais(150000.5), "R$ 150.000,50");
        assert_eq!(format_reais(0.0), "R$ 0,00");
        assert_eq!(format_reais(-10.5), "-R$ 10,50");
        assert_eq!(format_reais(f64::NAN), "R$ 0,00");
    }
}
