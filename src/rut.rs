//! Chilean RUT (Rol Único Tributario) helpers.
//!
//! A RUT is a decimal body followed by a modulus-11 check character
//! (`0`-`9` or `K`). Every function here works on [`clean`]'s output, so
//! `12.345.678-5`, `0012345678-5` and `123456785` are treated identically.

/// Canonical compact form of a RUT.
///
/// Keeps ASCII digits and `k`/`K`, then strips leading zeros and uppercases.
/// Input with nothing usable yields an empty string.
#[must_use]
pub fn clean(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'k' | 'K'))
        .skip_while(|c| *c == '0')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Computes the modulus-11 check character for a digit body.
///
/// Weights 2,3,4,5,6,7 cycle from the least significant digit. Returns
/// `None` if `body` is empty or contains a non-digit.
#[must_use]
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let remainder = body
        .bytes()
        .rev()
        .zip((2..=7u32).cycle())
        .fold(0u32, |acc, (b, weight)| (acc + u32::from(b - b'0') * weight) % 11);

    match 11 - remainder {
        11 => Some('0'),
        10 => Some('K'),
        d => char::from_digit(d, 10),
    }
}

/// Returns `true` if `input` is a RUT whose check character matches its body.
#[must_use]
pub fn validate(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }

    let cleaned = clean(input);
    if cleaned.len() < 2 {
        return false;
    }

    let (body, dv) = cleaned.split_at(cleaned.len() - 1);
    check_digit(body).is_some_and(|expected| dv.starts_with(expected))
}

/// Display form: body grouped by `.` every three digits, then `-` and the
/// check character (`12.345.678-K`).
///
/// Does not validate. Inputs that clean to one character or fewer come back
/// as cleaned.
#[must_use]
pub fn format(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let cleaned = clean(input);
    if cleaned.len() <= 1 {
        return cleaned;
    }

    let (body, dv) = cleaned.split_at(cleaned.len() - 1);
    let mut out = String::with_capacity(body.len() + body.len() / 3 + 2);
    for (i, c) in body.chars().enumerate() {
        if i > 0 && (body.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out.push('-');
    out.push_str(dv);
    out
}
