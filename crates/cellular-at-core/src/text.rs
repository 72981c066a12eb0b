//! Bounded string helpers for AT response lines.
//!
//! Every helper validates its input before acting: an empty string, or one
//! longer than [`MAX_STRING_SIZE`], is rejected with [`AtError::BadParameter`].
//!
//! Helpers that only shorten a line from either end return a subslice of the
//! input. Helpers that compact a line edit an owned `String` in place. The
//! tokenizers advance a `&str` cursor over the caller's buffer, so a response
//! line can be walked field by field without copying.
//!
//! # Example
//!
//! ```
//! use cellular_at_core::{next_token, remove_outermost_double_quote, remove_prefix};
//!
//! let line = "+COPS: 0,0,\"Carrier\",7";
//! let mut cursor = remove_prefix(line).unwrap().trim_start();
//! assert_eq!(next_token(&mut cursor).unwrap(), "0");
//! assert_eq!(next_token(&mut cursor).unwrap(), "0");
//! let operator = next_token(&mut cursor).unwrap();
//! assert_eq!(remove_outermost_double_quote(operator).unwrap(), "Carrier");
//! ```

use crate::error::{AtError, AtResult};

/// Longest line, in bytes, accepted by the helpers.
pub const MAX_STRING_SIZE: usize = 256;

/// Leading character used by [`is_prefix_present`].
pub const DEFAULT_PREFIX_LEADING_CHARS: &str = "+";

/// Delimiter used by [`next_token`].
pub const DEFAULT_TOKEN_DELIMITER: &str = ",";

/// Outcome of the length check every helper runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Validation {
    Valid,
    Empty,
    TooLarge,
}

pub(crate) fn validate(s: &str) -> Validation {
    if s.is_empty() {
        Validation::Empty
    } else if s.len() > MAX_STRING_SIZE {
        Validation::TooLarge
    } else {
        Validation::Valid
    }
}

fn require_valid(s: &str) -> AtResult<()> {
    match validate(s) {
        Validation::Valid => Ok(()),
        Validation::Empty => Err(AtError::BadParameter("empty string")),
        Validation::TooLarge => Err(AtError::BadParameter("string exceeds maximum size")),
    }
}

/// C `isspace` set, which includes vertical tab.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

// ============================================================================
// Prefix checks
// ============================================================================

/// Check whether `s` has the `+TOKEN:` shape.
pub fn is_prefix_present(s: &str) -> AtResult<bool> {
    is_prefix_present_with(s, DEFAULT_PREFIX_LEADING_CHARS)
}

/// Check whether `s` has the `<lead>TOKEN:` shape for any of `leading_chars`.
///
/// A `:` must exist, the first character must be one of `leading_chars`, and
/// every character between it and the `:` must be ASCII alphanumeric or `_`.
pub fn is_prefix_present_with(s: &str, leading_chars: &str) -> AtResult<bool> {
    require_valid(s)?;

    let Some(colon) = s.find(':') else {
        return Ok(false);
    };

    let mut chars = s[..colon].chars();
    match chars.next() {
        Some(c) if leading_chars.contains(c) => {}
        _ => return Ok(false),
    }

    Ok(chars.all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

/// Literal prefix comparison.
pub fn starts_with(s: &str, prefix: &str) -> AtResult<bool> {
    require_valid(s)?;
    require_valid(prefix)?;
    Ok(s.starts_with(prefix))
}

/// Check `s` against a table of leading tokens, such as a modem's error codes.
pub fn matches_any_prefix<S: AsRef<str>>(s: &str, tokens: &[S]) -> AtResult<bool> {
    require_valid(s)?;
    if tokens.is_empty() {
        return Err(AtError::BadParameter("empty token table"));
    }

    for token in tokens {
        if starts_with(s, token.as_ref())? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Return the text after the first `:`.
pub fn remove_prefix(s: &str) -> AtResult<&str> {
    require_valid(s)?;
    s.find(':')
        .map(|colon| &s[colon + 1..])
        .ok_or(AtError::BadParameter("no ':' in string"))
}

// ============================================================================
// Whitespace and quotes
// ============================================================================

/// Skip leading whitespace.
pub fn remove_leading_whitespace(s: &str) -> AtResult<&str> {
    require_valid(s)?;
    Ok(s.trim_start_matches(is_space))
}

/// Drop trailing whitespace in place.
///
/// Strings of two characters or fewer are left untouched, and the first
/// character is never removed.
pub fn remove_trailing_whitespace(s: &mut String) -> AtResult<()> {
    require_valid(s)?;
    if s.len() > 2 {
        let first_len = s.chars().next().map_or(0, char::len_utf8);
        let keep = first_len + s[first_len..].trim_end_matches(is_space).len();
        s.truncate(keep);
    }
    Ok(())
}

/// Remove every whitespace character in place.
pub fn remove_all_whitespace(s: &mut String) -> AtResult<()> {
    require_valid(s)?;
    s.retain(|c| !is_space(c));
    Ok(())
}

/// Strip a `"` that is exactly the first and/or last character.
///
/// Only applies to strings longer than two characters.
pub fn remove_outermost_double_quote(s: &str) -> AtResult<&str> {
    require_valid(s)?;
    if s.len() <= 2 {
        return Ok(s);
    }

    let s = s.strip_prefix('"').unwrap_or(s);
    Ok(s.strip_suffix('"').unwrap_or(s))
}

/// Remove every `"` in place.
pub fn remove_all_double_quote(s: &mut String) -> AtResult<()> {
    require_valid(s)?;
    s.retain(|c| c != '"');
    Ok(())
}

// ============================================================================
// Tokenizers
// ============================================================================

/// Take the next comma separated field from `cursor`.
///
/// See [`next_specific_token`].
pub fn next_token<'a>(cursor: &mut &'a str) -> AtResult<&'a str> {
    next_specific_token(cursor, DEFAULT_TOKEN_DELIMITER)
}

/// Take the next field delimited by any character of `delimiters`.
///
/// A cursor that starts with the first delimiter yields an empty field, so
/// `"a,,b"` produces `"a"`, `""` and `"b"`. A trailing delimiter is consumed
/// together with the field before it: `"a,"` produces `"a"` and leaves the
/// cursor empty. Calling again on an empty cursor fails with
/// [`AtError::BadParameter`], which ends the walk.
pub fn next_specific_token<'a>(cursor: &mut &'a str, delimiters: &str) -> AtResult<&'a str> {
    let s: &'a str = *cursor;
    require_valid(s)?;
    require_valid(delimiters)?;

    let is_delimiter = |c: char| delimiters.contains(c);

    if let Some(first) = delimiters.chars().next() {
        if let Some(rest) = s.strip_prefix(first) {
            *cursor = rest;
            return Ok(&s[..0]);
        }
    }

    let Some(start) = s.find(|c: char| !is_delimiter(c)) else {
        *cursor = &s[s.len()..];
        return Ok(&s[s.len()..]);
    };

    let body = &s[start..];
    match body.char_indices().find(|&(_, c)| is_delimiter(c)) {
        Some((end, delimiter)) => {
            *cursor = &body[end + delimiter.len_utf8()..];
            Ok(&body[..end])
        }
        None => {
            *cursor = &body[body.len()..];
            Ok(body)
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn nibble(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

/// Decode hex pairs into `out`, returning the number of bytes written.
///
/// An odd trailing character is ignored. A pair whose first character is not
/// a hex digit decodes to `0xFF`.
pub fn hex_to_bytes(s: &str, out: &mut [u8]) -> AtResult<usize> {
    require_valid(s)?;

    let count = s.len() / 2;
    if out.len() < count {
        return Err(AtError::NoMemory {
            needed: count,
            available: out.len(),
        });
    }

    for (slot, pair) in out.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
        *slot = match nibble(pair[0]) {
            Some(high) => (high << 4) | nibble(pair[1]).unwrap_or(0xFF),
            None => 0xFF,
        };
    }
    Ok(count)
}

/// Check that every character is an ASCII digit.
pub fn is_all_digits(s: &str) -> AtResult<bool> {
    require_valid(s)?;
    Ok(s.bytes().all(|b| b.is_ascii_digit()))
}

/// Copy `s` into a new heap allocation.
pub fn duplicate(s: &str) -> AtResult<String> {
    require_valid(s)?;

    let mut owned = String::new();
    owned.try_reserve_exact(s.len()).map_err(|_| AtError::NoMemory {
        needed: s.len(),
        available: 0,
    })?;
    owned.push_str(s);
    Ok(owned)
}

/// Parse a leading integer the way C `strtol` does.
///
/// Leading whitespace and a sign are accepted, base 16 accepts a `0x` prefix,
/// and base 0 picks 16, 8 or 10 from the prefix. Parsing stops at the first
/// character that is not a digit in the base; text after the digits is
/// ignored. Fails with [`AtError::Parse`] when no digit was consumed or the
/// value does not fit an `i32`.
pub fn parse_integer(s: &str, base: u32) -> AtResult<i32> {
    if s.len() > MAX_STRING_SIZE {
        return Err(AtError::BadParameter("string exceeds maximum size"));
    }
    if base == 1 || base > 36 {
        return Err(AtError::BadParameter("base must be 0 or 2..=36"));
    }

    let t = s.trim_start_matches(is_space);
    let (negative, t) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };

    let hex_body = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .filter(|rest| rest.bytes().next().and_then(nibble).is_some());

    let (radix, digits) = match (base, hex_body) {
        (0 | 16, Some(rest)) => (16, rest),
        (0, None) if t.starts_with('0') => (8, t),
        (0, None) => (10, t),
        (b, _) => (b, t),
    };

    let len = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if len == 0 {
        return Err(AtError::Parse(s.to_string()));
    }

    let magnitude = i64::from_str_radix(&digits[..len], radix)
        .map_err(|_| AtError::Parse(s.to_string()))?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| AtError::Parse(s.to_string()))
}
