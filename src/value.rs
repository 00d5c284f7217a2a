//! Typed interpretation of stored strings.
//!
//! Every interpreter is a pure function from a borrowed byte slice to
//! a typed scalar: what the document stores is text, and what type it
//! is read as is the caller's choice at read time. `"0x10"` is 16 as
//! an integer and 16.0 as a float; `"1e3"` is 1000 as an integer even
//! though it is written in float notation.
//!
//! Out-of-range values are clamped, not rejected: [Num] carries both
//! the result and whether clamping happened, and [Num::strict] turns a
//! clamped result back into [Error::ValueRange] for callers that want
//! the hard failure.

use crate::document::SectionKind;
use crate::error::{Error, Result};

/// An interpreted number: the parsed value, flagged when it had to be
/// clamped to the target type's range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num<T> {
    /// The text's value, exactly representable.
    Exact(T),
    /// The nearest representable value to what the text said.
    Clamped(T),
}

impl<T> Num<T> {
    /// The parsed value, clamped or not.
    pub fn get(self) -> T {
        match self {
            Num::Exact(value) | Num::Clamped(value) => value,
        }
    }

    pub fn is_clamped(&self) -> bool {
        matches!(self, Num::Clamped(_))
    }

    /// The value, or [Error::ValueRange] if it was clamped.
    pub fn strict(self) -> Result<T> {
        match self {
            Num::Exact(value) => Ok(value),
            Num::Clamped(_) => Err(Error::ValueRange),
        }
    }
}

/// Exactly one of `true`, `True`, `TRUE`, `false`, `False`, `FALSE`;
/// no surrounding whitespace, no other spellings.
pub fn to_bool(bytes: &[u8]) -> Result<bool> {
    match bytes {
        b"true" | b"True" | b"TRUE" => Ok(true),
        b"false" | b"False" | b"FALSE" => Ok(false),
        _ => Err(Error::ValueFormat),
    }
}

/// Requires a `{}` or `[]` prefix and returns the referent name, which
/// stands literally as stored: it is not re-parsed, and an empty name
/// is legal syntax that can never resolve.
pub fn section_ref(bytes: &[u8]) -> Result<(SectionKind, &[u8])> {
    let bytes = skip_whitespace(bytes);
    if let Some(name) = bytes.strip_prefix(b"{}") {
        Ok((SectionKind::Table, name))
    } else if let Some(name) = bytes.strip_prefix(b"[]") {
        Ok((SectionKind::Array, name))
    } else {
        Err(Error::ValueFormat)
    }
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// `[-]0x`/`0o`/`0b` (either case). The sign is applied after the
/// digits; a `+` is never part of a prefix.
fn base_prefix(bytes: &[u8]) -> Option<(bool, u32, &[u8])> {
    let (negative, rest) = match bytes.first() {
        Some(&b'-') => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    if rest.first() != Some(&b'0') {
        return None;
    }
    let base = match rest.get(1) {
        Some(&b'x') | Some(&b'X') => 16,
        Some(&b'o') | Some(&b'O') => 8,
        Some(&b'b') | Some(&b'B') => 2,
        _ => return None,
    };
    Some((negative, base, &rest[2..]))
}

/// Greedy digit scan in `base`. Returns the accumulated magnitude
/// (None once it no longer fits in a u64) and how many digit bytes
/// were consumed.
fn scan_digits(bytes: &[u8], base: u32) -> (Option<u64>, usize) {
    let mut value: Option<u64> = Some(0);
    let mut consumed = 0;
    for &byte in bytes {
        let digit = match (byte as char).to_digit(base) {
            Some(digit) => u64::from(digit),
            None => break,
        };
        consumed += 1;
        value = value
            .and_then(|v| v.checked_mul(u64::from(base)))
            .and_then(|v| v.checked_add(digit));
    }
    (value, consumed)
}

/// Length of the longest decimal-float prefix: sign, digits, an
/// optional fraction, an optional exponent with at least one digit.
fn scan_decimal_float(bytes: &[u8]) -> usize {
    let mut at = 0;
    if matches!(bytes.first(), Some(&b'+') | Some(&b'-')) {
        at += 1;
    }
    let mut mantissa = 0;
    while bytes.get(at).is_some_and(|b| b.is_ascii_digit()) {
        at += 1;
        mantissa += 1;
    }
    if bytes.get(at) == Some(&b'.') {
        at += 1;
        while bytes.get(at).is_some_and(|b| b.is_ascii_digit()) {
            at += 1;
            mantissa += 1;
        }
    }
    if mantissa == 0 {
        return 0;
    }
    if matches!(bytes.get(at), Some(&b'e') | Some(&b'E')) {
        let mut exp = at + 1;
        if matches!(bytes.get(exp), Some(&b'+') | Some(&b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(|b| b.is_ascii_digit()) {
            while bytes.get(exp).is_some_and(|b| b.is_ascii_digit()) {
                exp += 1;
            }
            at = exp;
        }
    }
    at
}

fn parse_decimal_f64(bytes: &[u8]) -> Option<f64> {
    let len = scan_decimal_float(bytes);
    if len == 0 {
        return None;
    }
    core::str::from_utf8(&bytes[..len]).ok()?.parse::<f64>().ok()
}

/// The sign/digits/fallback core shared by the signed and unsigned
/// readers: magnitude plus sign, clamped into u64, or the rounded
/// float when the text turns out to be written as a decimal float.
enum Scanned {
    /// (negative, magnitude); magnitude is None on u64 overflow.
    Int(bool, Option<u64>),
    /// A `./e/E` followed the decimal digits: the value is the float,
    /// to be rounded toward zero.
    Float(f64),
}

fn scan_number(bytes: &[u8]) -> Result<Scanned> {
    let bytes = skip_whitespace(bytes);
    if let Some((negative, base, digits)) = base_prefix(bytes) {
        let (value, consumed) = scan_digits(digits, base);
        if consumed == 0 {
            return Err(Error::ValueFormat);
        }
        return Ok(Scanned::Int(negative, value));
    }
    let (negative, rest) = match bytes.first() {
        Some(&b'-') => (true, &bytes[1..]),
        Some(&b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    let (value, consumed) = scan_digits(rest, 10);
    // Float fallback: digits running into '.', 'e' or 'E' mean the
    // value was written as a decimal float. This also catches ".5",
    // where no digit precedes the dot.
    if matches!(rest.get(consumed), Some(&b'.') | Some(&b'e') | Some(&b'E')) {
        return match parse_decimal_f64(bytes) {
            Some(float) => Ok(Scanned::Float(float)),
            None => Err(Error::ValueFormat),
        };
    }
    if consumed == 0 {
        return Err(Error::ValueFormat);
    }
    Ok(Scanned::Int(negative, value))
}

/// 64-bit signed read; the core integer interpreter.
pub fn to_i64(bytes: &[u8]) -> Result<Num<i64>> {
    match scan_number(bytes)? {
        Scanned::Int(negative, magnitude) => Ok(signed_from_magnitude(negative, magnitude)),
        Scanned::Float(float) => Ok(float_to_signed(float)),
    }
}

/// 64-bit unsigned read. A negative input clamps to zero.
pub fn to_u64(bytes: &[u8]) -> Result<Num<u64>> {
    match scan_number(bytes)? {
        Scanned::Int(negative, magnitude) => Ok(match (negative, magnitude) {
            (true, Some(0)) => Num::Exact(0),
            (true, _) => Num::Clamped(0),
            (false, Some(value)) => Num::Exact(value),
            (false, None) => Num::Clamped(u64::MAX),
        }),
        Scanned::Float(float) => {
            Ok(if float >= u64::MAX as f64 {
                Num::Clamped(u64::MAX)
            } else if float <= -1.0 {
                Num::Clamped(0)
            } else {
                // The cast truncates toward zero (and pins a negative
                // fraction at 0).
                let rounded = float as u64;
                if rounded as f64 == float {
                    Num::Exact(rounded)
                } else {
                    Num::Clamped(rounded)
                }
            })
        }
    }
}

fn signed_from_magnitude(negative: bool, magnitude: Option<u64>) -> Num<i64> {
    const MIN_MAG: u64 = i64::MAX as u64 + 1;
    match (negative, magnitude) {
        (false, Some(value)) if value <= i64::MAX as u64 => Num::Exact(value as i64),
        (false, _) => Num::Clamped(i64::MAX),
        (true, Some(value)) if value < MIN_MAG => Num::Exact(-(value as i64)),
        (true, Some(value)) if value == MIN_MAG => Num::Exact(i64::MIN),
        (true, _) => Num::Clamped(i64::MIN),
    }
}

fn float_to_signed(float: f64) -> Num<i64> {
    if float >= i64::MAX as f64 {
        Num::Clamped(i64::MAX)
    } else if float < i64::MIN as f64 {
        Num::Clamped(i64::MIN)
    } else {
        // The cast truncates toward zero.
        let rounded = float as i64;
        if rounded as f64 == float {
            Num::Exact(rounded)
        } else {
            Num::Clamped(rounded)
        }
    }
}

macro_rules! narrow_signed {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(bytes: &[u8]) -> Result<Num<$ty>> {
            let num = to_i64(bytes)?;
            let clamped = num.is_clamped();
            let value = num.get();
            Ok(if value > <$ty>::MAX as i64 {
                Num::Clamped(<$ty>::MAX)
            } else if value < <$ty>::MIN as i64 {
                Num::Clamped(<$ty>::MIN)
            } else if clamped {
                Num::Clamped(value as $ty)
            } else {
                Num::Exact(value as $ty)
            })
        }
    };
}

macro_rules! narrow_unsigned {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(bytes: &[u8]) -> Result<Num<$ty>> {
            let num = to_u64(bytes)?;
            let clamped = num.is_clamped();
            let value = num.get();
            Ok(if value > <$ty>::MAX as u64 {
                Num::Clamped(<$ty>::MAX)
            } else if clamped {
                Num::Clamped(value as $ty)
            } else {
                Num::Exact(value as $ty)
            })
        }
    };
}

narrow_signed!(
    /// 32-bit signed read via the 64-bit reader and a clamping cast.
    to_i32, i32
);
narrow_signed!(
    /// 16-bit signed read via the 64-bit reader and a clamping cast.
    to_i16, i16
);
narrow_signed!(
    /// 8-bit signed read via the 64-bit reader and a clamping cast.
    to_i8, i8
);
narrow_unsigned!(
    /// 32-bit unsigned read via the 64-bit reader and a clamping cast.
    to_u32, u32
);
narrow_unsigned!(
    /// 16-bit unsigned read via the 64-bit reader and a clamping cast.
    to_u16, u16
);
narrow_unsigned!(
    /// 8-bit unsigned read via the 64-bit reader and a clamping cast.
    to_u8, u8
);

/// 64-bit float read. A base prefix goes through the integer reader
/// and a cast, which loses precision above 2^53; decimal text that
/// overflows clamps to ±MAX. Underflow to zero is not an error.
pub fn to_f64(bytes: &[u8]) -> Result<Num<f64>> {
    let trimmed = skip_whitespace(bytes);
    if base_prefix(trimmed).is_some() {
        return Ok(match scan_number(trimmed)? {
            Scanned::Int(negative, magnitude) => {
                let sign = if negative { -1.0 } else { 1.0 };
                match magnitude {
                    Some(value) => Num::Exact(sign * value as f64),
                    None => Num::Clamped(sign * u64::MAX as f64),
                }
            }
            // base_prefix matched, so the scan cannot take the
            // decimal-float path.
            Scanned::Float(float) => Num::Exact(float),
        });
    }
    match parse_decimal_f64(trimmed) {
        Some(float) if float.is_infinite() => Ok(Num::Clamped(if float > 0.0 {
            f64::MAX
        } else {
            -f64::MAX
        })),
        Some(float) => Ok(Num::Exact(float)),
        None => Err(Error::ValueFormat),
    }
}

/// 32-bit float read; same rules as [to_f64] with the narrower range.
pub fn to_f32(bytes: &[u8]) -> Result<Num<f32>> {
    let num = to_f64(bytes)?;
    let clamped = num.is_clamped();
    let value = num.get();
    Ok(if value > f64::from(f32::MAX) {
        Num::Clamped(f32::MAX)
    } else if value < f64::from(-f32::MAX) {
        Num::Clamped(-f32::MAX)
    } else if clamped {
        Num::Clamped(value as f32)
    } else {
        Num::Exact(value as f32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_are_strict() {
        assert_eq!(to_bool(b"true"), Ok(true));
        assert_eq!(to_bool(b"TRUE"), Ok(true));
        assert_eq!(to_bool(b"False"), Ok(false));
        assert_eq!(to_bool(b" true"), Err(Error::ValueFormat));
        assert_eq!(to_bool(b"tRue"), Err(Error::ValueFormat));
        assert_eq!(to_bool(b"1"), Err(Error::ValueFormat));
    }

    #[test]
    fn decimal_integers() {
        assert_eq!(to_i64(b"42"), Ok(Num::Exact(42)));
        assert_eq!(to_i64(b"  -7"), Ok(Num::Exact(-7)));
        assert_eq!(to_i64(b"+9"), Ok(Num::Exact(9)));
        assert_eq!(to_i64(b""), Err(Error::ValueFormat));
        assert_eq!(to_i64(b"zip"), Err(Error::ValueFormat));
        // Trailing junk after the digits is ignored.
        assert_eq!(to_i64(b"12cm"), Ok(Num::Exact(12)));
    }

    #[test]
    fn base_prefixes() {
        assert_eq!(to_i64(b"0x10"), Ok(Num::Exact(16)));
        assert_eq!(to_i64(b"0XfF"), Ok(Num::Exact(255)));
        assert_eq!(to_i64(b"0o17"), Ok(Num::Exact(15)));
        assert_eq!(to_i64(b"0b101"), Ok(Num::Exact(5)));
        assert_eq!(to_i64(b"-0x10"), Ok(Num::Exact(-16)));
        assert_eq!(to_i64(b"0x"), Err(Error::ValueFormat));
        // '+' is not part of a prefix: the decimal reader sees "0" and
        // stops at the 'x'.
        assert_eq!(to_i64(b"+0x10"), Ok(Num::Exact(0)));
    }

    #[test]
    fn float_fallback() {
        assert_eq!(to_i32(b"1e3"), Ok(Num::Exact(1000)));
        assert_eq!(to_i32(b"1.5"), Ok(Num::Clamped(1)));
        assert_eq!(to_i32(b"-2.5"), Ok(Num::Clamped(-2)));
        assert_eq!(to_i32(b".5"), Ok(Num::Clamped(0)));
        assert_eq!(to_i64(b"1e30"), Ok(Num::Clamped(i64::MAX)));
        assert_eq!(to_u64(b"-1.5"), Ok(Num::Clamped(0)));
    }

    #[test]
    fn narrow_widths_clamp() {
        assert_eq!(to_i8(b"-0xFF"), Ok(Num::Clamped(-128)));
        assert_eq!(to_i8(b"-0x80"), Ok(Num::Exact(-128)));
        assert_eq!(to_i8(b"127"), Ok(Num::Exact(127)));
        assert_eq!(to_i8(b"128"), Ok(Num::Clamped(127)));
        assert_eq!(to_u8(b"0x100"), Ok(Num::Clamped(255)));
        assert_eq!(to_u8(b"-1"), Ok(Num::Clamped(0)));
        assert_eq!(to_u8(b"-0"), Ok(Num::Exact(0)));
        assert_eq!(to_u16(b"65535"), Ok(Num::Exact(65535)));
        assert_eq!(to_i16(b"-40000"), Ok(Num::Clamped(i16::MIN)));
    }

    #[test]
    fn sixty_four_bit_edges() {
        assert_eq!(
            to_i64(b"-9223372036854775808"),
            Ok(Num::Exact(i64::MIN))
        );
        assert_eq!(to_i64(b"9223372036854775808"), Ok(Num::Clamped(i64::MAX)));
        assert_eq!(
            to_u64(b"18446744073709551615"),
            Ok(Num::Exact(u64::MAX))
        );
        assert_eq!(to_u64(b"18446744073709551616"), Ok(Num::Clamped(u64::MAX)));
    }

    #[test]
    fn floats() {
        assert_eq!(to_f64(b"1.25"), Ok(Num::Exact(1.25)));
        assert_eq!(to_f64(b" -2e2"), Ok(Num::Exact(-200.0)));
        assert_eq!(to_f64(b"0x10"), Ok(Num::Exact(16.0)));
        assert_eq!(to_f64(b"-0b11"), Ok(Num::Exact(-3.0)));
        assert_eq!(to_f64(b"1e999"), Ok(Num::Clamped(f64::MAX)));
        assert_eq!(to_f64(b"-1e999"), Ok(Num::Clamped(-f64::MAX)));
        assert_eq!(to_f64(b"1e-999"), Ok(Num::Exact(0.0)));
        assert_eq!(to_f64(b"nope"), Err(Error::ValueFormat));
        assert_eq!(to_f32(b"1e39"), Ok(Num::Clamped(f32::MAX)));
        assert_eq!(to_f32(b"0.5"), Ok(Num::Exact(0.5)));
    }

    #[test]
    fn interpretation_is_pure() {
        let bytes = b" -0x7f";
        assert_eq!(to_i64(bytes), to_i64(bytes));
        assert_eq!(to_i8(bytes), to_i8(bytes));
        assert_eq!(to_f64(bytes), to_f64(bytes));
    }

    #[test]
    fn section_refs() {
        assert_eq!(
            section_ref(b"{}a"),
            Ok((SectionKind::Table, &b"a"[..]))
        );
        assert_eq!(
            section_ref(b"  []rows"),
            Ok((SectionKind::Array, &b"rows"[..]))
        );
        // Nameless is legal syntax referring to nothing.
        assert_eq!(section_ref(b"{}"), Ok((SectionKind::Table, &b""[..])));
        assert_eq!(section_ref(b"{a}"), Err(Error::ValueFormat));
        assert_eq!(section_ref(b"plain"), Err(Error::ValueFormat));
    }
}
