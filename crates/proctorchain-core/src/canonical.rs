//! Canonical JSON encoding used for every hash and signature in the ledger.
//!
//! The encoding is fixed because previously persisted chains must keep
//! verifying:
//!
//!   - object keys sorted by code point
//!   - `", "` between items and `": "` between key and value
//!   - every character outside printable ASCII escaped as `\uXXXX`
//!     (lowercase hex, UTF-16 surrogate pairs above the BMP)
//!   - integers printed as integers; floats in shortest round-trip form,
//!     positional for decimal exponents in `[-4, 16)` and `d.ddde±XX` otherwise
//!
//! Key order is enforced here, not inherited from `serde_json::Map`, so the
//! encoding does not depend on serde_json's `preserve_order` feature.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Number, Value};

use proctorchain_contracts::error::{LedgerError, LedgerResult};

/// Serialize `value` and return its canonical encoding.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> LedgerResult<String> {
    let value = serde_json::to_value(value).map_err(|e| LedgerError::Serialization {
        reason: format!("value cannot be represented as JSON: {}", e),
    })?;
    Ok(encode_value(&value))
}

/// Canonical encoding of an already-built JSON value.
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical encoding of a single string, quotes included.
pub fn encode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(&mut out, s);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{}", i);
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{}", u);
    } else if let Some(f) = n.as_f64() {
        out.push_str(&format_float(f));
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

/// Format a float the way the canonical encoding requires.
///
/// Shortest digits that round-trip, positional notation when the decimal
/// exponent is in `[-4, 16)` (always with a fractional part, so `100.0`),
/// otherwise scientific with a signed, at-least-two-digit exponent (`1e-05`,
/// `2.5e+300`).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.70000000025e9".
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }

    if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() <= int_len {
                out.push_str(&digits);
                out.extend(std::iter::repeat('0').take(int_len - digits.len()));
                out.push_str(".0");
            } else {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            }
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-exponent - 1) as usize));
            out.push_str(&digits);
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{}{:02}", sign, exponent.abs());
    }
    out
}
