// src/value.rs
// Comparison semantics shared by queries, updates and sorting.
//
// A missing field is modelled as `None` ("undefined"), which is distinct from
// an explicit JSON `null`.

use serde_json::Value;
use std::cmp::Ordering;

/// Strict, type-sensitive equality (`===`). Numbers compare as doubles, so
/// `1` and `1.0` are equal; arrays and objects compare structurally.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => deep_equal(a, b),
        _ => false,
    }
}

/// Recursive key/value equality; object key order is irrelevant.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm.iter().all(|(k, xv)| ym.get(k).map_or(false, |yv| deep_equal(xv, yv)))
        }
        _ => strict_eq(a, b),
    }
}

pub fn strict_eq_opt(a: Option<&Value>, b: &Value) -> bool {
    a.map_or(false, |v| strict_eq(v, b))
}

/// Type-coercive equality (`==`).
pub fn loose_eq(a: Option<&Value>, b: &Value) -> bool {
    let a = match a {
        // undefined == null
        None => return b.is_null(),
        Some(v) => v,
    };

    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => deep_equal(a, b),
        (Value::Array(_) | Value::Object(_), _) => {
            loose_eq(Some(&Value::String(js_string(Some(a)))), b)
        }
        (_, Value::Array(_) | Value::Object(_)) => {
            loose_eq(Some(&Value::String(js_string(Some(b)))), a)
        }
        (Value::String(x), Value::String(y)) => x == y,
        _ => {
            let (x, y) = (to_number(Some(a)), to_number(Some(b)));
            x == y
        }
    }
}

/// Relational comparison with JS semantics: two strings compare by UTF-16
/// code units, everything else is coerced to a number. `None` when
/// either side is NaN, which makes every relational test false.
pub fn compare(a: Option<&Value>, b: &Value) -> Option<Ordering> {
    let left = to_primitive(a);
    let right = to_primitive(Some(b));

    match (&left, &right) {
        (Some(Value::String(x)), Some(Value::String(y))) => Some(utf16_cmp(x, y)),
        _ => to_number(left.as_ref()).partial_cmp(&to_number(right.as_ref())),
    }
}

fn utf16_cmp(x: &str, y: &str) -> Ordering {
    x.encode_utf16().cmp(y.encode_utf16())
}

fn to_primitive(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(v @ (Value::Array(_) | Value::Object(_))) => Some(Value::String(js_string(Some(v)))),
        other => other.cloned(),
    }
}

/// Numeric coercion (`Number(v)`).
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => string_to_number(s),
        Some(v @ Value::Array(_)) => to_number(Some(&Value::String(js_string(Some(v))))),
        Some(Value::Object(_)) => f64::NAN,
    }
}

/// `Number(str)`: surrounding whitespace is ignored, blank is 0, and only
/// decimal literals, signed `Infinity` and unsigned `0x`/`0o`/`0b` integers
/// parse. Anything else is NaN.
fn string_to_number(s: &str) -> f64 {
    let trimmed =
        s.trim_matches(|c: char| (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}');

    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let bytes = trimmed.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        let radix = match bytes[1] {
            b'x' | b'X' => Some(16),
            b'o' | b'O' => Some(8),
            b'b' | b'B' => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return radix_integer(&trimmed[2..], radix);
        }
    }

    if is_decimal_literal(trimmed) {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn radix_integer(digits: &str, radix: u32) -> f64 {
    digits
        .chars()
        .try_fold(0.0, |acc: f64, c| c.to_digit(radix).map(|d| acc * radix as f64 + d as f64))
        .unwrap_or(f64::NAN)
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn is_decimal_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) || int_part.len() + frac_part.len() == 0 {
        return false;
    }

    match exponent {
        None => true,
        Some(exponent) => {
            let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            !digits.is_empty() && all_digits(digits)
        }
    }
}

/// String coercion (`String(v)`), used by regex conditions.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                format_double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// `Number.prototype.toString()`: shortest round-trip digits, plain
/// notation for exponents in [-7, 21), exponent notation outside.
fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest digits as `d.ddde<exp>`
    let scientific = format!("{:e}", f.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        let (lead, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", lead, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, sign, e.abs())
        }
    };

    if f < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Total order used for sorting results. Missing values sort first, then by
/// type priority: null < number < string < bool < object < array.
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,

        (Some(Value::Number(n1)), Some(Value::Number(n2))) => {
            let f1 = n1.as_f64().unwrap_or(0.0);
            let f2 = n2.as_f64().unwrap_or(0.0);
            f1.partial_cmp(&f2).unwrap_or(Ordering::Equal)
        }

        (Some(Value::String(s1)), Some(Value::String(s2))) => utf16_cmp(s1, s2),

        (Some(Value::Bool(b1)), Some(Value::Bool(b2))) => b1.cmp(b2),

        (Some(a_val), Some(b_val)) => type_priority(a_val).cmp(&type_priority(b_val)),
    }
}

fn type_priority(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}
