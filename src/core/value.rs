use serde::{Deserialize, Serialize};
use std::fmt;

/// A compile-time literal value.
///
/// Only the primitive kinds a literal node can hold are representable, so a
/// folded [`Evaluation`](crate::compiler::evaluation::Evaluation) can never carry
/// an array, object or reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Val {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>), // binary string literal (b"...")
}

impl Val {
    /// Integer value narrowed to `Int` when it fits, `Long` otherwise.
    pub fn integer(value: i64) -> Val {
        match i32::try_from(value) {
            Ok(i) => Val::Int(i),
            Err(_) => Val::Long(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Int(_) | Val::Long(_) => "int",
            Val::Double(_) => "float",
            Val::String(_) => "string",
            Val::Bytes(_) => "binary string",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Val::Int(_) | Val::Long(_))
    }

    /// Whether concatenating this value changes nothing (null, `""`, `b""`).
    pub fn is_empty_string_like(&self) -> bool {
        match self {
            Val::Null => true,
            Val::String(s) => s.is_empty(),
            Val::Bytes(b) => b.is_empty(),
            Val::Bool(b) => !*b,
            _ => false,
        }
    }

    /// Convert to string following PHP's printable conversion.
    pub fn to_php_string(&self) -> String {
        match self {
            Val::Null => String::new(),
            Val::Bool(true) => "1".to_string(),
            Val::Bool(false) => String::new(),
            Val::Int(i) => i.to_string(),
            Val::Long(i) => i.to_string(),
            Val::Double(f) => format_double(*f),
            Val::String(s) => s.clone(),
            Val::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Val::Bytes(b) => b.clone(),
            other => other.to_php_string().into_bytes(),
        }
    }

    /// Convert to boolean following PHP's truthiness rules.
    pub fn to_bool(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Long(i) => *i != 0,
            Val::Double(f) => *f != 0.0 && !f.is_nan(),
            // Empty string or "0" is false
            Val::String(s) => !(s.is_empty() || s == "0"),
            Val::Bytes(b) => !(b.is_empty() || b.as_slice() == b"0"),
        }
    }

    pub fn to_long(&self) -> i64 {
        match self {
            Val::Null => 0,
            Val::Bool(b) => i64::from(*b),
            Val::Int(i) => i64::from(*i),
            Val::Long(i) => *i,
            Val::Double(f) => *f as i64,
            Val::String(s) => parse_numeric_string(s.as_bytes()).0,
            Val::Bytes(b) => parse_numeric_string(b).0,
        }
    }

    pub fn to_double(&self) -> f64 {
        match self {
            Val::Null => 0.0,
            Val::Bool(b) => f64::from(u8::from(*b)),
            Val::Int(i) => f64::from(*i),
            Val::Long(i) => *i as f64,
            Val::Double(f) => *f,
            Val::String(s) => numeric_string_to_double(s.as_bytes()),
            Val::Bytes(b) => numeric_string_to_double(b),
        }
    }

    /// Numeric view used by arithmetic folding: integers stay integers, everything
    /// else is parsed the way the runtime would.
    fn to_number(&self) -> Number {
        match self {
            Val::Double(f) => Number::Double(*f),
            Val::String(s) => string_number(s.as_bytes()),
            Val::Bytes(b) => string_number(b),
            other => Number::Long(other.to_long()),
        }
    }

    /// Compile-time `.` operator. A binary string operand makes the result binary.
    pub fn concat(&self, other: &Val) -> Val {
        match (self, other) {
            (Val::Bytes(_), _) | (_, Val::Bytes(_)) => {
                let mut bytes = self.to_bytes();
                bytes.extend_from_slice(&other.to_bytes());
                Val::Bytes(bytes)
            }
            _ => {
                let mut s = self.to_php_string();
                s.push_str(&other.to_php_string());
                Val::String(s)
            }
        }
    }

    pub fn add(&self, other: &Val) -> Val {
        arithmetic(self.to_number(), other.to_number(), i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, other: &Val) -> Val {
        arithmetic(self.to_number(), other.to_number(), i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Val) -> Val {
        arithmetic(self.to_number(), other.to_number(), i64::checked_mul, |a, b| a * b)
    }

    pub fn negate(&self) -> Val {
        match self.to_number() {
            Number::Long(i) => match i.checked_neg() {
                Some(n) => Val::integer(n),
                None => Val::Double(-(i as f64)),
            },
            Number::Double(f) => Val::Double(-f),
        }
    }

    /// Unary `+`: numeric conversion.
    pub fn identity(&self) -> Val {
        match self.to_number() {
            Number::Long(i) => Val::integer(i),
            Number::Double(f) => Val::Double(f),
        }
    }

    /// Bitwise negation; only defined for numbers and strings.
    pub fn bit_not(&self) -> Option<Val> {
        match self {
            Val::Int(_) | Val::Long(_) | Val::Double(_) => Some(Val::integer(!self.to_long())),
            Val::String(s) => {
                let flipped: Vec<u8> = s.bytes().map(|b| !b).collect();
                Some(Val::Bytes(flipped))
            }
            Val::Bytes(b) => Some(Val::Bytes(b.iter().map(|b| !b).collect())),
            Val::Null | Val::Bool(_) => None,
        }
    }

    /// `===` on literal values; `Int` and `Long` are the same PHP type.
    pub fn identical(&self, other: &Val) -> bool {
        match (self, other) {
            (a, b) if a.is_integer() && b.is_integer() => a.to_long() == b.to_long(),
            (Val::String(a), Val::Bytes(b)) | (Val::Bytes(b), Val::String(a)) => {
                a.as_bytes() == b.as_slice()
            }
            (a, b) => a == b,
        }
    }

    /// Loose `<` comparison.
    pub fn less_than(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::String(_) | Val::Bytes(_), Val::String(_) | Val::Bytes(_))
                if !(is_numeric(self) && is_numeric(other)) =>
            {
                self.to_bytes() < other.to_bytes()
            }
            (Val::Bool(_) | Val::Null, _) | (_, Val::Bool(_) | Val::Null) => {
                !self.to_bool() & other.to_bool()
            }
            _ => match (self.to_number(), other.to_number()) {
                (Number::Long(a), Number::Long(b)) => a < b,
                (a, b) => a.as_f64() < b.as_f64(),
            },
        }
    }

    /// Whether this value used as an array key addresses the integer part of the table.
    pub fn is_integer_key(&self) -> bool {
        match self {
            Val::Int(_) | Val::Long(_) | Val::Bool(_) | Val::Double(_) => true,
            Val::String(s) => is_canonical_integer(s.as_bytes()),
            Val::Bytes(b) => is_canonical_integer(b),
            Val::Null => false,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => f.write_str("null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::String(s) => write!(f, "{:?}", s),
            Val::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            other => f.write_str(&other.to_php_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Long(i64),
    Double(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Long(i) => i as f64,
            Number::Double(f) => f,
        }
    }
}

fn arithmetic(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Val {
    match (a, b) {
        (Number::Long(x), Number::Long(y)) => match int_op(x, y) {
            Some(r) => Val::integer(r),
            // integer overflow promotes to float
            None => Val::Double(float_op(x as f64, y as f64)),
        },
        (x, y) => Val::Double(float_op(x.as_f64(), y.as_f64())),
    }
}

fn format_double(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.0}", f)
    } else {
        format!("{}", f)
    }
}

fn trim_leading_whitespace(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0B' | b'\x0C'))
        .unwrap_or(s.len());
    &s[start..]
}

/// Parse a numeric string prefix to an integer, returning `(value, is_float)`.
fn parse_numeric_string(s: &[u8]) -> (i64, bool) {
    let trimmed = trim_leading_whitespace(s);
    if trimmed.is_empty() {
        return (0, false);
    }

    let Ok(text) = std::str::from_utf8(trimmed) else {
        return (0, false);
    };
    if let Ok(i) = text.trim_end().parse::<i64>() {
        return (i, false);
    }
    if let Ok(f) = text.trim_end().parse::<f64>() {
        return (f as i64, true);
    }

    // leading-digits prefix ("12abc" is 12)
    let digits: String = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(_, c)| c)
        .collect();
    (digits.parse::<i64>().unwrap_or(0), false)
}

fn numeric_string_to_double(s: &[u8]) -> f64 {
    let (int_val, is_float) = parse_numeric_string(s);
    if is_float {
        std::str::from_utf8(trim_leading_whitespace(s))
            .ok()
            .and_then(|t| t.trim_end().parse::<f64>().ok())
            .unwrap_or(int_val as f64)
    } else {
        int_val as f64
    }
}

fn string_number(s: &[u8]) -> Number {
    match parse_numeric_string(s) {
        (_, true) => Number::Double(numeric_string_to_double(s)),
        (i, false) => Number::Long(i),
    }
}

fn is_numeric(val: &Val) -> bool {
    let bytes = val.to_bytes();
    let text = std::str::from_utf8(trim_leading_whitespace(&bytes)).unwrap_or("");
    !text.is_empty() && text.trim_end().parse::<f64>().is_ok()
}

/// `"12"` is an integer key, `"012"`, `"1.5"` and `" 1"` are not.
fn is_canonical_integer(s: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(s) else {
        return false;
    };
    match text.parse::<i64>() {
        Ok(i) => i.to_string() == text,
        Err(_) => false,
    }
}
