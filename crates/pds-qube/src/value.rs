//! Scalar values appearing on the right-hand side of PVL label assignments.

use chrono::NaiveDateTime;

use crate::time::parse_doy_timestamp;

/// A parsed PVL label value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Quoted character string.
    String(String),
    /// Unquoted word (e.g. `SUN_INTEGER`, `CASSINI-HUYGENS`).
    Symbol(String),
    /// Day-of-year timestamp, resolved to UTC at parse time.
    Time(NaiveDateTime),
    /// Parenthesized sequence `(a, b, c)`.
    Sequence(Vec<Value>),
}

impl Value {
    /// Return the integer content, promoting nothing.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the numeric content as `f64` (integers are promoted).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Return the textual content of a string or symbol value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Return the sequence elements, or a one-element view of a scalar.
    ///
    /// Several QUBE keys (`SUFFIX_ITEMS`, `EXPOSURE_DURATION`) appear both
    /// as scalars and as sequences across the corpus, so lookups that expect
    /// a list accept either.
    pub fn as_sequence(&self) -> Vec<&Value> {
        match self {
            Value::Sequence(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Return the resolved timestamp content.
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// Strip a trailing `<unit>` annotation (e.g. `320 <MS>`) from a value field.
fn strip_units(text: &str) -> &str {
    match text.find('<') {
        Some(idx) => text[..idx].trim_end(),
        None => text,
    }
}

/// Parse the text to the right of a label `=` into a [`Value`].
///
/// The grammar is deliberately minimal: quoted strings, parenthesized
/// sequences, integers, floats (with FITS-style `D` exponents normalized),
/// day-of-year timestamps, and bare symbols. Anything unrecognized falls
/// back to a symbol so that keys this crate never reads cannot make a label
/// unparseable.
pub fn parse_scalar(text: &str) -> Value {
    let text = strip_units(text.trim());

    if let Some(inner) = text
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let items = inner.split(',').map(parse_scalar).collect::<Vec<_>>();
        return Value::Sequence(items);
    }

    if let Some(inner) = quoted_content(text) {
        return Value::String(inner.trim().to_string());
    }

    if let Some(t) = parse_doy_timestamp(text) {
        return Value::Time(t);
    }

    if !text.contains(['.', 'e', 'E', 'D', 'd']) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Integer(n);
        }
    }

    let normalized = text.replace(['D', 'd'], "E");
    if let Ok(f) = normalized.parse::<f64>() {
        return Value::Float(f);
    }

    Value::Symbol(text.to_string())
}

/// Return the content of a single- or double-quoted string, if quoted.
fn quoted_content(text: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Some(inner);
        }
    }
    None
}
