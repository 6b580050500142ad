use std::{fmt, ops::RangeInclusive};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// A configuration value after string coercion.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Range(RangeInclusive<i64>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

static INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?\d+$").expect("int pattern is valid"));
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\d+\.\d*|\.\d+|\d+)([eE][-+]?\d+)?$").expect("float pattern is valid")
});
static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+)\s*\.\.\s*(-?\d+)$").expect("range pattern is valid")
});

/// Heuristically converts a raw configuration string into a typed value.
///
/// Quoted strings are never converted. Lists (`[a, b]`) and maps
/// (`{a: 1, b = 2}`) are converted recursively. Anything unrecognized stays a
/// string.
pub fn parse(input: &str) -> Value {
    let s = input.trim();
    if let Some(inner) = unquote(s) {
        return Value::Str(inner.to_owned());
    }
    match s.to_ascii_lowercase().as_str() {
        "" => return Value::Str(String::new()),
        "null" | "~" => return Value::Null,
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        _ => {}
    }
    if INT.is_match(s) {
        if let Ok(i) = s.parse() {
            return Value::Int(i);
        }
    }
    if let Some(captures) = RANGE.captures(s) {
        if let (Ok(start), Ok(end)) = (captures[1].parse(), captures[2].parse()) {
            return Value::Range(start..=end);
        }
    }
    if FLOAT.is_match(s) {
        if let Ok(f) = s.parse() {
            return Value::Float(f);
        }
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return Value::List(split_top_level(inner).into_iter().map(parse).collect());
    }
    if let Some(inner) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if let Some(map) = parse_map(inner) {
            return Value::Map(map);
        }
    }
    Value::Str(s.to_owned())
}

fn unquote(s: &str) -> Option<&str> {
    if s.len() < 2 {
        return None;
    }
    ['"', '\'']
        .into_iter()
        .find_map(|q| s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
}

fn parse_map(inner: &str) -> Option<IndexMap<String, Value>> {
    let mut map = IndexMap::new();
    for entry in split_top_level(inner) {
        let (key, value) = entry.split_once([':', '='])?;
        let key = key.trim();
        let key = unquote(key).unwrap_or(key);
        map.insert(key.to_owned(), parse(value));
    }
    Some(map)
}

/// Splits on commas that are not nested inside brackets, braces or quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return vec![];
    }
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '{') => depth += 1,
            (None, ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Range(r) => write!(f, "{}..{}", r.start(), r.end()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Str(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(x) => Value::Float(x),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::Str(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Map(
                table
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Applies `parse` to string values, recursing into lists and maps.
    pub fn coerce(self) -> Value {
        match self {
            Value::Str(s) => parse(&s),
            Value::List(items) => Value::List(items.into_iter().map(Value::coerce).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.coerce()))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Conversion from a coerced configuration value into a concrete scalar.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

macro_rules! from_int_value {
    ($($Int:ty),*) => {
        $(
            impl FromValue for $Int {
                fn from_value(value: &Value) -> Option<Self> {
                    i64::from_value(value).and_then(|i| i.try_into().ok())
                }
            }
        )*
    };
}
from_int_value!(i32, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::List(_) | Value::Map(_) => None,
            scalar => Some(scalar.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("42", Value::Int(42))]
    #[case("-7", Value::Int(-7))]
    #[case("3.5", Value::Float(3.5))]
    #[case("1e3", Value::Float(1000.0))]
    #[case("true", Value::Bool(true))]
    #[case("Off", Value::Bool(false))]
    #[case("null", Value::Null)]
    #[case("1..5", Value::Range(1..=5))]
    #[case("\"42\"", Value::Str("42".into()))]
    #[case("  padded ", Value::Str("padded".into()))]
    #[case("http://localhost:8080/", Value::Str("http://localhost:8080/".into()))]
    #[case("", Value::Str(String::new()))]
    fn parses_scalars(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(expected, parse(input));
    }

    #[test]
    fn parses_nested_lists_and_maps() {
        let value = parse("[1, two, [3, 4], {a: 1, 'b' = \"x, y\"}]");
        let mut map = IndexMap::new();
        map.insert("a".to_owned(), Value::Int(1));
        map.insert("b".to_owned(), Value::Str("x, y".into()));
        assert_eq!(
            Value::List(vec![
                Value::Int(1),
                Value::Str("two".into()),
                Value::List(vec![Value::Int(3), Value::Int(4)]),
                Value::Map(map),
            ]),
            value
        );
        assert_eq!(Value::List(vec![]), parse("[]"));
    }

    #[test]
    fn malformed_maps_stay_strings() {
        assert_eq!(Value::Str("{not a map}".into()), parse("{not a map}"));
    }

    #[test]
    fn coerce_recurses_into_collections() {
        let raw = Value::List(vec![Value::Str("1".into()), Value::Str("yes".into())]);
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Bool(true)]),
            raw.coerce()
        );
    }

    #[test]
    fn converts_to_scalars() {
        assert_eq!(Some(8080u16), u16::from_value(&Value::Int(8080)));
        assert_eq!(None, u16::from_value(&Value::Int(-1)));
        assert_eq!(Some(2.0), f64::from_value(&Value::Int(2)));
        assert_eq!(Some("8080".to_owned()), String::from_value(&Value::Int(8080)));
        assert_eq!(None, bool::from_value(&Value::Str("true".into())));
    }
}
