//! Named postfix transforms applied with `value | name` or `value | name:arg`.
//!
//! Every built-in is total: input it cannot work with comes back as its
//! display string (null and undefined are passed through untouched so a
//! later default step can still replace them).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::PipeConfig;
use crate::value::{format_number, Value};

pub type PipeFn = Arc<dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct PipeRegistry {
    pipes: HashMap<String, PipeFn>,
}

impl std::fmt::Debug for PipeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("PipeRegistry").field("pipes", &names).finish()
    }
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(config: &PipeConfig) -> Self {
        let mut registry = Self::new();

        registry.register("percent", pipe_percent);
        registry.register("number", pipe_number);
        let currency = config.default_currency.clone();
        registry.register("currency", move |value, arg| {
            pipe_currency(value, arg, &currency)
        });
        registry.register("date", |value, arg| {
            format_date_value(value, arg, DateStyle::Medium, DateParts::Date)
        });
        registry.register("time", |value, arg| {
            format_date_value(value, arg, DateStyle::Short, DateParts::Time)
        });
        registry.register("datetime", |value, arg| {
            format_date_value(value, arg, DateStyle::Medium, DateParts::Both)
        });
        registry.register("upper", |value, _| map_text(value, |s| s.to_uppercase()));
        registry.register("lower", |value, _| map_text(value, |s| s.to_lowercase()));
        registry.register("trim", |value, _| map_text(value, |s| s.trim().to_string()));
        registry.register("capitalize", |value, _| map_text(value, capitalize));
        registry.register("length", pipe_length);
        let separator = config.join_separator.clone();
        registry.register("join", move |value, arg| pipe_join(value, arg, &separator));
        let truncate_length = config.truncate_length;
        registry.register("truncate", move |value, arg| {
            pipe_truncate(value, arg, truncate_length)
        });
        registry.register("default", pipe_default);
        registry.register("first", |value, _| pipe_edge(value, Edge::First));
        registry.register("last", |value, _| pipe_edge(value, Edge::Last));
        registry.register("abs", |value, _| match numeric(value) {
            Some(n) => Value::Number(n.abs()),
            None => passthrough(value),
        });
        registry.register("round", pipe_round);
        registry.register("selectattr", |value, arg| filter_by_attr(value, arg, true));
        registry.register("rejectattr", |value, arg| filter_by_attr(value, arg, false));
        registry.register("pluralize", pipe_pluralize);
        registry.register("json", |value, _| Value::String(value.to_json_string()));

        registry
    }

    /// Adds or replaces a transform.
    pub fn register<F>(&mut self, name: impl Into<String>, pipe: F)
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.pipes.insert(name.into(), Arc::new(pipe));
    }

    pub fn get(&self, name: &str) -> Option<&PipeFn> {
        self.pipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipes.keys().map(String::as_str).collect()
    }

    /// Unknown names leave the value unchanged.
    pub fn apply(&self, name: &str, value: &Value, arg: Option<&Value>) -> Value {
        match self.pipes.get(name) {
            Some(pipe) => pipe(value, arg),
            None => {
                tracing::debug!("Unknown pipe '{}' ignored", name);
                value.clone()
            }
        }
    }
}

fn passthrough(value: &Value) -> Value {
    if value.is_nullish() {
        value.clone()
    } else {
        Value::String(value.to_display_string())
    }
}

/// Numbers and numeric strings.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) if !s.trim().is_empty() => {
            let n = value.to_number();
            (!n.is_nan()).then_some(n)
        }
        _ => None,
    }
}

fn arg_usize(arg: Option<&Value>) -> Option<usize> {
    let n = arg?.to_number();
    (n.is_finite() && n >= 0.0).then(|| n.trunc() as usize)
}

/// Fraction digits, capped like `toFixed`.
const MAX_FRACTION_DIGITS: usize = 20;

fn arg_decimals(arg: Option<&Value>) -> Option<usize> {
    arg_usize(arg).map(|n| n.min(MAX_FRACTION_DIGITS))
}

fn arg_text(arg: Option<&Value>) -> Option<String> {
    arg.filter(|a| !a.is_nullish())
        .map(|a| a.to_display_string())
}

fn round_to(n: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals.min(15) as i32);
    (n * factor).round() / factor
}

/// en-US grouping with between `min_fraction` and `max_fraction` fraction digits.
pub fn format_grouped(n: f64, min_fraction: usize, max_fraction: usize) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let max_fraction = max_fraction.min(MAX_FRACTION_DIGITS);
    let min_fraction = min_fraction.min(max_fraction);
    let rounded = round_to(n, max_fraction);
    let fixed = format!("{:.*}", max_fraction, rounded.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part.to_string(), frac_part.to_string()),
        None => (fixed.clone(), String::new()),
    };

    let mut frac = frac_part;
    while frac.len() > min_fraction && frac.ends_with('0') {
        frac.pop();
    }

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

fn pipe_percent(value: &Value, arg: Option<&Value>) -> Value {
    match numeric(value) {
        Some(n) => {
            let decimals = arg_decimals(arg).unwrap_or(0);
            Value::String(format!("{}%", format_grouped(n * 100.0, decimals, decimals)))
        }
        None => passthrough(value),
    }
}

fn pipe_number(value: &Value, arg: Option<&Value>) -> Value {
    match numeric(value) {
        Some(n) => Value::String(match arg_decimals(arg) {
            Some(decimals) => format_grouped(n, decimals, decimals),
            None => format_grouped(n, 0, 3),
        }),
        None => passthrough(value),
    }
}

fn pipe_currency(value: &Value, arg: Option<&Value>, default_currency: &str) -> Value {
    let Some(n) = numeric(value) else {
        return passthrough(value);
    };
    let code = arg_text(arg)
        .unwrap_or_else(|| default_currency.to_string())
        .to_uppercase();
    let (symbol, decimals) = match code.as_str() {
        "USD" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        _ => (None, 2),
    };
    let amount = format_grouped(n.abs(), decimals, decimals);
    let sign = if round_to(n, decimals) < 0.0 { "-" } else { "" };
    Value::String(match symbol {
        Some(symbol) => format!("{}{}{}", sign, symbol, amount),
        None => format!("{}{} {}", sign, code, amount),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateStyle {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateParts {
    Date,
    Time,
    Both,
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(ms) if ms.is_finite() => Utc.timestamp_millis_opt(*ms as i64).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn format_date(dt: &DateTime<Utc>, style: DateStyle) -> String {
    match style {
        DateStyle::Short => dt.format("%-m/%-d/%y").to_string(),
        DateStyle::Medium => dt.format("%b %-d, %Y").to_string(),
        DateStyle::Long => dt.format("%B %-d, %Y").to_string(),
    }
}

fn format_time(dt: &DateTime<Utc>, style: DateStyle) -> String {
    match style {
        DateStyle::Short => dt.format("%-I:%M %p").to_string(),
        DateStyle::Medium => dt.format("%-I:%M:%S %p").to_string(),
        DateStyle::Long => dt.format("%-I:%M:%S %p UTC").to_string(),
    }
}

/// Unparseable input comes back as-is.
fn format_date_value(
    value: &Value,
    arg: Option<&Value>,
    default_style: DateStyle,
    parts: DateParts,
) -> Value {
    let Some(dt) = parse_date(value) else {
        return value.clone();
    };
    let style = match arg_text(arg).as_deref() {
        Some("short") => DateStyle::Short,
        Some("medium") => DateStyle::Medium,
        Some("long") => DateStyle::Long,
        _ => default_style,
    };
    Value::String(match parts {
        DateParts::Date => format_date(&dt, style),
        DateParts::Time => format_time(&dt, style),
        DateParts::Both => format!("{}, {}", format_date(&dt, style), format_time(&dt, style)),
    })
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    if value.is_nullish() {
        return value.clone();
    }
    Value::String(f(&value.to_display_string()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pipe_length(value: &Value, _arg: Option<&Value>) -> Value {
    let length = match value {
        Value::Object(record) => record.len(),
        other => other.length().unwrap_or(0),
    };
    Value::from(length)
}

fn pipe_join(value: &Value, arg: Option<&Value>, default_separator: &str) -> Value {
    match value {
        Value::Array(items) => {
            let separator = arg_text(arg).unwrap_or_else(|| default_separator.to_string());
            Value::String(
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_display_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        other => passthrough(other),
    }
}

fn pipe_truncate(value: &Value, arg: Option<&Value>, default_length: usize) -> Value {
    if value.is_nullish() {
        return value.clone();
    }
    let text = value.to_display_string();
    let limit = arg_usize(arg).unwrap_or(default_length);
    if text.chars().count() <= limit {
        Value::String(text)
    } else {
        Value::String(format!("{}...", text.chars().take(limit).collect::<String>()))
    }
}

fn pipe_default(value: &Value, arg: Option<&Value>) -> Value {
    let empty = value.is_nullish() || value.as_str() == Some("");
    match arg {
        Some(fallback) if empty => fallback.clone(),
        _ => value.clone(),
    }
}

enum Edge {
    First,
    Last,
}

fn pipe_edge(value: &Value, edge: Edge) -> Value {
    match value {
        Value::Array(items) => match edge {
            Edge::First => items.first().cloned().unwrap_or_default(),
            Edge::Last => items.last().cloned().unwrap_or_default(),
        },
        Value::String(s) => {
            let c = match edge {
                Edge::First => s.chars().next(),
                Edge::Last => s.chars().last(),
            };
            c.map(|c| Value::String(c.to_string())).unwrap_or_default()
        }
        other => passthrough(other),
    }
}

fn pipe_round(value: &Value, arg: Option<&Value>) -> Value {
    match numeric(value) {
        Some(n) => Value::Number(round_to(n, arg_decimals(arg).unwrap_or(0))),
        None => passthrough(value),
    }
}

fn filter_by_attr(value: &Value, arg: Option<&Value>, keep_truthy: bool) -> Value {
    match (value, arg_text(arg)) {
        (Value::Array(items), Some(attr)) => Value::array(
            items
                .iter()
                .filter(|item| item.get(&attr).to_bool() == keep_truthy)
                .cloned()
                .collect(),
        ),
        (Value::Array(_), None) => value.clone(),
        (other, _) => passthrough(other),
    }
}

/// `count | pluralize` → `""`/`"s"`; `count | pluralize:'item'` → `item`/`items`;
/// `count | pluralize:'person|people'` picks one of the two.
fn pipe_pluralize(value: &Value, arg: Option<&Value>) -> Value {
    let singular = value.to_number() == 1.0;
    let word = match arg_text(arg) {
        None => return Value::from(if singular { "" } else { "s" }),
        Some(word) => word,
    };
    Value::String(match word.split_once('|') {
        Some((one, many)) => {
            if singular {
                one.to_string()
            } else {
                many.to_string()
            }
        }
        None if singular => word,
        None => format!("{}s", word),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> PipeRegistry {
        PipeRegistry::with_builtins(&PipeConfig::default())
    }

    fn apply(name: &str, value: impl Into<Value>, arg: Option<Value>) -> Value {
        registry().apply(name, &value.into(), arg.as_ref())
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(apply("number", 1234567.891, None), Value::from("1,234,567.891"));
        assert_eq!(apply("number", 1234.5, Some(Value::from(2.0))), Value::from("1,234.50"));
        assert_eq!(apply("number", -0.5, None), Value::from("-0.5"));
        assert_eq!(apply("percent", 0.256, None), Value::from("26%"));
        assert_eq!(apply("percent", 0.256, Some(Value::from(1.0))), Value::from("25.6%"));
    }

    #[test]
    fn test_huge_decimals_are_capped() {
        let huge = Some(Value::from(100_000_000.0));
        assert_eq!(
            apply("number", 1.5, huge.clone()),
            Value::from("1.50000000000000000000")
        );
        assert_eq!(
            apply("percent", 0.5, huge.clone()),
            Value::from("50.00000000000000000000%")
        );
        assert_eq!(apply("round", 1.25, huge), Value::from(1.25));
        assert_eq!(format_grouped(2.0, 70_000, 70_000), "2.00000000000000000000");
    }

    #[test]
    fn test_currency() {
        assert_eq!(apply("currency", 1234.5, None), Value::from("$1,234.50"));
        assert_eq!(apply("currency", 99.0, Some(Value::from("EUR"))), Value::from("€99.00"));
        assert_eq!(apply("currency", 1500.4, Some(Value::from("JPY"))), Value::from("¥1,500"));
        assert_eq!(apply("currency", 10.0, Some(Value::from("CHF"))), Value::from("CHF 10.00"));
        assert_eq!(apply("currency", -3.0, None), Value::from("-$3.00"));
    }

    #[test]
    fn test_non_numeric_input_is_stringified() {
        assert_eq!(apply("currency", "abc", None), Value::from("abc"));
        assert_eq!(apply("number", true, None), Value::from("true"));
        assert_eq!(apply("percent", Value::Null, None), Value::Null);
    }

    #[test]
    fn test_dates() {
        let ts = "2024-01-15T15:30:45Z";
        assert_eq!(apply("date", ts, None), Value::from("Jan 15, 2024"));
        assert_eq!(apply("date", ts, Some(Value::from("short"))), Value::from("1/15/24"));
        assert_eq!(apply("date", ts, Some(Value::from("long"))), Value::from("January 15, 2024"));
        assert_eq!(apply("time", ts, None), Value::from("3:30 PM"));
        assert_eq!(apply("time", ts, Some(Value::from("long"))), Value::from("3:30:45 PM UTC"));
        assert_eq!(
            apply("datetime", "2024-01-15", Some(Value::from("short"))),
            Value::from("1/15/24, 12:00 AM")
        );
        assert_eq!(apply("date", 0.0, None), Value::from("Jan 1, 1970"));
    }

    #[test]
    fn test_invalid_date_passes_through() {
        assert_eq!(apply("date", "not a date", None), Value::from("not a date"));
    }

    #[test]
    fn test_text_pipes() {
        assert_eq!(apply("upper", "abc", None), Value::from("ABC"));
        assert_eq!(apply("lower", "ABC", None), Value::from("abc"));
        assert_eq!(apply("capitalize", "hello world", None), Value::from("Hello world"));
        assert_eq!(apply("trim", "  x ", None), Value::from("x"));
        assert_eq!(apply("truncate", "abcdef", Some(Value::from(3.0))), Value::from("abc..."));
        assert_eq!(apply("truncate", "abc", Some(Value::from(3.0))), Value::from("abc"));
    }

    #[test]
    fn test_collection_pipes() {
        let items = Value::from(json!(["a", "b", "c"]));
        assert_eq!(apply("join", items.clone(), None), Value::from("a, b, c"));
        assert_eq!(apply("join", items.clone(), Some(Value::from("-"))), Value::from("a-b-c"));
        assert_eq!(apply("first", items.clone(), None), Value::from("a"));
        assert_eq!(apply("last", items.clone(), None), Value::from("c"));
        assert_eq!(apply("length", items, None), Value::from(3.0));
        assert_eq!(apply("length", json!({"a": 1, "b": 2}), None), Value::from(2.0));
        assert_eq!(apply("length", 42.0, None), Value::from(0.0));
    }

    #[test]
    fn test_attribute_filters() {
        let users = Value::from(json!([
            {"name": "a", "active": true},
            {"name": "b", "active": false},
            {"name": "c"}
        ]));
        let active = apply("selectattr", users.clone(), Some(Value::from("active")));
        assert_eq!(active, Value::from(json!([{"name": "a", "active": true}])));
        let inactive = apply("rejectattr", users, Some(Value::from("active")));
        assert_eq!(inactive.length(), Some(2));
    }

    #[test]
    fn test_default_and_pluralize() {
        assert_eq!(apply("default", "", Some(Value::from("x"))), Value::from("x"));
        assert_eq!(apply("default", Value::Undefined, Some(Value::from("x"))), Value::from("x"));
        assert_eq!(apply("default", 0.0, Some(Value::from("x"))), Value::from(0.0));
        assert_eq!(apply("pluralize", 1.0, None), Value::from(""));
        assert_eq!(apply("pluralize", 2.0, None), Value::from("s"));
        assert_eq!(apply("pluralize", 1.0, Some(Value::from("item"))), Value::from("item"));
        assert_eq!(apply("pluralize", 3.0, Some(Value::from("item"))), Value::from("items"));
        assert_eq!(
            apply("pluralize", 3.0, Some(Value::from("person|people"))),
            Value::from("people")
        );
    }

    #[test]
    fn test_numeric_helpers() {
        assert_eq!(apply("abs", -4.0, None), Value::from(4.0));
        assert_eq!(apply("round", 1.25, Some(Value::from(1.0))), Value::from(1.3));
        assert_eq!(apply("round", 2.5, None), Value::from(3.0));
        assert_eq!(apply("json", json!({"a": [1, 2]}), None), Value::from(r#"{"a":[1,2]}"#));
    }

    #[test]
    fn test_unknown_pipe_and_custom_registration() {
        let mut registry = registry();
        assert_eq!(registry.apply("bogus", &Value::from(5.0), None), Value::from(5.0));
        registry.register("double", |value, _| Value::Number(value.to_number() * 2.0));
        assert_eq!(registry.apply("double", &Value::from(5.0), None), Value::from(10.0));
    }
}
