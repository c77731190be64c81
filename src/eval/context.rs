use crate::value::{Record, Value};

/// Identifier bindings an expression is evaluated against.
///
/// Built from state plus render-time scope plus the `$event`/`$error`
/// bindings of the action being executed, later layers shadowing earlier
/// ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    bindings: Record,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(bindings: Record) -> Self {
        Self { bindings }
    }

    /// Non-record values produce an empty context.
    pub fn from_value(value: &Value) -> Self {
        let mut context = Self::new();
        context.extend(value);
        context
    }

    /// Copies every top-level entry of a record value, overwriting existing keys.
    pub fn extend(&mut self, value: &Value) {
        if let Value::Object(record) = value {
            self.bindings
                .extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Top-level binding; undefined when absent.
    pub fn lookup(&self, name: &str) -> Value {
        self.bindings.get(name).cloned().unwrap_or_default()
    }

    /// Walks a dot path (`user.address.city`, `items.0.name`, `items.length`).
    ///
    /// Never fails: walking into anything that is not a container, or past
    /// a missing key, yields undefined.
    pub fn resolve(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let mut current = match segments.next() {
            Some(first) => self.lookup(first),
            None => return Value::Undefined,
        };
        for segment in segments {
            current = resolve_segment(&current, segment);
            if current.is_undefined() {
                break;
            }
        }
        current
    }

    pub fn bindings(&self) -> &Record {
        &self.bindings
    }

    pub fn into_value(self) -> Value {
        Value::object(self.bindings)
    }
}

fn resolve_segment(current: &Value, segment: &str) -> Value {
    match current {
        Value::Object(record) => match record.get(segment) {
            Some(value) => value.clone(),
            None => Value::Undefined,
        },
        Value::Array(items) if segment == "length" => Value::from(items.len()),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index).cloned())
            .unwrap_or_default(),
        Value::String(s) if segment == "length" => Value::from(s.chars().count()),
        Value::String(s) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| s.chars().nth(index))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        _ => Value::Undefined,
    }
}

impl From<Record> for Context {
    fn from(bindings: Record) -> Self {
        Self::from_record(bindings)
    }
}

impl From<&Value> for Context {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl From<serde_json::Value> for Context {
    fn from(value: serde_json::Value) -> Self {
        Self::from_value(&Value::from(value))
    }
}
