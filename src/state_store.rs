//! # State Store
//!
//! One immutable root record, replaced on every mutation. Keys are dot
//! paths: an all-digit segment indexes an array, anything else names a
//! record field. Updates copy only the ancestors of the written path, every
//! other branch of the new root is shared with the old one.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::value::{Record, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Empty key")]
    EmptyKey,
    #[error("Missing intermediate '{segment}' in '{key}'")]
    MissingSegment { key: String, segment: String },
    #[error("Index '{segment}' used on a non-array in '{key}'")]
    NotAnArray { key: String, segment: String },
    #[error("Key '{segment}' used on an array in '{key}'")]
    KeyIntoArray { key: String, segment: String },
    #[error("Index {index} out of bounds for length {len} in '{key}'")]
    IndexOutOfBounds { key: String, index: usize, len: usize },
    #[error("Cannot descend into {type_name} at '{segment}' in '{key}'")]
    NotAContainer {
        key: String,
        segment: String,
        type_name: &'static str,
    },
}

pub type StateResult<T> = Result<T, StateError>;

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Reads a dot path. Missing or incompatible paths are undefined.
pub fn get_path(root: &Value, key: &str) -> Value {
    let mut segments = key.split('.');
    let mut current = match segments.next() {
        Some(first) => root.get(first),
        None => return Value::Undefined,
    };
    for segment in segments {
        current = match &current {
            Value::Object(record) if !is_index(segment) => {
                record.get(segment).cloned().unwrap_or_default()
            }
            Value::Array(items) if is_index(segment) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default(),
            _ => Value::Undefined,
        };
        if current.is_undefined() {
            break;
        }
    }
    current
}

/// Returns a new root with `value` written at `key`.
///
/// The first segment always names a top-level field and is created when
/// missing. Deeper intermediates must already exist. A final array index
/// may equal the array length, which appends.
pub fn set_path(root: &Value, key: &str, value: Value) -> StateResult<Value> {
    if key.is_empty() {
        return Err(StateError::EmptyKey);
    }
    let segments: Vec<&str> = key.split('.').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Err(StateError::EmptyKey),
    };

    let mut record: Record = match root {
        Value::Object(record) => (**record).clone(),
        _ => Record::new(),
    };
    let new_child = if rest.is_empty() {
        value
    } else {
        match record.get(*first) {
            Some(child) if !child.is_nullish() => set_in(child, rest, value, key)?,
            _ => {
                return Err(StateError::MissingSegment {
                    key: key.to_string(),
                    segment: first.to_string(),
                })
            }
        }
    };
    record.insert(first.to_string(), new_child);
    Ok(Value::object(record))
}

fn set_in(container: &Value, segments: &[&str], value: Value, key: &str) -> StateResult<Value> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(value);
    };
    let segment = *segment;

    match container {
        Value::Object(record) => {
            if is_index(segment) {
                return Err(StateError::NotAnArray {
                    key: key.to_string(),
                    segment: segment.to_string(),
                });
            }
            let new_child = if rest.is_empty() {
                value
            } else {
                match record.get(segment) {
                    Some(child) if !child.is_nullish() => set_in(child, rest, value, key)?,
                    _ => {
                        return Err(StateError::MissingSegment {
                            key: key.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                }
            };
            let mut updated = (**record).clone();
            updated.insert(segment.to_string(), new_child);
            Ok(Value::object(updated))
        }
        Value::Array(items) => {
            let index = match segment.parse::<usize>() {
                Ok(index) if is_index(segment) => index,
                _ => {
                    return Err(StateError::KeyIntoArray {
                        key: key.to_string(),
                        segment: segment.to_string(),
                    })
                }
            };
            let mut updated = (**items).clone();
            if rest.is_empty() {
                match index {
                    i if i < updated.len() => updated[i] = value,
                    i if i == updated.len() => updated.push(value),
                    _ => {
                        return Err(StateError::IndexOutOfBounds {
                            key: key.to_string(),
                            index,
                            len: updated.len(),
                        })
                    }
                }
            } else {
                let child = match updated.get(index) {
                    Some(child) if !child.is_nullish() => child,
                    _ => {
                        return Err(StateError::MissingSegment {
                            key: key.to_string(),
                            segment: segment.to_string(),
                        })
                    }
                };
                updated[index] = set_in(child, rest, value, key)?;
            }
            Ok(Value::array(updated))
        }
        _ if is_index(segment) => Err(StateError::NotAnArray {
            key: key.to_string(),
            segment: segment.to_string(),
        }),
        other => Err(StateError::NotAContainer {
            key: key.to_string(),
            segment: segment.to_string(),
            type_name: other.type_name(),
        }),
    }
}

/// Observable store of one immutable root record.
///
/// Every new root is published on a watch channel; see [`StateStore::subscribe`].
#[derive(Debug)]
pub struct StateStore {
    root: watch::Sender<Value>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Value::empty_object())
    }
}

impl StateStore {
    /// A non-record initial value starts the store empty.
    pub fn new(initial: Value) -> Self {
        let (root, _) = watch::channel(Self::normalize_root(initial));
        Self { root }
    }

    fn normalize_root(value: Value) -> Value {
        match value {
            Value::Object(_) => value,
            Value::Undefined | Value::Null => Value::empty_object(),
            other => {
                warn!("Ignoring non-record state root of type {}", other.type_name());
                Value::empty_object()
            }
        }
    }

    pub fn get(&self, key: &str) -> Value {
        get_path(&self.root.borrow(), key)
    }

    pub fn get_all(&self) -> Value {
        self.root.borrow().clone()
    }

    /// Writes `value` at `key`. An unfollowable path leaves the store
    /// untouched and returns `false`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.root.send_if_modified(|root| match set_path(root, key, value) {
            Ok(updated) => {
                debug!("State set '{}'", key);
                *root = updated;
                true
            }
            Err(e) => {
                warn!("State set ignored: {}", e);
                false
            }
        })
    }

    /// Shallow-overwrites top-level keys.
    pub fn merge(&self, partial: &Value) {
        let Value::Object(partial) = partial else {
            warn!("State merge ignored: expected a record, got {}", partial.type_name());
            return;
        };
        self.root.send_modify(|root| {
            let mut record = match &*root {
                Value::Object(record) => (**record).clone(),
                _ => Record::new(),
            };
            record.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
            *root = Value::object(record);
        });
    }

    /// Replaces the whole root; `None` empties the store.
    pub fn reset(&self, initial: Option<Value>) {
        let root = Self::normalize_root(initial.unwrap_or_else(Value::empty_object));
        self.root.send_replace(root);
    }

    /// Receiver observing every new root.
    pub fn subscribe(&self) -> watch::Receiver<Value> {
        self.root.subscribe()
    }
}
