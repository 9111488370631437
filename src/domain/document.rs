use crate::error::{Result, SyncError};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A schemaless document as held by a collection.
pub type Document = Map<String, Value>;

const SET: &str = "$set";
const UNSET: &str = "$unset";
const EQ: &str = "$eq";

/// Equality filter over top-level document fields.
///
/// Each entry matches either a literal value or an `{"$eq": value}` clause.
/// All entries must match for a document to be selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with a single equality clause.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Builds a filter from a raw descriptor, rejecting query operators other
    /// than `$eq`.
    pub fn from_document(document: Document) -> Result<Self> {
        for (field, value) in &document {
            if field.starts_with('$') {
                return Err(SyncError::UnsupportedOperation(format!(
                    "query operator {field}"
                )));
            }
            if let Value::Object(clause) = value
                && is_operator_clause(clause)
                && !(clause.len() == 1 && clause.contains_key(EQ))
            {
                let operators: Vec<&str> = clause.keys().map(String::as_str).collect();
                return Err(SyncError::UnsupportedOperation(format!(
                    "query operator {} on {field}",
                    operators.join(", ")
                )));
            }
        }
        Ok(Self(document))
    }

    /// The value this filter requires `field` to equal, if any.
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        match self.0.get(field)? {
            Value::Object(clause) if is_operator_clause(clause) => clause.get(EQ),
            literal => Some(literal),
        }
    }

    /// Same as [`Filter::value_of`] restricted to string values.
    pub fn string_value(&self, field: &str) -> Option<&str> {
        self.value_of(field).and_then(Value::as_str)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.0.keys().all(|field| match self.value_of(field) {
            Some(expected) => document.get(field) == Some(expected),
            None => false,
        })
    }
}

fn is_operator_clause(clause: &Document) -> bool {
    clause.keys().any(|key| key.starts_with('$'))
}

/// A single-document mutation in `$set` / `$unset` form.
///
/// Top-level fields that are not operators are treated as an implicit `$set`,
/// the same way document stores accept a bare replacement map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    unset: BTreeSet<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.insert(field.into());
        self
    }

    /// Builds an update from a raw descriptor, rejecting operators other than
    /// `$set` and `$unset`.
    pub fn from_document(document: Document) -> Result<Self> {
        let mut update = Self::new();
        for (key, value) in document {
            if key == SET || key == UNSET {
                let Value::Object(fields) = value else {
                    return Err(SyncError::ValidationError(format!(
                        "{key} expects an object of fields"
                    )));
                };
                if key == SET {
                    update.set.extend(fields);
                } else {
                    update.unset.extend(fields.into_iter().map(|(field, _)| field));
                }
            } else if key.starts_with('$') {
                return Err(SyncError::UnsupportedOperation(format!(
                    "update operator {key}"
                )));
            } else {
                update.set.insert(key, value);
            }
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// The value this update intends to set on `field`, read from the
    /// descriptor rather than from any resulting document.
    pub fn set_value(&self, field: &str) -> Option<&Value> {
        self.set.get(field)
    }

    pub fn unsets(&self, field: &str) -> bool {
        self.unset.contains(field)
    }

    /// Applies the mutation in place. Returns whether the document changed.
    pub fn apply_to(&self, document: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if document.get(field) != Some(value) {
                document.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        for field in &self.unset {
            changed |= document.remove(field).is_some();
        }
        changed
    }
}

/// Outcome of an `update_one` / `update_many` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}
