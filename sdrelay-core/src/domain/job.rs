//! Job domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

use crate::domain::operation::{DEFAULT_OPERATION_TAG, Operation};

/// Key of the field that selects the operation
pub const API_KEY: &str = "api";

/// Raised when a job input is not a JSON object
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("job input must be a JSON object, got {0}")]
pub struct InvalidJobInput(pub &'static str);

/// Parameters of a single job
///
/// A flat JSON object. The optional `api` field picks the operation; every
/// other field belongs to the downstream call and is passed through as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobInput(Map<String, Value>);

impl JobInput {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builds a job input from an arbitrary JSON value
    pub fn from_value(value: Value) -> Result<Self, InvalidJobInput> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            Value::Null => Err(InvalidJobInput("null")),
            Value::Bool(_) => Err(InvalidJobInput("a boolean")),
            Value::Number(_) => Err(InvalidJobInput("a number")),
            Value::String(_) => Err(InvalidJobInput("a string")),
            Value::Array(_) => Err(InvalidJobInput("an array")),
        }
    }

    /// The operation tag as written by the caller
    ///
    /// Falls back to `txt2img` when absent. A non-string tag is rendered as
    /// its JSON text so it can still be reported.
    pub fn tag(&self) -> Cow<'_, str> {
        match self.0.get(API_KEY) {
            None => Cow::Borrowed(DEFAULT_OPERATION_TAG),
            Some(Value::String(tag)) => Cow::Borrowed(tag.as_str()),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }

    /// Resolves the operation, returning the unrecognized tag on failure
    pub fn operation(&self) -> Result<Operation, String> {
        match self.0.get(API_KEY) {
            None => Ok(Operation::Txt2Img),
            Some(Value::String(tag)) => Operation::from_tag(tag).ok_or_else(|| tag.clone()),
            Some(_) => Err(self.tag().into_owned()),
        }
    }

    /// Every field except `api`
    pub fn params(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != API_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for JobInput {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
