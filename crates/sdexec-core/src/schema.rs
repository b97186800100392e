//! Configuration schemas for lifecycle operations.
//!
//! Each validated operation has a schema listing the keys it accepts and which
//! of them are required. Configurations are checked before any executor code
//! runs, and the first violation is reported.

use chrono::DateTime;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ValidationError;

/// Operations that carry a configuration schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    #[display("start")]
    Start,
    #[display("stop")]
    Stop,
    #[display("status")]
    Status,
    #[display("verify")]
    Verify,
    #[display("startPeriodic")]
    StartPeriodic,
    #[display("stopPeriodic")]
    StopPeriodic,
    #[display("startFrozen")]
    StartFrozen,
    #[display("stopFrozen")]
    StopFrozen,
    #[display("stream")]
    Stream,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Start,
        Operation::Stop,
        Operation::Status,
        Operation::Verify,
        Operation::StartPeriodic,
        Operation::StopPeriodic,
        Operation::StartFrozen,
        Operation::StopFrozen,
        Operation::Stream,
    ];
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.to_string() == s)
            .ok_or_else(|| ValidationError::new(format!("unknown operation: {}", s)))
    }
}

/// Type a field value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Positive integer or non-empty string.
    Id,
    Integer,
    Boolean,
    Object,
    Array,
    /// Array whose elements are all strings.
    StringArray,
    /// ISO 8601 timestamp string.
    Date,
    /// Absolute URI string.
    Uri,
    Any,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Id => match value {
                Value::String(s) => !s.is_empty(),
                Value::Number(n) => n.as_u64().is_some_and(|n| n > 0),
                _ => false,
            },
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::Date => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            FieldKind::Uri => value.as_str().is_some_and(|s| url::Url::parse(s).is_ok()),
            FieldKind::Any => true,
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            FieldKind::String => "must be a string",
            FieldKind::Id => "must be a positive integer or a non-empty string",
            FieldKind::Integer => "must be an integer",
            FieldKind::Boolean => "must be a boolean",
            FieldKind::Object => "must be an object",
            FieldKind::Array => "must be an array",
            FieldKind::StringArray => "must be an array of strings",
            FieldKind::Date => "must be a valid ISO 8601 date",
            FieldKind::Uri => "must be a valid uri",
            FieldKind::Any => "is invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Shape of a configuration object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldRule>,
    allow_unknown: bool,
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = FieldRule>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            allow_unknown: false,
        }
    }

    /// Any object is valid.
    pub fn any_object() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Check a value, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::new("\"value\" must be an object"))?;

        for rule in &self.fields {
            match object.get(rule.name) {
                Some(v) if !rule.kind.accepts(v) => {
                    return Err(ValidationError::new(format!(
                        "\"{}\" {}",
                        rule.name,
                        rule.kind.expectation()
                    )));
                }
                Some(_) => {}
                None if rule.required => {
                    return Err(ValidationError::new(format!(
                        "\"{}\" is required",
                        rule.name
                    )));
                }
                None => {}
            }
        }

        if !self.allow_unknown {
            if let Some(key) = object
                .keys()
                .find(|key| !self.fields.iter().any(|rule| rule.name == key.as_str()))
            {
                return Err(ValidationError::new(format!("\"{}\" is not allowed", key)));
            }
        }

        Ok(())
    }
}

/// Capability validating a configuration for an operation.
///
/// Returns the value unchanged on success.
pub trait ConfigValidator: Send + Sync {
    fn validate(&self, operation: Operation, config: Value) -> Result<Value, ValidationError>;
}

/// Schemas keyed by operation.
///
/// Operations without a registered schema only require an object.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<Operation, Schema>,
}

impl SchemaRegistry {
    /// Registry without any schema.
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registry accepting any object for every operation.
    pub fn permissive() -> Self {
        Operation::ALL
            .into_iter()
            .fold(Self::empty(), |registry, op| {
                registry.with_schema(op, Schema::any_object())
            })
    }

    /// Registry with the built-in executor schemas.
    pub fn builtin() -> Self {
        Operation::ALL
            .into_iter()
            .fold(Self::empty(), |registry, op| {
                registry.with_schema(op, builtin_schema(op))
            })
    }

    pub fn with_schema(mut self, operation: Operation, schema: Schema) -> Self {
        self.schemas.insert(operation, schema);
        self
    }

    pub fn schema(&self, operation: Operation) -> Option<&Schema> {
        self.schemas.get(&operation)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ConfigValidator for SchemaRegistry {
    fn validate(&self, operation: Operation, config: Value) -> Result<Value, ValidationError> {
        match self.schemas.get(&operation) {
            Some(schema) => schema.validate(&config)?,
            None => Schema::any_object().validate(&config)?,
        }
        Ok(config)
    }
}

fn builtin_schema(operation: Operation) -> Schema {
    use FieldKind::*;

    let start = || {
        vec![
            FieldRule::required("buildId", Id),
            FieldRule::required("container", String),
            FieldRule::required("apiUri", Uri),
            FieldRule::required("token", String),
            FieldRule::optional("annotations", Object),
            FieldRule::optional("build", Object),
            FieldRule::optional("blockedBy", Array),
            FieldRule::optional("freezeWindows", StringArray),
            FieldRule::optional("buildClusterName", String),
            FieldRule::optional("causeMessage", String),
            FieldRule::optional("enqueueTime", Date),
            FieldRule::optional("eventId", Id),
            FieldRule::optional("isPR", Boolean),
            FieldRule::optional("jobId", Id),
            FieldRule::optional("jobName", String),
            FieldRule::optional("jobState", String),
            FieldRule::optional("jobArchived", Boolean),
            FieldRule::optional("pipeline", Object),
            FieldRule::optional("pipelineId", Id),
            FieldRule::optional("prParentJobId", Id),
            FieldRule::optional("template", Object),
            FieldRule::optional("startTime", Date),
        ]
    };

    let fields = match operation {
        Operation::Start | Operation::StartFrozen => start(),
        Operation::Stop => vec![
            FieldRule::required("buildId", Id),
            FieldRule::optional("annotations", Object),
            FieldRule::optional("blockedBy", Array),
            FieldRule::optional("freezeWindows", StringArray),
            FieldRule::optional("buildClusterName", String),
            FieldRule::optional("jobId", Id),
            FieldRule::optional("jobName", String),
            FieldRule::optional("pipelineId", Id),
            FieldRule::optional("token", String),
            FieldRule::optional("apiUri", Uri),
            FieldRule::optional("startTime", Date),
            FieldRule::optional("buildStatus", String),
        ],
        Operation::Status | Operation::Stream => vec![
            FieldRule::required("buildId", Id),
            FieldRule::optional("token", String),
            FieldRule::optional("apiUri", Uri),
        ],
        Operation::Verify => vec![
            FieldRule::required("buildId", Id),
            FieldRule::optional("annotations", Object),
            FieldRule::optional("buildClusterName", String),
            FieldRule::optional("token", String),
            FieldRule::optional("apiUri", Uri),
            FieldRule::optional("startTime", Date),
            FieldRule::optional("buildStatus", String),
        ],
        Operation::StartPeriodic => vec![
            FieldRule::required("pipeline", Object),
            FieldRule::required("job", Object),
            FieldRule::optional("apiUri", Uri),
            FieldRule::optional("token", String),
            FieldRule::optional("isUpdate", Boolean),
        ],
        Operation::StopPeriodic | Operation::StopFrozen => vec![
            FieldRule::required("jobId", Id),
            FieldRule::optional("token", String),
            FieldRule::optional("apiUri", Uri),
        ],
    };

    Schema::new(fields)
}
