//! Executor configuration passed to every lifecycle operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::annotations::AnnotationMap;
use crate::error::ValidationError;

/// Build timeout in minutes when none is configured.
pub const DEFAULT_BUILD_TIMEOUT_MINUTES: f64 = 90.0;

/// Configuration for a single lifecycle call.
///
/// Every operation draws from the same pool of fields. Which of them are
/// required is decided by the schema registered for the operation, so all
/// fields are optional here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Unique ID for a build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Value>,
    /// Container image the build runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Base URI of the pipeline API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_uri: Option<String>,
    /// JWT to act on behalf of the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Value>,
    #[serde(default, rename = "isPR", skip_serializing_if = "Option::is_none")]
    pub is_pr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_parent_job_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze_windows: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueue_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Keys outside the shared pool that the operation's schema accepted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutorConfig {
    /// Convert a raw configuration value into the typed form.
    ///
    /// Keys outside the shared pool are kept in `extra`; rejecting them is the
    /// job of the schema.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::new("\"value\" must be an object"));
        }
        serde_json::from_value(value).map_err(|e| ValidationError::new(e.to_string()))
    }

    /// Build ID rendered as a path segment, whether it was given as a number
    /// or a string.
    pub fn build_id_string(&self) -> Option<String> {
        self.build_id.as_ref().and_then(id_to_string)
    }

    pub fn job_id_string(&self) -> Option<String> {
        self.job_id.as_ref().and_then(id_to_string)
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
