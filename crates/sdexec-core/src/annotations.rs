//! Annotation parsing.
//!
//! Pipelines attach vendor-namespaced annotations to jobs
//! (`screwdriver.cd/cpu: HIGH`). Executors only care about a fixed set of
//! them, keyed by the short name after the namespace.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw annotations as supplied by a job configuration.
pub type AnnotationMap = Map<String, Value>;

/// Recognized annotations keyed by their short name (`cpu`, `nodeLabel`, ...).
pub type ResourceHints = BTreeMap<String, Value>;

/// Prefix marking an annotation as an experimental feature flag.
pub const BETA_PREFIX: &str = "beta.";

/// Vendor namespace shared by every recognized annotation.
pub const NAMESPACE: &str = "screwdriver.cd";

/// Annotations an executor understands.
pub static ALLOWED_ANNOTATIONS: &[&str] = &[
    "screwdriver.cd/cpu",
    "screwdriver.cd/ram",
    "screwdriver.cd/disk",
    "screwdriver.cd/diskSpeed",
    "screwdriver.cd/timeout",
    "screwdriver.cd/executor",
    "screwdriver.cd/buildPeriodically",
    "screwdriver.cd/repoManifest",
    "screwdriver.cd/dockerEnabled",
    "screwdriver.cd/dockerCpu",
    "screwdriver.cd/dockerRam",
    "screwdriver.cd/nodeLabel",
    "screwdriver.cd/terminationGracePeriodSeconds",
];

/// Reduce annotations to the recognized resource hints.
///
/// A leading `beta.` is stripped before the allow-list check. Unknown keys are
/// dropped. Values are passed through untouched.
pub fn parse_annotations(annotations: &AnnotationMap) -> ResourceHints {
    annotations
        .iter()
        .filter_map(|(key, value)| {
            let key = key.strip_prefix(BETA_PREFIX).unwrap_or(key);
            short_name(key).map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}

/// Short name of an allow-listed annotation key.
fn short_name(key: &str) -> Option<&str> {
    if !ALLOWED_ANNOTATIONS.contains(&key) {
        return None;
    }
    key.split_once('/').map(|(_, name)| name)
}
