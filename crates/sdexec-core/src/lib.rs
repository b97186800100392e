//! Core types and traits for sdexec build executors.
//!
//! This crate contains:
//! - The executor lifecycle contract (validate-then-dispatch)
//! - Schema validation of executor configurations
//! - Annotation parsing into resource hints
//! - Credential scope inspection
//! - The HTTP client capability used by the token exchange

pub mod annotations;
pub mod config;
pub mod credential;
pub mod error;
pub mod executor;
pub mod http;
pub mod schema;

pub use annotations::{AnnotationMap, ResourceHints, parse_annotations};
pub use config::ExecutorConfig;
pub use credential::Credential;
pub use error::{Error, Result, TransportError, ValidationError};
pub use executor::{Executor, ExecutorContract, Stats};
pub use schema::{ConfigValidator, Operation, SchemaRegistry};
