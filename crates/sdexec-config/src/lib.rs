//! KDL configuration parsing for sdexec.
//!
//! Executor settings live in a small KDL document: the pipeline API to talk
//! to, the default build timeout and the HTTP retry policy.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ExecutorSettings, HttpSettings, load_settings, parse_settings};
