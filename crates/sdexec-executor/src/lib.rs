//! Executor plumbing shared by sdexec backends.
//!
//! Provides:
//! - A reqwest-backed HTTP client with transparent retries
//! - The temporal-to-build token exchange

pub mod http;
pub mod token;

pub use http::{ReqwestClient, RetryPolicy};
pub use token::{DEFAULT_BUILD_TIMEOUT_MINUTES, TokenExchanger, parse_build_timeout};

pub use sdexec_core::http::{HttpClient, HttpRequest, HttpResponse, Method};
