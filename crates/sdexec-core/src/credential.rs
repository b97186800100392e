//! Build credentials.
//!
//! Credentials are JWTs issued by the pipeline API. Only the `scope` claim is
//! inspected; the signature is checked by the API when the token is used.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Scope value carried by a credential bound to a single build.
pub const BUILD_SCOPE: &str = "build";

/// A signed token acting on behalf of a build or of the pre-build setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Credential(String);

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    scope: Option<Scope>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scope {
    One(String),
    Many(Vec<String>),
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Scopes from the token payload.
    ///
    /// Returns `None` when the token is not a decodable JWT.
    pub fn scopes(&self) -> Option<BTreeSet<String>> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;

        Some(match claims.scope {
            Some(Scope::One(s)) => BTreeSet::from([s]),
            Some(Scope::Many(v)) => v.into_iter().collect(),
            None => BTreeSet::new(),
        })
    }

    /// Whether the token is already scoped to a build.
    ///
    /// Undecodable tokens count as temporal.
    pub fn is_build_scoped(&self) -> bool {
        self.scopes()
            .is_some_and(|scopes| scopes.contains(BUILD_SCOPE))
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Build an unsigned token carrying the given claims. Test helper.
#[cfg(test)]
pub(crate) fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_scope() {
        let token = Credential::new(unsigned_token(&json!({ "scope": ["build"], "buildId": 1 })));
        assert!(token.is_build_scoped());
    }

    #[test]
    fn test_temporal_scope() {
        let token = Credential::new(unsigned_token(&json!({ "scope": ["temporal"] })));
        assert!(!token.is_build_scoped());
        assert_eq!(
            token.scopes().unwrap(),
            BTreeSet::from(["temporal".to_string()])
        );
    }

    #[test]
    fn test_single_string_scope() {
        let token = Credential::new(unsigned_token(&json!({ "scope": "build" })));
        assert!(token.is_build_scoped());
    }

    #[test]
    fn test_missing_scope_claim() {
        let token = Credential::new(unsigned_token(&json!({ "username": "bob" })));
        assert_eq!(token.scopes(), Some(BTreeSet::new()));
        assert!(!token.is_build_scoped());
    }

    #[test]
    fn test_opaque_token_is_temporal() {
        let token = Credential::from("not-a-jwt");
        assert!(token.scopes().is_none());
        assert!(!token.is_build_scoped());
    }

    #[test]
    fn test_display_is_raw_token() {
        let token = Credential::from("abc.def.ghi");
        assert_eq!(token.to_string(), "abc.def.ghi");
        assert_eq!(token.into_inner(), "abc.def.ghi");
    }
}
