//! Build token exchange.
//!
//! Builds are launched with a short-lived temporal token. Before the build can
//! act on its own behalf, the executor trades that token for one scoped to the
//! build through `POST {apiUri}/v4/builds/{buildId}/token`.

use sdexec_core::http::{HttpClient, HttpRequest};
use sdexec_core::{Credential, Error, ExecutorConfig, Result};
use serde_json::{Number, Value, json};
use tracing::{debug, info};

pub use sdexec_core::config::DEFAULT_BUILD_TIMEOUT_MINUTES;

/// Parse a build timeout given as text, e.g. from the command line.
pub fn parse_build_timeout(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|minutes| minutes.is_finite())
        .ok_or_else(|| Error::InvalidArgument(format!("Invalid buildTimeout value: {}", raw)))
}

/// Exchanges temporal tokens for build-scoped ones.
pub struct TokenExchanger<C> {
    client: C,
}

impl<C: HttpClient> TokenExchanger<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get a build-scoped token for the build in `config`.
    ///
    /// `build_timeout` is in minutes and defaults to
    /// [`DEFAULT_BUILD_TIMEOUT_MINUTES`]. A token that already carries the
    /// `build` scope is returned as is. Otherwise exactly one request is made;
    /// retries are up to the HTTP client.
    pub async fn exchange_token_for_build(
        &self,
        config: &ExecutorConfig,
        build_timeout: Option<f64>,
    ) -> Result<String> {
        let build_timeout = build_timeout.unwrap_or(DEFAULT_BUILD_TIMEOUT_MINUTES);
        if !build_timeout.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "Invalid buildTimeout value: {}",
                build_timeout
            )));
        }

        let token = config
            .token
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("token is required".to_string()))?;
        let credential = Credential::from(token);
        if credential.is_build_scoped() {
            debug!("Token already scoped to a build");
            return Ok(credential.into_inner());
        }

        let build_id = config
            .build_id_string()
            .ok_or_else(|| Error::InvalidArgument("buildId is required".to_string()))?;
        let api_uri = config
            .api_uri
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("apiUri is required".to_string()))?;

        let uri = format!(
            "{}/v4/builds/{}/token",
            api_uri.trim_end_matches('/'),
            urlencoding::encode(&build_id)
        );
        let request = HttpRequest::post(uri)
            .bearer(token)
            .header("Content-Type", "application/json")
            .json_body(json!({ "buildTimeout": minutes_value(build_timeout) }));

        info!(build_id = %build_id, build_timeout, "Exchanging temporal token for build token");
        let response = self.client.request(request).await?;

        if response.status_code != 200 {
            return Err(Error::ExchangeFailure {
                status: response.status_code,
                body: response.body.to_string(),
            });
        }

        match response.body.get("token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            None => Err(Error::ExchangeFailure {
                status: response.status_code,
                body: response.body.to_string(),
            }),
        }
    }
}

/// Whole minutes are sent as integers.
fn minutes_value(minutes: f64) -> Value {
    if minutes.fract() == 0.0 && minutes.abs() < i64::MAX as f64 {
        Value::from(minutes as i64)
    } else {
        Number::from_f64(minutes).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use sdexec_core::TransportError;
    use sdexec_core::http::{HttpResponse, Method};
    use std::sync::Mutex;

    /// Client answering every request with a fixed response.
    struct RecordingClient {
        status_code: u16,
        body: Value,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingClient {
        fn new(status_code: u16, body: Value) -> Self {
            Self {
                status_code,
                body,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn request(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status_code: self.status_code,
                body: self.body.clone(),
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl HttpClient for FailingClient {
        async fn request(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            Err(TransportError::Timeout("deadline elapsed".to_string()))
        }
    }

    fn token_with_scope(scope: &[&str]) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(json!({ "scope": scope }).to_string());
        format!("{}.{}.", header, payload)
    }

    fn config(token: String) -> ExecutorConfig {
        ExecutorConfig {
            build_id: Some(json!(1234)),
            api_uri: Some("https://api.example.com".to_string()),
            token: Some(token),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));
        let temporal = token_with_scope(&["temporal"]);

        let token = exchanger
            .exchange_token_for_build(&config(temporal.clone()), Some(90.0))
            .await
            .unwrap();
        assert_eq!(token, "X");

        let requests = exchanger.client().requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.uri, "https://api.example.com/v4/builds/1234/token");
        assert_eq!(request.headers["Authorization"], format!("Bearer {}", temporal));
        assert_eq!(request.body, Some(json!({ "buildTimeout": 90 })));
        assert!(request.tls_verify);
        assert!(request.json);
    }

    #[tokio::test]
    async fn test_default_timeout() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));

        exchanger
            .exchange_token_for_build(&config(token_with_scope(&["temporal"])), None)
            .await
            .unwrap();

        let requests = exchanger.client().requests();
        assert_eq!(requests[0].body, Some(json!({ "buildTimeout": 90 })));
    }

    #[tokio::test]
    async fn test_fractional_timeout_sent_as_float() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));

        exchanger
            .exchange_token_for_build(&config("opaque".to_string()), Some(1.5))
            .await
            .unwrap();

        let requests = exchanger.client().requests();
        assert_eq!(requests[0].body, Some(json!({ "buildTimeout": 1.5 })));
    }

    #[tokio::test]
    async fn test_non_finite_timeout_rejected() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));

        for timeout in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = exchanger
                .exchange_token_for_build(&config(token_with_scope(&["temporal"])), Some(timeout))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
            assert!(err.to_string().contains("Invalid buildTimeout value"));
        }
        assert!(exchanger.client().requests().is_empty());
    }

    #[test]
    fn test_parse_build_timeout() {
        assert_eq!(parse_build_timeout("90").unwrap(), 90.0);
        assert_eq!(parse_build_timeout(" 45.5 ").unwrap(), 45.5);

        let err = parse_build_timeout("not-a-number").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: Invalid buildTimeout value: not-a-number"
        );
        assert!(parse_build_timeout("inf").is_err());
        assert!(parse_build_timeout("NaN").is_err());
    }

    #[tokio::test]
    async fn test_exchange_failure_echoes_body() {
        let body = json!({
            "statusCode": 409,
            "error": "Conflict",
            "message": "Build already running"
        });
        let exchanger = TokenExchanger::new(RecordingClient::new(409, body.clone()));

        let err = exchanger
            .exchange_token_for_build(&config(token_with_scope(&["temporal"])), Some(90.0))
            .await
            .unwrap_err();

        match &err {
            Error::ExchangeFailure { status, .. } => assert_eq!(*status, 409),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains(&body.to_string()));
    }

    #[tokio::test]
    async fn test_success_without_token_is_failure() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "other": 1 })));

        let err = exchanger
            .exchange_token_for_build(&config(token_with_scope(&["temporal"])), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExchangeFailure { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_build_scoped_token_returned_unchanged() {
        let exchanger = TokenExchanger::new(RecordingClient::new(500, json!({})));
        let build_token = token_with_scope(&["build"]);

        let token = exchanger
            .exchange_token_for_build(&config(build_token.clone()), Some(90.0))
            .await
            .unwrap();

        assert_eq!(token, build_token);
        assert!(exchanger.client().requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagated() {
        let exchanger = TokenExchanger::new(FailingClient);

        let err = exchanger
            .exchange_token_for_build(&config(token_with_scope(&["temporal"])), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));

        let mut missing_uri = config(token_with_scope(&["temporal"]));
        missing_uri.api_uri = None;
        assert!(matches!(
            exchanger.exchange_token_for_build(&missing_uri, None).await,
            Err(Error::InvalidArgument(_))
        ));

        let missing_token = ExecutorConfig {
            token: None,
            ..config(String::new())
        };
        assert!(matches!(
            exchanger.exchange_token_for_build(&missing_token, None).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(exchanger.client().requests().is_empty());
    }

    #[tokio::test]
    async fn test_trailing_slash_and_string_build_id() {
        let exchanger = TokenExchanger::new(RecordingClient::new(200, json!({ "token": "X" })));
        let config = ExecutorConfig {
            build_id: Some(json!("build 7")),
            api_uri: Some("https://api.example.com/".to_string()),
            token: Some("opaque".to_string()),
            ..Default::default()
        };

        exchanger.exchange_token_for_build(&config, None).await.unwrap();

        let requests = exchanger.client().requests();
        assert_eq!(
            requests[0].uri,
            "https://api.example.com/v4/builds/build%207/token"
        );
    }
}
