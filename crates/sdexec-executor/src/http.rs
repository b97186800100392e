//! reqwest-backed HTTP client.

use async_trait::async_trait;
use sdexec_core::TransportError;
use sdexec_core::http::{HttpClient, HttpRequest, HttpResponse, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry behavior for transport errors and 5xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// HTTP client for the pipeline API.
pub struct ReqwestClient {
    verified: reqwest::Client,
    insecure: reqwest::Client,
    retry: RetryPolicy,
}

impl ReqwestClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let verified = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_error)?;
        let insecure = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(map_error)?;

        Ok(Self {
            verified,
            insecure,
            retry,
        })
    }

    /// Create with custom clients, the first one verifying certificates.
    pub fn with_clients(
        verified: reqwest::Client,
        insecure: reqwest::Client,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            verified,
            insecure,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = if request.tls_verify {
            &self.verified
        } else {
            &self.insecure
        };

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(ref body) = request.body {
            builder = if request.json {
                builder.json(body)
            } else {
                builder.body(body.to_string())
            };
        }

        let response = builder.send().await.map_err(map_error)?;
        let status_code = response.status().as_u16();
        let text = response.text().await.map_err(map_error)?;

        let body = if request.json && !text.is_empty() {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else if text.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        };

        Ok(HttpResponse { status_code, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(method = %request.method, uri = %request.uri, attempt, "Sending request");
            let result = self.send_once(&request).await;

            let retryable = match &result {
                Ok(response) => response.status_code >= 500,
                Err(_) => true,
            };
            if !retryable || attempt >= attempts {
                return result;
            }

            match &result {
                Ok(response) => {
                    warn!(status = response.status_code, attempt, "Server error, retrying")
                }
                Err(e) => warn!(error = %e, attempt, "Request failed, retrying"),
            }
            tokio::time::sleep(self.retry.retry_delay).await;
            attempt += 1;
        }
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Local client ignoring proxy settings of the environment.
    fn local_client(max_attempts: u32) -> ReqwestClient {
        let build = || {
            reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap()
        };
        ReqwestClient::with_clients(
            build(),
            build(),
            RetryPolicy {
                max_attempts,
                retry_delay: Duration::from_millis(10),
            },
        )
    }

    /// Read one request, returning the raw head and body.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve the given responses in order, one per connection.
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                counter.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            requests
        });

        (format!("http://{}", addr), hits, handle)
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let (base, hits, server) = serve(vec![(200, r#"{"token":"X"}"#)]).await;
        let client = local_client(1);

        let response = client
            .request(
                HttpRequest::post(format!("{}/v4/builds/1/token", base))
                    .bearer("temporal")
                    .json_body(json!({ "buildTimeout": 90 })),
            )
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, json!({ "token": "X" }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let requests = server.await.unwrap();
        let raw = requests[0].to_ascii_lowercase();
        assert!(raw.starts_with("post /v4/builds/1/token"));
        assert!(raw.contains("authorization: bearer temporal"));
        assert!(raw.contains(r#"{"buildtimeout":90}"#));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (base, hits, _server) =
            serve(vec![(503, r#"{"error":"busy"}"#), (200, r#"{"ok":true}"#)]).await;
        let client = local_client(3);

        let response = client
            .request(HttpRequest::new(Method::Get, format!("{}/status", base)))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let (base, hits, _server) = serve(vec![(409, r#"{"message":"conflict"}"#)]).await;
        let client = local_client(3);

        let response = client
            .request(HttpRequest::new(Method::Get, format!("{}/status", base)))
            .await
            .unwrap();

        assert_eq!(response.status_code, 409);
        assert_eq!(response.body, json!({ "message": "conflict" }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_server_error_returned() {
        let (base, hits, _server) = serve(vec![(500, r#"{}"#), (502, r#"{}"#)]).await;
        let client = local_client(2);

        let response = client
            .request(HttpRequest::new(Method::Get, format!("{}/status", base)))
            .await
            .unwrap();

        assert_eq!(response.status_code, 502);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_json_body_kept_as_string() {
        let (base, _hits, _server) = serve(vec![(200, "plain text")]).await;
        let client = local_client(1);

        let response = client
            .request(HttpRequest::new(Method::Get, format!("{}/", base)))
            .await
            .unwrap();

        assert_eq!(response.body, json!("plain text"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(2);
        let err = client
            .request(HttpRequest::new(Method::Get, format!("http://{}/", addr)))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_new_keeps_retry_policy() {
        let client = ReqwestClient::new(Duration::from_secs(1), RetryPolicy::default()).unwrap();
        assert_eq!(client.retry_policy(), &RetryPolicy::default());
    }
}
