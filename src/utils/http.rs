// src/utils/http.rs
//! Shared JSON-over-HTTP client
//!
//! Used for both sides of task execution: proxying to persistent agent
//! endpoints and invoking ephemeral workers on their leased ports. Transport
//! failures map to `Comm`, upstream non-2xx responses to `Remote` carrying
//! the upstream's own error detail.

use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::debug;

/// JSON request/response client over hyper
#[derive(Clone)]
pub struct JsonClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl JsonClient {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }

    /// POST a JSON payload and return the decoded JSON response body.
    ///
    /// Bodies that are not valid JSON come back as a JSON string value, so
    /// plain-text agent responses still produce a usable task result.
    pub async fn post_json(&self, url: &str, payload: &Value) -> Result<Value> {
        let uri: Uri = url
            .parse()
            .map_err(|e| EngineError::Comm(format!("invalid url {url}: {e}")))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| EngineError::Comm(format!("payload encode error: {e}")))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| EngineError::Comm(format!("request build error: {e}")))?;

        debug!(%url, "POST");

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| EngineError::Comm(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| EngineError::Comm(format!("response body error: {e}")))?
            .to_bytes();

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes);
            return Err(EngineError::Remote(format!(
                "{} from {url}: {}",
                status,
                detail.trim()
            )));
        }

        Ok(decode_body(&bytes, status))
    }
}

impl Default for JsonClient {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_body(bytes: &Bytes, status: StatusCode) -> Value {
    if bytes.is_empty() {
        return Value::String(status.to_string());
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
