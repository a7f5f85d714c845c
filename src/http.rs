//! Blocking HTTP helper with a fixed retry budget.
//!
//! Every call goes through [`HttpClient::make_request`], which retries the
//! whole request on any failure (transport error, non-2xx status, or a body
//! that isn't JSON) and sleeps the calling thread between attempts.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, error};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::error::{HttpError, ReconcileError, Result};

/// Request headers, passed explicitly through every call.
pub type Headers = BTreeMap<String, String>;

/// HTTP verbs used against the inventory API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        };
        f.write_str(name)
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` fields (POST).
    Form(Vec<(String, String)>),
    /// JSON document (PUT).
    Json(Value),
}

/// A single request as handed to a [`Transport`].
#[derive(Debug)]
pub struct ApiRequest<'a> {
    pub method: HttpMethod,
    pub url: &'a str,
    pub headers: &'a Headers,
    pub body: &'a RequestBody,
}

/// Executes one HTTP attempt and decodes the JSON response.
pub trait Transport {
    fn execute(&self, request: &ApiRequest<'_>) -> std::result::Result<Value, HttpError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Uses a preconfigured client (proxy, timeouts, TLS roots).
    pub fn with_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &ApiRequest<'_>) -> std::result::Result<Value, HttpError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url),
            HttpMethod::Post => self.client.post(request.url),
            HttpMethod::Put => self.client.put(request.url),
        };
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Json(document) => builder.json(document),
        };

        let response = builder
            .send()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_body(&text)
    }
}

/// Decodes a response body. An empty body decodes as JSON `null`.
pub fn parse_body(text: &str) -> std::result::Result<Value, HttpError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| HttpError::Decode(e.to_string()))
}

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// A transport paired with its retry policy.
pub struct HttpClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> HttpClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        HttpClient { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a request, retrying the whole operation on any failure.
    ///
    /// Returns the parsed JSON body of the first successful attempt, or the
    /// failure of the last attempt once the retry budget is spent.
    pub fn make_request(
        &self,
        url: &str,
        headers: &Headers,
        method: HttpMethod,
        body: RequestBody,
    ) -> Result<Value> {
        let max_attempts = self.retry.max_attempts.max(1);
        let request = ApiRequest {
            method,
            url,
            headers,
            body: &body,
        };

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            debug!("{} {} (attempt {}/{})", method, url, attempt, max_attempts);

            match self.transport.execute(&request) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    error!("Request failed: {} {}: {}", method, url, err);
                    if attempt >= max_attempts {
                        return Err(ReconcileError::Request {
                            url: url.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }
            thread::sleep(self.retry.delay);
        }
    }

    pub fn get(&self, url: &str, headers: &Headers) -> Result<Value> {
        self.make_request(url, headers, HttpMethod::Get, RequestBody::Empty)
    }

    pub fn post_form(
        &self,
        url: &str,
        headers: &Headers,
        fields: Vec<(String, String)>,
    ) -> Result<Value> {
        self.make_request(url, headers, HttpMethod::Post, RequestBody::Form(fields))
    }

    pub fn put_json(&self, url: &str, headers: &Headers, document: Value) -> Result<Value> {
        self.make_request(url, headers, HttpMethod::Put, RequestBody::Json(document))
    }
}

/// Joins the base URL and an API path.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Joins the base URL and an API path and appends URL-encoded query params.
pub fn api_url_with_query(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<String> {
    let url = api_url(base_url, path);
    reqwest::Url::parse_with_params(&url, params)
        .map(String::from)
        .map_err(|e| ReconcileError::InvalidUrl {
            url,
            message: e.to_string(),
        })
}
