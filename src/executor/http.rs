//! HTTP steps: templated request, bounded timeout, status mapping.

use std::error::Error as _;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::config::HttpConfig;
use crate::context::ExecutionContext;
use crate::scenario::{HttpCall, StepExecutionResult};

/// Characters of a non-2xx body kept in the error text.
const BODY_SNIPPET_CHARS: usize = 200;

pub struct HttpStepRunner {
    client: Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpStepRunner {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout,
        })
    }

    /// Join relative paths onto the base URL.
    fn resolve_url(&self, url: &str) -> Result<String, String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            )),
            None => Err(format!("relative url '{}' but no base_url is configured", url)),
        }
    }

    fn build_request(&self, call: &HttpCall, ctx: &ExecutionContext) -> Result<reqwest::RequestBuilder, String> {
        let url = ctx.render(&call.url).map_err(|e| e.to_string())?;
        let url = self.resolve_url(&url)?;

        let method = Method::from_bytes(call.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("invalid HTTP method '{}'", call.method))?;

        let mut headers = HeaderMap::new();
        for (name, template) in &call.headers {
            let value = ctx.render(template).map_err(|e| e.to_string())?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name '{}'", name))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| format!("invalid value for header '{}'", name.as_str()))?;
            headers.insert(name, value);
        }

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = &call.body {
            request = request.json(&ctx.render_value(body).map_err(|e| e.to_string())?);
        }
        Ok(request)
    }

    /// Perform one HTTP step. Never fails; problems become a failed result.
    pub async fn invoke(&self, call: &HttpCall, ctx: &ExecutionContext) -> StepExecutionResult {
        let prepared = Instant::now();
        let request = match self.build_request(call, ctx) {
            Ok(r) => r,
            Err(e) => return StepExecutionResult::failed(e, prepared.elapsed()),
        };

        let start = Instant::now();
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return StepExecutionResult::failed(self.network_error(&e), start.elapsed()),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return StepExecutionResult::failed(self.network_error(&e), start.elapsed()),
        };
        let elapsed = start.elapsed();

        debug!(method = %call.method, url = %call.url, status = status.as_u16(), "http step response");

        let accepted = match call.expected_status {
            Some(expected) => status.as_u16() == expected,
            None => status.is_success(),
        };
        if !accepted {
            let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
            return StepExecutionResult::failed(format!("HTTP {}: {}", status.as_u16(), snippet), elapsed);
        }

        StepExecutionResult::success(parse_payload(&body), elapsed)
    }

    fn network_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            return format!("network error: request timed out after {}ms", self.timeout.as_millis());
        }
        let mut message = format!("network error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// JSON body when it parses, the raw text otherwise, `null` when empty.
fn parse_payload(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
