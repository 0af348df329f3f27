//! Network fetcher backed by a blocking `ureq` agent
//!
//! Requests run on tokio's blocking pool so the async strategy code never
//! stalls an executor thread.

use crate::error::{RelayError, RelayResult};
use crate::fetch::request::{Headers, RedirectPolicy, RequestDescriptor};
use crate::fetch::response::Response;
use crate::fetch::Fetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::http::HeaderMap;
use ureq::Agent;

/// Redirect hops followed under `RedirectPolicy::Follow`
const MAX_REDIRECTS: u32 = 10;

/// Real network access
pub struct HttpFetcher {
    follow: Agent,
    manual: Agent,
}

impl HttpFetcher {
    /// Create a fetcher with a per-request ceiling
    pub fn new(timeout: Duration) -> Self {
        Self {
            follow: build_agent(timeout, MAX_REDIRECTS),
            manual: build_agent(timeout, 0),
        }
    }
}

fn build_agent(timeout: Duration, max_redirects: u32) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .max_redirects(max_redirects)
        .build()
        .into()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> RelayResult<Response> {
        let agent = match request.redirect {
            RedirectPolicy::Follow => self.follow.clone(),
            RedirectPolicy::Manual | RedirectPolicy::Error => self.manual.clone(),
        };
        let owned = request.clone();

        let response = tokio::task::spawn_blocking(move || execute(&agent, &owned))
            .await
            .map_err(|e| RelayError::Internal(format!("fetch task failed: {}", e)))??;

        if request.redirect == RedirectPolicy::Error && (300..400).contains(&response.status) {
            return Err(RelayError::network(
                request.url.as_str(),
                format!("redirect ({}) not allowed", response.status),
            ));
        }

        debug!("{} -> {}", request, response.status);
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn execute(agent: &Agent, request: &RequestDescriptor) -> RelayResult<Response> {
    let url = request.url.as_str();
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let result = if request.body.is_empty() {
        let built = builder
            .body(())
            .map_err(|e| RelayError::RequestConstruction(e.to_string()))?;
        agent.run(built)
    } else {
        let built = builder
            .body(request.body.clone())
            .map_err(|e| RelayError::RequestConstruction(e.to_string()))?;
        agent.run(built)
    };

    let response = result.map_err(|e| RelayError::network(url, e.to_string()))?;

    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());

    let mut body = response.into_body();
    let bytes = body
        .read_to_vec()
        .map_err(|e| RelayError::network(url, format!("reading body: {}", e)))?;

    Ok(Response::new(status, headers, bytes))
}

/// Flatten a header map; repeated fields are joined with ", "
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|joined: &mut String| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use ureq::http::HeaderValue;

    #[test]
    fn repeated_headers_are_joined() {
        let mut map = HeaderMap::new();
        map.append("vary", HeaderValue::from_static("accept-encoding"));
        map.append("vary", HeaderValue::from_static("accept-language"));
        map.append("set-cookie", HeaderValue::from_static("a=1"));
        map.append("set-cookie", HeaderValue::from_static("b=2"));
        map.insert("content-type", HeaderValue::from_static("image/webp"));

        let headers = collect_headers(&map);
        assert_eq!(headers["vary"], "accept-encoding, accept-language");
        assert_eq!(headers["set-cookie"], "a=1, b=2");
        assert_eq!(headers["content-type"], "image/webp");
    }

    #[test]
    fn non_text_header_values_are_skipped() {
        let mut map = HeaderMap::new();
        map.insert("x-binary", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert!(collect_headers(&map).is_empty());
    }
}
