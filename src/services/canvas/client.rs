use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use super::{extract_error_message, CanvasApi, CanvasError, CanvasResponse};
use crate::core::{config::Settings, metrics};

/// Shared HTTP pool; hands out per-instructor clients bound to a Canvas host and token.
#[derive(Debug, Clone)]
pub(crate) struct CanvasConnector {
    client: Client,
    per_page: u32,
    max_pages: u32,
}

#[derive(Clone)]
pub(crate) struct HttpCanvasClient {
    client: Client,
    base_url: Url,
    token: String,
    per_page: u32,
    max_pages: u32,
}

impl std::fmt::Debug for HttpCanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCanvasClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CanvasConnector {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let canvas = settings.canvas();
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(canvas.connect_timeout_seconds))
            .user_agent(canvas.user_agent.clone());
        if canvas.request_timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(canvas.request_timeout_seconds));
        }
        let client = builder.build().context("Failed to build Canvas HTTP client")?;

        Ok(Self { client, per_page: canvas.per_page, max_pages: canvas.max_pages })
    }

    pub(crate) fn connect(
        &self,
        canvas_url: &str,
        token: &str,
    ) -> Result<HttpCanvasClient, CanvasError> {
        let base_url = normalize_base_url(canvas_url)?;
        Ok(HttpCanvasClient {
            client: self.client.clone(),
            base_url,
            token: token.to_string(),
            per_page: self.per_page,
            max_pages: self.max_pages,
        })
    }
}

impl HttpCanvasClient {
    fn resolve(&self, path: &str) -> Result<Url, CanvasError> {
        resolve_relative(&self.base_url, path)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(u16, Option<String>, String), CanvasError> {
        let path = url.path().to_string();
        let method_label = method.as_str().to_string();
        let started = Instant::now();

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                metrics::record_canvas_request(&method_label, None, started.elapsed().as_secs_f64());
                return Err(CanvasError::Transport { path, message: err.to_string() });
            }
        };

        let status = response.status().as_u16();
        let next_link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_page_url);
        let text = response
            .text()
            .await
            .map_err(|err| CanvasError::Transport { path: path.clone(), message: err.to_string() })?;

        metrics::record_canvas_request(&method_label, Some(status), started.elapsed().as_secs_f64());
        tracing::debug!(method = %method_label, path = %path, status, "Canvas call completed");

        Ok((status, next_link, text))
    }

    async fn fetch_json(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(Value, Option<String>), CanvasError> {
        let path = url.path().to_string();
        let (status, next, text) = self.execute(method, url, body).await?;

        if !(200..300).contains(&status) {
            let parsed = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            return Err(CanvasError::Status {
                status,
                path,
                message: extract_error_message(&parsed),
            });
        }

        if text.trim().is_empty() {
            return Ok((Value::Null, next));
        }

        let parsed = serde_json::from_str::<Value>(&text)
            .map_err(|err| CanvasError::Decode { path, message: err.to_string() })?;
        Ok((parsed, next))
    }
}

#[async_trait]
impl CanvasApi for HttpCanvasClient {
    async fn get_json(&self, path: &str) -> Result<Value, CanvasError> {
        let url = self.resolve(path)?;
        self.fetch_json(Method::GET, url, None).await.map(|(value, _)| value)
    }

    async fn get_all(&self, path: &str) -> Result<Vec<Value>, CanvasError> {
        let mut url = self.resolve(path)?;
        if !url.query_pairs().any(|(key, _)| key == "per_page") {
            url.query_pairs_mut().append_pair("per_page", &self.per_page.to_string());
        }

        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(page_url) = next.take() {
            if pages >= self.max_pages {
                tracing::warn!(
                    path = %path,
                    max_pages = self.max_pages,
                    "Canvas pagination cap reached; returning partial collection"
                );
                break;
            }
            pages += 1;

            let (page, link) = self.fetch_json(Method::GET, page_url, None).await?;
            match page {
                Value::Array(values) => items.extend(values),
                Value::Null => {}
                other => items.push(other),
            }

            next = match link {
                Some(raw) => Some(same_origin_url(&self.base_url, &raw)?),
                None => None,
            };
        }

        Ok(items)
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, CanvasError> {
        let url = self.resolve(path)?;
        self.fetch_json(Method::PUT, url, Some(body)).await.map(|(value, _)| value)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<CanvasResponse, CanvasError> {
        let url = self.resolve(path)?;
        let (status, _, text) = self.execute(method, url, body).await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
        };
        Ok(CanvasResponse { status, body })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, CanvasError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CanvasError::InvalidEndpoint("empty Canvas URL".to_string()));
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&format!("{with_scheme}/"))
        .map_err(|err| CanvasError::InvalidEndpoint(format!("{raw}: {err}")))
}

/// Only host-relative `/api/...` paths are accepted so the token never leaves the Canvas host.
fn resolve_relative(base: &Url, path: &str) -> Result<Url, CanvasError> {
    let path = path.trim();
    if !path.starts_with("/api/") || path.starts_with("//") || path.contains("..") {
        return Err(CanvasError::InvalidEndpoint(path.to_string()));
    }
    base.join(path).map_err(|err| CanvasError::InvalidEndpoint(format!("{path}: {err}")))
}

fn same_origin_url(base: &Url, raw: &str) -> Result<Url, CanvasError> {
    let url = Url::parse(raw).map_err(|err| CanvasError::InvalidEndpoint(format!("{raw}: {err}")))?;
    if url.origin() != base.origin() {
        return Err(CanvasError::InvalidEndpoint(format!("pagination left Canvas host: {raw}")));
    }
    Ok(url)
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
fn next_page_url(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')).map(ToString::to_string)
    })
}
