use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use yansi::Paint;

use super::path::{normalize_root, scoped_path};
use super::BlobStore;
use crate::error::StoreError;

static SILENT: AtomicBool = AtomicBool::new(false);

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

fn log_output(msg: String) {
    if !SILENT.load(Ordering::Relaxed) {
        println!("{}", msg);
    }
}

/// Client for a Dropbox-compatible HTTP file API, confined to one root folder.
pub struct RemoteFileClient {
    client: reqwest::Client,
    api_url: String,
    content_url: String,
    root: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListEntry>,
    #[serde(default)]
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
}

impl RemoteFileClient {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        content_url: &str,
        root: &str,
        access_token: String,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            content_url: content_url.trim_end_matches('/').to_string(),
            root: normalize_root(root),
            access_token,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Echo a request as a curl command line, the way the console shows it.
    fn log_request(&self, url: &str, api_arg: Option<&str>, body: Option<&Value>) {
        let mut parts = Vec::new();
        parts.push(Paint::new("curl").fg(yansi::Color::Green).bold().to_string());
        parts.push(format!("-X {}", Paint::new("POST").fg(yansi::Color::Yellow).bold()));
        parts.push(format!("'{}'", Paint::new(url).fg(yansi::Color::Cyan)));
        parts.push(format!(
            "{} {}",
            Paint::new("-H").fg(yansi::Color::Magenta),
            Paint::new("'Authorization: Bearer ***'").fg(yansi::Color::Magenta)
        ));
        if let Some(arg) = api_arg {
            parts.push(format!(
                "{} {}",
                Paint::new("-H").fg(yansi::Color::Magenta),
                Paint::new(format!("'Dropbox-API-Arg: {}'", arg)).fg(yansi::Color::Magenta)
            ));
        }
        if let Some(b) = body {
            let escaped = b.to_string().replace('\'', "'\\''");
            parts.push(format!(
                "{} {}",
                Paint::new("-d").fg(yansi::Color::Blue),
                Paint::new(format!("'{}'", escaped)).fg(yansi::Color::White)
            ));
        }
        log_output(format!("Request:\n{}", parts.join(" ")));
    }

    fn log_response(&self, status: reqwest::StatusCode, summary: &str) {
        let line = format!("HTTP {}: {}", status.as_u16(), summary);
        let painted = if status.is_success() {
            Paint::new(line).rgb(100, 100, 100).to_string()
        } else {
            Paint::new(line).fg(yansi::Color::Red).to_string()
        };
        log_output(format!("Response:\n{}", painted));
    }

    /// JSON-in, JSON-out call against the API host.
    async fn rpc(&self, endpoint: &str, body: Value, name: &str) -> Result<Value, StoreError> {
        let url = format!("{}{}", self.api_url, endpoint);
        self.log_request(&url, None, Some(&body));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        self.log_response(status, &text);

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text, name));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Http {
            status: status.as_u16(),
            body: format!("unparseable response: {}", e),
        })
    }

    async fn list_page(&self, endpoint: &str, body: Value) -> Result<ListFolderResponse, StoreError> {
        let value = self.rpc(endpoint, body, &self.root).await?;
        serde_json::from_value(value).map_err(|e| StoreError::Http {
            status: 200,
            body: format!("unexpected list_folder response: {}", e),
        })
    }
}

/// Map a failed response to a [`StoreError`]. The API reports missing
/// paths as HTTP 409 with an `error_summary` such as `path/not_found/..`.
pub fn classify_error(status: u16, body: &str, name: &str) -> StoreError {
    match status {
        401 => StoreError::Unauthorized,
        409 if body.contains("not_found") => StoreError::NotFound(name.to_string()),
        _ => StoreError::Http {
            status,
            body: error_summary(body),
        },
    }
}

fn error_summary(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error_summary").and_then(|s| s.as_str()).map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Serialise a JSON value for an HTTP header: header values must be ASCII,
/// so every non-ASCII character is escaped as `\uXXXX` (UTF-16 units).
pub fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[async_trait]
impl BlobStore for RemoteFileClient {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let first = self
            .list_page("/2/files/list_folder", json!({ "path": self.root }))
            .await;
        let mut page = match first {
            Ok(p) => p,
            Err(StoreError::NotFound(_)) => {
                tracing::info!(root = %self.root, "root folder does not exist yet");
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        loop {
            names.extend(
                page.entries
                    .drain(..)
                    .filter(|e| e.tag == "file")
                    .map(|e| e.name),
            );
            if !page.has_more {
                break;
            }
            page = self
                .list_page("/2/files/list_folder/continue", json!({ "cursor": page.cursor }))
                .await?;
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = scoped_path(&self.root, name)?;
        let url = format!("{}/2/files/download", self.content_url);
        let arg = header_safe_json(&json!({ "path": path }));
        self.log_request(&url, Some(&arg), None);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            self.log_response(status, &text);
            return Err(classify_error(status.as_u16(), &text, name));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        self.log_response(status, &format!("{} bytes", bytes.len()));
        Ok(bytes.to_vec())
    }

    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = scoped_path(&self.root, name)?;
        let url = format!("{}/2/files/upload", self.content_url);
        let arg = header_safe_json(&json!({ "path": path, "mode": "overwrite", "mute": true }));
        self.log_request(&url, Some(&arg), None);
        let size = bytes.len();

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        self.log_response(status, &text);
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text, name));
        }
        tracing::info!(file = %name, bytes = size, "uploaded");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = scoped_path(&self.root, name)?;
        self.rpc("/2/files/delete_v2", json!({ "path": path }), name)
            .await?;
        tracing::info!(file = %name, "deleted");
        Ok(())
    }

    fn describe(&self) -> String {
        let root = if self.root.is_empty() { "/" } else { &self.root };
        format!("{} (root {})", self.api_url, root)
    }
}
