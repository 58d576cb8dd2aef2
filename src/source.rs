//! Mailbox message source.
//!
//! [`MessageSource`] is the capability the pipeline fetches through.
//! [`GmailSource`] implements it against the Gmail REST API with a
//! caller-supplied bearer token; the OAuth exchange that produces the
//! token lives outside this crate. Message bodies arrive as a MIME part
//! tree with base64url-encoded data; the first `text/plain` part found by
//! depth-first walk becomes the body text, decoded lossily so malformed
//! bytes never fail a fetch.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::EmailMessage;
use crate::synth::resolve_api_key;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch one message (id, subject, plain-text body) by id.
    async fn get_by_id(&self, id: &str) -> Result<EmailMessage>;

    /// Resolve the id of the newest inbox message, optionally filtered by
    /// a mailbox search query.
    async fn latest_id(&self, query: Option<&str>) -> Result<String>;
}

pub struct GmailSource {
    client: reqwest::Client,
    access_token: String,
    timeout: Duration,
}

impl GmailSource {
    /// Build a source from config. The bearer token is resolved from
    /// `GMAIL_ACCESS_TOKEN`, falling back to `{secrets_dir}/gmail_token.txt`.
    pub fn new(config: &SourceConfig, secrets_dir: &Path) -> Result<Self> {
        let access_token =
            resolve_api_key("GMAIL_ACCESS_TOKEN", &secrets_dir.join("gmail_token.txt"))
                .ok_or_else(|| {
                    Error::Validation(
                        "Gmail access token missing: set GMAIL_ACCESS_TOKEN or provide gmail_token.txt"
                            .into(),
                    )
                })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            client,
            access_token,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::from_http(e, self.timeout))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(Error::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| Error::from_http(e, self.timeout))
    }
}

#[async_trait]
impl MessageSource for GmailSource {
    async fn get_by_id(&self, id: &str) -> Result<EmailMessage> {
        let url = format!("{GMAIL_BASE}/messages/{id}");
        let value = self
            .get_json(&url, &[("format", "full")])
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(id.to_string()),
                other => other,
            })?;

        let message: GmailMessage = serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("malformed message response: {e}")))?;

        let subject = message
            .payload
            .as_ref()
            .map(|p| p.header("Subject"))
            .unwrap_or_default();
        let body = message
            .payload
            .as_ref()
            .and_then(extract_plain_text)
            .unwrap_or_default();
        debug!(id, subject, body_chars = body.chars().count(), "fetched message");

        Ok(EmailMessage {
            id: message.id,
            subject,
            body,
        })
    }

    async fn latest_id(&self, query: Option<&str>) -> Result<String> {
        let url = format!("{GMAIL_BASE}/messages");
        let mut params = vec![("labelIds", "INBOX"), ("maxResults", "1")];
        if let Some(q) = query {
            params.push(("q", q));
        }
        let value = self.get_json(&url, &params).await?;

        let listing: MessageListing = serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("malformed listing response: {e}")))?;
        listing
            .messages
            .into_iter()
            .flatten()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| Error::NotFound("no messages in INBOX matched the query".into()))
    }
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    id: String,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize, Default)]
struct PartBody {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageListing {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

impl MessagePart {
    fn header(&self, name: &str) -> String {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// Depth-first search for the first non-empty `text/plain` part.
fn extract_plain_text(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/plain" {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            let text = decode_body(data);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    part.parts.iter().find_map(extract_plain_text)
}

/// Decode a base64url body segment, tolerating padded and unpadded input
/// and any malformed byte sequences inside.
fn decode_body(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
