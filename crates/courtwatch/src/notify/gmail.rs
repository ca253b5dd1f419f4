use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{MailError, MailSender};

const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh slightly before the recorded expiry.
const EXPIRY_MARGIN: TimeDelta = TimeDelta::seconds(60);

const BODY_LINE_LEN: usize = 76;

/// An authorized-user `token.json` as written by Google's OAuth client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    /// Fields we do not use, preserved when the file is rewritten.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl StoredToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(expiry)) => expiry - EXPIRY_MARGIN > now,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// Base64 transfer encoding, folded into lines of at most 76 characters.
fn encode_body(body: &str) -> String {
    let encoded = STANDARD.encode(body);
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    encoded
        .as_bytes()
        .chunks(BODY_LINE_LEN)
        .filter_map(|line| std::str::from_utf8(line).ok())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// RFC 2822 plain-text message, UTF-8, body base64 transfer-encoded.
pub fn build_message(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\nContent-Transfer-Encoding: base64\r\n\r\n{}\r\n",
        to,
        encode_header(subject),
        encode_body(body)
    )
}

/// Request body for `users.messages.send`.
pub fn send_payload(to: &str, subject: &str, body: &str) -> serde_json::Value {
    serde_json::json!({ "raw": URL_SAFE.encode(build_message(to, subject, body)) })
}

/// Sends through the Gmail REST API as the owner of an OAuth `token.json`.
///
/// An expired access token is refreshed once per expiry and written back to the file.
pub struct GmailSender {
    client: Client,
    token_path: PathBuf,
    token: Mutex<StoredToken>,
}

impl GmailSender {
    pub fn from_token_file(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| MailError::Token {
            path: path.display().to_string(),
            source,
        })?;
        let token: StoredToken = serde_json::from_str(&raw)?;
        if token.refresh_token.is_none() && !token.is_valid_at(Utc::now()) {
            return Err(MailError::NoRefreshToken);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            token_path: path.to_path_buf(),
            token: Mutex::new(token),
        })
    }

    async fn access_token(&self) -> Result<String, MailError> {
        let mut token = self.token.lock().await;
        if let (true, Some(access)) = (token.is_valid_at(Utc::now()), &token.token) {
            return Ok(access.clone());
        }
        let refresh = token.refresh_token.clone().ok_or(MailError::NoRefreshToken)?;

        log::info!("Refreshing Gmail access token");
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("client_id", &token.client_id)
            .append_pair("client_secret", &token.client_secret)
            .append_pair("refresh_token", &refresh)
            .finish();
        let text = self
            .post(
                self.client
                    .post(&token.token_uri)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form),
            )
            .await?;
        let fresh: RefreshResponse = serde_json::from_str(&text)?;

        token.expiry = fresh
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs));
        token.token = Some(fresh.access_token.clone());
        if let Some(rotated) = fresh.refresh_token {
            token.refresh_token = Some(rotated);
        }

        let json = serde_json::to_string_pretty(&*token)?;
        if let Err(source) = tokio::fs::write(&self.token_path, json).await {
            // The refreshed token still works for this run.
            log::warn!(
                "{}",
                MailError::Token {
                    path: self.token_path.display().to_string(),
                    source,
                }
            );
        }
        Ok(fresh.access_token)
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<String, MailError> {
        let response = request
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MailSender for GmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let access = self.access_token().await?;
        let payload = serde_json::to_string(&send_payload(to, subject, body))?;
        self.post(
            self.client
                .post(SEND_URL)
                .bearer_auth(access)
                .header(CONTENT_TYPE, "application/json")
                .body(payload),
        )
        .await?;
        Ok(())
    }
}
