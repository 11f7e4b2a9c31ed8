// src/email.rs
//
// Transactional email through the Resend HTTP API.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pdf::ListingPackage;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery is not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("email api error status={status} body={body}")]
    Api { status: u16, body: String },
}

pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(Serialize)]
struct AttachmentBody<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    from: String,
    timeout: Duration,
}

impl Mailer {
    pub fn new(base_url: &str, api_key: Option<String>, from: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from: from.to_string(),
            timeout,
        }
    }

    /// Returns the provider's message id when it reports one.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[Attachment],
    ) -> Result<Option<String>, EmailError> {
        let api_key = self.api_key.as_deref().ok_or(EmailError::NotConfigured)?;

        let body = SendRequest {
            from: &self.from,
            to: vec![to],
            subject,
            html,
            attachments: attachments
                .iter()
                .map(|a| AttachmentBody {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        };

        let resp = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(EmailError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let id = serde_json::from_str::<SendResponse>(&text)
            .ok()
            .and_then(|r| r.id);
        log::info!("email sent to={to} id={}", id.as_deref().unwrap_or("-"));
        Ok(id)
    }
}

pub fn listing_subject(package: &ListingPackage) -> String {
    let address = if package.address.trim().is_empty() {
        "Property"
    } else {
        package.address.trim()
    };
    format!("Your listing draft: {address}")
}

pub fn listing_html(package: &ListingPackage) -> String {
    let bullets: String = package
        .bullets
        .iter()
        .map(|b| format!("<li>{}</li>", escape_html(b)))
        .collect();
    format!(
        r#"<div style="font-family:system-ui,Segoe UI,Arial">
  <h2>Listing Package</h2>
  <p><strong>Address:</strong> {}</p>
  <h3>MLS Description</h3>
  <pre>{}</pre>
  <h3>Highlights</h3>
  <ul>{}</ul>
  <h3>Social Caption</h3>
  <pre>{}</pre>
</div>"#,
        escape_html(&package.address),
        escape_html(&package.description_mls),
        bullets,
        escape_html(&package.social_caption),
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}
