// src/api/stripe_client.rs
//
// Minimal Stripe REST client: Checkout Session create and retrieve.
// Auth: `Authorization: Bearer <secret key>`, form-encoded request bodies.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub line_items: Option<LineItemList>,
}

impl CheckoutSession {
    /// Paying customer's email, falling back to the prefilled and tagged addresses.
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .or_else(|| self.metadata_value("email"))
            .filter(|e| !e.trim().is_empty())
    }

    pub fn credits(&self) -> Option<u32> {
        self.metadata_value("credits")
            .and_then(|c| c.trim().parse::<u32>().ok())
            .filter(|c| *c > 0)
    }

    pub fn price_id(&self) -> Option<&str> {
        self.line_items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.get(key)).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub price_id: &'a str,
    pub pack: &'a str,
    pub credits: u32,
    pub email: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    timeout: Duration,
}

impl StripeClient {
    pub fn new(base_url: &str, secret_key: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            timeout,
        }
    }

    /// One-time payment for a single price, tagged with the pack and credit amount.
    pub async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let credits = req.credits.to_string();
        let form = [
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", req.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", req.success_url.as_str()),
            ("cancel_url", req.cancel_url.as_str()),
            ("customer_email", req.email),
            ("metadata[pack]", req.pack),
            ("metadata[credits]", credits.as_str()),
            ("metadata[email]", req.email),
        ];

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await?;

        Self::parse(resp).await
    }

    /// Fetches a session with its line items expanded.
    pub async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, StripeError> {
        let resp = self
            .http
            .get(format!("{}/v1/checkout/sessions/{id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .timeout(self.timeout)
            .query(&[("expand[]", "line_items")])
            .send()
            .await?;

        Self::parse(resp).await
    }

    async fn parse(resp: reqwest::Response) -> Result<CheckoutSession, StripeError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<CheckoutSession>(&body)
            .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
    }
}

/// Checkout session ids are opaque tokens such as `cs_test_a1B2`.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_accessors_prefer_customer_details() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "customer_email": "prefill@example.com",
            "customer_details": {"email": "payer@example.com"},
            "metadata": {"pack": "20", "credits": "20"},
            "line_items": {"data": [{"price": {"id": "price_20"}}]}
        }))
        .unwrap();
        assert_eq!(session.email(), Some("payer@example.com"));
        assert_eq!(session.credits(), Some(20));
        assert_eq!(session.price_id(), Some("price_20"));
        assert!(session.is_paid());
    }

    #[test]
    fn zero_or_missing_credits_are_none() {
        let session: CheckoutSession =
            serde_json::from_value(json!({"id": "cs_1", "metadata": {"credits": "0"}})).unwrap();
        assert_eq!(session.credits(), None);
        assert_eq!(session.email(), None);
    }

    #[test]
    fn session_id_charset() {
        assert!(is_valid_session_id("cs_test_a1B2"));
        assert!(!is_valid_session_id("../v1/customers"));
        assert!(!is_valid_session_id(""));
    }
}
