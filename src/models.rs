// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::{ComplianceFinding, Variation};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingEvent {
    pub id: String,
    pub user_email: String,
    pub credits_added: i64,
    pub stripe_checkout_id: String,
    pub stripe_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub output: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandPreset {
    pub id: String,
    pub user_email: String,
    pub name: String,
    pub voice: Option<String>,
    pub reading_level: Option<String>,
    pub keywords: Vec<String>,
    pub company_name: Option<String>,
    pub agent_name: Option<String>,
    pub phone: Option<String>,
    pub email_signature: Option<String>,
    pub custom_disclaimers: Option<String>,
    pub specializations: Vec<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keyword lists arrive either as JSON arrays or as comma separated strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeywordList {
    List(Vec<String>),
    Joined(String),
}

impl KeywordList {
    pub fn joined(&self) -> String {
        match self {
            KeywordList::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            KeywordList::Joined(s) => s.trim().to_string(),
        }
    }
}

pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveBrandPreset {
    pub id: Option<String>,
    pub name: Option<String>,
    pub voice: Option<String>,
    pub reading_level: Option<String>,
    pub keywords: Option<KeywordList>,
    pub company_name: Option<String>,
    pub agent_name: Option<String>,
    pub phone: Option<String>,
    pub email_signature: Option<String>,
    pub custom_disclaimers: Option<String>,
    pub specializations: Option<KeywordList>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyTemplate {
    pub id: String,
    pub user_email: String,
    pub name: String,
    pub property_type: Option<String>,
    pub description: Option<String>,
    pub template_data: serde_json::Value,
    pub is_shared: bool,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavePropertyTemplate {
    pub id: Option<String>,
    pub name: String,
    pub property_type: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub template_data: serde_json::Value,
    #[serde(default)]
    pub is_shared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Pro,
}

pub struct PlanLimits {
    pub max_brands: i64,
    pub max_templates: i64,
    pub ai_learning_enabled: bool,
    pub batch_processing: bool,
    pub analytics_access: bool,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Pro => "pro",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "basic" => Some(Plan::Basic),
            "pro" => Some(Plan::Pro),
            _ => None,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::Basic => PlanLimits {
                max_brands: 1,
                max_templates: 5,
                ai_learning_enabled: false,
                batch_processing: false,
                analytics_access: false,
            },
            Plan::Pro => PlanLimits {
                max_brands: 5,
                max_templates: 20,
                ai_learning_enabled: true,
                batch_processing: true,
                analytics_access: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub user_email: String,
    pub plan: String,
    pub max_brands: i64,
    pub max_templates: i64,
    pub ai_learning_enabled: bool,
    pub batch_processing: bool,
    pub analytics_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "processing" => BatchStatus::Processing,
            "completed" => BatchStatus::Completed,
            "failed" => BatchStatus::Failed,
            _ => BatchStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub property: serde_json::Value,
    pub result: Option<Variation>,
    pub flags: Vec<ComplianceFinding>,
    pub status: ItemStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: String,
    pub user_email: String,
    pub status: BatchStatus,
    pub total: i64,
    pub completed: i64,
    pub results: Vec<BatchItemResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
