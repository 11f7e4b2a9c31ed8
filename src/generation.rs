// src/generation.rs

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{self, NewGenerationJob};
use crate::enrichment;
use crate::llm::{ChatMessage, Completion, LanguageModel, LlmError};
use crate::prompt;

pub const MAX_VARIATIONS: u32 = 5;
pub const MIN_BULLETS: usize = 3;
const LEARNING_EXAMPLES: i64 = 5;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model output rejected: {0}")]
    InvalidOutput(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Property {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub beds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub baths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub lot_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub year_built: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub parking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub hoa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub school_district: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StyleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "string_list")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ComplianceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair_housing: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerationRequest {
    #[serde(default)]
    pub property: Property,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "string_list")]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub style: StyleOptions,
    #[serde(default)]
    pub compliance: ComplianceOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub variations: Option<u32>,
}

impl GenerationRequest {
    pub fn variation_count(&self) -> u32 {
        self.variations.unwrap_or(1).clamp(1, MAX_VARIATIONS)
    }
}

/// The drafting pass output. Deserializing into this type is the schema check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCopy {
    pub description_mls: String,
    pub bullets: Vec<String>,
    pub social_caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub suggest: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    #[serde(flatten)]
    pub copy: ListingCopy,
    pub flags: Vec<ComplianceFinding>,
    pub variation: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt: i64,
    pub completion: i64,
}

impl TokenUsage {
    fn add(&mut self, completion: &Completion) {
        self.prompt += completion.input_tokens;
        self.completion += completion.output_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub job_id: String,
    pub primary: Variation,
    pub variations: Vec<Variation>,
    pub tokens: TokenUsage,
    pub model: String,
}

pub fn validate_listing_copy(text: &str) -> Result<ListingCopy, GenerationError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| GenerationError::InvalidOutput(format!("response is not valid JSON: {e}")))?;
    let copy: ListingCopy = serde_json::from_value(value)
        .map_err(|e| GenerationError::InvalidOutput(format!("response does not match schema: {e}")))?;
    if copy.bullets.len() < MIN_BULLETS {
        return Err(GenerationError::InvalidOutput(format!(
            "expected at least {MIN_BULLETS} bullets, got {}",
            copy.bullets.len()
        )));
    }
    Ok(copy)
}

/// Reads compliance findings; anything unparseable counts as no findings.
pub fn parse_findings(text: &str) -> Vec<ComplianceFinding> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        log::warn!("compliance review returned non-JSON output, treating as no findings");
        return Vec::new();
    };
    let items = match &value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("flags")
            .or_else(|| map.get("findings"))
            .and_then(|v| v.as_array()),
        _ => None,
    };
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Fills missing or null fields of `target` from `defaults`, recursing into objects.
pub fn merge_under(target: &mut Value, defaults: &Value) {
    let (Value::Object(target), Value::Object(defaults)) = (target, defaults) else {
        return;
    };
    for (key, default) in defaults {
        match target.get_mut(key) {
            None | Some(Value::Null) => {
                target.insert(key.clone(), default.clone());
            }
            Some(existing) if existing.is_object() && default.is_object() => {
                merge_under(existing, default);
            }
            Some(_) => {}
        }
    }
}

#[derive(Clone)]
pub struct Generator {
    pool: SqlitePool,
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl Generator {
    pub fn new(pool: SqlitePool, model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            pool,
            model,
            timeout,
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Runs the drafting and compliance passes for every requested variation and
    /// persists a single job row once all of them succeeded.
    pub async fn generate(
        &self,
        caller: Option<&str>,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let request = match (caller, request.template_id.clone()) {
            (Some(email), Some(template_id)) => {
                self.apply_template(email, &template_id, request).await?
            }
            _ => request,
        };

        let has_address = request
            .property
            .address
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if !has_address {
            return Err(GenerationError::InvalidRequest(
                "property.address is required".to_string(),
            ));
        }

        let examples = match caller {
            Some(email) => self.learning_examples(email).await?,
            None => Vec::new(),
        };

        let count = request.variation_count();
        let system = prompt::system_prompt(&examples);
        let context = enrichment::property_context(&request.property);
        let user = prompt::user_prompt(&request, &context);

        let mut variations = Vec::with_capacity(count as usize);
        let mut tokens = TokenUsage::default();
        for index in 1..=count {
            let mut messages = vec![system.clone(), user.clone()];
            if count > 1 {
                messages.push(prompt::variation_instruction(index, count));
            }

            let draft = self.call(&messages).await?;
            tokens.add(&draft);
            let copy = validate_listing_copy(&draft.text)?;

            let review = self.call(&prompt::compliance_prompt(&copy)).await?;
            tokens.add(&review);
            let flags = parse_findings(&review.text);

            variations.push(Variation {
                copy,
                flags,
                variation: index,
            });
        }

        let primary = variations[0].clone();
        let job_id = Uuid::new_v4().to_string();
        let model = self.model_id().to_string();

        db::insert_generation_job(
            &self.pool,
            NewGenerationJob {
                id: &job_id,
                user_email: caller,
                input_payload: serde_json::to_value(&request)?,
                output_payload: serde_json::json!({
                    "primary": primary,
                    "variations": variations,
                }),
                flags: serde_json::to_value(&primary.flags)?,
                tokens_prompt: tokens.prompt,
                tokens_completion: tokens.completion,
                model: &model,
            },
        )
        .await?;

        log::info!(
            "generation stored job_id={job_id} variations={count} tokens_prompt={} tokens_completion={}",
            tokens.prompt,
            tokens.completion
        );

        Ok(GenerationOutcome {
            job_id,
            primary,
            variations,
            tokens,
            model,
        })
    }

    async fn call(&self, messages: &[ChatMessage]) -> Result<Completion, GenerationError> {
        match tokio::time::timeout(self.timeout, self.model.complete_json(messages)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        }
    }

    async fn apply_template(
        &self,
        email: &str,
        template_id: &str,
        request: GenerationRequest,
    ) -> Result<GenerationRequest, GenerationError> {
        let Some(template) = db::find_usable_template(&self.pool, email, template_id).await? else {
            log::warn!("template not usable template_id={template_id} user={email}");
            return Ok(request);
        };

        let mut merged = serde_json::to_value(&request)?;
        merge_under(&mut merged, &template.template_data);
        let request = serde_json::from_value(merged).map_err(|e| {
            GenerationError::InvalidRequest(format!("template {template_id} has invalid fields: {e}"))
        })?;

        db::increment_template_usage(&self.pool, template_id).await?;
        Ok(request)
    }

    async fn learning_examples(
        &self,
        email: &str,
    ) -> Result<Vec<prompt::LearningExample>, GenerationError> {
        let subscription = db::get_or_create_subscription(&self.pool, email).await?;
        if !subscription.ai_learning_enabled {
            return Ok(Vec::new());
        }
        Ok(db::learning_examples(&self.pool, email, LEARNING_EXAMPLES).await?)
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.to_string().parse().ok(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => crate::models::split_keywords(&s),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn copy_with_two_bullets_is_rejected() {
        let text = json!({
            "description_mls": "Bright home",
            "bullets": ["a", "b"],
            "social_caption": "New listing"
        })
        .to_string();
        assert!(matches!(
            validate_listing_copy(&text),
            Err(GenerationError::InvalidOutput(_))
        ));
    }

    #[test]
    fn copy_missing_caption_is_rejected() {
        let text = json!({"description_mls": "x", "bullets": ["a", "b", "c"]}).to_string();
        assert!(validate_listing_copy(&text).is_err());
    }

    #[test]
    fn findings_accept_flags_or_findings_keys() {
        let flags = parse_findings(r#"{"flags":[{"type":"fair_housing","original":"perfect for families"}]}"#);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind.as_deref(), Some("fair_housing"));

        let findings = parse_findings(r#"{"findings":[{"note":"unverifiable"}]}"#);
        assert_eq!(findings[0].note.as_deref(), Some("unverifiable"));

        assert!(parse_findings("not json at all").is_empty());
        assert!(parse_findings(r#"{"flags":"none"}"#).is_empty());
    }

    #[test]
    fn request_fields_win_over_template_fields() {
        let mut request = json!({"property": {"address": "1 Main St"}, "style": {"voice": "luxury"}});
        let template = json!({
            "property": {"address": "9 Elm St", "type": "Condo"},
            "style": {"voice": "neutral", "reading_level": "simple"},
            "highlights": ["Pool"]
        });
        merge_under(&mut request, &template);
        assert_eq!(request["property"]["address"], "1 Main St");
        assert_eq!(request["property"]["type"], "Condo");
        assert_eq!(request["style"]["voice"], "luxury");
        assert_eq!(request["style"]["reading_level"], "simple");
        assert_eq!(request["highlights"], json!(["Pool"]));
    }

    #[test]
    fn variation_count_is_clamped() {
        let mut request = GenerationRequest::default();
        assert_eq!(request.variation_count(), 1);
        request.variations = Some(0);
        assert_eq!(request.variation_count(), 1);
        request.variations = Some(12);
        assert_eq!(request.variation_count(), MAX_VARIATIONS);
    }

    #[test]
    fn numeric_facts_accept_strings() {
        let request: GenerationRequest = serde_json::from_value(json!({
            "property": {"address": "1 Main St", "beds": "3", "sqft": 1820, "hoa": 250},
            "style": {"keywords": "lake, dock"},
            "variations": "2"
        }))
        .unwrap();
        assert_eq!(request.property.beds, Some(3.0));
        assert_eq!(request.property.sqft, Some(1820.0));
        assert_eq!(request.property.hoa.as_deref(), Some("250"));
        assert_eq!(request.style.keywords, vec!["lake", "dock"]);
        assert_eq!(request.variations, Some(2));
    }
}
