// src/db.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    split_keywords, BatchItemResult, BatchJob, BatchStatus, BillingEvent, BrandPreset, JobSummary,
    Plan, PropertyTemplate, SaveBrandPreset, SavePropertyTemplate, Subscription, User,
};
use crate::prompt::LearningExample;

// ---------------------------------------------------------------- users

fn user_from_row(r: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: r.try_get("id")?,
        email: r.try_get("email")?,
        credits: r.try_get("credits")?,
        created_at: r.try_get("created_at")?,
        last_login_at: r.try_get("last_login_at")?,
    })
}

pub async fn find_user(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, email, credits, created_at, last_login_at
           FROM users
           WHERE email = ?"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_password_hash(pool: &SqlitePool, email: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT password_hash FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| r.get::<Option<String>, _>("password_hash")))
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    credits: u32,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (id, email, password_hash, credits, created_at)
           VALUES (?, ?, ?, ?, ?)
           RETURNING id, email, credits, created_at, last_login_at"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(password_hash)
    .bind(i64::from(credits))
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    user_from_row(&row)
}

/// Creates a password-less account with the starting allowance if none exists yet.
pub async fn ensure_user(pool: &SqlitePool, email: &str, credits: u32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT OR IGNORE INTO users (id, email, credits, created_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(i64::from(credits))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn touch_last_login(pool: &SqlitePool, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = ? WHERE email = ?")
        .bind(Utc::now())
        .bind(email)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------- generation jobs

pub struct NewGenerationJob<'a> {
    pub id: &'a str,
    pub user_email: Option<&'a str>,
    pub input_payload: Value,
    pub output_payload: Value,
    pub flags: Value,
    pub tokens_prompt: i64,
    pub tokens_completion: i64,
    pub model: &'a str,
}

pub async fn insert_generation_job(pool: &SqlitePool, job: NewGenerationJob<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO generation_jobs
                (id, user_email, input_payload, output_payload, flags_json,
                 tokens_prompt, tokens_completion, model, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'success', ?)"#,
    )
    .bind(job.id)
    .bind(job.user_email)
    .bind(Json(&job.input_payload))
    .bind(Json(&job.output_payload))
    .bind(Json(&job.flags))
    .bind(job.tokens_prompt)
    .bind(job.tokens_completion)
    .bind(job.model)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_generation_jobs(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM generation_jobs")
        .fetch_one(pool)
        .await?;
    row.try_get("n")
}

pub async fn job_owned_by(pool: &SqlitePool, job_id: &str, email: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS found FROM generation_jobs WHERE id = ? AND user_email = ?")
        .bind(job_id)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn recent_jobs(pool: &SqlitePool, email: &str, limit: i64) -> Result<Vec<JobSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, created_at, output_payload
           FROM generation_jobs
           WHERE user_email = ?
           ORDER BY created_at DESC
           LIMIT ?"#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            let output: Json<Value> = r.try_get("output_payload")?;
            Ok(JobSummary {
                id: r.try_get("id")?,
                created_at: r.try_get("created_at")?,
                output: output.0,
            })
        })
        .collect()
}

#[derive(Debug, serde::Serialize)]
pub struct UsageTotals {
    pub jobs: i64,
    pub tokens_prompt: i64,
    pub tokens_completion: i64,
}

pub async fn usage_totals(pool: &SqlitePool, email: &str) -> Result<UsageTotals, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS jobs,
                  COALESCE(SUM(tokens_prompt), 0) AS tp,
                  COALESCE(SUM(tokens_completion), 0) AS tc
           FROM generation_jobs
           WHERE user_email = ?"#,
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(UsageTotals {
        jobs: row.try_get("jobs")?,
        tokens_prompt: row.try_get("tp")?,
        tokens_completion: row.try_get("tc")?,
    })
}

// ---------------------------------------------------------------- billing events

pub async fn recent_billing_events(
    pool: &SqlitePool,
    email: &str,
    limit: i64,
) -> Result<Vec<BillingEvent>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_email, credits_added, stripe_checkout_id, stripe_price_id, created_at
           FROM billing_events
           WHERE user_email = ?
           ORDER BY created_at DESC
           LIMIT ?"#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(BillingEvent {
                id: r.try_get("id")?,
                user_email: r.try_get("user_email")?,
                credits_added: r.try_get("credits_added")?,
                stripe_checkout_id: r.try_get("stripe_checkout_id")?,
                stripe_price_id: r.try_get("stripe_price_id")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .collect()
}

pub async fn billing_events_for_checkout(pool: &SqlitePool, checkout_id: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM billing_events WHERE stripe_checkout_id = ?")
        .bind(checkout_id)
        .fetch_one(pool)
        .await?;
    row.try_get("n")
}

// ---------------------------------------------------------------- brand presets

fn preset_from_row(r: &SqliteRow) -> Result<BrandPreset, sqlx::Error> {
    let keywords: String = r.try_get("keywords")?;
    let specializations: String = r.try_get("specializations")?;
    Ok(BrandPreset {
        id: r.try_get("id")?,
        user_email: r.try_get("user_email")?,
        name: r.try_get("name")?,
        voice: r.try_get("voice")?,
        reading_level: r.try_get("reading_level")?,
        keywords: split_keywords(&keywords),
        company_name: r.try_get("company_name")?,
        agent_name: r.try_get("agent_name")?,
        phone: r.try_get("phone")?,
        email_signature: r.try_get("email_signature")?,
        custom_disclaimers: r.try_get("custom_disclaimers")?,
        specializations: split_keywords(&specializations),
        is_default: r.try_get::<i64, _>("is_default")? != 0,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub async fn list_brand_presets(pool: &SqlitePool, email: &str) -> Result<Vec<BrandPreset>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT * FROM brand_presets
           WHERE user_email = ?
           ORDER BY is_default DESC, name"#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    rows.iter().map(preset_from_row).collect()
}

/// Inserts or updates a preset. Returns `None` when `preset.id` names a preset
/// the caller does not own. Setting `is_default` clears the flag on every other
/// preset of the same user inside the same transaction.
pub async fn save_brand_preset(
    pool: &SqlitePool,
    email: &str,
    preset: &SaveBrandPreset,
) -> Result<Option<String>, sqlx::Error> {
    let now = Utc::now();
    let name = preset.name.clone().unwrap_or_else(|| "Default".to_string());
    let keywords = preset.keywords.as_ref().map(|k| k.joined()).unwrap_or_default();
    let specializations = preset
        .specializations
        .as_ref()
        .map(|k| k.joined())
        .unwrap_or_default();

    let mut tx = pool.begin().await?;

    let id = match &preset.id {
        Some(id) => {
            let updated = sqlx::query(
                r#"UPDATE brand_presets
                   SET name = ?, voice = ?, reading_level = ?, keywords = ?, company_name = ?,
                       agent_name = ?, phone = ?, email_signature = ?, custom_disclaimers = ?,
                       specializations = ?, is_default = ?, updated_at = ?
                   WHERE id = ? AND user_email = ?"#,
            )
            .bind(&name)
            .bind(&preset.voice)
            .bind(&preset.reading_level)
            .bind(&keywords)
            .bind(&preset.company_name)
            .bind(&preset.agent_name)
            .bind(&preset.phone)
            .bind(&preset.email_signature)
            .bind(&preset.custom_disclaimers)
            .bind(&specializations)
            .bind(preset.is_default)
            .bind(now)
            .bind(id)
            .bind(email)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(None);
            }
            id.clone()
        }
        None => {
            let id = format!("brand_{}", Uuid::new_v4().simple());
            sqlx::query(
                r#"INSERT INTO brand_presets
                        (id, user_email, name, voice, reading_level, keywords, company_name,
                         agent_name, phone, email_signature, custom_disclaimers, specializations,
                         is_default, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(email)
            .bind(&name)
            .bind(&preset.voice)
            .bind(&preset.reading_level)
            .bind(&keywords)
            .bind(&preset.company_name)
            .bind(&preset.agent_name)
            .bind(&preset.phone)
            .bind(&preset.email_signature)
            .bind(&preset.custom_disclaimers)
            .bind(&specializations)
            .bind(preset.is_default)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            id
        }
    };

    if preset.is_default {
        sqlx::query("UPDATE brand_presets SET is_default = 0 WHERE user_email = ? AND id != ?")
            .bind(email)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(Some(id))
}

pub async fn delete_brand_preset(pool: &SqlitePool, email: &str, id: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM brand_presets WHERE id = ? AND user_email = ?")
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---------------------------------------------------------------- property templates

fn template_from_row(r: &SqliteRow) -> Result<PropertyTemplate, sqlx::Error> {
    let data: Json<Value> = r.try_get("template_data")?;
    Ok(PropertyTemplate {
        id: r.try_get("id")?,
        user_email: r.try_get("user_email")?,
        name: r.try_get("name")?,
        property_type: r.try_get("property_type")?,
        description: r.try_get("description")?,
        template_data: data.0,
        is_shared: r.try_get::<i64, _>("is_shared")? != 0,
        usage_count: r.try_get("usage_count")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Own templates plus templates other users shared, most used first.
pub async fn list_templates(pool: &SqlitePool, email: &str) -> Result<Vec<PropertyTemplate>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT * FROM property_templates
           WHERE user_email = ? OR is_shared = 1
           ORDER BY usage_count DESC, name"#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    rows.iter().map(template_from_row).collect()
}

pub async fn count_own_templates(pool: &SqlitePool, email: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM property_templates WHERE user_email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    row.try_get("n")
}

pub async fn find_usable_template(
    pool: &SqlitePool,
    email: &str,
    id: &str,
) -> Result<Option<PropertyTemplate>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT * FROM property_templates
           WHERE id = ? AND (user_email = ? OR is_shared = 1)"#,
    )
    .bind(id)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(template_from_row).transpose()
}

pub async fn save_template(
    pool: &SqlitePool,
    email: &str,
    template: &SavePropertyTemplate,
) -> Result<Option<PropertyTemplate>, sqlx::Error> {
    let now = Utc::now();
    let data = if template.template_data.is_null() {
        serde_json::json!({})
    } else {
        template.template_data.clone()
    };

    let id = match &template.id {
        Some(id) => {
            let updated = sqlx::query(
                r#"UPDATE property_templates
                   SET name = ?, property_type = ?, description = ?, template_data = ?,
                       is_shared = ?, updated_at = ?
                   WHERE id = ? AND user_email = ?"#,
            )
            .bind(&template.name)
            .bind(&template.property_type)
            .bind(&template.description)
            .bind(Json(&data))
            .bind(template.is_shared)
            .bind(now)
            .bind(id)
            .bind(email)
            .execute(pool)
            .await?;

            if updated.rows_affected() == 0 {
                return Ok(None);
            }
            id.clone()
        }
        None => {
            let id = format!("template_{}", Uuid::new_v4().simple());
            sqlx::query(
                r#"INSERT INTO property_templates
                        (id, user_email, name, property_type, description, template_data,
                         is_shared, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(email)
            .bind(&template.name)
            .bind(&template.property_type)
            .bind(&template.description)
            .bind(Json(&data))
            .bind(template.is_shared)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
            id
        }
    };

    find_usable_template(pool, email, &id).await
}

pub async fn delete_template(pool: &SqlitePool, email: &str, id: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM property_templates WHERE id = ? AND user_email = ?")
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn increment_template_usage(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE property_templates SET usage_count = usage_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------- subscriptions

fn subscription_from_row(r: &SqliteRow) -> Result<Subscription, sqlx::Error> {
    Ok(Subscription {
        user_email: r.try_get("user_email")?,
        plan: r.try_get("plan")?,
        max_brands: r.try_get("max_brands")?,
        max_templates: r.try_get("max_templates")?,
        ai_learning_enabled: r.try_get::<i64, _>("ai_learning_enabled")? != 0,
        batch_processing: r.try_get::<i64, _>("batch_processing")? != 0,
        analytics_access: r.try_get::<i64, _>("analytics_access")? != 0,
    })
}

/// Returns the caller's plan, creating the `basic` row on first access.
pub async fn get_or_create_subscription(pool: &SqlitePool, email: &str) -> Result<Subscription, sqlx::Error> {
    let limits = Plan::Basic.limits();
    sqlx::query(
        r#"INSERT OR IGNORE INTO user_subscriptions
                (user_email, plan, max_brands, max_templates, ai_learning_enabled,
                 batch_processing, analytics_access, created_at)
           VALUES (?, 'basic', ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(email)
    .bind(limits.max_brands)
    .bind(limits.max_templates)
    .bind(limits.ai_learning_enabled)
    .bind(limits.batch_processing)
    .bind(limits.analytics_access)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT * FROM user_subscriptions WHERE user_email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    subscription_from_row(&row)
}

pub async fn set_plan(pool: &SqlitePool, email: &str, plan: Plan) -> Result<Subscription, sqlx::Error> {
    let limits = plan.limits();
    let row = sqlx::query(
        r#"INSERT INTO user_subscriptions
                (user_email, plan, max_brands, max_templates, ai_learning_enabled,
                 batch_processing, analytics_access, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT (user_email) DO UPDATE SET
               plan = excluded.plan,
               max_brands = excluded.max_brands,
               max_templates = excluded.max_templates,
               ai_learning_enabled = excluded.ai_learning_enabled,
               batch_processing = excluded.batch_processing,
               analytics_access = excluded.analytics_access
           RETURNING *"#,
    )
    .bind(email)
    .bind(plan.as_str())
    .bind(limits.max_brands)
    .bind(limits.max_templates)
    .bind(limits.ai_learning_enabled)
    .bind(limits.batch_processing)
    .bind(limits.analytics_access)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    subscription_from_row(&row)
}

// ---------------------------------------------------------------- feedback

pub async fn insert_feedback(
    pool: &SqlitePool,
    email: &str,
    job_id: &str,
    rating: i64,
    feedback: Option<&str>,
) -> Result<String, sqlx::Error> {
    let id = format!("feedback_{}", Uuid::new_v4().simple());
    sqlx::query(
        r#"INSERT INTO generation_feedback (id, generation_job_id, user_email, rating, feedback_text, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(job_id)
    .bind(email)
    .bind(rating)
    .bind(feedback)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

/// Most recent generations the user rated 4 or higher.
pub async fn learning_examples(
    pool: &SqlitePool,
    email: &str,
    limit: i64,
) -> Result<Vec<LearningExample>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT gf.rating, gj.input_payload, gj.output_payload
           FROM generation_feedback gf
           JOIN generation_jobs gj ON gf.generation_job_id = gj.id
           WHERE gf.user_email = ? AND gf.rating >= 4
           ORDER BY gf.created_at DESC
           LIMIT ?"#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            let input: Json<Value> = r.try_get("input_payload")?;
            let output: Json<Value> = r.try_get("output_payload")?;
            Ok(LearningExample {
                rating: r.try_get("rating")?,
                input: input.0,
                output: output.0,
            })
        })
        .collect()
}

// ---------------------------------------------------------------- analytics events

pub async fn track_event(
    pool: &SqlitePool,
    email: &str,
    event_type: &str,
    data: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO user_analytics (id, user_email, event_type, event_data, timestamp)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(format!("event_{}", Uuid::new_v4().simple()))
    .bind(email)
    .bind(event_type)
    .bind(Json(&data))
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------- batch jobs

pub async fn create_batch_job(pool: &SqlitePool, email: &str, items: &[Value]) -> Result<String, sqlx::Error> {
    let id = format!("batch_{}", Uuid::new_v4().simple());
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO batch_jobs
                (id, user_email, status, total_properties, completed_properties,
                 input_payload, results, created_at, updated_at)
           VALUES (?, ?, 'pending', ?, 0, ?, '[]', ?, ?)"#,
    )
    .bind(&id)
    .bind(email)
    .bind(items.len() as i64)
    .bind(Json(items))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn update_batch_job(
    pool: &SqlitePool,
    id: &str,
    status: BatchStatus,
    completed: usize,
    results: &[BatchItemResult],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE batch_jobs
           SET status = ?, completed_properties = ?, results = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(status.as_str())
    .bind(completed as i64)
    .bind(Json(results))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

fn batch_from_row(r: &SqliteRow) -> Result<BatchJob, sqlx::Error> {
    let status: String = r.try_get("status")?;
    let results: Json<Vec<BatchItemResult>> = r.try_get("results")?;
    Ok(BatchJob {
        id: r.try_get("id")?,
        user_email: r.try_get("user_email")?,
        status: BatchStatus::parse(&status),
        total: r.try_get("total_properties")?,
        completed: r.try_get("completed_properties")?,
        results: results.0,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub async fn get_batch_job(pool: &SqlitePool, email: &str, id: &str) -> Result<Option<BatchJob>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM batch_jobs WHERE id = ? AND user_email = ?")
        .bind(id)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(batch_from_row).transpose()
}

/// A stored batch together with the property list it was submitted with.
pub struct QueuedBatch {
    pub job: BatchJob,
    pub items: Vec<Value>,
}

pub async fn load_queued_batch(pool: &SqlitePool, id: &str) -> Result<Option<QueuedBatch>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM batch_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let items: Json<Vec<Value>> = row.try_get("input_payload")?;
    Ok(Some(QueuedBatch {
        job: batch_from_row(&row)?,
        items: items.0,
    }))
}

pub async fn list_batch_jobs(pool: &SqlitePool, email: &str, limit: i64) -> Result<Vec<BatchJob>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT * FROM batch_jobs
           WHERE user_email = ?
           ORDER BY created_at DESC
           LIMIT ?"#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(batch_from_row).collect()
}

pub async fn unfinished_batch_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id FROM batch_jobs
           WHERE status IN ('pending', 'processing')
           ORDER BY created_at ASC"#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(|r| r.try_get("id")).collect()
}

/// `days` before now, saturating at the Unix epoch.
pub fn since(days: i64) -> DateTime<Utc> {
    chrono::TimeDelta::try_days(days)
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
