// src/analytics.rs
//
// Read-only reports over generation, feedback, template and billing tables.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::db::since;

#[derive(Debug, Serialize)]
pub struct GenerationHistoryEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub tokens_prompt: i64,
    pub tokens_completion: i64,
    pub model: String,
    pub property_type: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackStats {
    pub avg_rating: Option<f64>,
    pub total_feedback: i64,
    pub positive_feedback: i64,
}

#[derive(Debug, Serialize)]
pub struct TemplateUsage {
    pub name: String,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyUsage {
    pub month: String,
    pub generations: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub generation_history: Vec<GenerationHistoryEntry>,
    pub feedback_stats: FeedbackStats,
    pub template_usage: Vec<TemplateUsage>,
    pub monthly_usage: Vec<MonthlyUsage>,
}

pub async fn user_analytics(pool: &SqlitePool, email: &str, limit: i64) -> Result<UserAnalytics, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, created_at, tokens_prompt, tokens_completion, model,
                  json_extract(input_payload, '$.property.type') AS property_type,
                  json_extract(input_payload, '$.property.address') AS address
           FROM generation_jobs
           WHERE user_email = ?
           ORDER BY created_at DESC
           LIMIT ?"#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let generation_history = rows
        .iter()
        .map(|r| {
            Ok(GenerationHistoryEntry {
                id: r.try_get("id")?,
                created_at: r.try_get("created_at")?,
                tokens_prompt: r.try_get("tokens_prompt")?,
                tokens_completion: r.try_get("tokens_completion")?,
                model: r.try_get("model")?,
                property_type: r.try_get("property_type")?,
                address: r.try_get("address")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let row = sqlx::query(
        r#"SELECT AVG(rating) AS avg_rating,
                  COUNT(*) AS total_feedback,
                  COUNT(CASE WHEN rating >= 4 THEN 1 END) AS positive_feedback
           FROM generation_feedback
           WHERE user_email = ?"#,
    )
    .bind(email)
    .fetch_one(pool)
    .await?;
    let feedback_stats = FeedbackStats {
        avg_rating: row.try_get("avg_rating")?,
        total_feedback: row.try_get("total_feedback")?,
        positive_feedback: row.try_get("positive_feedback")?,
    };

    let rows = sqlx::query(
        r#"SELECT name, usage_count, created_at
           FROM property_templates
           WHERE user_email = ?
           ORDER BY usage_count DESC"#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;
    let template_usage = rows
        .iter()
        .map(|r| {
            Ok(TemplateUsage {
                name: r.try_get("name")?,
                usage_count: r.try_get("usage_count")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let rows = sqlx::query(
        r#"SELECT strftime('%Y-%m', created_at) AS month,
                  COUNT(*) AS generations,
                  COALESCE(SUM(tokens_prompt + tokens_completion), 0) AS total_tokens
           FROM generation_jobs
           WHERE user_email = ?
           GROUP BY month
           ORDER BY month DESC
           LIMIT 12"#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;
    let monthly_usage = rows
        .iter()
        .map(|r| {
            Ok(MonthlyUsage {
                month: r.try_get::<Option<String>, _>("month")?.unwrap_or_default(),
                generations: r.try_get("generations")?,
                total_tokens: r.try_get("total_tokens")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(UserAnalytics {
        generation_history,
        feedback_stats,
        template_usage,
        monthly_usage,
    })
}

#[derive(Debug, Serialize)]
pub struct UserMetrics {
    pub total_users: i64,
    pub active_users_7d: i64,
    pub active_users_30d: i64,
    pub avg_credits: Option<f64>,
    pub total_credits: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerationMetrics {
    pub total_generations: i64,
    pub unique_users: i64,
    pub avg_prompt_tokens: Option<f64>,
    pub avg_completion_tokens: Option<f64>,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct RevenueMetrics {
    pub total_purchases: i64,
    pub credits_sold: i64,
    pub unique_buyers: i64,
}

#[derive(Debug, Serialize)]
pub struct TopUser {
    pub user_email: Option<String>,
    pub generation_count: i64,
    pub total_tokens: i64,
    pub last_generation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DailyActivity {
    pub date: String,
    pub generations: i64,
    pub unique_users: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub timeframe: String,
    pub users: UserMetrics,
    pub generations: GenerationMetrics,
    pub revenue: RevenueMetrics,
    pub top_users: Vec<TopUser>,
    pub property_types: Vec<LabelCount>,
    pub daily_activity: Vec<DailyActivity>,
    pub subscriptions: Vec<LabelCount>,
}

const DEFAULT_TIMEFRAME_DAYS: i64 = 30;
const MAX_TIMEFRAME_DAYS: i64 = 3650;

/// "7d" -> 7. Anything unparseable or outside 1..=3650 falls back to 30 days.
pub fn timeframe_days(raw: Option<&str>) -> i64 {
    raw.map(|s| s.trim().trim_end_matches('d'))
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|d| (1..=MAX_TIMEFRAME_DAYS).contains(d))
        .unwrap_or(DEFAULT_TIMEFRAME_DAYS)
}

pub async fn admin_analytics(pool: &SqlitePool, days: i64) -> Result<AdminAnalytics, sqlx::Error> {
    let start = since(days);

    let row = sqlx::query(
        r#"SELECT COUNT(*) AS total_users,
                  COUNT(CASE WHEN last_login_at > ? THEN 1 END) AS active_users_7d,
                  COUNT(CASE WHEN last_login_at > ? THEN 1 END) AS active_users_30d,
                  AVG(credits) AS avg_credits,
                  COALESCE(SUM(credits), 0) AS total_credits
           FROM users"#,
    )
    .bind(since(7))
    .bind(since(30))
    .fetch_one(pool)
    .await?;
    let users = UserMetrics {
        total_users: row.try_get("total_users")?,
        active_users_7d: row.try_get("active_users_7d")?,
        active_users_30d: row.try_get("active_users_30d")?,
        avg_credits: row.try_get("avg_credits")?,
        total_credits: row.try_get("total_credits")?,
    };

    let row = sqlx::query(
        r#"SELECT COUNT(*) AS total_generations,
                  COUNT(DISTINCT user_email) AS unique_users,
                  AVG(tokens_prompt) AS avg_prompt_tokens,
                  AVG(tokens_completion) AS avg_completion_tokens,
                  COALESCE(SUM(tokens_prompt + tokens_completion), 0) AS total_tokens
           FROM generation_jobs
           WHERE created_at > ?"#,
    )
    .bind(start)
    .fetch_one(pool)
    .await?;
    let generations = GenerationMetrics {
        total_generations: row.try_get("total_generations")?,
        unique_users: row.try_get("unique_users")?,
        avg_prompt_tokens: row.try_get("avg_prompt_tokens")?,
        avg_completion_tokens: row.try_get("avg_completion_tokens")?,
        total_tokens: row.try_get("total_tokens")?,
    };

    let row = sqlx::query(
        r#"SELECT COUNT(*) AS total_purchases,
                  COALESCE(SUM(credits_added), 0) AS credits_sold,
                  COUNT(DISTINCT user_email) AS unique_buyers
           FROM billing_events
           WHERE created_at > ?"#,
    )
    .bind(start)
    .fetch_one(pool)
    .await?;
    let revenue = RevenueMetrics {
        total_purchases: row.try_get("total_purchases")?,
        credits_sold: row.try_get("credits_sold")?,
        unique_buyers: row.try_get("unique_buyers")?,
    };

    let rows = sqlx::query(
        r#"SELECT user_email,
                  COUNT(*) AS generation_count,
                  COALESCE(SUM(tokens_prompt + tokens_completion), 0) AS total_tokens,
                  MAX(created_at) AS last_generation
           FROM generation_jobs
           WHERE created_at > ?
           GROUP BY user_email
           ORDER BY generation_count DESC
           LIMIT 10"#,
    )
    .bind(start)
    .fetch_all(pool)
    .await?;
    let top_users = rows
        .iter()
        .map(|r| {
            Ok(TopUser {
                user_email: r.try_get("user_email")?,
                generation_count: r.try_get("generation_count")?,
                total_tokens: r.try_get("total_tokens")?,
                last_generation: r.try_get("last_generation")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let rows = sqlx::query(
        r#"SELECT json_extract(input_payload, '$.property.type') AS label,
                  COUNT(*) AS count
           FROM generation_jobs
           WHERE created_at > ? AND json_extract(input_payload, '$.property.type') IS NOT NULL
           GROUP BY label
           ORDER BY count DESC"#,
    )
    .bind(start)
    .fetch_all(pool)
    .await?;
    let property_types = label_counts(&rows)?;

    let rows = sqlx::query(
        r#"SELECT date(created_at) AS date,
                  COUNT(*) AS generations,
                  COUNT(DISTINCT user_email) AS unique_users
           FROM generation_jobs
           WHERE created_at > ?
           GROUP BY date
           ORDER BY date DESC
           LIMIT 30"#,
    )
    .bind(start)
    .fetch_all(pool)
    .await?;
    let daily_activity = rows
        .iter()
        .map(|r| {
            Ok(DailyActivity {
                date: r.try_get::<Option<String>, _>("date")?.unwrap_or_default(),
                generations: r.try_get("generations")?,
                unique_users: r.try_get("unique_users")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let rows = sqlx::query(
        r#"SELECT plan AS label, COUNT(*) AS count
           FROM user_subscriptions
           GROUP BY plan"#,
    )
    .fetch_all(pool)
    .await?;
    let subscriptions = label_counts(&rows)?;

    Ok(AdminAnalytics {
        timeframe: format!("{days} days"),
        users,
        generations,
        revenue,
        top_users,
        property_types,
        daily_activity,
        subscriptions,
    })
}

fn label_counts(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<LabelCount>, sqlx::Error> {
    rows.iter()
        .map(|r| {
            Ok(LabelCount {
                label: r.try_get::<Option<String>, _>("label")?.unwrap_or_default(),
                count: r.try_get("count")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::timeframe_days;

    #[test]
    fn timeframe_parsing() {
        assert_eq!(timeframe_days(Some("7d")), 7);
        assert_eq!(timeframe_days(Some("90")), 90);
        assert_eq!(timeframe_days(Some("week")), 30);
        assert_eq!(timeframe_days(None), 30);
        assert_eq!(timeframe_days(Some("0d")), 30);
        assert_eq!(timeframe_days(Some("3650d")), 3650);
        assert_eq!(timeframe_days(Some("9223372036854775807d")), 30);
    }
}
