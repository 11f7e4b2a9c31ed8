// src/billing.rs

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Current balance, `None` for guests and unknown accounts.
pub async fn get_balance(pool: &SqlitePool, email: Option<&str>) -> Result<Option<i64>, sqlx::Error> {
    let Some(email) = email else {
        return Ok(None);
    };

    let row = sqlx::query("SELECT credits FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.map(|r| r.try_get::<i64, _>("credits")).transpose()
}

/// Takes one credit in a single conditional update. Guests are not tracked and
/// always succeed; a zero balance leaves the row untouched and returns `false`.
pub async fn debit(pool: &SqlitePool, email: Option<&str>) -> Result<bool, sqlx::Error> {
    let Some(email) = email else {
        return Ok(true);
    };

    let res = sqlx::query("UPDATE users SET credits = credits - 1 WHERE email = ? AND credits > 0")
        .bind(email)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}

/// Adds `amount` credits. Unknown users and a zero amount are no-ops.
pub async fn credit(pool: &SqlitePool, email: &str, amount: u32) -> Result<(), sqlx::Error> {
    if amount == 0 {
        return Ok(());
    }

    let res = sqlx::query("UPDATE users SET credits = credits + ? WHERE email = ?")
        .bind(i64::from(amount))
        .bind(email)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        log::warn!("credit skipped, unknown user={email} amount={amount}");
    }
    Ok(())
}

/// A checkout confirmed by the payment provider, ready to be booked.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment<'a> {
    pub email: &'a str,
    pub credits: u32,
    pub checkout_id: &'a str,
    pub price_id: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Credited,
    AlreadyRecorded,
    UnknownUser,
}

/// Books a confirmed checkout exactly once. The billing row and the balance
/// increment share one transaction keyed by the unique checkout id, so webhook
/// redelivery and manual verification of the same session credit only once.
pub async fn record_payment(
    pool: &SqlitePool,
    payment: &ConfirmedPayment<'_>,
) -> Result<PaymentOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"INSERT INTO billing_events
                (id, user_email, credits_added, stripe_checkout_id, stripe_price_id, created_at)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (stripe_checkout_id) DO NOTHING"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payment.email)
    .bind(i64::from(payment.credits))
    .bind(payment.checkout_id)
    .bind(payment.price_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        log::info!("checkout already recorded checkout_id={}", payment.checkout_id);
        return Ok(PaymentOutcome::AlreadyRecorded);
    }

    let updated = sqlx::query("UPDATE users SET credits = credits + ? WHERE email = ?")
        .bind(i64::from(payment.credits))
        .bind(payment.email)
        .execute(&mut *tx)
        .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        log::warn!(
            "checkout for unknown user={} checkout_id={}",
            payment.email,
            payment.checkout_id
        );
        return Ok(PaymentOutcome::UnknownUser);
    }

    tx.commit().await?;
    log::info!(
        "credits added user={} credits={} checkout_id={}",
        payment.email,
        payment.credits,
        payment.checkout_id
    );
    Ok(PaymentOutcome::Credited)
}
