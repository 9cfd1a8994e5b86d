//! User and membership persistence. Every function takes the pool explicitly.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeColumns, ResumeSource};
use crate::models::user::{MembershipRow, SubscriptionStatus, UserRow, FREE_MEMBERSHIP};

const UNIQUE_VIOLATION: &str = "23505";

pub async fn find_user(pool: &PgPool, firebase_id: &str) -> Result<Option<UserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE firebase_id = $1")
            .bind(firebase_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn require_user(pool: &PgPool, firebase_id: &str) -> Result<UserRow, AppError> {
    find_user(pool, firebase_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Inserts a new free-tier user. Duplicate email or firebase id → 409.
pub async fn create_user(pool: &PgPool, firebase_id: &str, email: &str) -> Result<UserRow, AppError> {
    let result = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, firebase_id, email) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(firebase_id)
    .bind(email)
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Err(AppError::Conflict("User already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Stores `source` as the user's only resume representation.
pub async fn set_resume_source(
    pool: &PgPool,
    user_id: Uuid,
    source: &ResumeSource,
) -> Result<(), AppError> {
    let columns = ResumeColumns::from(source);
    sqlx::query(
        r#"
        UPDATE users
        SET resume_text = $1, resume_key = $2, resume_filename = $3, resume_model_file_id = $4
        WHERE id = $5
        "#,
    )
    .bind(columns.resume_text)
    .bind(columns.resume_key)
    .bind(columns.resume_filename)
    .bind(columns.resume_model_file_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a model file handle against the user's current file resume.
/// No-op if the resume was replaced in the meantime.
pub async fn set_model_file(
    pool: &PgPool,
    user_id: Uuid,
    resume_key: &str,
    file_id: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET resume_model_file_id = $1 WHERE id = $2 AND resume_key = $3")
        .bind(file_id)
        .bind(user_id)
        .bind(resume_key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Forgets a released model file handle, only if it is still the recorded one.
pub async fn clear_model_file(pool: &PgPool, user_id: Uuid, file_id: &str) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE users SET resume_model_file_id = NULL WHERE id = $1 AND resume_model_file_id = $2",
    )
    .bind(user_id)
    .bind(file_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Points the user at a newly rendered document. The previous object is left in storage.
pub async fn set_rendered(
    pool: &PgPool,
    user_id: Uuid,
    key: &str,
    filename: &str,
) -> Result<DateTime<Utc>, AppError> {
    Ok(sqlx::query_scalar(
        r#"
        UPDATE users SET rendered_key = $1, rendered_filename = $2, rendered_at = NOW()
        WHERE id = $3
        RETURNING rendered_at
        "#,
    )
    .bind(key)
    .bind(filename)
    .bind(user_id)
    .fetch_one(pool)
    .await?)
}

/// Spends one credit, never going below zero. Returns the remaining balance.
pub async fn consume_credit(pool: &PgPool, user_id: Uuid) -> Result<i32, AppError> {
    Ok(sqlx::query_scalar(
        "UPDATE users SET credits = GREATEST(credits - 1, 0) WHERE id = $1 RETURNING credits",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?)
}

pub async fn find_membership(pool: &PgPool, name: &str) -> Result<Option<MembershipRow>, AppError> {
    Ok(
        sqlx::query_as::<_, MembershipRow>("SELECT * FROM memberships WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditGrant {
    Granted,
    /// The event was applied by an earlier delivery.
    AlreadyProcessed,
    UnknownUser,
}

/// Adds purchased credits once per payment event.
///
/// The event id is recorded in the same transaction as the update, so a
/// redelivered event changes nothing. Nothing is recorded for an unknown
/// user, leaving a later delivery free to apply the grant.
pub async fn grant_credits_once(
    pool: &PgPool,
    event_id: &str,
    firebase_id: &str,
    credits: i32,
) -> Result<CreditGrant, AppError> {
    let mut tx = pool.begin().await?;

    let recorded = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .execute(&mut *tx)
    .await?;
    if recorded.rows_affected() == 0 {
        return Ok(CreditGrant::AlreadyProcessed);
    }

    let updated = sqlx::query("UPDATE users SET credits = credits + $1 WHERE firebase_id = $2")
        .bind(credits)
        .bind(firebase_id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(CreditGrant::UnknownUser);
    }

    tx.commit().await?;
    Ok(CreditGrant::Granted)
}

pub async fn activate_subscription(
    pool: &PgPool,
    firebase_id: &str,
    membership: &str,
    subscription_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET membership = $1, subscription_status = $2, subscription_id = $3, subscription_end = NULL
        WHERE firebase_id = $4
        "#,
    )
    .bind(membership)
    .bind(SubscriptionStatus::Active.as_str())
    .bind(subscription_id)
    .bind(firebase_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_cancelled(
    pool: &PgPool,
    user_id: Uuid,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET subscription_status = $1, subscription_end = $2 WHERE id = $3")
        .bind(SubscriptionStatus::Cancelled.as_str())
        .bind(ends_at)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drops the subscriber back to the free plan. Returns false when no user holds the subscription.
pub async fn end_subscription(pool: &PgPool, subscription_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET membership = $1, subscription_status = $2, subscription_id = NULL
        WHERE subscription_id = $3
        "#,
    )
    .bind(FREE_MEMBERSHIP)
    .bind(SubscriptionStatus::Inactive.as_str())
    .bind(subscription_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
