use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::resume::ResumeSource;

/// Name of the default plan. Every other plan is unlimited.
pub const FREE_MEMBERSHIP: &str = "free";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub firebase_id: String,
    pub email: String,
    pub credits: i32,
    pub membership: String,
    pub subscription_status: String,
    pub subscription_id: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub resume_text: Option<String>,
    pub resume_key: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_model_file_id: Option<String>,
    pub rendered_key: Option<String>,
    pub rendered_filename: Option<String>,
    pub rendered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn is_free_tier(&self) -> bool {
        self.membership == FREE_MEMBERSHIP
    }

    /// Free-tier users spend one credit per run; paid plans are unlimited.
    pub fn has_run_allowance(&self) -> bool {
        !self.is_free_tier() || self.credits > 0
    }

    /// The currently active resume representation, if any.
    /// A file key takes precedence should both columns ever be populated.
    pub fn resume_source(&self) -> Option<ResumeSource> {
        if let Some(key) = &self.resume_key {
            return Some(ResumeSource::File {
                key: key.clone(),
                filename: self
                    .resume_filename
                    .clone()
                    .unwrap_or_else(|| "resume.pdf".to_string()),
                model_file_id: self.resume_model_file_id.clone(),
            });
        }
        self.resume_text
            .as_ref()
            .map(|text| ResumeSource::Text(text.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipRow {
    pub name: String,
    pub cost_cents: i64,
    pub credits: i32,
    pub stripe_price_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
pub(crate) fn test_user(membership: &str, credits: i32) -> UserRow {
    UserRow {
        id: Uuid::new_v4(),
        firebase_id: "firebase-uid".to_string(),
        email: "ada@example.com".to_string(),
        credits,
        membership: membership.to_string(),
        subscription_status: SubscriptionStatus::Inactive.as_str().to_string(),
        subscription_id: None,
        subscription_end: None,
        resume_text: None,
        resume_key: None,
        resume_filename: None,
        resume_model_file_id: None,
        rendered_key: None,
        rendered_filename: None,
        rendered_at: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_user_without_credits_has_no_allowance() {
        assert!(!test_user(FREE_MEMBERSHIP, 0).has_run_allowance());
    }

    #[test]
    fn test_free_user_with_credits_has_allowance() {
        assert!(test_user(FREE_MEMBERSHIP, 1).has_run_allowance());
    }

    #[test]
    fn test_paid_plan_ignores_credit_balance() {
        assert!(test_user("pro", 0).has_run_allowance());
        assert!(test_user("pro", -4).has_run_allowance());
    }

    #[test]
    fn test_resume_source_prefers_file() {
        let mut user = test_user(FREE_MEMBERSHIP, 1);
        user.resume_key = Some("resumes/u/a.pdf".to_string());
        user.resume_filename = Some("a.pdf".to_string());
        user.resume_text = Some("stale".to_string());
        assert!(matches!(
            user.resume_source(),
            Some(ResumeSource::File { ref filename, .. }) if filename == "a.pdf"
        ));
    }

    #[test]
    fn test_resume_source_none_when_nothing_uploaded() {
        assert!(test_user(FREE_MEMBERSHIP, 1).resume_source().is_none());
    }

    #[test]
    fn test_subscription_status_strings_match_schema() {
        assert_eq!(SubscriptionStatus::Active.as_str(), "active");
        assert_eq!(SubscriptionStatus::Inactive.as_str(), "inactive");
        assert_eq!(SubscriptionStatus::Cancelled.as_str(), "cancelled");
    }
}
