//! Chat-style notifications for review status changes.
//!
//! Delivery is fire-and-forget: a single POST, failures only logged.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{ReviewStatus, SubjectType};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub on_to_review: bool,
    pub on_approved: bool,
    pub on_hold: bool,
    pub on_rejected: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            on_to_review: false,
            on_approved: true,
            on_hold: true,
            on_rejected: true,
        }
    }
}

impl NotificationSettings {
    pub fn should_notify(&self, status: ReviewStatus) -> bool {
        let configured = self
            .webhook_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if !self.enabled || !configured {
            return false;
        }
        match status {
            ReviewStatus::ToReview => self.on_to_review,
            ReviewStatus::Approved => self.on_approved,
            ReviewStatus::Hold => self.on_hold,
            ReviewStatus::Rejected => self.on_rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub subject_type: SubjectType,
    pub title: String,
    pub actor: String,
    pub from: ReviewStatus,
    pub to: ReviewStatus,
    pub notes: Option<String>,
}

impl StatusChange {
    pub fn message(&self) -> String {
        let noun = match self.subject_type {
            SubjectType::Asset => "asset",
            SubjectType::Text => "text",
        };
        let mut message = format!(
            "{} moved {} \"{}\" from {} to {}",
            self.actor, noun, self.title, self.from, self.to
        );
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            message.push_str(&format!("\nNotes: {}", notes.trim()));
        }
        message
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("no webhook configured")]
    NotConfigured,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let url = self.url.as_deref().ok_or(NotifyError::NotConfigured)?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "message": message }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Notifier for sessions without a configured webhook.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> NotificationSettings {
        NotificationSettings {
            enabled: true,
            webhook_url: Some("https://hooks.example.com/x".into()),
            ..NotificationSettings::default()
        }
    }

    #[test]
    fn requires_flag_webhook_and_toggle() {
        assert!(enabled().should_notify(ReviewStatus::Approved));
        assert!(!enabled().should_notify(ReviewStatus::ToReview));

        let disabled = NotificationSettings {
            enabled: false,
            ..enabled()
        };
        assert!(!disabled.should_notify(ReviewStatus::Approved));

        let no_hook = NotificationSettings {
            webhook_url: Some("  ".into()),
            ..enabled()
        };
        assert!(!no_hook.should_notify(ReviewStatus::Hold));

        let muted = NotificationSettings {
            on_rejected: false,
            ..enabled()
        };
        assert!(!muted.should_notify(ReviewStatus::Rejected));
    }

    #[test]
    fn message_includes_transition_and_notes() {
        let change = StatusChange {
            subject_type: SubjectType::Asset,
            title: "Poster".into(),
            actor: "Jane Doe".into(),
            from: ReviewStatus::ToReview,
            to: ReviewStatus::Hold,
            notes: Some(" fix timing ".into()),
        };
        assert_eq!(
            change.message(),
            "Jane Doe moved asset \"Poster\" from To Review to Hold\nNotes: fix timing"
        );
    }

    #[tokio::test]
    async fn unconfigured_webhook_errors() {
        let notifier = WebhookNotifier::new(None).unwrap();
        assert!(matches!(
            notifier.send("hi").await,
            Err(NotifyError::NotConfigured)
        ));
    }
}
