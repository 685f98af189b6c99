use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::models::Role;
use crate::notify::NotificationSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub presign_url: Option<String>,
    pub demo_mode: bool,
    pub demo_role: Role,
    pub user_email: Option<String>,
    pub user_password: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub reviewer_emails: Vec<String>,
    pub notifications: NotificationSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let api_base_url = env::var("REVIEWDESK_API_URL")
            .unwrap_or_else(|_| format!("http://{server_host}:{server_port}"));
        Url::parse(&api_base_url).context("REVIEWDESK_API_URL must be a valid URL")?;
        let request_timeout_secs = env::var("REVIEWDESK_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .context("REVIEWDESK_REQUEST_TIMEOUT_SECS must be an integer")?;
        let cache_dir = env::var("REVIEWDESK_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".reviewdesk"));
        let presign_url = env::var("REVIEWDESK_PRESIGN_URL").ok();
        let demo_mode = env_flag("REVIEWDESK_DEMO", false);
        let demo_role = match env::var("REVIEWDESK_DEMO_ROLE") {
            Ok(value) if value.eq_ignore_ascii_case("creator") => Role::Creator,
            Ok(value) if value.eq_ignore_ascii_case("reviewer") => Role::Reviewer,
            Ok(value) => anyhow::bail!("REVIEWDESK_DEMO_ROLE must be creator or reviewer, got {value}"),
            Err(_) => Role::Reviewer,
        };
        let user_email = env::var("REVIEWDESK_EMAIL").ok();
        let user_password = env::var("REVIEWDESK_PASSWORD").ok();
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let jwt_secret = env::var("JWT_SECRET").ok();
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "reviewdesk".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "reviewdesk-clients".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let reviewer_emails = env::var("REVIEWER_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let notifications = NotificationSettings {
            enabled: env_flag("NOTIFY_ENABLED", false),
            webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            on_to_review: env_flag("NOTIFY_ON_TO_REVIEW", false),
            on_approved: env_flag("NOTIFY_ON_APPROVED", true),
            on_hold: env_flag("NOTIFY_ON_HOLD", true),
            on_rejected: env_flag("NOTIFY_ON_REJECTED", true),
        };

        Ok(Self {
            api_base_url,
            request_timeout_secs,
            cache_dir,
            presign_url,
            demo_mode,
            demo_role,
            user_email,
            user_password,
            server_host,
            server_port,
            cors_allowed_origin,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            reviewer_emails,
            notifications,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn redacted_webhook_url(&self) -> Option<String> {
        self.notifications
            .webhook_url
            .as_deref()
            .map(redact_webhook_url)
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Chat webhook URLs carry their credentials in the path and query.
fn redact_webhook_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.path() != "/" {
                parsed.set_path("/*****");
            }
            if parsed.query().is_some() {
                parsed.set_query(Some("*****"));
            }
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
