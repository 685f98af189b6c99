use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use reviewdesk::{
    auth::jwt::JwtService,
    cache::{FileCacheStore, LocalCache},
    config::AppConfig,
    identity::{IdentityProvider, LocalIdentity},
    models::{Event, ReviewStatus, Role},
    normalize::parse_status,
    notify::{NoopNotifier, Notifier, WebhookNotifier},
    pipeline::{text::ImportOptions, Dashboard, MutationReport, Services},
    remote::HttpRemote,
    stats::{event_progress, status_counts},
    storage::{DisabledStorage, HttpObjectStorage, ObjectStorage},
};

const USAGE: &str = "Usage: reviewdesk <sync | progress | import <file> | review <asset-id> <status> [notes]>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    if !matches!(command, "sync" | "progress" | "import" | "review") {
        eprintln!("Unknown command: {command}\n{USAGE}");
        std::process::exit(1);
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "cli",
        api_base_url = %config.api_base_url,
        cache_dir = %config.cache_dir.display(),
        demo_mode = config.demo_mode,
        object_storage = config.presign_url.is_some(),
        notify_webhook = ?config.redacted_webhook_url(),
        "loaded client configuration"
    );
    let dashboard = build_dashboard(&config).await?;

    let summary = dashboard.load_all().await;
    for error in &summary.sync_errors {
        eprintln!("{error}");
    }

    match command {
        "sync" => print_sync(&dashboard).await,
        "progress" => print_progress(&dashboard).await,
        "import" => {
            let path = args.get(1).ok_or_else(|| anyhow!("{USAGE}"))?;
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read import file {path}"))?;
            let report = dashboard.import_text(&raw, ImportOptions::default()).await?;
            println!("Imported {} text items.", report.value.len());
            print_sync_outcome(&report);
        }
        "review" => {
            let (id, status) = match (args.get(1), args.get(2)) {
                (Some(id), Some(status)) => (id, status),
                _ => return Err(anyhow!("{USAGE}")),
            };
            let status = parse_status(status).ok_or_else(|| anyhow!("unknown status {status}"))?;
            let notes = args.get(3).map(String::as_str);
            let report = dashboard.review_asset(id, status, notes).await?;
            println!("{} is now {}.", report.value.title, report.value.status);
            print_sync_outcome(&report);
        }
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }

    dashboard.drain_notifications().await;
    Ok(())
}

async fn build_dashboard(config: &AppConfig) -> Result<Dashboard> {
    let cache = LocalCache::new(Arc::new(FileCacheStore::new(config.cache_dir.clone())));
    let remote = HttpRemote::new(config.api_base_url.clone(), config.request_timeout())
        .context("failed to build API client")?;

    let identity = if config.demo_mode {
        LocalIdentity::demo(config.demo_role)
    } else {
        match (&config.user_email, &config.user_password, JwtService::from_config(config)) {
            (Some(email), Some(password), Ok(jwt)) => {
                let identity =
                    LocalIdentity::signed_out(jwt, Role::Creator, config.reviewer_emails.clone());
                identity
                    .sign_in_with_password(email, password)
                    .await
                    .context("sign-in failed")?;
                identity
            }
            _ => LocalIdentity::with_session(None, None),
        }
    };

    let storage: Arc<dyn ObjectStorage> = match &config.presign_url {
        Some(url) => Arc::new(HttpObjectStorage::new(url.clone(), config.request_timeout())?),
        None => Arc::new(DisabledStorage),
    };
    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(
            WebhookNotifier::new(config.notifications.webhook_url.clone())
                .context("failed to build notification client")?,
        )
    } else {
        Arc::new(NoopNotifier)
    };

    Ok(Dashboard::new(
        Services {
            cache,
            remote: Arc::new(remote),
            identity: Arc::new(identity),
            storage,
            notifier,
        },
        config.notifications.clone(),
    ))
}

async fn print_sync(dashboard: &Dashboard) {
    let snapshot = dashboard.snapshot().await;
    println!(
        "{} assets, {} events, {} text items, {} groups, {} sections, {} activity entries",
        snapshot.assets.len(),
        snapshot.events.len(),
        snapshot.text_items.len(),
        snapshot.text_groups.len(),
        snapshot.text_sections.len(),
        snapshot.activity.len(),
    );
    match dashboard.role().await {
        Some(role) => println!("Signed in as {}.", role.label()),
        None => println!("Signed out: sign in to load team data."),
    }
}

async fn print_progress(dashboard: &Dashboard) {
    let snapshot = dashboard.snapshot().await;
    print_counts("Assets", snapshot.assets.iter().map(|a| &a.status));
    print_counts("Text", snapshot.text_items.iter().map(|t| &t.status));

    for event in &snapshot.events {
        let progress = event_progress(event, &snapshot.assets);
        print_event(event, progress.approved, progress.total_target, progress.percent());
        for (tone, tone_progress) in &progress.per_tone {
            println!(
                "    {:<13} {}/{}",
                tone.label(),
                tone_progress.approved,
                tone_progress.target
            );
        }
    }
}

fn print_counts<'a>(label: &str, statuses: impl Iterator<Item = &'a ReviewStatus>) {
    let counts = status_counts(statuses);
    let parts: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{status}: {count}"))
        .collect();
    println!("{label}: {}", parts.join(", "));
}

fn print_event(event: &Event, approved: u32, target: u32, percent: u32) {
    println!("{} ({approved}/{target} approved, {percent}%)", event.name);
}

fn print_sync_outcome<T>(report: &MutationReport<T>) {
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if let Some(message) = report.sync.message() {
        eprintln!("{message}");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
