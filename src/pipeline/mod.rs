//! Optimistic mutations: validate, apply locally, log activity, then push to
//! the backend on a best-effort basis.
//!
//! Local state is never rolled back. A failed push is reported on the
//! [`MutationReport`] (and as a dashboard notice); there is no retry.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::error::{MutationError, ValidationError};
use crate::identity::{actor_name, AuthState, IdentityProvider, Session};
use crate::models::{
    generate_id, ActivityAction, ActivityEntry, Asset, Collection, ReviewStatus, Role, SubjectType,
    TextItem,
};
use crate::notify::{NotificationSettings, Notifier, StatusChange};
use crate::remote::RemoteCollections;
use crate::storage::ObjectStorage;
use crate::store::{Snapshot, Store, Stored};
use crate::sync::{self, Source, SyncContext};

pub mod assets;
pub mod events;
pub mod library;
pub mod text;
pub mod upload;

/// What happened to the remote half of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    NotSynced(String),
    /// No token to push with, including the offline demo identity.
    SignInRequired,
}

impl SyncOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            SyncOutcome::Synced => None,
            SyncOutcome::NotSynced(reason) => Some(format!("Saved locally but not synced: {reason}")),
            SyncOutcome::SignInRequired => {
                Some("Sign in to sync your changes with the team.".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationReport<T> {
    pub value: T,
    pub sync: SyncOutcome,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SyncError(String),
    NotSynced(String),
    SignInRequired(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// False when the identity changed while loading and results were dropped.
    pub applied: bool,
    pub sources: BTreeMap<Collection, Source>,
    pub sync_errors: Vec<String>,
}

/// Advisory guard against double submission; not a lock.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn try_acquire(&self, what: &'static str) -> Result<BusyGuard<'_>, MutationError> {
        if self.0.swap(true, Ordering::AcqRel) {
            return Err(MutationError::Busy(what));
        }
        Ok(BusyGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Services {
    pub cache: LocalCache,
    pub remote: Arc<dyn RemoteCollections>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn Notifier>,
}

/// Resolved identity for one mutation.
pub(crate) struct Actor {
    pub name: String,
    pub auth: AuthState,
}

struct Batch {
    collection: Collection,
    records: Vec<Value>,
    revisions: Vec<(String, u64)>,
}

/// Remote half of a mutation, captured while the store is locked.
#[derive(Default)]
pub(crate) struct Push {
    batches: Vec<Batch>,
    deletes: Vec<(Collection, String)>,
}

impl Push {
    pub fn upsert<T: Stored>(&mut self, store: &Store, records: &[T]) {
        if records.is_empty() {
            return;
        }
        let ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        self.batches.push(Batch {
            collection: T::COLLECTION,
            records: sync::to_values(records),
            revisions: store.revisions(T::COLLECTION, &ids),
        });
    }

    pub fn delete(&mut self, collection: Collection, id: impl Into<String>) {
        self.deletes.push((collection, id.into()));
    }
}

pub struct Dashboard {
    store: Mutex<Store>,
    cache: LocalCache,
    remote: Arc<dyn RemoteCollections>,
    identity: Arc<dyn IdentityProvider>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn Notifier>,
    settings: NotificationSettings,
    role: RwLock<Option<Role>>,
    generation: AtomicU64,
    notices: Mutex<Vec<Notice>>,
    notifications: Mutex<Vec<JoinHandle<()>>>,
    upload_busy: BusyFlag,
    text_busy: BusyFlag,
}

impl Dashboard {
    pub fn new(services: Services, settings: NotificationSettings) -> Self {
        Self {
            store: Mutex::new(Store::new()),
            cache: services.cache,
            remote: services.remote,
            identity: services.identity,
            storage: services.storage,
            notifier: services.notifier,
            settings,
            role: RwLock::new(None),
            generation: AtomicU64::new(0),
            notices: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            upload_busy: BusyFlag::default(),
            text_busy: BusyFlag::default(),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.store.lock().await.snapshot().clone()
    }

    /// Runs `f` against the store under its lock.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        let store = self.store.lock().await;
        f(&store)
    }

    pub async fn role(&self) -> Option<Role> {
        *self.role.read().await
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().await)
    }

    /// Notification tasks not yet reaped.
    pub async fn pending_notifications(&self) -> usize {
        self.notifications.lock().await.len()
    }

    pub fn upload_in_progress(&self) -> bool {
        self.upload_busy.is_busy()
    }

    /// Invalidates in-flight loads; their results are discarded on arrival.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Decides the source of every collection and replaces in-memory state.
    pub async fn load_all(&self) -> LoadSummary {
        let generation = self.generation.load(Ordering::Acquire);
        let session = self.identity.current_session().await;
        let auth = AuthState::from_session(session);
        let token = self.token_for(&auth).await;

        let ctx = SyncContext {
            auth: &auth,
            token: token.as_deref(),
            cache: &self.cache,
            remote: self.remote.as_ref(),
        };

        let (assets, events, activity, library, role) = tokio::join!(
            sync::load(&sync::ASSETS, &ctx),
            sync::load(&sync::EVENTS, &ctx),
            sync::load(&sync::ACTIVITY, &ctx),
            sync::load_text_library(&ctx),
            self.resolve_role(&auth, token.as_deref()),
        );

        if self.generation.load(Ordering::Acquire) != generation {
            debug!("identity changed during load; discarding results");
            return LoadSummary {
                applied: false,
                sources: BTreeMap::new(),
                sync_errors: Vec::new(),
            };
        }

        let mut sync_errors: Vec<String> = [
            assets.sync_error.as_deref(),
            events.sync_error.as_deref(),
            activity.sync_error.as_deref(),
            library.sync_error(),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
        sync_errors.dedup();

        let sources = BTreeMap::from([
            (Collection::Assets, assets.source),
            (Collection::Events, events.source),
            (Collection::Activity, activity.source),
            (Collection::TextGroups, library.groups.source),
            (Collection::TextSections, library.sections.source),
            (Collection::TextItems, library.items.source),
        ]);

        {
            let mut store = self.store.lock().await;
            store.replace(assets.records);
            store.replace(events.records);
            store.replace(activity.records);
            store.replace(library.groups.records);
            store.replace(library.sections.records);
            store.replace(library.items.records);
            store.persist_dirty(&self.cache);
        }
        *self.role.write().await = role;

        if !sync_errors.is_empty() {
            let mut notices = self.notices.lock().await;
            notices.extend(sync_errors.iter().cloned().map(Notice::SyncError));
        }

        info!(?sources, errors = sync_errors.len(), "collections loaded");
        LoadSummary {
            applied: true,
            sources,
            sync_errors,
        }
    }

    /// Reloads on every identity change until the provider goes away.
    pub async fn follow_identity(self: Arc<Self>) {
        let mut changes = self.identity.subscribe();
        while changes.changed().await.is_ok() {
            self.invalidate();
            self.load_all().await;
        }
    }

    async fn resolve_role(&self, auth: &AuthState, token: Option<&str>) -> Option<Role> {
        match (auth, token) {
            (AuthState::SignedOut, _) => None,
            (AuthState::Authenticated(session), Some(token)) => Some(
                self.remote
                    .fetch_role(token)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(session.role),
            ),
            (AuthState::Authenticated(session), None) | (AuthState::LocalDemo(session), _) => {
                Some(session.role)
            }
        }
    }

    async fn token_for(&self, auth: &AuthState) -> Option<String> {
        match auth {
            AuthState::Authenticated(session) => self.identity.token(session).await,
            _ => None,
        }
    }

    pub(crate) async fn actor(&self) -> Actor {
        let session: Option<Session> = self.identity.current_session().await;
        let role = self
            .role()
            .await
            .or(session.as_ref().map(|s| s.role))
            .unwrap_or(Role::Creator);
        Actor {
            name: actor_name(session.as_ref(), role),
            auth: AuthState::from_session(session),
        }
    }

    /// Remote half of a mutation. Local state already reflects the change.
    pub(crate) async fn push(&self, actor: &Actor, push: Push) -> SyncOutcome {
        if push.batches.is_empty() && push.deletes.is_empty() {
            return SyncOutcome::Synced;
        }

        let outcome = match &actor.auth {
            AuthState::LocalDemo(_) | AuthState::SignedOut => SyncOutcome::SignInRequired,
            AuthState::Authenticated(session) => match self.identity.token(session).await {
                None => SyncOutcome::SignInRequired,
                Some(token) => self.push_with_token(&token, push).await,
            },
        };

        match &outcome {
            SyncOutcome::NotSynced(_) => {
                if let Some(message) = outcome.message() {
                    self.notices.lock().await.push(Notice::NotSynced(message));
                }
            }
            SyncOutcome::SignInRequired => {
                if let Some(message) = outcome.message() {
                    self.notices.lock().await.push(Notice::SignInRequired(message));
                }
            }
            SyncOutcome::Synced => {}
        }
        outcome
    }

    async fn push_with_token(&self, token: &str, push: Push) -> SyncOutcome {
        let mut failed: Vec<String> = Vec::new();

        for batch in push.batches {
            if self.remote.save(batch.collection, batch.records, token).await {
                self.store
                    .lock()
                    .await
                    .mark_synced(batch.collection, &batch.revisions);
            } else {
                failed.push(batch.collection.to_string());
            }
        }

        for (collection, id) in push.deletes {
            if !self.remote.delete_one(collection, &id, token).await {
                failed.push(format!("{collection} delete"));
            }
        }

        if failed.is_empty() {
            SyncOutcome::Synced
        } else {
            failed.dedup();
            warn!(failed = ?failed, "mutation saved locally but not synced");
            SyncOutcome::NotSynced(failed.join(", "))
        }
    }

    /// Fire-and-forget delivery; failures are only logged.
    pub(crate) async fn notify(&self, change: StatusChange) {
        if !self.settings.should_notify(change.to) {
            return;
        }
        let notifier = self.notifier.clone();
        let message = change.message();
        let handle = tokio::spawn(async move {
            if let Err(err) = notifier.send(&message).await {
                warn!(error = %err, "status notification failed");
            }
        });
        let mut handles = self.notifications.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Waits for spawned notifications, e.g. before shutdown.
    pub async fn drain_notifications(&self) {
        let handles = std::mem::take(&mut *self.notifications.lock().await);
        for result in join_all(handles).await {
            if let Err(err) = result {
                warn!(error = %err, "notification task panicked");
            }
        }
    }

    /// Free-text comment on an asset or text item.
    pub async fn comment(
        &self,
        subject_type: SubjectType,
        subject_id: &str,
        text: &str,
    ) -> Result<MutationReport<ActivityEntry>, MutationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let actor = self.actor().await;

        let (entry, push) = {
            let mut store = self.store.lock().await;
            let exists = match subject_type {
                SubjectType::Asset => store.get::<Asset>(subject_id).is_some(),
                SubjectType::Text => store.get::<TextItem>(subject_id).is_some(),
            };
            if !exists {
                return Err(MutationError::not_found(subject_type.as_str(), subject_id));
            }

            let entry = activity_entry(
                subject_type,
                subject_id,
                ActivityAction::Comment,
                &actor.name,
                Utc::now(),
                None,
                None,
                text,
            );
            store.prepend_activity(vec![entry.clone()]);
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, std::slice::from_ref(&entry));
            (entry, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: entry,
            sync,
            warnings: Vec::new(),
        })
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn activity_entry(
    subject_type: SubjectType,
    subject_id: &str,
    action: ActivityAction,
    actor: &str,
    timestamp: DateTime<Utc>,
    from_status: Option<ReviewStatus>,
    to_status: Option<ReviewStatus>,
    comment: &str,
) -> ActivityEntry {
    ActivityEntry {
        id: generate_id(),
        subject_type,
        subject_id: subject_id.to_string(),
        action,
        actor: actor.to_string(),
        timestamp,
        from_status,
        to_status,
        comment: comment.to_string(),
    }
}

/// STATUS_CHANGED when the status moved (notes ride along as the comment),
/// COMMENT when only notes were added, nothing otherwise.
pub(crate) fn review_entries(
    subject_type: SubjectType,
    subject_id: &str,
    from: ReviewStatus,
    to: ReviewStatus,
    notes: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> Vec<ActivityEntry> {
    if from != to {
        return vec![activity_entry(
            subject_type,
            subject_id,
            ActivityAction::StatusChanged,
            actor,
            now,
            Some(from),
            Some(to),
            notes.unwrap_or_default(),
        )];
    }
    match notes {
        Some(notes) => vec![activity_entry(
            subject_type,
            subject_id,
            ActivityAction::Comment,
            actor,
            now,
            None,
            None,
            notes,
        )],
        None => Vec::new(),
    }
}

pub(crate) fn created_entry(
    subject_type: SubjectType,
    subject_id: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> ActivityEntry {
    activity_entry(
        subject_type,
        subject_id,
        ActivityAction::Created,
        actor,
        now,
        None,
        Some(ReviewStatus::ToReview),
        "",
    )
}

/// Ids in first-seen order with repeats dropped.
pub(crate) fn unique_ids(ids: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(move |id| seen.insert(*id))
}

/// Trimmed notes, or `None` when blank.
pub(crate) fn clean_notes(notes: Option<&str>) -> Option<&str> {
    notes.map(str::trim).filter(|n| !n.is_empty())
}

/// Notes are mandatory for HOLD/REJECTED unless the record already has some.
pub(crate) fn require_notes(
    status: ReviewStatus,
    notes: Option<&str>,
    existing: &str,
) -> Result<(), ValidationError> {
    if status.requires_notes() && notes.is_none() && existing.trim().is_empty() {
        return Err(ValidationError::NotesRequired(status));
    }
    Ok(())
}
