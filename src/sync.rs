//! Load-time reconciliation between the local cache and the backend.
//!
//! One fallback ladder, parametrized per collection by a [`CollectionSpec`]:
//!
//! 1. local demo identity: cache, else a generated seed (which is cached);
//! 2. authenticated and the fetch succeeds: the remote result is adopted as
//!    is (collections flagged `seed_remote_on_empty` push and adopt their
//!    seed when the remote is empty);
//! 3. authenticated but the fetch fails: a sync error is reported and the
//!    ladder continues as in 1;
//! 4. signed out: nothing is loaded.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::identity::AuthState;
use crate::models::{ActivityEntry, Asset, Collection, Event, Record, TextGroup, TextItem, TextSection};
use crate::normalize;
use crate::remote::RemoteCollections;
use crate::seed;

pub struct CollectionSpec<T> {
    pub seed: fn() -> Vec<T>,
    pub seed_remote_on_empty: bool,
}

pub const ASSETS: CollectionSpec<Asset> = CollectionSpec {
    seed: seed::assets,
    seed_remote_on_empty: false,
};

pub const EVENTS: CollectionSpec<Event> = CollectionSpec {
    seed: seed::events,
    seed_remote_on_empty: true,
};

pub const TEXT_ITEMS: CollectionSpec<TextItem> = CollectionSpec {
    seed: seed::text_items,
    seed_remote_on_empty: false,
};

pub const TEXT_GROUPS: CollectionSpec<TextGroup> = CollectionSpec {
    seed: seed::text_groups,
    seed_remote_on_empty: false,
};

pub const TEXT_SECTIONS: CollectionSpec<TextSection> = CollectionSpec {
    seed: seed::text_sections,
    seed_remote_on_empty: false,
};

pub const ACTIVITY: CollectionSpec<ActivityEntry> = CollectionSpec {
    seed: seed::activity,
    seed_remote_on_empty: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Seed,
    Remote,
    RemoteSeeded,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub source: Source,
    pub sync_error: Option<String>,
}

pub struct SyncContext<'a> {
    pub auth: &'a AuthState,
    pub token: Option<&'a str>,
    pub cache: &'a LocalCache,
    pub remote: &'a dyn RemoteCollections,
}

pub fn to_values<T: Serialize>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

fn sync_error(collection: Collection) -> String {
    format!("Could not sync {collection} with the server; showing locally saved data.")
}

fn signed_out<T>() -> Loaded<T> {
    Loaded {
        records: Vec::new(),
        source: Source::SignedOut,
        sync_error: None,
    }
}

/// Paths 1 and 3: cached snapshot, else the seed (stored for next time).
pub fn from_cache<T: Record>(
    spec: &CollectionSpec<T>,
    cache: &LocalCache,
    sync_error: Option<String>,
) -> Loaded<T> {
    let cached = cache.read::<T>();
    if !cached.is_empty() {
        return Loaded {
            records: cached,
            source: Source::Cache,
            sync_error,
        };
    }

    let seeded = (spec.seed)();
    cache.write(&seeded);
    info!(collection = %T::COLLECTION, count = seeded.len(), "seeded empty local collection");
    Loaded {
        records: seeded,
        source: Source::Seed,
        sync_error,
    }
}

async fn adopt_remote<T: Record>(
    spec: &CollectionSpec<T>,
    raw: Vec<Value>,
    token: &str,
    remote: &dyn RemoteCollections,
) -> Loaded<T> {
    if raw.is_empty() && spec.seed_remote_on_empty {
        let seeded = (spec.seed)();
        if !remote.save(T::COLLECTION, to_values(&seeded), token).await {
            warn!(collection = %T::COLLECTION, "failed to push seed to empty remote collection");
        }
        return Loaded {
            records: seeded,
            source: Source::RemoteSeeded,
            sync_error: None,
        };
    }

    Loaded {
        records: normalize::collection(&Value::Array(raw)),
        source: Source::Remote,
        sync_error: None,
    }
}

pub async fn load<T: Record>(spec: &CollectionSpec<T>, ctx: &SyncContext<'_>) -> Loaded<T> {
    match ctx.auth {
        AuthState::SignedOut => signed_out(),
        AuthState::LocalDemo(_) => from_cache(spec, ctx.cache, None),
        AuthState::Authenticated(_) => {
            let Some(token) = ctx.token else {
                warn!(collection = %T::COLLECTION, "no access token for authenticated session");
                return from_cache(spec, ctx.cache, Some(sync_error(T::COLLECTION)));
            };
            match ctx.remote.fetch(T::COLLECTION, token).await {
                Some(raw) => adopt_remote(spec, raw, token, ctx.remote).await,
                None => from_cache(spec, ctx.cache, Some(sync_error(T::COLLECTION))),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLibrary {
    pub groups: Loaded<TextGroup>,
    pub sections: Loaded<TextSection>,
    pub items: Loaded<TextItem>,
}

impl TextLibrary {
    pub fn sync_error(&self) -> Option<&str> {
        self.items
            .sync_error
            .as_deref()
            .or(self.groups.sync_error.as_deref())
            .or(self.sections.sync_error.as_deref())
    }
}

/// Groups, sections and items load as one unit: if any of the three fetches
/// fails, all three fall back to the cache together.
pub async fn load_text_library(ctx: &SyncContext<'_>) -> TextLibrary {
    let token = match (ctx.auth, ctx.token) {
        (AuthState::Authenticated(_), Some(token)) => token,
        _ => {
            return TextLibrary {
                groups: load(&TEXT_GROUPS, ctx).await,
                sections: load(&TEXT_SECTIONS, ctx).await,
                items: load(&TEXT_ITEMS, ctx).await,
            }
        }
    };

    let (groups, sections, items) = tokio::join!(
        ctx.remote.fetch(Collection::TextGroups, token),
        ctx.remote.fetch(Collection::TextSections, token),
        ctx.remote.fetch(Collection::TextItems, token),
    );

    match (groups, sections, items) {
        (Some(groups), Some(sections), Some(items)) => TextLibrary {
            groups: adopt_remote(&TEXT_GROUPS, groups, token, ctx.remote).await,
            sections: adopt_remote(&TEXT_SECTIONS, sections, token, ctx.remote).await,
            items: adopt_remote(&TEXT_ITEMS, items, token, ctx.remote).await,
        },
        _ => {
            let message = sync_error(Collection::TextItems);
            TextLibrary {
                groups: from_cache(&TEXT_GROUPS, ctx.cache, Some(message.clone())),
                sections: from_cache(&TEXT_SECTIONS, ctx.cache, Some(message.clone())),
                items: from_cache(&TEXT_ITEMS, ctx.cache, Some(message)),
            }
        }
    }
}
