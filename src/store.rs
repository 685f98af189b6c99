//! In-memory application state: every collection plus per-record sync
//! bookkeeping, mutated only through the methods below.

use std::collections::{BTreeSet, HashMap};

use crate::cache::LocalCache;
use crate::models::{
    ActivityEntry, Asset, Collection, Event, Record, SubjectType, TextGroup, TextItem, TextSection,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub assets: Vec<Asset>,
    pub events: Vec<Event>,
    pub text_items: Vec<TextItem>,
    pub text_groups: Vec<TextGroup>,
    pub text_sections: Vec<TextSection>,
    pub activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Replace,
    Upsert,
    Remove,
    Prepend,
}

/// One applied change, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub collection: Collection,
    pub op: Op,
    pub ids: Vec<String>,
}

/// Local revision of a record and whether the remote has confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMeta {
    pub revision: u64,
    pub pending: bool,
}

pub trait Stored: Record {
    fn rows(snapshot: &Snapshot) -> &Vec<Self>;
    fn rows_mut(snapshot: &mut Snapshot) -> &mut Vec<Self>;
}

macro_rules! stored {
    ($ty:ty, $field:ident) => {
        impl Stored for $ty {
            fn rows(snapshot: &Snapshot) -> &Vec<Self> {
                &snapshot.$field
            }

            fn rows_mut(snapshot: &mut Snapshot) -> &mut Vec<Self> {
                &mut snapshot.$field
            }
        }
    };
}

stored!(Asset, assets);
stored!(Event, events);
stored!(TextItem, text_items);
stored!(TextGroup, text_groups);
stored!(TextSection, text_sections);
stored!(ActivityEntry, activity);

#[derive(Debug, Default)]
pub struct Store {
    data: Snapshot,
    meta: HashMap<(Collection, String), SyncMeta>,
    revision: u64,
    journal: Vec<JournalEntry>,
    dirty: BTreeSet<Collection>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.data
    }

    pub fn all<T: Stored>(&self) -> &[T] {
        T::rows(&self.data)
    }

    /// Soft foreign keys resolve to `None` when the target is gone.
    pub fn get<T: Stored>(&self, id: &str) -> Option<&T> {
        T::rows(&self.data).iter().find(|record| record.id() == id)
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sync_meta(&self, collection: Collection, id: &str) -> Option<SyncMeta> {
        self.meta.get(&(collection, id.to_string())).copied()
    }

    pub fn pending(&self, collection: Collection) -> Vec<String> {
        let mut ids: Vec<String> = self
            .meta
            .iter()
            .filter(|((c, _), meta)| *c == collection && meta.pending)
            .map(|((_, id), _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn record(&mut self, collection: Collection, op: Op, ids: Vec<String>) {
        self.journal.push(JournalEntry { collection, op, ids });
        self.dirty.insert(collection);
    }

    fn touch(&mut self, collection: Collection, id: &str) {
        self.revision += 1;
        self.meta.insert(
            (collection, id.to_string()),
            SyncMeta {
                revision: self.revision,
                pending: true,
            },
        );
    }

    /// Adopts a loaded collection wholesale; loaded records are not pending.
    pub fn replace<T: Stored>(&mut self, records: Vec<T>) {
        let collection = T::COLLECTION;
        self.meta.retain(|(c, _), _| *c != collection);
        let ids = records.iter().map(|r| r.id().to_string()).collect();
        *T::rows_mut(&mut self.data) = records;
        self.record(collection, Op::Replace, ids);
    }

    /// Replaces records in place by id; unknown ids are inserted at the head.
    /// Every written record becomes pending at a fresh revision.
    pub fn upsert<T: Stored>(&mut self, records: Vec<T>) {
        if records.is_empty() {
            return;
        }
        let collection = T::COLLECTION;
        let ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        for id in &ids {
            self.touch(collection, id);
        }

        let rows = T::rows_mut(&mut self.data);
        let mut fresh = Vec::new();
        for record in records {
            match rows.iter_mut().find(|existing| existing.id() == record.id()) {
                Some(existing) => *existing = record,
                None => fresh.push(record),
            }
        }
        rows.splice(0..0, fresh);
        self.record(collection, Op::Upsert, ids);
    }

    pub fn remove<T: Stored>(&mut self, ids: &[String]) -> Vec<T> {
        let collection = T::COLLECTION;
        let rows = T::rows_mut(&mut self.data);
        let (removed, kept): (Vec<T>, Vec<T>) = rows
            .drain(..)
            .partition(|record| ids.iter().any(|id| id == record.id()));
        *rows = kept;

        if removed.is_empty() {
            return removed;
        }
        let removed_ids: Vec<String> = removed.iter().map(|r| r.id().to_string()).collect();
        for id in &removed_ids {
            self.meta.remove(&(collection, id.clone()));
        }
        self.record(collection, Op::Remove, removed_ids);
        removed
    }

    /// Activity is most-recent-first: new entries go to the head.
    pub fn prepend_activity(&mut self, entries: Vec<ActivityEntry>) {
        if entries.is_empty() {
            return;
        }
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        for id in &ids {
            self.touch(Collection::Activity, id);
        }
        self.data.activity.splice(0..0, entries);
        self.record(Collection::Activity, Op::Prepend, ids);
    }

    pub fn prune_activity(&mut self, subject_type: SubjectType, subject_ids: &[String]) -> usize {
        let ids: Vec<String> = self
            .data
            .activity
            .iter()
            .filter(|e| e.subject_type == subject_type && subject_ids.contains(&e.subject_id))
            .map(|e| e.id.clone())
            .collect();
        self.remove::<ActivityEntry>(&ids).len()
    }

    /// Current revision of each id, captured before a push.
    pub fn revisions(&self, collection: Collection, ids: &[String]) -> Vec<(String, u64)> {
        ids.iter()
            .filter_map(|id| {
                self.sync_meta(collection, id)
                    .map(|meta| (id.clone(), meta.revision))
            })
            .collect()
    }

    /// Clears `pending` only where no newer local write happened since the
    /// push started.
    pub fn mark_synced(&mut self, collection: Collection, pushed: &[(String, u64)]) {
        for (id, revision) in pushed {
            if let Some(meta) = self.meta.get_mut(&(collection, id.clone())) {
                if meta.revision == *revision {
                    meta.pending = false;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for collection in Collection::ALL {
            match collection {
                Collection::Assets => self.replace::<Asset>(Vec::new()),
                Collection::Events => self.replace::<Event>(Vec::new()),
                Collection::TextItems => self.replace::<TextItem>(Vec::new()),
                Collection::TextGroups => self.replace::<TextGroup>(Vec::new()),
                Collection::TextSections => self.replace::<TextSection>(Vec::new()),
                Collection::Activity => self.replace::<ActivityEntry>(Vec::new()),
            }
        }
    }

    /// Writes every collection changed since the last call; empty
    /// collections keep their previous snapshot.
    pub fn persist_dirty(&mut self, cache: &LocalCache) {
        for collection in std::mem::take(&mut self.dirty) {
            match collection {
                Collection::Assets => cache.write(&self.data.assets),
                Collection::Events => cache.write(&self.data.events),
                Collection::TextItems => cache.write(&self.data.text_items),
                Collection::TextGroups => cache.write(&self.data.text_groups),
                Collection::TextSections => cache.write(&self.data.text_sections),
                Collection::Activity => cache.write(&self.data.activity),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::seed;

    #[test]
    fn upsert_replaces_in_place_and_prepends_new() {
        let mut store = Store::new();
        store.replace(seed::events());
        let mut first = seed::events()[0].clone();
        first.name = "Renamed".into();
        let mut extra = first.clone();
        extra.id = "event-new".into();

        store.upsert(vec![first, extra]);

        let events = store.all::<Event>();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].id, "event-new");
        assert_eq!(events[1].name, "Renamed");
        assert!(store.sync_meta(Collection::Events, "event-new").unwrap().pending);
        assert!(store.sync_meta(Collection::Events, "event-summer-skin").is_none());
    }

    #[test]
    fn newer_writes_stay_pending_after_older_push() {
        let mut store = Store::new();
        let event = seed::events().remove(0);
        store.upsert(vec![event.clone()]);
        let pushed = store.revisions(Collection::Events, &[event.id.clone()]);

        store.upsert(vec![event.clone()]);
        store.mark_synced(Collection::Events, &pushed);
        assert!(store.sync_meta(Collection::Events, &event.id).unwrap().pending);

        let pushed = store.revisions(Collection::Events, &[event.id.clone()]);
        store.mark_synced(Collection::Events, &pushed);
        assert!(!store.sync_meta(Collection::Events, &event.id).unwrap().pending);
        assert!(store.pending(Collection::Events).is_empty());
    }

    #[test]
    fn persist_skips_empty_collections() {
        let backing = Arc::new(MemoryCacheStore::new());
        let cache = LocalCache::new(backing.clone());
        let mut store = Store::new();

        store.replace(seed::assets());
        store.persist_dirty(&cache);
        store.clear();
        store.persist_dirty(&cache);

        assert!(store.all::<Asset>().is_empty());
        assert_eq!(cache.read::<Asset>().len(), seed::assets().len());
        assert!(backing.get(Collection::Events.cache_key()).unwrap().is_none());
    }

    #[test]
    fn prune_activity_only_touches_subject() {
        let mut store = Store::new();
        store.replace(seed::activity());
        let before = store.all::<ActivityEntry>().len();

        let removed = store.prune_activity(SubjectType::Asset, &["asset-seed-1".to_string()]);

        assert_eq!(removed, 1);
        assert_eq!(store.all::<ActivityEntry>().len(), before - 1);
        assert!(store
            .all::<ActivityEntry>()
            .iter()
            .all(|e| e.subject_id != "asset-seed-1"));
    }
}
