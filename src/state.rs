use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    models::{ActivityEntry, Collection, SubjectType},
    store::{Snapshot, Stored},
};

#[derive(Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Collections and uploaded objects of the development backend. Everything
/// lives in memory and is lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<Snapshot>,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list<T: Stored>(&self) -> Vec<T> {
        T::rows(&*self.data.read().await).clone()
    }

    /// Replaces by id; unknown ids go to the head.
    pub async fn upsert<T: Stored>(&self, records: Vec<T>) -> usize {
        let mut data = self.data.write().await;
        let rows = T::rows_mut(&mut data);
        let count = records.len();
        let mut fresh = Vec::new();
        for record in records {
            match rows.iter_mut().find(|existing| existing.id() == record.id()) {
                Some(existing) => *existing = record,
                None => fresh.push(record),
            }
        }
        rows.splice(0..0, fresh);
        count
    }

    pub async fn get<T: Stored>(&self, id: &str) -> Option<T> {
        let data = self.data.read().await;
        T::rows(&data).iter().find(|r| r.id() == id).cloned()
    }

    /// Deletes one record and applies the referential cascade for its type.
    pub async fn delete<T: Stored>(&self, id: &str) -> bool {
        let mut data = self.data.write().await;
        let rows = T::rows_mut(&mut data);
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        if rows.len() == before {
            return false;
        }
        cascade(&mut data, T::COLLECTION, id);
        true
    }

    pub async fn put_object(&self, key: String, object: StoredObject) {
        self.objects.write().await.insert(key, object);
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn delete_object(&self, key: &str) -> bool {
        self.objects.write().await.remove(key).is_some()
    }
}

fn prune_activity(activity: &mut Vec<ActivityEntry>, subject_type: SubjectType, id: &str) {
    activity.retain(|e| !(e.subject_type == subject_type && e.subject_id == id));
}

fn cascade(data: &mut Snapshot, collection: Collection, id: &str) {
    match collection {
        Collection::Assets => prune_activity(&mut data.activity, SubjectType::Asset, id),
        Collection::TextItems => prune_activity(&mut data.activity, SubjectType::Text, id),
        Collection::TextGroups => {
            for item in data.text_items.iter_mut().filter(|i| i.group_id.as_deref() == Some(id)) {
                item.group_id = None;
                item.section_id = None;
            }
            data.text_sections.retain(|s| s.group_id != id);
        }
        Collection::TextSections => {
            for item in data
                .text_items
                .iter_mut()
                .filter(|i| i.section_id.as_deref() == Some(id))
            {
                item.section_id = None;
            }
        }
        Collection::Events | Collection::Activity => {}
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub backend: Arc<MemoryBackend>,
}

impl AppState {
    pub fn new(config: AppConfig, jwt: JwtService) -> Self {
        Self {
            config: Arc::new(config),
            jwt,
            backend: Arc::new(MemoryBackend::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TextGroup, TextItem, TextSection};
    use crate::seed;

    #[tokio::test]
    async fn group_delete_detaches_items_and_drops_sections() {
        let backend = MemoryBackend::new();
        backend.upsert(seed::text_groups()).await;
        backend.upsert(seed::text_sections()).await;
        backend.upsert(seed::text_items()).await;

        assert!(backend.delete::<TextGroup>("group-spring-copy").await);

        assert!(backend.list::<TextSection>().await.is_empty());
        assert!(backend
            .list::<TextItem>()
            .await
            .iter()
            .all(|i| i.group_id.is_none() && i.section_id.is_none()));
        assert!(!backend.delete::<TextGroup>("group-spring-copy").await);
    }

    #[tokio::test]
    async fn text_delete_prunes_only_its_activity() {
        let backend = MemoryBackend::new();
        backend.upsert(seed::text_items()).await;
        backend.upsert(seed::activity()).await;
        let before = backend.list::<ActivityEntry>().await.len();

        backend.delete::<TextItem>("text-seed-1").await;

        let activity = backend.list::<ActivityEntry>().await;
        assert_eq!(activity.len(), before - 1);
        assert!(activity.iter().all(|e| e.subject_id != "text-seed-1"));
    }
}
