use chrono::Utc;
use tracing::info;

use super::{
    clean_notes, created_entry, require_notes, review_entries, unique_ids, Dashboard,
    MutationReport, Push,
};
use crate::error::{MutationError, ValidationError};
use crate::import;
use crate::models::{generate_id, Collection, ReviewStatus, SubjectType, TextItem, TextSection};
use crate::normalize::{clean_tags, DEFAULT_TEXT_CATEGORY};
use crate::notify::StatusChange;
use crate::store::Store;

/// Create (`id: None`) or edit a text item.
#[derive(Debug, Clone, Default)]
pub struct TextDraft {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub group_id: Option<String>,
    pub section_id: Option<String>,
}

/// Shared metadata applied to every imported entry.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub group_id: Option<String>,
    pub section_id: Option<String>,
}

fn category_or_default(category: Option<&str>) -> String {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_TEXT_CATEGORY)
        .to_lowercase()
}

/// A section only sticks when it belongs to the chosen group.
fn placement(
    store: &Store,
    group_id: Option<String>,
    section_id: Option<String>,
) -> (Option<String>, Option<String>) {
    let group_id = group_id.filter(|g| !g.trim().is_empty());
    let section_id = section_id.filter(|section_id| {
        store
            .get::<TextSection>(section_id)
            .is_some_and(|section| Some(&section.group_id) == group_id.as_ref())
    });
    (group_id, section_id)
}

impl Dashboard {
    pub async fn save_text_item(
        &self,
        draft: TextDraft,
    ) -> Result<MutationReport<TextItem>, MutationError> {
        let _busy = self.text_busy.try_acquire("text save")?;

        let title = draft.title.trim().to_string();
        let body = draft.body.trim().to_string();
        if title.is_empty() && body.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let actor = self.actor().await;
        let now = Utc::now();

        let (item, push) = {
            let mut store = self.store.lock().await;
            let (group_id, section_id) = placement(&store, draft.group_id, draft.section_id);

            let mut push = Push::default();
            let item = match draft.id.as_deref() {
                Some(id) => {
                    let mut item = store
                        .get::<TextItem>(id)
                        .cloned()
                        .ok_or_else(|| MutationError::not_found("text item", id))?;
                    item.title = title;
                    item.body = body;
                    if let Some(category) = draft.category.as_deref() {
                        item.category = category_or_default(Some(category));
                    }
                    item.tags = clean_tags(draft.tags);
                    item.group_id = group_id;
                    item.section_id = section_id;
                    item.updated_at = now;

                    store.upsert(vec![item.clone()]);
                    push.upsert(&store, std::slice::from_ref(&item));
                    item
                }
                None => {
                    let item = TextItem {
                        id: generate_id(),
                        title,
                        body,
                        category: category_or_default(draft.category.as_deref()),
                        status: ReviewStatus::ToReview,
                        author: actor.name.clone(),
                        reviewer: None,
                        created_at: now,
                        updated_at: now,
                        tags: clean_tags(draft.tags),
                        review_notes: String::new(),
                        group_id,
                        section_id,
                    };
                    let entry = created_entry(SubjectType::Text, &item.id, &actor.name, now);
                    store.upsert(vec![item.clone()]);
                    store.prepend_activity(vec![entry.clone()]);
                    push.upsert(&store, std::slice::from_ref(&item));
                    push.upsert(&store, &[entry]);
                    item
                }
            };
            store.persist_dirty(&self.cache);
            (item, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: item,
            sync,
            warnings: Vec::new(),
        })
    }

    pub async fn review_text_item(
        &self,
        id: &str,
        status: ReviewStatus,
        notes: Option<&str>,
    ) -> Result<MutationReport<TextItem>, MutationError> {
        let mut report = self.bulk_set_text_status(&[id.to_string()], status, notes).await?;
        let value = report
            .value
            .pop()
            .ok_or_else(|| MutationError::not_found("text item", id))?;
        Ok(MutationReport {
            value,
            sync: report.sync,
            warnings: report.warnings,
        })
    }

    pub async fn bulk_set_text_status(
        &self,
        ids: &[String],
        status: ReviewStatus,
        notes: Option<&str>,
    ) -> Result<MutationReport<Vec<TextItem>>, MutationError> {
        let notes = clean_notes(notes);
        let actor = self.actor().await;
        let now = Utc::now();

        let (updated, changes, push) = {
            let mut store = self.store.lock().await;
            let current: Vec<TextItem> = unique_ids(ids)
                .filter_map(|id| store.get::<TextItem>(id).cloned())
                .collect();
            if current.is_empty() {
                let id = ids.first().cloned().unwrap_or_default();
                return Err(MutationError::not_found("text item", id));
            }
            for item in &current {
                require_notes(status, notes, &item.review_notes)?;
            }

            let mut updated = Vec::new();
            let mut entries = Vec::new();
            let mut changes = Vec::new();
            for item in current {
                let mut next = item.clone();
                next.status = status;
                next.reviewer = Some(actor.name.clone());
                next.updated_at = now;
                if let Some(notes) = notes {
                    next.review_notes = notes.to_string();
                }
                entries.extend(review_entries(
                    SubjectType::Text,
                    &item.id,
                    item.status,
                    status,
                    notes,
                    &actor.name,
                    now,
                ));
                if item.status != status {
                    changes.push(StatusChange {
                        subject_type: SubjectType::Text,
                        title: if item.title.is_empty() { item.body.clone() } else { item.title.clone() },
                        actor: actor.name.clone(),
                        from: item.status,
                        to: status,
                        notes: notes.map(str::to_string),
                    });
                }
                updated.push(next);
            }

            store.upsert(updated.clone());
            store.prepend_activity(entries.clone());
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, &updated);
            push.upsert(&store, &entries);
            (updated, changes, push)
        };

        let sync = self.push(&actor, push).await;
        for change in changes {
            self.notify(change).await;
        }
        Ok(MutationReport {
            value: updated,
            sync,
            warnings: Vec::new(),
        })
    }

    pub async fn delete_text_item(
        &self,
        id: &str,
    ) -> Result<MutationReport<Vec<TextItem>>, MutationError> {
        self.bulk_delete_text_items(&[id.to_string()]).await
    }

    pub async fn bulk_delete_text_items(
        &self,
        ids: &[String],
    ) -> Result<MutationReport<Vec<TextItem>>, MutationError> {
        let actor = self.actor().await;

        let (removed, push) = {
            let mut store = self.store.lock().await;
            let removed = store.remove::<TextItem>(ids);
            if removed.is_empty() {
                let id = ids.first().cloned().unwrap_or_default();
                return Err(MutationError::not_found("text item", id));
            }
            let removed_ids: Vec<String> = removed.iter().map(|i| i.id.clone()).collect();
            let pruned = store.prune_activity(SubjectType::Text, &removed_ids);
            store.persist_dirty(&self.cache);
            info!(items = removed.len(), activity = pruned, "text items deleted");

            let mut push = Push::default();
            for id in removed_ids {
                push.delete(Collection::TextItems, id);
            }
            (removed, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: removed,
            sync,
            warnings: Vec::new(),
        })
    }

    /// Splits pasted text into entries and creates one item per entry.
    pub async fn import_text(
        &self,
        raw: &str,
        options: ImportOptions,
    ) -> Result<MutationReport<Vec<TextItem>>, MutationError> {
        let entries = import::parse_entries(raw);
        if entries.is_empty() {
            return Err(ValidationError::EmptyImport.into());
        }
        let _busy = self.text_busy.try_acquire("text import")?;
        let actor = self.actor().await;
        let now = Utc::now();

        let (created, push) = {
            let mut store = self.store.lock().await;
            let (group_id, section_id) = placement(&store, options.group_id, options.section_id);
            let category = category_or_default(options.category.as_deref());
            let tags = clean_tags(options.tags);

            let created: Vec<TextItem> = entries
                .into_iter()
                .map(|entry| TextItem {
                    id: generate_id(),
                    title: entry.title,
                    body: entry.body,
                    category: category.clone(),
                    status: ReviewStatus::ToReview,
                    author: actor.name.clone(),
                    reviewer: None,
                    created_at: now,
                    updated_at: now,
                    tags: tags.clone(),
                    review_notes: String::new(),
                    group_id: group_id.clone(),
                    section_id: section_id.clone(),
                })
                .collect();
            let activity: Vec<_> = created
                .iter()
                .map(|item| created_entry(SubjectType::Text, &item.id, &actor.name, now))
                .collect();

            store.upsert(created.clone());
            store.prepend_activity(activity.clone());
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, &created);
            push.upsert(&store, &activity);
            (created, push)
        };

        info!(count = created.len(), "text imported");
        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: created,
            sync,
            warnings: Vec::new(),
        })
    }
}
