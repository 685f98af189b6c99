//! Text groups and sections. Deleting either detaches member items rather
//! than deleting them.

use chrono::Utc;
use tracing::info;

use super::{Dashboard, MutationReport, Push};
use crate::error::{MutationError, ValidationError};
use crate::models::{generate_id, Collection, Event, TextGroup, TextItem, TextSection};

#[derive(Debug, Clone, Default)]
pub struct GroupDraft {
    pub name: String,
    pub description: String,
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SectionDraft {
    pub group_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDeletion {
    pub group: TextGroup,
    pub removed_sections: Vec<String>,
    pub unassigned_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionDeletion {
    pub section: TextSection,
    pub unassigned_items: Vec<String>,
}

fn required_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required("name"));
    }
    Ok(name.to_string())
}

impl Dashboard {
    pub async fn create_group(
        &self,
        draft: GroupDraft,
    ) -> Result<MutationReport<TextGroup>, MutationError> {
        self.write_group(None, draft).await
    }

    pub async fn update_group(
        &self,
        id: &str,
        draft: GroupDraft,
    ) -> Result<MutationReport<TextGroup>, MutationError> {
        self.write_group(Some(id), draft).await
    }

    async fn write_group(
        &self,
        id: Option<&str>,
        draft: GroupDraft,
    ) -> Result<MutationReport<TextGroup>, MutationError> {
        let name = required_name(&draft.name)?;
        let actor = self.actor().await;
        let now = Utc::now();

        let (group, push) = {
            let mut store = self.store.lock().await;
            let event_id = draft.event_id.filter(|e| !e.trim().is_empty());
            if let Some(event_id) = &event_id {
                if store.get::<Event>(event_id).is_none() {
                    return Err(ValidationError::UnknownEvent(event_id.clone()).into());
                }
            }

            let group = match id {
                Some(id) => {
                    let mut group = store
                        .get::<TextGroup>(id)
                        .cloned()
                        .ok_or_else(|| MutationError::not_found("text group", id))?;
                    group.name = name;
                    group.description = draft.description.trim().to_string();
                    group.event_id = event_id;
                    group.updated_at = now;
                    group
                }
                None => TextGroup {
                    id: generate_id(),
                    name,
                    description: draft.description.trim().to_string(),
                    event_id,
                    created_at: now,
                    updated_at: now,
                },
            };

            store.upsert(vec![group.clone()]);
            store.persist_dirty(&self.cache);
            let mut push = Push::default();
            push.upsert(&store, std::slice::from_ref(&group));
            (group, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: group,
            sync,
            warnings: Vec::new(),
        })
    }

    /// Removes the group and its sections; member items become unassigned.
    pub async fn delete_group(
        &self,
        id: &str,
    ) -> Result<MutationReport<GroupDeletion>, MutationError> {
        let actor = self.actor().await;
        let now = Utc::now();

        let (deletion, push) = {
            let mut store = self.store.lock().await;
            if store.get::<TextGroup>(id).is_none() {
                return Err(MutationError::not_found("text group", id));
            }

            let section_ids: Vec<String> = store
                .all::<TextSection>()
                .iter()
                .filter(|s| s.group_id == id)
                .map(|s| s.id.clone())
                .collect();
            let detached: Vec<TextItem> = store
                .all::<TextItem>()
                .iter()
                .filter(|item| item.group_id.as_deref() == Some(id))
                .cloned()
                .map(|mut item| {
                    item.group_id = None;
                    item.section_id = None;
                    item.updated_at = now;
                    item
                })
                .collect();

            store.upsert(detached.clone());
            store.remove::<TextSection>(&section_ids);
            let group = store
                .remove::<TextGroup>(&[id.to_string()])
                .pop()
                .ok_or_else(|| MutationError::not_found("text group", id))?;
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, &detached);
            for section_id in &section_ids {
                push.delete(Collection::TextSections, section_id.clone());
            }
            push.delete(Collection::TextGroups, id);

            info!(group = id, sections = section_ids.len(), items = detached.len(), "text group deleted");
            (
                GroupDeletion {
                    group,
                    removed_sections: section_ids,
                    unassigned_items: detached.into_iter().map(|i| i.id).collect(),
                },
                push,
            )
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: deletion,
            sync,
            warnings: Vec::new(),
        })
    }

    pub async fn create_section(
        &self,
        draft: SectionDraft,
    ) -> Result<MutationReport<TextSection>, MutationError> {
        self.write_section(None, draft).await
    }

    /// Moving a section to another group drops it from items that stay
    /// in the old group.
    pub async fn update_section(
        &self,
        id: &str,
        draft: SectionDraft,
    ) -> Result<MutationReport<TextSection>, MutationError> {
        self.write_section(Some(id), draft).await
    }

    async fn write_section(
        &self,
        id: Option<&str>,
        draft: SectionDraft,
    ) -> Result<MutationReport<TextSection>, MutationError> {
        let name = required_name(&draft.name)?;
        let actor = self.actor().await;
        let now = Utc::now();

        let (section, push) = {
            let mut store = self.store.lock().await;
            if store.get::<TextGroup>(&draft.group_id).is_none() {
                return Err(ValidationError::UnknownGroup(draft.group_id).into());
            }

            let section = match id {
                Some(id) => {
                    let mut section = store
                        .get::<TextSection>(id)
                        .cloned()
                        .ok_or_else(|| MutationError::not_found("text section", id))?;
                    section.name = name;
                    section.description = draft.description.trim().to_string();
                    section.group_id = draft.group_id;
                    section.updated_at = now;
                    section
                }
                None => TextSection {
                    id: generate_id(),
                    name,
                    description: draft.description.trim().to_string(),
                    group_id: draft.group_id,
                    created_at: now,
                    updated_at: now,
                },
            };

            let orphaned: Vec<TextItem> = store
                .all::<TextItem>()
                .iter()
                .filter(|item| {
                    item.section_id.as_deref() == Some(section.id.as_str())
                        && item.group_id.as_deref() != Some(section.group_id.as_str())
                })
                .cloned()
                .map(|mut item| {
                    item.section_id = None;
                    item.updated_at = now;
                    item
                })
                .collect();

            store.upsert(vec![section.clone()]);
            store.upsert(orphaned.clone());
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, std::slice::from_ref(&section));
            push.upsert(&store, &orphaned);
            (section, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: section,
            sync,
            warnings: Vec::new(),
        })
    }

    pub async fn delete_section(
        &self,
        id: &str,
    ) -> Result<MutationReport<SectionDeletion>, MutationError> {
        let actor = self.actor().await;
        let now = Utc::now();

        let (deletion, push) = {
            let mut store = self.store.lock().await;
            if store.get::<TextSection>(id).is_none() {
                return Err(MutationError::not_found("text section", id));
            }

            let detached: Vec<TextItem> = store
                .all::<TextItem>()
                .iter()
                .filter(|item| item.section_id.as_deref() == Some(id))
                .cloned()
                .map(|mut item| {
                    item.section_id = None;
                    item.updated_at = now;
                    item
                })
                .collect();

            store.upsert(detached.clone());
            let section = store
                .remove::<TextSection>(&[id.to_string()])
                .pop()
                .ok_or_else(|| MutationError::not_found("text section", id))?;
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, &detached);
            push.delete(Collection::TextSections, id);
            (
                SectionDeletion {
                    section,
                    unassigned_items: detached.into_iter().map(|i| i.id).collect(),
                },
                push,
            )
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: deletion,
            sync,
            warnings: Vec::new(),
        })
    }
}
