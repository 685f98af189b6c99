use chrono::NaiveDate;

use super::{Dashboard, MutationReport, Push};
use crate::error::{MutationError, ValidationError};
use crate::models::{generate_id, Collection, Event};
use crate::normalize::default_per_tone_target;

#[derive(Debug, Clone)]
pub struct EventDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_target: u32,
    /// Derived from the total when absent.
    pub per_tone_target: Option<u32>,
    pub tier: u32,
    pub description: String,
}

impl EventDraft {
    fn validate(&self) -> Result<String, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if self.total_target == 0 {
            return Err(ValidationError::NotPositive("total target"));
        }
        if self.per_tone_target == Some(0) {
            return Err(ValidationError::NotPositive("per-tone target"));
        }
        if self.tier == 0 {
            return Err(ValidationError::NotPositive("tier"));
        }
        if self.end_date.is_some_and(|end| end < self.start_date) {
            return Err(ValidationError::EndBeforeStart);
        }
        Ok(name.to_string())
    }

    fn into_event(self, id: String, name: String) -> Event {
        Event {
            id,
            name,
            start_date: self.start_date,
            end_date: self.end_date,
            total_target: self.total_target,
            per_tone_target: self
                .per_tone_target
                .unwrap_or_else(|| default_per_tone_target(self.total_target)),
            tier: self.tier,
            description: self.description.trim().to_string(),
        }
    }
}

impl Dashboard {
    pub async fn create_event(
        &self,
        draft: EventDraft,
    ) -> Result<MutationReport<Event>, MutationError> {
        self.write_event(None, draft).await
    }

    pub async fn update_event(
        &self,
        id: &str,
        draft: EventDraft,
    ) -> Result<MutationReport<Event>, MutationError> {
        self.write_event(Some(id), draft).await
    }

    async fn write_event(
        &self,
        id: Option<&str>,
        draft: EventDraft,
    ) -> Result<MutationReport<Event>, MutationError> {
        let name = draft.validate()?;
        let actor = self.actor().await;

        let (event, push) = {
            let mut store = self.store.lock().await;
            let id = match id {
                Some(id) if store.get::<Event>(id).is_none() => {
                    return Err(MutationError::not_found("event", id));
                }
                Some(id) => id.to_string(),
                None => generate_id(),
            };
            let event = draft.into_event(id, name);

            store.upsert(vec![event.clone()]);
            store.persist_dirty(&self.cache);
            let mut push = Push::default();
            push.upsert(&store, std::slice::from_ref(&event));
            (event, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: event,
            sync,
            warnings: Vec::new(),
        })
    }

    /// Assets of the event keep their now-dangling `event_id`.
    pub async fn delete_event(&self, id: &str) -> Result<MutationReport<Event>, MutationError> {
        let actor = self.actor().await;

        let (event, push) = {
            let mut store = self.store.lock().await;
            let event = store
                .remove::<Event>(&[id.to_string()])
                .pop()
                .ok_or_else(|| MutationError::not_found("event", id))?;
            store.persist_dirty(&self.cache);
            let mut push = Push::default();
            push.delete(Collection::Events, id);
            (event, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: event,
            sync,
            warnings: Vec::new(),
        })
    }
}
