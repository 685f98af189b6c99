use chrono::Utc;
use tracing::{info, warn};

use super::upload::{store_media, UploadFile};
use super::{
    clean_notes, created_entry, require_notes, review_entries, unique_ids, Dashboard,
    MutationReport, Push,
};
use crate::error::{MutationError, ValidationError};
use crate::identity::AuthState;
use crate::models::{
    generate_id, Asset, Collection, Event, MediaStorage, ReviewStatus, SkinTone, SubjectType,
};
use crate::notify::StatusChange;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub event_id: String,
    pub tones: Vec<SkinTone>,
    pub files: Vec<UploadFile>,
    /// Defaults to the file name without extension.
    pub title: Option<String>,
    pub notes_ideas: String,
}

/// Field edits; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct AssetPatch {
    pub title: Option<String>,
    pub event_id: Option<String>,
    pub skin_tone: Option<SkinTone>,
    pub notes_ideas: Option<String>,
    pub notes_refinement: Option<String>,
}

fn title_from_file(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}

impl Dashboard {
    /// One asset per accepted file and selected tone, all TO_REVIEW.
    pub async fn upload_assets(
        &self,
        request: UploadRequest,
    ) -> Result<MutationReport<Vec<Asset>>, MutationError> {
        let _busy = self.upload_busy.try_acquire("upload")?;

        if request.files.is_empty() {
            return Err(ValidationError::NoFiles.into());
        }
        let mut tones = request.tones.clone();
        tones.sort();
        tones.dedup();
        if tones.is_empty() {
            return Err(ValidationError::NoTones.into());
        }
        if self.store.lock().await.get::<Event>(&request.event_id).is_none() {
            return Err(ValidationError::UnknownEvent(request.event_id).into());
        }

        let mut warnings = Vec::new();
        let accepted: Vec<_> = request
            .files
            .iter()
            .filter_map(|file| match file.media_type() {
                Some((content_type, kind)) => Some((file, content_type, kind)),
                None => {
                    warnings.push(format!("{} is not an image or video", file.file_name));
                    None
                }
            })
            .collect();
        if accepted.is_empty() {
            return Err(ValidationError::NoAcceptedFiles.into());
        }

        let actor = self.actor().await;
        let token = match &actor.auth {
            AuthState::Authenticated(session) => self.identity.token(session).await,
            _ => None,
        };

        let mut media = Vec::new();
        for (file, content_type, kind) in accepted {
            match store_media(
                self.storage.as_ref(),
                token.as_deref(),
                &request.event_id,
                file,
                &content_type,
                kind,
            )
            .await
            {
                Ok(stored) => media.push((file, stored)),
                Err(reason) => {
                    warn!(file = %file.file_name, "skipping upload: {reason}");
                    warnings.push(reason);
                }
            }
        }
        if media.is_empty() {
            return Err(ValidationError::NothingStored(warnings).into());
        }

        let now = Utc::now();
        let base_title = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let mut created = Vec::new();
        for (file, stored) in &media {
            let title = base_title
                .map(str::to_string)
                .unwrap_or_else(|| title_from_file(&file.file_name));
            for tone in &tones {
                created.push(Asset {
                    id: generate_id(),
                    title: if tones.len() > 1 {
                        format!("{title} ({})", tone.label())
                    } else {
                        title.clone()
                    },
                    event_id: request.event_id.clone(),
                    skin_tone: *tone,
                    status: ReviewStatus::ToReview,
                    uploader: actor.name.clone(),
                    reviewer: None,
                    created_at: now,
                    updated_at: now,
                    version: 1,
                    notes_refinement: String::new(),
                    notes_ideas: request.notes_ideas.trim().to_string(),
                    preview_color: tone.swatch().to_string(),
                    media: Some(stored.clone()),
                    file_name: Some(file.file_name.clone()),
                    file_size: Some(file.bytes.len() as u64),
                });
            }
        }

        let push = {
            let mut store = self.store.lock().await;
            let entries: Vec<_> = created
                .iter()
                .map(|asset| created_entry(SubjectType::Asset, &asset.id, &actor.name, now))
                .collect();
            store.upsert(created.clone());
            store.prepend_activity(entries.clone());
            store.persist_dirty(&self.cache);

            let mut push = Push::default();
            push.upsert(&store, &created);
            push.upsert(&store, &entries);
            push
        };

        info!(count = created.len(), event = %request.event_id, "assets uploaded");
        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: created,
            sync,
            warnings,
        })
    }

    pub async fn review_asset(
        &self,
        id: &str,
        status: ReviewStatus,
        notes: Option<&str>,
    ) -> Result<MutationReport<Asset>, MutationError> {
        let mut report = self.bulk_set_asset_status(&[id.to_string()], status, notes).await?;
        let value = report
            .value
            .pop()
            .ok_or_else(|| MutationError::not_found("asset", id))?;
        Ok(MutationReport {
            value,
            sync: report.sync,
            warnings: report.warnings,
        })
    }

    /// Review several assets at once. Unknown ids are skipped.
    pub async fn bulk_set_asset_status(
        &self,
        ids: &[String],
        status: ReviewStatus,
        notes: Option<&str>,
    ) -> Result<MutationReport<Vec<Asset>>, MutationError> {
        let notes = clean_notes(notes);
        let actor = self.actor().await;
        let now = Utc::now();

        let (updated, changes, push) = {
            let mut store = self.store.lock().await;
            let current: Vec<Asset> = unique_ids(ids)
                .filter_map(|id| store.get::<Asset>(id).cloned())
                .collect();
            if current.is_empty() {
                let id = ids.first().cloned().unwrap_or_default();
                return Err(MutationError::not_found("asset", id));
            }
            for asset in &current {
                require_notes(status, notes, &asset.notes_refinement)?;
            }

            let mut updated = Vec::new();
            let mut entries = Vec::new();
            let mut changes = Vec::new();
            for asset in current {
                let mut next = asset.clone();
                next.status = status;
                next.reviewer = Some(actor.name.clone());
                next.updated_at = now;
                if let Some(notes) = notes {
                    next.notes_refinement = notes.to_string();
                }
                entries.extend(review_entries(
                    SubjectType::Asset,
                    &asset.id,
                    asset.status,
                    status,
                    notes,
                    &actor.name,
                    now,
                ));
                if asset.status != status {
                    changes.push(StatusChange {
                        subject_type: SubjectType::Asset,
                        title: asset.title.clone(),
                        actor: actor.name.clone(),
                        from: asset.status,
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

    /// Metadata edit. Status, reviewer and version are untouched and no
    /// activity is logged.
    pub async fn update_asset(
        &self,
        id: &str,
        patch: AssetPatch,
    ) -> Result<MutationReport<Asset>, MutationError> {
        let actor = self.actor().await;

        let (asset, push) = {
            let mut store = self.store.lock().await;
            let mut asset = store
                .get::<Asset>(id)
                .cloned()
                .ok_or_else(|| MutationError::not_found("asset", id))?;

            if let Some(title) = patch.title {
                let title = title.trim();
                if title.is_empty() {
                    return Err(ValidationError::Required("title").into());
                }
                asset.title = title.to_string();
            }
            if let Some(event_id) = patch.event_id {
                if store.get::<Event>(&event_id).is_none() {
                    return Err(ValidationError::UnknownEvent(event_id).into());
                }
                asset.event_id = event_id;
            }
            if let Some(tone) = patch.skin_tone {
                asset.skin_tone = tone;
            }
            if let Some(notes) = patch.notes_ideas {
                asset.notes_ideas = notes.trim().to_string();
            }
            if let Some(notes) = patch.notes_refinement {
                asset.notes_refinement = notes.trim().to_string();
            }
            asset.updated_at = Utc::now();

            store.upsert(vec![asset.clone()]);
            store.persist_dirty(&self.cache);
            let mut push = Push::default();
            push.upsert(&store, std::slice::from_ref(&asset));
            (asset, push)
        };

        let sync = self.push(&actor, push).await;
        Ok(MutationReport {
            value: asset,
            sync,
            warnings: Vec::new(),
        })
    }

    pub async fn delete_asset(&self, id: &str) -> Result<MutationReport<Vec<Asset>>, MutationError> {
        self.bulk_delete_assets(&[id.to_string()]).await
    }

    /// Removes assets with their activity. The backend prunes its own
    /// activity rows; uploaded objects are deleted best-effort.
    pub async fn bulk_delete_assets(
        &self,
        ids: &[String],
    ) -> Result<MutationReport<Vec<Asset>>, MutationError> {
        let actor = self.actor().await;

        let (removed, push) = {
            let mut store = self.store.lock().await;
            let removed = store.remove::<Asset>(ids);
            if removed.is_empty() {
                let id = ids.first().cloned().unwrap_or_default();
                return Err(MutationError::not_found("asset", id));
            }
            let removed_ids: Vec<String> = removed.iter().map(|a| a.id.clone()).collect();
            let pruned = store.prune_activity(SubjectType::Asset, &removed_ids);
            store.persist_dirty(&self.cache);
            info!(assets = removed.len(), activity = pruned, "assets deleted");

            let mut push = Push::default();
            for id in removed_ids {
                push.delete(Collection::Assets, id);
            }
            (removed, push)
        };

        let sync = self.push(&actor, push).await;

        if let AuthState::Authenticated(session) = &actor.auth {
            if let Some(token) = self.identity.token(session).await {
                for media in removed
                    .iter()
                    .filter_map(|a| a.media.as_ref())
                    .filter(|m| m.storage == MediaStorage::Object)
                {
                    if let Err(err) = self.storage.delete_object(&media.url, &token).await {
                        warn!(url = %media.url, error = %err, "failed to delete stored media");
                    }
                }
            }
        }

        Ok(MutationReport {
            value: removed,
            sync,
            warnings: Vec::new(),
        })
    }
}
