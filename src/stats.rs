use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Asset, Event, ReviewStatus, SkinTone, TextItem};

#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub event_id: Option<String>,
    pub tone: Option<SkinTone>,
    pub status: Option<ReviewStatus>,
    pub search: Option<String>,
}

impl AssetFilter {
    pub fn matches(&self, asset: &Asset) -> bool {
        if self.event_id.as_deref().is_some_and(|id| id != asset.event_id) {
            return false;
        }
        if self.tone.is_some_and(|tone| tone != asset.skin_tone) {
            return false;
        }
        if self.status.is_some_and(|status| status != asset.status) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => [
                asset.title.as_str(),
                asset.uploader.as_str(),
                asset.notes_ideas.as_str(),
                asset.notes_refinement.as_str(),
                asset.file_name.as_deref().unwrap_or_default(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&term)),
            None => true,
        }
    }

    pub fn apply<'a>(&self, assets: &'a [Asset]) -> Vec<&'a Asset> {
        assets.iter().filter(|asset| self.matches(asset)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    pub status: Option<ReviewStatus>,
    pub category: Option<String>,
    pub group_id: Option<String>,
    pub section_id: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl TextFilter {
    pub fn matches(&self, item: &TextItem) -> bool {
        if self.status.is_some_and(|status| status != item.status) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|category| !category.eq_ignore_ascii_case(&item.category))
        {
            return false;
        }
        if self.group_id.is_some() && self.group_id != item.group_id {
            return false;
        }
        if self.section_id.is_some() && self.section_id != item.section_id {
            return false;
        }
        if self.tag.as_deref().is_some_and(|tag| !item.has_tag(tag)) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => {
                item.title.to_lowercase().contains(&term)
                    || item.body.to_lowercase().contains(&term)
                    || item.tags.iter().any(|t| t.to_lowercase().contains(&term))
            }
            None => true,
        }
    }

    pub fn apply<'a>(&self, items: &'a [TextItem]) -> Vec<&'a TextItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }
}

fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

pub fn status_counts<'a, I>(statuses: I) -> BTreeMap<ReviewStatus, usize>
where
    I: IntoIterator<Item = &'a ReviewStatus>,
{
    let mut counts: BTreeMap<ReviewStatus, usize> =
        ReviewStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for status in statuses {
        *counts.entry(*status).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneProgress {
    pub approved: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProgress {
    pub event_id: String,
    pub approved: u32,
    pub total_target: u32,
    pub per_tone: BTreeMap<SkinTone, ToneProgress>,
}

impl EventProgress {
    /// Whole percent, capped at 100.
    pub fn percent(&self) -> u32 {
        if self.total_target == 0 {
            return 0;
        }
        (self.approved.saturating_mul(100) / self.total_target).min(100)
    }
}

/// Approved assets against the event's targets. `ALL`-tone assets count
/// toward the total only.
pub fn event_progress(event: &Event, assets: &[Asset]) -> EventProgress {
    let mut per_tone: BTreeMap<SkinTone, ToneProgress> = SkinTone::TONES
        .iter()
        .map(|tone| {
            (
                *tone,
                ToneProgress {
                    approved: 0,
                    target: event.per_tone_target,
                },
            )
        })
        .collect();

    let mut approved = 0;
    for asset in assets
        .iter()
        .filter(|a| a.event_id == event.id && a.status == ReviewStatus::Approved)
    {
        approved += 1;
        if let Some(progress) = per_tone.get_mut(&asset.skin_tone) {
            progress.approved += 1;
        }
    }

    EventProgress {
        event_id: event.id.clone(),
        approved,
        total_target: event.total_target,
        per_tone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn progress_counts_approved_per_tone() {
        let event = &seed::events()[0];
        let progress = event_progress(event, &seed::assets());

        assert_eq!(progress.approved, 3);
        assert_eq!(progress.per_tone[&SkinTone::Fair].approved, 1);
        assert_eq!(progress.per_tone[&SkinTone::Olive].approved, 1);
        assert_eq!(progress.per_tone[&SkinTone::Deep].approved, 0);
        assert!(!progress.per_tone.contains_key(&SkinTone::All));
        assert_eq!(progress.percent(), 3 * 100 / 36);
    }

    #[test]
    fn asset_filter_combines_criteria() {
        let assets = seed::assets();
        let filter = AssetFilter {
            tone: Some(SkinTone::Olive),
            search: Some("  SERUM ".into()),
            ..AssetFilter::default()
        };
        let matched = filter.apply(&assets);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "asset-seed-2");

        let counts = status_counts(assets.iter().map(|a| &a.status));
        assert_eq!(counts[&ReviewStatus::ToReview], 3);
        assert_eq!(counts.values().sum::<usize>(), assets.len());
    }

    #[test]
    fn text_filter_by_section_and_tag() {
        let items = seed::text_items();
        let filter = TextFilter {
            section_id: Some("section-spring-hooks".into()),
            tag: Some("SPRING".into()),
            ..TextFilter::default()
        };
        assert_eq!(filter.apply(&items).len(), 2);

        let unassigned = TextFilter {
            search: Some("routines".into()),
            ..TextFilter::default()
        };
        assert_eq!(unassigned.apply(&items)[0].id, "text-seed-4");
    }
}
