//! Deterministic starter data for empty workspaces.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{
    ActivityAction, ActivityEntry, Asset, Event, ReviewStatus, SkinTone, SubjectType, TextGroup,
    TextItem, TextSection,
};

/// 2025-03-01T09:00:00Z
const BASE_TIMESTAMP: i64 = 1_740_819_600;
const SEED_ACTOR: &str = "Studio Team";

fn at(hours_after_base: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_TIMESTAMP, 0)
        .single()
        .unwrap_or_default()
        + Duration::hours(hours_after_base)
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

pub fn events() -> Vec<Event> {
    vec![
        Event {
            id: "event-spring-glow".into(),
            name: "Spring Glow Launch".into(),
            start_date: day(2025, 3, 3),
            end_date: Some(day(2025, 3, 31)),
            total_target: 36,
            per_tone_target: 6,
            tier: 1,
            description: "Hero launch for the spring glow collection.".into(),
        },
        Event {
            id: "event-summer-skin".into(),
            name: "Summer Skin Campaign".into(),
            start_date: day(2025, 6, 1),
            end_date: Some(day(2025, 7, 15)),
            total_target: 24,
            per_tone_target: 4,
            tier: 2,
            description: "Always-on summer social content.".into(),
        },
        Event {
            id: "event-holiday-gifts".into(),
            name: "Holiday Gift Guide".into(),
            start_date: day(2025, 11, 15),
            end_date: None,
            total_target: 12,
            per_tone_target: 2,
            tier: 3,
            description: "Gift sets and bundles.".into(),
        },
    ]
}

fn pastel(rng: &mut StdRng) -> String {
    let r: u8 = rng.gen_range(170..=240);
    let g: u8 = rng.gen_range(170..=240);
    let b: u8 = rng.gen_range(170..=240);
    format!("#{r:02X}{g:02X}{b:02X}")
}

pub fn assets() -> Vec<Asset> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let plan: [(&str, SkinTone, ReviewStatus, &str); 8] = [
        ("Hero serum close-up", SkinTone::Fair, ReviewStatus::Approved, ""),
        ("Hero serum close-up", SkinTone::Olive, ReviewStatus::Approved, ""),
        ("Hero serum close-up", SkinTone::Deep, ReviewStatus::Hold, "Warm up the lighting"),
        ("Morning routine reel", SkinTone::Light, ReviewStatus::ToReview, ""),
        ("Morning routine reel", SkinTone::MediumBrown, ReviewStatus::ToReview, ""),
        ("Texture swatch grid", SkinTone::DarkBrown, ReviewStatus::Rejected, "Swatches read too grey"),
        ("Texture swatch grid", SkinTone::All, ReviewStatus::Approved, ""),
        ("Before / after split", SkinTone::Olive, ReviewStatus::ToReview, ""),
    ];

    plan.iter()
        .enumerate()
        .map(|(index, (title, tone, status, notes))| {
            let created = at(index as i64);
            let reviewed = *status != ReviewStatus::ToReview;
            Asset {
                id: format!("asset-seed-{}", index + 1),
                title: (*title).to_string(),
                event_id: "event-spring-glow".into(),
                skin_tone: *tone,
                status: *status,
                uploader: SEED_ACTOR.into(),
                reviewer: reviewed.then(|| "Reviewer".to_string()),
                created_at: created,
                updated_at: if reviewed { created + Duration::hours(24) } else { created },
                version: 1,
                notes_refinement: (*notes).to_string(),
                notes_ideas: String::new(),
                preview_color: pastel(&mut rng),
                media: None,
                file_name: None,
                file_size: None,
            }
        })
        .collect()
}

pub fn text_groups() -> Vec<TextGroup> {
    vec![TextGroup {
        id: "group-spring-copy".into(),
        name: "Spring Glow copy".into(),
        description: "Captions and hooks for the launch.".into(),
        event_id: Some("event-spring-glow".into()),
        created_at: at(0),
        updated_at: at(0),
    }]
}

pub fn text_sections() -> Vec<TextSection> {
    vec![
        TextSection {
            id: "section-spring-hooks".into(),
            name: "Hooks".into(),
            description: "First-line scroll stoppers.".into(),
            group_id: "group-spring-copy".into(),
            created_at: at(0),
            updated_at: at(0),
        },
        TextSection {
            id: "section-spring-captions".into(),
            name: "Captions".into(),
            description: String::new(),
            group_id: "group-spring-copy".into(),
            created_at: at(0),
            updated_at: at(0),
        },
    ]
}

pub fn text_items() -> Vec<TextItem> {
    let item = |n: usize, title: &str, body: &str, section: Option<&str>, status: ReviewStatus| {
        let created = at(n as i64 + 1);
        TextItem {
            id: format!("text-seed-{n}"),
            title: title.into(),
            body: body.into(),
            category: if section == Some("section-spring-hooks") { "prompt" } else { "copy" }.into(),
            status,
            author: SEED_ACTOR.into(),
            reviewer: (status != ReviewStatus::ToReview).then(|| "Reviewer".to_string()),
            created_at: created,
            updated_at: created,
            tags: vec!["spring".into()],
            review_notes: if status == ReviewStatus::Hold {
                "Tighten to under 80 characters".into()
            } else {
                String::new()
            },
            group_id: section.map(|_| "group-spring-copy".to_string()),
            section_id: section.map(str::to_string),
        }
    };

    vec![
        item(1, "Glow check", "Your skin, but on its best day.", Some("section-spring-hooks"), ReviewStatus::Approved),
        item(2, "Three drops", "Three drops. Thirty seconds. All-day glow.", Some("section-spring-hooks"), ReviewStatus::ToReview),
        item(
            3,
            "Launch caption",
            "Meet the serum that works with every shade of you. Available March 3.",
            Some("section-spring-captions"),
            ReviewStatus::Hold,
        ),
        item(4, "Loose idea", "Split-screen of morning vs. evening routines.", None, ReviewStatus::ToReview),
    ]
}

/// CREATED entries for every seeded asset and text item, newest first.
pub fn activity() -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = assets()
        .into_iter()
        .map(|asset| (SubjectType::Asset, asset.id, asset.created_at))
        .chain(
            text_items()
                .into_iter()
                .map(|item| (SubjectType::Text, item.id, item.created_at)),
        )
        .map(|(subject_type, subject_id, timestamp)| ActivityEntry {
            id: format!("activity-seed-{}-{}", subject_type.as_str(), subject_id),
            subject_type,
            subject_id,
            action: ActivityAction::Created,
            actor: SEED_ACTOR.into(),
            timestamp,
            from_status: None,
            to_status: Some(ReviewStatus::ToReview),
            comment: String::new(),
        })
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}
