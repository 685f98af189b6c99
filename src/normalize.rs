//! Coercion of untrusted JSON (local cache snapshots, remote responses) into
//! canonical records.
//!
//! Every field is looked up by its camelCase key first, then by its legacy
//! snake_case alias. Records that cannot be repaired are dropped silently:
//! a partial collection is preferred over a failed load.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{
    generate_id, ActivityAction, ActivityEntry, Asset, Event, MediaKind, MediaRef, MediaStorage,
    Record, ReviewStatus, SkinTone, SubjectType, TextGroup, TextItem, TextSection,
};

pub const DEFAULT_TEXT_CATEGORY: &str = "idea";
pub const DEFAULT_TOTAL_TARGET: u32 = 24;
const UNKNOWN_ACTOR: &str = "Unknown";

/// Normalizes a whole collection, preserving input order.
///
/// Non-array input yields an empty collection.
pub fn collection<T: Record>(input: &Value) -> Vec<T> {
    let Some(items) = input.as_array() else {
        if !input.is_null() {
            debug!(collection = %T::COLLECTION, "ignoring non-array collection payload");
        }
        return Vec::new();
    };

    let records: Vec<T> = items.iter().filter_map(T::from_untrusted).collect();
    let dropped = items.len() - records.len();
    if dropped > 0 {
        debug!(collection = %T::COLLECTION, dropped, kept = records.len(), "discarded invalid records");
    }
    records
}

/// Outcome of resolving an enum-valued field.
enum Resolved<T> {
    Missing,
    Valid(T),
    Invalid,
}

impl<T> Resolved<T> {
    /// Missing falls back to `default`; an unmapped value discards the record.
    fn or_default(self, default: T) -> Option<T> {
        match self {
            Resolved::Missing => Some(default),
            Resolved::Valid(value) => Some(value),
            Resolved::Invalid => None,
        }
    }

    fn ok(self) -> Option<T> {
        match self {
            Resolved::Valid(value) => Some(value),
            _ => None,
        }
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    text(obj, keys).unwrap_or_else(|| default.to_string())
}

/// Trimmed, non-empty string or `None`.
fn non_empty(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    text(obj, keys)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn record_id(obj: &Map<String, Value>) -> String {
    non_empty(obj, &["id"]).unwrap_or_else(generate_id)
}

fn fold_enum_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

pub fn parse_status(raw: &str) -> Option<ReviewStatus> {
    match fold_enum_key(raw).as_str() {
        "TO_REVIEW" | "TOREVIEW" | "PENDING" | "IN_REVIEW" | "NEW" => Some(ReviewStatus::ToReview),
        "APPROVED" | "APPROVE" => Some(ReviewStatus::Approved),
        "HOLD" | "ON_HOLD" => Some(ReviewStatus::Hold),
        "REJECTED" | "REJECT" | "DECLINED" => Some(ReviewStatus::Rejected),
        _ => None,
    }
}

pub fn parse_tone(raw: &str) -> Option<SkinTone> {
    match fold_enum_key(raw).as_str() {
        "FAIR" => Some(SkinTone::Fair),
        "LIGHT" => Some(SkinTone::Light),
        "OLIVE" => Some(SkinTone::Olive),
        "MEDIUM_BROWN" | "MEDIUMBROWN" | "MEDIUM" => Some(SkinTone::MediumBrown),
        "DARK_BROWN" | "DARKBROWN" => Some(SkinTone::DarkBrown),
        "DEEP" | "DARK" => Some(SkinTone::Deep),
        "ALL" | "ALL_TONES" | "ANY" => Some(SkinTone::All),
        _ => None,
    }
}

fn resolve_with<T>(
    obj: &Map<String, Value>,
    keys: &[&str],
    parse: impl Fn(&str) -> Option<T>,
) -> Resolved<T> {
    match field(obj, keys) {
        None => Resolved::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => Resolved::Missing,
        Some(Value::String(s)) => parse(s).map_or(Resolved::Invalid, Resolved::Valid),
        Some(_) => Resolved::Invalid,
    }
}

fn status(obj: &Map<String, Value>) -> Option<ReviewStatus> {
    resolve_with(obj, &["status"], parse_status).or_default(ReviewStatus::ToReview)
}

fn optional_status(obj: &Map<String, Value>, keys: &[&str]) -> Option<ReviewStatus> {
    resolve_with(obj, keys, parse_status).ok()
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    field(obj, keys).and_then(parse_timestamp)
}

fn created_and_updated(obj: &Map<String, Value>) -> (DateTime<Utc>, DateTime<Utc>) {
    let created = timestamp(obj, &["createdAt", "created_at"]).unwrap_or_else(Utc::now);
    let updated = timestamp(obj, &["updatedAt", "updated_at"]).unwrap_or(created);
    (created, updated)
}

fn date(obj: &Map<String, Value>, keys: &[&str]) -> Option<NaiveDate> {
    let raw = non_empty(obj, keys)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

fn integer(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    match field(obj, keys)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    integer(obj, keys)
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
}

/// Trimmed tags, de-duplicated case-insensitively (first spelling wins).
/// Accepts an array or a comma-separated string.
pub fn tags_from(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    clean_tags(raw)
}

pub fn clean_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || tags.iter().any(|t| t.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        tags.push(trimmed.to_string());
    }
    tags
}

pub fn media_kind_for(url: &str, file_name: Option<&str>) -> MediaKind {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("data:video/") {
        return MediaKind::Video;
    }
    if lower.starts_with("data:") {
        return MediaKind::Image;
    }
    let guess = file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .or_else(|| mime_guess::from_path(lower.split('?').next().unwrap_or_default()).first());
    match guess {
        Some(mime) if mime.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
        _ => MediaKind::Image,
    }
}

fn media(obj: &Map<String, Value>, file_name: Option<&str>) -> Option<MediaRef> {
    let nested = field(obj, &["media"]).and_then(Value::as_object);
    let (url, kind, storage) = match nested {
        Some(media) => (
            non_empty(media, &["url"]),
            non_empty(media, &["type", "kind"]),
            non_empty(media, &["storage", "storageMode", "storage_mode"]),
        ),
        None => (
            non_empty(obj, &["mediaUrl", "media_url", "url"]),
            non_empty(obj, &["mediaType", "media_type"]),
            non_empty(obj, &["storageMode", "storage_mode"]),
        ),
    };
    let url = url?;

    let kind = match kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("video") => MediaKind::Video,
        Some(k) if k.starts_with("video/") => MediaKind::Video,
        Some("image") => MediaKind::Image,
        Some(k) if k.starts_with("image/") => MediaKind::Image,
        _ => media_kind_for(&url, file_name),
    };

    let storage = match storage.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("inline") | Some("data-url") | Some("dataurl") | Some("local") => MediaStorage::Inline,
        Some("object") | Some("remote") | Some("s3") | Some("url") => MediaStorage::Object,
        _ if url.starts_with("data:") => MediaStorage::Inline,
        _ => MediaStorage::Object,
    };

    Some(MediaRef { url, kind, storage })
}

pub fn asset(value: &Value) -> Option<Asset> {
    let obj = value.as_object()?;

    let event_id = non_empty(obj, &["eventId", "event_id"])?;
    let status = status(obj)?;
    let skin_tone =
        resolve_with(obj, &["skinTone", "skin_tone", "tone"], parse_tone).or_default(SkinTone::All)?;

    let file_name = non_empty(obj, &["fileName", "file_name"]);
    let (created_at, updated_at) = created_and_updated(obj);
    let title = non_empty(obj, &["title"])
        .or_else(|| file_name.clone())
        .unwrap_or_else(|| "Untitled asset".to_string());

    Some(Asset {
        id: record_id(obj),
        title,
        event_id,
        skin_tone,
        status,
        uploader: non_empty(obj, &["uploader", "uploaded_by", "uploadedBy"])
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string()),
        reviewer: non_empty(obj, &["reviewer", "reviewed_by", "reviewedBy"]),
        created_at,
        updated_at,
        version: integer(obj, &["version"]).unwrap_or(1),
        notes_refinement: text_or(obj, &["notesRefinement", "notes_refinement"], ""),
        notes_ideas: text_or(obj, &["notesIdeas", "notes_ideas"], ""),
        preview_color: non_empty(obj, &["previewColor", "preview_color"])
            .unwrap_or_else(|| skin_tone.swatch().to_string()),
        media: media(obj, file_name.as_deref()),
        file_size: integer(obj, &["fileSize", "file_size"]).and_then(|size| u64::try_from(size).ok()),
        file_name,
    })
}

pub fn text_item(value: &Value) -> Option<TextItem> {
    let obj = value.as_object()?;

    let title = text_or(obj, &["title"], "").trim().to_string();
    let body = text_or(obj, &["body", "content"], "");
    if title.is_empty() && body.trim().is_empty() {
        return None;
    }

    let status = status(obj)?;
    let (created_at, updated_at) = created_and_updated(obj);

    Some(TextItem {
        id: record_id(obj),
        title,
        body,
        category: non_empty(obj, &["category"])
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| DEFAULT_TEXT_CATEGORY.to_string()),
        status,
        author: non_empty(obj, &["author", "created_by", "createdBy"])
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string()),
        reviewer: non_empty(obj, &["reviewer", "reviewed_by", "reviewedBy"]),
        created_at,
        updated_at,
        tags: tags_from(field(obj, &["tags"])),
        review_notes: text_or(obj, &["reviewNotes", "review_notes"], ""),
        group_id: non_empty(obj, &["groupId", "group_id"]),
        section_id: non_empty(obj, &["sectionId", "section_id"]),
    })
}

pub fn text_group(value: &Value) -> Option<TextGroup> {
    let obj = value.as_object()?;
    let name = non_empty(obj, &["name"])?;
    let (created_at, updated_at) = created_and_updated(obj);

    Some(TextGroup {
        id: record_id(obj),
        name,
        description: text_or(obj, &["description"], ""),
        event_id: non_empty(obj, &["eventId", "event_id"]),
        created_at,
        updated_at,
    })
}

pub fn text_section(value: &Value) -> Option<TextSection> {
    let obj = value.as_object()?;
    let name = non_empty(obj, &["name"])?;
    let group_id = non_empty(obj, &["groupId", "group_id"])?;
    let (created_at, updated_at) = created_and_updated(obj);

    Some(TextSection {
        id: record_id(obj),
        name,
        description: text_or(obj, &["description"], ""),
        group_id,
        created_at,
        updated_at,
    })
}

pub fn default_per_tone_target(total_target: u32) -> u32 {
    let tones = SkinTone::TONES.len() as u32;
    total_target.div_ceil(tones).max(1)
}

pub fn event(value: &Value) -> Option<Event> {
    let obj = value.as_object()?;
    let name = non_empty(obj, &["name"])?;
    let start_date = date(obj, &["startDate", "start_date"])?;
    let total_target = positive(obj, &["totalTarget", "total_target"]).unwrap_or(DEFAULT_TOTAL_TARGET);

    Some(Event {
        id: record_id(obj),
        name,
        start_date,
        end_date: date(obj, &["endDate", "end_date"]),
        total_target,
        per_tone_target: positive(obj, &["perToneTarget", "per_tone_target"])
            .unwrap_or_else(|| default_per_tone_target(total_target)),
        tier: positive(obj, &["tier"]).unwrap_or(1),
        description: text_or(obj, &["description"], ""),
    })
}

fn subject_type(raw: &str) -> Option<SubjectType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asset" | "assets" => Some(SubjectType::Asset),
        "text" | "text_item" | "text-item" | "textitem" => Some(SubjectType::Text),
        _ => None,
    }
}

fn action(raw: &str) -> Option<ActivityAction> {
    match fold_enum_key(raw).as_str() {
        "CREATED" | "CREATE" => Some(ActivityAction::Created),
        "STATUS_CHANGED" | "STATUS_CHANGE" | "STATUS" => Some(ActivityAction::StatusChanged),
        "COMMENT" | "COMMENTED" => Some(ActivityAction::Comment),
        _ => None,
    }
}

pub fn activity_entry(value: &Value) -> Option<ActivityEntry> {
    let obj = value.as_object()?;
    let subject_type = subject_type(&non_empty(obj, &["subjectType", "subject_type"])?)?;
    let subject_id = non_empty(obj, &["subjectId", "subject_id"])?;
    let action = action(&non_empty(obj, &["action"])?)?;

    Some(ActivityEntry {
        id: record_id(obj),
        subject_type,
        subject_id,
        action,
        actor: non_empty(obj, &["actor"]).unwrap_or_else(|| UNKNOWN_ACTOR.to_string()),
        timestamp: timestamp(obj, &["timestamp", "createdAt", "created_at"]).unwrap_or_else(Utc::now),
        from_status: optional_status(obj, &["fromStatus", "from_status"]),
        to_status: optional_status(obj, &["toStatus", "to_status"]),
        comment: text_or(obj, &["comment"], ""),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn non_array_input_is_empty() {
        assert!(collection::<Asset>(&json!({"assets": []})).is_empty());
        assert!(collection::<TextItem>(&Value::Null).is_empty());
        assert!(collection::<Event>(&json!("events")).is_empty());
    }

    #[test]
    fn legacy_asset_matches_canonical_asset() {
        let canonical = json!([{
            "id": "a-1",
            "title": "Poster",
            "eventId": "ev-1",
            "skinTone": "DARK_BROWN",
            "status": "APPROVED",
            "uploader": "Mia",
            "reviewer": "Lee",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-02T10:00:00Z",
            "version": 1,
            "notesRefinement": "",
            "notesIdeas": "",
            "previewColor": "#70452A",
            "media": null,
            "fileName": null,
            "fileSize": null
        }]);
        let legacy = json!([{
            "id": "a-1",
            "title": "Poster",
            "event_id": "ev-1",
            "skin_tone": "dark-brown",
            "status": "Approved",
            "uploaded_by": "Mia",
            "reviewed_by": "Lee",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-02T10:00:00Z",
            "preview_color": "#70452A"
        }]);

        let a: Vec<Asset> = collection(&canonical);
        let b: Vec<Asset> = collection(&legacy);
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn normalizing_canonical_output_is_identity() {
        let input = json!([
            {
                "title": "Teaser",
                "event_id": "ev-2",
                "tone": "Medium",
                "status": "On Hold",
                "notes_refinement": "shorten",
                "media_url": "https://cdn.example.com/teaser.mp4",
                "file_name": "teaser.mp4",
                "file_size": 2048
            },
            {
                "title": "Caption",
                "body": "Bring the glow",
                "status": "to review",
                "tags": "Glow, summer, glow",
                "group_id": "g-1"
            }
        ]);

        let assets: Vec<Asset> = collection(&input);
        let round: Vec<Asset> = collection(&serde_json::to_value(&assets).unwrap());
        assert_eq!(assets, round);
        assert_eq!(assets[0].skin_tone, SkinTone::MediumBrown);
        assert_eq!(assets[0].status, ReviewStatus::Hold);
        let media = assets[0].media.as_ref().unwrap();
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.storage, MediaStorage::Object);

        let items: Vec<TextItem> = collection(&input);
        let round: Vec<TextItem> = collection(&serde_json::to_value(&items).unwrap());
        assert_eq!(items, round);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].tags, vec!["Glow", "summer"]);
    }

    #[test]
    fn invalid_records_are_discarded() {
        let input = json!([
            "not an object",
            42,
            { "eventId": "ev-1", "status": "maybe" },
            { "eventId": "ev-1", "skinTone": "purple" },
            { "status": "APPROVED" },
            { "eventId": "", "status": "APPROVED" },
            { "eventId": "ev-1" }
        ]);

        let assets: Vec<Asset> = collection(&input);
        assert_eq!(assets.len(), 1);
        assert!(assets.len() <= input.as_array().unwrap().len());
        for asset in &assets {
            assert!(!asset.event_id.is_empty());
            assert!(ReviewStatus::ALL.contains(&asset.status));
        }
        assert_eq!(assets[0].status, ReviewStatus::ToReview);
        assert_eq!(assets[0].skin_tone, SkinTone::All);
        assert!(!assets[0].id.is_empty());
    }

    #[test]
    fn text_items_need_title_or_body() {
        let input = json!([
            { "title": "", "body": "   " },
            { "title": "Only title" },
            { "body": "Only body" },
            { "title": "Bad", "status": "archived" }
        ]);
        let items: Vec<TextItem> = collection(&input);
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|item| !item.title.is_empty() || !item.body.trim().is_empty()));
    }

    #[test]
    fn sections_require_group_and_events_require_start_date() {
        let sections: Vec<TextSection> = collection(&json!([
            { "name": "Hooks" },
            { "name": "Hooks", "group_id": "g-1" }
        ]));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].group_id, "g-1");

        let events: Vec<Event> = collection(&json!([
            { "name": "Launch" },
            { "name": "Launch", "start_date": "2024-05-01", "total_target": "30" },
            { "name": "Promo", "startDate": "2024-06-01", "totalTarget": -3 }
        ]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].total_target, 30);
        assert_eq!(events[0].per_tone_target, 5);
        assert_eq!(events[1].total_target, DEFAULT_TOTAL_TARGET);
    }

    #[test]
    fn activity_accepts_legacy_spellings() {
        let entries: Vec<ActivityEntry> = collection(&json!([
            {
                "subject_type": "asset",
                "subject_id": "a-1",
                "action": "status-changed",
                "from_status": "To Review",
                "to_status": "hold",
                "created_at": 1_700_000_000_000i64
            },
            { "subjectType": "video", "subjectId": "x", "action": "CREATED" }
        ]));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::StatusChanged);
        assert_eq!(entries[0].from_status, Some(ReviewStatus::ToReview));
        assert_eq!(entries[0].to_status, Some(ReviewStatus::Hold));
        assert_eq!(entries[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }
}
