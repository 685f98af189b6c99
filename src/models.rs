use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    ToReview,
    Approved,
    Hold,
    Rejected,
}

impl ReviewStatus {
    pub const ALL: [ReviewStatus; 4] = [
        ReviewStatus::ToReview,
        ReviewStatus::Approved,
        ReviewStatus::Hold,
        ReviewStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::ToReview => "TO_REVIEW",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Hold => "HOLD",
            ReviewStatus::Rejected => "REJECTED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReviewStatus::ToReview => "To Review",
            ReviewStatus::Approved => "Approved",
            ReviewStatus::Hold => "Hold",
            ReviewStatus::Rejected => "Rejected",
        }
    }

    /// HOLD and REJECTED must explain themselves.
    pub fn requires_notes(self) -> bool {
        matches!(self, ReviewStatus::Hold | ReviewStatus::Rejected)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkinTone {
    Fair,
    Light,
    Olive,
    MediumBrown,
    DarkBrown,
    Deep,
    All,
}

impl SkinTone {
    /// The six concrete tones, excluding `All`.
    pub const TONES: [SkinTone; 6] = [
        SkinTone::Fair,
        SkinTone::Light,
        SkinTone::Olive,
        SkinTone::MediumBrown,
        SkinTone::DarkBrown,
        SkinTone::Deep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkinTone::Fair => "FAIR",
            SkinTone::Light => "LIGHT",
            SkinTone::Olive => "OLIVE",
            SkinTone::MediumBrown => "MEDIUM_BROWN",
            SkinTone::DarkBrown => "DARK_BROWN",
            SkinTone::Deep => "DEEP",
            SkinTone::All => "ALL",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkinTone::Fair => "Fair",
            SkinTone::Light => "Light",
            SkinTone::Olive => "Olive",
            SkinTone::MediumBrown => "Medium Brown",
            SkinTone::DarkBrown => "Dark Brown",
            SkinTone::Deep => "Deep",
            SkinTone::All => "All tones",
        }
    }

    pub fn swatch(self) -> &'static str {
        match self {
            SkinTone::Fair => "#F3D9C8",
            SkinTone::Light => "#E6BC98",
            SkinTone::Olive => "#C99D6E",
            SkinTone::MediumBrown => "#A67449",
            SkinTone::DarkBrown => "#70452A",
            SkinTone::Deep => "#4A2C1D",
            SkinTone::All => "#CBD5E1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStorage {
    /// `data:` URL kept inside the record itself.
    Inline,
    /// Public URL of an object-store upload.
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub storage: MediaStorage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub title: String,
    pub event_id: String,
    pub skin_tone: SkinTone,
    pub status: ReviewStatus,
    pub uploader: String,
    pub reviewer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Informational only; never bumped on edit.
    pub version: i64,
    pub notes_refinement: String,
    pub notes_ideas: String,
    pub preview_color: String,
    pub media: Option<MediaRef>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub status: ReviewStatus,
    pub author: String,
    pub reviewer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub review_notes: String,
    pub group_id: Option<String>,
    pub section_id: Option<String>,
}

impl TextItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_target: u32,
    pub per_tone_target: u32,
    pub tier: u32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Asset,
    Text,
}

impl SubjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectType::Asset => "asset",
            SubjectType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Created,
    StatusChanged,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub action: ActivityAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub from_status: Option<ReviewStatus>,
    pub to_status: Option<ReviewStatus>,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Reviewer,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Creator => "Creator",
            Role::Reviewer => "Reviewer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: Role,
    pub locked: bool,
}

/// One persisted collection: its cache key, API resource and batch body field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Assets,
    Events,
    TextItems,
    TextGroups,
    TextSections,
    Activity,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Assets,
        Collection::Events,
        Collection::TextItems,
        Collection::TextGroups,
        Collection::TextSections,
        Collection::Activity,
    ];

    pub fn cache_key(self) -> &'static str {
        match self {
            Collection::Assets => "reviewdesk.assets",
            Collection::Events => "reviewdesk.events",
            Collection::TextItems => "reviewdesk.text-items",
            Collection::TextGroups => "reviewdesk.text-groups",
            Collection::TextSections => "reviewdesk.text-sections",
            Collection::Activity => "reviewdesk.activity",
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            Collection::Assets => "assets",
            Collection::Events => "events",
            Collection::TextItems => "text-items",
            Collection::TextGroups => "text-groups",
            Collection::TextSections => "text-sections",
            Collection::Activity => "activity",
        }
    }

    /// Field wrapping the record array in batch bodies.
    pub fn body_field(self) -> &'static str {
        match self {
            Collection::Assets => "assets",
            Collection::Events => "events",
            Collection::TextItems => "items",
            Collection::TextGroups => "groups",
            Collection::TextSections => "sections",
            Collection::Activity => "activity",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// A record stored in one of the synchronized collections.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Coerce one untrusted JSON value into a record, or discard it.
    fn from_untrusted(value: &Value) -> Option<Self>;
}

impl Record for Asset {
    const COLLECTION: Collection = Collection::Assets;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::asset(value)
    }
}

impl Record for TextItem {
    const COLLECTION: Collection = Collection::TextItems;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::text_item(value)
    }
}

impl Record for TextGroup {
    const COLLECTION: Collection = Collection::TextGroups;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::text_group(value)
    }
}

impl Record for TextSection {
    const COLLECTION: Collection = Collection::TextSections;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::text_section(value)
    }
}

impl Record for Event {
    const COLLECTION: Collection = Collection::Events;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::event(value)
    }
}

impl Record for ActivityEntry {
    const COLLECTION: Collection = Collection::Activity;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_untrusted(value: &Value) -> Option<Self> {
        normalize::activity_entry(value)
    }
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
