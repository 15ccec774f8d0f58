//! Core data structures shared by both backends
//!
//! Contacts keep the camelCase shape of the CRM export; the election records
//! (vote marks, turnout, lists, voted entries, interactions) keep the
//! snake_case shape of their stored rows.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::segment::FilterConfig;

/// Voter / person record owned by one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub poll_number: Option<String>,
    #[serde(default)]
    pub riding: Option<String>,
    /// Ordered tag set
    #[serde(default)]
    pub categories: Vec<String>,
    /// Legacy single-category field, still honoured by the `category` filter
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
    /// CRM exports may carry `null` or omit it; both read as the epoch
    #[serde(default = "epoch", deserialize_with = "null_as_epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Legacy soft-delete flag from older CRM exports
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn null_as_epoch<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(epoch))
}

impl Contact {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            name: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            province: None,
            postal_code: None,
            poll_number: None,
            riding: None,
            categories: Vec::new(),
            category: None,
            custom_fields: Map::new(),
            created_at,
            updated_at: None,
            deleted_at: None,
            deleted: false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted || self.deleted_at.is_some()
    }

    /// Deletion time to persist; a bare `deleted` flag falls back to the last known timestamp
    pub fn deletion_time(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
            .or_else(|| self.deleted.then(|| self.updated_at.unwrap_or(self.created_at)))
    }

    /// Sort key for name ordering: `name`, else "first last" trimmed
    pub fn sort_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{} {}",
                self.first_name.as_deref().unwrap_or(""),
                self.last_name.as_deref().unwrap_or("")
            )
            .trim()
            .to_string(),
        }
    }
}

/// Contact plus interaction aggregates, as returned by filter queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContact {
    #[serde(flatten)]
    pub contact: Contact,
    pub support_score: Option<i64>,
    pub interaction_count: i64,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl EnrichedContact {
    /// Document-path enrichment: no interaction data exists outside the relational store
    pub fn without_interactions(contact: Contact) -> Self {
        Self {
            contact,
            support_score: None,
            interaction_count: 0,
            last_interaction_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    DoorKnock,
    PhoneCall,
    TextMessage,
    Email,
    Event,
    Mailer,
    SocialMedia,
    Other,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::DoorKnock => "door_knock",
            InteractionType::PhoneCall => "phone_call",
            InteractionType::TextMessage => "text_message",
            InteractionType::Email => "email",
            InteractionType::Event => "event",
            InteractionType::Mailer => "mailer",
            InteractionType::SocialMedia => "social_media",
            InteractionType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "door_knock" => Some(InteractionType::DoorKnock),
            "phone_call" => Some(InteractionType::PhoneCall),
            "text_message" => Some(InteractionType::TextMessage),
            "email" => Some(InteractionType::Email),
            "event" => Some(InteractionType::Event),
            "mailer" => Some(InteractionType::Mailer),
            "social_media" => Some(InteractionType::SocialMedia),
            "other" => Some(InteractionType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMethod {
    InPerson,
    Phone,
    Email,
    Text,
    Mail,
    Online,
    Other,
}

impl InteractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMethod::InPerson => "in_person",
            InteractionMethod::Phone => "phone",
            InteractionMethod::Email => "email",
            InteractionMethod::Text => "text",
            InteractionMethod::Mail => "mail",
            InteractionMethod::Online => "online",
            InteractionMethod::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_person" => Some(InteractionMethod::InPerson),
            "phone" => Some(InteractionMethod::Phone),
            "email" => Some(InteractionMethod::Email),
            "text" => Some(InteractionMethod::Text),
            "mail" => Some(InteractionMethod::Mail),
            "online" => Some(InteractionMethod::Online),
            "other" => Some(InteractionMethod::Other),
            _ => None,
        }
    }
}

/// Immutable canvassing interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub account_id: String,
    pub contact_id: String,
    pub user_id: Option<String>,
    pub interaction_type: InteractionType,
    pub interaction_method: InteractionMethod,
    pub support_likelihood: Option<i64>,
    pub notes: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub account_id: String,
    pub contact_id: String,
    pub user_id: Option<String>,
    pub interaction_type: InteractionType,
    pub interaction_method: InteractionMethod,
    pub support_likelihood: Option<i64>,
    pub notes: Option<String>,
    pub metadata: Value,
}

/// Immutable audit record of one "voter has voted" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteMark {
    pub id: String,
    pub account_id: String,
    pub contact_id: String,
    pub poll_number: String,
    pub riding: Option<String>,
    pub province: Option<String>,
    pub marked_by: Option<String>,
    pub verification_code: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub marked_at: DateTime<Utc>,
}

/// Input to `markVote`
#[derive(Debug, Clone, Default)]
pub struct MarkVoteRequest {
    pub account_id: String,
    pub contact_id: String,
    pub poll_number: String,
    pub riding: Option<String>,
    pub province: Option<String>,
    pub marked_by: Option<String>,
    pub verification_code: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<Value>,
}

/// Turnout aggregate key; absent riding/province compare equal to each other
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollKey {
    pub poll_number: String,
    pub riding: Option<String>,
    pub province: Option<String>,
}

impl PollKey {
    pub fn new(poll_number: impl Into<String>, riding: Option<&str>, province: Option<&str>) -> Self {
        Self {
            poll_number: poll_number.into(),
            riding: riding.filter(|s| !s.is_empty()).map(str::to_string),
            province: province.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    pub fn riding_or_empty(&self) -> &str {
        self.riding.as_deref().unwrap_or("")
    }

    pub fn province_or_empty(&self) -> &str {
        self.province.as_deref().unwrap_or("")
    }

    /// Partial match used by poll lookups: absent riding/province match anything
    pub fn matches(&self, poll_number: &str, riding: Option<&str>, province: Option<&str>) -> bool {
        self.poll_number == poll_number
            && riding.map_or(true, |r| self.riding.as_deref() == Some(r))
            && province.map_or(true, |p| self.province.as_deref() == Some(p))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollTurnout {
    pub account_id: String,
    pub poll_number: String,
    pub riding: Option<String>,
    pub province: Option<String>,
    pub total_voters: i64,
    pub votes_cast: i64,
    pub updated_by: Option<String>,
    pub last_updated_at: DateTime<Utc>,
}

impl PollTurnout {
    pub fn key(&self) -> PollKey {
        PollKey::new(
            self.poll_number.clone(),
            self.riding.as_deref(),
            self.province.as_deref(),
        )
    }
}

/// Saved view: named filter config or static id set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionList {
    pub id: String,
    pub account_id: String,
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub filter_config: FilterConfig,
    pub is_shared: bool,
    /// Stale-tolerant cache, refreshed only on save or explicit refresh
    pub contact_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input to `saveList`
#[derive(Debug, Clone, Default)]
pub struct ListDraft {
    pub id: Option<String>,
    pub account_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub filter_config: FilterConfig,
    pub contact_ids: Option<Vec<String>>,
    pub is_shared: bool,
}

/// Mutable "voted" flag for the live running tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotedEntry {
    pub account_id: String,
    pub contact_id: String,
    pub voted_at: DateTime<Utc>,
    pub marked_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: usize, offset: usize) -> Self {
        let has_more = ((offset + items.len()) as i64) < total;
        Self {
            items,
            total,
            limit,
            offset,
            has_more,
        }
    }

    /// Slice an already-ordered full result set
    pub fn from_ordered(all: Vec<T>, limit: usize, offset: usize) -> Self {
        let total = all.len() as i64;
        let items: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
        Self::new(items, total, limit, offset)
    }
}

/// Current time truncated to the millisecond precision both stores persist
pub fn now() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

pub fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
