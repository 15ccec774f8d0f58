//! Declarative contact filter and its in-memory evaluation
//!
//! The same `FilterConfig` compiles to SQL (`segment::sql`) on the relational
//! path and is evaluated here on the document path. Interaction-derived
//! predicates need interaction data and are skipped on the document path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{StoreError, StoreResult, ValidationCode};
use crate::support::SupportCategory;
use crate::types::{Contact, EnrichedContact};

const MAX_POLL_NUMBER_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Overlap: any listed tag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Tag set membership OR legacy single-category equality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_support_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_support_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_category: Option<SupportCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_interactions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_before: Option<DateTime<Utc>>,
    /// Static list membership; bypasses every other predicate
    #[serde(
        rename = "_staticContactIds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub static_contact_ids: Option<Vec<String>>,
    #[serde(rename = "_isStatic", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_valid_poll_number(poll: &str) -> bool {
    !poll.is_empty()
        && poll.len() <= MAX_POLL_NUMBER_LEN
        && poll
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub(crate) fn validate_poll_number(poll: &str) -> StoreResult<()> {
    if is_valid_poll_number(poll) {
        Ok(())
    } else {
        Err(StoreError::validation(
            ValidationCode::InvalidPollNumber,
            format!(
                "poll number '{}' must be 1-{} letters, digits, '_' or '-'",
                poll, MAX_POLL_NUMBER_LEN
            ),
        ))
    }
}

fn validate_score(field: &str, score: Option<i64>) -> StoreResult<()> {
    match score {
        Some(s) if !(0..=100).contains(&s) => Err(StoreError::validation(
            ValidationCode::InvalidSupportScore,
            format!("{} must be between 0 and 100, got {}", field, s),
        )),
        _ => Ok(()),
    }
}

impl FilterConfig {
    /// Parse a stored/submitted JSON filter; shape errors become validation errors
    pub fn from_json(value: serde_json::Value) -> StoreResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            StoreError::validation(
                ValidationCode::InvalidFilterConfig,
                format!("malformed filter config: {}", e),
            )
        })
    }

    /// Static list over exactly `ids`
    pub fn static_ids(ids: Vec<String>) -> Self {
        Self {
            static_contact_ids: Some(ids),
            is_static: true,
            ..Default::default()
        }
    }

    /// Explicit id set when this filter is a static list
    pub fn static_contact_ids(&self) -> Option<&[String]> {
        match &self.static_contact_ids {
            Some(ids) if self.is_static || !ids.is_empty() => Some(ids.as_slice()),
            _ => None,
        }
    }

    /// Trim strings, drop blanks, upper-case province
    pub fn sanitized(&self) -> Self {
        Self {
            poll_number: clean(&self.poll_number),
            riding: clean(&self.riding),
            province: clean(&self.province).map(|p| p.to_uppercase()),
            city: clean(&self.city),
            categories: self.categories.iter().map(|c| c.trim().to_string()).collect(),
            category: clean(&self.category),
            min_support_score: self.min_support_score,
            max_support_score: self.max_support_score,
            support_category: self.support_category,
            has_interactions: self.has_interactions,
            last_interaction_after: self.last_interaction_after,
            last_interaction_before: self.last_interaction_before,
            static_contact_ids: self
                .static_contact_ids
                .as_ref()
                .map(|ids| ids.iter().map(|id| id.trim().to_string()).collect()),
            is_static: self.is_static,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if let Some(poll) = &self.poll_number {
            validate_poll_number(poll)?;
        }

        validate_score("minSupportScore", self.min_support_score)?;
        validate_score("maxSupportScore", self.max_support_score)?;
        if let (Some(min), Some(max)) = (self.min_support_score, self.max_support_score) {
            if min > max {
                return Err(StoreError::validation(
                    ValidationCode::InvalidSupportScore,
                    format!("minSupportScore {} exceeds maxSupportScore {}", min, max),
                ));
            }
        }

        if self.support_category == Some(SupportCategory::Unknown) {
            return Err(StoreError::validation(
                ValidationCode::InvalidSupportCategory,
                "supportCategory must be one of the five scored buckets",
            ));
        }

        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(StoreError::validation(
                ValidationCode::InvalidCategory,
                "categories must not contain blank tags",
            ));
        }

        if let (Some(after), Some(before)) = (self.last_interaction_after, self.last_interaction_before) {
            if after > before {
                return Err(StoreError::validation(
                    ValidationCode::InvalidDateRange,
                    "lastInteractionAfter is later than lastInteractionBefore",
                ));
            }
        }

        if let Some(ids) = &self.static_contact_ids {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(StoreError::validation(
                    ValidationCode::InvalidContactId,
                    "static contact ids must not be blank",
                ));
            }
        }

        Ok(())
    }

    /// Sanitize then validate
    pub fn prepare(&self) -> StoreResult<Self> {
        let sanitized = self.sanitized();
        sanitized.validate()?;
        Ok(sanitized)
    }

    /// Names of the set predicates that need interaction data
    pub fn interaction_predicates(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.min_support_score.is_some() {
            names.push("minSupportScore");
        }
        if self.max_support_score.is_some() {
            names.push("maxSupportScore");
        }
        if self.support_category.is_some() {
            names.push("supportCategory");
        }
        if self.has_interactions.is_some() {
            names.push("hasInteractions");
        }
        if self.last_interaction_after.is_some() {
            names.push("lastInteractionAfter");
        }
        if self.last_interaction_before.is_some() {
            names.push("lastInteractionBefore");
        }
        names
    }

    /// Structural predicates only (document path)
    pub fn matches_contact(&self, contact: &Contact) -> bool {
        if contact.is_deleted() {
            return false;
        }
        if let Some(ids) = self.static_contact_ids() {
            return ids.iter().any(|id| *id == contact.id);
        }

        let eq = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            Some(w) => actual.as_deref() == Some(w.as_str()),
            None => true,
        };
        if !eq(&self.poll_number, &contact.poll_number)
            || !eq(&self.riding, &contact.riding)
            || !eq(&self.province, &contact.province)
        {
            return false;
        }

        if let Some(city) = &self.city {
            match &contact.city {
                Some(c) if c.eq_ignore_ascii_case(city) => {}
                _ => return false,
            }
        }

        if !self.categories.is_empty()
            && !self.categories.iter().any(|tag| contact.categories.contains(tag))
        {
            return false;
        }

        if let Some(category) = &self.category {
            let in_tags = contact.categories.iter().any(|c| c == category);
            let legacy = contact.category.as_deref() == Some(category.as_str());
            if !in_tags && !legacy {
                return false;
            }
        }

        true
    }
}

/// Result ordering for filter queries; ties always break on contact id ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// support_score desc, nulls last
    SupportScore,
    /// last_interaction_at desc, nulls last
    LastInteraction,
    /// name asc
    Name,
    /// created_at desc
    #[default]
    CreatedAt,
}

impl OrderBy {
    pub fn parse(value: &str) -> Self {
        match value {
            "support_score" | "score" => OrderBy::SupportScore,
            "last_interaction" => OrderBy::LastInteraction,
            "name" => OrderBy::Name,
            _ => OrderBy::CreatedAt,
        }
    }
}

/// Pagination and ordering for `getContactsByFilters`
#[derive(Debug, Clone, Default)]
pub struct ContactQuery {
    /// `None` uses the configured default page size
    pub limit: Option<usize>,
    pub offset: usize,
    pub order_by: OrderBy,
}

impl ContactQuery {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
            ..Default::default()
        }
    }

    /// Every matching contact in one page
    pub fn unbounded() -> Self {
        Self::page(usize::MAX, 0)
    }

    pub fn ordered_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn resolved_limit(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }
}

fn desc_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// In-memory ordering matching the relational ORDER BY
pub fn sort_contacts(contacts: &mut [EnrichedContact], order_by: OrderBy) {
    contacts.sort_by(|a, b| {
        let primary = match order_by {
            OrderBy::SupportScore => desc_nulls_last(&a.support_score, &b.support_score),
            OrderBy::LastInteraction => {
                desc_nulls_last(&a.last_interaction_at, &b.last_interaction_at)
            }
            OrderBy::Name => a.contact.sort_name().cmp(&b.contact.sort_name()),
            OrderBy::CreatedAt => b.contact.created_at.cmp(&a.contact.created_at),
        };
        primary.then_with(|| a.contact.id.cmp(&b.contact.id))
    });
}
