use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::timestamp::{self, canonical, canonical_opt, DateInput};

// =============================================================================
// Collections
// =============================================================================

/// Top-level collection paths in the store.
pub mod collections {
    pub const USERS: &str = "users";
    pub const EMPLOYEES: &str = "employees";
    pub const GOALS: &str = "goals";
    pub const FEEDBACKS: &str = "feedbacks";
    pub const METRICS: &str = "performanceMetrics";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const ADMIN_RATINGS: &str = "adminRatings";
}

// =============================================================================
// Enums
// =============================================================================

/// Category of a notification, stored in the record's `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Feedback,
    Goal,
    Review,
    Request,
    System,
    Rating,
}

impl NotificationKind {
    /// The kinds that predate leadership ratings, in display order.
    pub const CLASSIC: [NotificationKind; 5] = [
        NotificationKind::Feedback,
        NotificationKind::Goal,
        NotificationKind::Review,
        NotificationKind::Request,
        NotificationKind::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Feedback => "feedback",
            NotificationKind::Goal => "goal",
            NotificationKind::Review => "review",
            NotificationKind::Request => "request",
            NotificationKind::System => "system",
            NotificationKind::Rating => "rating",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stored records
// =============================================================================

/// An authenticated account. Keyed by the auth provider's user id rather
/// than a generated key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    /// Back-reference to the linked account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "canonical_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "canonical_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub employee_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(with = "canonical")]
    pub target_date: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// Whether this record asks admins for feedback rather than giving it.
    pub fn is_request(&self, prefix: &str) -> bool {
        self.category.starts_with(prefix)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub id: String,
    pub employee_id: String,
    pub metric: String,
    pub value: f64,
    #[serde(with = "canonical")]
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// The single recipient.
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_item_type: Option<String>,
}

/// An employee's rating of an admin's leadership.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRating {
    pub id: String,
    pub admin_id: String,
    pub employee_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(with = "canonical")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Creation payloads
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct NewEmployee {
    pub user_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub created_at: DateInput,
    pub updated_at: DateInput,
}

impl NewEmployee {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<Employee> {
        Ok(Employee {
            id,
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            department: self.department,
            position: self.position,
            created_at: Some(self.created_at.normalize(now)?),
            updated_at: Some(self.updated_at.normalize(now)?),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewGoal {
    pub employee_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub target_date: DateInput,
    pub created_at: DateInput,
    pub updated_at: DateInput,
}

impl NewGoal {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<Goal> {
        Ok(Goal {
            id,
            employee_id: self.employee_id,
            title: self.title,
            description: self.description,
            status: self.status,
            progress: self.progress,
            target_date: self.target_date.normalize(now)?,
            created_at: self.created_at.normalize(now)?,
            updated_at: self.updated_at.normalize(now)?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewFeedback {
    pub employee_id: Option<String>,
    pub category: String,
    pub content: Option<String>,
    pub rating: Option<f64>,
    pub reviewer_id: Option<String>,
    pub reviewer_name: Option<String>,
    pub requested_by: Option<String>,
    pub created_at: DateInput,
}

impl NewFeedback {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<Feedback> {
        Ok(Feedback {
            id,
            employee_id: self.employee_id,
            category: self.category,
            content: self.content,
            rating: self.rating,
            reviewer_id: self.reviewer_id,
            reviewer_name: self.reviewer_name,
            requested_by: self.requested_by,
            created_at: self.created_at.normalize(now)?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewMetric {
    pub employee_id: String,
    pub metric: String,
    pub value: f64,
    pub date: DateInput,
}

impl NewMetric {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<PerformanceMetric> {
        Ok(PerformanceMetric {
            id,
            employee_id: self.employee_id,
            metric: self.metric,
            value: self.value,
            date: self.date.normalize(now)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateInput,
    pub related_item_id: Option<String>,
    pub related_item_type: Option<String>,
}

impl NewNotification {
    /// An unread notification stamped at creation time.
    pub fn unread(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            kind,
            read: false,
            created_at: DateInput::Absent,
            related_item_id: None,
            related_item_type: None,
        }
    }

    pub fn related_to(mut self, item_id: impl Into<String>, item_type: impl Into<String>) -> Self {
        self.related_item_id = Some(item_id.into());
        self.related_item_type = Some(item_type.into());
        self
    }

    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<Notification> {
        Ok(Notification {
            id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            read: self.read,
            created_at: self.created_at.normalize(now)?,
            related_item_id: self.related_item_id,
            related_item_type: self.related_item_type,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewAdminRating {
    pub admin_id: String,
    pub employee_id: String,
    pub rating: Option<f64>,
    pub comment: Option<String>,
    pub created_at: DateInput,
}

impl NewAdminRating {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> Result<AdminRating> {
        Ok(AdminRating {
            id,
            admin_id: self.admin_id,
            employee_id: self.employee_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at.normalize(now)?,
        })
    }
}

// =============================================================================
// Partial updates
// =============================================================================

/// Merge payload for an employee. `updatedAt` is always stamped.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl EmployeeUpdate {
    pub fn into_partial(self, now: DateTime<Utc>) -> Result<Map<String, Value>> {
        let mut partial = to_map(&self)?;
        partial.insert("updatedAt".into(), Value::String(timestamp::format(&now)));
        Ok(partial)
    }
}

/// Merge payload for a goal. A supplied `target_date` is normalized and
/// `updatedAt` is always stamped.
#[derive(Clone, Debug, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub target_date: Option<DateInput>,
}

impl GoalUpdate {
    pub fn into_partial(self, now: DateTime<Utc>) -> Result<Map<String, Value>> {
        let mut partial = Map::new();
        if let Some(title) = self.title {
            partial.insert("title".into(), Value::String(title));
        }
        if let Some(description) = self.description {
            partial.insert("description".into(), Value::String(description));
        }
        if let Some(status) = self.status {
            partial.insert("status".into(), Value::String(status));
        }
        if let Some(progress) = self.progress {
            partial.insert("progress".into(), serde_json::to_value(progress)?);
        }
        match self.target_date {
            Some(input) if !input.is_absent() => {
                let target = input.normalize(now)?;
                partial.insert("targetDate".into(), Value::String(timestamp::format(&target)));
            }
            _ => {}
        }
        partial.insert("updatedAt".into(), Value::String(timestamp::format(&now)));
        Ok(partial)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
}

impl FeedbackUpdate {
    pub fn into_partial(self) -> Result<Map<String, Value>> {
        to_map(&self)
    }
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::error::PerfdeskError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}
