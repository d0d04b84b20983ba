//! Sample notifications for trying out a fresh account.

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use perfdesk_core::types::{NewNotification, Notification, NotificationKind};
use perfdesk_core::DateInput;
use rand::Rng;
use tracing::info;

use crate::error::Result;
use crate::repository::NotificationRepository;

const DEMO_COUNT: usize = 5;
const UNREAD_COUNT: usize = 3;
const WEEK_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

fn titles(kind: NotificationKind) -> &'static [&'static str] {
    match kind {
        NotificationKind::Feedback => &["New Feedback", "Feedback Response", "Team Feedback"],
        NotificationKind::Goal => &["Goal Update", "Goal Assigned", "Goal Completed"],
        NotificationKind::Review => &["Review Submitted", "Performance Review", "Quarterly Review"],
        NotificationKind::Request => &["Feedback Request", "Document Request", "Meeting Request"],
        NotificationKind::System => &["Account Update", "System Maintenance", "Profile Update"],
        NotificationKind::Rating => &["New Leadership Rating"],
    }
}

fn messages(kind: NotificationKind) -> &'static [&'static str] {
    match kind {
        NotificationKind::Feedback => &[
            "Your team leader has provided feedback on your recent project.",
            "Your recent work has been recognized by management.",
            "A colleague has shared feedback on your presentation.",
        ],
        NotificationKind::Goal => &[
            "A new goal has been assigned to you for this quarter.",
            "Your goal \"Improve Customer Service\" is due next week.",
            "You have completed 3 of your 5 assigned goals.",
        ],
        NotificationKind::Review => &[
            "Your annual performance review is now available.",
            "Your manager has submitted a new quarterly review.",
            "Your 360° feedback is ready for your review.",
        ],
        NotificationKind::Request => &[
            "A team member has requested your feedback on their project.",
            "Your manager has requested a project status update.",
            "The HR department requests your updated information.",
        ],
        NotificationKind::System => &[
            "Welcome to the new employee feedback system.",
            "Your account has been successfully updated.",
            "System maintenance scheduled for this weekend.",
        ],
        NotificationKind::Rating => &["You received new feedback on your leadership"],
    }
}

/// Build the demo set: one notification per classic kind, random wording,
/// backdated up to a week. The first three are unread.
pub fn demo_notifications(user_id: &str) -> Vec<NewNotification> {
    let mut rng = rand::rng();
    let now = Utc::now();
    NotificationKind::CLASSIC
        .iter()
        .cycle()
        .take(DEMO_COUNT)
        .enumerate()
        .map(|(i, &kind)| {
            let title = titles(kind)[rng.random_range(0..titles(kind).len())];
            let message = messages(kind)[rng.random_range(0..messages(kind).len())];
            let offset = Duration::milliseconds(rng.random_range(0..WEEK_MILLIS));
            let mut notification = NewNotification::unread(user_id, kind, title, message);
            notification.read = i >= UNREAD_COUNT;
            notification.created_at = DateInput::from(now - offset);
            notification
        })
        .collect()
}

/// Write the demo set for `user_id`. The writes run concurrently; the
/// first failure, if any, is returned once all have settled.
pub async fn generate_demo_notifications(
    notifications: &NotificationRepository,
    user_id: &str,
) -> Result<Vec<Notification>> {
    let batch = demo_notifications(user_id);
    let results = join_all(batch.into_iter().map(|n| notifications.create(n))).await;
    let created = results.into_iter().collect::<Result<Vec<_>>>()?;
    info!(%user_id, count = created.len(), "Demo notifications created");
    Ok(created)
}
