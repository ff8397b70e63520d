use axum::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;

use crate::error::ServerError;
use crate::models::{NewLogEntry, NewNotification, NotificationKind, NotificationRow};
use crate::service::ServiceState;

/// Per-recipient per-day ceiling on skill-match notifications.
pub const DAILY_SKILL_MATCH_CAP: i32 = 5;

#[async_trait]
pub trait NotificationRepository {
    async fn insert_notification(&self, row: NewNotification) -> Result<(), ServerError>;
    async fn unread_and_mark_read(&self, user: i64) -> Result<Vec<NotificationRow>, ServerError>;
    /// Claims one skill-match delivery slot for (user, day). Returns false
    /// once the daily cap is reached. The counter bump is atomic against
    /// concurrent claims for the same recipient.
    async fn try_count_skill_match(&self, user: i64, day: NaiveDate) -> Result<bool, ServerError>;
}

#[async_trait]
impl NotificationRepository for ServiceState {
    async fn insert_notification(&self, row: NewNotification) -> Result<(), ServerError> {
        use crate::schema::notifications::dsl::notifications;
        let mut db = self.db_pool.get()?;
        diesel::insert_into(notifications).values(&row).execute(&mut db)?;
        Ok(())
    }

    async fn unread_and_mark_read(&self, user: i64) -> Result<Vec<NotificationRow>, ServerError> {
        use crate::schema::notifications::dsl::{created, is_read, notifications, user_id};
        let mut db = self.db_pool.get()?;
        let rows = db.transaction::<_, diesel::result::Error, _>(|db| {
            let unread = notifications
                .filter(user_id.eq(user).and(is_read.eq(false)))
                .order(created.desc())
                .select(NotificationRow::as_select())
                .load(db)?;
            if !unread.is_empty() {
                diesel::update(notifications.filter(user_id.eq(user).and(is_read.eq(false))))
                    .set(is_read.eq(true))
                    .execute(db)?;
            }
            Ok(unread)
        })?;
        Ok(rows)
    }

    async fn try_count_skill_match(&self, user: i64, day: NaiveDate) -> Result<bool, ServerError> {
        use crate::schema::notification_log::dsl::{date, kind, notification_log, sent, user_id};
        let mut db = self.db_pool.get()?;
        let kind_str = NotificationKind::SkillMatch.as_str();
        let below_cap = || {
            user_id
                .eq(user)
                .and(date.eq(day))
                .and(kind.eq(kind_str))
                .and(sent.lt(DAILY_SKILL_MATCH_CAP))
        };

        let bumped = diesel::update(notification_log.filter(below_cap()))
            .set(sent.eq(sent + 1))
            .execute(&mut db)?;
        if bumped == 1 {
            return Ok(true);
        }

        // no counter row yet today, or the cap is reached
        let inserted = diesel::insert_into(notification_log)
            .values(&NewLogEntry {
                user_id: user,
                date: day,
                kind: kind_str.to_string(),
                sent: 1,
            })
            .on_conflict((user_id, date, kind))
            .do_nothing()
            .execute(&mut db)?;
        if inserted == 1 {
            return Ok(true);
        }

        // lost the race for the day's first row; one more guarded attempt
        let bumped = diesel::update(notification_log.filter(below_cap()))
            .set(sent.eq(sent + 1))
            .execute(&mut db)?;
        Ok(bumped == 1)
    }
}
