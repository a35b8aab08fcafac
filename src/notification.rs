//! User notifications.
//!
//! Notifications are created by the engine (threshold alerts, large
//! transaction alerts) and only ever mutated through the read-flag
//! operations here; they are never deleted by the engine.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{DatabaseID, Error, UserID};

/// How urgent a notification is, mirroring the display styles the web
/// layer knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Routine information.
    Info,
    /// Something completed successfully.
    Success,
    /// Something needs attention soon.
    Warning,
    /// Something needs attention now.
    Danger,
}

impl Severity {
    /// The severity as its canonical display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }

    fn from_name(text: &str) -> Option<Self> {
        match text {
            "info" => Some(Severity::Info),
            "success" => Some(Severity::Success),
            "warning" => Some(Severity::Warning),
            "danger" => Some(Severity::Danger),
            _ => None,
        }
    }
}

/// A message for one user, optionally linked to the event and/or
/// transaction it is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// The ID of the notification.
    pub id: DatabaseID,
    /// The user the notification is addressed to.
    pub user_id: UserID,
    /// A short headline.
    pub title: String,
    /// The full message body.
    pub message: String,
    /// How urgent the notification is.
    pub severity: Severity,
    /// Whether the user has read the notification.
    pub read: bool,
    /// When the notification was created.
    pub created_at: OffsetDateTime,
    /// The event the notification is about, if any.
    pub event_id: Option<DatabaseID>,
    /// The transaction the notification is about, if any.
    pub transaction_id: Option<DatabaseID>,
}

/// The details needed to create a [Notification].
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// The user the notification is addressed to.
    pub user_id: UserID,
    /// A short headline.
    pub title: String,
    /// The full message body.
    pub message: String,
    /// How urgent the notification is.
    pub severity: Severity,
    /// The event the notification is about, if any.
    pub event_id: Option<DatabaseID>,
    /// The transaction the notification is about, if any.
    pub transaction_id: Option<DatabaseID>,
}

impl NewNotification {
    /// Create a notification payload with no record links.
    pub fn new(user_id: UserID, title: &str, message: &str, severity: Severity) -> Self {
        Self {
            user_id,
            title: title.to_owned(),
            message: message.to_owned(),
            severity,
            event_id: None,
            transaction_id: None,
        }
    }

    /// Link the notification to the event it is about.
    pub fn about_event(mut self, event_id: DatabaseID) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Link the notification to the transaction it is about.
    pub fn about_transaction(mut self, transaction_id: DatabaseID) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

/// Create the notification table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_notification_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS notification (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                severity TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                event_id INTEGER,
                transaction_id INTEGER
                )",
        (),
    )?;

    Ok(())
}

fn map_notification_row(row: &Row) -> Result<Notification, rusqlite::Error> {
    let raw_severity: String = row.get(4)?;
    let severity = Severity::from_name(&raw_severity).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("\"{raw_severity}\" is not a valid notification severity").into(),
        )
    })?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        title: row.get(2)?,
        message: row.get(3)?,
        severity,
        read: row.get(5)?,
        created_at: row.get(6)?,
        event_id: row.get(7)?,
        transaction_id: row.get(8)?,
    })
}

/// Append a notification with the read flag cleared.
///
/// Most engine code should go through [notify] instead, which applies
/// the best-effort contract.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_notification(
    new: NewNotification,
    connection: &Connection,
) -> Result<Notification, Error> {
    let notification = connection
        .prepare(
            "INSERT INTO notification
                 (user_id, title, message, severity, read, created_at, event_id, transaction_id)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)
             RETURNING id, user_id, title, message, severity, read, created_at, event_id, transaction_id",
        )?
        .query_row(
            (
                new.user_id.as_i64(),
                new.title,
                new.message,
                new.severity.as_str(),
                OffsetDateTime::now_utc(),
                new.event_id,
                new.transaction_id,
            ),
            map_notification_row,
        )?;

    Ok(notification)
}

/// Append a notification as a best-effort side effect.
///
/// A notification is never important enough to fail the operation that
/// triggered it: on a write failure this logs the error and reports
/// `false` so the caller can carry on.
pub fn notify(new: NewNotification, connection: &Connection) -> bool {
    match create_notification(new, connection) {
        Ok(_) => true,
        Err(error) => {
            tracing::error!("failed to write notification: {error}");
            false
        }
    }
}

/// Mark a notification as read.
///
/// Marking an already-read notification again is a no-op, not an error.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid notification,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn mark_notification_read(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_updated = connection.execute("UPDATE notification SET read = 1 WHERE id = ?1", (id,))?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Mark all of a user's notifications as read, returning how many were
/// still unread.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn mark_all_notifications_read(
    user_id: UserID,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_updated = connection.execute(
        "UPDATE notification SET read = 1 WHERE user_id = ?1 AND read = 0",
        (user_id.as_i64(),),
    )?;

    Ok(rows_updated)
}

/// The number of unread notifications for a user.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn unread_notification_count(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let count = connection.query_row(
        "SELECT COUNT(id) FROM notification WHERE user_id = ?1 AND read = 0",
        (user_id.as_i64(),),
        |row| row.get(0),
    )?;

    Ok(count)
}

/// A user's notifications, newest first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn notifications_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Notification>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, title, message, severity, read, created_at, event_id, transaction_id
             FROM notification WHERE user_id = :user_id
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_notification_row)?
        .map(|maybe_notification| maybe_notification.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod notification_tests {
    use rusqlite::Connection;

    use crate::{Error, UserID, db::initialize};

    use super::{
        NewNotification, Severity, create_notification, mark_all_notifications_read,
        mark_notification_read, notifications_for_user, notify, unread_notification_count,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn sample(user: UserID) -> NewNotification {
        NewNotification::new(user, "Budget milestone", "Half the budget is gone.", Severity::Info)
    }

    #[test]
    fn notifications_start_unread() {
        let conn = get_test_connection();
        let user = UserID::new(1);

        let notification = create_notification(sample(user).about_event(7), &conn).unwrap();

        assert!(!notification.read);
        assert_eq!(notification.event_id, Some(7));
        assert_eq!(notification.transaction_id, None);
        assert_eq!(unread_notification_count(user, &conn).unwrap(), 1);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let conn = get_test_connection();
        let user = UserID::new(1);
        let notification = create_notification(sample(user), &conn).unwrap();

        mark_notification_read(notification.id, &conn).unwrap();
        mark_notification_read(notification.id, &conn).unwrap();

        assert_eq!(unread_notification_count(user, &conn).unwrap(), 0);
    }

    #[test]
    fn mark_read_fails_on_unknown_id() {
        let conn = get_test_connection();

        assert_eq!(mark_notification_read(404, &conn), Err(Error::NotFound));
    }

    #[test]
    fn mark_all_read_only_touches_one_user() {
        let conn = get_test_connection();
        let alice = UserID::new(1);
        let bob = UserID::new(2);
        create_notification(sample(alice), &conn).unwrap();
        create_notification(sample(alice), &conn).unwrap();
        create_notification(sample(bob), &conn).unwrap();

        let marked = mark_all_notifications_read(alice, &conn).unwrap();

        assert_eq!(marked, 2);
        assert_eq!(unread_notification_count(alice, &conn).unwrap(), 0);
        assert_eq!(unread_notification_count(bob, &conn).unwrap(), 1);
    }

    #[test]
    fn listing_is_newest_first() {
        let conn = get_test_connection();
        let user = UserID::new(1);
        let first = create_notification(sample(user), &conn).unwrap();
        let second = create_notification(sample(user), &conn).unwrap();

        let listed = notifications_for_user(user, &conn).unwrap();

        assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[test]
    fn notify_swallows_write_failures() {
        // No tables: every insert fails.
        let conn = Connection::open_in_memory().unwrap();

        assert!(!notify(sample(UserID::new(1)), &conn));
    }

    #[test]
    fn notify_reports_success() {
        let conn = get_test_connection();

        assert!(notify(sample(UserID::new(1)), &conn));
    }
}
