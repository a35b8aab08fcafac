//! The append-only audit trail of user actions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{DatabaseID, Error, UserID};

/// The kind of record an activity acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// An event.
    Event,
    /// A sub-event.
    SubEvent,
    /// A transaction.
    Transaction,
    /// A budget.
    Budget,
    /// A user account.
    User,
}

impl EntityKind {
    /// The entity kind as its canonical display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Event => "Event",
            EntityKind::SubEvent => "SubEvent",
            EntityKind::Transaction => "Transaction",
            EntityKind::Budget => "Budget",
            EntityKind::User => "User",
        }
    }

    fn from_name(text: &str) -> Option<Self> {
        match text {
            "Event" => Some(EntityKind::Event),
            "SubEvent" => Some(EntityKind::SubEvent),
            "Transaction" => Some(EntityKind::Transaction),
            "Budget" => Some(EntityKind::Budget),
            "User" => Some(EntityKind::User),
            _ => None,
        }
    }
}

/// One immutable entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    /// The ID of the entry.
    pub id: DatabaseID,
    /// The user who performed the action.
    pub user_id: UserID,
    /// The action verb, e.g. "created", "updated", "deleted".
    pub action: String,
    /// The kind of record acted on.
    pub entity_kind: EntityKind,
    /// The ID of the record acted on.
    pub entity_id: DatabaseID,
    /// A human-readable description of what happened.
    pub description: String,
    /// Where the request came from, when known (e.g. a remote address).
    pub origin: Option<String>,
    /// When the action happened.
    pub timestamp: OffsetDateTime,
}

/// The details needed to append an [ActivityLog] entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    /// The user who performed the action.
    pub user_id: UserID,
    /// The action verb, e.g. "created", "updated", "deleted".
    pub action: String,
    /// The kind of record acted on.
    pub entity_kind: EntityKind,
    /// The ID of the record acted on.
    pub entity_id: DatabaseID,
    /// A human-readable description of what happened.
    pub description: String,
    /// Where the request came from, when known.
    pub origin: Option<String>,
}

impl ActivityEntry {
    /// Create an audit entry with no request origin.
    pub fn new(
        user_id: UserID,
        action: &str,
        entity_kind: EntityKind,
        entity_id: DatabaseID,
        description: &str,
    ) -> Self {
        Self {
            user_id,
            action: action.to_owned(),
            entity_kind,
            entity_id,
            description: description.to_owned(),
            origin: None,
        }
    }

    /// Attach the request origin, e.g. the client's remote address.
    pub fn from_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_owned());
        self
    }
}

/// Create the activity log table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_activity_log_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                entity_kind TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                origin TEXT,
                timestamp TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_activity_row(row: &Row) -> Result<ActivityLog, rusqlite::Error> {
    let raw_kind: String = row.get(3)?;
    let entity_kind = EntityKind::from_name(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("\"{raw_kind}\" is not a valid entity kind").into(),
        )
    })?;

    Ok(ActivityLog {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        action: row.get(2)?,
        entity_kind,
        entity_id: row.get(4)?,
        description: row.get(5)?,
        origin: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

/// Append one entry to the audit trail.
///
/// Most engine code should go through [record_activity] instead, which
/// applies the best-effort contract.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn append_activity(entry: ActivityEntry, connection: &Connection) -> Result<ActivityLog, Error> {
    let activity = connection
        .prepare(
            "INSERT INTO activity_log
                 (user_id, action, entity_kind, entity_id, description, origin, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, user_id, action, entity_kind, entity_id, description, origin, timestamp",
        )?
        .query_row(
            (
                entry.user_id.as_i64(),
                entry.action,
                entry.entity_kind.as_str(),
                entry.entity_id,
                entry.description,
                entry.origin,
                OffsetDateTime::now_utc(),
            ),
            map_activity_row,
        )?;

    Ok(activity)
}

/// Append an audit entry as a best-effort side effect.
///
/// The audit trail must never block the operation being audited: on a
/// write failure this logs the error and reports `false` so the caller
/// can carry on.
pub fn record_activity(entry: ActivityEntry, connection: &Connection) -> bool {
    match append_activity(entry, connection) {
        Ok(_) => true,
        Err(error) => {
            tracing::error!("failed to write activity log entry: {error}");
            false
        }
    }
}

/// A user's activity entries, newest first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn activities_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<ActivityLog>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, action, entity_kind, entity_id, description, origin, timestamp
             FROM activity_log WHERE user_id = :user_id
             ORDER BY timestamp DESC, id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_activity_row)?
        .map(|maybe_activity| maybe_activity.map_err(Error::SqlError))
        .collect()
}
