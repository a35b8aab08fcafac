//! Events and sub-events.
//!
//! An event is the unit that budgets and transactions hang off. A
//! sub-event belongs to exactly one event and owns its own transactions;
//! aggregation treats the two as alternate key spaces via [EventScope].

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DatabaseID, Error, UserID};

// ============================================================================
// MODELS
// ============================================================================

/// An event being tracked, e.g. a conference or a festival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The ID of the event.
    pub id: DatabaseID,
    /// The display name of the event.
    pub name: String,
    /// The date the event starts on.
    pub date: Date,
    /// How many days the event runs for.
    pub days: i64,
    /// The user responsible for running the event, if one is assigned.
    pub event_manager: Option<UserID>,
    /// The user responsible for the event's finances, if one is assigned.
    pub finance_manager: Option<UserID>,
}

/// The details needed to create an [Event].
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// The display name of the event.
    pub name: String,
    /// The date the event starts on.
    pub date: Date,
    /// How many days the event runs for.
    pub days: i64,
    /// The user responsible for running the event.
    pub event_manager: Option<UserID>,
    /// The user responsible for the event's finances.
    pub finance_manager: Option<UserID>,
}

/// A smaller happening under an event, e.g. a single workshop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEvent {
    /// The ID of the sub-event.
    pub id: DatabaseID,
    /// The ID of the owning event.
    pub event_id: DatabaseID,
    /// The display name of the sub-event.
    pub name: String,
    /// The date the sub-event takes place on.
    pub date: Date,
    /// The user responsible for running the sub-event.
    pub manager: Option<UserID>,
}

/// Identifies the owner of a transaction or budget: either an event
/// directly, or a sub-event under an event.
///
/// A transaction belongs to exactly one of the two, never both, and this
/// type makes the invalid combinations unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventScope {
    /// Records owned directly by the event with this ID.
    Event(DatabaseID),
    /// Records owned by the sub-event with this ID.
    SubEvent(DatabaseID),
}

impl EventScope {
    /// The raw ID, regardless of which kind of scope this is.
    pub fn id(&self) -> DatabaseID {
        match self {
            EventScope::Event(id) | EventScope::SubEvent(id) => *id,
        }
    }
}

/// Where an event sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// The event's date is after today.
    Upcoming,
    /// The event's date is today.
    Ongoing,
    /// The event's date is before today.
    Completed,
}

impl EventStatus {
    /// Classify an event date against `today`.
    ///
    /// The comparison is by exact date only; there is no time-of-day
    /// component, so exactly one status holds for any pair of dates.
    pub fn from_date(date: Date, today: Date) -> Self {
        if date > today {
            EventStatus::Upcoming
        } else if date == today {
            EventStatus::Ongoing
        } else {
            EventStatus::Completed
        }
    }

    /// The status as a display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "Upcoming",
            EventStatus::Ongoing => "Ongoing",
            EventStatus::Completed => "Completed",
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the event table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_event_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS event (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                days INTEGER NOT NULL,
                event_manager INTEGER,
                finance_manager INTEGER
                )",
        (),
    )?;

    Ok(())
}

/// Create the sub-event table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_sub_event_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS sub_event (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                manager INTEGER,
                FOREIGN KEY(event_id) REFERENCES event(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn map_event_row(row: &Row) -> Result<Event, rusqlite::Error> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        days: row.get(3)?,
        event_manager: row.get::<_, Option<i64>>(4)?.map(UserID::new),
        finance_manager: row.get::<_, Option<i64>>(5)?.map(UserID::new),
    })
}

fn map_sub_event_row(row: &Row) -> Result<SubEvent, rusqlite::Error> {
    Ok(SubEvent {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        date: row.get(3)?,
        manager: row.get::<_, Option<i64>>(4)?.map(UserID::new),
    })
}

/// Create a new event in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn create_event(event: NewEvent, connection: &Connection) -> Result<Event, Error> {
    let event = connection
        .prepare(
            "INSERT INTO event (name, date, days, event_manager, finance_manager)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, name, date, days, event_manager, finance_manager",
        )?
        .query_row(
            (
                event.name,
                event.date,
                event.days,
                event.event_manager.map(|user| user.as_i64()),
                event.finance_manager.map(|user| user.as_i64()),
            ),
            map_event_row,
        )?;

    Ok(event)
}

/// Create a new sub-event under the event `event_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if `event_id` does not refer to a valid event,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_sub_event(
    event_id: DatabaseID,
    name: &str,
    date: Date,
    manager: Option<UserID>,
    connection: &Connection,
) -> Result<SubEvent, Error> {
    // An insert cannot sensibly report 'not found', so check the owning
    // event up front and report the foreign key as the problem.
    get_event(event_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidForeignKey,
        error => error,
    })?;

    let sub_event = connection
        .prepare(
            "INSERT INTO sub_event (event_id, name, date, manager)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, event_id, name, date, manager",
        )?
        .query_row(
            (event_id, name, date, manager.map(|user| user.as_i64())),
            map_sub_event_row,
        )?;

    Ok(sub_event)
}

/// Retrieve an event from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid event,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_event(id: DatabaseID, connection: &Connection) -> Result<Event, Error> {
    let event = connection
        .prepare(
            "SELECT id, name, date, days, event_manager, finance_manager
             FROM event WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_event_row)?;

    Ok(event)
}

/// Retrieve a sub-event from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid sub-event,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_sub_event(id: DatabaseID, connection: &Connection) -> Result<SubEvent, Error> {
    let sub_event = connection
        .prepare("SELECT id, event_id, name, date, manager FROM sub_event WHERE id = :id")?
        .query_row(&[(":id", &id)], map_sub_event_row)?;

    Ok(sub_event)
}

/// Retrieve all events.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_all_events(connection: &Connection) -> Result<Vec<Event>, Error> {
    connection
        .prepare(
            "SELECT id, name, date, days, event_manager, finance_manager
             FROM event ORDER BY date, id",
        )?
        .query_map([], map_event_row)?
        .map(|maybe_event| maybe_event.map_err(Error::SqlError))
        .collect()
}

/// Retrieve all sub-events, or only those under `event_id` when given.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_sub_events(
    event_id: Option<DatabaseID>,
    connection: &Connection,
) -> Result<Vec<SubEvent>, Error> {
    match event_id {
        Some(event_id) => connection
            .prepare(
                "SELECT id, event_id, name, date, manager FROM sub_event
                 WHERE event_id = :event_id ORDER BY date, id",
            )?
            .query_map(&[(":event_id", &event_id)], map_sub_event_row)?
            .map(|maybe_sub_event| maybe_sub_event.map_err(Error::SqlError))
            .collect(),
        None => connection
            .prepare("SELECT id, event_id, name, date, manager FROM sub_event ORDER BY date, id")?
            .query_map([], map_sub_event_row)?
            .map(|maybe_sub_event| maybe_sub_event.map_err(Error::SqlError))
            .collect(),
    }
}

/// The event that owns `scope`: the event itself, or the sub-event's
/// parent event.
///
/// The budget monitor uses this to find the managers to notify.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the scope does not refer to a valid record,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn owning_event(scope: EventScope, connection: &Connection) -> Result<Event, Error> {
    match scope {
        EventScope::Event(id) => get_event(id, connection),
        EventScope::SubEvent(id) => {
            let sub_event = get_sub_event(id, connection)?;
            get_event(sub_event.event_id, connection)
        }
    }
}
