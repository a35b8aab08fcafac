//! Budget allocations for events and sub-events.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseID, Error,
    budget_monitor::BudgetTier,
    currency::round_to_cents,
    event::EventScope,
};

/// A budget allocated to an event or a sub-event.
///
/// At most one budget is expected per scope in normal use, but nothing
/// enforces that; readers take the first match and must tolerate zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: DatabaseID,
    /// The event or sub-event the budget is allocated to.
    pub scope: EventScope,
    /// The allocated amount.
    pub amount: f64,
    /// Free-text notes about the allocation.
    pub notes: Option<String>,
    /// The tier the budget monitor last notified managers about, if any.
    ///
    /// Used to suppress duplicate threshold notifications; see
    /// [crate::budget_monitor::check_budget_thresholds].
    pub last_alert_tier: Option<BudgetTier>,
}

/// Create the budget table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER,
                sub_event_id INTEGER,
                amount REAL NOT NULL,
                notes TEXT,
                last_alert_tier TEXT,
                CHECK ((event_id IS NULL) <> (sub_event_id IS NULL)),
                FOREIGN KEY(event_id) REFERENCES event(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(sub_event_id) REFERENCES sub_event(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let event_id: Option<DatabaseID> = row.get(1)?;
    let sub_event_id: Option<DatabaseID> = row.get(2)?;

    let scope = match (event_id, sub_event_id) {
        (Some(id), None) => EventScope::Event(id),
        (None, Some(id)) => EventScope::SubEvent(id),
        // Excluded by the table's CHECK constraint.
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Null,
                "budget row must have exactly one of event_id and sub_event_id".into(),
            ));
        }
    };

    let raw_tier: Option<String> = row.get(5)?;
    let last_alert_tier = match raw_tier {
        Some(text) => Some(BudgetTier::from_name(&text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("\"{text}\" is not a valid budget tier").into(),
            )
        })?),
        None => None,
    };

    Ok(Budget {
        id: row.get(0)?,
        scope,
        amount: row.get(3)?,
        notes: row.get(4)?,
        last_alert_tier,
    })
}

/// Allocate a budget to an event or sub-event.
///
/// The amount is rounded to two decimals.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_budget(
    scope: EventScope,
    amount: f64,
    notes: Option<&str>,
    connection: &Connection,
) -> Result<Budget, Error> {
    let (event_id, sub_event_id) = match scope {
        EventScope::Event(id) => (Some(id), None),
        EventScope::SubEvent(id) => (None, Some(id)),
    };

    let budget = connection
        .prepare(
            "INSERT INTO budget (event_id, sub_event_id, amount, notes)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, event_id, sub_event_id, amount, notes, last_alert_tier",
        )?
        .query_row(
            (event_id, sub_event_id, round_to_cents(amount), notes),
            map_budget_row,
        )?;

    Ok(budget)
}

/// The budget allocated to `scope`, if one exists.
///
/// If several budgets exist for the same scope, the oldest wins.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn budget_for_scope(
    scope: EventScope,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    let (column, id) = match scope {
        EventScope::Event(id) => ("event_id", id),
        EventScope::SubEvent(id) => ("sub_event_id", id),
    };

    let result = connection
        .prepare(&format!(
            "SELECT id, event_id, sub_event_id, amount, notes, last_alert_tier
             FROM budget WHERE {column} = :id ORDER BY id LIMIT 1"
        ))?
        .query_row(&[(":id", &id)], map_budget_row);

    match result {
        Ok(budget) => Ok(Some(budget)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Change a budget's allocated amount and notes.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_budget(
    id: DatabaseID,
    amount: f64,
    notes: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE budget SET amount = ?1, notes = ?2 WHERE id = ?3",
        (round_to_cents(amount), notes, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Record the tier the monitor last notified managers about.
///
/// `None` clears the marker so a later crossing of the same threshold
/// notifies again.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_last_alert_tier(
    id: DatabaseID,
    tier: Option<BudgetTier>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE budget SET last_alert_tier = ?1 WHERE id = ?2",
        (tier.map(|tier| tier.as_str()), id),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod budget_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        budget_monitor::BudgetTier,
        db::initialize,
        event::{EventScope, NewEvent, create_event, create_sub_event},
    };

    use super::{
        budget_for_scope, create_budget, set_last_alert_tier, update_budget,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn create_test_event(conn: &Connection) -> EventScope {
        let event = create_event(
            NewEvent {
                name: "Tech Fest".to_owned(),
                date: date!(2025 - 10 - 01),
                days: 3,
                event_manager: None,
                finance_manager: None,
            },
            conn,
        )
        .unwrap();

        EventScope::Event(event.id)
    }

    #[test]
    fn create_and_fetch_budget() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        let budget = create_budget(scope, 10000.0, Some("Annual allocation"), &conn).unwrap();

        assert_eq!(budget_for_scope(scope, &conn).unwrap(), Some(budget.clone()));
        assert_eq!(budget.amount, 10000.0);
        assert_eq!(budget.last_alert_tier, None);
    }

    #[test]
    fn missing_budget_is_none_not_error() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        assert_eq!(budget_for_scope(scope, &conn).unwrap(), None);
    }

    #[test]
    fn event_and_sub_event_budgets_are_distinct() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let EventScope::Event(event_id) = scope else {
            unreachable!()
        };
        let sub_event =
            create_sub_event(event_id, "Workshop", date!(2025 - 10 - 02), None, &conn).unwrap();
        let sub_scope = EventScope::SubEvent(sub_event.id);

        create_budget(scope, 10000.0, None, &conn).unwrap();
        let sub_budget = create_budget(sub_scope, 2500.0, None, &conn).unwrap();

        assert_eq!(budget_for_scope(sub_scope, &conn).unwrap(), Some(sub_budget));
        assert_eq!(budget_for_scope(scope, &conn).unwrap().unwrap().amount, 10000.0);
    }

    #[test]
    fn oldest_budget_wins_when_duplicated() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        let first = create_budget(scope, 5000.0, None, &conn).unwrap();
        create_budget(scope, 9999.0, None, &conn).unwrap();

        assert_eq!(budget_for_scope(scope, &conn).unwrap(), Some(first));
    }

    #[test]
    fn last_alert_tier_round_trips() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let budget = create_budget(scope, 10000.0, None, &conn).unwrap();

        set_last_alert_tier(budget.id, Some(BudgetTier::Warning), &conn).unwrap();
        assert_eq!(
            budget_for_scope(scope, &conn).unwrap().unwrap().last_alert_tier,
            Some(BudgetTier::Warning)
        );

        set_last_alert_tier(budget.id, None, &conn).unwrap();
        assert_eq!(
            budget_for_scope(scope, &conn).unwrap().unwrap().last_alert_tier,
            None
        );
    }

    #[test]
    fn updates_fail_on_missing_budget() {
        let conn = get_test_connection();

        assert_eq!(update_budget(404, 1.0, None, &conn), Err(Error::NotFound));
        assert_eq!(set_last_alert_tier(404, None, &conn), Err(Error::NotFound));
    }

    #[test]
    fn amounts_round_to_cents() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        let budget = create_budget(scope, 999.999, None, &conn).unwrap();
        assert_eq!(budget.amount, 1000.0);

        update_budget(budget.id, 1234.567, None, &conn).unwrap();
        let updated = budget_for_scope(scope, &conn).unwrap().unwrap();
        assert!((updated.amount - 1234.57).abs() < f64::EPSILON);
    }
}
