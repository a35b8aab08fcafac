//! Read-only financial aggregation.
//!
//! Everything here recomputes from the ledger on every call: there are no
//! cached totals, so repeated calls without an intervening mutation give
//! identical results, and concurrent readers need no coordination.
//!
//! [total_for] is the single place where a transaction's monetary value
//! is computed. No other module sums item amounts.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    DatabaseID, Error,
    currency::round_to_cents,
    event::{Event, EventScope, EventStatus, SubEvent},
    lookup,
    transaction::{Nature, TransactionFilter, items_for_transactions, query_transaction_ids},
};

/// The IDs of the transactions matching `filter`.
///
/// Thin front door over the ledger's typed filter query, re-exported here
/// so callers slicing totals and callers listing transactions go through
/// the same filter semantics.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn transaction_ids(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<DatabaseID>, Error> {
    query_transaction_ids(filter, connection)
}

/// The combined monetary value of the transactions in `ids`: the sum of
/// the amounts of every line-item belonging to any of them.
///
/// Returns 0 for an empty set. This is the canonical amount computation;
/// a transaction's total is defined as `total_for(&[id])`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn total_for(ids: &[DatabaseID], connection: &Connection) -> Result<f64, Error> {
    let items = items_for_transactions(ids, connection)?;

    // Item amounts are stored with two-decimal precision, but summing
    // floats can still leave dust in the low bits.
    Ok(round_to_cents(items.iter().map(|item| item.amount).sum()))
}

fn nature_total(
    scope: EventScope,
    nature: Nature,
    connection: &Connection,
) -> Result<f64, Error> {
    let ids = query_transaction_ids(
        &TransactionFilter::for_scope(scope).nature(nature),
        connection,
    )?;

    total_for(&ids, connection)
}

/// The total revenue recorded for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn revenue_total(scope: EventScope, connection: &Connection) -> Result<f64, Error> {
    nature_total(scope, Nature::Revenue, connection)
}

/// The total expenses recorded for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn expense_total(scope: EventScope, connection: &Connection) -> Result<f64, Error> {
    nature_total(scope, Nature::Expense, connection)
}

/// The total recorded against one category for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn category_total(
    scope: EventScope,
    category_id: DatabaseID,
    connection: &Connection,
) -> Result<f64, Error> {
    let ids = query_transaction_ids(
        &TransactionFilter::for_scope(scope).category(category_id),
        connection,
    )?;

    total_for(&ids, connection)
}

/// The total recorded against one payment mode for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn mode_total(
    scope: EventScope,
    mode_id: DatabaseID,
    connection: &Connection,
) -> Result<f64, Error> {
    let ids = query_transaction_ids(
        &TransactionFilter::for_scope(scope).mode(mode_id),
        connection,
    )?;

    total_for(&ids, connection)
}

/// A display label paired with the total recorded under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledTotal {
    /// The resolved display label.
    pub label: String,
    /// The total recorded under the label.
    pub total: f64,
}

/// Per-category totals for an event or sub-event, one row per category
/// in the lookup table.
///
/// Labels come from the lookup table and degrade to the sentinel labels
/// rather than failing when a row has gone missing.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn category_breakdown(
    scope: EventScope,
    connection: &Connection,
) -> Result<Vec<LabelledTotal>, Error> {
    lookup::all_categories(connection)?
        .into_iter()
        .map(|category| {
            Ok(LabelledTotal {
                label: category.name,
                total: category_total(scope, category.id, connection)?,
            })
        })
        .collect()
}

/// Per-payment-mode totals for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn mode_breakdown(
    scope: EventScope,
    connection: &Connection,
) -> Result<Vec<LabelledTotal>, Error> {
    lookup::all_payment_modes(connection)?
        .into_iter()
        .map(|mode| {
            Ok(LabelledTotal {
                label: mode.name,
                total: mode_total(scope, mode.id, connection)?,
            })
        })
        .collect()
}

/// One event or sub-event classified by status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Which record this row describes.
    pub scope: EventScope,
    /// The display name of the event or sub-event.
    pub name: String,
    /// The date used for classification.
    pub date: Date,
    /// Where the event sits relative to the classification date.
    pub status: EventStatus,
}

/// Events and sub-events grouped by status.
///
/// Every input lands in exactly one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedEvents {
    /// Events dated after the classification date.
    pub upcoming: Vec<EventSummary>,
    /// Events dated on the classification date.
    pub ongoing: Vec<EventSummary>,
    /// Events dated before the classification date.
    pub completed: Vec<EventSummary>,
}

impl GroupedEvents {
    fn push(&mut self, summary: EventSummary) {
        match summary.status {
            EventStatus::Upcoming => self.upcoming.push(summary),
            EventStatus::Ongoing => self.ongoing.push(summary),
            EventStatus::Completed => self.completed.push(summary),
        }
    }
}

/// Classify events and sub-events as upcoming, ongoing, or completed by
/// comparing their dates to `today`.
///
/// Pure function: pass `today` from [crate::timezone::local_today] (or a
/// fixed date in tests).
pub fn group_events_by_status(
    events: &[Event],
    sub_events: &[SubEvent],
    today: Date,
) -> GroupedEvents {
    let mut grouped = GroupedEvents::default();

    for event in events {
        grouped.push(EventSummary {
            scope: EventScope::Event(event.id),
            name: event.name.clone(),
            date: event.date,
            status: EventStatus::from_date(event.date, today),
        });
    }

    for sub_event in sub_events {
        grouped.push(EventSummary {
            scope: EventScope::SubEvent(sub_event.id),
            name: sub_event.name.clone(),
            date: sub_event.date,
            status: EventStatus::from_date(sub_event.date, today),
        });
    }

    grouped
}

#[cfg(test)]
mod aggregation_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        db::initialize,
        event::{EventScope, NewEvent, SubEvent, create_event},
        lookup::{create_category, create_payment_mode},
        transaction::{
            Nature, NewTransaction, NewTransactionItem, TransactionFilter, insert_transaction,
        },
    };

    use super::{
        category_breakdown, category_total, expense_total, group_events_by_status, mode_breakdown,
        mode_total, revenue_total, total_for, transaction_ids,
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

    fn draft(scope: EventScope, nature: Nature) -> NewTransaction {
        NewTransaction {
            scope,
            nature,
            category_id: None,
            mode_id: None,
            date: date!(2025 - 09 - 20),
            bill_number: None,
            counterparty: None,
        }
    }

    fn items(amounts: &[f64]) -> Vec<NewTransactionItem> {
        amounts
            .iter()
            .map(|&amount| NewTransactionItem::new("line", amount).unwrap())
            .collect()
    }

    #[test]
    fn total_is_the_sum_of_item_amounts() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let transaction =
            insert_transaction(draft(scope, Nature::Expense), &items(&[1200.5, 99.5]), &conn)
                .unwrap();

        assert_eq!(total_for(&[transaction.id], &conn).unwrap(), 1300.0);
    }

    #[test]
    fn empty_set_totals_zero() {
        let conn = get_test_connection();

        assert_eq!(total_for(&[], &conn).unwrap(), 0.0);
    }

    #[test]
    fn transaction_with_no_items_totals_zero() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let transaction = insert_transaction(draft(scope, Nature::Expense), &[], &conn).unwrap();

        assert_eq!(total_for(&[transaction.id], &conn).unwrap(), 0.0);
    }

    #[test]
    fn revenue_and_expense_partition_the_ledger() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        let sale =
            insert_transaction(draft(scope, Nature::Revenue), &items(&[5000.0]), &conn).unwrap();
        let catering =
            insert_transaction(draft(scope, Nature::Expense), &items(&[1500.0, 500.0]), &conn)
                .unwrap();
        let venue =
            insert_transaction(draft(scope, Nature::Expense), &items(&[2000.0]), &conn).unwrap();

        let revenue = revenue_total(scope, &conn).unwrap();
        let expenses = expense_total(scope, &conn).unwrap();

        assert_eq!(revenue, 5000.0);
        assert_eq!(expenses, 4000.0);

        // The two nature slices are disjoint and cover every transaction.
        let all = transaction_ids(&TransactionFilter::for_scope(scope), &conn).unwrap();
        assert_eq!(all, vec![sale.id, catering.id, venue.id]);
        assert_eq!(
            revenue + expenses,
            total_for(&all, &conn).unwrap(),
        );
    }

    #[test]
    fn aggregation_is_idempotent() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        insert_transaction(draft(scope, Nature::Expense), &items(&[123.45]), &conn).unwrap();

        assert_eq!(
            expense_total(scope, &conn).unwrap(),
            expense_total(scope, &conn).unwrap()
        );
    }

    #[test]
    fn category_and_mode_totals_slice_independently() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let catering = create_category("Catering", &conn).unwrap();
        let cash = create_payment_mode("Cash", &conn).unwrap();

        insert_transaction(
            NewTransaction {
                category_id: Some(catering.id),
                mode_id: Some(cash.id),
                ..draft(scope, Nature::Expense)
            },
            &items(&[800.0]),
            &conn,
        )
        .unwrap();
        insert_transaction(
            NewTransaction {
                mode_id: Some(cash.id),
                ..draft(scope, Nature::Revenue)
            },
            &items(&[300.0]),
            &conn,
        )
        .unwrap();

        assert_eq!(category_total(scope, catering.id, &conn).unwrap(), 800.0);
        assert_eq!(mode_total(scope, cash.id, &conn).unwrap(), 1100.0);
    }

    #[test]
    fn breakdowns_cover_every_lookup_row() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let catering = create_category("Catering", &conn).unwrap();
        create_category("Venue Hire", &conn).unwrap();
        create_payment_mode("Cash", &conn).unwrap();

        insert_transaction(
            NewTransaction {
                category_id: Some(catering.id),
                ..draft(scope, Nature::Expense)
            },
            &items(&[650.0]),
            &conn,
        )
        .unwrap();

        let by_category = category_breakdown(scope, &conn).unwrap();
        assert_eq!(by_category.len(), 2);
        assert_eq!(by_category[0].label, "Catering");
        assert_eq!(by_category[0].total, 650.0);
        assert_eq!(by_category[1].label, "Venue Hire");
        assert_eq!(by_category[1].total, 0.0);

        let by_mode = mode_breakdown(scope, &conn).unwrap();
        assert_eq!(by_mode.len(), 1);
        assert_eq!(by_mode[0].total, 0.0);
    }

    #[test]
    fn grouping_covers_every_input_exactly_once() {
        let conn = get_test_connection();
        let today = date!(2025 - 10 - 01);

        let events = vec![
            create_event(
                NewEvent {
                    name: "Past Summit".to_owned(),
                    date: date!(2025 - 09 - 01),
                    days: 1,
                    event_manager: None,
                    finance_manager: None,
                },
                &conn,
            )
            .unwrap(),
            create_event(
                NewEvent {
                    name: "Tech Fest".to_owned(),
                    date: today,
                    days: 3,
                    event_manager: None,
                    finance_manager: None,
                },
                &conn,
            )
            .unwrap(),
        ];
        let sub_events = vec![SubEvent {
            id: 1,
            event_id: events[1].id,
            name: "Closing Workshop".to_owned(),
            date: date!(2025 - 10 - 03),
            manager: None,
        }];

        let grouped = group_events_by_status(&events, &sub_events, today);

        assert_eq!(grouped.completed.len(), 1);
        assert_eq!(grouped.ongoing.len(), 1);
        assert_eq!(grouped.upcoming.len(), 1);
        assert_eq!(grouped.completed[0].name, "Past Summit");
        assert_eq!(grouped.ongoing[0].name, "Tech Fest");
        assert_eq!(grouped.upcoming[0].name, "Closing Workshop");
    }
}
