//! Table- and chart-ready views over the aggregation engine.
//!
//! Nothing here computes a number itself; every figure comes from
//! [crate::aggregation] (and [crate::budget_monitor] for budget status),
//! assembled into plain serializable structures for the route layer to
//! render.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    DatabaseID, Error,
    aggregation::{
        LabelledTotal, category_breakdown, expense_total, mode_breakdown, revenue_total,
        total_for,
    },
    budget_monitor::{BudgetStatus, budget_status},
    event::EventScope,
    lookup::{category_label, mode_label},
    transaction::{Nature, transactions_for_scope},
};

/// Revenue and expenses for one scope, side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// Total revenue recorded.
    pub revenue: f64,
    /// Total expenses recorded.
    pub expenses: f64,
    /// Revenue minus expenses.
    pub net: f64,
}

/// The financial summary for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn financial_summary(
    scope: EventScope,
    connection: &Connection,
) -> Result<FinancialSummary, Error> {
    let revenue = revenue_total(scope, connection)?;
    let expenses = expense_total(scope, connection)?;

    Ok(FinancialSummary {
        revenue,
        expenses,
        net: revenue - expenses,
    })
}

/// One transaction as the route layer's tables display it: header fields
/// with lookup IDs resolved to labels and the total derived from items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// When the payment happened.
    pub date: Date,
    /// Whether the transaction is revenue or an expense.
    pub nature: Nature,
    /// The resolved category label.
    pub category: String,
    /// The resolved payment mode label.
    pub mode: String,
    /// The bill or invoice number, when one was issued.
    pub bill_number: Option<String>,
    /// Who the money came from or went to.
    pub counterparty: Option<String>,
    /// The transaction's total, derived from its line-items.
    pub total: f64,
}

/// Every transaction in a scope as display rows, in date order.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn transactions_of_event(
    scope: EventScope,
    connection: &Connection,
) -> Result<Vec<TransactionRow>, Error> {
    transactions_for_scope(scope, connection)?
        .into_iter()
        .map(|transaction| {
            Ok(TransactionRow {
                id: transaction.id,
                date: transaction.date,
                nature: transaction.nature,
                category: category_label(transaction.category_id, connection)?,
                mode: mode_label(transaction.mode_id, connection)?,
                bill_number: transaction.bill_number,
                counterparty: transaction.counterparty,
                total: total_for(&[transaction.id], connection)?,
            })
        })
        .collect()
}

/// Everything the route layer needs to render one event's finance page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    /// Revenue and expenses side by side.
    pub summary: FinancialSummary,
    /// Totals per category.
    pub by_category: Vec<LabelledTotal>,
    /// Totals per payment mode.
    pub by_mode: Vec<LabelledTotal>,
    /// The budget's consumption, when a budget is allocated.
    pub budget: Option<BudgetStatus>,
}

/// Assemble the full financial report for an event or sub-event.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn event_report(scope: EventScope, connection: &Connection) -> Result<EventReport, Error> {
    Ok(EventReport {
        summary: financial_summary(scope, connection)?,
        by_category: category_breakdown(scope, connection)?,
        by_mode: mode_breakdown(scope, connection)?,
        budget: budget_status(scope, connection)?,
    })
}

#[cfg(test)]
mod report_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        budget::create_budget,
        db::initialize,
        event::{EventScope, NewEvent, create_event},
        lookup::{UNKNOWN_CATEGORY, create_category, create_payment_mode},
        transaction::{Nature, NewTransaction, NewTransactionItem, insert_transaction},
    };

    use super::{event_report, financial_summary, transactions_of_event};

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
    fn summary_balances_revenue_against_expenses() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);

        insert_transaction(
            NewTransaction {
                scope,
                nature: Nature::Revenue,
                category_id: None,
                mode_id: None,
                date: date!(2025 - 09 - 01),
                bill_number: None,
                counterparty: None,
            },
            &[NewTransactionItem::new("sponsorship", 7500.0).unwrap()],
            &conn,
        )
        .unwrap();
        insert_transaction(
            NewTransaction {
                scope,
                nature: Nature::Expense,
                category_id: None,
                mode_id: None,
                date: date!(2025 - 09 - 02),
                bill_number: None,
                counterparty: None,
            },
            &[NewTransactionItem::new("venue", 3000.0).unwrap()],
            &conn,
        )
        .unwrap();

        let summary = financial_summary(scope, &conn).unwrap();

        assert_eq!(summary.revenue, 7500.0);
        assert_eq!(summary.expenses, 3000.0);
        assert_eq!(summary.net, 4500.0);
    }

    #[test]
    fn rows_resolve_labels_and_derive_totals() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        let catering = create_category("Catering", &conn).unwrap();
        let cash = create_payment_mode("Cash", &conn).unwrap();

        insert_transaction(
            NewTransaction {
                scope,
                nature: Nature::Expense,
                category_id: Some(catering.id),
                mode_id: Some(cash.id),
                date: date!(2025 - 09 - 02),
                bill_number: Some("INV-7".to_owned()),
                counterparty: Some("Fresh Bites".to_owned()),
            },
            &[
                NewTransactionItem::new("lunch", 800.0).unwrap(),
                NewTransactionItem::new("dinner", 1200.0).unwrap(),
            ],
            &conn,
        )
        .unwrap();
        insert_transaction(
            NewTransaction {
                scope,
                nature: Nature::Expense,
                category_id: None,
                mode_id: Some(cash.id),
                date: date!(2025 - 09 - 03),
                bill_number: None,
                counterparty: None,
            },
            &[NewTransactionItem::new("misc", 50.0).unwrap()],
            &conn,
        )
        .unwrap();

        let rows = transactions_of_event(scope, &conn).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "Catering");
        assert_eq!(rows[0].mode, "Cash");
        assert_eq!(rows[0].total, 2000.0);
        assert_eq!(rows[1].category, UNKNOWN_CATEGORY);
        assert_eq!(rows[1].total, 50.0);
    }

    #[test]
    fn report_serializes_for_the_route_layer() {
        let conn = get_test_connection();
        let scope = create_test_event(&conn);
        create_category("Catering", &conn).unwrap();
        create_budget(scope, 10000.0, None, &conn).unwrap();

        insert_transaction(
            NewTransaction {
                scope,
                nature: Nature::Expense,
                category_id: None,
                mode_id: None,
                date: date!(2025 - 09 - 02),
                bill_number: None,
                counterparty: None,
            },
            &[NewTransactionItem::new("venue", 5000.0).unwrap()],
            &conn,
        )
        .unwrap();

        let report = event_report(scope, &conn).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["summary"]["expenses"], 5000.0);
        assert_eq!(json["by_category"][0]["label"], "Catering");
        assert_eq!(json["by_category"][0]["total"], 0.0);
        assert_eq!(json["budget"]["allocated"], 10000.0);
        assert_eq!(json["budget"]["percentage"], 50.0);
        assert_eq!(json["budget"]["tier"], "HalfUsed");
    }
}
