//! State-changing ledger operations.
//!
//! Each operation here is the engine's entry point for one user action:
//! the primary mutation (header + items, committed as one unit) followed
//! by the follow-up work: budget monitoring, large-transaction alerts,
//! and an audit entry.
//!
//! The follow-ups run outside the commit boundary and are best-effort: a
//! failure there is logged and swallowed, never propagated, so a
//! successfully committed mutation is reported as a success no matter
//! what happens to its side effects. Conversely, a failed commit returns
//! before any side effect runs, so nothing is notified or audited for a
//! mutation that never happened.

use rusqlite::Connection;

use crate::{
    DatabaseID, Error, UserID,
    activity::{ActivityEntry, EntityKind, record_activity},
    budget_monitor::{MonitorConfig, check_budget_thresholds, notify_large_transaction},
    event::EventScope,
    transaction::{
        self, NewTransaction, NewTransactionItem, Transaction, get_transaction,
        insert_transaction, replace_transaction,
    },
};

fn monitor_scope(scope: EventScope, connection: &Connection) {
    if let Err(error) = check_budget_thresholds(scope, connection) {
        tracing::error!("budget monitoring failed for {scope:?}: {error}");
    }
}

fn check_large_transaction(
    acting_user: UserID,
    transaction: &Transaction,
    config: &MonitorConfig,
    connection: &Connection,
) {
    if let Err(error) = notify_large_transaction(acting_user, transaction, config, connection) {
        tracing::error!(
            "large transaction check failed for transaction {}: {error}",
            transaction.id
        );
    }
}

fn audit(
    acting_user: UserID,
    action: &str,
    transaction_id: DatabaseID,
    description: &str,
    connection: &Connection,
) {
    record_activity(
        ActivityEntry::new(
            acting_user,
            action,
            EntityKind::Transaction,
            transaction_id,
            description,
        ),
        connection,
    );
}

/// Record a new transaction with its line-items and run the follow-up
/// work.
///
/// The header and items are committed as one unit; the budget monitor,
/// the large-transaction check, and the audit entry then run best-effort.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if the scope does not refer to a valid
///   event or sub-event,
/// - or [Error::SqlError] if there is some other SQL error.
/// Side-effect failures are logged, never returned.
pub fn create_transaction(
    new: NewTransaction,
    items: &[NewTransactionItem],
    acting_user: UserID,
    config: &MonitorConfig,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = insert_transaction(new, items, connection)?;

    monitor_scope(transaction.scope, connection);
    check_large_transaction(acting_user, &transaction, config, connection);
    audit(
        acting_user,
        "created",
        transaction.id,
        &format!("Created transaction #{}", transaction.id),
        connection,
    );

    Ok(transaction)
}

/// Update a transaction, replacing its entire item set, and run the
/// follow-up work.
///
/// When the edit moves the transaction to a different event or
/// sub-event, the budget monitor re-checks both the old and the new
/// scope, since both expense totals changed.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - [Error::InvalidForeignKey] if the new scope does not refer to a
///   valid event or sub-event,
/// - or [Error::SqlError] if there is some other SQL error.
/// Side-effect failures are logged, never returned.
pub fn update_transaction(
    id: DatabaseID,
    new: NewTransaction,
    items: &[NewTransactionItem],
    acting_user: UserID,
    config: &MonitorConfig,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let before = get_transaction(id, connection).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingTransaction,
        error => error,
    })?;

    let transaction = replace_transaction(id, new, items, connection)?;

    monitor_scope(transaction.scope, connection);
    if before.scope != transaction.scope {
        monitor_scope(before.scope, connection);
    }
    check_large_transaction(acting_user, &transaction, config, connection);
    audit(
        acting_user,
        "updated",
        transaction.id,
        &format!("Updated transaction #{}", transaction.id),
        connection,
    );

    Ok(transaction)
}

/// Delete a transaction (cascading its line-items) and run the follow-up
/// work.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
/// Side-effect failures are logged, never returned.
pub fn delete_transaction(
    id: DatabaseID,
    acting_user: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let before = get_transaction(id, connection).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingTransaction,
        error => error,
    })?;

    transaction::delete_transaction(id, connection)?;

    monitor_scope(before.scope, connection);
    audit(
        acting_user,
        "deleted",
        id,
        &format!("Deleted transaction #{id}"),
        connection,
    );

    Ok(())
}
