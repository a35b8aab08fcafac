//! Database initialization.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, activity, budget, event, lookup, notification, transaction};

/// Create the tables for all of the engine's models.
///
/// The tables are created within a single SQL transaction so that a
/// failure part-way through leaves the database untouched.
///
/// # Errors
/// Returns an [Error::SqlError] if any table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    event::create_event_table(&transaction)?;
    event::create_sub_event_table(&transaction)?;
    lookup::create_category_table(&transaction)?;
    lookup::create_payment_mode_table(&transaction)?;
    transaction::create_transaction_table(&transaction)?;
    transaction::create_transaction_item_table(&transaction)?;
    budget::create_budget_table(&transaction)?;
    notification::create_notification_table(&transaction)?;
    activity::create_activity_log_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
