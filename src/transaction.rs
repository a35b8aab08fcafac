//! Ledger transactions and their line-items.
//!
//! A transaction header carries the what/when/how of a payment; the money
//! itself lives in line-items. A header's total is always derived by
//! summing its items (see [crate::aggregation::total_for]) and is never
//! stored on the header row.
//!
//! Editing a transaction replaces its item set wholesale: all prior items
//! are deleted and the new set inserted, rather than diffing per item.

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    DatabaseID, Error,
    currency::round_to_cents,
    event::{EventScope, get_event, get_sub_event},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction brings money in or sends it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nature {
    /// Money in.
    Revenue,
    /// Money out.
    Expense,
}

impl Nature {
    /// The nature as its canonical display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Nature::Revenue => "Revenue",
            Nature::Expense => "Expense",
        }
    }

    fn from_str(text: &str) -> Option<Self> {
        match text {
            "Revenue" => Some(Nature::Revenue),
            "Expense" => Some(Nature::Expense),
            _ => None,
        }
    }
}

/// A payment recorded against an event or sub-event.
///
/// The monetary value of a transaction is not a field on this type; it is
/// the sum of the amounts of its [TransactionItem] rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// The event or sub-event this transaction belongs to.
    pub scope: EventScope,
    /// Whether this transaction is revenue or an expense.
    pub nature: Nature,
    /// The ID of the transaction's category, if the category still exists.
    pub category_id: Option<DatabaseID>,
    /// The ID of the payment mode, if the mode still exists.
    pub mode_id: Option<DatabaseID>,
    /// When the payment happened.
    pub date: Date,
    /// The bill or invoice number, when one was issued.
    pub bill_number: Option<String>,
    /// Who the money came from or went to.
    pub counterparty: Option<String>,
}

/// The details needed to create a [Transaction] header.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The event or sub-event the transaction belongs to.
    pub scope: EventScope,
    /// Whether the transaction is revenue or an expense.
    pub nature: Nature,
    /// The ID of the transaction's category.
    pub category_id: Option<DatabaseID>,
    /// The ID of the payment mode.
    pub mode_id: Option<DatabaseID>,
    /// When the payment happened.
    pub date: Date,
    /// The bill or invoice number, when one was issued.
    pub bill_number: Option<String>,
    /// Who the money came from or went to.
    pub counterparty: Option<String>,
}

/// A single line of a transaction: a description and a non-negative
/// amount with two-decimal precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    /// The ID of the item.
    pub id: DatabaseID,
    /// The ID of the owning transaction.
    pub transaction_id: DatabaseID,
    /// What this line of the transaction was for.
    pub description: String,
    /// The amount of money for this line.
    pub amount: f64,
}

/// A validated line-item for a transaction being created or edited.
///
/// Use [NewTransactionItem::new] to construct; the amount is checked for
/// non-negativity and rounded to two decimals there, so every value of
/// this type holds a valid currency amount.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionItem {
    description: String,
    amount: f64,
}

impl NewTransactionItem {
    /// Create a line-item, rounding `amount` to two decimals.
    ///
    /// # Errors
    /// Returns [Error::NegativeAmount] if `amount` is below zero.
    pub fn new(description: &str, amount: f64) -> Result<Self, Error> {
        if amount < 0.0 {
            return Err(Error::NegativeAmount(amount));
        }

        Ok(Self {
            description: description.to_owned(),
            amount: round_to_cents(amount),
        })
    }

    /// What this line of the transaction was for.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The validated, rounded amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }
}

/// A typed, conjunctive filter over transactions.
///
/// Every filter is scoped to one event or sub-event; the remaining fields
/// narrow the match further and default to matching everything.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    /// The event or sub-event whose transactions to match.
    pub scope: EventScope,
    /// Match only transactions with this nature.
    pub nature: Option<Nature>,
    /// Match only transactions with this category.
    pub category_id: Option<DatabaseID>,
    /// Match only transactions with this payment mode.
    pub mode_id: Option<DatabaseID>,
}

impl TransactionFilter {
    /// A filter matching every transaction in `scope`.
    pub fn for_scope(scope: EventScope) -> Self {
        Self {
            scope,
            nature: None,
            category_id: None,
            mode_id: None,
        }
    }

    /// Narrow the filter to transactions with `nature`.
    pub fn nature(mut self, nature: Nature) -> Self {
        self.nature = Some(nature);
        self
    }

    /// Narrow the filter to transactions with the category `category_id`.
    pub fn category(mut self, category_id: DatabaseID) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Narrow the filter to transactions with the payment mode `mode_id`.
    pub fn mode(mut self, mode_id: DatabaseID) -> Self {
        self.mode_id = Some(mode_id);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction header table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER,
                sub_event_id INTEGER,
                nature TEXT NOT NULL,
                category_id INTEGER,
                mode_id INTEGER,
                date TEXT NOT NULL,
                bill_number TEXT,
                counterparty TEXT,
                CHECK ((event_id IS NULL) <> (sub_event_id IS NULL)),
                FOREIGN KEY(event_id) REFERENCES event(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(sub_event_id) REFERENCES sub_event(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(mode_id) REFERENCES payment_mode(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create the transaction item table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_transaction_item_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, event_id, sub_event_id, nature, category_id, mode_id, date, bill_number, counterparty";

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
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
                "transaction row must have exactly one of event_id and sub_event_id".into(),
            ));
        }
    };

    let raw_nature: String = row.get(3)?;
    let nature = Nature::from_str(&raw_nature).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("\"{raw_nature}\" is not a valid transaction nature").into(),
        )
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        scope,
        nature,
        category_id: row.get(4)?,
        mode_id: row.get(5)?,
        date: row.get(6)?,
        bill_number: row.get(7)?,
        counterparty: row.get(8)?,
    })
}

fn map_item_row(row: &Row) -> Result<TransactionItem, rusqlite::Error> {
    Ok(TransactionItem {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
    })
}

fn scope_columns(scope: EventScope) -> (Option<DatabaseID>, Option<DatabaseID>) {
    match scope {
        EventScope::Event(id) => (Some(id), None),
        EventScope::SubEvent(id) => (None, Some(id)),
    }
}

/// Check that the event or sub-event behind `scope` exists.
///
/// Inserts cannot sensibly report 'not found', so a dangling scope is
/// reported as [Error::InvalidForeignKey] instead.
fn verify_scope(scope: EventScope, connection: &Connection) -> Result<(), Error> {
    let result = match scope {
        EventScope::Event(id) => get_event(id, connection).map(|_| ()),
        EventScope::SubEvent(id) => get_sub_event(id, connection).map(|_| ()),
    };

    result.map_err(|error| match error {
        Error::NotFound => Error::InvalidForeignKey,
        error => error,
    })
}

/// Create a transaction header together with its line-items, committed as
/// one unit.
///
/// If any part fails, nothing is persisted.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidForeignKey] if the scope does not refer to a valid
///   event or sub-event,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    new: NewTransaction,
    items: &[NewTransactionItem],
    connection: &Connection,
) -> Result<Transaction, Error> {
    verify_scope(new.scope, connection)?;

    let tx = connection.unchecked_transaction()?;
    let (event_id, sub_event_id) = scope_columns(new.scope);

    let transaction = tx
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                 (event_id, sub_event_id, nature, category_id, mode_id, date, bill_number, counterparty)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                event_id,
                sub_event_id,
                new.nature.as_str(),
                new.category_id,
                new.mode_id,
                new.date,
                new.bill_number,
                new.counterparty,
            ),
            map_transaction_row,
        )?;

    insert_items(transaction.id, items, &tx)?;

    tx.commit()?;
    Ok(transaction)
}

fn insert_items(
    transaction_id: DatabaseID,
    items: &[NewTransactionItem],
    tx: &rusqlite::Transaction,
) -> Result<(), Error> {
    // Prepare the insert statement once for reuse
    let mut stmt = tx.prepare(
        "INSERT INTO transaction_item (transaction_id, description, amount) VALUES (?1, ?2, ?3)",
    )?;

    for item in items {
        stmt.execute((transaction_id, item.description(), item.amount()))?;
    }

    Ok(())
}

/// Update a transaction header and replace its entire item set, committed
/// as one unit.
///
/// All items previously attached to the transaction are deleted and
/// `items` inserted in their place; there is no per-item diffing.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - [Error::InvalidForeignKey] if the new scope does not refer to a
///   valid event or sub-event,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn replace_transaction(
    id: DatabaseID,
    new: NewTransaction,
    items: &[NewTransactionItem],
    connection: &Connection,
) -> Result<Transaction, Error> {
    verify_scope(new.scope, connection)?;

    let tx = connection.unchecked_transaction()?;
    let (event_id, sub_event_id) = scope_columns(new.scope);

    let rows_updated = tx.execute(
        "UPDATE \"transaction\"
         SET event_id = ?1, sub_event_id = ?2, nature = ?3, category_id = ?4,
             mode_id = ?5, date = ?6, bill_number = ?7, counterparty = ?8
         WHERE id = ?9",
        (
            event_id,
            sub_event_id,
            new.nature.as_str(),
            new.category_id,
            new.mode_id,
            new.date,
            new.bill_number.as_deref(),
            new.counterparty.as_deref(),
            id,
        ),
    )?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    tx.execute(
        "DELETE FROM transaction_item WHERE transaction_id = ?1",
        (id,),
    )?;
    insert_items(id, items, &tx)?;

    tx.commit()?;

    Ok(Transaction {
        id,
        scope: new.scope,
        nature: new.nature,
        category_id: new.category_id,
        mode_id: new.mode_id,
        date: new.date,
        bill_number: new.bill_number,
        counterparty: new.counterparty,
    })
}

/// Delete a transaction and all of its line-items, committed as one unit.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `id` does not refer to a valid
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM transaction_item WHERE transaction_id = ?1",
        (id,),
    )?;
    let rows_deleted = tx.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    tx.commit()?;
    Ok(())
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: DatabaseID, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// The IDs of the transactions matching `filter`.
///
/// Filters are conjunctive; fields left as `None` match everything.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn query_transaction_ids(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<DatabaseID>, Error> {
    let mut where_clause_parts = vec![];
    let mut query_parameters = vec![];

    match filter.scope {
        EventScope::Event(id) => {
            where_clause_parts.push(format!("event_id = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(id));
        }
        EventScope::SubEvent(id) => {
            where_clause_parts.push(format!("sub_event_id = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(id));
        }
    }

    if let Some(nature) = filter.nature {
        where_clause_parts.push(format!("nature = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(nature.as_str().to_owned()));
    }

    if let Some(category_id) = filter.category_id {
        where_clause_parts.push(format!("category_id = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Integer(category_id));
    }

    if let Some(mode_id) = filter.mode_id {
        where_clause_parts.push(format!("mode_id = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Integer(mode_id));
    }

    let query_string = format!(
        "SELECT id FROM \"transaction\" WHERE {} ORDER BY id",
        where_clause_parts.join(" AND ")
    );
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the full transaction headers for a scope, in date order.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn transactions_for_scope(
    scope: EventScope,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let (column, id) = match scope {
        EventScope::Event(id) => ("event_id", id),
        EventScope::SubEvent(id) => ("sub_event_id", id),
    };

    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE {column} = :id ORDER BY date, id"
        ))?
        .query_map(&[(":id", &id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

/// Retrieve every line-item belonging to any transaction in `ids`.
///
/// Returns an empty list for an empty ID set.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn items_for_transactions(
    ids: &[DatabaseID],
    connection: &Connection,
) -> Result<Vec<TransactionItem>, Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    // TODO: batch the IN clause if an event ever holds more transactions
    // than SQLite's host parameter limit (999 by default).
    let placeholders = (1..=ids.len())
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let query_string = format!(
        "SELECT id, transaction_id, description, amount FROM transaction_item
         WHERE transaction_id IN ({placeholders}) ORDER BY transaction_id, id"
    );
    let params = params_from_iter(ids.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_item_row)?
        .map(|maybe_item| maybe_item.map_err(Error::SqlError))
        .collect()
}
