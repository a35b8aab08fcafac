//! Event Ledger is the financial engine of an event-budget administration
//! system.
//!
//! The crate rolls raw transaction line-items up into revenue and expense
//! totals sliced by category, payment mode, and event scope, tracks each
//! budget's consumption against tiered thresholds, and fans out
//! notifications and audit entries as best-effort side effects of
//! state-changing ledger operations.
//!
//! The web route layer is expected to live in a separate crate; this
//! library only returns plain values and failure indicators.

#![warn(missing_docs)]

pub mod activity;
pub mod aggregation;
pub mod budget;
pub mod budget_monitor;
pub mod currency;
mod database_id;
pub mod db;
pub mod event;
pub mod ledger;
pub mod lookup;
pub mod notification;
pub mod report;
pub mod timezone;
pub mod transaction;

pub use database_id::{DatabaseID, UserID};
pub use db::initialize as initialize_db;
pub use event::{Event, EventScope, EventStatus, SubEvent};
pub use transaction::{Nature, Transaction, TransactionFilter, TransactionItem};

/// The errors that may occur in the engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested record could not be found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    /// Callers should check that the ID is correct and that the record has
    /// been created.
    #[error("the requested record could not be found")]
    NotFound,

    /// A record referenced another record that does not exist, e.g. a
    /// transaction was created for an event ID with no event row.
    #[error("a referenced record does not exist")]
    InvalidForeignKey,

    /// A transaction item was given a negative amount.
    ///
    /// Item amounts are currency values for money that has already moved;
    /// direction is carried by the owning transaction's nature, so the
    /// amounts themselves are never negative.
    #[error("{0} is a negative amount, which is not allowed for a transaction item")]
    NegativeAmount(f64),

    /// Tried to update a transaction that does not exist.
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist.
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_)) if sql_error.extended_code == 787 => {
                Error::InvalidForeignKey
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
