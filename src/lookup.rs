//! Transaction category and payment mode lookup tables.
//!
//! Both are small, administrator-managed enumerations. Name resolution
//! never fails hard: an ID with no row degrades to a sentinel label so a
//! half-broken lookup table cannot take down a whole report.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{DatabaseID, Error};

/// The label used when a category ID cannot be resolved to a name.
pub const UNKNOWN_CATEGORY: &str = "Unknown Category";

/// The label used when a payment mode ID cannot be resolved to a name.
pub const UNKNOWN_MODE: &str = "Unknown Mode";

/// A classification for transactions, e.g. 'Catering', 'Venue Hire'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseID,
    /// The display name of the category.
    pub name: String,
}

/// How money moved, e.g. 'Cash', 'Bank Transfer', 'UPI'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMode {
    /// The ID of the payment mode.
    pub id: DatabaseID,
    /// The display name of the payment mode.
    pub name: String,
}

/// Create the category table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create the payment mode table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_payment_mode_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS payment_mode (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn map_payment_mode_row(row: &Row) -> Result<PaymentMode, rusqlite::Error> {
    Ok(PaymentMode {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Create a new category.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_category(name: &str, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare("INSERT INTO category (name) VALUES (?1) RETURNING id, name")?
        .query_row((name,), map_category_row)?;

    Ok(category)
}

/// Create a new payment mode.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_payment_mode(name: &str, connection: &Connection) -> Result<PaymentMode, Error> {
    let mode = connection
        .prepare("INSERT INTO payment_mode (name) VALUES (?1) RETURNING id, name")?
        .query_row((name,), map_payment_mode_row)?;

    Ok(mode)
}

/// Retrieve every category, in insertion order.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name FROM category ORDER BY id")?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::SqlError))
        .collect()
}

/// Retrieve every payment mode, in insertion order.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn all_payment_modes(connection: &Connection) -> Result<Vec<PaymentMode>, Error> {
    connection
        .prepare("SELECT id, name FROM payment_mode ORDER BY id")?
        .query_map([], map_payment_mode_row)?
        .map(|maybe_mode| maybe_mode.map_err(Error::SqlError))
        .collect()
}

/// Resolve a category ID to its display name.
///
/// `None` and IDs with no matching row both resolve to
/// [UNKNOWN_CATEGORY] rather than an error.
///
/// # Errors
/// Returns an [Error::SqlError] if the query itself fails.
pub fn category_label(
    category_id: Option<DatabaseID>,
    connection: &Connection,
) -> Result<String, Error> {
    let Some(id) = category_id else {
        return Ok(UNKNOWN_CATEGORY.to_owned());
    };

    match connection
        .prepare("SELECT name FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], |row| row.get(0))
    {
        Ok(name) => Ok(name),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UNKNOWN_CATEGORY.to_owned()),
        Err(error) => Err(error.into()),
    }
}

/// Resolve a payment mode ID to its display name.
///
/// `None` and IDs with no matching row both resolve to [UNKNOWN_MODE]
/// rather than an error.
///
/// # Errors
/// Returns an [Error::SqlError] if the query itself fails.
pub fn mode_label(mode_id: Option<DatabaseID>, connection: &Connection) -> Result<String, Error> {
    let Some(id) = mode_id else {
        return Ok(UNKNOWN_MODE.to_owned());
    };

    match connection
        .prepare("SELECT name FROM payment_mode WHERE id = :id")?
        .query_row(&[(":id", &id)], |row| row.get(0))
    {
        Ok(name) => Ok(name),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UNKNOWN_MODE.to_owned()),
        Err(error) => Err(error.into()),
    }
}
