use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::macros::date;
use tracing_subscriber::EnvFilter;

use event_ledger::{
    EventScope, Nature, UserID,
    budget::create_budget,
    budget_monitor::MonitorConfig,
    event::{NewEvent, create_event, create_sub_event},
    initialize_db,
    ledger::create_transaction,
    lookup::{create_category, create_payment_mode},
    report::event_report,
    transaction::{NewTransaction, NewTransactionItem},
};

/// A utility for creating a seeded test database for event_ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Seeding lookup tables...");
    let catering = create_category("Catering", &conn)?;
    let venue_hire = create_category("Venue Hire", &conn)?;
    create_category("Marketing", &conn)?;
    let cash = create_payment_mode("Cash", &conn)?;
    let bank_transfer = create_payment_mode("Bank Transfer", &conn)?;

    println!("Seeding events...");
    let event_manager = UserID::new(1);
    let finance_manager = UserID::new(2);
    let clerk = UserID::new(3);

    let event = create_event(
        NewEvent {
            name: "Tech Fest".to_owned(),
            date: date!(2026 - 02 - 12),
            days: 3,
            event_manager: Some(event_manager),
            finance_manager: Some(finance_manager),
        },
        &conn,
    )?;
    let scope = EventScope::Event(event.id);

    create_sub_event(event.id, "Robotics Workshop", date!(2026 - 02 - 13), None, &conn)?;

    create_budget(scope, 20_000.0, Some("Approved by the finance committee"), &conn)?;

    println!("Seeding transactions...");
    let config = MonitorConfig::default();

    create_transaction(
        NewTransaction {
            scope,
            nature: Nature::Revenue,
            category_id: None,
            mode_id: Some(bank_transfer.id),
            date: date!(2026 - 01 - 20),
            bill_number: None,
            counterparty: Some("Acme Sponsorships".to_owned()),
        },
        &[NewTransactionItem::new("Gold sponsorship", 15_000.0)?],
        clerk,
        &config,
        &conn,
    )?;

    create_transaction(
        NewTransaction {
            scope,
            nature: Nature::Expense,
            category_id: Some(venue_hire.id),
            mode_id: Some(bank_transfer.id),
            date: date!(2026 - 01 - 25),
            bill_number: Some("INV-1001".to_owned()),
            counterparty: Some("City Convention Centre".to_owned()),
        },
        &[NewTransactionItem::new("Main hall, 3 days", 11_000.0)?],
        clerk,
        &config,
        &conn,
    )?;

    create_transaction(
        NewTransaction {
            scope,
            nature: Nature::Expense,
            category_id: Some(catering.id),
            mode_id: Some(cash.id),
            date: date!(2026 - 02 - 12),
            bill_number: Some("INV-1002".to_owned()),
            counterparty: Some("Fresh Bites Catering".to_owned()),
        },
        &[
            NewTransactionItem::new("Lunch, day one", 1_800.0)?,
            NewTransactionItem::new("Coffee cart", 450.0)?,
        ],
        clerk,
        &config,
        &conn,
    )?;

    let report = event_report(scope, &conn)?;
    println!(
        "Seeded event \"{}\": revenue {}, expenses {}, budget tier {:?}",
        event.name,
        report.summary.revenue,
        report.summary.expenses,
        report.budget.map(|status| status.tier),
    );

    println!("Success!");

    Ok(())
}
