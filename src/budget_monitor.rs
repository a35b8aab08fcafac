//! Budget utilization monitoring and threshold alerts.
//!
//! The monitor is a from-scratch evaluator: every run recomputes the
//! scope's expense total and classifies it against the allocation. The
//! only state it keeps is the last tier it notified managers about
//! (persisted on the budget row), which suppresses duplicate alerts when
//! several edits land in the same tier.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    aggregation::{expense_total, total_for},
    budget::{Budget, budget_for_scope, set_last_alert_tier},
    currency::format_currency,
    event::{EventScope, owning_event},
    notification::{NewNotification, Severity, notify},
    transaction::Transaction,
};

/// How much of its budget a scope has consumed.
///
/// Tiers are ordered, with closed lower bounds: exactly 50.0% classifies
/// as `HalfUsed` and exactly 100.0% as `Exceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BudgetTier {
    /// Less than 50% of the budget is used.
    Normal,
    /// At least 50% but less than 75% is used.
    HalfUsed,
    /// At least 75% but less than 90% is used.
    Warning,
    /// At least 90% but less than 100% is used.
    Critical,
    /// The budget is fully used or overrun.
    Exceeded,
}

impl BudgetTier {
    /// Classify a utilization percentage.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            BudgetTier::Exceeded
        } else if percentage >= 90.0 {
            BudgetTier::Critical
        } else if percentage >= 75.0 {
            BudgetTier::Warning
        } else if percentage >= 50.0 {
            BudgetTier::HalfUsed
        } else {
            BudgetTier::Normal
        }
    }

    /// The tier as a display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetTier::Normal => "Normal",
            BudgetTier::HalfUsed => "HalfUsed",
            BudgetTier::Warning => "Warning",
            BudgetTier::Critical => "Critical",
            BudgetTier::Exceeded => "Exceeded",
        }
    }

    pub(crate) fn from_name(text: &str) -> Option<Self> {
        match text {
            "Normal" => Some(BudgetTier::Normal),
            "HalfUsed" => Some(BudgetTier::HalfUsed),
            "Warning" => Some(BudgetTier::Warning),
            "Critical" => Some(BudgetTier::Critical),
            "Exceeded" => Some(BudgetTier::Exceeded),
            _ => None,
        }
    }

    /// The notification severity for alerts at this tier.
    ///
    /// `Normal` never alerts, so it has no severity.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            BudgetTier::Normal => None,
            BudgetTier::HalfUsed => Some(Severity::Info),
            BudgetTier::Warning => Some(Severity::Warning),
            BudgetTier::Critical | BudgetTier::Exceeded => Some(Severity::Danger),
        }
    }
}

/// A snapshot of a budget's consumption, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    /// The allocated amount.
    pub allocated: f64,
    /// The expense total recorded so far.
    pub spent: f64,
    /// What is left of the allocation (negative when overrun).
    pub remaining: f64,
    /// Utilization as a percentage of the allocation; 0 when the
    /// allocation is 0.
    pub percentage: f64,
    /// The tier the utilization falls in.
    pub tier: BudgetTier,
}

/// Tunable thresholds for the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// A single transaction at or above this total triggers a
    /// large-transaction alert, irrespective of budget tier.
    pub large_transaction_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            large_transaction_threshold: 10_000.0,
        }
    }
}

fn status_for_budget(
    budget: &Budget,
    scope: EventScope,
    connection: &Connection,
) -> Result<BudgetStatus, Error> {
    let spent = expense_total(scope, connection)?;
    let percentage = if budget.amount > 0.0 {
        spent / budget.amount * 100.0
    } else {
        0.0
    };

    Ok(BudgetStatus {
        allocated: budget.amount,
        spent,
        remaining: budget.amount - spent,
        percentage,
        tier: BudgetTier::from_percentage(percentage),
    })
}

/// The current budget status for an event or sub-event, or `None` when
/// no budget has been allocated (no monitoring possible).
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn budget_status(
    scope: EventScope,
    connection: &Connection,
) -> Result<Option<BudgetStatus>, Error> {
    match budget_for_scope(scope, connection)? {
        Some(budget) => Ok(Some(status_for_budget(&budget, scope, connection)?)),
        None => Ok(None),
    }
}

fn threshold_alert(tier: BudgetTier, event_name: &str, status: &BudgetStatus) -> (String, String) {
    let spent = format_currency(status.spent);
    let allocated = format_currency(status.allocated);
    let remaining = format_currency(status.remaining);

    match tier {
        BudgetTier::Exceeded => (
            "Budget exceeded".to_owned(),
            format!(
                "Event \"{event_name}\" has exceeded its budget. \
                 Spent: {spent} / Budget: {allocated} ({:.1}%)",
                status.percentage
            ),
        ),
        BudgetTier::Critical => (
            "Budget alert: 90% used".to_owned(),
            format!(
                "Event \"{event_name}\" has used 90% of its budget. \
                 Spent: {spent} / Budget: {allocated}. Remaining: {remaining}"
            ),
        ),
        BudgetTier::Warning => (
            "Budget warning: 75% used".to_owned(),
            format!(
                "Event \"{event_name}\" has used 75% of its budget. \
                 Spent: {spent} / Budget: {allocated}. Remaining: {remaining}"
            ),
        ),
        // Normal is filtered out before this is called.
        BudgetTier::HalfUsed | BudgetTier::Normal => (
            "Budget milestone: 50% used".to_owned(),
            format!(
                "Event \"{event_name}\" has used half of its budget. \
                 Spent: {spent} / Budget: {allocated}. Remaining: {remaining}"
            ),
        ),
    }
}

/// Recompute a scope's budget utilization and alert the owning event's
/// managers if a threshold has been crossed since the last alert.
///
/// Invoked after any mutation that can change the scope's expense total.
/// The computed status is returned either way; `None` means no budget is
/// allocated and no monitoring is possible.
///
/// Exactly one notification payload goes to the event manager and one to
/// the finance manager (where assigned) when the tier is `HalfUsed` or
/// worse and higher than the last tier alerted on. The persisted marker
/// follows the tier downward without alerting, so utilization that falls
/// and crosses the same threshold again alerts again.
///
/// # Errors
/// Returns an [Error::SqlError] if reading the ledger or persisting the
/// alert marker fails. Notification writes themselves are best-effort
/// and only logged.
pub fn check_budget_thresholds(
    scope: EventScope,
    connection: &Connection,
) -> Result<Option<BudgetStatus>, Error> {
    let Some(budget) = budget_for_scope(scope, connection)? else {
        return Ok(None);
    };

    let status = status_for_budget(&budget, scope, connection)?;
    let tier = status.tier;

    let crossed_upward = tier >= BudgetTier::HalfUsed
        && budget.last_alert_tier.is_none_or(|previous| tier > previous);

    if crossed_upward {
        let event = owning_event(scope, connection)?;
        let (title, message) = threshold_alert(tier, &event.name, &status);
        let severity = tier
            .severity()
            .unwrap_or(Severity::Info);

        for manager in [event.event_manager, event.finance_manager]
            .into_iter()
            .flatten()
        {
            notify(
                NewNotification::new(manager, &title, &message, severity).about_event(event.id),
                connection,
            );
        }

        tracing::info!(
            "budget for event \"{}\" reached tier {} ({:.1}% used)",
            event.name,
            tier.as_str(),
            status.percentage
        );
    }

    // Keep the marker in sync in both directions.
    let marker = (tier >= BudgetTier::HalfUsed).then_some(tier);
    if marker != budget.last_alert_tier {
        set_last_alert_tier(budget.id, marker, connection)?;
    }

    Ok(Some(status))
}

/// Alert the managers of the owning event about a single unusually large
/// transaction.
///
/// Fires when the transaction's derived total is at or above
/// `config.large_transaction_threshold`, whatever the budget tier and
/// whether or not a budget exists at all. The acting user is never notified
/// about their own transaction. Returns how many notifications were
/// written.
///
/// # Errors
/// Returns an [Error::SqlError] if reading the ledger fails.
/// Notification writes themselves are best-effort and only logged.
pub fn notify_large_transaction(
    acting_user: UserID,
    transaction: &Transaction,
    config: &MonitorConfig,
    connection: &Connection,
) -> Result<usize, Error> {
    let total = total_for(&[transaction.id], connection)?;

    if total < config.large_transaction_threshold {
        return Ok(0);
    }

    let event = owning_event(transaction.scope, connection)?;
    let message = format!(
        "Large transaction of {} was created in event \"{}\"",
        format_currency(total),
        event.name
    );

    let mut notified = 0;
    for manager in [event.finance_manager, event.event_manager]
        .into_iter()
        .flatten()
        .filter(|&manager| manager != acting_user)
    {
        if notify(
            NewNotification::new(manager, "Large transaction alert", &message, Severity::Warning)
                .about_event(event.id)
                .about_transaction(transaction.id),
            connection,
        ) {
            notified += 1;
        }
    }

    Ok(notified)
}
