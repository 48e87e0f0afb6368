//! Transaction validator - turns a raw upsert request into a typed transaction.
//!
//! Validation is pure: it never touches the store, so every failure here is
//! reported before any write begins. The transaction type is inferred from the
//! signs of the split amounts and whether a transfer target was named.

use crate::{
    entities::TransactionType,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Split key for money that is deliberately not assigned to a category.
pub const UNCATEGORIZED: &str = "UNCATEGORIZED";

/// Split key for the amount moved by a transfer.
pub const TRANSFER_AMOUNT: &str = "TRANSFER AMOUNT";

/// The only accepted date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest absolute amount, in cents, one split or one transaction may carry.
///
/// Keeps every ledger-wide `SUM` far inside `i64`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// A raw create/update request as it arrives from the routing layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    /// Name of the account the money moves on
    pub account: String,
    /// Name of the other account when this is a transfer
    #[serde(default)]
    pub transfer_account: Option<String>,
    /// Booking date as `YYYY-MM-DD`
    pub date: String,
    /// Optional payee name
    #[serde(default)]
    pub payee: Option<String>,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
    /// Whether the transaction has cleared
    #[serde(default)]
    pub cleared: bool,
    /// Category name (or sentinel) to signed amount in cents
    pub amounts: BTreeMap<String, i64>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Inferred type
    pub transaction_type: TransactionType,
    /// Source account name
    pub account: String,
    /// Transfer target account name, present iff the type is a transfer leg
    pub transfer_account: Option<String>,
    /// Payee name, if one was given
    pub payee: Option<String>,
    /// Parsed booking date
    pub date: NaiveDate,
    /// Notes
    pub notes: String,
    /// Cleared flag
    pub cleared: bool,
    /// Nonzero amounts keyed by category name or sentinel
    pub amounts: BTreeMap<String, i64>,
}

impl ValidatedTransaction {
    /// True if this is one leg of a transfer.
    #[must_use]
    pub const fn is_transfer(&self) -> bool {
        self.transaction_type.is_transfer()
    }

    /// Sum of all split amounts.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.amounts
            .values()
            .fold(0, |total: i64, amount| total.saturating_add(*amount))
    }
}

/// Parses a booking date, accepting only `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let invalid = || Error::validation(format!("invalid date '{raw}', expected YYYY-MM-DD"));
    if raw.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())
}

/// Infers a single transaction type from signed amounts.
///
/// Zero amounts are skipped. The first nonzero amount fixes the type and every
/// later one must agree with it.
pub fn infer_type<'a, I>(amounts: I, is_transfer: bool) -> Result<TransactionType>
where
    I: IntoIterator<Item = &'a i64>,
{
    let mut inferred: Option<TransactionType> = None;
    for &amount in amounts {
        if amount == 0 {
            continue;
        }
        let current = TransactionType::infer(amount > 0, is_transfer);
        match inferred {
            None => inferred = Some(current),
            Some(fixed) if fixed == current => {}
            Some(_) => {
                return Err(Error::validation(
                    "inconsistent signage: a transaction cannot mix money in and money out",
                ));
            }
        }
    }
    inferred.ok_or_else(|| Error::validation("no non-zero amount"))
}

/// Checks that every amount and their total stay within [`MAX_AMOUNT`].
pub fn check_amounts<'a, I>(amounts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a i64>,
{
    let too_large = || {
        Error::validation(format!(
            "amounts must stay within {MAX_AMOUNT} cents in either direction"
        ))
    };
    let mut total: i64 = 0;
    for &amount in amounts {
        if amount.checked_abs().is_none_or(|size| size > MAX_AMOUNT) {
            return Err(too_large());
        }
        total = total.checked_add(amount).ok_or_else(too_large)?;
        if total.abs() > MAX_AMOUNT {
            return Err(too_large());
        }
    }
    Ok(())
}

/// Trims every category key, rejecting empty keys and keys that collide once
/// trimmed.
fn normalize_amounts(amounts: BTreeMap<String, i64>) -> Result<BTreeMap<String, i64>> {
    let mut normalized = BTreeMap::new();
    for (name, amount) in amounts {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }
        if normalized.insert(trimmed.to_string(), amount).is_some() {
            return Err(Error::validation(format!(
                "category '{trimmed}' appears more than once"
            )));
        }
    }
    Ok(normalized)
}

/// Validates a raw request.
pub fn validate(request: TransactionRequest) -> Result<ValidatedTransaction> {
    let date = parse_date(request.date.trim())?;

    let account = request.account.trim().to_string();
    if account.is_empty() {
        return Err(Error::validation("account name cannot be empty"));
    }

    let transfer_account = request
        .transfer_account
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let is_transfer = transfer_account.is_some();

    let amounts = normalize_amounts(request.amounts)?;
    check_amounts(amounts.values())?;

    let transaction_type = infer_type(amounts.values(), is_transfer)?;
    let amounts: BTreeMap<String, i64> = amounts
        .into_iter()
        .filter(|(_, amount)| *amount != 0)
        .collect();

    let payee = request
        .payee
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    Ok(ValidatedTransaction {
        transaction_type,
        account,
        transfer_account,
        payee,
        date,
        notes: request.notes,
        cleared: request.cleared,
        amounts,
    })
}
