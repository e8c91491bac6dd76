//! Account event payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::DomainEvent;

pub const ACCOUNT_CREATED: &str = "account.created";
pub const ACCOUNT_FUNDS_WITHDRAWN: &str = "account.funds.withdrawn";
pub const ACCOUNT_FUNDS_DEPOSITED: &str = "account.funds.deposited";
pub const ACCOUNT_BLOCKED: &str = "account.blocked";
pub const ACCOUNT_UNBLOCKED: &str = "account.unblocked";

/// Decoded account events, one variant per supported type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    Created(AccountCreated),
    FundsWithdrawn(FundsWithdrawn),
    FundsDeposited(FundsDeposited),
    Blocked(AccountBlocked),
    Unblocked(AccountUnblocked),
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::Created(_) => ACCOUNT_CREATED,
            AccountEvent::FundsWithdrawn(_) => ACCOUNT_FUNDS_WITHDRAWN,
            AccountEvent::FundsDeposited(_) => ACCOUNT_FUNDS_DEPOSITED,
            AccountEvent::Blocked(_) => ACCOUNT_BLOCKED,
            AccountEvent::Unblocked(_) => ACCOUNT_UNBLOCKED,
        }
    }
}

/// Payload of `account.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreated {
    /// Owner of the account, when known.
    #[serde(default)]
    pub customer_id: Option<Uuid>,

    pub initial_balance: f64,

    pub currency: String,
}

/// Payload of `account.funds.withdrawn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsWithdrawn {
    pub amount: f64,

    /// Must match the account currency when present.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Payload of `account.funds.deposited`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsDeposited {
    pub amount: f64,

    #[serde(default)]
    pub currency: Option<String>,
}

/// Payload of `account.blocked`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlocked {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of `account.unblocked`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUnblocked {}
