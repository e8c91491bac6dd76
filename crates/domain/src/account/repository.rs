//! Account repository trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ContextId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::events::{
    AccountBlocked, AccountCreated, AccountUnblocked, FundsDeposited, FundsWithdrawn,
};
use crate::error::{DomainError, Result};

const ENTITY: &str = "account";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Blocked,
}

/// Read-side view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: ContextId,
    pub customer_id: Option<Uuid>,
    pub balance: f64,
    pub currency: String,
    pub status: AccountStatus,
}

/// Read-side account store driven by account events.
///
/// Every mutation reports failures as [`DomainError`]; callers classify them
/// through [`DomainError::kind`].
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Creates the account. Fails with `AlreadyExists` if it is already there.
    async fn create_account(&self, id: ContextId, data: &AccountCreated) -> Result<()>;

    /// Fails with `InsufficientFunds`, `NotFound` or `Blocked`.
    async fn withdraw_funds(&self, id: ContextId, data: &FundsWithdrawn) -> Result<()>;

    async fn deposit_funds(&self, id: ContextId, data: &FundsDeposited) -> Result<()>;

    /// Blocking a blocked account succeeds.
    async fn block_account(&self, id: ContextId, data: &AccountBlocked) -> Result<()>;

    /// Unblocking an active account succeeds.
    async fn unblock_account(&self, id: ContextId, data: &AccountUnblocked) -> Result<()>;

    async fn find_by_id(&self, id: ContextId) -> Result<Option<Account>>;
}

#[derive(Debug, Default)]
struct InMemoryAccountState {
    accounts: HashMap<ContextId, Account>,
    pending_failures: u32,
}

impl InMemoryAccountState {
    /// Consumes one injected failure, if any.
    fn take_failure(&mut self) -> Result<()> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(DomainError::Unavailable(
                "injected account storage failure".to_string(),
            ));
        }
        Ok(())
    }

    fn get_mut(&mut self, id: ContextId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or(DomainError::NotFound { entity: ENTITY, id })
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DomainError::Invalid(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn check_currency(account: &Account, currency: Option<&str>) -> Result<()> {
    match currency {
        Some(currency) if currency != account.currency => Err(DomainError::Invalid(format!(
            "currency {currency} does not match account currency {}",
            account.currency
        ))),
        _ => Ok(()),
    }
}

/// In-memory account repository.
///
/// Supports injecting transient failures with [`fail_next`](Self::fail_next).
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    state: Arc<RwLock<InMemoryAccountState>>,
}

impl InMemoryAccountRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` mutating calls fail with `Unavailable`.
    pub async fn fail_next(&self, count: u32) {
        self.state.write().await.pending_failures = count;
    }

    /// Returns the number of stored accounts.
    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    #[tracing::instrument(skip(self, data))]
    async fn create_account(&self, id: ContextId, data: &AccountCreated) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;

        if state.accounts.contains_key(&id) {
            return Err(DomainError::AlreadyExists { entity: ENTITY, id });
        }
        if !data.initial_balance.is_finite() || data.initial_balance < 0.0 {
            return Err(DomainError::Invalid(format!(
                "initial balance must not be negative, got {}",
                data.initial_balance
            )));
        }

        state.accounts.insert(
            id,
            Account {
                id,
                customer_id: data.customer_id,
                balance: data.initial_balance,
                currency: data.currency.clone(),
                status: AccountStatus::Active,
            },
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, data))]
    async fn withdraw_funds(&self, id: ContextId, data: &FundsWithdrawn) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        check_amount(data.amount)?;

        let account = state.get_mut(id)?;
        if account.status == AccountStatus::Blocked {
            return Err(DomainError::Blocked { entity: ENTITY, id });
        }
        check_currency(account, data.currency.as_deref())?;
        if data.amount > account.balance {
            return Err(DomainError::InsufficientFunds {
                account_id: id,
                requested: data.amount,
                available: account.balance,
            });
        }

        account.balance -= data.amount;
        Ok(())
    }

    #[tracing::instrument(skip(self, data))]
    async fn deposit_funds(&self, id: ContextId, data: &FundsDeposited) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        check_amount(data.amount)?;

        let account = state.get_mut(id)?;
        if account.status == AccountStatus::Blocked {
            return Err(DomainError::Blocked { entity: ENTITY, id });
        }
        check_currency(account, data.currency.as_deref())?;

        account.balance += data.amount;
        Ok(())
    }

    #[tracing::instrument(skip(self, _data))]
    async fn block_account(&self, id: ContextId, _data: &AccountBlocked) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        state.get_mut(id)?.status = AccountStatus::Blocked;
        Ok(())
    }

    #[tracing::instrument(skip(self, _data))]
    async fn unblock_account(&self, id: ContextId, _data: &AccountUnblocked) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        state.get_mut(id)?.status = AccountStatus::Active;
        Ok(())
    }

    async fn find_by_id(&self, id: ContextId) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }
}
