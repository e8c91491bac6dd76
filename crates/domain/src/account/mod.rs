//! Account events and the account read-side repository.

mod events;
mod repository;

pub use events::{
    ACCOUNT_BLOCKED, ACCOUNT_CREATED, ACCOUNT_FUNDS_DEPOSITED, ACCOUNT_FUNDS_WITHDRAWN,
    ACCOUNT_UNBLOCKED, AccountBlocked, AccountCreated, AccountEvent, AccountUnblocked,
    FundsDeposited, FundsWithdrawn,
};
pub use repository::{Account, AccountRepository, AccountStatus, InMemoryAccountRepository};
