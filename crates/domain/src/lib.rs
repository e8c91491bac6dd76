//! Read-side collaborators of the event orchestrator.
//!
//! This crate provides:
//! - [`DomainEvent`] and the typed payloads of account and customer events
//! - [`AccountRepository`] and [`CustomerRepository`] capability traits
//! - [`DomainError`] with its [`ErrorKind`] classification
//! - In-memory repositories used by tests and the single-process worker

pub mod account;
pub mod customer;
pub mod error;
pub mod event;

pub use account::{
    Account, AccountBlocked, AccountCreated, AccountEvent, AccountRepository, AccountStatus,
    AccountUnblocked, FundsDeposited, FundsWithdrawn, InMemoryAccountRepository,
};
pub use customer::{
    Address, Customer, CustomerActivated, CustomerBlocked, CustomerCreated, CustomerDeactivated,
    CustomerEvent, CustomerRepository, CustomerStatus, CustomerUnblocked,
    InMemoryCustomerRepository,
};
pub use error::{DomainError, ErrorKind, Result};
pub use event::DomainEvent;
