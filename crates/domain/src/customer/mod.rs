//! Customer events and the customer read-side repository.

mod events;
mod repository;

pub use events::{
    Address, CUSTOMER_ACTIVATED, CUSTOMER_BLOCKED, CUSTOMER_CREATED, CUSTOMER_DEACTIVATED,
    CUSTOMER_UNBLOCKED, CustomerActivated, CustomerBlocked, CustomerCreated, CustomerDeactivated,
    CustomerEvent, CustomerUnblocked,
};
pub use repository::{Customer, CustomerRepository, CustomerStatus, InMemoryCustomerRepository};
