//! Customer event payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

pub const CUSTOMER_CREATED: &str = "customer.created";
pub const CUSTOMER_ACTIVATED: &str = "customer.activated";
pub const CUSTOMER_DEACTIVATED: &str = "customer.deactivated";
pub const CUSTOMER_BLOCKED: &str = "customer.blocked";
pub const CUSTOMER_UNBLOCKED: &str = "customer.unblocked";

/// Decoded customer events, one variant per supported type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerEvent {
    Created(CustomerCreated),
    Activated(CustomerActivated),
    Deactivated(CustomerDeactivated),
    Blocked(CustomerBlocked),
    Unblocked(CustomerUnblocked),
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::Created(_) => CUSTOMER_CREATED,
            CustomerEvent::Activated(_) => CUSTOMER_ACTIVATED,
            CustomerEvent::Deactivated(_) => CUSTOMER_DEACTIVATED,
            CustomerEvent::Blocked(_) => CUSTOMER_BLOCKED,
            CustomerEvent::Unblocked(_) => CUSTOMER_UNBLOCKED,
        }
    }
}

/// Postal address of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Payload of `customer.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreated {
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(default)]
    pub phone: Option<String>,

    /// ISO-8601 calendar date.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,

    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerActivated {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDeactivated {}

/// Payload of `customer.blocked`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBlocked {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUnblocked {}
