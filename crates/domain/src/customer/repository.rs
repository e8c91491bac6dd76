//! Customer repository trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ContextId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::events::{
    CustomerActivated, CustomerBlocked, CustomerCreated, CustomerDeactivated, CustomerUnblocked,
};
use crate::error::{DomainError, Result};

const ENTITY: &str = "customer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Blocked,
}

/// Read-side view of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: ContextId,
    pub details: CustomerCreated,
    pub status: CustomerStatus,
}

/// Read-side customer store driven by customer events.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the customer is already stored.
    async fn create_customer(&self, id: ContextId, data: &CustomerCreated) -> Result<()>;

    async fn activate_customer(&self, id: ContextId, data: &CustomerActivated) -> Result<()>;

    async fn deactivate_customer(&self, id: ContextId, data: &CustomerDeactivated) -> Result<()>;

    async fn block_customer(&self, id: ContextId, data: &CustomerBlocked) -> Result<()>;

    async fn unblock_customer(&self, id: ContextId, data: &CustomerUnblocked) -> Result<()>;

    async fn find_by_id(&self, id: ContextId) -> Result<Option<Customer>>;
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    customers: HashMap<ContextId, Customer>,
    pending_failures: u32,
}

impl InMemoryCustomerState {
    fn take_failure(&mut self) -> Result<()> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(DomainError::Unavailable(
                "injected customer storage failure".to_string(),
            ));
        }
        Ok(())
    }

    fn set_status(&mut self, id: ContextId, status: CustomerStatus) -> Result<()> {
        self.take_failure()?;
        let customer = self
            .customers
            .get_mut(&id)
            .ok_or(DomainError::NotFound { entity: ENTITY, id })?;
        customer.status = status;
        Ok(())
    }
}

/// In-memory customer repository with failure injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerRepository {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` mutating calls fail with `Unavailable`.
    pub async fn fail_next(&self, count: u32) {
        self.state.write().await.pending_failures = count;
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    #[tracing::instrument(skip(self, data))]
    async fn create_customer(&self, id: ContextId, data: &CustomerCreated) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure()?;

        if state.customers.contains_key(&id) {
            return Err(DomainError::AlreadyExists { entity: ENTITY, id });
        }
        if !data.email.contains('@') {
            return Err(DomainError::Invalid(format!(
                "invalid email address: {}",
                data.email
            )));
        }

        state.customers.insert(
            id,
            Customer {
                id,
                details: data.clone(),
                status: CustomerStatus::Active,
            },
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, _data))]
    async fn activate_customer(&self, id: ContextId, _data: &CustomerActivated) -> Result<()> {
        self.state
            .write()
            .await
            .set_status(id, CustomerStatus::Active)
    }

    #[tracing::instrument(skip(self, _data))]
    async fn deactivate_customer(&self, id: ContextId, _data: &CustomerDeactivated) -> Result<()> {
        self.state
            .write()
            .await
            .set_status(id, CustomerStatus::Inactive)
    }

    #[tracing::instrument(skip(self, _data))]
    async fn block_customer(&self, id: ContextId, _data: &CustomerBlocked) -> Result<()> {
        self.state
            .write()
            .await
            .set_status(id, CustomerStatus::Blocked)
    }

    #[tracing::instrument(skip(self, _data))]
    async fn unblock_customer(&self, id: ContextId, _data: &CustomerUnblocked) -> Result<()> {
        self.state
            .write()
            .await
            .set_status(id, CustomerStatus::Active)
    }

    async fn find_by_id(&self, id: ContextId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }
}
