//! Processor for events of the `customer` origin.

use async_trait::async_trait;
use domain::customer::{
    CUSTOMER_ACTIVATED, CUSTOMER_BLOCKED, CUSTOMER_CREATED, CUSTOMER_DEACTIVATED,
    CUSTOMER_UNBLOCKED,
};
use domain::{CustomerEvent, CustomerRepository, DomainEvent};
use event_store::{Event, EventOrigin, EventRepository};

use crate::Result;
use crate::codec::EventCodec;
use crate::processor::{
    DecodeFailurePolicy, Disposition, EventProcessor, ProcessOutcome, decode, record,
};

pub fn customer_codec() -> EventCodec<CustomerEvent> {
    EventCodec::new()
        .register(CUSTOMER_CREATED, CustomerEvent::Created)
        .register(CUSTOMER_ACTIVATED, CustomerEvent::Activated)
        .register(CUSTOMER_DEACTIVATED, CustomerEvent::Deactivated)
        .register(CUSTOMER_BLOCKED, CustomerEvent::Blocked)
        .register(CUSTOMER_UNBLOCKED, CustomerEvent::Unblocked)
}

/// Applies customer events to a [`CustomerRepository`].
pub struct CustomerProcessor<R, C> {
    gateway: R,
    customers: C,
    codec: EventCodec<CustomerEvent>,
    decode_policy: DecodeFailurePolicy,
}

impl<R, C> CustomerProcessor<R, C>
where
    R: EventRepository,
    C: CustomerRepository,
{
    pub fn new(gateway: R, customers: C) -> Self {
        Self {
            gateway,
            customers,
            codec: customer_codec(),
            decode_policy: DecodeFailurePolicy::default(),
        }
    }

    pub fn with_decode_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    async fn apply(&self, event: &Event, decoded: CustomerEvent) -> Disposition {
        let id = event.context_id;
        match decoded {
            CustomerEvent::Created(data) => Disposition::classify(
                event,
                self.customers.create_customer(id, &data).await,
                Disposition::for_create,
            ),
            CustomerEvent::Activated(data) => Disposition::classify(
                event,
                self.customers.activate_customer(id, &data).await,
                Disposition::for_status,
            ),
            CustomerEvent::Deactivated(data) => Disposition::classify(
                event,
                self.customers.deactivate_customer(id, &data).await,
                Disposition::for_status,
            ),
            CustomerEvent::Blocked(data) => Disposition::classify(
                event,
                self.customers.block_customer(id, &data).await,
                Disposition::for_status,
            ),
            CustomerEvent::Unblocked(data) => Disposition::classify(
                event,
                self.customers.unblock_customer(id, &data).await,
                Disposition::for_status,
            ),
        }
    }
}

#[async_trait]
impl<R, C> EventProcessor for CustomerProcessor<R, C>
where
    R: EventRepository,
    C: CustomerRepository,
{
    fn origin(&self) -> &str {
        EventOrigin::CUSTOMER
    }

    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn process(&self, event: &Event) -> Result<ProcessOutcome> {
        let Some(decoded) = decode(&self.gateway, &self.codec, self.decode_policy, event).await?
        else {
            return Ok(ProcessOutcome::Unprocessable);
        };

        tracing::debug!(context_id = %event.context_id, kind = decoded.event_type(), "applying event");
        let disposition = self.apply(event, decoded).await;
        record(&self.gateway, event, disposition).await
    }
}
