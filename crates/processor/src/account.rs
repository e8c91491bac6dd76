//! Processor for events of the `account` origin.

use async_trait::async_trait;
use domain::account::{
    ACCOUNT_BLOCKED, ACCOUNT_CREATED, ACCOUNT_FUNDS_DEPOSITED, ACCOUNT_FUNDS_WITHDRAWN,
    ACCOUNT_UNBLOCKED,
};
use domain::{AccountEvent, AccountRepository, DomainEvent};
use event_store::{Event, EventOrigin, EventRepository};

use crate::Result;
use crate::codec::EventCodec;
use crate::processor::{
    DecodeFailurePolicy, Disposition, EventProcessor, ProcessOutcome, decode, record,
};

/// Returns the codec for every supported account event type.
pub fn account_codec() -> EventCodec<AccountEvent> {
    EventCodec::new()
        .register(ACCOUNT_CREATED, AccountEvent::Created)
        .register(ACCOUNT_FUNDS_WITHDRAWN, AccountEvent::FundsWithdrawn)
        .register(ACCOUNT_FUNDS_DEPOSITED, AccountEvent::FundsDeposited)
        .register(ACCOUNT_BLOCKED, AccountEvent::Blocked)
        .register(ACCOUNT_UNBLOCKED, AccountEvent::Unblocked)
}

/// Applies account events to an [`AccountRepository`].
///
/// Re-delivering an `account.created` event completes it again without a
/// second creation, so a crash between the domain write and the gateway
/// update is safe.
pub struct AccountProcessor<R, A> {
    gateway: R,
    accounts: A,
    codec: EventCodec<AccountEvent>,
    decode_policy: DecodeFailurePolicy,
}

impl<R, A> AccountProcessor<R, A>
where
    R: EventRepository,
    A: AccountRepository,
{
    /// Creates a processor with the default decode failure policy.
    pub fn new(gateway: R, accounts: A) -> Self {
        Self {
            gateway,
            accounts,
            codec: account_codec(),
            decode_policy: DecodeFailurePolicy::default(),
        }
    }

    pub fn with_decode_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    async fn apply(&self, event: &Event, decoded: AccountEvent) -> Disposition {
        let id = event.context_id;
        match decoded {
            AccountEvent::Created(data) => Disposition::classify(
                event,
                self.accounts.create_account(id, &data).await,
                Disposition::for_create,
            ),
            AccountEvent::FundsWithdrawn(data) => Disposition::classify(
                event,
                self.accounts.withdraw_funds(id, &data).await,
                Disposition::for_funds,
            ),
            AccountEvent::FundsDeposited(data) => Disposition::classify(
                event,
                self.accounts.deposit_funds(id, &data).await,
                Disposition::for_funds,
            ),
            AccountEvent::Blocked(data) => Disposition::classify(
                event,
                self.accounts.block_account(id, &data).await,
                Disposition::for_status,
            ),
            AccountEvent::Unblocked(data) => Disposition::classify(
                event,
                self.accounts.unblock_account(id, &data).await,
                Disposition::for_status,
            ),
        }
    }
}

#[async_trait]
impl<R, A> EventProcessor for AccountProcessor<R, A>
where
    R: EventRepository,
    A: AccountRepository,
{
    fn origin(&self) -> &str {
        EventOrigin::ACCOUNT
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
