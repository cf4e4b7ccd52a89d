use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    commission::compute_split,
    db_types::{
        ApplicationStatus,
        JobStatus,
        NewPaymentIntent,
        PaymentIntent,
        PaymentStatus,
        PayoutStatus,
    },
    events::{EventProducers, NotificationEvent, NotificationKind, PayoutFailedEvent},
    settlement_api::{
        errors::SettlementError,
        settings_cache::SettingsCache,
        settlement_objects::{
            CallbackOutcome,
            CollectionResult,
            GatewayCallback,
            InitiatePaymentRequest,
            InitiatedPayment,
            PayoutResult,
            NOT_SUBMITTED_CODE,
            ReconciliationReport,
            SettlementConfig,
            TransferOutcome,
        },
    },
    traits::{
        CollectionOrder,
        IntentTransition,
        PaymentGateway,
        PayoutOrder,
        SettlementDatabase,
        TransferKind,
        TransferState,
        TransferStatus,
        TransitionResult,
    },
};

/// Number of attempts at recording a transfer the gateway has accepted before handing it over to reconciliation.
const ACCEPTED_WRITE_ATTEMPTS: u32 = 3;
const ACCEPTED_WRITE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

/// What a reconciliation pass did with one intent.
enum Reconciled {
    Resolved,
    Pending,
}

/// `SettlementApi` drives a payment through both phases of the split-payment flow: collecting the total from the
/// payer, then paying the payee their share once the collection has succeeded.
///
/// Every state change goes through [`SettlementDatabase::transition_intent`], which only applies a change if the intent
/// is still in the state the change expects. Callers racing each other (duplicate callbacks, a callback racing a
/// reconciliation pass) therefore resolve to exactly one winner; everyone else sees [`CallbackOutcome::Duplicate`].
#[derive(Clone)]
pub struct SettlementApi<B, G> {
    db: B,
    gateway: G,
    settings: SettingsCache<B>,
    producers: EventProducers,
    config: SettlementConfig,
}

impl<B, G> Debug for SettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({})", self.config.currency)
    }
}

impl<B, G> SettlementApi<B, G> {
    pub fn new(
        db: B,
        gateway: G,
        settings: SettingsCache<B>,
        producers: EventProducers,
        config: SettlementConfig,
    ) -> Self {
        Self { db, gateway, settings, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> &SettingsCache<B> {
        &self.settings
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

impl<B, G> SettlementApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    /// Starts a payment for an accepted job application.
    ///
    /// The split is computed with the current platform rate and frozen into a new intent, then the gateway is asked to
    /// collect the total from the payer. If the gateway refuses, the intent is marked `Failed` and the gateway's error
    /// is returned. Nothing is retried.
    pub async fn initiate_payment(&self, req: InitiatePaymentRequest) -> Result<InitiatedPayment, SettlementError> {
        if !req.amount.is_positive() {
            return Err(SettlementError::InvalidAmount(format!("The amount must be positive, but was {}", req.amount)));
        }
        if req.payer_contact.trim().is_empty() || req.payee_contact.trim().is_empty() {
            return Err(SettlementError::ValidationError("Both payer and payee contacts are required".into()));
        }
        let job = self
            .db
            .fetch_job(&req.job_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("Job {}", req.job_id)))?;
        if job.owner_id != req.payer_id {
            warn!("🔄️ User {} tried to pay for job {}, which belongs to {}", req.payer_id, job.id, job.owner_id);
            return Err(SettlementError::NotAuthorized("Only the job's owner can pay for it".into()));
        }
        match job.status {
            JobStatus::Fulfilled => {
                return Err(SettlementError::AlreadyPaid { job_id: job.id, application_id: req.application_id });
            },
            JobStatus::Cancelled => {
                return Err(SettlementError::ValidationError(format!("Job {} has been cancelled", job.id)));
            },
            JobStatus::Open | JobStatus::InProgress => {},
        }
        let application = self
            .db
            .fetch_application(&req.application_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("Application {}", req.application_id)))?;
        if application.job_id != job.id {
            return Err(SettlementError::ValidationError(format!(
                "Application {} is not for job {}",
                application.id, job.id
            )));
        }
        if application.status != ApplicationStatus::Accepted {
            return Err(SettlementError::ValidationError(format!(
                "Application {} is {}, not accepted",
                application.id, application.status
            )));
        }
        let rate = self.settings.commission_rate().await?;
        let split = compute_split(req.amount, rate)?;
        let new_intent = NewPaymentIntent {
            job_id: job.id,
            application_id: application.id,
            payer_id: req.payer_id,
            payee_id: application.applicant_id,
            payer_contact: req.payer_contact,
            payee_contact: req.payee_contact,
            description: req.description,
            currency: self.config.currency.clone(),
            split,
        };
        let intent = self.db.insert_intent(new_intent).await?;
        info!(
            "🔄️ Payment #{} created for job {}: {} total, {} to payee, {} commission at {}",
            intent.id, intent.job_id, split.total, split.payee_amount, split.commission, split.rate
        );

        let order = CollectionOrder {
            reference: intent.reference(),
            payer_contact: intent.payer_contact.clone(),
            amount: intent.total_amount,
            description: intent.description.clone().unwrap_or_else(|| format!("Payment for job {}", intent.job_id)),
            callback_url: self.config.collection_callback_url(),
        };
        match self.gateway.initiate_collection(order).await {
            Ok(correlation_id) => {
                debug!("🔄️ Collection for payment #{} accepted by the gateway as {correlation_id}", intent.id);
                let transition = IntentTransition::CollectionRequested { correlation_id: correlation_id.clone() };
                let intent = match self.record_accepted_transfer(intent.id, transition).await? {
                    TransitionResult::Applied(intent) => {
                        self.notify(&intent.payee_id, NotificationKind::CollectionRequested, &intent);
                        intent
                    },
                    TransitionResult::Unchanged(intent) => {
                        warn!("🔄️ Payment #{} changed state before its collection id was stored", intent.id);
                        intent
                    },
                };
                Ok(InitiatedPayment {
                    intent_id: intent.id,
                    split,
                    status: intent.status,
                    collection_correlation_id: Some(correlation_id),
                })
            },
            Err(e) => {
                warn!("🔄️ The gateway did not accept the collection for payment #{}: {e}", intent.id);
                let transition = IntentTransition::CollectionFailed {
                    from: PaymentStatus::Initiated,
                    reason: e.reason().to_string(),
                    code: e.code().map(String::from),
                };
                if let TransitionResult::Applied(intent) = self.db.transition_intent(intent.id, transition).await? {
                    self.notify(&intent.payer_id, NotificationKind::PaymentFailed, &intent);
                }
                Err(e.into())
            },
        }
    }

    /// Dispatches an authenticated gateway callback to the matching handler.
    pub async fn handle_callback(&self, callback: GatewayCallback) -> Result<CallbackOutcome, SettlementError> {
        match callback {
            GatewayCallback::Collection(result) => self.handle_collection_result(result).await,
            GatewayCallback::Payout(result) => self.handle_payout_result(result).await,
        }
    }

    /// Applies the outcome of a collection request.
    ///
    /// A successful collection completes the payment, marks the job as fulfilled and immediately starts the payout. A
    /// failure to *start* the payout is recorded on the intent but does not make this call fail: the payer's money has
    /// been collected either way.
    pub async fn handle_collection_result(&self, result: CollectionResult) -> Result<CallbackOutcome, SettlementError> {
        let intent = self
            .db
            .fetch_intent_by_collection_id(&result.correlation_id)
            .await?
            .ok_or_else(|| SettlementError::UnknownCorrelation(result.correlation_id.clone()))?;
        if intent.status.is_terminal() {
            debug!(
                "🔄️ Collection result for {} ignored. Payment #{} is already {}",
                result.correlation_id, intent.id, intent.status
            );
            return Ok(CallbackOutcome::Duplicate);
        }
        let transition = match result.outcome {
            TransferOutcome::Succeeded => {
                IntentTransition::CollectionCompleted { receipt: result.receipt, completed_at: Utc::now() }
            },
            TransferOutcome::Failed => IntentTransition::CollectionFailed {
                from: PaymentStatus::AwaitingCollectionResult,
                reason: result.failure_reason.unwrap_or_else(|| "The collection failed".into()),
                code: result.failure_code,
            },
        };
        let intent = match self.db.transition_intent(intent.id, transition).await? {
            TransitionResult::Applied(intent) => intent,
            TransitionResult::Unchanged(intent) => {
                debug!("🔄️ Payment #{} was settled by a concurrent update. Nothing to do", intent.id);
                return Ok(CallbackOutcome::Duplicate);
            },
        };
        if intent.status == PaymentStatus::Completed {
            info!("🔄️ Payment #{} collected. Job {} is fulfilled", intent.id, intent.job_id);
            self.notify(&intent.payer_id, NotificationKind::PaymentCompleted, &intent);
            self.notify(&intent.payee_id, NotificationKind::PaymentCompleted, &intent);
            match self.initiate_payout(&intent).await {
                Ok(Some(intent)) => debug!("🔄️ Payout for payment #{} is {}", intent.id, intent.payout_status),
                Ok(None) => debug!("🔄️ Payout for payment #{} was already claimed", intent.id),
                Err(e) => warn!("🔄️ Payment #{} was collected, but the payout did not start. {e}", intent.id),
            }
        } else {
            info!("🔄️ Payment #{} failed. {}", intent.id, intent.failure_reason.as_deref().unwrap_or_default());
            self.notify(&intent.payer_id, NotificationKind::PaymentFailed, &intent);
        }
        Ok(CallbackOutcome::Applied)
    }

    /// Applies the outcome of a payout request. The primary state of the payment is never changed.
    pub async fn handle_payout_result(&self, result: PayoutResult) -> Result<CallbackOutcome, SettlementError> {
        let intent = self
            .db
            .fetch_intent_by_payout_id(&result.correlation_id)
            .await?
            .ok_or_else(|| SettlementError::UnknownCorrelation(result.correlation_id.clone()))?;
        if intent.payout_status != PayoutStatus::AwaitingPayoutResult {
            debug!(
                "🔄️ Payout result for {} ignored. Payment #{} payout is {}",
                result.correlation_id, intent.id, intent.payout_status
            );
            return Ok(CallbackOutcome::Duplicate);
        }
        let transition = match result.outcome {
            TransferOutcome::Succeeded => IntentTransition::PayoutCompleted { completed_at: Utc::now() },
            TransferOutcome::Failed => IntentTransition::PayoutFailed {
                reason: result.reason.unwrap_or_else(|| "The payout failed".into()),
            },
        };
        let intent = match self.db.transition_intent(intent.id, transition).await? {
            TransitionResult::Applied(intent) => intent,
            TransitionResult::Unchanged(intent) => {
                debug!("🔄️ Payout for payment #{} was settled by a concurrent update. Nothing to do", intent.id);
                return Ok(CallbackOutcome::Duplicate);
            },
        };
        if intent.payout_status == PayoutStatus::PayoutCompleted {
            info!("🔄️ {} paid out to {} for payment #{}", intent.payee_amount, intent.payee_id, intent.id);
            self.notify(&intent.payee_id, NotificationKind::PayoutCompleted, &intent);
        } else {
            self.payout_failed(intent);
        }
        Ok(CallbackOutcome::Applied)
    }

    /// Re-issues the payout for a completed payment whose previous payout failed.
    pub async fn retry_payout(&self, intent_id: i64) -> Result<PaymentIntent, SettlementError> {
        let intent = self
            .db
            .fetch_intent(intent_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("Payment {intent_id}")))?;
        if intent.status != PaymentStatus::Completed || intent.payout_status != PayoutStatus::PayoutFailed {
            return Err(SettlementError::PayoutNotAllowed(format!(
                "Payment #{intent_id} is {}, and its payout is {}. Only failed payouts of completed payments can be \
                 retried",
                intent.status, intent.payout_status
            )));
        }
        info!("🔄️ Retrying the payout for payment #{intent_id}");
        match self.start_payout(&intent, PayoutStatus::PayoutFailed).await? {
            Some(intent) => Ok(intent),
            None => Err(SettlementError::PayoutNotAllowed(format!(
                "The payout for payment #{intent_id} is already being retried"
            ))),
        }
    }

    /// Resolves transfers that have been left hanging for longer than `older_than`:
    /// * collections still waiting for a callback are queried by correlation id, and any definitive answer is applied
    ///   exactly as if the callback had arrived;
    /// * collections and payouts whose gateway correlation id was never recorded are looked up by our own reference.
    ///   If the gateway has them, the correlation id is recorded and the transfer is treated as above. If not, the
    ///   attempt is marked as failed so that it can be started again.
    pub async fn reconcile_stale(&self, older_than: Duration) -> Result<ReconciliationReport, SettlementError> {
        let cutoff = Utc::now() - older_than;
        let collections = self.db.fetch_stale_collections(cutoff).await?;
        let payouts = self.db.fetch_uncorrelated_payouts(cutoff).await?;
        let mut report = ReconciliationReport { examined: collections.len() + payouts.len(), ..Default::default() };
        for intent in collections {
            let result = self.reconcile_collection(&intent).await;
            tally(&mut report, intent.id, result);
        }
        for intent in payouts {
            let result = self.reconcile_payout(&intent).await;
            tally(&mut report, intent.id, result);
        }
        if report.examined > 0 {
            info!("🔄️ Reconciliation pass: {report:?}");
        }
        Ok(report)
    }

    async fn reconcile_collection(&self, intent: &PaymentIntent) -> Result<Reconciled, SettlementError> {
        let status = match intent.collection_correlation_id.as_deref() {
            Some(correlation_id) => self.gateway.query_status(correlation_id).await?,
            None => match self.gateway.find_transfer(TransferKind::Collection, &intent.reference()).await? {
                Some(status) => {
                    warn!(
                        "🔄️ The collection for payment #{} was accepted by the gateway as {}, but this was never \
                         recorded. Recording it now",
                        intent.id, status.correlation_id
                    );
                    let transition =
                        IntentTransition::CollectionRequested { correlation_id: status.correlation_id.clone() };
                    if let TransitionResult::Applied(intent) = self.db.transition_intent(intent.id, transition).await? {
                        self.notify(&intent.payee_id, NotificationKind::CollectionRequested, &intent);
                    }
                    status
                },
                None => {
                    warn!("🔄️ The gateway has no record of the collection for payment #{}. Failing it", intent.id);
                    let transition = IntentTransition::CollectionFailed {
                        from: PaymentStatus::Initiated,
                        reason: "The collection request never reached the gateway".into(),
                        code: Some(NOT_SUBMITTED_CODE.into()),
                    };
                    if let TransitionResult::Applied(intent) = self.db.transition_intent(intent.id, transition).await? {
                        self.notify(&intent.payer_id, NotificationKind::PaymentFailed, &intent);
                    }
                    return Ok(Reconciled::Resolved);
                },
            },
        };
        let correlation_id = intent.collection_correlation_id.as_deref().unwrap_or(&status.correlation_id);
        let result = match status.state {
            TransferState::Pending => {
                trace!("🔄️ Collection {correlation_id} is still pending");
                return Ok(Reconciled::Pending);
            },
            TransferState::Succeeded => CollectionResult::succeeded(correlation_id, status.receipt.clone()),
            TransferState::Failed => {
                let reason = status.reason.as_deref().unwrap_or("The gateway reported the collection as failed");
                CollectionResult::failed(correlation_id, reason, None)
            },
        };
        let outcome = self.handle_collection_result(result).await?;
        debug!("🔄️ Reconciled the collection for payment #{}: {outcome:?}", intent.id);
        Ok(Reconciled::Resolved)
    }

    async fn reconcile_payout(&self, intent: &PaymentIntent) -> Result<Reconciled, SettlementError> {
        let found = match intent.payout_reference.as_deref() {
            Some(reference) => self.gateway.find_transfer(TransferKind::Payout, reference).await?,
            None => None,
        };
        let Some(TransferStatus { correlation_id, state, reason, .. }) = found else {
            warn!("🔄️ The gateway has no record of the payout for payment #{}. Marking it as failed", intent.id);
            let transition =
                IntentTransition::PayoutFailed { reason: "The payout request never reached the gateway".into() };
            if let TransitionResult::Applied(intent) = self.db.transition_intent(intent.id, transition).await? {
                self.payout_failed(intent);
            }
            return Ok(Reconciled::Resolved);
        };
        warn!(
            "🔄️ The payout for payment #{} was accepted by the gateway as {correlation_id}, but this was never \
             recorded. Recording it now",
            intent.id
        );
        let transition = IntentTransition::PayoutRequested { correlation_id: correlation_id.clone() };
        self.db.transition_intent(intent.id, transition).await?;
        let outcome = match state {
            TransferState::Pending => return Ok(Reconciled::Pending),
            TransferState::Succeeded => TransferOutcome::Succeeded,
            TransferState::Failed => TransferOutcome::Failed,
        };
        let outcome = self.handle_payout_result(PayoutResult { correlation_id, outcome, reason }).await?;
        debug!("🔄️ Reconciled the payout for payment #{}: {outcome:?}", intent.id);
        Ok(Reconciled::Resolved)
    }

    /// Starts the payout for a payment that has just been collected. Returns `None` if the payout has already been
    /// claimed by someone else.
    async fn initiate_payout(&self, intent: &PaymentIntent) -> Result<Option<PaymentIntent>, SettlementError> {
        self.start_payout(intent, PayoutStatus::None).await
    }

    /// Claims the payout (`from` -> `AwaitingPayoutResult`) before calling the gateway, so that no two callers can both
    /// request it.
    async fn start_payout(
        &self,
        intent: &PaymentIntent,
        from: PayoutStatus,
    ) -> Result<Option<PaymentIntent>, SettlementError> {
        let reference = format!("{}-payout-{}", intent.reference(), Utc::now().timestamp_millis());
        let claim = IntentTransition::PayoutClaimed { from, reference: reference.clone() };
        let claimed = match self.db.transition_intent(intent.id, claim).await? {
            TransitionResult::Applied(intent) => intent,
            TransitionResult::Unchanged(_) => return Ok(None),
        };
        let order = PayoutOrder {
            reference,
            payee_contact: claimed.payee_contact.clone(),
            amount: claimed.payee_amount,
            remarks: format!("Payout for job {}", claimed.job_id),
            callback_url: self.config.payout_callback_url(),
        };
        match self.gateway.initiate_payout(order).await {
            Ok(correlation_id) => {
                debug!("🔄️ Payout for payment #{} accepted by the gateway as {correlation_id}", claimed.id);
                let transition = IntentTransition::PayoutRequested { correlation_id };
                let intent = self.record_accepted_transfer(claimed.id, transition).await?.into_intent();
                Ok(Some(intent))
            },
            Err(e) => {
                warn!("🔄️ The gateway did not accept the payout for payment #{}: {e}", claimed.id);
                let transition = IntentTransition::PayoutFailed { reason: e.reason().to_string() };
                if let TransitionResult::Applied(intent) = self.db.transition_intent(claimed.id, transition).await? {
                    self.payout_failed(intent);
                }
                Err(SettlementError::PayoutFailure(e.to_string()))
            },
        }
    }

    /// Records the correlation id of a transfer the gateway has just accepted.
    ///
    /// The money is moving at this point, so a failed write is retried a few times. If it still fails, the transfer is
    /// left for [`Self::reconcile_stale`], which finds it again by our reference.
    async fn record_accepted_transfer(
        &self,
        intent_id: i64,
        transition: IntentTransition,
    ) -> Result<TransitionResult, SettlementError> {
        let mut attempt = 1;
        loop {
            match self.db.transition_intent(intent_id, transition.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < ACCEPTED_WRITE_ATTEMPTS => {
                    warn!("🔄️ Could not record [{transition}] for payment #{intent_id} (attempt {attempt}). {e}");
                    tokio::time::sleep(ACCEPTED_WRITE_BACKOFF * attempt).await;
                    attempt += 1;
                },
                Err(e) => {
                    let detail = transition.detail().unwrap_or_default();
                    error!(
                        "🔄️ The gateway accepted a transfer for payment #{intent_id} ({detail}), but it could not be \
                         recorded after {attempt} attempts. Reconciliation will pick it up. {e}"
                    );
                    return Err(e.into());
                },
            }
        }
    }

    fn payout_failed(&self, intent: PaymentIntent) {
        let reason = intent.payout_failure_reason.clone().unwrap_or_default();
        error!("🔄️ Payout for payment #{} failed: {reason}. Collected funds need manual attention", intent.id);
        self.notify(&intent.payee_id, NotificationKind::PayoutFailed, &intent);
        self.producers.payout_failed(PayoutFailedEvent::new(intent, reason));
    }

    fn notify(&self, recipient: &str, kind: NotificationKind, intent: &PaymentIntent) {
        trace!("📬️ Notifying {recipient}: {kind} for payment #{}", intent.id);
        self.producers.notify(NotificationEvent::new(recipient, kind, intent));
    }
}

fn tally(report: &mut ReconciliationReport, intent_id: i64, result: Result<Reconciled, SettlementError>) {
    match result {
        Ok(Reconciled::Resolved) => report.resolved += 1,
        Ok(Reconciled::Pending) => report.still_pending += 1,
        Err(e) => {
            warn!("🔄️ Could not reconcile payment #{intent_id}. {e}");
            report.errors += 1;
        },
    }
}
