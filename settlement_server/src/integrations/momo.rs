//! Adapts the mobile-money client to the settlement engine's [`PaymentGateway`] contract.
//!
//! The client's errors are folded into the engine's two-way split: the gateway either looked at the request and
//! declined it ([`GatewayError::Rejected`]), or we never got a definitive answer ([`GatewayError::Unavailable`]).
use log::*;
use momo_tools::{CollectionRequest, MomoApi, MomoApiError, PayoutRequest, TransactionState, TransactionStatus};
use settlement_engine::traits::{
    CollectionOrder,
    GatewayError,
    PaymentGateway,
    PayoutOrder,
    TransferKind,
    TransferState,
    TransferStatus,
};

#[derive(Clone)]
pub struct MobileMoneyGateway(MomoApi);

impl MobileMoneyGateway {
    pub fn new(api: MomoApi) -> Self {
        if api.is_sandbox() {
            warn!("📡️ The mobile-money gateway is running in sandbox mode. No money will move.");
        }
        Self(api)
    }

    pub fn api(&self) -> &MomoApi {
        &self.0
    }
}

impl PaymentGateway for MobileMoneyGateway {
    async fn initiate_collection(&self, order: CollectionOrder) -> Result<String, GatewayError> {
        let request = CollectionRequest {
            payer_contact: order.payer_contact,
            amount: order.amount,
            reference: order.reference,
            description: order.description,
            callback_url: order.callback_url,
        };
        let receipt = self.0.initiate_collection(&request).await.map_err(gateway_error)?;
        Ok(receipt.transaction_id)
    }

    async fn initiate_payout(&self, order: PayoutOrder) -> Result<String, GatewayError> {
        let request = PayoutRequest {
            payee_contact: order.payee_contact,
            amount: order.amount,
            reference: order.reference,
            remarks: order.remarks,
            callback_url: order.callback_url,
        };
        let receipt = self.0.initiate_payout(&request).await.map_err(gateway_error)?;
        Ok(receipt.transaction_id)
    }

    async fn query_status(&self, correlation_id: &str) -> Result<TransferStatus, GatewayError> {
        let status = self.0.query_status(correlation_id).await.map_err(gateway_error)?;
        Ok(transfer_status(status))
    }

    async fn find_transfer(&self, kind: TransferKind, reference: &str) -> Result<Option<TransferStatus>, GatewayError> {
        let found = match kind {
            TransferKind::Collection => self.0.find_collection(reference).await,
            TransferKind::Payout => self.0.find_payout(reference).await,
        };
        Ok(found.map_err(gateway_error)?.map(transfer_status))
    }
}

fn transfer_status(status: TransactionStatus) -> TransferStatus {
    let state = match status.status {
        TransactionState::Pending => TransferState::Pending,
        TransactionState::Successful => TransferState::Succeeded,
        TransactionState::Failed => TransferState::Failed,
    };
    TransferStatus { correlation_id: status.transaction_id, state, receipt: status.receipt, reason: status.reason }
}

fn gateway_error(e: MomoApiError) -> GatewayError {
    match e {
        MomoApiError::Rejected { code, message } => GatewayError::Rejected { reason: message, code: Some(code) },
        e => {
            debug!("📡️ Gateway call failed without a definitive answer. {e}");
            GatewayError::Unavailable(e.to_string())
        },
    }
}
