use std::sync::Arc;

use chrono::{Duration, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MomoConfig,
    data_objects::{ErrorBody, TokenRequest, TokenResponse, TransferBody},
    AccessToken,
    CollectionRequest,
    GatewayReceipt,
    MomoApiError,
    PayoutRequest,
    TokenCache,
    TransactionState,
    TransactionStatus,
};

#[derive(Clone)]
pub struct MomoApi {
    config: MomoConfig,
    client: Arc<Client>,
    tokens: Arc<TokenCache>,
}

impl MomoApi {
    pub fn new(config: MomoConfig) -> Result<Self, MomoApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| MomoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), tokens: Arc::new(TokenCache::default()) })
    }

    pub fn config(&self) -> &MomoConfig {
        &self.config
    }

    pub fn is_sandbox(&self) -> bool {
        self.config.sandbox
    }

    /// Returns a valid bearer token, exchanging credentials with the gateway only when the cached token is missing or
    /// about to expire. Concurrent callers share a single exchange.
    pub async fn access_token(&self) -> Result<String, MomoApiError> {
        let token = self.tokens.get_or_refresh(|| self.exchange_credentials()).await?;
        Ok(token.reveal().clone())
    }

    async fn exchange_credentials(&self) -> Result<AccessToken, MomoApiError> {
        if self.config.sandbox {
            return Ok(AccessToken::new("sandbox-token".into(), Utc::now() + Duration::hours(24)));
        }
        debug!("📡️ Exchanging gateway credentials for an access token");
        let body = TokenRequest { api_key: self.config.api_key.reveal(), api_secret: self.config.api_secret.reveal() };
        let response = self.client.post(self.config.url("/v1/auth/token")).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("📡️ Gateway credential exchange failed. Status {status}. {message}");
            return Err(MomoApiError::Authentication(format!("status {status}: {message}")));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| MomoApiError::JsonError(e.to_string()))?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        Ok(AccessToken::new(token.access_token, expires_at))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MomoApiError> {
        let token = self.access_token().await?;
        let url = self.config.url(path);
        trace!("📡️ Sending gateway request: {method} {url}");
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("📡️ Gateway request successful. {status}");
            return response.json::<T>().await.map_err(|e| MomoApiError::JsonError(e.to_string()));
        }
        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                self.tokens.invalidate().await;
                Err(MomoApiError::Authentication(format!("gateway refused our token. {text}")))
            },
            s if s.is_client_error() => {
                let body = serde_json::from_str::<ErrorBody>(&text).ok();
                let code = body.as_ref().and_then(|b| b.code.clone()).unwrap_or_else(|| s.as_u16().to_string());
                let message = body.and_then(|b| b.message).unwrap_or(text);
                Err(MomoApiError::Rejected { code, message })
            },
            s => Err(MomoApiError::QueryError { status: s.as_u16(), message: text }),
        }
    }

    /// Asks the gateway to debit the payer. A successful return only means the request was accepted; the outcome is
    /// delivered later by callback.
    pub async fn initiate_collection(&self, request: &CollectionRequest) -> Result<GatewayReceipt, MomoApiError> {
        if self.config.sandbox {
            info!("📡️ [sandbox] Collection of {} from {} accepted", request.amount, request.payer_contact);
            return Ok(sandbox_receipt("col"));
        }
        let body = TransferBody {
            site_id: &self.config.site_id,
            currency: &self.config.currency,
            contact: &request.payer_contact,
            amount: request.amount.value(),
            reference: &request.reference,
            description: &request.description,
            notify_url: &request.callback_url,
        };
        debug!("📡️ Requesting collection of {} for {}", request.amount, request.reference);
        let receipt = self.rest_query::<GatewayReceipt, _>(Method::POST, "/v1/collections", Some(body)).await?;
        let receipt = reject_if_failed(receipt)?;
        info!("📡️ Collection for {} accepted by gateway as {}", request.reference, receipt.transaction_id);
        Ok(receipt)
    }

    /// Asks the gateway to credit the payee. As with collections, the outcome arrives by callback.
    pub async fn initiate_payout(&self, request: &PayoutRequest) -> Result<GatewayReceipt, MomoApiError> {
        if self.config.sandbox {
            info!("📡️ [sandbox] Payout of {} to {} accepted", request.amount, request.payee_contact);
            return Ok(sandbox_receipt("pay"));
        }
        let body = TransferBody {
            site_id: &self.config.site_id,
            currency: &self.config.currency,
            contact: &request.payee_contact,
            amount: request.amount.value(),
            reference: &request.reference,
            description: &request.remarks,
            notify_url: &request.callback_url,
        };
        debug!("📡️ Requesting payout of {} for {}", request.amount, request.reference);
        let receipt = self.rest_query::<GatewayReceipt, _>(Method::POST, "/v1/payouts", Some(body)).await?;
        let receipt = reject_if_failed(receipt)?;
        info!("📡️ Payout for {} accepted by gateway as {}", request.reference, receipt.transaction_id);
        Ok(receipt)
    }

    /// Fetches the current state of a collection by its gateway correlation id.
    pub async fn query_status(&self, transaction_id: &str) -> Result<TransactionStatus, MomoApiError> {
        if self.config.sandbox {
            return Ok(TransactionStatus {
                transaction_id: transaction_id.to_string(),
                status: TransactionState::Successful,
                receipt: Some(format!("sandbox-receipt-{transaction_id}")),
                reason: None,
            });
        }
        let path = format!("/v1/collections/{transaction_id}");
        let status = self.rest_query::<TransactionStatus, ()>(Method::GET, &path, None).await?;
        debug!("📡️ Gateway reports {transaction_id} as {}", status.status);
        Ok(status)
    }

    /// Finds a collection by the reference we gave it, for requests whose gateway id was lost on our side.
    pub async fn find_collection(&self, reference: &str) -> Result<Option<TransactionStatus>, MomoApiError> {
        self.find_by_reference("collections", reference).await
    }

    pub async fn find_payout(&self, reference: &str) -> Result<Option<TransactionStatus>, MomoApiError> {
        self.find_by_reference("payouts", reference).await
    }

    async fn find_by_reference(
        &self,
        resource: &str,
        reference: &str,
    ) -> Result<Option<TransactionStatus>, MomoApiError> {
        if self.config.sandbox {
            // Sandbox transfers are never stored
            return Ok(None);
        }
        let path = format!("/v1/{resource}?reference={reference}");
        let matches = self.rest_query::<Vec<TransactionStatus>, ()>(Method::GET, &path, None).await?;
        match matches.first() {
            Some(status) => debug!("📡️ Gateway knows {reference} as {} ({})", status.transaction_id, status.status),
            None => debug!("📡️ Gateway has no {resource} with reference {reference}"),
        }
        Ok(matches.into_iter().next())
    }
}

fn reject_if_failed(receipt: GatewayReceipt) -> Result<GatewayReceipt, MomoApiError> {
    if receipt.status == TransactionState::Failed {
        let message = receipt.message.unwrap_or_else(|| "declined without a reason".to_string());
        return Err(MomoApiError::Rejected { code: "DECLINED".to_string(), message });
    }
    Ok(receipt)
}

fn sandbox_receipt(prefix: &str) -> GatewayReceipt {
    let id = rand::random::<u64>();
    GatewayReceipt {
        transaction_id: format!("sandbox-{prefix}-{id:016x}"),
        status: TransactionState::Pending,
        message: Some("sandbox".to_string()),
    }
}
