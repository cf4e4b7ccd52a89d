//! Signature check for gateway callbacks.
//!
//! The mobile-money gateway signs every callback it delivers. The signature is an HMAC-SHA256 of the raw request
//! body, keyed with the shared secret in `SPS_CALLBACK_HMAC_SECRET`, base64 encoded and sent in the
//! `X-Gateway-Signature` header.
//!
//! Wrap the callback scope with this middleware so that no unsigned payment result reaches the settlement engine.
//! Requests with a missing or incorrect signature are rejected with 403. With no secret configured, every callback is
//! rejected.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::*;
use settle_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::verify_hmac,
};

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

#[derive(Clone)]
enum SignatureCheck {
    /// Every request is let through. Development only.
    Disabled,
    /// Checks are on, but there is no key to check against.
    NoKey,
    Enabled { header: String, key: Secret<String> },
}

pub struct HmacMiddlewareFactory {
    check: SignatureCheck,
}

impl HmacMiddlewareFactory {
    pub fn new(header: &str, key: Secret<String>, enabled: bool) -> Self {
        let check = match (enabled, key.is_set()) {
            (false, _) => SignatureCheck::Disabled,
            (true, false) => SignatureCheck::NoKey,
            (true, true) => SignatureCheck::Enabled { header: header.to_string(), key },
        };
        Self { check }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService { check: self.check.clone(), service: Rc::new(service) }))
    }
}

pub struct HmacMiddlewareService<S> {
    check: SignatureCheck,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let check = self.check.clone();
        Box::pin(async move {
            let (header, key) = match check {
                SignatureCheck::Disabled => {
                    trace!("🔐️ Signature checks are disabled. Allowing callback to {}", req.path());
                    return service.call(req).await;
                },
                SignatureCheck::NoKey => {
                    warn!("🔐️ No callback signing secret is configured. Rejecting callback to {}", req.path());
                    return Err(rejected("Callback signatures cannot be verified").into());
                },
                SignatureCheck::Enabled { header, key } => (header, key),
            };
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read callback body. {e}");
                ServerError::InvalidRequestBody(e.to_string())
            })?;
            let signature = req
                .headers()
                .get(&header)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| rejected(&format!("The {header} header is missing")))?;
            if !verify_hmac(key.reveal(), &body, signature) {
                warn!("🔐️ Invalid signature on callback to {}", req.path());
                return Err(rejected("The signature does not match the body").into());
            }
            trace!("🔐️ Callback signature ✅️");
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn rejected(reason: &str) -> ServerError {
    ServerError::AuthenticationError(AuthError::InvalidSignature(reason.to_string()))
}

// The body extractor drained the payload, so hand the handler a fresh one with the same bytes
fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
