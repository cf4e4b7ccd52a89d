//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (database queries, gateway calls)
//! must be awaited rather than run synchronously.
use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    db_types::{IntentEvent, Pagination, PaymentIntent},
    settlement_objects::GatewayCallback,
    traits::{IntentManagement, PaymentGateway, SettingsManagement, SettlementDatabase, StatisticsManagement},
    HistoryApi,
    SettingsCache,
    SettlementApi,
    StatisticsApi,
};

use crate::{
    auth::{Caller, Role},
    callback_queue::CallbackQueue,
    config::ServerOptions,
    data_objects::{
        CollectionCallbackBody,
        CommissionRateBody,
        HistoryParams,
        JsonResponse,
        PaymentDetails,
        PaymentRequestBody,
        PayoutCallbackBody,
        TimeoutCallbackBody,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! {
            pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >(
                $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+
            );
        }
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory
            for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! {
            pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >(
                $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+
            );
        }
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory
            for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/initiate-payment" impl SettlementDatabase, PaymentGateway);
/// Route handler for starting a payment.
///
/// The caller must own the job. The amount may be sent as a number or a string, in major units of the platform
/// currency. On success the response holds the new payment's id and the computed split. The payment is then waiting
/// for the payer to approve the debit on their phone; its progress can be followed on `/payment-status/{id}`.
pub async fn initiate_payment<B, G>(
    caller: Caller,
    body: web::Json<PaymentRequestBody>,
    api: web::Data<SettlementApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    debug!("💻️ Payment request from {} for job {}", caller.user_id, body.job_id);
    let request = body.into_inner().into_request(&caller.user_id, options.currency_decimals)?;
    let payment = api.initiate_payment(request).await.map_err(|e| {
        debug!("💻️ Payment request from {} was refused. {e}", caller.user_id);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_status => Get "/payment-status/{id}" impl IntentManagement);
/// The full record of a payment. Only its payer and payee (and administrators) may see it.
pub async fn payment_status<B: IntentManagement>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ Payment status request for #{id} from {}", caller.user_id);
    let payment = visible_payment(&caller, id, &api).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_events => Get "/payment-status/{id}/events" impl IntentManagement);
pub async fn payment_events<B: IntentManagement>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let payment = visible_payment(&caller, id, &api).await?;
    let events: Vec<IntentEvent> = api.payment_events(payment.id).await?;
    Ok(HttpResponse::Ok().json(events))
}

async fn visible_payment<B: IntentManagement>(
    caller: &Caller,
    id: i64,
    api: &HistoryApi<B>,
) -> Result<PaymentIntent, ServerError> {
    let payment = match caller.role {
        Role::Admin => api.payment_by_id(id).await?,
        Role::User => api.payment_status(id, &caller.user_id).await?,
    };
    Ok(payment)
}

route!(payment_history => Get "/payment-history" impl IntentManagement);
/// The caller's payments, made or received, newest first.
pub async fn payment_history<B: IntentManagement>(
    caller: Caller,
    params: web::Query<HistoryParams>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let pagination = Pagination::new(params.page, params.per_page);
    let page = api.payment_history(&caller.user_id, pagination).await?;
    Ok(HttpResponse::Ok().json(page))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(admin_payment => Get "/admin/payments/{id}" impl IntentManagement where requires [Role::Admin]);
pub async fn admin_payment<B: IntentManagement>(
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let payment = api.payment_by_id(id).await?;
    let events = api.payment_events(id).await?;
    Ok(HttpResponse::Ok().json(PaymentDetails { payment, events }))
}

route!(
    retry_payout => Post "/admin/payments/{id}/retry-payout"
    impl SettlementDatabase, PaymentGateway where requires [Role::Admin]
);
/// Re-issues the payout for a collected payment whose payout failed.
pub async fn retry_payout<B, G>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGateway,
{
    let id = path.into_inner();
    info!("💻️ {} requested a payout retry for payment #{id}", caller.user_id);
    let payment = api.retry_payout(id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(commission_rate => Get "/admin/settings/commission" impl SettingsManagement where requires [Role::Admin]);
pub async fn commission_rate<B: SettingsManagement>(
    settings: web::Data<SettingsCache<B>>,
) -> Result<HttpResponse, ServerError> {
    let rate = settings.commission_rate().await?;
    Ok(HttpResponse::Ok().json(CommissionRateBody { rate }))
}

route!(set_commission_rate => Put "/admin/settings/commission" impl SettingsManagement where requires [Role::Admin]);
/// Changes the commission rate for new payments. Payments that already exist keep the rate they were created with.
pub async fn set_commission_rate<B: SettingsManagement>(
    caller: Caller,
    body: web::Json<CommissionRateBody>,
    settings: web::Data<SettingsCache<B>>,
) -> Result<HttpResponse, ServerError> {
    let rate = body.into_inner().rate;
    settings.set_commission_rate(rate).await?;
    info!("💻️ {} set the commission rate to {rate}", caller.user_id);
    Ok(HttpResponse::Ok().json(CommissionRateBody { rate }))
}

route!(statistics => Get "/admin/statistics" impl StatisticsManagement where requires [Role::Admin]);
pub async fn statistics<B: StatisticsManagement>(
    api: web::Data<StatisticsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let snapshot = api.snapshot().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

route!(refresh_statistics => Post "/admin/statistics/refresh" impl StatisticsManagement where requires [Role::Admin]);
pub async fn refresh_statistics<B: StatisticsManagement>(
    api: web::Data<StatisticsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let snapshot = api.refresh().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

//----------------------------------------------   Gateway callbacks  ------------------------------------------------
// These routes sit behind the HMAC middleware. Once a payload is valid it is acknowledged with a 200, whatever the
// outcome of processing it turns out to be; the gateway cannot fix a processing problem by redelivering.

#[post("/collection")]
pub async fn collection_callback(
    body: web::Json<CollectionCallbackBody>,
    queue: web::Data<CallbackQueue>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    debug!("🔐️ Collection callback for {}: {}", body.transaction_id, body.status);
    match body.into_result() {
        Some(result) => enqueue(&queue, GatewayCallback::Collection(result)).await,
        None => Ok(HttpResponse::Ok().json(JsonResponse::success("Interim status noted"))),
    }
}

#[post("/payout")]
pub async fn payout_callback(
    body: web::Json<PayoutCallbackBody>,
    queue: web::Data<CallbackQueue>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    debug!("🔐️ Payout callback for {}: {}", body.transaction_id, body.status);
    match body.into_result() {
        Some(result) => enqueue(&queue, GatewayCallback::Payout(result)).await,
        None => Ok(HttpResponse::Ok().json(JsonResponse::success("Interim status noted"))),
    }
}

#[post("/timeout")]
pub async fn timeout_callback(
    body: web::Json<TimeoutCallbackBody>,
    queue: web::Data<CallbackQueue>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    debug!("🔐️ Timeout callback for {}", body.transaction_id);
    enqueue(&queue, GatewayCallback::Collection(body.into_result())).await
}

async fn enqueue(queue: &CallbackQueue, callback: GatewayCallback) -> Result<HttpResponse, ServerError> {
    let correlation_id = callback.correlation_id().to_string();
    if queue.enqueue(callback).await {
        Ok(HttpResponse::Ok().json(JsonResponse::success("Callback received")))
    } else {
        error!("🔐️ The callback queue is not running. Callback for {correlation_id} was not accepted.");
        Err(ServerError::CallbackQueueUnavailable(format!("Callback for {correlation_id} was not accepted")))
    }
}
