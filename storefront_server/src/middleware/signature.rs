//! Webhook signature middleware for Actix Web.
//!
//! The payment gateway signs the raw body of every webhook delivery and puts the result in the
//! `X-Payment-Signature` header (`t=<unix>,v1=<hex hmac-sha256>`). Wrap the webhook scope with this middleware to
//! reject unsigned, tampered or replayed deliveries before any handler runs.
//!
//! A deployment without a configured signing secret must not silently accept events: in that case every webhook
//! request is rejected with a server error until the secret is set.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden, ErrorInternalServerError},
    web,
    Error,
};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use log::{error, trace, warn};
use shop_common::Secret;

use crate::helpers::{verify_signature_header, SignatureError};

pub const SIGNATURE_HEADER: &str = "X-Payment-Signature";

pub struct SignatureMiddlewareFactory {
    secret: Option<Secret<String>>,
    tolerance: Duration,
    // If false, the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(secret: Option<Secret<String>>, tolerance: Duration, enabled: bool) -> Self {
        Self { secret, tolerance, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    secret: Option<Secret<String>>,
    tolerance: Duration,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
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
        let secret = self.secret.clone();
        let tolerance = self.tolerance;
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for request");
            if !enabled {
                trace!("🔐️ Signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let secret = match secret {
                Some(s) if !s.is_unset() => s,
                _ => {
                    error!(
                        "🔐️ A webhook arrived but no signing secret is configured. The request is rejected; set \
                         SFS_PAYMENT_WEBHOOK_SECRET to start accepting webhooks."
                    );
                    return Err(ErrorInternalServerError("Webhook signing secret is not configured."));
                },
            };
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No signature found in webhook request. Denying access.");
                    ErrorBadRequest("No webhook signature found.")
                })?
                .to_string();
            match verify_signature_header(secret.reveal(), &header, data.as_ref(), tolerance, Utc::now()) {
                Ok(()) => {
                    trace!("🔐️ Signature check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(SignatureError::Malformed) => {
                    warn!("🔐️ Malformed webhook signature header. Denying access.");
                    Err(ErrorBadRequest("Malformed webhook signature."))
                },
                Err(e) => {
                    warn!("🔐️ Invalid webhook signature ({e}). Denying access.");
                    Err(ErrorForbidden("Invalid webhook signature."))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
