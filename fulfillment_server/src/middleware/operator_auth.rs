//! Operator token middleware for Actix Web.
//!
//! Wrap the operator API scope with this middleware. Requests must carry the configured operator token in the
//! `ofg_operator_token` header, or they are refused with 401 Unauthorized. The operator's id is read from the
//! `ofg_operator_id` header and made available to handlers as an [`OperatorIdentity`].
//!
//! If no operator token is configured, every request is refused.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use ofg_common::Secret;

use crate::{
    auth::{OperatorIdentity, OPERATOR_ID_HEADER, OPERATOR_TOKEN_HEADER},
    helpers::tokens_match,
};

pub struct OperatorAuthFactory {
    token: Secret<String>,
}

impl OperatorAuthFactory {
    pub fn new(token: Secret<String>) -> Self {
        if token.is_unset() {
            warn!("🔐️ No operator token is configured. The operator API is closed.");
        }
        OperatorAuthFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OperatorAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = OperatorAuthService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OperatorAuthService { token: self.token.clone(), service: Rc::new(service) }))
    }
}

pub struct OperatorAuthService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for OperatorAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let token = self.token.clone();
        Box::pin(async move {
            trace!("🔐️ Checking operator token for {}", req.path());
            if token.is_unset() {
                warn!("🔐️ Operator request to {} refused. No operator token is configured.", req.path());
                return Err(ErrorUnauthorized("The operator API is not enabled."));
            }
            let presented = req.headers().get(OPERATOR_TOKEN_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
                warn!("🔐️ No operator token found in request to {}. Denying access.", req.path());
                ErrorUnauthorized("No operator token found.")
            })?;
            if !tokens_match(presented, token.reveal()) {
                warn!("🔐️ Invalid operator token in request to {}. Denying access.", req.path());
                return Err(ErrorUnauthorized("Invalid operator token."));
            }
            let operator_id = req.headers().get(OPERATOR_ID_HEADER).and_then(|v| v.to_str().ok());
            let identity = OperatorIdentity::from_header(operator_id);
            trace!("🔐️ Operator {} authenticated ✅️", identity.as_str());
            req.extensions_mut().insert(identity);
            service.call(req).await
        })
    }
}
