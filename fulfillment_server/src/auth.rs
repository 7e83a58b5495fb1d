//! Operator identity.
//!
//! The operator API is protected by a shared token (see [`crate::middleware::OperatorAuthFactory`]). Once the token
//! checks out, the middleware stores an [`OperatorIdentity`] in the request extensions, taken from the
//! `ofg_operator_id` header. Handlers extract it to attribute status changes and stock adjustments.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

pub const OPERATOR_TOKEN_HEADER: &str = "ofg_operator_token";
pub const OPERATOR_ID_HEADER: &str = "ofg_operator_id";
/// Used when an authenticated request does not name the operator
pub const ANONYMOUS_OPERATOR: &str = "operator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorIdentity(pub String);

impl OperatorIdentity {
    pub fn from_header(value: Option<&str>) -> Self {
        let id = value.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(ANONYMOUS_OPERATOR);
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromRequest for OperatorIdentity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = req
            .extensions()
            .get::<OperatorIdentity>()
            .cloned()
            .ok_or_else(|| ServerError::AuthenticationError("The request carries no operator credentials.".into()));
        ready(identity)
    }
}
