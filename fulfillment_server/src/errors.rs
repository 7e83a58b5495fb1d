use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fulfillment_engine::FulfillmentError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("The server could not start. {0}")]
    InitializeError(String),
    #[error("The fulfillment backend failed. {0}")]
    BackendError(String),
    #[error("Invalid request: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid path parameter: {0}")]
    InvalidRequestPath(String),
    #[error("I/O failure. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The server stopped unexpectedly. {0}")]
    Unspecified(String),
    #[error("Not authorized. {0}")]
    AuthenticationError(String),
    #[error("Not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<FulfillmentError> for ServerError {
    fn from(e: FulfillmentError) -> Self {
        match e {
            FulfillmentError::DatabaseError(s) => {
                error!("💻️ Database error: {s}");
                Self::BackendError(format!("Database error: {s}"))
            },
            FulfillmentError::OrderNotFound(_) |
            FulfillmentError::ProductNotFound(_) |
            FulfillmentError::NotificationNotFound(_) => Self::NoRecordFound(e.to_string()),
            FulfillmentError::TransitionNoOp(_) |
            FulfillmentError::TransitionForbidden { .. } |
            FulfillmentError::ConcurrentModification(_) |
            FulfillmentError::DuplicateOrder(_) => Self::Conflict(e.to_string()),
            FulfillmentError::InvalidQuantity(_) | FulfillmentError::InvalidOrder(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
        }
    }
}
