mod payment_notification;
mod signature;

pub use payment_notification::{CallbackParams, MalformedEvent, PaymentNotification, WebhookPayload};
pub use signature::{canonicalize, DeploymentMode, SignatureVerifier, SignedFields};
