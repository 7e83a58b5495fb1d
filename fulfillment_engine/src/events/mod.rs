mod channel;
mod dispatcher;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use dispatcher::{
    plan_notifications,
    DeliveryError,
    DeliveryPolicy,
    LogMessageSender,
    MessageSender,
    NotificationDispatcher,
    OutboundMessage,
    PlannedNotification,
};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
