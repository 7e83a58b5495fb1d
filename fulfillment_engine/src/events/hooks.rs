use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::events::{EventHandler, EventProducer, FulfillmentEvent, Handler};

/// The publishing side. Cheap to clone; every engine API holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    producers: Vec<EventProducer<FulfillmentEvent>>,
}

impl EventProducers {
    /// Hands the event to every subscribed hook.
    pub async fn publish(&self, event: FulfillmentEvent) {
        if self.producers.is_empty() {
            trace!("📬️ No event hooks registered. Event dropped.");
            return;
        }
        for producer in &self.producers {
            producer.publish_event(event.clone()).await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

pub struct EventHandlers {
    handlers: Vec<EventHandler<FulfillmentEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let handlers = hooks.hooks.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect();
        Self { handlers }
    }

    pub fn producers(&self) -> EventProducers {
        let producers = self.handlers.iter().map(|h| h.subscribe()).collect();
        EventProducers { producers }
    }

    /// Spawns every handler. Each task finishes once all producers are dropped and its in-flight jobs are done.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        debug!("📬️ Starting {} event handlers", self.handlers.len());
        self.handlers.into_iter().map(|handler| tokio::spawn(handler.start_handler())).collect()
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    hooks: Vec<Handler<FulfillmentEvent>>,
}

impl EventHooks {
    pub fn on_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(FulfillmentEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.hooks.push(Arc::new(f));
        self
    }

    pub fn add_handler(&mut self, handler: Handler<FulfillmentEvent>) -> &mut Self {
        self.hooks.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
