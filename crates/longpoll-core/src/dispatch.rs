//! Event handler registry keyed by event type

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::HandlerError;
use crate::events::{EventContext, GroupEvent};

/// Receives events pulled from the long poll server.
///
/// Returning an error stops the poll loop; the error is handed back to the
/// caller of [`Longpoll::start`](crate::Longpoll::start).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &EventContext, event: &GroupEvent) -> Result<(), HandlerError>;
}

/// Adapter turning a plain closure into an [`EventHandler`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a synchronous closure as an event handler
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&EventContext, &GroupEvent) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&EventContext, &GroupEvent) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, ctx: &EventContext, event: &GroupEvent) -> Result<(), HandlerError> {
        (self.f)(ctx, event)
    }
}

/// Routes each event to the handlers registered for its type, then to the
/// catch-all handlers. Handlers run in registration order.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Vec<Box<dyn EventHandler>>>,
    catch_all: Vec<Box<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event type
    pub fn on<H>(&mut self, event_type: impl Into<String>, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        let event_type = event_type.into();
        debug!(event_type = %event_type, "registering event handler");
        self.handlers
            .entry(event_type)
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Register a handler that sees every event
    pub fn on_any<H>(&mut self, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        self.catch_all.push(Box::new(handler));
        self
    }

    /// Register a closure receiving the event object decoded as `T`.
    ///
    /// An object that does not decode into `T` fails the dispatch with
    /// [`HandlerError::Decode`].
    pub fn on_typed<T, F>(&mut self, event_type: impl Into<String>, f: F) -> &mut Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&EventContext, T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let name = event_type.clone();
        self.on(
            event_type,
            handler_fn(move |ctx, event| {
                let object = serde_json::from_value::<T>(event.object.clone()).map_err(
                    |source| HandlerError::Decode {
                        event_type: name.clone(),
                        source,
                    },
                )?;
                f(ctx, object)
            }),
        )
    }

    /// Total number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum::<usize>() + self.catch_all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a dedicated handler exists for `event_type`
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers
            .get(event_type)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Run every matching handler, stopping at the first error
    pub async fn dispatch(&self, ctx: &EventContext, event: &GroupEvent) -> Result<(), HandlerError> {
        let typed = self
            .handlers
            .get(&event.event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if typed.is_empty() && self.catch_all.is_empty() {
            debug!(event_type = %event.event_type, "no handler registered, skipping event");
            return Ok(());
        }

        for handler in typed.iter().chain(self.catch_all.iter()) {
            handler.handle(ctx, event).await?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}
