//! The poll loop: one blocking `a_check` call per iteration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use longpoll_api::{ApiClient, ApiError, LongPollApi};
use reqwest::Client;
use tracing::{debug, error, info};

use crate::dispatch::EventRouter;
use crate::error::Result;
use crate::events::{EventContext, PollResponse};
use crate::session::{Session, SessionManager};

/// Seconds the server may hold each poll open
pub const DEFAULT_WAIT_SECONDS: u32 = 25;

type FullResponseObserver = Box<dyn Fn(&PollResponse) + Send + Sync>;

/// Stops a running [`Longpoll`] from another task.
///
/// The flag is checked between iterations only. A poll already in flight
/// finishes, its events are dispatched and its observers notified before the
/// loop returns.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    stopping: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.stopping.store(false, Ordering::SeqCst);
    }
}

/// Bots long poll client
pub struct Longpoll<A = ApiClient> {
    session: SessionManager<A>,
    http: Client,
    router: EventRouter,
    observers: Vec<FullResponseObserver>,
    shutdown: ShutdownHandle,
}

impl<A: LongPollApi> Longpoll<A> {
    /// Bootstrap a session for `group_id`
    pub async fn new(api: A, group_id: i64) -> Result<Self> {
        let session = SessionManager::connect(api, group_id, DEFAULT_WAIT_SECONDS).await?;

        Ok(Self {
            session,
            http: Client::new(),
            router: EventRouter::new(),
            observers: Vec::new(),
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Bootstrap a session for the group the API token belongs to
    pub async fn for_community(api: A) -> Result<Self> {
        let group_id = api.current_group_id().await?;
        Self::new(api, group_id).await
    }

    pub fn with_wait(mut self, wait: u32) -> Self {
        self.session.set_wait(wait);
        self
    }

    /// Client used for `a_check` calls. It should not carry a request timeout
    /// shorter than the wait time.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn session(&self) -> &Session {
        self.session.session()
    }

    pub fn group_id(&self) -> i64 {
        self.session.group_id()
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Event handlers. Register them before calling [`start`](Self::start).
    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    /// Observe every decoded response, after its events were dispatched
    pub fn on_full_response<F>(&mut self, f: F)
    where
        F: Fn(&PollResponse) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(f));
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Ask the loop to exit after the current iteration
    pub fn stop(&self) {
        self.shutdown.stop();
    }

    /// One poll call, with the session updated from its outcome
    pub async fn check(&mut self) -> Result<PollResponse> {
        let response = self.poll().await?;
        let action = self.session.apply(&response).await?;
        if response.is_failure() {
            debug!(failed = ?response.failed, ?action, "recovered from poll failure");
        }
        Ok(response)
    }

    /// Poll until stopped or until an error ends the loop.
    ///
    /// Clears any earlier stop request and resumes from the current session.
    pub async fn start(&mut self) -> Result<()> {
        self.shutdown.reset();
        info!(group_id = self.group_id(), "long poll started");

        let result = self.run().await;
        match &result {
            Ok(()) => info!(group_id = self.group_id(), "long poll stopped"),
            Err(e) => error!(group_id = self.group_id(), error = %e, "long poll terminated"),
        }
        result
    }

    async fn run(&mut self) -> Result<()> {
        while !self.shutdown.is_stopping() {
            let response = self.check().await?;

            let ctx = EventContext {
                ts: response.ts.clone(),
                group_id: self.group_id(),
            };
            for event in &response.updates {
                self.router.dispatch(&ctx, event).await?;
            }

            for observer in &self.observers {
                observer(&response);
            }
        }

        Ok(())
    }

    async fn poll(&self) -> Result<PollResponse> {
        let session = self.session.session();
        debug!(server = %session.server, ts = %session.ts, wait = session.wait, "polling");

        let response = self
            .http
            .get(&session.server)
            .query(&[
                ("act", "a_check"),
                ("key", session.key.as_str()),
                ("ts", session.ts.as_str()),
            ])
            .query(&[("wait", session.wait)])
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {}: {}", status, text),
            }
            .into());
        }

        let body: PollResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        debug!(ts = %body.ts, updates = body.updates.len(), failed = ?body.failed, "poll returned");
        Ok(body)
    }
}

impl<A> std::fmt::Debug for Longpoll<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Longpoll")
            .field("router", &self.router)
            .field("observers", &self.observers.len())
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
