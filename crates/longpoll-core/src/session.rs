//! Long poll session state and the failure-code recovery policy

use longpoll_api::LongPollApi;
use tracing::{debug, error, info, warn};

use crate::error::{LongpollError, Result};
use crate::events::PollResponse;

/// Parameters of the next `a_check` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub server: String,
    pub key: String,
    /// Opaque cursor, echoed back on every poll
    pub ts: String,
    /// Seconds the server may hold a poll open
    pub wait: u32,
}

/// What the loop does with a poll response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Take the cursor from the response (`failed` absent, 0 or 1)
    AdvanceCursor,
    /// Re-issue server and key (`failed` 2 keeps the cursor, 3 resets it)
    RefreshSession { reset_cursor: bool },
    /// Undocumented code, the loop cannot continue
    Fatal(i64),
}

impl Action {
    pub fn classify(failed: Option<i64>) -> Self {
        match failed {
            None | Some(0) | Some(1) => Action::AdvanceCursor,
            Some(2) => Action::RefreshSession {
                reset_cursor: false,
            },
            Some(3) => Action::RefreshSession { reset_cursor: true },
            Some(code) => Action::Fatal(code),
        }
    }
}

/// Owns the session and keeps it in sync with the server.
///
/// Server and key are only ever replaced together, by a successful bootstrap.
/// A failed bootstrap leaves the session untouched.
#[derive(Debug)]
pub struct SessionManager<A> {
    api: A,
    group_id: i64,
    session: Session,
}

impl<A: LongPollApi> SessionManager<A> {
    /// Bootstrap a fresh session, cursor included
    pub async fn connect(api: A, group_id: i64, wait: u32) -> Result<Self> {
        let mut manager = Self {
            api,
            group_id,
            session: Session {
                wait,
                ..Session::default()
            },
        };
        manager.bootstrap(true).await?;
        Ok(manager)
    }

    /// Fetch new server credentials; overwrite the cursor only if `reset_cursor`
    pub async fn bootstrap(&mut self, reset_cursor: bool) -> Result<()> {
        let server = self.api.get_long_poll_server(self.group_id).await?;

        self.session.server = server.server;
        self.session.key = server.key;
        if reset_cursor {
            self.session.ts = server.ts;
        }

        info!(
            group_id = self.group_id,
            server = %self.session.server,
            ts = %self.session.ts,
            reset_cursor,
            "long poll session bootstrapped"
        );
        Ok(())
    }

    /// Classify `response` and bring the session up to date.
    ///
    /// Fatal codes return [`LongpollError::UnknownFailureCode`] and leave the
    /// session as it was.
    pub async fn apply(&mut self, response: &PollResponse) -> Result<Action> {
        let action = Action::classify(response.failed);

        match action {
            Action::AdvanceCursor => {
                if response.failed == Some(1) {
                    debug!(ts = %response.ts, "event history outdated, continuing from corrected ts");
                }
                self.session.ts = response.ts.clone();
            }
            Action::RefreshSession { reset_cursor } => {
                warn!(
                    failed = ?response.failed,
                    reset_cursor,
                    "long poll session invalidated, refreshing"
                );
                self.bootstrap(reset_cursor).await?;
            }
            Action::Fatal(code) => {
                error!(failed = code, "unknown long poll failure code");
                return Err(LongpollError::UnknownFailureCode(code));
            }
        }

        Ok(action)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn set_wait(&mut self, wait: u32) {
        self.session.wait = wait;
    }
}
