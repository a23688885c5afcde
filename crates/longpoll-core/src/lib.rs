//! # longpoll-core
//!
//! Client side of the Bots Long Poll API.
//!
//! A [`Longpoll`] bootstraps a server/key/ts session through the API, then
//! loops on blocking `a_check` calls. Each batch of events goes through the
//! [`EventRouter`], then to every full-response observer. Failure codes 1–3
//! from the server are recovered from in place; anything else ends the loop
//! with an error.
//!
//! ```no_run
//! use longpoll_api::ApiClient;
//! use longpoll_core::{handler_fn, Longpoll};
//!
//! # async fn example() -> longpoll_core::Result<()> {
//! let mut lp = Longpoll::for_community(ApiClient::new("community-token")).await?;
//! lp.router_mut().on(
//!     "message_new",
//!     handler_fn(|ctx, event| {
//!         println!("[{}] {}", ctx.ts, event.object);
//!         Ok(())
//!     }),
//! );
//!
//! let shutdown = lp.shutdown_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     shutdown.stop();
//! });
//!
//! lp.start().await
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod events;
pub mod poller;
pub mod session;

pub use dispatch::{handler_fn, EventHandler, EventRouter, FnHandler};
pub use error::{HandlerError, LongpollError, Result};
pub use events::{EventContext, GroupEvent, PollResponse};
pub use poller::{Longpoll, ShutdownHandle, DEFAULT_WAIT_SECONDS};
pub use session::{Action, Session, SessionManager};
