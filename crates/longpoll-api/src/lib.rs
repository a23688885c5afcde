//! # longpoll-api
//!
//! The slice of the community API that the long poll loop depends on.
//!
//! Only two methods are bound: `groups.getLongPollServer`, which issues the
//! server/key/ts triple a poll session runs on, and `groups.getById`, which
//! resolves the group a community token belongs to. Everything else about the
//! API is out of scope for this crate.
//!
//! ```no_run
//! use longpoll_api::{ApiClient, LongPollApi};
//!
//! # async fn example() -> Result<(), longpoll_api::ApiError> {
//! let api = ApiClient::new("community-token");
//! let group_id = api.current_group_id().await?;
//! let server = api.get_long_poll_server(group_id).await?;
//! println!("polling {} from ts {}", server.server, server.ts);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, LongPollApi, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
pub use error::{ApiError, Result};
pub use types::{string_or_number, Group, LongPollServer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
