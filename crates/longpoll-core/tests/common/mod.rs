#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use longpoll_api::{ApiError, LongPollApi, LongPollServer};

/// In-memory API that hands out queued long poll servers
#[derive(Debug)]
pub struct MockApi {
    group_id: i64,
    servers: Mutex<VecDeque<LongPollServer>>,
    calls: AtomicUsize,
}

impl MockApi {
    pub fn new(group_id: i64, servers: Vec<LongPollServer>) -> Self {
        Self {
            group_id,
            servers: Mutex::new(servers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `get_long_poll_server` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LongPollApi for MockApi {
    async fn get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer, ApiError> {
        assert_eq!(group_id, self.group_id, "bootstrap called with wrong group");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.servers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Api {
                code: 100,
                message: "no more servers".to_string(),
            })
    }

    async fn current_group_id(&self) -> Result<i64, ApiError> {
        Ok(self.group_id)
    }
}

pub fn lp_server(key: &str, server: &str, ts: &str) -> LongPollServer {
    LongPollServer {
        key: key.to_string(),
        server: server.to_string(),
        ts: ts.to_string(),
    }
}
