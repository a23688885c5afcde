mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{lp_server, MockApi};
use longpoll_api::ApiError;
use longpoll_core::{handler_fn, EventContext, GroupEvent, HandlerError, Longpoll, LongpollError};
use mockito::{Matcher, Mock, ServerGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn mock_poll(server: &mut ServerGuard, path: &str, key: &str, ts: &str, body: &str) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("act".into(), "a_check".into()),
            Matcher::UrlEncoded("key".into(), key.into()),
            Matcher::UrlEncoded("ts".into(), ts.into()),
            Matcher::UrlEncoded("wait".into(), "25".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

/// Records every dispatched event as `type@ts`
fn record_events(lp: &mut Longpoll<Arc<MockApi>>) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    lp.router_mut().on_any(handler_fn(move |ctx: &EventContext, event: &GroupEvent| {
        sink.lock()
            .unwrap()
            .push(format!("{}@{}", event.event_type, ctx.ts));
        Ok(())
    }));
    events
}

/// Records the cursor of every full response and stops the loop after the first one
fn stop_after_first_response(lp: &mut Longpoll<Arc<MockApi>>) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let shutdown = lp.shutdown_handle();
    lp.on_full_response(move |response| {
        sink.lock().unwrap().push(response.ts.clone());
        shutdown.stop();
    });
    seen
}

#[tokio::test]
async fn test_batch_is_dispatched_and_cursor_advanced() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let poll = mock_poll(
        &mut server,
        "/lp",
        "K",
        "1",
        r#"{"ts":"2","updates":[{"type":"message_new","object":{"id":1},"group_id":5}],"failed":0}"#,
    )
    .await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let events = record_events(&mut lp);
    let seen = stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    poll.assert_async().await;
    assert_eq!(lp.session().ts, "2");
    assert_eq!(*events.lock().unwrap(), vec!["message_new@2"]);
    assert_eq!(*seen.lock().unwrap(), vec!["2"]);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn test_empty_batch_still_notifies_observers() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "1", r#"{"ts":"3","updates":[]}"#).await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let events = record_events(&mut lp);
    let seen = stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert!(events.lock().unwrap().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec!["3"]);
    assert_eq!(lp.session().ts, "3");
}

#[tokio::test]
async fn test_outdated_history_advances_to_corrected_cursor() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "1", r#"{"failed":1,"ts":30}"#).await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert_eq!(lp.session().ts, "30");
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn test_key_expired_refreshes_and_keeps_cursor() {
    let mut server = mockito::Server::new_async().await;
    let first_url = format!("{}/lp", server.url());
    let second_url = format!("{}/lp2", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "10", r#"{"failed":2}"#).await;
    let resumed = mock_poll(&mut server, "/lp2", "K2", "10", r#"{"ts":"11","updates":[]}"#).await;

    let api = Arc::new(MockApi::new(
        5,
        vec![lp_server("K", &first_url, "10"), lp_server("K2", &second_url, "1")],
    ));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let seen = stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert_eq!(api.calls(), 2);
    assert_eq!(lp.session().key, "K2");
    assert_eq!(lp.session().server, second_url);
    assert_eq!(lp.session().ts, "10");

    // a second start clears the stop request and polls the refreshed server
    lp.start().await.unwrap();

    resumed.assert_async().await;
    assert_eq!(lp.session().ts, "11");
    assert_eq!(*seen.lock().unwrap(), vec!["", "11"]);
}

#[tokio::test]
async fn test_info_lost_refreshes_and_resets_cursor() {
    let mut server = mockito::Server::new_async().await;
    let first_url = format!("{}/lp", server.url());
    let second_url = format!("{}/lp2", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "10", r#"{"failed":3}"#).await;

    let api = Arc::new(MockApi::new(
        5,
        vec![lp_server("K", &first_url, "10"), lp_server("K3", &second_url, "77")],
    ));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert_eq!(api.calls(), 2);
    assert_eq!(lp.session().key, "K3");
    assert_eq!(lp.session().ts, "77");
}

#[tokio::test]
async fn test_unknown_failure_code_terminates() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "1", r#"{"failed":8,"ts":"9"}"#).await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let seen = stop_after_first_response(&mut lp);
    let before = lp.session().clone();

    let err = lp.start().await.unwrap_err();

    assert!(matches!(err, LongpollError::UnknownFailureCode(8)));
    assert_eq!(lp.session(), &before);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn test_handler_error_terminates_before_observers() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(
        &mut server,
        "/lp",
        "K",
        "1",
        r#"{"ts":"2","updates":[{"type":"message_new","object":{}},{"type":"message_new","object":{}}]}"#,
    )
    .await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let calls = Arc::new(Mutex::new(0));
    {
        let calls = Arc::clone(&calls);
        lp.router_mut().on(
            "message_new",
            handler_fn(move |_: &EventContext, _: &GroupEvent| {
                *calls.lock().unwrap() += 1;
                Err(HandlerError::failed("handler rejected event"))
            }),
        );
    }
    let seen = stop_after_first_response(&mut lp);

    let err = lp.start().await.unwrap_err();

    assert!(matches!(err, LongpollError::Dispatch(HandlerError::Failed(_))));
    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(seen.lock().unwrap().is_empty());
    // the cursor was already taken from the response
    assert_eq!(lp.session().ts, "2");
}

#[tokio::test]
async fn test_stop_before_start_is_ignored() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let poll = mock_poll(&mut server, "/lp", "K", "1", r#"{"ts":"2","updates":[]}"#).await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let seen = stop_after_first_response(&mut lp);

    lp.stop();
    lp.start().await.unwrap();

    poll.assert_async().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_observers_run_in_registration_order() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "1", r#"{"ts":"2","updates":[]}"#).await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b", "c"] {
        let order = Arc::clone(&order);
        lp.on_full_response(move |_| order.lock().unwrap().push(name));
    }
    stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_poll_http_error_is_upstream() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = server
        .mock("GET", "/lp")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();

    let err = lp.start().await.unwrap_err();

    assert!(matches!(err, LongpollError::Upstream(ApiError::Api { code: 500, .. })));
    assert_eq!(lp.session().ts, "1");
}

#[tokio::test]
async fn test_malformed_poll_body_is_upstream() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(&mut server, "/lp", "K", "1", "not json").await;

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();

    let err = lp.start().await.unwrap_err();

    assert!(matches!(err, LongpollError::Upstream(ApiError::Parse(_))));
}

#[tokio::test]
async fn test_for_community_resolves_group() {
    let mut server = mockito::Server::new_async().await;
    let lp_url = format!("{}/lp", server.url());
    let _poll = mock_poll(
        &mut server,
        "/lp",
        "K",
        "1",
        r#"{"ts":"2","updates":[{"type":"group_join","object":{"user_id":3},"group_id":77}]}"#,
    )
    .await;

    let api = Arc::new(MockApi::new(77, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::for_community(Arc::clone(&api)).await.unwrap();
    let groups = Arc::new(Mutex::new(Vec::new()));
    {
        let groups = Arc::clone(&groups);
        lp.router_mut().on(
            "group_join",
            handler_fn(move |ctx: &EventContext, _: &GroupEvent| {
                groups.lock().unwrap().push(ctx.group_id);
                Ok(())
            }),
        );
    }
    stop_after_first_response(&mut lp);

    lp.start().await.unwrap();

    assert_eq!(lp.group_id(), 77);
    assert_eq!(*groups.lock().unwrap(), vec![77]);
}

#[tokio::test]
async fn test_construction_fails_when_bootstrap_fails() {
    let api = Arc::new(MockApi::new(5, Vec::new()));

    let err = Longpoll::new(Arc::clone(&api), 5).await.unwrap_err();

    assert!(matches!(err, LongpollError::Upstream(ApiError::Api { code: 100, .. })));
}

#[tokio::test]
async fn test_stop_from_another_task_lets_inflight_poll_finish() {
    // Holds the single a_check open until the stop request has been made
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let lp_url = format!("http://{}/lp", listener.local_addr().unwrap());
    let (received_tx, received_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let polls = Arc::new(AtomicUsize::new(0));

    let server = tokio::spawn({
        let polls = Arc::clone(&polls);
        async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            polls.fetch_add(1, Ordering::SeqCst);
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            received_tx.send(()).unwrap();
            release_rx.await.unwrap();

            let body = r#"{"ts":"2","updates":[{"type":"message_new","object":{"id":1},"group_id":5}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    let api = Arc::new(MockApi::new(5, vec![lp_server("K", &lp_url, "1")]));
    let mut lp = Longpoll::new(Arc::clone(&api), 5).await.unwrap();
    let events = record_events(&mut lp);
    let observed = Arc::new(AtomicUsize::new(0));
    {
        let observed = Arc::clone(&observed);
        lp.on_full_response(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        });
    }

    let shutdown = lp.shutdown_handle();
    let stopper = tokio::spawn(async move {
        received_rx.await.unwrap();
        shutdown.stop();
        release_tx.send(()).unwrap();
    });

    lp.start().await.unwrap();
    stopper.await.unwrap();
    server.await.unwrap();

    assert_eq!(polls.load(Ordering::SeqCst), 1);
    assert_eq!(*events.lock().unwrap(), vec!["message_new@2"]);
    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert_eq!(lp.session().ts, "2");
}
