use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;
use tokio::sync::{mpsc, oneshot};

use crate::channel::{
    BoxFuture, ChannelEvent, MessageChannel, SubscriptionHandle, SubscriptionWorker,
    make_subscription,
};
use crate::config::ChannelConfig;
use crate::error::{
    BuildHttpClientSnafu, ChannelError, ChannelResult, DecodeEventSnafu, RequestSnafu,
    StatusSnafu, StreamReadSnafu,
};
use crate::record::{ChatMessage, RawRecord};
use crate::sse::{SseDecoder, SseFrame};

pub const FIREBASE_CHANNEL_ID: &str = "firebase";
/// First pause before reopening a dropped event stream. Doubles per failed attempt.
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Message channel backed by the Firebase Realtime Database REST API.
///
/// Appends are `POST`s to the messages collection, which makes the server
/// generate a chronologically sortable push key. Subscriptions use the
/// streaming endpoint (`Accept: text/event-stream`) and reopen it after
/// network errors or a server-side close, so a subscription lives until it
/// is dropped or the server revokes it.
pub struct RealtimeDatabaseChannel {
    config: ChannelConfig,
    client: reqwest::Client,
    reconnect_delay: Duration,
}

/// How one connection of the event stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    Disconnected { opened: bool },
    Terminated,
    SubscriberGone,
}

impl RealtimeDatabaseChannel {
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        let config = config.normalized();
        config.validate()?;

        let client = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "firebase-channel-new",
            })?;

        Ok(Self {
            config,
            client,
            reconnect_delay: INITIAL_RECONNECT_DELAY,
        })
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    async fn open_stream(
        client: &reqwest::Client,
        config: &ChannelConfig,
    ) -> ChannelResult<reqwest::Response> {
        let url = config.messages_url();
        let response = client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await
            .context(RequestSnafu {
                stage: "open-event-stream",
                url: &url,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                stage: "open-event-stream-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }

    fn emit_error_event(event_tx: &mpsc::UnboundedSender<ChannelEvent>, error: ChannelError) {
        let _ = event_tx.send(ChannelEvent::Error(error.to_string()));
    }

    async fn run_subscription_worker(
        client: reqwest::Client,
        config: ChannelConfig,
        reconnect_delay: Duration,
        event_tx: mpsc::UnboundedSender<ChannelEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        // Shared across reconnects so replayed snapshots only deliver unseen children.
        let mut feed = ChildFeed::default();
        let mut delay = reconnect_delay;

        loop {
            let outcome = tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!(channel_id = FIREBASE_CHANNEL_ID, "message subscription cancelled");
                    return;
                }
                outcome = Self::stream_once(&client, &config, &mut feed, &event_tx) => outcome,
            };

            match outcome {
                StreamOutcome::Terminated | StreamOutcome::SubscriberGone => return,
                StreamOutcome::Disconnected { opened } => {
                    if opened {
                        delay = reconnect_delay;
                    }
                }
            }

            if event_tx.is_closed() {
                return;
            }

            tracing::info!(
                channel_id = FIREBASE_CHANNEL_ID,
                retry_in_ms = delay.as_millis() as u64,
                "reconnecting message subscription"
            );

            tokio::select! {
                _ = &mut cancel_rx => {
                    tracing::debug!(channel_id = FIREBASE_CHANNEL_ID, "message subscription cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn stream_once(
        client: &reqwest::Client,
        config: &ChannelConfig,
        feed: &mut ChildFeed,
        event_tx: &mpsc::UnboundedSender<ChannelEvent>,
    ) -> StreamOutcome {
        let response = match Self::open_stream(client, config).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    channel_id = FIREBASE_CHANNEL_ID,
                    error = %error,
                    "failed to open message subscription"
                );
                Self::emit_error_event(event_tx, error);
                return StreamOutcome::Disconnected { opened: false };
            }
        };

        tracing::info!(
            channel_id = FIREBASE_CHANNEL_ID,
            project_id = %config.project_id,
            "message subscription opened"
        );

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(next_chunk) = body.next().await {
            let chunk = match next_chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    let error = ChannelError::StreamRead {
                        stage: "event-stream-chunk",
                        source,
                    };
                    tracing::error!(
                        channel_id = FIREBASE_CHANNEL_ID,
                        error = %error,
                        "message subscription failed"
                    );
                    Self::emit_error_event(event_tx, error);
                    return StreamOutcome::Disconnected { opened: true };
                }
            };

            for frame in decoder.push(&chunk) {
                match feed.apply(&frame) {
                    Ok(FeedUpdate::Appended(records)) => {
                        for record in records {
                            if event_tx.send(ChannelEvent::Appended(record)).is_err() {
                                return StreamOutcome::SubscriberGone;
                            }
                        }
                    }
                    Ok(FeedUpdate::Terminated(event)) => {
                        tracing::warn!(
                            channel_id = FIREBASE_CHANNEL_ID,
                            event = %event,
                            "server terminated message subscription"
                        );
                        Self::emit_error_event(
                            event_tx,
                            ChannelError::StreamTerminated {
                                stage: "event-stream-frame",
                                event,
                            },
                        );
                        return StreamOutcome::Terminated;
                    }
                    Err(error) => {
                        tracing::warn!(
                            channel_id = FIREBASE_CHANNEL_ID,
                            event = %frame.event,
                            error = %error,
                            "skipping undecodable event frame"
                        );
                    }
                }
            }
        }

        tracing::warn!(channel_id = FIREBASE_CHANNEL_ID, "event stream closed by server");
        StreamOutcome::Disconnected { opened: true }
    }
}

impl MessageChannel for RealtimeDatabaseChannel {
    fn id(&self) -> &str {
        FIREBASE_CHANNEL_ID
    }

    fn subscribe(&self) -> ChannelResult<SubscriptionHandle> {
        let (event_tx, subscription, cancel_rx) = make_subscription(FIREBASE_CHANNEL_ID);
        let worker: SubscriptionWorker = Box::pin(Self::run_subscription_worker(
            self.client.clone(),
            self.config.clone(),
            self.reconnect_delay,
            event_tx,
            cancel_rx,
        ));

        Ok(SubscriptionHandle {
            subscription,
            worker,
        })
    }

    fn append(&self, message: ChatMessage) -> BoxFuture<'static, ChannelResult<()>> {
        let client = self.client.clone();
        let url = self.config.messages_url();

        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&message)
                .send()
                .await
                .context(RequestSnafu {
                    stage: "append-message",
                    url: &url,
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .context(StreamReadSnafu {
                        stage: "append-message-error-body",
                    })?;
                return StatusSnafu {
                    stage: "append-message-status",
                    status: status.as_u16(),
                    body,
                }
                .fail();
            }

            Ok(())
        })
    }
}

#[derive(Debug, Deserialize)]
struct PathPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Outcome of applying one event frame to a [`ChildFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    Appended(Vec<RawRecord>),
    Terminated(String),
}

/// Tracks which children of the messages collection were already delivered.
///
/// The streaming endpoint reports whole snapshots (`put` at `/`) as well as
/// single-child writes; this turns both into child-added notifications so each
/// record reaches the subscriber once.
#[derive(Debug, Default)]
pub struct ChildFeed {
    seen: HashSet<String>,
}

impl ChildFeed {
    pub fn apply(&mut self, frame: &SseFrame) -> ChannelResult<FeedUpdate> {
        match frame.event.as_str() {
            "put" => {
                let payload: PathPayload =
                    serde_json::from_str(&frame.data).context(DecodeEventSnafu {
                        stage: "decode-put-event",
                    })?;
                Ok(FeedUpdate::Appended(self.apply_put(payload)))
            }
            "patch" => {
                let payload: PathPayload =
                    serde_json::from_str(&frame.data).context(DecodeEventSnafu {
                        stage: "decode-patch-event",
                    })?;
                Ok(FeedUpdate::Appended(self.apply_patch(payload)))
            }
            "cancel" | "auth_revoked" => Ok(FeedUpdate::Terminated(frame.event.clone())),
            _ => Ok(FeedUpdate::Appended(Vec::new())),
        }
    }

    fn apply_put(&mut self, payload: PathPayload) -> Vec<RawRecord> {
        let path = payload.path.trim_matches('/');
        if path.is_empty() {
            return self.accept_children(payload.data);
        }

        // Writes below a child (`/key/field`) are updates, not appends.
        if path.contains('/') {
            return Vec::new();
        }

        self.accept_child(path.to_string(), payload.data)
            .into_iter()
            .collect()
    }

    fn apply_patch(&mut self, payload: PathPayload) -> Vec<RawRecord> {
        if !payload.path.trim_matches('/').is_empty() {
            return Vec::new();
        }

        self.accept_children(payload.data)
    }

    fn accept_children(&mut self, data: Value) -> Vec<RawRecord> {
        let mut children = match data {
            Value::Object(children) => children.into_iter().collect::<Vec<_>>(),
            // Integer-keyed collections come back as arrays, holes filled with null.
            Value::Array(children) => children
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
            _ => return Vec::new(),
        };

        // Push keys sort chronologically, so key order is append order.
        children.sort_by(|(left, _), (right, _)| compare_keys(left, right));

        children
            .into_iter()
            .filter_map(|(key, value)| self.accept_child(key, value))
            .collect()
    }

    fn accept_child(&mut self, key: String, value: Value) -> Option<RawRecord> {
        if value.is_null() || !self.seen.insert(key) {
            return None;
        }

        Some(RawRecord::from_value(value))
    }
}

/// Orders child keys like the database does: integer keys first in numeric
/// order, then every other key lexicographically.
fn compare_keys(left: &str, right: &str) -> Ordering {
    match (integer_key(left), integer_key(right)) {
        (Some(left_value), Some(right_value)) => left_value
            .cmp(&right_value)
            .then_with(|| left.cmp(right)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

fn integer_key(key: &str) -> Option<i64> {
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    fn senders(update: FeedUpdate) -> Vec<String> {
        match update {
            FeedUpdate::Appended(records) => records
                .into_iter()
                .map(|record| record.sender.unwrap_or_default())
                .collect(),
            FeedUpdate::Terminated(event) => panic!("unexpected termination: {event}"),
        }
    }

    #[test]
    fn initial_snapshot_is_replayed_in_push_key_order() {
        let mut feed = ChildFeed::default();
        let update = feed
            .apply(&frame(
                "put",
                json!({
                    "path": "/",
                    "data": {
                        "-Nb2": { "sender": "Bob", "message": "second" },
                        "-Na1": { "sender": "Alice", "message": "first" },
                        "-Nc3": { "sender": "Carol", "message": "third" },
                    }
                }),
            ))
            .unwrap();

        assert_eq!(senders(update), vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn child_put_is_delivered_once() {
        let mut feed = ChildFeed::default();
        let child = json!({
            "path": "/-Nd4",
            "data": { "sender": "Dave", "message": "hey", "profilePic": "" }
        });

        assert_eq!(senders(feed.apply(&frame("put", child.clone())).unwrap()), vec!["Dave"]);
        assert!(senders(feed.apply(&frame("put", child)).unwrap()).is_empty());
    }

    #[test]
    fn snapshot_after_child_put_skips_seen_keys() {
        let mut feed = ChildFeed::default();
        feed.apply(&frame(
            "put",
            json!({ "path": "/-Na1", "data": { "sender": "Alice", "message": "a" } }),
        ))
        .unwrap();

        let update = feed
            .apply(&frame(
                "put",
                json!({
                    "path": "/",
                    "data": {
                        "-Na1": { "sender": "Alice", "message": "a" },
                        "-Nb2": { "sender": "Bob", "message": "b" },
                    }
                }),
            ))
            .unwrap();

        assert_eq!(senders(update), vec!["Bob"]);
    }

    #[test]
    fn removals_and_field_updates_are_ignored() {
        let mut feed = ChildFeed::default();

        let removal = feed
            .apply(&frame("put", json!({ "path": "/-Na1", "data": null })))
            .unwrap();
        let field_update = feed
            .apply(&frame("put", json!({ "path": "/-Na1/message", "data": "edited" })))
            .unwrap();
        let empty_root = feed
            .apply(&frame("put", json!({ "path": "/", "data": null })))
            .unwrap();

        assert!(senders(removal).is_empty());
        assert!(senders(field_update).is_empty());
        assert!(senders(empty_root).is_empty());
    }

    #[test]
    fn root_patch_adds_new_children() {
        let mut feed = ChildFeed::default();
        let update = feed
            .apply(&frame(
                "patch",
                json!({
                    "path": "/",
                    "data": { "-Ne5": { "sender": "Eve", "message": "hello" } }
                }),
            ))
            .unwrap();

        assert_eq!(senders(update), vec!["Eve"]);
    }

    #[test]
    fn malformed_children_are_still_forwarded_for_validation() {
        let mut feed = ChildFeed::default();
        let update = feed
            .apply(&frame(
                "put",
                json!({ "path": "/-Nf6", "data": { "sender": "Dave" } }),
            ))
            .unwrap();

        match update {
            FeedUpdate::Appended(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].clone().into_message(), None);
            }
            FeedUpdate::Terminated(event) => panic!("unexpected termination: {event}"),
        }
    }

    #[test]
    fn keep_alive_is_ignored_and_cancel_terminates() {
        let mut feed = ChildFeed::default();

        assert_eq!(
            feed.apply(&frame("keep-alive", Value::Null)).unwrap(),
            FeedUpdate::Appended(Vec::new())
        );
        assert_eq!(
            feed.apply(&frame("auth_revoked", Value::Null)).unwrap(),
            FeedUpdate::Terminated("auth_revoked".to_string())
        );
    }

    #[test]
    fn undecodable_put_is_an_error() {
        let mut feed = ChildFeed::default();
        let bad = SseFrame {
            event: "put".to_string(),
            data: "not json".to_string(),
        };

        assert!(matches!(
            feed.apply(&bad),
            Err(ChannelError::DecodeEvent { .. })
        ));
    }

    #[test]
    fn new_rejects_incomplete_config() {
        let result = RealtimeDatabaseChannel::new(ChannelConfig::default());
        assert!(matches!(
            result,
            Err(ChannelError::MissingParameter {
                parameter: "api_key",
                ..
            })
        ));
    }

    #[test]
    fn array_snapshot_is_read_as_integer_keyed_children() {
        let mut feed = ChildFeed::default();
        let update = feed
            .apply(&frame(
                "put",
                json!({
                    "path": "/",
                    "data": [
                        { "sender": "Alice", "message": "zero" },
                        null,
                        { "sender": "Bob", "message": "two" },
                    ]
                }),
            ))
            .unwrap();

        assert_eq!(senders(update), vec!["Alice", "Bob"]);
    }

    #[test]
    fn integer_keys_sort_numerically_before_push_keys() {
        let mut feed = ChildFeed::default();
        let update = feed
            .apply(&frame(
                "put",
                json!({
                    "path": "/",
                    "data": {
                        "-Na1": { "sender": "Push", "message": "p" },
                        "10": { "sender": "Ten", "message": "t" },
                        "2": { "sender": "Two", "message": "t" },
                    }
                }),
            ))
            .unwrap();

        assert_eq!(senders(update), vec!["Two", "Ten", "Push"]);
    }

    mod network {
        use std::net::SocketAddr;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};
        use tokio::time::timeout;

        use super::*;
        use crate::channel::MessageSubscription;

        const EVENT_STREAM_HEADERS: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
        const WAIT: Duration = Duration::from_secs(5);

        fn channel_for(addr: SocketAddr) -> RealtimeDatabaseChannel {
            RealtimeDatabaseChannel::new(ChannelConfig {
                api_key: "key".to_string(),
                auth_domain: "demo.firebaseapp.com".to_string(),
                database_url: format!("http://{addr}"),
                project_id: "demo".to_string(),
                storage_bucket: "demo.appspot.com".to_string(),
                messaging_sender_id: "1234".to_string(),
                app_id: "1:1234:web:abcd".to_string(),
            })
            .unwrap()
            .with_reconnect_delay(Duration::from_millis(10))
        }

        async fn read_request(stream: &mut TcpStream) -> String {
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];

            loop {
                let read = stream.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);

                let Some(header_end) = request.windows(4).position(|window| window == b"\r\n\r\n")
                else {
                    continue;
                };
                let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }

            String::from_utf8_lossy(&request).into_owned()
        }

        fn put_snapshot(children: Value) -> String {
            format!(
                "event: put\ndata: {}\n\n",
                json!({ "path": "/", "data": children })
            )
        }

        async fn serve_events(stream: &mut TcpStream, events: &str) {
            read_request(stream).await;
            stream.write_all(EVENT_STREAM_HEADERS.as_bytes()).await.unwrap();
            stream.write_all(events.as_bytes()).await.unwrap();
        }

        async fn wait_for_client_close(stream: &mut TcpStream) {
            let mut buffer = [0u8; 64];
            while matches!(stream.read(&mut buffer).await, Ok(read) if read > 0) {}
        }

        async fn next_event(subscription: &mut MessageSubscription) -> Option<ChannelEvent> {
            timeout(WAIT, subscription.recv()).await.unwrap()
        }

        fn appended_sender(event: Option<ChannelEvent>) -> String {
            match event {
                Some(ChannelEvent::Appended(record)) => record.sender.unwrap_or_default(),
                other => panic!("unexpected event: {other:?}"),
            }
        }

        #[tokio::test]
        async fn reconnects_after_server_close_without_redelivering() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut first, _) = listener.accept().await.unwrap();
                serve_events(
                    &mut first,
                    &put_snapshot(json!({ "-Na1": { "sender": "Alice", "message": "a" } })),
                )
                .await;
                drop(first);

                let (mut second, _) = listener.accept().await.unwrap();
                serve_events(
                    &mut second,
                    &put_snapshot(json!({
                        "-Na1": { "sender": "Alice", "message": "a" },
                        "-Nb2": { "sender": "Bob", "message": "b" },
                    })),
                )
                .await;
                wait_for_client_close(&mut second).await;
            });

            let SubscriptionHandle {
                mut subscription,
                worker,
            } = channel_for(addr).subscribe().unwrap();
            let worker = tokio::spawn(worker);

            assert_eq!(appended_sender(next_event(&mut subscription).await), "Alice");
            assert_eq!(appended_sender(next_event(&mut subscription).await), "Bob");

            drop(subscription);
            timeout(WAIT, worker).await.unwrap().unwrap();
            timeout(WAIT, server).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn open_failure_reports_error_and_retries() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut first, _) = listener.accept().await.unwrap();
                read_request(&mut first).await;
                first
                    .write_all(
                        b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 17\r\nConnection: close\r\n\r\nPermission denied",
                    )
                    .await
                    .unwrap();
                drop(first);

                let (mut second, _) = listener.accept().await.unwrap();
                serve_events(
                    &mut second,
                    &put_snapshot(json!({ "-Na1": { "sender": "Alice", "message": "a" } })),
                )
                .await;
                wait_for_client_close(&mut second).await;
            });

            let SubscriptionHandle {
                mut subscription,
                worker,
            } = channel_for(addr).subscribe().unwrap();
            let worker = tokio::spawn(worker);

            match next_event(&mut subscription).await {
                Some(ChannelEvent::Error(error)) => assert!(error.contains("401"), "{error}"),
                other => panic!("unexpected event: {other:?}"),
            }
            assert_eq!(appended_sender(next_event(&mut subscription).await), "Alice");

            drop(subscription);
            timeout(WAIT, worker).await.unwrap().unwrap();
            timeout(WAIT, server).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn server_cancel_ends_the_subscription() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let events = format!(
                    "{}event: cancel\ndata: null\n\n",
                    put_snapshot(json!({ "-Na1": { "sender": "Alice", "message": "a" } }))
                );
                serve_events(&mut stream, &events).await;
                wait_for_client_close(&mut stream).await;
            });

            let SubscriptionHandle {
                mut subscription,
                worker,
            } = channel_for(addr).subscribe().unwrap();
            let worker = tokio::spawn(worker);

            assert_eq!(appended_sender(next_event(&mut subscription).await), "Alice");
            match next_event(&mut subscription).await {
                Some(ChannelEvent::Error(error)) => assert!(error.contains("cancel"), "{error}"),
                other => panic!("unexpected event: {other:?}"),
            }
            assert!(next_event(&mut subscription).await.is_none());

            timeout(WAIT, worker).await.unwrap().unwrap();
            timeout(WAIT, server).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn dropping_subscription_stops_an_open_stream() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let events = format!(
                    "{}event: keep-alive\ndata: null\n\n",
                    put_snapshot(json!({ "-Na1": { "sender": "Alice", "message": "a" } }))
                );
                serve_events(&mut stream, &events).await;
                wait_for_client_close(&mut stream).await;
            });

            let SubscriptionHandle {
                mut subscription,
                worker,
            } = channel_for(addr).subscribe().unwrap();
            let worker = tokio::spawn(worker);
            assert_eq!(appended_sender(next_event(&mut subscription).await), "Alice");

            drop(subscription);
            timeout(WAIT, worker).await.unwrap().unwrap();
            timeout(WAIT, server).await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn append_posts_the_record() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"name\":\"-Na1\"}",
                    )
                    .await
                    .unwrap();
                request
            });

            channel_for(addr)
                .append(ChatMessage::new("Bob", "hi", "https://api.dicebear.com/9.x/lorelei/svg?seed=3"))
                .await
                .unwrap();

            let request = timeout(WAIT, server).await.unwrap().unwrap();
            assert!(request.starts_with("POST /messages.json HTTP/1.1"), "{request}");
            assert!(request.contains(r#""sender":"Bob""#), "{request}");
            assert!(request.contains(r#""profilePic":"https://api.dicebear.com/9.x/lorelei/svg?seed=3""#));
        }

        #[tokio::test]
        async fn append_rejection_maps_to_status_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request(&mut stream).await;
                stream
                    .write_all(
                        b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nboom",
                    )
                    .await
                    .unwrap();
            });

            let result = channel_for(addr)
                .append(ChatMessage::new("Bob", "hi", ""))
                .await;

            match result {
                Err(ChannelError::Status { status, body, .. }) => {
                    assert_eq!(status, 500);
                    assert_eq!(body, "boom");
                }
                other => panic!("unexpected append result: {other:?}"),
            }
            timeout(WAIT, server).await.unwrap().unwrap();
        }
    }
}
