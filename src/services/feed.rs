use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::Result;
use crate::models::{Bookmark, FeedStatus};
use crate::services::auth::Session;
use crate::store::FeedEvent;

const TOPIC: &str = "realtime:public:bookmarks";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// What the subscription pump delivers to the event loop.
#[derive(Debug)]
pub enum FeedMessage {
    Event(FeedEvent),
    Status(FeedStatus),
}

/// A cancellable realtime subscription. Events arrive through `try_recv`;
/// `stop` aborts the pump so nothing is delivered afterwards.
pub struct Subscription {
    rx: mpsc::Receiver<FeedMessage>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        self.rx.try_recv().ok()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Factory for owner-scoped realtime subscriptions.
pub struct ChangeFeed {
    base_url: String,
    anon_key: String,
}

impl ChangeFeed {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self { base_url, anon_key }
    }

    /// Opens a subscription filtered to the session owner's bookmarks.
    /// The pump task owns the socket; the caller polls the channel.
    pub fn subscribe(&self, session: &Session) -> Result<Subscription> {
        let ws_url = ws_endpoint(&self.base_url, &self.anon_key)?;
        let access_token = session.access_token.clone();
        let user_id = session.user_id.clone();

        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            let _ = tx.send(FeedMessage::Status(FeedStatus::Connecting)).await;

            if let Err(e) = run_pump(&ws_url, &access_token, &user_id, &tx).await {
                tracing::warn!("realtime channel closed: {}", e);
            }

            let _ = tx.send(FeedMessage::Status(FeedStatus::Disconnected)).await;
        });

        Ok(Subscription { rx, task })
    }
}

/// Derives the websocket endpoint from the backend base URL.
fn ws_endpoint(base_url: &str, anon_key: &str) -> Result<String> {
    let mut url = Url::parse(base_url)?;
    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    // set_scheme only rejects invalid transitions; ours are http(s)->ws(s)
    let _ = url.set_scheme(scheme);
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url.to_string())
}

async fn run_pump(
    ws_url: &str,
    access_token: &str,
    user_id: &str,
    tx: &mpsc::Sender<FeedMessage>,
) -> Result<()> {
    let (ws_stream, _) = connect_async(ws_url).await?;
    let (mut sink, mut stream) = ws_stream.split();

    // Join the channel with an owner filter; the backend sends only this
    // user's rows from here on
    let join = json!({
        "topic": TOPIC,
        "event": "phx_join",
        "ref": "1",
        "payload": {
            "access_token": access_token,
            "config": {
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "bookmarks",
                    "filter": format!("user_id=eq.{}", user_id),
                }],
            },
        },
    });
    sink.send(Message::Text(join.to_string().into())).await?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately
    let mut heartbeat_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "ref": heartbeat_ref.to_string(),
                    "payload": {},
                });
                heartbeat_ref += 1;
                sink.send(Message::Text(beat.to_string().into())).await?;
            }
            frame = stream.next() => {
                let Some(frame) = frame else { break };
                match frame? {
                    Message::Text(text) => {
                        handle_frame(&text, tx).await;
                    }
                    Message::Ping(data) => {
                        sink.send(Message::Pong(data)).await?;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

async fn handle_frame(text: &str, tx: &mpsc::Sender<FeedMessage>) {
    let Ok(envelope) = serde_json::from_str::<Value>(text) else {
        tracing::warn!("dropping unparseable realtime frame");
        return;
    };

    match envelope.get("event").and_then(Value::as_str) {
        Some("phx_reply") => {
            // Join acknowledgement for our topic means we are live
            let ok = envelope
                .pointer("/payload/status")
                .and_then(Value::as_str)
                .map(|s| s == "ok")
                .unwrap_or(false);
            if ok && envelope.get("topic").and_then(Value::as_str) == Some(TOPIC) {
                let _ = tx.send(FeedMessage::Status(FeedStatus::Connected)).await;
            }
        }
        Some("postgres_changes") => {
            let data = envelope
                .pointer("/payload/data")
                .cloned()
                .unwrap_or(Value::Null);
            match parse_change(&data) {
                Some(event) => {
                    let _ = tx.send(FeedMessage::Event(event)).await;
                }
                None => tracing::warn!("dropping malformed change payload"),
            }
        }
        _ => {}
    }
}

/// Validates a `postgres_changes` payload into a tagged event. Anything
/// that does not decode cleanly is rejected here, before the store sees it.
fn parse_change(data: &Value) -> Option<FeedEvent> {
    let kind = data.get("type").and_then(Value::as_str)?;
    match kind {
        "INSERT" => {
            let item: Bookmark = serde_json::from_value(data.get("record")?.clone()).ok()?;
            Some(FeedEvent::Insert(item))
        }
        "UPDATE" => {
            let item: Bookmark = serde_json::from_value(data.get("record")?.clone()).ok()?;
            Some(FeedEvent::Update(item))
        }
        "DELETE" => {
            let id = data
                .pointer("/old_record/id")
                .and_then(Value::as_str)?
                .to_string();
            Some(FeedEvent::Delete { id })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "user_id": "u1",
            "title": title,
            "url": "https://example.com",
            "created_at": "2026-01-11T12:34:56Z",
            "updated_at": "2026-01-11T12:34:56Z",
        })
    }

    #[test]
    fn parses_insert() {
        let data = json!({ "type": "INSERT", "record": record("d1", "A") });
        match parse_change(&data) {
            Some(FeedEvent::Insert(item)) => {
                assert_eq!(item.id, "d1");
                assert_eq!(item.title, "A");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parses_update() {
        let data = json!({ "type": "UPDATE", "record": record("d1", "B") });
        assert!(matches!(
            parse_change(&data),
            Some(FeedEvent::Update(item)) if item.title == "B"
        ));
    }

    #[test]
    fn parses_delete_from_old_record() {
        let data = json!({ "type": "DELETE", "old_record": { "id": "d1" } });
        assert!(matches!(
            parse_change(&data),
            Some(FeedEvent::Delete { id }) if id == "d1"
        ));
    }

    #[test]
    fn rejects_unknown_kind_and_missing_fields() {
        assert!(parse_change(&json!({ "type": "TRUNCATE" })).is_none());
        assert!(parse_change(&json!({ "type": "INSERT" })).is_none());
        assert!(parse_change(&json!({ "type": "INSERT", "record": { "id": "d1" } })).is_none());
        assert!(parse_change(&json!({ "type": "DELETE", "old_record": { "id": 7 } })).is_none());
        assert!(parse_change(&Value::Null).is_none());
    }

    #[test]
    fn derives_wss_endpoint_with_apikey() {
        let url = ws_endpoint("https://myproject.example.co", "anon").unwrap();
        assert_eq!(
            url,
            "wss://myproject.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn keeps_plain_ws_for_http_backends() {
        let url = ws_endpoint("http://localhost:54321", "anon").unwrap();
        assert!(url.starts_with("ws://localhost:54321/realtime/v1/websocket"));
    }
}
