use crate::core::store::{StoreEndpoint, StoreError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
        }
    }
}

/// Which row changes a subscription delivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub kind: ChangeKind,
    /// Row filter in `column=eq.value` form.
    pub filter: Option<String>,
}

impl ChangeFilter {
    pub fn message_inserts() -> Self {
        Self {
            table: "messages".to_string(),
            kind: ChangeKind::Insert,
            filter: None,
        }
    }

    pub fn setting_updates(key: &str) -> Self {
        Self {
            table: "settings".to_string(),
            kind: ChangeKind::Update,
            filter: Some(format!("key=eq.{}", key)),
        }
    }

    pub fn topic(&self) -> String {
        format!("realtime:public:{}:{}", self.table, self.kind.as_str().to_lowercase())
    }
}

/// A row change pushed by the server; `new` is the row after the change.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub new: Value,
}

impl ChangeEvent {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.new)
    }
}

/// Handle to one live push subscription. Events arrive in server order.
/// Cancelling is idempotent and also happens on drop.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, shutdown: oneshot::Sender<()>) -> Self {
        Self {
            events,
            shutdown: Some(shutdown),
        }
    }

    /// Next event, or `None` once the subscription is cancelled or closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if self.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            self.events.close();
            tracing::debug!("Subscription cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Push channel delivering row-change events.
#[async_trait]
pub trait ChangeChannel: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, StoreError>;
}

/// One frame of the realtime socket protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl Frame {
    pub fn join(filter: &ChangeFilter, api_key: &str, reference: &str) -> Self {
        let mut change = json!({
            "event": filter.kind.as_str(),
            "schema": "public",
            "table": filter.table,
        });
        if let Some(row_filter) = &filter.filter {
            change["filter"] = json!(row_filter);
        }
        Self {
            topic: filter.topic(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [change],
                },
                "access_token": api_key,
            }),
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    /// `Some(Ok)` / `Some(Err(reason))` if this is the reply to `reference`.
    pub fn reply_status(&self, reference: &str) -> Option<Result<(), String>> {
        if self.event != "phx_reply" || self.reference.as_deref() != Some(reference) {
            return None;
        }
        match self.payload.get("status").and_then(Value::as_str) {
            Some("ok") => Some(Ok(())),
            _ => Some(Err(self
                .payload
                .get("response")
                .map(Value::to_string)
                .unwrap_or_else(|| "join rejected".to_string()))),
        }
    }

    /// Extracts a row change matching `filter`, if this frame carries one.
    pub fn change_event(&self, filter: &ChangeFilter) -> Option<ChangeEvent> {
        if self.event != "postgres_changes" {
            return None;
        }
        let data = self.payload.get("data")?;
        let kind = data.get("type").and_then(Value::as_str)?;
        let table = data.get("table").and_then(Value::as_str)?;
        if kind != filter.kind.as_str() || table != filter.table {
            return None;
        }
        Some(ChangeEvent {
            table: table.to_string(),
            kind: filter.kind,
            new: data.get("record").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Push channel over the hosted realtime websocket. Every subscription owns
/// its own socket.
#[derive(Clone)]
pub struct RealtimeClient {
    socket_url: Url,
    api_key: String,
}

impl RealtimeClient {
    pub fn new(endpoint: &StoreEndpoint) -> Result<Self, StoreError> {
        Ok(Self {
            socket_url: endpoint.realtime_url()?,
            api_key: endpoint.api_key.clone(),
        })
    }
}

fn encode(frame: &Frame) -> Result<WsMessage, StoreError> {
    let text = serde_json::to_string(frame).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(WsMessage::Text(text.into()))
}

fn decode(message: &WsMessage) -> Option<Frame> {
    match message {
        WsMessage::Text(text) => match serde_json::from_str(text.as_str()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Ignoring malformed realtime frame: {}", e);
                None
            }
        },
        _ => None,
    }
}

#[async_trait]
impl ChangeChannel for RealtimeClient {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, StoreError> {
        tracing::info!("Subscribing to {}", filter.topic());

        let (ws_stream, _) = connect_async(self.socket_url.as_str())
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let join_ref = "1".to_string();
        write
            .send(encode(&Frame::join(&filter, &self.api_key, &join_ref))?)
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;

        let joined = tokio::time::timeout(JOIN_TIMEOUT, async {
            while let Some(message) = read.next().await {
                let message = message.map_err(|e| StoreError::Connectivity(e.to_string()))?;
                if let Some(status) = decode(&message).and_then(|f| f.reply_status(&join_ref)) {
                    return status.map_err(StoreError::Connectivity);
                }
            }
            Err(StoreError::Connectivity(
                "socket closed before join reply".to_string(),
            ))
        })
        .await
        .map_err(|_| StoreError::Connectivity("timed out joining channel".to_string()))?;
        joined?;
        tracing::info!("Joined {}", filter.topic());

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let topic = filter.topic();

        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut next_ref: u64 = 1;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        next_ref += 1;
                        if let Ok(leave) = encode(&Frame::leave(&topic, &next_ref.to_string())) {
                            let _ = write.send(leave).await;
                        }
                        let _ = write.close().await;
                        tracing::info!("Left {}", topic);
                        break;
                    }
                    _ = heartbeat.tick() => {
                        next_ref += 1;
                        let Ok(beat) = encode(&Frame::heartbeat(&next_ref.to_string())) else {
                            continue;
                        };
                        if let Err(e) = write.send(beat).await {
                            tracing::error!("Realtime heartbeat failed on {}: {}", topic, e);
                            break;
                        }
                    }
                    message = read.next() => {
                        let message = match message {
                            Some(Ok(message)) => message,
                            Some(Err(e)) => {
                                tracing::error!("Error reading realtime socket {}: {}", topic, e);
                                break;
                            }
                            None => {
                                tracing::warn!("Realtime socket {} closed", topic);
                                break;
                            }
                        };
                        let Some(frame) = decode(&message) else {
                            continue;
                        };
                        if frame.event == "phx_error" || frame.event == "phx_close" {
                            tracing::warn!("Realtime channel {} closed: {}", topic, frame.event);
                            break;
                        }
                        if let Some(event) = frame.change_event(&filter) {
                            if event_tx.send(event).await.is_err() {
                                tracing::debug!("Subscriber for {} went away", topic);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(event_rx, shutdown_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(raw: &str) -> Frame {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn join_frame_carries_row_filter() {
        let join = Frame::join(&ChangeFilter::setting_updates("chat_access_disabled"), "k", "1");
        assert_eq!(join.event, "phx_join");
        assert_eq!(join.topic, "realtime:public:settings:update");
        let change = &join.payload["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "UPDATE");
        assert_eq!(change["table"], "settings");
        assert_eq!(change["filter"], "key=eq.chat_access_disabled");

        let encoded = serde_json::to_value(&join).unwrap();
        assert_eq!(encoded["ref"], "1");
    }

    #[test]
    fn reply_status_matches_reference() {
        let ok = frame(
            r#"{"topic":"t","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        );
        assert_eq!(ok.reply_status("1"), Some(Ok(())));
        assert_eq!(ok.reply_status("2"), None);

        let err = frame(
            r#"{"topic":"t","event":"phx_reply","payload":{"status":"error","response":{"reason":"denied"}},"ref":"1"}"#,
        );
        assert!(matches!(err.reply_status("1"), Some(Err(reason)) if reason.contains("denied")));
    }

    #[test]
    fn postgres_change_becomes_event() {
        let raw = r#"{
            "topic":"realtime:public:messages:insert",
            "event":"postgres_changes",
            "payload":{"data":{"type":"INSERT","table":"messages","schema":"public",
                "record":{"id":9,"sender_id":"u1","name":"Kal'tsit","text":"hi","is_broadcast":false,
                          "inserted_at":"2025-06-01T10:00:00+00:00"}},"ids":[1]},
            "ref":null
        }"#;
        let event = frame(raw)
            .change_event(&ChangeFilter::message_inserts())
            .unwrap();
        let row: crate::models::message::MessageRow = event.decode().unwrap();
        assert_eq!(row.id, 9);
        assert_eq!(row.sender_id, "u1");

        assert!(
            frame(raw)
                .change_event(&ChangeFilter::setting_updates("x"))
                .is_none()
        );
    }

    #[test]
    fn other_frames_are_not_changes() {
        let presence = frame(r#"{"topic":"t","event":"presence_state","payload":{}}"#);
        assert!(presence.change_event(&ChangeFilter::message_inserts()).is_none());
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_delivery() {
        let (tx, rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let mut subscription = Subscription::new(rx, shutdown_tx);

        tx.send(ChangeEvent {
            table: "messages".into(),
            kind: ChangeKind::Insert,
            new: Value::Null,
        })
        .await
        .unwrap();
        assert!(subscription.next().await.is_some());

        subscription.cancel();
        subscription.cancel();
        assert!(subscription.is_cancelled());
        assert!(shutdown_rx.await.is_ok());
        assert!(subscription.next().await.is_none());
        assert!(tx.is_closed());
    }
}
