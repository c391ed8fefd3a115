// Realtime client: websocket ke channel change-subscription managed backend
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use super::{BackendError, BackendResult, ChangeEvent, ChangeFilter, ChangeKind, Subscription};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
}

impl RealtimeConfig {
    // Derive URL websocket dari base URL backend (http -> ws, https -> wss)
    pub fn from_backend_url(base_url: &str, api_key: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            trimmed.to_string()
        };

        Self {
            url: format!(
                "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
                ws_base, api_key
            ),
        }
    }
}

// Frame protokol channel (topic / event / payload / ref)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

pub fn join_frame(filter: &ChangeFilter, access_token: &str, reference: u64) -> ChannelFrame {
    let mut change = json!({
        "event": filter.kind.as_str(),
        "schema": "public",
        "table": filter.table.as_str(),
    });
    if let Some(expr) = filter.filter_expr() {
        change["filter"] = json!(expr);
    }

    ChannelFrame {
        topic: filter.topic(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_frame(reference: u64) -> ChannelFrame {
    ChannelFrame {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn leave_frame(topic: &str, reference: u64) -> ChannelFrame {
    ChannelFrame {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    #[serde(rename = "type")]
    kind: ChangeKind,
    table: String,
    #[serde(default)]
    record: serde_json::Value,
    #[serde(default)]
    old_record: Option<serde_json::Value>,
}

// Ambil ChangeEvent dari frame postgres_changes
pub fn parse_change(frame: &ChannelFrame) -> Option<ChangeEvent> {
    if frame.event != "postgres_changes" {
        return None;
    }

    let data = frame.payload.get("data")?;
    let payload: ChangePayload = serde_json::from_value(data.clone()).ok()?;

    Some(ChangeEvent {
        kind: payload.kind,
        table: payload.table,
        record: payload.record,
        old_record: payload.old_record,
    })
}

// Balasan join yang gagal (status != ok)
fn join_error(frame: &ChannelFrame) -> Option<String> {
    if frame.event != "phx_reply" {
        return None;
    }
    match frame.payload.get("status").and_then(|s| s.as_str()) {
        Some("ok") | None => None,
        Some(_) => Some(frame.payload.get("response").map(|r| r.to_string()).unwrap_or_default()),
    }
}

fn encode(frame: &ChannelFrame) -> BackendResult<WsMessage> {
    let text = serde_json::to_string(frame).map_err(|e| BackendError::Realtime(e.to_string()))?;
    Ok(WsMessage::Text(text.into()))
}

/// Buka koneksi websocket, join channel sesuai filter, dan forward event ke Subscription
pub async fn subscribe(
    config: &RealtimeConfig,
    access_token: &str,
    filter: ChangeFilter,
) -> BackendResult<Subscription> {
    let (socket, _) = connect_async(config.url.as_str())
        .await
        .map_err(|e| BackendError::Realtime(format!("Gagal connect websocket: {}", e)))?;
    let (mut write, mut read) = socket.split();

    let topic = filter.topic();
    let mut reference: u64 = 1;
    write
        .send(encode(&join_frame(&filter, access_token, reference))?)
        .await
        .map_err(|e| BackendError::Realtime(format!("Gagal join {}: {}", topic, e)))?;

    tracing::info!("Subscribe ke channel {}", topic);

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let task_topic = topic.clone();

    // Task berhenti sendiri setelah Subscription di-drop (kirim phx_leave dulu)
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    reference += 1;
                    let frame = match encode(&heartbeat_frame(reference)) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!("Heartbeat gagal di-encode: {}", e);
                            break;
                        }
                    };
                    if let Err(e) = write.send(frame).await {
                        tracing::warn!("Heartbeat ke {} gagal: {}", task_topic, e);
                        break;
                    }
                }
                _ = tx.closed() => {
                    reference += 1;
                    if let Ok(frame) = encode(&leave_frame(&task_topic, reference)) {
                        let _ = write.send(frame).await;
                    }
                    break;
                }
                incoming = read.next() => match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame: ChannelFrame = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::debug!("Frame realtime tidak dikenal: {}", e);
                                continue;
                            }
                        };

                        if let Some(reason) = join_error(&frame) {
                            tracing::error!("Join channel {} ditolak: {}", task_topic, reason);
                            break;
                        }

                        if let Some(event) = parse_change(&frame) {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::info!("Koneksi realtime {} ditutup server", task_topic);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Realtime error di {}: {}", task_topic, e);
                        break;
                    }
                }
            }
        }
    });

    Ok(Subscription::new(topic, rx, None))
}
