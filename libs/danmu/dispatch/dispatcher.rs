use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::commands::{CommandSet, EventKind};
use super::event::*;
use crate::codec::{popularity, Frame, Opcode};
use crate::error::{DanmuError, Result};

/// Session-lifecycle signals; consumed by the session, never sent to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    HeartbeatReply { popularity: u32 },
    /// `code` is recorded for logs only; any reply counts as success
    AuthReply { code: Option<i64> },
}

/// What a frame turned into
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Event(Event),
    Signal(SessionSignal),
    /// Opcodes a client never acts on (echoed heartbeats, auth requests)
    Ignored,
}

/// Maps decoded frames to events and signals
///
/// Never fails: anything it can't make sense of becomes
/// [`Event::Unknown`].
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    commands: CommandSet,
}

impl Dispatcher {
    pub fn new(commands: CommandSet) -> Self {
        Self { commands }
    }

    pub fn dispatch(&self, frame: &Frame) -> Dispatched {
        match frame.opcode {
            Opcode::Message => Dispatched::Event(self.dispatch_message(&frame.payload)),
            Opcode::HeartbeatReply => Dispatched::Signal(SessionSignal::HeartbeatReply {
                popularity: popularity(&frame.payload).unwrap_or(0),
            }),
            Opcode::AuthReply => Dispatched::Signal(SessionSignal::AuthReply {
                code: serde_json::from_slice::<Value>(&frame.payload)
                    .ok()
                    .and_then(|v| v.get("code").and_then(Value::as_i64)),
            }),
            Opcode::Heartbeat | Opcode::Auth | Opcode::Other(_) => Dispatched::Ignored,
        }
    }

    /// Turn one message payload into exactly one event
    pub fn dispatch_message(&self, payload: &[u8]) -> Event {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!("Message payload is not JSON: {}", e);
                return unknown(None, payload);
            }
        };

        let Some(cmd) = value.get("cmd").and_then(Value::as_str) else {
            return unknown(None, payload);
        };

        let Some(kind) = self.commands.kind_of(normalize_cmd(cmd)) else {
            return unknown(Some(cmd), payload);
        };

        match build_event(kind, normalize_cmd(cmd), &value) {
            Ok(event) => event,
            Err(e) => {
                debug!(cmd = cmd, "Unexpected payload shape: {}", e);
                unknown(Some(cmd), payload)
            }
        }
    }
}

/// Strip protocol suffixes such as `DANMU_MSG:4:0:2:2:2:0`
fn normalize_cmd(cmd: &str) -> &str {
    cmd.split(':').next().unwrap_or(cmd)
}

fn unknown(cmd: Option<&str>, payload: &[u8]) -> Event {
    Event::Unknown(UnknownCommand {
        cmd: cmd.map(str::to_string),
        raw: String::from_utf8_lossy(payload).into_owned(),
    })
}

fn build_event(kind: EventKind, cmd: &str, value: &Value) -> Result<Event> {
    Ok(match kind {
        EventKind::Chat => Event::Chat(chat(value)?),
        EventKind::Interaction => Event::Interaction(interaction(data(value)?)?),
        EventKind::Gift => Event::Gift(gift(data(value)?)?),
        EventKind::GuardBuy => Event::GuardBuy(from_data(value)?),
        EventKind::LikeCount => Event::LikeCount(LikeCount {
            click_count: u64_field(data(value)?, "click_count")?,
        }),
        EventKind::LikeClick => Event::LikeClick(from_data(value)?),
        EventKind::ViewerCount => Event::ViewerCount(viewer_count(cmd, data(value)?)?),
        EventKind::Interact => Event::Interact(interact(data(value)?)?),
        EventKind::RoomStatus => Event::RoomStatus(room_status(cmd, value)?),
    })
}

fn data(value: &Value) -> Result<&Value> {
    value
        .get("data")
        .ok_or_else(|| DanmuError::Decode("missing data".into()))
}

fn from_data<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    T::deserialize(data(value)?).map_err(|e| DanmuError::Decode(e.to_string()))
}

fn u64_field(value: &Value, field: &str) -> Result<u64> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| DanmuError::Decode(format!("missing {}", field)))
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Number or numeric string
fn loose_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn chat(value: &Value) -> Result<ChatMessage> {
    let info = value
        .get("info")
        .and_then(Value::as_array)
        .ok_or_else(|| DanmuError::Decode("missing info".into()))?;

    let text = info
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| DanmuError::Decode("missing text".into()))?
        .to_string();

    let user = info.get(2).and_then(Value::as_array);
    let uid = user
        .and_then(|u| u.first())
        .and_then(Value::as_u64)
        .unwrap_or_default();

    let meta = info.first().and_then(Value::as_array);
    let extra_block = meta.and_then(|m| m.get(15));

    let uname = user
        .and_then(|u| u.get(1))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            extra_block
                .and_then(|b| b.pointer("/user/base/name"))
                .and_then(Value::as_str)
        })
        .unwrap_or_default()
        .to_string();

    // `extra` is itself a JSON document inside a string
    let reply_to = extra_block
        .and_then(|b| b.get("extra"))
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .and_then(|extra| extra.get("reply_uname").and_then(Value::as_str).map(str::to_string))
        .filter(|name| !name.is_empty());

    let sent_at = meta
        .and_then(|m| m.get(4))
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis);

    let medal = info
        .get(3)
        .and_then(Value::as_array)
        .and_then(|m| {
            Some(Medal {
                level: u32::try_from(m.first()?.as_u64()?).ok()?,
                name: m.get(1)?.as_str()?.to_string(),
            })
        })
        .filter(|m| !m.name.is_empty());

    Ok(ChatMessage {
        uid,
        uname,
        text,
        medal,
        reply_to,
        sent_at,
    })
}

fn interaction(data: &Value) -> Result<Interaction> {
    let type_id = data
        .get("type")
        .and_then(Value::as_i64)
        .ok_or_else(|| DanmuError::Decode("missing interaction type".into()))?;

    // The inner `data` arrives as a JSON string
    let inner: Value = match data.get("data") {
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|e| DanmuError::Decode(e.to_string()))?
        }
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Ok(match type_id {
        102 => {
            let combo = inner
                .get("combo")
                .cloned()
                .ok_or_else(|| DanmuError::Decode("missing combo".into()))?;
            Interaction::ChatCombo(
                serde_json::from_value(combo).map_err(|e| DanmuError::Decode(e.to_string()))?,
            )
        }
        106 => Interaction::LikeCombo {
            count: u64_field(&inner, "cnt")?,
            suffix_text: str_field(&inner, "suffix_text"),
        },
        other => Interaction::Other { type_id: other },
    })
}

#[derive(Deserialize)]
struct GiftData {
    #[serde(default)]
    uid: u64,
    #[serde(default)]
    uname: String,
    #[serde(rename = "giftId", default)]
    gift_id: u64,
    #[serde(rename = "giftName", default)]
    gift_name: String,
    #[serde(default)]
    num: u32,
    #[serde(default)]
    action: String,
    #[serde(default)]
    total_coin: u64,
    #[serde(default)]
    coin_type: String,
    #[serde(default)]
    medal_info: Option<MedalInfo>,
}

#[derive(Deserialize)]
struct MedalInfo {
    #[serde(default)]
    medal_name: String,
    #[serde(default)]
    medal_level: u32,
}

fn gift(data: &Value) -> Result<Gift> {
    let raw = GiftData::deserialize(data).map_err(|e| DanmuError::Decode(e.to_string()))?;
    Ok(Gift {
        uid: raw.uid,
        uname: raw.uname,
        gift_id: raw.gift_id,
        gift_name: raw.gift_name,
        num: raw.num,
        action: raw.action,
        total_coin: raw.total_coin,
        coin_type: raw.coin_type,
        medal: raw
            .medal_info
            .filter(|m| !m.medal_name.is_empty())
            .map(|m| Medal {
                name: m.medal_name,
                level: m.medal_level,
            }),
    })
}

fn viewer_count(cmd: &str, data: &Value) -> Result<ViewerCount> {
    if cmd == "WATCHED_CHANGE" {
        Ok(ViewerCount {
            metric: ViewerMetric::Watched,
            count: u64_field(data, "num")?,
            text: data
                .get("text_large")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    } else {
        Ok(ViewerCount {
            metric: ViewerMetric::HighEnergy,
            count: u64_field(data, "count")?,
            text: None,
        })
    }
}

fn interact(data: &Value) -> Result<Interact> {
    Ok(Interact {
        uid: data.get("uid").and_then(loose_u64).unwrap_or_default(),
        uname: str_field(data, "uname"),
        action: data
            .get("msg_type")
            .and_then(Value::as_i64)
            .ok_or_else(|| DanmuError::Decode("missing msg_type".into()))?
            .into(),
    })
}

fn room_status(cmd: &str, value: &Value) -> Result<RoomStatus> {
    let status = match cmd {
        "LIVE" => LiveStatus::Live,
        "PREPARING" => LiveStatus::Preparing,
        other => {
            return Err(DanmuError::Decode(format!(
                "{} is not a room status command",
                other
            )))
        }
    };
    Ok(RoomStatus {
        status,
        room_id: value.get("roomid").and_then(loose_u64),
    })
}
