//! Typed events delivered to the sink
//!
//! Only the handful of fields a consumer usually needs are lifted out of
//! each payload; anything else stays in the platform's JSON and is not
//! modelled here.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::commands::EventKind;

/// One decoded room event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `DANMU_MSG`
    Chat(ChatMessage),
    /// `DM_INTERACTION`: repeated chat lines or likes merged by the server
    Interaction(Interaction),
    /// `SEND_GIFT`
    Gift(Gift),
    /// `GUARD_BUY`
    GuardBuy(GuardBuy),
    /// `LIKE_INFO_V3_UPDATE`
    LikeCount(LikeCount),
    /// `LIKE_INFO_V3_CLICK`
    LikeClick(LikeClick),
    /// `ONLINE_RANK_COUNT`, `WATCHED_CHANGE`
    ViewerCount(ViewerCount),
    /// `INTERACT_WORD`
    Interact(Interact),
    /// `LIVE`, `PREPARING`
    RoomStatus(RoomStatus),
    /// Anything not recognised, or recognised but not in the expected shape
    Unknown(UnknownCommand),
}

impl Event {
    /// Tag of the event, `None` for [`Event::Unknown`]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Event::Chat(_) => Some(EventKind::Chat),
            Event::Interaction(_) => Some(EventKind::Interaction),
            Event::Gift(_) => Some(EventKind::Gift),
            Event::GuardBuy(_) => Some(EventKind::GuardBuy),
            Event::LikeCount(_) => Some(EventKind::LikeCount),
            Event::LikeClick(_) => Some(EventKind::LikeClick),
            Event::ViewerCount(_) => Some(EventKind::ViewerCount),
            Event::Interact(_) => Some(EventKind::Interact),
            Event::RoomStatus(_) => Some(EventKind::RoomStatus),
            Event::Unknown(_) => None,
        }
    }

    /// Short name for logs
    pub fn kind_name(&self) -> &'static str {
        self.kind().map_or("unknown", EventKind::name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Medal {
    pub name: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub uid: u64,
    pub uname: String,
    pub text: String,
    pub medal: Option<Medal>,
    /// Name of the user this line replies to
    pub reply_to: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComboEntry {
    #[serde(rename = "cnt", default)]
    pub count: u64,
    #[serde(default)]
    pub guide: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// type 102: hot phrases, the last entry is the running combo
    ChatCombo(Vec<ComboEntry>),
    /// type 106
    LikeCombo { count: u64, suffix_text: String },
    Other { type_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    pub uid: u64,
    pub uname: String,
    pub gift_id: u64,
    pub gift_name: String,
    pub num: u32,
    pub action: String,
    /// In 1/1000 of the platform currency for `gold` gifts
    pub total_coin: u64,
    pub coin_type: String,
    pub medal: Option<Medal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuardBuy {
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub username: String,
    /// 1 = highest tier, 3 = entry tier
    #[serde(default)]
    pub guard_level: u8,
    #[serde(default)]
    pub num: u32,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub gift_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeCount {
    pub click_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LikeClick {
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub like_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMetric {
    /// High-energy (ranked) users currently in the room
    HighEnergy,
    /// Viewers who have watched this broadcast
    Watched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerCount {
    pub metric: ViewerMetric,
    pub count: u64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractAction {
    Enter,
    Follow,
    Share,
    Other(i64),
}

impl From<i64> for InteractAction {
    fn from(msg_type: i64) -> Self {
        match msg_type {
            1 => InteractAction::Enter,
            2 => InteractAction::Follow,
            3 => InteractAction::Share,
            other => InteractAction::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interact {
    pub uid: u64,
    pub uname: String,
    pub action: InteractAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Live,
    Preparing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub status: LiveStatus,
    pub room_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand {
    /// The `cmd` field as sent, if there was one
    pub cmd: Option<String>,
    /// Payload text (lossy UTF-8)
    pub raw: String,
}
