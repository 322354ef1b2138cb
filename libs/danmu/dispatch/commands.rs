use std::collections::HashMap;

/// Tag of a recognised event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    Interaction,
    Gift,
    GuardBuy,
    LikeCount,
    LikeClick,
    ViewerCount,
    Interact,
    RoomStatus,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Chat => "chat",
            EventKind::Interaction => "interaction",
            EventKind::Gift => "gift",
            EventKind::GuardBuy => "guard_buy",
            EventKind::LikeCount => "like_count",
            EventKind::LikeClick => "like_click",
            EventKind::ViewerCount => "viewer_count",
            EventKind::Interact => "interact",
            EventKind::RoomStatus => "room_status",
        }
    }
}

const BASIC_COMMANDS: &[(&str, EventKind)] = &[
    ("DANMU_MSG", EventKind::Chat),
    ("DM_INTERACTION", EventKind::Interaction),
    ("SEND_GIFT", EventKind::Gift),
    ("GUARD_BUY", EventKind::GuardBuy),
    ("LIKE_INFO_V3_UPDATE", EventKind::LikeCount),
    ("ONLINE_RANK_COUNT", EventKind::ViewerCount),
    ("WATCHED_CHANGE", EventKind::ViewerCount),
    ("LIVE", EventKind::RoomStatus),
    ("PREPARING", EventKind::RoomStatus),
];

const EXTENDED_COMMANDS: &[(&str, EventKind)] = &[
    ("LIKE_INFO_V3_CLICK", EventKind::LikeClick),
    ("INTERACT_WORD", EventKind::Interact),
];

/// Which `cmd` values are decoded, and into what
///
/// Coverage is data: clients that want fewer event types drop
/// commands here instead of filtering downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    commands: HashMap<String, EventKind>,
}

impl CommandSet {
    /// No commands recognised; everything dispatches as unknown
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Chat, combos, gifts, guards, like count, viewer counts, room status
    pub fn basic() -> Self {
        let mut set = Self::empty();
        for (cmd, kind) in BASIC_COMMANDS {
            set.commands.insert((*cmd).to_string(), *kind);
        }
        set
    }

    /// Every command this crate knows how to decode
    pub fn full() -> Self {
        let mut set = Self::basic();
        for (cmd, kind) in EXTENDED_COMMANDS {
            set.commands.insert((*cmd).to_string(), *kind);
        }
        set
    }

    pub fn with(mut self, cmd: impl Into<String>, kind: EventKind) -> Self {
        self.commands.insert(cmd.into(), kind);
        self
    }

    pub fn without(mut self, cmd: &str) -> Self {
        self.commands.remove(cmd);
        self
    }

    /// Look up a normalised command name
    pub fn kind_of(&self, cmd: &str) -> Option<EventKind> {
        self.commands.get(cmd).copied()
    }

    pub fn contains(&self, cmd: &str) -> bool {
        self.commands.contains_key(cmd)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::full()
    }
}
