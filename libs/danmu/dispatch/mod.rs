//! Routing of decoded frames to typed events and session signals.

pub mod commands;
pub mod dispatcher;
pub mod event;

pub use commands::{CommandSet, EventKind};
pub use dispatcher::{Dispatched, Dispatcher, SessionSignal};
pub use event::{
    ChatMessage, ComboEntry, Event, Gift, GuardBuy, Interact, InteractAction, Interaction,
    LikeClick, LikeCount, LiveStatus, Medal, RoomStatus, UnknownCommand, ViewerCount,
    ViewerMetric,
};
