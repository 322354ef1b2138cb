//! Event sink that writes every event to the log

use danmu::dispatch::{Event, Interaction, InteractAction, LiveStatus, ViewerMetric};
use danmu::{EventSink, Result};
use tracing::{debug, info};

/// Logs one line per event; unknown commands go to debug
#[derive(Debug, Default)]
pub struct LogSink {
    handled: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }
}

impl EventSink for LogSink {
    fn handle(&mut self, event: Event) -> Result<()> {
        self.handled += 1;
        match &event {
            Event::Unknown(_) => debug!("{}", describe(&event)),
            _ => info!("{}", describe(&event)),
        }
        Ok(())
    }
}

/// Human readable one-liner for an event
pub fn describe(event: &Event) -> String {
    match event {
        Event::Chat(chat) => match &chat.medal {
            Some(medal) => format!(
                "[chat] [{} {}] {}: {}",
                medal.name, medal.level, chat.uname, chat.text
            ),
            None => format!("[chat] {}: {}", chat.uname, chat.text),
        },
        Event::Interaction(Interaction::ChatCombo(entries)) => match entries.last() {
            Some(combo) => format!("[combo] \"{}\" x{}", combo.content, combo.count),
            None => "[combo] (empty)".to_string(),
        },
        Event::Interaction(Interaction::LikeCombo { count, suffix_text }) => {
            format!("[combo] {} {}", count, suffix_text)
        }
        Event::Interaction(Interaction::Other { type_id }) => {
            format!("[interaction] type {}", type_id)
        }
        Event::Gift(gift) => format!(
            "[gift] {} {} {} x{} ({} {})",
            gift.uname, gift.action, gift.gift_name, gift.num, gift.total_coin, gift.coin_type
        ),
        Event::GuardBuy(guard) => format!(
            "[guard] {} bought {} x{} (level {})",
            guard.username, guard.gift_name, guard.num, guard.guard_level
        ),
        Event::LikeCount(likes) => format!("[likes] {} total", likes.click_count),
        Event::LikeClick(click) => format!("[like] {} {}", click.uname, click.like_text),
        Event::ViewerCount(viewers) => {
            let label = match viewers.metric {
                ViewerMetric::HighEnergy => "high-energy",
                ViewerMetric::Watched => "watched",
            };
            match &viewers.text {
                Some(text) => format!("[viewers] {} {} ({})", label, viewers.count, text),
                None => format!("[viewers] {} {}", label, viewers.count),
            }
        }
        Event::Interact(interact) => {
            let action = match interact.action {
                InteractAction::Enter => "entered".to_string(),
                InteractAction::Follow => "followed".to_string(),
                InteractAction::Share => "shared".to_string(),
                InteractAction::Other(code) => format!("interacted ({})", code),
            };
            format!("[interact] {} {}", interact.uname, action)
        }
        Event::RoomStatus(status) => match status.status {
            LiveStatus::Live => "[room] live".to_string(),
            LiveStatus::Preparing => "[room] preparing".to_string(),
        },
        Event::Unknown(unknown) => format!(
            "[unknown] {} ({} bytes)",
            unknown.cmd.as_deref().unwrap_or("<no cmd>"),
            unknown.raw.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmu::dispatch::{ChatMessage, ComboEntry, Medal, UnknownCommand};

    fn chat(medal: Option<Medal>) -> Event {
        Event::Chat(ChatMessage {
            uid: 1,
            uname: "alice".to_string(),
            text: "hello".to_string(),
            medal,
            reply_to: None,
            sent_at: None,
        })
    }

    #[test]
    fn test_describe_chat() {
        assert_eq!(describe(&chat(None)), "[chat] alice: hello");
        let medal = Medal {
            name: "fan".to_string(),
            level: 12,
        };
        assert_eq!(describe(&chat(Some(medal))), "[chat] [fan 12] alice: hello");
    }

    #[test]
    fn test_describe_combo_uses_last_entry() {
        let event = Event::Interaction(Interaction::ChatCombo(vec![
            ComboEntry {
                count: 3,
                guide: String::new(),
                content: "first".to_string(),
            },
            ComboEntry {
                count: 9,
                guide: String::new(),
                content: "running".to_string(),
            },
        ]));
        assert_eq!(describe(&event), "[combo] \"running\" x9");
    }

    #[test]
    fn test_describe_unknown() {
        let event = Event::Unknown(UnknownCommand {
            cmd: None,
            raw: "{}".to_string(),
        });
        assert_eq!(describe(&event), "[unknown] <no cmd> (2 bytes)");
    }

    #[test]
    fn test_sink_counts_events() {
        let mut sink = LogSink::new();
        sink.handle(chat(None)).unwrap();
        sink.handle(chat(None)).unwrap();
        assert_eq!(sink.handled(), 2);
    }
}
