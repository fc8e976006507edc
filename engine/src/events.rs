//! Event bus for state-change notifications
//!
//! The EventBus provides a pub/sub pattern so observers (the interactive
//! chat loop, persistence) can react to conversation state changes without
//! being coupled to the scheduler. It uses bounded channels to prevent
//! unbounded memory growth and supports both specific event subscriptions
//! and global "All" subscriptions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::chat::{FacilitatorDecision, Message, Speaker};

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the event bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    /// A message was appended to the log
    MessageAppended,
    /// A facilitator verdict was annotated onto an existing message
    MessageAnnotated,
    /// A participant's configuration or active flag changed
    BotUpdated,
    /// The quota budget changed
    QuotaChanged,
    /// The typing indicator flipped
    TypingChanged,
    /// The conversation was ended
    ConversationEnded,
    /// The conversation was resumed
    ConversationResumed,
    /// The log was reset (restart or import)
    ChatReset,
    /// Subscribe to all event types
    All,
}

/// Events that can be published on the event bus
#[derive(Debug, Clone)]
pub enum Event {
    /// A message was appended to the log
    MessageAppended { message: Box<Message> },
    /// A verdict was annotated onto an existing message
    MessageAnnotated {
        message_id: String,
        decision: FacilitatorDecision,
    },
    /// A participant's active flag changed
    BotUpdated { bot_id: String, is_active: bool },
    /// The quota budget changed
    QuotaChanged { remaining: i64 },
    /// The typing indicator flipped
    TypingChanged {
        is_typing: bool,
        speaker: Option<Speaker>,
    },
    /// The conversation was ended
    ConversationEnded,
    /// The conversation was resumed
    ConversationResumed,
    /// The log was reset to `message_count` retained messages
    ChatReset { message_count: usize },
}

impl Event {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::MessageAppended { .. } => EventType::MessageAppended,
            Event::MessageAnnotated { .. } => EventType::MessageAnnotated,
            Event::BotUpdated { .. } => EventType::BotUpdated,
            Event::QuotaChanged { .. } => EventType::QuotaChanged,
            Event::TypingChanged { .. } => EventType::TypingChanged,
            Event::ConversationEnded => EventType::ConversationEnded,
            Event::ConversationResumed => EventType::ConversationResumed,
            Event::ChatReset { .. } => EventType::ChatReset,
        }
    }
}

/// Pub/sub bus for conversation state changes
///
/// Observers subscribe to specific event types or all events; the scheduler
/// publishes as it mutates state. Channels are bounded, and sends to full or
/// dropped subscribers fail silently.
pub struct EventBus {
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<Event>>>>>,
}

impl EventBus {
    /// Create a new EventBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type (or `EventType::All`)
    ///
    /// Returns a bounded receiver for events of the requested type.
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to all subscribers
    ///
    /// The event is sent to subscribers of its specific type and to "All"
    /// subscribers. Send errors are ignored.
    pub async fn publish(&self, event: Event) {
        let channels = self.channels.lock().await;
        let event_type = event.event_type();

        if let Some(subscribers) = channels.get(&event_type) {
            for tx in subscribers {
                let _ = tx.send(event.clone()).await;
            }
        }

        if let Some(subscribers) = channels.get(&EventType::All) {
            for tx in subscribers {
                let _ = tx.send(event.clone()).await;
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
