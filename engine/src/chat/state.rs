//! Conversation state store
//!
//! Owns the message log, the two participants, shared generation settings,
//! the quota, and the typing/ended indicators. Mutated exclusively by the
//! scheduler and top-level user actions; the log is append-only except for
//! the single narrow `annotate_decision` operation.

use super::{default_bots, Bot, FacilitatorDecision, Message, SharedSettings, Speaker};
use crate::quota::Quota;

/// Singleton conversation state
#[derive(Debug, Clone)]
pub struct ChatState {
    messages: Vec<Message>,
    bots: Vec<Bot>,
    shared_settings: SharedSettings,
    quota: Quota,
    conversation_ended: bool,
    is_typing: bool,
    last_speaker: Option<Speaker>,
}

impl ChatState {
    /// Create a state with explicit participants and settings
    pub fn new(bots: Vec<Bot>, shared_settings: SharedSettings, quota: Quota) -> Self {
        Self {
            messages: Vec::new(),
            bots,
            shared_settings,
            quota,
            conversation_ended: false,
            is_typing: false,
            last_speaker: None,
        }
    }

    /// Chronological message log (append order is never reordered)
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The two debate participants
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    /// Look up a participant by slot id
    pub fn bot(&self, id: &str) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id == id)
    }

    /// The participant whose slot id is NOT `id`
    pub fn other_bot(&self, id: &str) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id != id)
    }

    /// Shared generation settings
    pub fn shared_settings(&self) -> &SharedSettings {
        &self.shared_settings
    }

    /// Replace the shared generation settings
    pub fn set_shared_settings(&mut self, settings: SharedSettings) {
        self.shared_settings = settings;
    }

    /// Remaining quota budget
    pub fn remaining_quota(&self) -> i64 {
        self.quota.remaining()
    }

    /// True once the quota budget is spent
    pub fn quota_exhausted(&self) -> bool {
        self.quota.is_exhausted()
    }

    /// Apply a clamped delta to the quota
    pub fn add_to_quota(&mut self, delta: i64) {
        self.quota.add(delta);
    }

    /// Whether the conversation has been ended
    pub fn conversation_ended(&self) -> bool {
        self.conversation_ended
    }

    /// Set the ended flag
    pub fn set_ended(&mut self, ended: bool) {
        self.conversation_ended = ended;
    }

    /// Whether a generation is visibly in progress
    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    /// Set the typing indicator
    pub fn set_typing(&mut self, typing: bool) {
        self.is_typing = typing;
    }

    /// Who spoke (or started speaking) last
    pub fn last_speaker(&self) -> Option<&Speaker> {
        self.last_speaker.as_ref()
    }

    /// Record the current speaker
    pub fn set_last_speaker(&mut self, speaker: Option<Speaker>) {
        self.last_speaker = speaker;
    }

    /// Append a message to the log
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Set `metadata.facilitator_decision` on an existing message.
    ///
    /// This is the only in-place mutation permitted on the otherwise
    /// append-only log. Returns false when the message id is unknown.
    pub fn annotate_decision(&mut self, message_id: &str, decision: FacilitatorDecision) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message
                    .metadata
                    .get_or_insert_with(Default::default)
                    .facilitator_decision = Some(decision);
                true
            }
            None => false,
        }
    }

    /// Mark a participant active or inactive. Returns false on unknown id.
    pub fn set_bot_active(&mut self, bot_id: &str, active: bool) -> bool {
        match self.bots.iter_mut().find(|b| b.id == bot_id) {
            Some(bot) => {
                bot.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Deactivate both participants
    pub fn deactivate_bots(&mut self) {
        for bot in &mut self.bots {
            bot.is_active = false;
        }
    }

    /// Replace a participant's configuration, keeping its slot id
    pub fn replace_bot(&mut self, bot: Bot) -> bool {
        match self.bots.iter_mut().find(|b| b.id == bot.id) {
            Some(slot) => {
                *slot = bot;
                true
            }
            None => false,
        }
    }

    /// Messages authored by the two debate slots, in log order
    pub fn bot_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_from_bot())
    }

    /// Most recent bot-authored message, if any
    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_from_bot())
    }

    /// Index of a message in the log by id
    pub fn message_index(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Drop every message after index `keep` (inclusive truncation)
    pub fn truncate_messages(&mut self, keep: usize) {
        self.messages.truncate(keep);
    }

    /// Reset to a fresh conversation holding the given messages.
    ///
    /// Participants are kept but deactivated; quota returns to the initial
    /// budget; ended/typing flags clear.
    pub fn reset(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.deactivate_bots();
        self.quota = Quota::default();
        self.conversation_ended = false;
        self.is_typing = false;
        self.last_speaker = None;
    }

    /// Replace the whole state from a restored backup
    pub fn restore(
        &mut self,
        messages: Vec<Message>,
        bots: Vec<Bot>,
        shared_settings: SharedSettings,
        quota: Quota,
        conversation_ended: bool,
    ) {
        self.messages = messages;
        self.bots = bots;
        self.shared_settings = shared_settings;
        self.quota = quota;
        self.conversation_ended = conversation_ended;
        self.is_typing = false;
        self.last_speaker = None;
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(default_bots(), SharedSettings::default(), Quota::default())
    }
}
