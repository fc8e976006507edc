//! Backup and restore
//!
//! Serializes the whole conversation (log, participants, settings, quota,
//! ended flag) together with the bot bank into a single JSON document, and
//! restores it atomically: malformed input is rejected up front and leaves
//! the running state untouched. On restore the bank is rebuilt first so bot
//! template links can be validated against it; a `uid` that no longer
//! resolves is silently dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bank::{BotBank, BotTemplate};
use crate::chat::{Bot, ChatState, Message, SharedSettings, BOT_ONE, BOT_TWO};
use crate::error::{EngineError, Result};
use crate::quota::Quota;

/// On-disk backup document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Full conversation log
    pub messages: Vec<Message>,

    /// The two participants as configured at export time
    pub bots: Vec<Bot>,

    /// Shared generation settings
    pub shared_settings: SharedSettings,

    /// Quota budget at export time
    pub remaining_quota: i64,

    /// Whether the conversation had ended
    pub conversation_ended: bool,

    /// Saved bot templates
    #[serde(default)]
    pub bot_bank: Vec<BotTemplate>,
}

impl Backup {
    /// Capture the current conversation and bank
    pub fn capture(state: &ChatState, bank: &BotBank) -> Self {
        Self {
            messages: state.messages().to_vec(),
            bots: state.bots().to_vec(),
            shared_settings: state.shared_settings().clone(),
            remaining_quota: state.remaining_quota(),
            conversation_ended: state.conversation_ended(),
            bot_bank: bank.templates().to_vec(),
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidBackup(e.to_string()))
    }

    /// Parse a backup document, rejecting malformed input
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidBackup(e.to_string()))
    }

    /// Write the backup to a file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "backup written");
        Ok(())
    }

    /// Read a backup from a file
    pub fn read_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Apply the backup to the given state and bank.
    ///
    /// A document that does not carry exactly the two debate slots is
    /// rejected before anything is touched. The bank is rebuilt first;
    /// restored bots keep their template link only when the uid resolves
    /// in the restored bank.
    pub fn apply(self, state: &mut ChatState, bank: &mut BotBank) -> Result<()> {
        let mut slots: Vec<&str> = self.bots.iter().map(|b| b.id.as_str()).collect();
        slots.sort_unstable();
        if slots != [BOT_ONE, BOT_TWO] {
            return Err(EngineError::InvalidBackup(format!(
                "expected the two debate slots {} and {}",
                BOT_ONE, BOT_TWO
            )));
        }

        bank.replace(self.bot_bank);

        let bots = self
            .bots
            .into_iter()
            .map(|mut bot| {
                if let Some(uid) = bot.uid.as_deref() {
                    if !bank.contains(uid) {
                        debug!(bot = %bot.id, uid, "dropping dangling template link");
                        bot.uid = None;
                    }
                }
                bot.is_active = false;
                bot
            })
            .collect();

        state.restore(
            self.messages,
            bots,
            self.shared_settings,
            Quota::new(self.remaining_quota),
            self.conversation_ended,
        );
        Ok(())
    }
}
